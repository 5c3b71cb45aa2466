//! PixelAI core: turn raster images into clean pixel art.
//!
//! A [`Session`](project::Session) owns one image, its undo history and its
//! view, and admits one processing job at a time. The operations themselves
//! ([`ops`]) are pure functions over a [`PixelBuffer`](canvas::PixelBuffer).

#[macro_use]
pub mod logger;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod ops;
pub mod project;
pub mod settings;

pub use canvas::{PixelBuffer, Transform, ViewState, ViewTransform};
pub use error::{PixelError, Result};
pub use ops::{DenoiseParams, Job, Operation, OperationResult, Step};
pub use project::{JobHandle, Session};
