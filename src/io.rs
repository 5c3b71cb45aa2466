use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::{DynamicImage, ImageEncoder, ImageError, ImageFormat};

use crate::canvas::PixelBuffer;
use crate::log_info;
use crate::ops::transform::fit_within;
use crate::settings::Settings;

// ============================================================================
// SAVE FORMATS
// ============================================================================

/// Output formats the exporter can write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    Tga,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tga => "tga",
        }
    }

    /// Parse a format name or file extension. `None` for anything unsupported.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim_start_matches('.').to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            "tga" => Some(SaveFormat::Tga),
            _ => None,
        }
    }

    /// Only JPEG uses the quality setting.
    pub fn supports_quality(&self) -> bool {
        matches!(self, SaveFormat::Jpeg)
    }
}

// ============================================================================
// SYNCHRONOUS IMAGE LOADER
// ============================================================================

/// A decoded image ready to hand to a session.
#[derive(Debug)]
pub struct LoadedImage {
    /// File name including extension.
    pub name: String,
    /// Upper-case format name ("PNG", "JPEG", ...).
    pub format: String,
    pub size_bytes: u64,
    /// Dimensions as stored in the file, before any fit.
    pub source_width: u32,
    pub source_height: u32,
    pub buffer: PixelBuffer,
}

/// Load an image file into RGBA.
///
/// Rejects files that are not a known image type or exceed
/// `settings.max_file_bytes`, then shrinks the result to fit within
/// `settings.max_load_dimension` on both axes (aspect preserved).
pub fn load_image_sync(path: &Path, settings: &Settings) -> Result<LoadedImage, String> {
    let format = ImageFormat::from_path(path)
        .map_err(|_| format!("'{}' is not a supported image file", path.display()))?;

    let size_bytes = std::fs::metadata(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?
        .len();
    if size_bytes > settings.max_file_bytes {
        return Err(format!(
            "'{}' is {}, the limit is {}",
            path.display(),
            format_file_size(size_bytes),
            format_file_size(settings.max_file_bytes)
        ));
    }

    let img = image::open(path).map_err(|e| e.to_string())?.to_rgba8();
    let (source_width, source_height) = img.dimensions();
    let mut buffer = PixelBuffer::from_rgba_image(&img);

    let limit = settings.max_load_dimension;
    if source_width > limit || source_height > limit {
        buffer = fit_within(&buffer, limit, limit);
        log_info!(
            "Fit {}x{} -> {}x{} on load",
            source_width,
            source_height,
            buffer.width(),
            buffer.height()
        );
    }

    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string());

    Ok(LoadedImage {
        name,
        format: format_name(format),
        size_bytes,
        source_width,
        source_height,
        buffer,
    })
}

fn format_name(format: ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .map(|e| match *e {
            "jpg" => "JPEG".to_string(),
            other => other.to_uppercase(),
        })
        .unwrap_or_else(|| format!("{:?}", format).to_uppercase())
}

/// Human-readable size: "0 Bytes", "512 Bytes", "1.5 KB", "2 MB".
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", text, UNITS[unit])
}

// ============================================================================
// THREAD-SAFE IMAGE ENCODING
// ============================================================================

/// Encode and write a buffer to `path`.
/// Standalone (no session access) so it can run on a worker thread.
pub fn encode_and_write(
    buffer: &PixelBuffer,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let (w, h) = (buffer.width(), buffer.height());

    match format {
        SaveFormat::Png => {
            PngEncoder::new(&mut writer).write_image(buffer.as_raw(), w, h, image::ColorType::Rgba8)?;
        }
        SaveFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb_image = DynamicImage::ImageRgba8(buffer.to_rgba_image()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder.encode(rgb_image.as_raw(), w, h, image::ColorType::Rgb8)?;
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(buffer.as_raw(), w, h, image::ColorType::Rgba8)?;
        }
        SaveFormat::Tga => {
            TgaEncoder::new(&mut writer).encode(buffer.as_raw(), w, h, image::ColorType::Rgba8)?;
        }
    }

    Ok(())
}
