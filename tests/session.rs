use image::Rgba;

use pixelai::components::history::DEFAULT_HISTORY_DEPTH;
use pixelai::ops::stats::distinct_colors;
use pixelai::{DenoiseParams, Operation, PixelBuffer, PixelError, Session};

fn noisy(w: u32, h: u32, seed: u32) -> PixelBuffer {
    let mut buf = PixelBuffer::new(w, h);
    let mut state = seed.wrapping_mul(2654435761).max(1);
    for y in 0..h {
        for x in 0..w {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let b = state.to_le_bytes();
            buf.put_pixel(x, y, Rgba([b[0], b[1], b[2], 255 - (b[3] & 0x0f)]));
        }
    }
    buf
}

fn busy_session() -> Session {
    let mut s = Session::from_buffer("noise.png", noisy(24, 18, 7), DEFAULT_HISTORY_DEPTH);
    s.set_container(480.0, 360.0).unwrap();
    s
}

#[test]
fn n_commits_then_n_undos_restore_everything() {
    let mut s = busy_session();
    s.set_zoom(1.5).unwrap();
    s.pan(30.0, -12.0).unwrap();
    let buffer0 = s.buffer().clone();
    let view0 = s.view_state();

    let ops = [
        Operation::Align { block_size: 3 },
        Operation::Denoise(DenoiseParams { strength: 40, tolerance: 25, max_colors: 6 }),
        Operation::Downsample { cols: 8, rows: 6 },
        Operation::Align { block_size: 2 },
        Operation::Downsample { cols: 3, rows: 2 },
    ];
    for (i, op) in ops.iter().enumerate() {
        s.apply(*op).unwrap();
        // Interleave view changes, which undo must also roll back.
        s.pan(i as f64, 1.0).unwrap();
    }
    assert_eq!((s.width(), s.height()), (3, 2));
    assert_eq!(s.undo_count(), ops.len());

    for _ in 0..ops.len() {
        s.undo().unwrap();
    }
    assert_eq!(s.buffer(), &buffer0);
    assert_eq!(s.view_state(), view0);
    assert_eq!(s.undo(), Err(PixelError::EmptyHistory));
}

#[test]
fn fifty_one_commits_keep_fifty() {
    let mut s = Session::from_buffer("tiny", noisy(4, 4, 3), DEFAULT_HISTORY_DEPTH);
    let first = s.buffer().clone();
    for i in 0..51u32 {
        let cols = if i % 2 == 0 { 5 } else { 4 };
        s.apply(Operation::Downsample { cols, rows: 4 }).unwrap();
    }
    assert_eq!(s.undo_count(), 50);
    for _ in 0..50 {
        s.undo().unwrap();
    }
    // The pre-first-commit state was evicted; we land on the state after commit #1.
    assert_eq!((s.width(), s.height()), (5, 4));
    assert_ne!(s.buffer(), &first);
    assert_eq!(s.undo(), Err(PixelError::EmptyHistory));
}

#[test]
fn background_job_blocks_new_work_until_committed() {
    let mut s = busy_session();
    let before = s.buffer().clone();
    let handle = s.spawn(Operation::Align { block_size: 4 }).unwrap();

    assert!(s.is_processing());
    assert_eq!(s.align(2), Err(PixelError::OperationInProgress));
    assert_eq!(s.downsample(2, 2), Err(PixelError::OperationInProgress));
    assert_eq!(s.undo(), Err(PixelError::OperationInProgress));
    // Nothing is applied until the coordinating owner commits.
    assert_eq!(s.buffer(), &before);

    s.finish(handle).unwrap();
    assert!(!s.is_processing());
    assert_eq!(s.history_labels(), vec!["Align to 4px grid".to_string()]);
    assert_eq!(s.buffer(), &Operation::Align { block_size: 4 }.apply(&before).unwrap());
}

#[test]
fn rejected_request_is_distinct_from_invalid_parameter() {
    let mut s = busy_session();
    let job = s.begin(Operation::Align { block_size: 2 }).unwrap();
    let busy = s.denoise(10, 10, 0).unwrap_err();
    assert_eq!(busy, PixelError::OperationInProgress);
    s.commit(job.run()).unwrap();
    let invalid = s.denoise(10, 10, 0).unwrap_err();
    assert!(matches!(invalid, PixelError::InvalidParameter { name: "max_colors", .. }));
}

#[test]
fn downsample_refits_and_undo_restores_scale() {
    let mut s = busy_session();
    // floor(480/24)=20, floor(360/18)=20
    assert_eq!(s.view_state().display_scale, 20);
    s.downsample(6, 3).unwrap();
    // floor(480/6)=80, floor(360/3)=120 -> 120
    assert_eq!(s.view_state().display_scale, 120);
    assert_eq!(s.current_transform().scale, 120.0);

    s.align(2).unwrap();
    assert_eq!(s.view_state().display_scale, 120);

    s.undo().unwrap();
    s.undo().unwrap();
    assert_eq!((s.width(), s.height()), (24, 18));
    assert_eq!(s.view_state().display_scale, 20);
}

#[test]
fn drag_pans_in_buffer_space() {
    let mut s = busy_session();
    s.set_zoom(4.0).unwrap();
    s.pointer_down(10.0, 10.0);
    assert!(s.pointer_move(50.0, 30.0));
    s.pointer_up();
    assert!(!s.pointer_move(90.0, 90.0));
    let t = s.current_transform();
    assert_eq!((t.offset_x, t.offset_y), (10.0, 5.0));
    assert_eq!(t.scale, 80.0);
}

#[test]
fn denoise_single_color_through_session() {
    // Channels stay below 64, well inside a tolerance radius of 255.
    let mut dim = noisy(12, 9, 11);
    for y in 0..9 {
        for x in 0..12 {
            let Rgba([r, g, b, a]) = dim.get_pixel(x, y);
            dim.put_pixel(x, y, Rgba([r & 0x3f, g & 0x3f, b & 0x3f, a]));
        }
    }
    let first = dim.get_pixel(0, 0);
    let mut s = Session::from_buffer("dim", dim, DEFAULT_HISTORY_DEPTH);
    s.denoise(0, 100, 1).unwrap();
    assert_eq!(distinct_colors(s.buffer()), 1);
    assert_eq!(&s.pixel(5, 5).0[..3], &first.0[..3]);
}

#[test]
fn export_is_nearest_neighbour_at_rounded_size() {
    let mut s = busy_session();
    s.downsample(5, 4).unwrap();
    let out = s.export(3.0).unwrap();
    assert_eq!((out.width(), out.height()), (15, 12));
    for y in 0..12 {
        for x in 0..15 {
            assert_eq!(out.get_pixel(x, y), s.pixel(x / 3, y / 3));
        }
    }
    let odd = s.export(1.5).unwrap();
    assert_eq!((odd.width(), odd.height()), (8, 6));
    assert!(s.export(0.0).is_err());
}

#[test]
fn sessions_are_independent() {
    let mut a = busy_session();
    let mut b = busy_session();
    assert_ne!(a.id, b.id);
    let _job = a.begin(Operation::Align { block_size: 2 }).unwrap();
    assert!(b.align(2).is_ok());
    assert!(a.is_processing());
    assert!(!b.is_processing());
}

#[test]
fn shrink_follows_the_align_grid() {
    let mut s = busy_session();
    let aligned = Operation::Align { block_size: 5 }.apply(s.buffer()).unwrap();
    s.apply(Operation::Shrink { block_size: 5 }).unwrap();
    assert_eq!((s.width(), s.height()), (5, 4));
    for cy in 0..4 {
        for cx in 0..5 {
            assert_eq!(s.pixel(cx, cy), aligned.get_pixel(cx * 5, cy * 5));
        }
    }
    assert_eq!(s.history_labels(), vec!["Shrink by 5px blocks".to_string()]);
}
