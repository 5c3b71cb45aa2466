// ============================================================================
// PixelAI CLI — headless batch pixel-art processing
// ============================================================================
//
// Usage examples:
//   pixelai -i photo.png --op align:8 --op denoise:30,20,16 -o sprite.png
//   pixelai -i shots/*.jpg --op shrink:8 --scale 4 --output-dir out/ -f png
//   pixelai -i a.png --op downsample:40x30 --op denoise:0,10,8 --undo 1 -o b.png
//
// Steps run in order on one session per file. Every step is undoable, so
// `--undo N` rolls back the last N before the export.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::io::{SaveFormat, encode_and_write, format_file_size, load_image_sync};
use crate::ops::{DenoiseParams, Step};
use crate::ops::stats::ProcessStats;
use crate::project::Session;
use crate::settings::Settings;
use crate::{log_err, log_info, log_warn};

// ============================================================================
// ARGUMENTS
// ============================================================================

/// PixelAI headless pixel-art processor.
#[derive(Parser, Debug)]
#[command(
    name = "pixelai",
    version,
    about = "Turn images into clean pixel art: grid alignment, palette denoising and downsampling",
    long_about = "Run a pipeline of pixel-art steps on image files.\n\n\
                  Steps (repeat --op, applied in order):\n  \
                  align:SIZE                  average each SIZE x SIZE block\n  \
                  denoise:STRENGTH,TOL,COLORS quantize to at most COLORS, then blur\n  \
                  shrink:SIZE                 one pixel per SIZE x SIZE block\n  \
                  downsample:COLSxROWS        block-average to an explicit size\n\n\
                  Example:\n  \
                  pixelai -i photo.png --op align:8 --op denoise:30,20,16 -o sprite.png"
)]
pub struct CliArgs {
    /// Images to process; paths or glob patterns such as "frames/*.png".
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Where to write the result (single input only).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory receiving one result per input, named after the input.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// png, jpeg, bmp or tga. Taken from the -o extension when omitted, else png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100). Defaults to the saved setting.
    #[arg(short, long, value_name = "1-100", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Processing step; repeat to build a pipeline. Without any, the saved
    /// defaults run as `align` followed by `denoise`.
    #[arg(long = "op", value_name = "STEP")]
    pub ops: Vec<Step>,

    /// Export scale factor (e.g. 4 to upscale pixel art crisply).
    #[arg(long, value_name = "FACTOR")]
    pub scale: Option<f64>,

    /// Shrink inputs to fit within this many pixels per axis on load.
    #[arg(long, value_name = "PIXELS")]
    pub max_size: Option<u32>,

    /// Undo the last N steps before exporting.
    #[arg(long, default_value_t = 0, value_name = "N")]
    pub undo: usize,

    /// Print per-step statistics and timing.
    #[arg(short, long)]
    pub verbose: bool,

    /// Store the effective settings (after -q, --scale, --max-size) as the new defaults.
    #[arg(long)]
    pub save_settings: bool,
}

// ============================================================================
// BATCH DRIVER
// ============================================================================

/// Process every input. Exits non-zero if any file failed.
pub fn run(args: CliArgs, mut settings: Settings) -> ExitCode {
    if let Some(q) = args.quality {
        settings.export_quality = q;
    }
    if let Some(max) = args.max_size {
        if max == 0 {
            eprintln!("error: --max-size must be at least 1.");
            return ExitCode::FAILURE;
        }
        settings.max_load_dimension = max;
    }
    if let Some(scale) = args.scale {
        if !scale.is_finite() || scale <= 0.0 {
            eprintln!("error: --scale must be a positive number, got {}.", scale);
            return ExitCode::FAILURE;
        }
        settings.export_scale = scale;
    }

    if args.save_settings {
        match settings.save() {
            Ok(path) => {
                log_info!("Saved settings to {}", path.display());
                if args.verbose {
                    println!("settings saved to {}", path.display());
                }
            }
            Err(e) => {
                log_warn!("Could not save settings: {}", e);
                eprintln!("warning: could not save settings: {}", e);
            }
        }
    }

    let inputs = resolve_inputs(&args.input);
    let count = inputs.len();
    if count == 0 {
        eprintln!("error: no input files found.");
        return ExitCode::FAILURE;
    }
    if count > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!("error: -o names one file but {} inputs matched; use --output-dir for batches.", count);
        return ExitCode::FAILURE;
    }

    let save_format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(note) = quality_note(save_format, args.quality) {
        log_warn!("{}", note);
        eprintln!("warning: {}", note);
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let chatty = args.verbose || count > 1;
    let mut failed = 0usize;
    for (n, input) in inputs.iter().enumerate() {
        if chatty {
            println!("({}/{}) {}", n + 1, count, input.display());
        }
        let started = Instant::now();
        let outcome = build_output_path(input, args.output.as_deref(), args.output_dir.as_deref(), save_format)
            .ok_or_else(|| format!("no file name in '{}'", input.display()))
            .and_then(|output| run_one(input, &output, &args, &settings, save_format).map(|()| output));

        match outcome {
            Ok(output) => {
                log_info!("Wrote {}", output.display());
                if chatty {
                    println!("  saved {} in {} ms", output.display(), started.elapsed().as_millis());
                }
            }
            Err(e) => {
                log_err!("{}: {}", input.display(), e);
                eprintln!("  error: {}", e);
                failed += 1;
            }
        }
    }

    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        if count > 1 {
            eprintln!("{} of {} files failed.", failed, count);
        }
        ExitCode::FAILURE
    }
}

// ============================================================================
// ONE FILE: load, steps, undo, export
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    args: &CliArgs,
    settings: &Settings,
    format: SaveFormat,
) -> Result<(), String> {
    let loaded = load_image_sync(input, settings).map_err(|e| format!("load failed: {}", e))?;
    if args.verbose {
        println!(
            "  {} {}x{}, {}",
            loaded.format,
            loaded.source_width,
            loaded.source_height,
            format_file_size(loaded.size_bytes)
        );
    }
    let mut session = Session::from_buffer(loaded.name, loaded.buffer, settings.max_undo_steps);
    session.source_size_bytes = Some(loaded.size_bytes);

    let steps = if args.ops.is_empty() { default_pipeline(settings) } else { args.ops.clone() };
    for step in &steps {
        let op = step.resolve().map_err(|e| e.to_string())?;
        let before = args.verbose.then(|| session.buffer().clone());
        let handle = session.spawn(op).map_err(|e| e.to_string())?;
        let result = handle
            .wait()
            .ok_or_else(|| format!("{} did not finish", op.label()))?;
        let elapsed = result.elapsed;
        session.commit(result).map_err(|e| e.to_string())?;
        if let Some(before) = before {
            let stats = ProcessStats::measure(&before, session.buffer(), elapsed);
            println!("  {}: {}", op.label(), stats);
        }
    }

    for _ in 0..args.undo {
        session.undo().map_err(|e| format!("undo failed: {}", e))?;
        if args.verbose {
            println!("  undo → {}x{}", session.width(), session.height());
        }
    }

    let exported = session.export(settings.export_scale).map_err(|e| e.to_string())?;
    if exported.is_empty() {
        return Err(format!(
            "export scale {} leaves a {}x{} image",
            settings.export_scale,
            exported.width(),
            exported.height()
        ));
    }
    encode_and_write(&exported, output, format, settings.export_quality)
        .map_err(|e| format!("save failed: {}", e))?;

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Steps run when no `--op` is given.
fn default_pipeline(settings: &Settings) -> Vec<Step> {
    vec![
        Step::Align(settings.block_size),
        Step::Denoise(DenoiseParams {
            strength: settings.denoise_strength,
            tolerance: settings.color_tolerance,
            max_colors: settings.color_count,
        }),
    ]
}

/// Literal paths and glob matches, in order of first appearance, without repeats.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut seen: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let found: Vec<PathBuf> = if Path::new(pattern).exists() {
            vec![PathBuf::from(pattern)]
        } else {
            match glob::glob(pattern) {
                Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
                Err(e) => {
                    eprintln!("warning: '{}' is not a valid pattern: {}", pattern, e.msg);
                    continue;
                }
            }
        };
        if found.is_empty() {
            eprintln!("warning: nothing matches '{}'.", pattern);
        }
        for path in found {
            if !seen.contains(&path) {
                seen.push(path);
            }
        }
    }
    seen
}

/// `-q` only affects lossy output.
fn quality_note(format: SaveFormat, quality: Option<u8>) -> Option<String> {
    let q = quality?;
    (!format.supports_quality())
        .then(|| format!("quality {} ignored, {} output is lossless", q, format.extension()))
}

/// `--format` wins over the `-o` extension; PNG when neither says.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<SaveFormat, String> {
    if let Some(f) = format_arg {
        return SaveFormat::from_name(f)
            .ok_or_else(|| format!("unsupported format '{}' (png, jpeg, bmp, tga)", f));
    }

    if let Some(ext) = output.and_then(|o| o.extension()).and_then(|e| e.to_str()) {
        return SaveFormat::from_name(ext)
            .ok_or_else(|| format!("cannot write '.{}' files (png, jpeg, bmp, tga)", ext));
    }

    Ok(SaveFormat::Png)
}

/// Where one input's result goes. `--output` is taken as is; `--output-dir`
/// keeps the input stem; otherwise `<stem>_pixel.<ext>` lands beside the input.
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }
    let stem = input.file_stem()?.to_string_lossy();
    let (dir, suffix) = match output_dir {
        Some(dir) => (dir, ""),
        None => (input.parent().unwrap_or(Path::new(".")), "_pixel"),
    };
    Some(dir.join(format!("{}{}.{}", stem, suffix, format.extension())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pipeline_flags() {
        let args = CliArgs::try_parse_from([
            "pixelai", "-i", "a.png", "--op", "align:8", "--op", "downsample:4x3", "--undo", "1", "-q", "70",
        ])
        .unwrap();
        assert_eq!(args.ops, vec![Step::Align(8), Step::Downsample(4, 3)]);
        assert_eq!(args.undo, 1);
        assert_eq!(args.quality, Some(70));
        assert!(CliArgs::try_parse_from(["pixelai", "-i", "a.png", "--op", "blur:3"]).is_err());
        assert!(CliArgs::try_parse_from(["pixelai", "-i", "a.png", "-q", "0"]).is_err());
    }

    #[test]
    fn default_pipeline_follows_settings() {
        let settings = Settings { block_size: 4, color_count: 8, ..Settings::default() };
        assert_eq!(
            default_pipeline(&settings),
            vec![
                Step::Align(4),
                Step::Denoise(DenoiseParams { strength: 30, tolerance: 20, max_colors: 8 }),
            ]
        );
    }

    #[test]
    fn format_resolution() {
        assert_eq!(parse_format(None, None), Ok(SaveFormat::Png));
        assert_eq!(parse_format(Some("jpeg"), Some(Path::new("x.png"))), Ok(SaveFormat::Jpeg));
        assert_eq!(parse_format(None, Some(Path::new("x.TGA"))), Ok(SaveFormat::Tga));
        assert!(parse_format(None, Some(Path::new("x.webp"))).is_err());
        assert!(parse_format(Some("gif"), None).is_err());
    }

    #[test]
    fn quality_only_matters_for_jpeg() {
        assert_eq!(quality_note(SaveFormat::Jpeg, Some(70)), None);
        assert_eq!(quality_note(SaveFormat::Png, None), None);
        assert_eq!(
            quality_note(SaveFormat::Png, Some(70)).as_deref(),
            Some("quality 70 ignored, png output is lossless")
        );
        let args = CliArgs::try_parse_from(["pixelai", "-i", "a.png", "--save-settings"]).unwrap();
        assert!(args.save_settings);
    }

    #[test]
    fn inputs_expand_globs_without_repeats() {
        let dir = std::env::temp_dir().join(format!("pixelai-glob-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["b.png", "a.png", "notes.txt"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
        let a = dir.join("a.png");
        let patterns = [
            a.to_string_lossy().into_owned(),
            dir.join("*.png").to_string_lossy().into_owned(),
            dir.join("*.gif").to_string_lossy().into_owned(),
        ];
        assert_eq!(resolve_inputs(&patterns), vec![a, dir.join("b.png")]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn output_paths() {
        let input = Path::new("shots/cat.jpg");
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), SaveFormat::Png),
            Some(PathBuf::from("out/cat.png"))
        );
        assert_eq!(
            build_output_path(input, None, None, SaveFormat::Png),
            Some(PathBuf::from("shots/cat_pixel.png"))
        );
        assert_eq!(
            build_output_path(input, Some(Path::new("x.bmp")), None, SaveFormat::Bmp),
            Some(PathBuf::from("x.bmp"))
        );
    }

    #[test]
    fn end_to_end_pipeline_with_undo() {
        let dir = std::env::temp_dir().join(format!("pixelai-cli-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("in.png");
        let output = dir.join("out.png");
        let src = crate::canvas::PixelBuffer::new_filled(16, 8, image::Rgba([90, 120, 30, 255]));
        encode_and_write(&src, &input, SaveFormat::Png, 90).unwrap();

        let args = CliArgs::try_parse_from([
            "pixelai",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--op",
            "shrink:4",
            "--op",
            "align:2",
            "--undo",
            "1",
            "--scale",
            "2",
        ])
        .unwrap();
        assert_eq!(run(args, Settings::default()), ExitCode::SUCCESS);

        let written = image::open(&output).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (8, 4));
        assert_eq!(written.get_pixel(3, 2), &image::Rgba([90, 120, 30, 255]));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
