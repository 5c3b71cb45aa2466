// ============================================================================
// SETTINGS — default processing parameters, persisted as key=value text
// ============================================================================

use std::path::{Path, PathBuf};

use crate::components::history::DEFAULT_HISTORY_DEPTH;

/// Processing defaults that persist across runs.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Grid size for align / shrink, in source pixels.
    pub block_size: u32,
    /// Denoise blur strength, 0-100.
    pub denoise_strength: u32,
    /// Colour match tolerance, 0-100.
    pub color_tolerance: u32,
    /// Palette cap for quantization.
    pub color_count: u32,
    /// Maximum number of undo steps.
    pub max_undo_steps: usize,
    /// Loaded images are shrunk to fit this box (per axis).
    pub max_load_dimension: u32,
    /// Largest accepted input file.
    pub max_file_bytes: u64,
    /// Export resample factor.
    pub export_scale: f64,
    /// JPEG quality (1-100).
    pub export_quality: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            block_size: 8,
            denoise_strength: 30,
            color_tolerance: 20,
            color_count: 16,
            max_undo_steps: DEFAULT_HISTORY_DEPTH,
            max_load_dimension: 600,
            max_file_bytes: 10 * 1024 * 1024,
            export_scale: 1.0,
            export_quality: 90,
        }
    }
}

impl Settings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/pixelai/pixelai_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PixelAI\pixelai_settings.cfg
    /// On macOS:   ~/Library/Application Support/PixelAI/pixelai_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("PixelAI").join("pixelai_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("PixelAI")
                    .join("pixelai_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("pixelai").join("pixelai_settings.cfg"))
        }
    }

    /// Load settings from disk (defaults if the file is missing or unreadable).
    pub fn load() -> Self {
        Self::settings_path().map(|p| Self::load_from(&p)).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path).map(|c| Self::parse(&c)).unwrap_or_default()
    }

    /// Save settings to the platform settings file. Returns the path written.
    pub fn save(&self) -> std::io::Result<PathBuf> {
        let path = Self::settings_path()
            .ok_or_else(|| std::io::Error::other("no settings directory for this platform"))?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Parse `key=value` lines. Unknown keys and bad values are skipped.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "block_size" => set_parsed(&mut s.block_size, val, |v: &u32| *v >= 1),
                "denoise_strength" => set_parsed(&mut s.denoise_strength, val, |v: &u32| *v <= 100),
                "color_tolerance" => set_parsed(&mut s.color_tolerance, val, |v: &u32| *v <= 100),
                "color_count" => set_parsed(&mut s.color_count, val, |v: &u32| *v >= 1),
                "max_undo_steps" => set_parsed(&mut s.max_undo_steps, val, |v: &usize| *v >= 1),
                "max_load_dimension" => set_parsed(&mut s.max_load_dimension, val, |v: &u32| *v >= 1),
                "max_file_bytes" => set_parsed(&mut s.max_file_bytes, val, |v: &u64| *v >= 1),
                "export_scale" => {
                    set_parsed(&mut s.export_scale, val, |v: &f64| v.is_finite() && *v > 0.0)
                }
                "export_quality" => {
                    set_parsed(&mut s.export_quality, val, |v: &u8| (1..=100).contains(v))
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "block_size={}\n\
             denoise_strength={}\n\
             color_tolerance={}\n\
             color_count={}\n\
             max_undo_steps={}\n\
             max_load_dimension={}\n\
             max_file_bytes={}\n\
             export_scale={}\n\
             export_quality={}\n",
            self.block_size,
            self.denoise_strength,
            self.color_tolerance,
            self.color_count,
            self.max_undo_steps,
            self.max_load_dimension,
            self.max_file_bytes,
            self.export_scale,
            self.export_quality,
        )
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, val: &str, valid: impl Fn(&T) -> bool) {
    if let Ok(v) = val.parse::<T>()
        && valid(&v)
    {
        *slot = v;
    }
}
