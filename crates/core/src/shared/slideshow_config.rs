use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_BACKGROUND, DEFAULT_CROSSFADE_DURATION_SECS, DEFAULT_FRAME_RATE, DEFAULT_HEIGHT,
    DEFAULT_JPEG_QUALITY, DEFAULT_SLIDE_DURATION_SECS, DEFAULT_WIDTH, MAX_SLIDE_DURATION_SECS,
};

/// Settings for one slideshow run.
///
/// Every field has a serde default so partial JSON files deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideshowConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub slide_duration_secs: f64,
    pub crossfade_duration_secs: f64,
    pub jpeg_quality: u8,
    pub background: [u8; 3],
    pub workers: usize,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            frame_rate: DEFAULT_FRAME_RATE,
            slide_duration_secs: DEFAULT_SLIDE_DURATION_SECS,
            crossfade_duration_secs: DEFAULT_CROSSFADE_DURATION_SECS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            background: DEFAULT_BACKGROUND,
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// A configuration value that was rejected and replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl SlideshowConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Returns a copy with invalid values corrected, plus one warning per
    /// correction. Never fails.
    pub fn sanitized(&self) -> (Self, Vec<ConfigWarning>) {
        let defaults = Self::default();
        let mut cfg = self.clone();
        let mut warnings = Vec::new();

        if cfg.width == 0 {
            warnings.push(replaced("width", cfg.width, defaults.width));
            cfg.width = defaults.width;
        } else if cfg.width % 2 != 0 {
            let even = (cfg.width - 1).max(2);
            warnings.push(replaced("width", cfg.width, even));
            cfg.width = even;
        }

        if cfg.height == 0 {
            warnings.push(replaced("height", cfg.height, defaults.height));
            cfg.height = defaults.height;
        } else if cfg.height % 2 != 0 {
            let even = (cfg.height - 1).max(2);
            warnings.push(replaced("height", cfg.height, even));
            cfg.height = even;
        }

        if cfg.frame_rate == 0 {
            warnings.push(replaced("frame_rate", cfg.frame_rate, defaults.frame_rate));
            cfg.frame_rate = defaults.frame_rate;
        }

        if !cfg.slide_duration_secs.is_finite() || cfg.slide_duration_secs <= 0.0 {
            warnings.push(replaced(
                "slide_duration_secs",
                cfg.slide_duration_secs,
                defaults.slide_duration_secs,
            ));
            cfg.slide_duration_secs = defaults.slide_duration_secs;
        } else if cfg.slide_duration_secs > MAX_SLIDE_DURATION_SECS {
            warnings.push(replaced(
                "slide_duration_secs",
                cfg.slide_duration_secs,
                MAX_SLIDE_DURATION_SECS,
            ));
            cfg.slide_duration_secs = MAX_SLIDE_DURATION_SECS;
        }

        if !cfg.crossfade_duration_secs.is_finite() || cfg.crossfade_duration_secs < 0.0 {
            warnings.push(replaced(
                "crossfade_duration_secs",
                cfg.crossfade_duration_secs,
                defaults.crossfade_duration_secs,
            ));
            cfg.crossfade_duration_secs = defaults.crossfade_duration_secs;
        }

        // Crossfade must leave at least one normal frame per slide.
        let frames_per_slide = seconds_to_frames(cfg.slide_duration_secs, cfg.frame_rate).max(1);
        let max_crossfade_frames = frames_per_slide - 1;
        if seconds_to_frames(cfg.crossfade_duration_secs, cfg.frame_rate) > max_crossfade_frames {
            let clamped = max_crossfade_frames as f64 / cfg.frame_rate as f64;
            warnings.push(replaced(
                "crossfade_duration_secs",
                cfg.crossfade_duration_secs,
                clamped,
            ));
            cfg.crossfade_duration_secs = clamped;
        }

        if !(1..=100).contains(&cfg.jpeg_quality) {
            let clamped = cfg.jpeg_quality.clamp(1, 100);
            warnings.push(replaced("jpeg_quality", cfg.jpeg_quality, clamped));
            cfg.jpeg_quality = clamped;
        }

        if cfg.workers == 0 {
            warnings.push(replaced("workers", cfg.workers, 1));
            cfg.workers = 1;
        }

        (cfg, warnings)
    }

    /// Sanitizes and logs every correction with `log::warn!`.
    pub fn sanitized_logged(&self) -> Self {
        let (cfg, warnings) = self.sanitized();
        for w in &warnings {
            log::warn!("Invalid configuration, {w}");
        }
        cfg
    }
}

/// Converts a duration to a whole number of frames, rounding to nearest.
pub fn seconds_to_frames(seconds: f64, frame_rate: u32) -> usize {
    let frames = (seconds * frame_rate as f64).round();
    if frames.is_finite() && frames > 0.0 {
        frames as usize
    } else {
        0
    }
}

fn replaced<T: fmt::Display, U: fmt::Display>(
    field: &'static str,
    rejected: T,
    replacement: U,
) -> ConfigWarning {
    ConfigWarning {
        field,
        message: format!("{rejected} replaced with {replacement}"),
    }
}
