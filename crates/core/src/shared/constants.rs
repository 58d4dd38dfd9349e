pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;
pub const DEFAULT_FRAME_RATE: u32 = 30;
pub const DEFAULT_SLIDE_DURATION_SECS: f64 = 2.0;
pub const DEFAULT_CROSSFADE_DURATION_SECS: f64 = 0.5;
/// Longest accepted slide duration.
pub const MAX_SLIDE_DURATION_SECS: f64 = 3600.0;

/// Quality used when encoding frames to JPEG (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Fill color for canvas regions not covered by the scaled image.
pub const DEFAULT_BACKGROUND: [u8; 3] = [0, 0, 0];

pub const FRAME_FILE_PREFIX: &str = "frame_";
pub const FRAME_FILE_EXTENSION: &str = "jpg";
/// Zero-padding width of the frame index in sink file names.
pub const FRAME_INDEX_DIGITS: usize = 6;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tiff", "tif", "webp"];
