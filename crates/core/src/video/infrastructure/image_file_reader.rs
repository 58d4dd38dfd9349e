use std::path::Path;

use crate::shared::error::DecodeError;
use crate::shared::frame::Frame;
use crate::video::domain::image_reader::ImageReader;

/// Decodes still images with the `image` crate.
///
/// Any supported format is accepted; the result is always 8-bit RGB, with
/// alpha dropped and wider sample depths reduced.
pub struct ImageFileReader;

impl ImageFileReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageReader for ImageFileReader {
    fn read(&self, path: &Path, index: usize) -> Result<Frame, DecodeError> {
        let decoded = image::open(path).map_err(|e| match e {
            image::ImageError::IoError(source) => DecodeError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => DecodeError::Image {
                path: path.to_path_buf(),
                source: other,
            },
        })?;

        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(DecodeError::Empty {
                path: path.to_path_buf(),
            });
        }

        Ok(Frame::from_rgb_image(decoded.to_rgb8(), index))
    }
}
