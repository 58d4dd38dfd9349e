use std::path::Path;

use crate::shared::error::DecodeError;
use crate::shared::frame::Frame;

/// Decodes one source image into an RGB [`Frame`].
pub trait ImageReader: Send {
    /// Reads the image at `path`; `index` is its position in the input list.
    fn read(&self, path: &Path, index: usize) -> Result<Frame, DecodeError>;
}
