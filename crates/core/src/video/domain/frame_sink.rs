use std::path::PathBuf;

use crate::shared::error::SinkError;
use crate::shared::frame::Frame;

/// Destination for output frames, addressed by frame index.
///
/// Frames may arrive in any order; the sink materializes them so that a
/// reader walking indices in ascending order sees a gapless sequence.
pub trait FrameSink: Send {
    /// Makes the sink ready for a fresh run, discarding frames left over
    /// from an earlier run at the same location.
    fn prepare(&mut self) -> Result<(), SinkError>;

    fn write_frame(&mut self, index: usize, frame: &Frame) -> Result<(), SinkError>;

    /// Stores frame `index` as a copy of the already written `source_index`,
    /// without encoding the pixels again.
    fn repeat_frame(&mut self, source_index: usize, index: usize) -> Result<(), SinkError>;

    fn frames_written(&self) -> usize;

    /// printf-style path pattern an encoder uses to read the frames back.
    fn frame_pattern(&self) -> PathBuf;

    /// Removes everything the sink produced. Safe to call more than once.
    fn cleanup(&mut self) -> Result<(), SinkError>;
}
