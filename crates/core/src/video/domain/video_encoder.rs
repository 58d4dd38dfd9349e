use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use crate::shared::error::EncodeError;

/// Everything an encoder needs to turn a numbered frame sequence into a video.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    pub frame_pattern: PathBuf,
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStatus {
    Finished,
    Cancelled,
}

/// Abstracts the external video encoder.
///
/// Implementations must not leave a partial output file behind when they
/// fail or are cancelled.
pub trait VideoEncoder: Send {
    fn encode(
        &self,
        request: &EncodeRequest,
        cancelled: &AtomicBool,
    ) -> Result<EncodeStatus, EncodeError>;
}
