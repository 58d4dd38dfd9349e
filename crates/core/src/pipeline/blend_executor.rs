use std::ops::ControlFlow;
use std::sync::atomic::AtomicBool;

use crate::shared::error::SlideshowError;
use crate::shared::frame::Frame;

/// How a batch of transition frames ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFlow {
    Completed,
    Cancelled,
}

/// Produces the frame for one transition offset.
pub type BlendJob<'a> = dyn Fn(usize) -> Result<Frame, SlideshowError> + Sync + 'a;

/// Receives a finished transition frame by offset. `Break` stops the batch.
pub type BlendEmit<'a> =
    dyn FnMut(usize, Frame) -> Result<ControlFlow<()>, SlideshowError> + 'a;

/// Abstracts how the transition frames of one slide boundary are computed.
///
/// Jobs are independent pure blends and may run in any order, but
/// implementations must call `emit` with offsets `0..count` in ascending
/// order, each exactly once, on the calling thread. Cancellation is
/// cooperative: once `cancelled` is set, or `emit` returns `Break`, no
/// further frame is emitted and `BlendFlow::Cancelled` is returned.
pub trait BlendExecutor: Send + Sync {
    fn run(
        &self,
        count: usize,
        job: &BlendJob<'_>,
        cancelled: &AtomicBool,
        emit: &mut BlendEmit<'_>,
    ) -> Result<BlendFlow, SlideshowError>;
}
