use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::shared::error::SlideshowError;
use crate::shared::slideshow_config::SlideshowConfig;
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::image_reader::ImageReader;
use crate::video::domain::video_encoder::{EncodeRequest, EncodeStatus, VideoEncoder};
use crate::video::infrastructure::directory_frame_sink::DirectoryFrameSink;

use super::blend_executor::BlendExecutor;
use super::pipeline_logger::PipelineLogger;
use super::sequence_synthesizer::{
    ProgressCallback, SequenceSynthesizer, SynthesisOutcome, SynthesisReport,
};

/// How a slideshow run ended when nothing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed {
        output: PathBuf,
        report: SynthesisReport,
    },
    /// Stopped on request. No frames and no output file are left behind.
    Cancelled,
}

/// Orchestrates a full run: decode → synthesize → encode → clean up.
///
/// Frames go to a scratch directory (or an injected sink) that is removed
/// on every exit path. This is a single-use struct: `execute` consumes the
/// owned components, so calling it twice fails with
/// [`SlideshowError::AlreadyExecuted`].
pub struct CreateSlideshowUseCase {
    reader: Option<Box<dyn ImageReader>>,
    encoder: Option<Box<dyn VideoEncoder>>,
    executor: Option<Box<dyn BlendExecutor>>,
    logger: Option<Box<dyn PipelineLogger>>,
    sink: Option<Box<dyn FrameSink>>,
    config: SlideshowConfig,
    scratch_parent: Option<PathBuf>,
    on_progress: Option<ProgressCallback>,
    cancelled: Arc<AtomicBool>,
}

impl CreateSlideshowUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Box<dyn ImageReader>,
        encoder: Box<dyn VideoEncoder>,
        executor: Box<dyn BlendExecutor>,
        logger: Box<dyn PipelineLogger>,
        config: SlideshowConfig,
        sink: Option<Box<dyn FrameSink>>,
        on_progress: Option<ProgressCallback>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            reader: Some(reader),
            encoder: Some(encoder),
            executor: Some(executor),
            logger: Some(logger),
            sink,
            config,
            scratch_parent: None,
            on_progress,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    /// Places the default scratch directory under `dir` instead of the
    /// system temp location.
    pub fn with_scratch_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_parent = Some(dir.into());
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn execute(
        &mut self,
        inputs: &[PathBuf],
        output: &Path,
    ) -> Result<RunOutcome, SlideshowError> {
        let reader = self.reader.take().ok_or(SlideshowError::AlreadyExecuted)?;
        let encoder = self.encoder.take().ok_or(SlideshowError::AlreadyExecuted)?;
        let executor = self.executor.take().ok_or(SlideshowError::AlreadyExecuted)?;
        let logger = self.logger.take().ok_or(SlideshowError::AlreadyExecuted)?;

        let config = self.config.sanitized_logged();
        log::info!(
            "Creating slideshow from {} images into {} ({}x{} @ {} fps)",
            inputs.len(),
            output.display(),
            config.width,
            config.height,
            config.frame_rate
        );

        let mut sink: Box<dyn FrameSink> = match self.sink.take() {
            Some(sink) => sink,
            None => Box::new(
                DirectoryFrameSink::in_scratch_dir(
                    self.scratch_parent.as_deref(),
                    config.width,
                    config.height,
                )
                .map_err(SlideshowError::Scratch)?
                .with_quality(config.jpeg_quality),
            ),
        };

        let mut synthesizer =
            SequenceSynthesizer::new(config.clone(), executor, logger, self.on_progress.take());

        let result = run(
            &mut synthesizer,
            reader.as_ref(),
            encoder.as_ref(),
            sink.as_mut(),
            &config,
            inputs,
            output,
            &self.cancelled,
        );

        synthesizer.logger().summary();

        if let Err(e) = sink.cleanup() {
            log::warn!("{e}");
        }

        match &result {
            Ok(RunOutcome::Completed { output, report }) => log::info!(
                "Wrote {} ({} frames, {} images, {} skipped)",
                output.display(),
                report.total_frames,
                report.slides,
                report.skipped
            ),
            Ok(RunOutcome::Cancelled) => log::info!("Slideshow cancelled"),
            Err(e) => log::error!("Slideshow failed during {}: {e}", e.stage()),
        }
        result
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    synthesizer: &mut SequenceSynthesizer,
    reader: &dyn ImageReader,
    encoder: &dyn VideoEncoder,
    sink: &mut dyn FrameSink,
    config: &SlideshowConfig,
    inputs: &[PathBuf],
    output: &Path,
    cancelled: &AtomicBool,
) -> Result<RunOutcome, SlideshowError> {
    sink.prepare()?;

    let images = inputs
        .iter()
        .enumerate()
        .map(|(index, path)| reader.read(path, index));

    let report = match synthesizer.synthesize(images, sink, cancelled)? {
        SynthesisOutcome::Completed(report) => report,
        SynthesisOutcome::Cancelled { .. } => return Ok(RunOutcome::Cancelled),
    };
    if report.slides == 0 {
        return Err(SlideshowError::NoImages {
            attempted: inputs.len(),
        });
    }

    let request = EncodeRequest {
        frame_pattern: sink.frame_pattern(),
        frame_rate: config.frame_rate,
        width: config.width,
        height: config.height,
        output: output.to_path_buf(),
    };
    log::info!("Encoding {} frames", sink.frames_written());

    match encoder.encode(&request, cancelled)? {
        EncodeStatus::Finished => Ok(RunOutcome::Completed {
            output: request.output,
            report,
        }),
        EncodeStatus::Cancelled => Ok(RunOutcome::Cancelled),
    }
}
