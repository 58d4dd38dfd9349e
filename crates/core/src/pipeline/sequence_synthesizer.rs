use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::compositing::domain::canvas_fitter::fit_to_canvas;
use crate::compositing::domain::color_normalizer::normalize_colors;
use crate::compositing::domain::transition_blender::{blend_frames, transition_ratio};
use crate::shared::error::{DecodeError, SlideshowError};
use crate::shared::frame::Frame;
use crate::shared::slideshow_config::SlideshowConfig;
use crate::video::domain::frame_sink::FrameSink;

use super::blend_executor::{BlendExecutor, BlendFlow};
use super::frame_timeline::{FrameTiming, SlideSpan};
use super::infrastructure::threaded_blend_executor::ThreadedBlendExecutor;
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};

/// Progress callback: `(frames_emitted, expected_total) -> keep_going`.
pub type ProgressCallback = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Lifecycle of one input image. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SlideState {
    Loading,
    Normalized,
    Fitted,
    EmittingNormal,
    EmittingTransition,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisReport {
    /// Images that made it into the sequence.
    pub slides: usize,
    /// Images that failed to decode and were left out.
    pub skipped: usize,
    pub total_frames: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisOutcome {
    Completed(SynthesisReport),
    Cancelled { frames_emitted: usize },
}

struct Slide {
    number: usize,
    canvas: Frame,
    state: SlideState,
}

impl Slide {
    fn advance(&mut self, next: SlideState) {
        debug_assert!(next > self.state, "slide state moved backwards");
        log::debug!("Slide {}: {:?} -> {:?}", self.number, self.state, next);
        self.state = next;
    }
}

/// Serializes everything that reaches the sink and owns the gapless index
/// check.
struct FrameEmitter<'a> {
    sink: &'a mut dyn FrameSink,
    cancelled: &'a AtomicBool,
    logger: &'a mut dyn PipelineLogger,
    on_progress: Option<&'a ProgressCallback>,
    emitted: usize,
    expected_total: usize,
}

impl FrameEmitter<'_> {
    fn write(&mut self, index: usize, frame: &Frame) -> Result<ControlFlow<()>, SlideshowError> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Ok(ControlFlow::Break(()));
        }
        debug_assert_eq!(index, self.emitted, "frame index out of sequence");
        self.sink.write_frame(index, frame)?;
        Ok(self.after_emit())
    }

    fn repeat(
        &mut self,
        source_index: usize,
        index: usize,
    ) -> Result<ControlFlow<()>, SlideshowError> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Ok(ControlFlow::Break(()));
        }
        debug_assert_eq!(index, self.emitted, "frame index out of sequence");
        self.sink.repeat_frame(source_index, index)?;
        Ok(self.after_emit())
    }

    fn after_emit(&mut self) -> ControlFlow<()> {
        self.emitted += 1;
        let total = self.expected_total.max(self.emitted);
        self.logger.progress(self.emitted, total);
        if let Some(cb) = self.on_progress {
            if !cb(self.emitted, total) {
                self.cancelled.store(true, Ordering::Relaxed);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// The first frame of the span is encoded, the rest reuse its output.
    fn emit_normal(
        &mut self,
        canvas: &Frame,
        span: &SlideSpan,
    ) -> Result<ControlFlow<()>, SlideshowError> {
        let mut indices = span.normal.clone();
        let Some(first) = indices.next() else {
            return Ok(ControlFlow::Continue(()));
        };
        if self.write(first, canvas)?.is_break() {
            return Ok(ControlFlow::Break(()));
        }
        for index in indices {
            if self.repeat(first, index)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}

/// Builds the output frame sequence from an ordered stream of decoded
/// images.
///
/// Each successfully decoded image becomes one slide of
/// `frames_per_slide` frames. A slide followed by another one ends with a
/// linear crossfade into the next canvas; the last slide has none. Decode
/// failures are logged and skipped, so the crossfade runs between the
/// neighbouring images that did decode.
///
/// At most two canvases are alive at a time: the slide being emitted and
/// the one it fades into. Transition frames are blended through the
/// [`BlendExecutor`], which hands them back in index order.
pub struct SequenceSynthesizer {
    config: SlideshowConfig,
    timing: FrameTiming,
    executor: Box<dyn BlendExecutor>,
    logger: Box<dyn PipelineLogger>,
    on_progress: Option<ProgressCallback>,
}

impl SequenceSynthesizer {
    pub fn new(
        config: SlideshowConfig,
        executor: Box<dyn BlendExecutor>,
        logger: Box<dyn PipelineLogger>,
        on_progress: Option<ProgressCallback>,
    ) -> Self {
        let timing = FrameTiming::from_config(&config);
        Self {
            config,
            timing,
            executor,
            logger,
            on_progress,
        }
    }

    pub fn timing(&self) -> FrameTiming {
        self.timing
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger.as_ref()
    }

    /// Consumes `images` lazily and writes every frame to `sink`.
    ///
    /// Checks `cancelled` at every image and every frame. A progress
    /// callback returning `false` sets the flag. Sink failures abort the
    /// run; the sink is left as is for the caller to clean up.
    pub fn synthesize<I>(
        &mut self,
        images: I,
        sink: &mut dyn FrameSink,
        cancelled: &AtomicBool,
    ) -> Result<SynthesisOutcome, SlideshowError>
    where
        I: IntoIterator<Item = Result<Frame, DecodeError>>,
    {
        let images = images.into_iter();
        let expected_images = images.size_hint().0;
        let timing = self.timing;
        log::info!(
            "Synthesizing {expected_images} images at {} fps: {} frames per slide, {} crossfade frames",
            self.config.frame_rate,
            timing.frames_per_slide,
            timing.crossfade_frames
        );

        let config = &self.config;
        let executor: &dyn BlendExecutor = &*self.executor;

        let mut emitter = FrameEmitter {
            sink,
            cancelled,
            logger: &mut *self.logger,
            on_progress: self.on_progress.as_ref(),
            emitted: 0,
            expected_total: timing.total_frames(expected_images),
        };

        let mut skipped = 0;
        let mut slides = 0;
        let mut previous: Option<Slide> = None;

        for (position, item) in images.enumerate() {
            if cancelled.load(Ordering::Relaxed) {
                return Ok(cancelled_outcome(&emitter));
            }

            let mut slide = match load_slide(item, position, slides, config) {
                Some((slide, prepare_ms)) => {
                    emitter.logger.timing("prepare", prepare_ms);
                    slide
                }
                None => {
                    skipped += 1;
                    emitter.logger.metric("skipped_images", skipped as f64);
                    emitter.expected_total =
                        timing.total_frames(expected_images.saturating_sub(skipped));
                    continue;
                }
            };

            if let Some(mut outgoing) = previous.take() {
                let flow = emit_slide(
                    &mut emitter,
                    executor,
                    timing,
                    &mut outgoing,
                    Some(&slide.canvas),
                )?;
                if flow.is_break() {
                    return Ok(cancelled_outcome(&emitter));
                }
            }

            if cancelled.load(Ordering::Relaxed) {
                return Ok(cancelled_outcome(&emitter));
            }
            slides += 1;
            previous = Some(slide);
        }

        if let Some(mut last) = previous.take() {
            let flow = emit_slide(&mut emitter, executor, timing, &mut last, None)?;
            if flow.is_break() {
                return Ok(cancelled_outcome(&emitter));
            }
        }

        let report = SynthesisReport {
            slides,
            skipped,
            total_frames: emitter.emitted,
        };
        debug_assert_eq!(report.total_frames, timing.total_frames(slides));
        emitter.logger.info(&format!(
            "Synthesized {} frames from {} images ({} skipped)",
            report.total_frames, report.slides, report.skipped
        ));
        Ok(SynthesisOutcome::Completed(report))
    }
}

fn cancelled_outcome(emitter: &FrameEmitter<'_>) -> SynthesisOutcome {
    log::info!("Synthesis cancelled after {} frames", emitter.emitted);
    SynthesisOutcome::Cancelled {
        frames_emitted: emitter.emitted,
    }
}

/// Decodes and prepares one input. Returns `None` for images to skip.
fn load_slide(
    item: Result<Frame, DecodeError>,
    position: usize,
    number: usize,
    config: &SlideshowConfig,
) -> Option<(Slide, f64)> {
    let source = match item {
        Ok(frame) => frame,
        Err(e) => {
            log::warn!("Skipping image {position}: {e}");
            return None;
        }
    };
    if source.is_empty() {
        log::warn!("Skipping image {position}: no pixels");
        return None;
    }

    let start = Instant::now();
    let mut slide = Slide {
        number,
        canvas: source,
        state: SlideState::Loading,
    };
    // Each assignment drops the previous buffer.
    slide.canvas = normalize_colors(&slide.canvas);
    slide.advance(SlideState::Normalized);
    slide.canvas = fit_to_canvas(&slide.canvas, config.width, config.height, config.background);
    slide.advance(SlideState::Fitted);

    Some((slide, start.elapsed().as_secs_f64() * 1000.0))
}

/// Emits one whole slide: its normal span and, when `next` is given, the
/// crossfade into `next`.
fn emit_slide(
    emitter: &mut FrameEmitter<'_>,
    executor: &dyn BlendExecutor,
    timing: FrameTiming,
    slide: &mut Slide,
    next: Option<&Frame>,
) -> Result<ControlFlow<()>, SlideshowError> {
    let span = timing.span(slide.number, next.is_none());

    slide.advance(SlideState::EmittingNormal);
    let start = Instant::now();
    if emitter.emit_normal(&slide.canvas, &span)?.is_break() {
        return Ok(ControlFlow::Break(()));
    }
    emitter.logger.timing("normal", start.elapsed().as_secs_f64() * 1000.0);

    if let Some(next) = next {
        slide.advance(SlideState::EmittingTransition);
        let start = Instant::now();
        let from = &slide.canvas;
        let count = span.transition.len();
        let base = span.transition.start;

        let cancelled = emitter.cancelled;
        let job = |offset: usize| {
            blend_frames(from, next, transition_ratio(offset, count)).ok_or_else(|| {
                SlideshowError::Worker(format!(
                    "canvas size mismatch at transition frame {}",
                    base + offset
                ))
            })
        };
        let flow = executor.run(count, &job, cancelled, &mut |offset, frame| {
            emitter.write(base + offset, &frame)
        })?;
        if flow == BlendFlow::Cancelled || cancelled.load(Ordering::Relaxed) {
            return Ok(ControlFlow::Break(()));
        }
        emitter
            .logger
            .timing("transition", start.elapsed().as_secs_f64() * 1000.0);
    }

    slide.advance(SlideState::Done);
    Ok(ControlFlow::Continue(()))
}

/// Runs a whole sequence with the default worker pool and no progress
/// reporting.
pub fn synthesize_sequence<I>(
    images: I,
    config: &SlideshowConfig,
    sink: &mut dyn FrameSink,
    cancelled: &AtomicBool,
) -> Result<SynthesisOutcome, SlideshowError>
where
    I: IntoIterator<Item = Result<Frame, DecodeError>>,
{
    let mut synthesizer = SequenceSynthesizer::new(
        config.clone(),
        Box::new(ThreadedBlendExecutor::new(config.workers)),
        Box::new(NullPipelineLogger),
        None,
    );
    synthesizer.synthesize(images, sink, cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::SinkError;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Records frames in memory, keyed by index.
    #[derive(Default)]
    struct MemorySink {
        frames: BTreeMap<usize, Frame>,
        order: Vec<usize>,
        repeats: usize,
        fail_at: Option<usize>,
    }

    impl FrameSink for MemorySink {
        fn prepare(&mut self) -> Result<(), SinkError> {
            self.frames.clear();
            Ok(())
        }

        fn write_frame(&mut self, index: usize, frame: &Frame) -> Result<(), SinkError> {
            if self.fail_at == Some(index) {
                return Err(SinkError::Write {
                    index,
                    source: Box::new(std::io::Error::other("disk full")),
                });
            }
            self.frames.insert(index, frame.clone());
            self.order.push(index);
            Ok(())
        }

        fn repeat_frame(&mut self, source_index: usize, index: usize) -> Result<(), SinkError> {
            let frame = self.frames[&source_index].clone();
            self.frames.insert(index, frame);
            self.order.push(index);
            self.repeats += 1;
            Ok(())
        }

        fn frames_written(&self) -> usize {
            self.frames.len()
        }

        fn frame_pattern(&self) -> PathBuf {
            PathBuf::from("memory_%06d")
        }

        fn cleanup(&mut self) -> Result<(), SinkError> {
            self.frames.clear();
            Ok(())
        }
    }

    const W: u32 = 16;
    const H: u32 = 10;

    /// 10 fps, 1 s slides, 0.3 s crossfade: 10 frames per slide, 3 blended.
    fn config() -> SlideshowConfig {
        SlideshowConfig {
            width: W,
            height: H,
            frame_rate: 10,
            slide_duration_secs: 1.0,
            crossfade_duration_secs: 0.3,
            workers: 3,
            ..SlideshowConfig::default()
        }
    }

    // Neutral gray sources pass through normalization unchanged.
    fn gray(level: u8, index: usize) -> Result<Frame, DecodeError> {
        Ok(Frame::filled(W, H, [level, level, level], index))
    }

    fn decode_failure(name: &str) -> Result<Frame, DecodeError> {
        Err(DecodeError::Empty {
            path: PathBuf::from(name),
        })
    }

    fn run(
        images: Vec<Result<Frame, DecodeError>>,
        sink: &mut MemorySink,
    ) -> Result<SynthesisOutcome, SlideshowError> {
        synthesize_sequence(images, &config(), sink, &AtomicBool::new(false))
    }

    fn completed(outcome: SynthesisOutcome) -> SynthesisReport {
        match outcome {
            SynthesisOutcome::Completed(report) => report,
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_loaded_slide_is_fitted_to_canvas() {
        let cfg = config();
        let (slide, _) =
            load_slide(Ok(Frame::filled(30, 15, [200, 100, 50], 0)), 0, 3, &cfg).unwrap();
        assert_eq!((slide.canvas.width(), slide.canvas.height()), (W, H));
        assert_eq!(slide.state, SlideState::Fitted);
        assert_eq!(slide.number, 3);
    }

    #[test]
    fn test_load_slide_skips_decode_failure() {
        let item = Err(DecodeError::Empty {
            path: PathBuf::from("broken.jpg"),
        });
        assert!(load_slide(item, 0, 0, &config()).is_none());
    }

    #[test]
    fn test_frame_count_per_slide() {
        let mut sink = MemorySink::default();
        let report = completed(run(vec![gray(10, 0), gray(20, 1), gray(30, 2)], &mut sink).unwrap());
        assert_eq!(report.slides, 3);
        assert_eq!(report.total_frames, 30);
        assert_eq!(sink.frames.len(), 30);
    }

    #[test]
    fn test_indices_are_gapless_and_ascending() {
        let mut sink = MemorySink::default();
        completed(run((0..5).map(|i| gray(i as u8 * 40, i)).collect(), &mut sink).unwrap());
        assert_eq!(sink.order, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_slide_layout_normal_then_transition() {
        let mut sink = MemorySink::default();
        completed(run(vec![gray(0, 0), gray(240, 1)], &mut sink).unwrap());

        // Slide 0: 7 normal frames at 0, then 3 blended frames.
        for i in 0..7 {
            assert_eq!(sink.frames[&i].pixel(0, 0), [0, 0, 0]);
        }
        assert_eq!(sink.frames[&7].pixel(0, 0), [80, 80, 80]);
        assert_eq!(sink.frames[&8].pixel(0, 0), [160, 160, 160]);
        // The last transition frame equals the next canvas.
        assert_eq!(sink.frames[&9].pixel(0, 0), [240, 240, 240]);
        // Last slide: 10 normal frames, no transition.
        for i in 10..20 {
            assert_eq!(sink.frames[&i].pixel(0, 0), [240, 240, 240]);
        }
    }

    #[test]
    fn test_first_transition_frame_differs_from_source() {
        let mut sink = MemorySink::default();
        completed(run(vec![gray(0, 0), gray(240, 1)], &mut sink).unwrap());
        assert_ne!(sink.frames[&7], sink.frames[&6]);
    }

    #[test]
    fn test_normal_frames_are_repeated_not_reencoded() {
        let mut sink = MemorySink::default();
        completed(run(vec![gray(10, 0), gray(20, 1)], &mut sink).unwrap());
        // 6 repeats after slide 0's first frame, 9 after slide 1's.
        assert_eq!(sink.repeats, 15);
    }

    #[test]
    fn test_single_image_has_no_transition() {
        let mut sink = MemorySink::default();
        let report = completed(run(vec![gray(50, 0)], &mut sink).unwrap());
        assert_eq!(report.total_frames, 10);
        assert!(sink.frames.values().all(|f| f.pixel(0, 0) == [50, 50, 50]));
    }

    #[test]
    fn test_decode_failures_are_skipped() {
        let mut sink = MemorySink::default();
        let report = completed(
            run(
                vec![gray(0, 0), decode_failure("b.jpg"), gray(240, 2)],
                &mut sink,
            )
            .unwrap(),
        );
        assert_eq!(report.slides, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.total_frames, 20);
        // The fade runs straight from the first to the third image.
        assert_eq!(sink.frames[&9].pixel(0, 0), [240, 240, 240]);
        assert_eq!(sink.order, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_source_is_skipped() {
        let mut sink = MemorySink::default();
        let report = completed(
            run(vec![Ok(Frame::filled(0, 0, [0, 0, 0], 0)), gray(5, 1)], &mut sink).unwrap(),
        );
        assert_eq!(report.slides, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_all_failures_emit_nothing() {
        let mut sink = MemorySink::default();
        let report = completed(
            run(vec![decode_failure("a"), decode_failure("b")], &mut sink).unwrap(),
        );
        assert_eq!(report.slides, 0);
        assert_eq!(report.total_frames, 0);
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn test_zero_crossfade_hard_cuts() {
        let mut sink = MemorySink::default();
        let cfg = SlideshowConfig {
            crossfade_duration_secs: 0.0,
            ..config()
        };
        let outcome = synthesize_sequence(
            vec![gray(0, 0), gray(200, 1)],
            &cfg,
            &mut sink,
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(completed(outcome).total_frames, 20);
        assert_eq!(sink.frames[&9].pixel(0, 0), [0, 0, 0]);
        assert_eq!(sink.frames[&10].pixel(0, 0), [200, 200, 200]);
    }

    #[test]
    fn test_oversized_crossfade_is_clamped() {
        let mut sink = MemorySink::default();
        let cfg = SlideshowConfig {
            crossfade_duration_secs: 5.0,
            ..config()
        };
        let outcome = synthesize_sequence(
            vec![gray(0, 0), gray(200, 1)],
            &cfg,
            &mut sink,
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(completed(outcome).total_frames, 20);
        // One normal frame survives before nine blended ones.
        assert_eq!(sink.frames[&0].pixel(0, 0), [0, 0, 0]);
        assert_ne!(sink.frames[&1].pixel(0, 0), [0, 0, 0]);
    }

    #[test]
    fn test_sink_error_is_fatal() {
        let mut sink = MemorySink {
            fail_at: Some(8),
            ..MemorySink::default()
        };
        let err = run(vec![gray(0, 0), gray(240, 1)], &mut sink).unwrap_err();
        assert!(matches!(err, SlideshowError::Sink(SinkError::Write { index: 8, .. })));
        assert_eq!(err.stage(), "frame sink");
    }

    #[test]
    fn test_cancel_before_start_emits_nothing() {
        let mut sink = MemorySink::default();
        let outcome = synthesize_sequence(
            vec![gray(0, 0), gray(10, 1)],
            &config(),
            &mut sink,
            &AtomicBool::new(true),
        )
        .unwrap();
        assert_eq!(outcome, SynthesisOutcome::Cancelled { frames_emitted: 0 });
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn test_progress_callback_cancels() {
        let mut sink = MemorySink::default();
        let cancelled = AtomicBool::new(false);
        let mut synthesizer = SequenceSynthesizer::new(
            config(),
            Box::new(ThreadedBlendExecutor::new(2)),
            Box::new(NullPipelineLogger),
            Some(Box::new(|current, _| current < 12)),
        );
        let outcome = synthesizer
            .synthesize(vec![gray(0, 0), gray(100, 1), gray(200, 2)], &mut sink, &cancelled)
            .unwrap();

        assert_eq!(outcome, SynthesisOutcome::Cancelled { frames_emitted: 12 });
        assert!(cancelled.load(Ordering::Relaxed));
        assert_eq!(sink.order, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_cancel_during_transition_stops_emission() {
        let mut sink = MemorySink::default();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let mut synthesizer = SequenceSynthesizer::new(
            config(),
            Box::new(ThreadedBlendExecutor::new(4)),
            Box::new(NullPipelineLogger),
            Some(Box::new(move |current, _| {
                if current == 8 {
                    flag.store(true, Ordering::Relaxed);
                }
                true
            })),
        );
        let outcome = synthesizer
            .synthesize(vec![gray(0, 0), gray(100, 1)], &mut sink, &cancelled)
            .unwrap();
        assert_eq!(outcome, SynthesisOutcome::Cancelled { frames_emitted: 8 });
        assert_eq!(sink.order, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_progress_reports_expected_total() {
        let mut sink = MemorySink::default();
        let last = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&last);
        let mut synthesizer = SequenceSynthesizer::new(
            config(),
            Box::new(ThreadedBlendExecutor::new(2)),
            Box::new(NullPipelineLogger),
            Some(Box::new(move |current, total| {
                assert!(current <= total);
                seen.store(total, Ordering::Relaxed);
                true
            })),
        );
        synthesizer
            .synthesize(vec![gray(0, 0), gray(1, 1)], &mut sink, &AtomicBool::new(false))
            .unwrap();
        assert_eq!(last.load(Ordering::Relaxed), 20);
    }

    #[test]
    fn test_timing_is_exposed() {
        let synthesizer = SequenceSynthesizer::new(
            config(),
            Box::new(ThreadedBlendExecutor::new(1)),
            Box::new(NullPipelineLogger),
            None,
        );
        assert_eq!(synthesizer.timing(), FrameTiming::new(10, 3));
    }
}
