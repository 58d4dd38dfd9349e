use std::ops::Range;

use crate::shared::slideshow_config::{seconds_to_frames, SlideshowConfig};

/// Per-slide frame counts derived from durations and frame rate.
///
/// `crossfade_frames` is always strictly less than `frames_per_slide`, so
/// every slide shows its own canvas for at least one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub frames_per_slide: usize,
    pub crossfade_frames: usize,
}

impl FrameTiming {
    pub fn new(frames_per_slide: usize, crossfade_frames: usize) -> Self {
        let frames_per_slide = frames_per_slide.max(1);
        Self {
            frames_per_slide,
            crossfade_frames: crossfade_frames.min(frames_per_slide - 1),
        }
    }

    pub fn from_config(config: &SlideshowConfig) -> Self {
        Self::new(
            seconds_to_frames(config.slide_duration_secs, config.frame_rate),
            seconds_to_frames(config.crossfade_duration_secs, config.frame_rate),
        )
    }

    /// Normal (non-transition) frames of a slide followed by another one.
    pub fn normal_frames_before_transition(&self) -> usize {
        self.frames_per_slide - self.crossfade_frames
    }

    /// Total frames emitted for `slides` successfully prepared images.
    pub fn total_frames(&self, slides: usize) -> usize {
        slides.saturating_mul(self.frames_per_slide)
    }

    /// Index ranges of slide number `slide` (0-based among prepared images).
    pub fn span(&self, slide: usize, is_last: bool) -> SlideSpan {
        let start = slide.saturating_mul(self.frames_per_slide);
        let end = start.saturating_add(self.frames_per_slide);
        let normal_end = if is_last {
            end
        } else {
            start + self.normal_frames_before_transition()
        };
        SlideSpan {
            normal: start..normal_end,
            transition: normal_end..end,
        }
    }
}

/// Pre-computed output frame indices owned by one slide.
///
/// Spans of consecutive slides are adjacent and never overlap, so index
/// assignment needs no shared counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideSpan {
    pub normal: Range<usize>,
    pub transition: Range<usize>,
}

impl SlideSpan {
    pub fn start(&self) -> usize {
        self.normal.start
    }

    pub fn end(&self) -> usize {
        self.transition.end
    }

    pub fn len(&self) -> usize {
        self.end() - self.start()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
