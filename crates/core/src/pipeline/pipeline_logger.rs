use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for slideshow pipeline events.
///
/// Decouples the synthesizer from how progress and timings are reported,
/// so the CLI, tests and embedders can each pick their own output.
pub trait PipelineLogger: Send {
    /// Frame-level progress: `current` frames emitted out of an expected `total`.
    fn progress(&mut self, current: usize, total: usize);

    /// Duration of one named stage for one unit of work (an image, a transition).
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Point-in-time value, e.g. skipped images.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// End-of-run report. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct StageStats {
    count: usize,
    total_ms: f64,
    max_ms: f64,
}

impl StageStats {
    fn record(&mut self, duration_ms: f64) {
        self.count += 1;
        self.total_ms += duration_ms;
        self.max_ms = self.max_ms.max(duration_ms);
    }

    fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms / self.count as f64
        }
    }
}

/// Reports through the `log` facade.
///
/// Progress lines are throttled to one per `throttle_frames` frames; stage
/// timings are aggregated and printed once by [`PipelineLogger::summary`].
pub struct LogPipelineLogger {
    throttle_frames: usize,
    stages: BTreeMap<String, StageStats>,
    metrics: BTreeMap<String, f64>,
    start_time: Instant,
    frames: usize,
}

impl LogPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            stages: BTreeMap::new(),
            metrics: BTreeMap::new(),
            start_time: Instant::now(),
            frames: 0,
        }
    }

    /// Formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.stages.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Slideshow summary ({} frames, {elapsed_s:.1}s):",
            self.frames
        )];

        for (stage, stats) in &self.stages {
            lines.push(format!(
                "  {stage:12}: {:5} runs  avg {:7.1}ms  max {:7.1}ms  total {:8.0}ms",
                stats.count,
                stats.avg_ms(),
                stats.max_ms,
                stats.total_ms
            ));
        }
        for (name, value) in &self.metrics {
            lines.push(format!("  {name}: {value}"));
        }
        if self.frames > 0 && elapsed_s > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} frames/s",
                self.frames as f64 / elapsed_s
            ));
        }

        Some(lines.join("\n"))
    }

    pub fn stage_runs(&self, stage: &str) -> usize {
        self.stages.get(stage).map_or(0, |s| s.count)
    }

    pub fn metric_value(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames = current;
        if current % self.throttle_frames == 0 || current == total {
            if total > 0 {
                let pct = (current as f64 / total as f64 * 100.0).min(100.0);
                log::info!("Frames: {current}/{total} ({pct:.1}%)");
            } else {
                log::info!("Frames: {current}");
            }
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.stages
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 10);
        logger.timing("prepare", 5.0);
        logger.metric("skipped_images", 1.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_stage_stats_aggregate() {
        let mut logger = LogPipelineLogger::new(10);
        logger.timing("prepare", 20.0);
        logger.timing("prepare", 40.0);
        logger.timing("transition", 5.0);

        let prepare = logger.stages["prepare"];
        assert_eq!(prepare.count, 2);
        assert_relative_eq!(prepare.avg_ms(), 30.0);
        assert_relative_eq!(prepare.max_ms, 40.0);
        assert_eq!(logger.stage_runs("transition"), 1);
        assert_eq!(logger.stage_runs("missing"), 0);
    }

    #[test]
    fn test_metric_keeps_latest_value() {
        let mut logger = LogPipelineLogger::new(10);
        logger.metric("skipped_images", 1.0);
        logger.metric("skipped_images", 2.0);
        assert_eq!(logger.metric_value("skipped_images"), Some(2.0));
    }

    #[test]
    fn test_summary_lists_stages_and_metrics() {
        let mut logger = LogPipelineLogger::new(10);
        logger.progress(120, 120);
        logger.timing("prepare", 12.0);
        logger.timing("transition", 30.0);
        logger.metric("skipped_images", 1.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Slideshow summary (120 frames"));
        assert!(summary.contains("prepare"));
        assert!(summary.contains("transition"));
        assert!(summary.contains("skipped_images: 1"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(LogPipelineLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_progress_tracks_frames() {
        let mut logger = LogPipelineLogger::new(7);
        for i in 1..=20 {
            logger.progress(i, 20);
        }
        assert_eq!(logger.frames, 20);
    }

    #[test]
    fn test_zero_throttle_clamped() {
        assert_eq!(LogPipelineLogger::new(0).throttle_frames, 1);
    }
}
