use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::pipeline::blend_executor::{BlendEmit, BlendExecutor, BlendFlow, BlendJob};
use crate::shared::error::SlideshowError;
use crate::shared::frame::Frame;

/// Extra jobs allowed in flight per worker beyond the one it is running.
const DEFAULT_WINDOW_PER_WORKER: usize = 1;

/// How often the collector re-checks cancellation while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

type JobOutput = (usize, Result<Frame, SlideshowError>);

/// Computes transition frames on a bounded pool of scoped worker threads.
///
/// Layout: `feeder → workers → collector [reorder] → emit`
///
/// The feeder only hands out an offset when the collector returns a credit,
/// so at most `window` blended frames exist at once regardless of how
/// unevenly workers finish. The collector buffers out-of-order results and
/// emits strictly by ascending offset.
pub struct ThreadedBlendExecutor {
    workers: usize,
    window: usize,
}

impl ThreadedBlendExecutor {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            window: workers * (1 + DEFAULT_WINDOW_PER_WORKER),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for ThreadedBlendExecutor {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(workers)
    }
}

impl BlendExecutor for ThreadedBlendExecutor {
    fn run(
        &self,
        count: usize,
        job: &BlendJob<'_>,
        cancelled: &AtomicBool,
        emit: &mut BlendEmit<'_>,
    ) -> Result<BlendFlow, SlideshowError> {
        if count == 0 {
            return Ok(BlendFlow::Completed);
        }
        if cancelled.load(Ordering::Relaxed) {
            return Ok(BlendFlow::Cancelled);
        }

        let workers = self.workers.min(count);
        let window = self.window.min(count);

        let (job_tx, job_rx) = crossbeam_channel::bounded::<usize>(window);
        let (result_tx, result_rx) = crossbeam_channel::bounded::<JobOutput>(window);
        let (credit_tx, credit_rx) = crossbeam_channel::unbounded::<()>();
        for _ in 0..window {
            let _ = credit_tx.send(());
        }

        std::thread::scope(|scope| {
            let feeder = scope.spawn(move || feed_jobs(count, job_tx, credit_rx, cancelled));

            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let job_rx = job_rx.clone();
                    let result_tx = result_tx.clone();
                    scope.spawn(move || run_worker(job, job_rx, result_tx, cancelled))
                })
                .collect();
            drop(job_rx);
            drop(result_tx);

            let outcome = collect_in_order(count, result_rx, credit_tx, cancelled, emit);

            join_threads(feeder, handles, outcome)
        })
    }
}

fn feed_jobs(
    count: usize,
    job_tx: Sender<usize>,
    credit_rx: Receiver<()>,
    cancelled: &AtomicBool,
) {
    for offset in 0..count {
        if credit_rx.recv().is_err() || cancelled.load(Ordering::Relaxed) {
            break;
        }
        if job_tx.send(offset).is_err() {
            break;
        }
    }
}

fn run_worker(
    job: &BlendJob<'_>,
    job_rx: Receiver<usize>,
    result_tx: Sender<JobOutput>,
    cancelled: &AtomicBool,
) {
    for offset in job_rx {
        if cancelled.load(Ordering::Relaxed) {
            break;
        }
        let result = panic::catch_unwind(AssertUnwindSafe(|| job(offset))).unwrap_or_else(|_| {
            Err(SlideshowError::Worker(format!(
                "transition worker panicked on frame offset {offset}"
            )))
        });
        if result_tx.send((offset, result)).is_err() {
            break;
        }
    }
}

/// Receives results in completion order and emits them by ascending offset.
///
/// Takes the receiver and credit sender by value: returning drops both, which
/// unblocks any worker or feeder still waiting on them.
fn collect_in_order(
    count: usize,
    results: Receiver<JobOutput>,
    credits: Sender<()>,
    cancelled: &AtomicBool,
    emit: &mut BlendEmit<'_>,
) -> Result<BlendFlow, SlideshowError> {
    let mut pending: BTreeMap<usize, Frame> = BTreeMap::new();
    let mut next = 0;

    while next < count {
        if cancelled.load(Ordering::Relaxed) {
            return Ok(BlendFlow::Cancelled);
        }

        if let Some(frame) = pending.remove(&next) {
            if emit(next, frame)?.is_break() {
                return Ok(BlendFlow::Cancelled);
            }
            next += 1;
            let _ = credits.send(());
            continue;
        }

        match results.recv_timeout(POLL_INTERVAL) {
            Ok((offset, Ok(frame))) => {
                pending.insert(offset, frame);
            }
            Ok((_, Err(e))) => return Err(e),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                if cancelled.load(Ordering::Relaxed) {
                    return Ok(BlendFlow::Cancelled);
                }
                return Err(SlideshowError::Worker(format!(
                    "transition workers stopped before frame offset {next} of {count}"
                )));
            }
        }
    }

    Ok(BlendFlow::Completed)
}

/// Joins the feeder and workers, preferring the collector's own error over a
/// panic report.
fn join_threads(
    feeder: std::thread::ScopedJoinHandle<'_, ()>,
    workers: Vec<std::thread::ScopedJoinHandle<'_, ()>>,
    outcome: Result<BlendFlow, SlideshowError>,
) -> Result<BlendFlow, SlideshowError> {
    let mut panicked = feeder.join().is_err();
    for handle in workers {
        panicked |= handle.join().is_err();
    }

    match outcome {
        Err(e) => Err(e),
        Ok(_) if panicked => Err(SlideshowError::Worker(
            "transition worker thread panicked".into(),
        )),
        Ok(flow) => Ok(flow),
    }
}
