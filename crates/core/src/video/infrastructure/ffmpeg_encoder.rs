use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::shared::error::EncodeError;
use crate::video::domain::video_encoder::{EncodeRequest, EncodeStatus, VideoEncoder};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_CRF: u8 = 18;

/// Encodes a numbered JPEG sequence to H.264 MP4 by running the system
/// `ffmpeg` binary.
///
/// Output is `yuv420p` with `+faststart`, so it plays in browsers and
/// common players. The child process is polled so a cancellation request
/// can kill it; a partial output file is removed on failure or cancel.
pub struct FfmpegEncoder {
    program: OsString,
    crf: u8,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Uses a specific ffmpeg executable instead of the one on `PATH`.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            crf: DEFAULT_CRF,
        }
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf.min(51);
        self
    }

    /// True if the configured executable runs and answers `-version`.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    pub fn build_args(&self, request: &EncodeRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-y",
            "-loglevel",
            "error",
            "-framerate",
            &request.frame_rate.to_string(),
            "-start_number",
            "0",
            "-i",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(request.frame_pattern.clone().into_os_string());
        args.extend(
            [
                "-an",
                "-c:v",
                "libx264",
                "-crf",
                &self.crf.to_string(),
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ]
            .iter()
            .map(OsString::from),
        );
        args.push(request.output.clone().into_os_string());
        args
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), EncodeError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| EncodeError::OutputDir {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

fn remove_partial_output(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove partial output {}: {e}", path.display());
        }
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(
        &self,
        request: &EncodeRequest,
        cancelled: &AtomicBool,
    ) -> Result<EncodeStatus, EncodeError> {
        if !self.is_available() {
            return Err(EncodeError::Unavailable);
        }
        ensure_parent_dir(&request.output)?;

        let args = self.build_args(request);
        log::debug!("Running {:?} {:?}", self.program, args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncodeError::Unavailable
                } else {
                    EncodeError::Spawn(e)
                }
            })?;

        // Drain stderr concurrently so a chatty ffmpeg never blocks on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });
        let collect_stderr = |reader: Option<thread::JoinHandle<String>>| {
            reader
                .and_then(|h| h.join().ok())
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        let status = loop {
            if cancelled.load(Ordering::Relaxed) {
                log::info!("Cancelling ffmpeg");
                let _ = child.kill();
                let _ = child.wait();
                let _ = collect_stderr(stderr_reader);
                remove_partial_output(&request.output);
                return Ok(EncodeStatus::Cancelled);
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    remove_partial_output(&request.output);
                    return Err(EncodeError::Wait(e));
                }
            }
        };

        let stderr = collect_stderr(stderr_reader);
        if !status.success() {
            remove_partial_output(&request.output);
            return Err(EncodeError::Failed { status, stderr });
        }
        if !stderr.is_empty() {
            log::warn!("ffmpeg: {stderr}");
        }

        log::info!("Encoded {}", request.output.display());
        Ok(EncodeStatus::Finished)
    }
}
