use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// A single source image could not be decoded. Recovered locally: the image
/// is skipped and the run continues.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image {path} has no pixels")]
    Empty { path: PathBuf },
}

impl DecodeError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            DecodeError::Io { path, .. }
            | DecodeError::Image { path, .. }
            | DecodeError::Empty { path } => path,
        }
    }
}

/// Persisting a frame failed. Always fatal: the encoder cannot tolerate a
/// gap in the frame sequence.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to prepare frame directory {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write frame {index}: {source}")]
    Write {
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to duplicate frame {from} as frame {to}: {source}")]
    Copy {
        from: usize,
        to: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("frame {index} has size {width}x{height}, expected {expected_width}x{expected_height}")]
    SizeMismatch {
        index: usize,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
    #[error("failed to clean up {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The external encoder step failed.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("ffmpeg was not found on PATH; install ffmpeg (https://ffmpeg.org/download.html) and make sure the `ffmpeg` command is available")]
    Unavailable,
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn ffmpeg: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed while waiting for ffmpeg: {0}")]
    Wait(#[source] std::io::Error),
    #[error("ffmpeg exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Fatal run-level failure. Cancellation is reported through the outcome
/// types instead.
#[derive(Error, Debug)]
pub enum SlideshowError {
    #[error("none of the {attempted} input images could be decoded")]
    NoImages { attempted: usize },
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("worker failure: {0}")]
    Worker(String),
    #[error("failed to create scratch directory: {0}")]
    Scratch(#[source] std::io::Error),
    #[error("pipeline already executed")]
    AlreadyExecuted,
}

impl SlideshowError {
    /// Name of the pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            SlideshowError::NoImages { .. } => "decode",
            SlideshowError::Sink(_) => "frame sink",
            SlideshowError::Encode(_) => "encode",
            SlideshowError::Worker(_) => "synthesis",
            SlideshowError::Scratch(_) | SlideshowError::AlreadyExecuted => "setup",
        }
    }
}
