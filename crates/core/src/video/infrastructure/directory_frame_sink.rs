use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tempfile::TempDir;

use crate::shared::constants::{
    DEFAULT_JPEG_QUALITY, FRAME_FILE_EXTENSION, FRAME_FILE_PREFIX, FRAME_INDEX_DIGITS,
};
use crate::shared::error::SinkError;
use crate::shared::frame::Frame;
use crate::video::domain::frame_sink::FrameSink;

/// Writes frames as `frame_000000.jpg`, `frame_000001.jpg`, ... into a
/// directory.
///
/// Each file is written under a temporary name and renamed into place, so a
/// reader never observes a half-written frame. Repeated canvases are stored
/// by copying the encoded file.
pub struct DirectoryFrameSink {
    dir: PathBuf,
    width: u32,
    height: u32,
    quality: u8,
    frames_written: usize,
    // Removes the directory on drop when the sink owns a scratch location.
    scratch: Option<TempDir>,
}

impl DirectoryFrameSink {
    pub fn new(dir: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            dir: dir.into(),
            width,
            height,
            quality: DEFAULT_JPEG_QUALITY,
            frames_written: 0,
            scratch: None,
        }
    }

    /// A sink in a fresh scratch directory under the system temp location
    /// (or under `parent` when given). The directory is removed on cleanup
    /// and, failing that, when the sink is dropped.
    pub fn in_scratch_dir(parent: Option<&Path>, width: u32, height: u32) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("slideshow-frames-");
        let scratch = match parent {
            Some(p) => {
                fs::create_dir_all(p)?;
                builder.tempdir_in(p)?
            }
            None => builder.tempdir()?,
        };
        let mut sink = Self::new(scratch.path(), width, height);
        sink.scratch = Some(scratch);
        Ok(sink)
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(frame_file_name(index))
    }

    fn staging_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!(".{}.part", frame_file_name(index)))
    }

    fn encode_jpeg(&self, frame: &Frame) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.quality).encode(
            frame.data(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(bytes)
    }

    fn remove_stale_frames(&self) -> io::Result<()> {
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let is_frame = name.starts_with(FRAME_FILE_PREFIX)
                || (name.starts_with('.') && name.ends_with(".part"));
            if is_frame && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Deletes frame files in a caller-supplied directory, then the directory
    /// itself if nothing else is left in it.
    fn remove_own_files(&self) -> io::Result<()> {
        self.remove_stale_frames()?;
        if fs::read_dir(&self.dir)?.next().is_none() {
            fs::remove_dir(&self.dir)?;
        } else {
            log::debug!(
                "Keeping {}: contains files not written by the sink",
                self.dir.display()
            );
        }
        Ok(())
    }
}

/// File name for output frame `index`, e.g. `frame_000042.jpg`.
pub fn frame_file_name(index: usize) -> String {
    format!(
        "{FRAME_FILE_PREFIX}{index:0width$}.{FRAME_FILE_EXTENSION}",
        width = FRAME_INDEX_DIGITS
    )
}

impl FrameSink for DirectoryFrameSink {
    fn prepare(&mut self) -> Result<(), SinkError> {
        let prepare_err = |source| SinkError::Prepare {
            path: self.dir.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(prepare_err)?;
        self.remove_stale_frames().map_err(prepare_err)?;
        self.frames_written = 0;
        Ok(())
    }

    fn write_frame(&mut self, index: usize, frame: &Frame) -> Result<(), SinkError> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(SinkError::SizeMismatch {
                index,
                width: frame.width(),
                height: frame.height(),
                expected_width: self.width,
                expected_height: self.height,
            });
        }

        let bytes = self.encode_jpeg(frame).map_err(|e| SinkError::Write {
            index,
            source: Box::new(e),
        })?;

        let staging = self.staging_path(index);
        fs::write(&staging, bytes)
            .and_then(|_| fs::rename(&staging, self.frame_path(index)))
            .map_err(|e| SinkError::Write {
                index,
                source: Box::new(e),
            })?;

        self.frames_written += 1;
        Ok(())
    }

    fn repeat_frame(&mut self, source_index: usize, index: usize) -> Result<(), SinkError> {
        let staging = self.staging_path(index);
        fs::copy(self.frame_path(source_index), &staging)
            .and_then(|_| fs::rename(&staging, self.frame_path(index)))
            .map_err(|source| SinkError::Copy {
                from: source_index,
                to: index,
                source,
            })?;

        self.frames_written += 1;
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames_written
    }

    fn frame_pattern(&self) -> PathBuf {
        self.dir.join(format!(
            "{FRAME_FILE_PREFIX}%0{FRAME_INDEX_DIGITS}d.{FRAME_FILE_EXTENSION}"
        ))
    }

    fn cleanup(&mut self) -> Result<(), SinkError> {
        self.frames_written = 0;
        let removed = if self.scratch.is_some() {
            fs::remove_dir_all(&self.dir)
        } else {
            self.remove_own_files()
        };
        let result = match removed {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SinkError::Cleanup {
                path: self.dir.clone(),
                source,
            }),
        };
        if result.is_ok() {
            // TempDir ignores a missing directory on drop.
            self.scratch.take();
        }
        result
    }
}
