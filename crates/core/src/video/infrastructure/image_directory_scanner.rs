use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;

/// True if the path has one of the recognised image extensions
/// (case-insensitive).
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Lists the image files directly inside `dir`, sorted by file name.
///
/// Subdirectories are not descended into. Files are only listed here;
/// decoding happens lazily while the slideshow is built.
pub fn scan_image_directory(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    log::debug!("Found {} images in {}", images.len(), dir.display());
    Ok(images)
}
