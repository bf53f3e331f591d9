use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Files directly inside `dir` whose extension equals `extension`,
/// sorted by path. Subdirectories are not descended into.
pub fn list_images(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}
