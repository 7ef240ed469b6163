//! Recursive image scanning

use crate::{FsError, Result, UniversalPath};
use std::fs;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Image extensions that take part in a draw (lowercase)
///
/// `heic` files are collected like the rest, but the decoder stack has no
/// HEIF support: drawing one fails with `UnsupportedFormat` and a warning.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "heic", "webp"];

/// Check if a file has a supported image extension
pub fn is_supported_image<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let ext = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Dot-prefixed names are hidden
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(windows)]
fn is_hidden_entry(entry: &DirEntry) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

    let by_name = entry.file_name().to_str().map_or(false, is_hidden_name);
    by_name
        || entry
            .metadata()
            .map(|m| m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
            .unwrap_or(false)
}

#[cfg(not(windows))]
fn is_hidden_entry(entry: &DirEntry) -> bool {
    entry.file_name().to_str().map_or(false, is_hidden_name)
}

/// Recursively list the image files under `root`
///
/// Fails only when `root` itself cannot be listed; unreadable entries further
/// down are logged and skipped. Hidden files and hidden directories (with
/// their contents) are ignored.
pub fn scan_images<P: AsRef<Path>>(root: P) -> Result<Vec<UniversalPath>> {
    let root = root.as_ref();

    fs::read_dir(root).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => FsError::AccessDenied(root.display().to_string()),
        _ => FsError::Enumeration(format!("{}: {}", root.display(), e)),
    })?;

    let mut images = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_hidden_entry(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            images.push(UniversalPath::new(entry.path()));
        }
    }

    Ok(images)
}

/// Count the image files under `root`
pub fn count_images<P: AsRef<Path>>(root: P) -> Result<usize> {
    scan_images(root).map(|images| images.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_is_supported_image() {
        assert!(is_supported_image("a.jpg"));
        assert!(is_supported_image("a.JPEG"));
        assert!(is_supported_image("a.HeIc"));
        assert!(is_supported_image("dir/a.webp"));
        assert!(!is_supported_image("a.txt"));
        assert!(!is_supported_image("a.ico"));
        assert!(!is_supported_image("jpg"));
    }

    #[test]
    fn test_scan_filters_and_recurses() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("b.png"));
        touch(&dir.path().join("readme.txt"));
        touch(&dir.path().join("nested/deeper/c.GIF"));
        touch(&dir.path().join(".hidden.jpg"));
        touch(&dir.path().join(".cache/d.jpg"));
        fs::create_dir(dir.path().join("folder.jpg")).unwrap();

        let mut names: Vec<_> = scan_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string())
            .collect();
        names.sort();

        assert_eq!(names, vec!["a.jpg", "b.png", "c.GIF"]);
        assert_eq!(count_images(dir.path()).unwrap(), 3);
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let result = scan_images(dir.path().join("missing"));
        assert!(matches!(result, Err(FsError::Enumeration(_))));
    }
}
