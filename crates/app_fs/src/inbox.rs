//! Shared inbox: the folder other apps drop images into

use crate::{is_supported_image, FsError, Result};
use chrono::{DateTime, Local};
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Sniff an image format from its leading bytes
///
/// Unknown data defaults to `jpg`.
pub fn detect_image_format(data: &[u8]) -> &'static str {
    if data.len() <= 4 {
        return "jpg";
    }

    let header = &data[..data.len().min(12)];

    if header.starts_with(&[0x89, b'P', b'N', b'G']) {
        return "png";
    }
    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "jpg";
    }
    if header.starts_with(b"GIF") {
        return "gif";
    }
    if header.len() >= 12 && &header[4..12] == b"ftypheic" {
        return "heic";
    }
    if header.len() >= 12 && header.starts_with(b"RIFF") && &header[8..12] == b"WEBP" {
        return "webp";
    }

    "jpg"
}

/// `IMG_<yyyyMMdd_HHmmss>_<4 random digits>.<ext>`
pub fn generate_file_name(extension: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
    format!("IMG_{}_{}.{}", timestamp, suffix, extension)
}

/// Image sitting in the inbox
#[derive(Debug, Clone)]
pub struct InboxItem {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub created: Option<DateTime<Local>>,
}

/// Writer/reader for the shared container folder
#[derive(Debug, Clone)]
pub struct SharedInbox {
    root: PathBuf,
}

impl SharedInbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the inbox directory if needed
    pub fn ensure(&self) -> Result<&Path> {
        if !self.root.is_dir() {
            fs::create_dir_all(&self.root)?;
            tracing::info!("Created shared inbox at {}", self.root.display());
        }
        Ok(&self.root)
    }

    /// Store raw image bytes under a generated name
    pub fn save_bytes(&self, data: &[u8]) -> Result<PathBuf> {
        if data.is_empty() {
            return Err(FsError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "empty image data",
            )));
        }

        let root = self.ensure()?;
        let format = detect_image_format(data);

        let mut target = root.join(generate_file_name(format));
        while target.exists() {
            target = root.join(generate_file_name(format));
        }

        // Write under a hidden name so scans never see a partial file
        let temp = root.join(format!(".incoming-{}", std::process::id()));
        fs::write(&temp, data)?;
        if let Err(e) = fs::rename(&temp, &target) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        tracing::info!("Saved shared image {} ({} bytes)", target.display(), data.len());
        Ok(target)
    }

    /// Copy an existing image file into the inbox
    pub fn import_file(&self, source: &Path) -> Result<PathBuf> {
        let data = fs::read(source).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(source.display().to_string()),
            _ => FsError::Io(e),
        })?;
        self.save_bytes(&data)
    }

    /// Images in the inbox, newest first
    pub fn list(&self) -> Result<Vec<InboxItem>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();

            if crate::is_hidden_name(&file_name) || !is_supported_image(&path) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .ok()
                .map(DateTime::<Local>::from);

            items.push(InboxItem {
                path,
                file_name,
                size: metadata.len(),
                created,
            });
        }

        items.sort_by(|a, b| {
            let a_time = a.created.map(SystemTime::from);
            let b_time = b.created.map(SystemTime::from);
            b_time.cmp(&a_time).then_with(|| b.file_name.cmp(&a.file_name))
        });

        Ok(items)
    }

    /// Delete inbox images; paths outside the inbox are ignored
    pub fn delete(&self, paths: &[PathBuf]) -> Result<usize> {
        let mut deleted = 0;
        for path in paths {
            if path.parent() != Some(self.root.as_path()) {
                tracing::warn!("Refusing to delete {} outside the shared inbox", path.display());
                continue;
            }
            match fs::remove_file(path) {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!("Failed to delete {}: {}", path.display(), e),
            }
        }
        Ok(deleted)
    }

    /// Total bytes held in the inbox
    pub fn total_size(&self) -> Result<u64> {
        Ok(self.list()?.iter().map(|item| item.size).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_detect_image_format() {
        assert_eq!(detect_image_format(PNG_HEADER), "png");
        assert_eq!(detect_image_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), "jpg");
        assert_eq!(detect_image_format(b"GIF89a......"), "gif");
        assert_eq!(detect_image_format(b"\0\0\0\x18ftypheic"), "heic");
        assert_eq!(detect_image_format(b"RIFF\x10\0\0\0WEBPVP8 "), "webp");
        assert_eq!(detect_image_format(b"hello world!"), "jpg");
        assert_eq!(detect_image_format(b"abc"), "jpg");
    }

    #[test]
    fn test_generate_file_name() {
        let name = generate_file_name("png");
        assert!(name.starts_with("IMG_"));
        assert!(name.ends_with(".png"));
        // IMG_ + 8 date + _ + 6 time + _ + 4 digits + .png
        assert_eq!(name.len(), 4 + 8 + 1 + 6 + 1 + 4 + 4);
    }

    #[test]
    fn test_save_list_delete() {
        let dir = TempDir::new().unwrap();
        let inbox = SharedInbox::new(dir.path().join("SharedImages"));

        assert!(inbox.list().unwrap().is_empty());

        let saved = inbox.save_bytes(PNG_HEADER).unwrap();
        assert_eq!(saved.extension().unwrap(), "png");
        assert!(saved.exists());

        std::fs::write(inbox.root().join("notes.txt"), b"not an image").unwrap();

        let items = inbox.list().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].size, PNG_HEADER.len() as u64);
        assert_eq!(inbox.total_size().unwrap(), PNG_HEADER.len() as u64);

        let outside = dir.path().join("elsewhere.png");
        std::fs::write(&outside, b"x").unwrap();
        let deleted = inbox.delete(&[saved.clone(), outside.clone()]).unwrap();
        assert_eq!(deleted, 1);
        assert!(!saved.exists());
        assert!(outside.exists());
    }

    #[test]
    fn test_save_empty_fails() {
        let dir = TempDir::new().unwrap();
        let inbox = SharedInbox::new(dir.path());
        assert!(inbox.save_bytes(&[]).is_err());
    }

    #[test]
    fn test_import_missing_file() {
        let dir = TempDir::new().unwrap();
        let inbox = SharedInbox::new(dir.path().join("inbox"));
        let result = inbox.import_file(&dir.path().join("missing.png"));
        assert!(matches!(result, Err(FsError::NotFound(_))));
    }
}
