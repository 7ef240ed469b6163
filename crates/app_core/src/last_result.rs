//! Last shown result, persisted for instant resume

use crate::image_loader::{decode_preview, encode_preview_jpeg};
use crate::{AppError, DecodedImage};
use app_db::KeyValueStore;
use app_fs::UniversalPath;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const LAST_RESULT_PATH_KEY: &str = "last_result_path";
pub const LAST_RESULT_FOLDER_KEY: &str = "last_result_folder";
pub const PREVIEW_FILE_NAME: &str = "last_result_preview.jpg";

/// Persisted pointer to the last revealed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    /// Relative to `folder`, or absolute when the file is not under its root
    pub path: String,
    /// Owning folder root; empty when no folder claimed the file
    pub folder: String,
}

impl StoredResult {
    pub fn absolute_path(&self) -> PathBuf {
        if let Some(rest) = self.path.strip_prefix("file://") {
            return PathBuf::from(percent_decode_str(rest).decode_utf8_lossy().into_owned());
        }

        let path = Path::new(&self.path);
        if path.is_absolute() || self.path.starts_with('/') || self.folder.is_empty() {
            path.to_path_buf()
        } else {
            Path::new(&self.folder).join(path)
        }
    }

    pub fn folder_path(&self) -> Option<UniversalPath> {
        (!self.folder.is_empty()).then(|| UniversalPath::new(&self.folder))
    }
}

#[derive(Clone)]
pub struct LastResultStore {
    store: Arc<dyn KeyValueStore>,
    cache_dir: PathBuf,
}

impl LastResultStore {
    pub fn new(store: Arc<dyn KeyValueStore>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            cache_dir: cache_dir.into(),
        }
    }

    /// Record `file` relative to `owner`, or absolutely when it is not under the owner's root
    ///
    /// The owner is recorded either way; it may have matched `file` by
    /// containment rather than by prefix.
    pub fn save(&self, file: &UniversalPath, owner: Option<&UniversalPath>) -> Result<(), AppError> {
        let folder = owner.map(|root| root.display().to_string()).unwrap_or_default();
        let path = match owner.and_then(|root| file.strip_root(root)) {
            Some(relative) => relative.to_string_lossy().to_string(),
            None => file.display().to_string(),
        };

        self.store.set(LAST_RESULT_PATH_KEY, &path)?;
        self.store.set(LAST_RESULT_FOLDER_KEY, &folder)?;
        tracing::debug!("Last result saved: {} (folder {:?})", path, folder);
        Ok(())
    }

    pub fn load(&self) -> Option<StoredResult> {
        let read = || -> Result<Option<StoredResult>, AppError> {
            let Some(path) = self.store.get(LAST_RESULT_PATH_KEY)? else {
                return Ok(None);
            };
            if path.is_empty() {
                return Ok(None);
            }
            let folder = self.store.get(LAST_RESULT_FOLDER_KEY)?.unwrap_or_default();
            Ok(Some(StoredResult { path, folder }))
        };

        match read() {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Cannot read last result: {}", e);
                None
            }
        }
    }

    /// Forget the last result and its preview
    pub fn clear(&self) {
        for key in [LAST_RESULT_PATH_KEY, LAST_RESULT_FOLDER_KEY] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!("Cannot remove {}: {}", key, e);
            }
        }
        self.delete_preview();
    }

    pub fn preview_path(&self) -> PathBuf {
        self.cache_dir.join(PREVIEW_FILE_NAME)
    }

    /// Write a downsized JPEG of `image` (temp file + rename)
    pub fn save_preview(&self, image: &DecodedImage, max_dimension: u32, quality: u8) -> Result<(), AppError> {
        let jpeg = encode_preview_jpeg(image, max_dimension, quality)?;

        std::fs::create_dir_all(&self.cache_dir)?;
        let target = self.preview_path();
        let temp = self.cache_dir.join(format!(".{}.tmp", PREVIEW_FILE_NAME));
        std::fs::write(&temp, &jpeg)?;
        if let Err(e) = std::fs::rename(&temp, &target) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }

        tracing::debug!("Preview written: {:?} ({} bytes)", target, jpeg.len());
        Ok(())
    }

    pub fn load_preview(&self) -> Option<DecodedImage> {
        let bytes = std::fs::read(self.preview_path()).ok()?;
        match decode_preview(&bytes) {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::warn!("Discarding unreadable preview: {}", e);
                None
            }
        }
    }

    pub fn delete_preview(&self) {
        match std::fs::remove_file(self.preview_path()) {
            Ok(()) => tracing::debug!("Preview deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Cannot delete preview: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImageSource;
    use app_db::MemoryStore;
    use tempfile::TempDir;

    fn store(dir: &Path) -> LastResultStore {
        LastResultStore::new(Arc::new(MemoryStore::new()), dir.join("cache"))
    }

    #[test]
    fn test_save_relative_to_owner() {
        let dir = TempDir::new().unwrap();
        let results = store(dir.path());
        let root = UniversalPath::new("/library/cats");
        let file = UniversalPath::new("/library/cats/2024/tabby.png");

        results.save(&file, Some(&root)).unwrap();
        let stored = results.load().unwrap();
        assert_eq!(stored.path, "2024/tabby.png");
        assert_eq!(stored.folder, "/library/cats");
        assert_eq!(stored.absolute_path(), PathBuf::from("/library/cats/2024/tabby.png"));
        assert_eq!(stored.folder_path(), Some(root));
    }

    #[test]
    fn test_save_outside_owner_is_absolute() {
        let dir = TempDir::new().unwrap();
        let results = store(dir.path());
        let root = UniversalPath::new("/library/cats");
        let file = UniversalPath::new("/downloads/dog.png");

        results.save(&file, None).unwrap();
        let stored = results.load().unwrap();
        assert_eq!(stored.path, "/downloads/dog.png");
        assert!(stored.folder.is_empty());
        assert!(stored.folder_path().is_none());
        assert_eq!(stored.absolute_path(), PathBuf::from("/downloads/dog.png"));

        // Claimed by a folder it is not under: absolute path, owner kept
        results.save(&file, Some(&root)).unwrap();
        let stored = results.load().unwrap();
        assert_eq!(stored.path, "/downloads/dog.png");
        assert_eq!(stored.folder, "/library/cats");
        assert_eq!(stored.folder_path(), Some(root));
        assert_eq!(stored.absolute_path(), PathBuf::from("/downloads/dog.png"));
    }

    #[test]
    fn test_file_url_path() {
        let stored = StoredResult {
            path: "file:///library/My%20Photos/a.jpg".into(),
            folder: "/library".into(),
        };
        assert_eq!(stored.absolute_path(), PathBuf::from("/library/My Photos/a.jpg"));
    }

    #[test]
    fn test_preview_lifecycle() {
        let dir = TempDir::new().unwrap();
        let results = store(dir.path());
        assert!(results.load_preview().is_none());

        let image = DecodedImage {
            width: 64,
            height: 32,
            pixels: image::RgbaImage::from_pixel(64, 32, image::Rgba([10, 20, 30, 255])),
            source: ImageSource::Full,
        };
        results.save_preview(&image, 600, 85).unwrap();
        assert!(results.preview_path().exists());

        let preview = results.load_preview().unwrap();
        assert_eq!((preview.width, preview.height), (64, 32));
        assert_eq!(preview.source, ImageSource::Preview);

        results.save(&UniversalPath::new("/a.png"), None).unwrap();
        results.clear();
        assert!(results.load().is_none());
        assert!(!results.preview_path().exists());

        // Clearing twice is harmless
        results.clear();
    }
}
