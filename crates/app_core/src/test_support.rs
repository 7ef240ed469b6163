//! Fixtures shared by the unit tests

use app_db::MemoryStore;
use app_fs::{AccessProvider, AccessToken, FsError, Locator, PathAccess, ResolvedLocation, Result, UniversalPath};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Write a small solid-colour image; the format follows the extension
pub fn write_image(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 90]))
        .save(path)
        .unwrap();
}

/// Write a JPEG whose EXIF header carries a `thumb_width` x `thumb_height` thumbnail
pub fn write_jpeg_with_thumbnail(path: &Path, width: u32, height: u32, thumb_width: u32, thumb_height: u32) {
    let encode = |w: u32, h: u32, color: [u8; 3]| {
        let mut buf = Vec::new();
        let img = image::RgbImage::from_pixel(w, h, image::Rgb(color));
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 90)
            .encode_image(&img)
            .unwrap();
        buf
    };
    let main = encode(width, height, [200, 40, 90]);
    let thumb = encode(thumb_width, thumb_height, [20, 40, 200]);

    // Big-endian TIFF: empty IFD0, then IFD1 pointing at the thumbnail right after it
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\0\x2a");
    tiff.extend_from_slice(&8u32.to_be_bytes());
    tiff.extend_from_slice(&0u16.to_be_bytes());
    tiff.extend_from_slice(&14u32.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    for (tag, value) in [(0x0201u16, 44u32), (0x0202, thumb.len() as u32)] {
        tiff.extend_from_slice(&tag.to_be_bytes());
        tiff.extend_from_slice(&4u16.to_be_bytes());
        tiff.extend_from_slice(&1u32.to_be_bytes());
        tiff.extend_from_slice(&value.to_be_bytes());
    }
    tiff.extend_from_slice(&0u32.to_be_bytes());
    assert_eq!(tiff.len(), 44);
    tiff.extend_from_slice(&thumb);

    let mut exif = b"Exif\0\0".to_vec();
    exif.extend_from_slice(&tiff);

    let mut file = main[..2].to_vec();
    file.extend_from_slice(&[0xFF, 0xE1]);
    file.extend_from_slice(&((exif.len() + 2) as u16).to_be_bytes());
    file.extend_from_slice(&exif);
    file.extend_from_slice(&main[2..]);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, file).unwrap();
}

/// [`PathAccess`] with scripted denials and virtual folders
#[derive(Default)]
pub struct TestAccess {
    inner: PathAccess,
    denied: Mutex<HashSet<PathBuf>>,
    /// Virtual root -> directory that `coordinate_read` materialises
    redirects: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl TestAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(&self, path: &Path) {
        self.denied.lock().insert(UniversalPath::new(path).to_path_buf());
    }

    /// `root` cannot be listed directly; `coordinate_read` yields `target`
    pub fn redirect(&self, root: &Path, target: &Path) {
        self.redirects
            .lock()
            .insert(UniversalPath::new(root).to_path_buf(), target.to_path_buf());
    }

    pub fn active_grants(&self) -> usize {
        self.inner.active_grants()
    }

    fn is_virtual(&self, path: &Path) -> bool {
        self.redirects.lock().contains_key(path)
    }
}

impl AccessProvider for TestAccess {
    fn create_locator(&self, path: &Path) -> Result<Locator> {
        if self.is_virtual(path) {
            return Ok(Locator::from_bytes(UniversalPath::new(path).as_raw_bytes()));
        }
        self.inner.create_locator(path)
    }

    fn resolve(&self, locator: &Locator) -> Result<ResolvedLocation> {
        if let Some(path) = UniversalPath::from_raw_bytes(locator.as_bytes()) {
            if self.is_virtual(path.as_path()) {
                return Ok(ResolvedLocation { path, is_stale: false });
            }
        }
        self.inner.resolve(locator)
    }

    fn acquire(&self, root: &Path) -> Result<AccessToken> {
        if self.denied.lock().contains(root) {
            return Err(FsError::AccessDenied(root.display().to_string()));
        }
        if self.is_virtual(root) {
            return Ok(AccessToken::unscoped(root));
        }
        self.inner.acquire(root)
    }

    fn coordinate_read(&self, root: &Path) -> Result<PathBuf> {
        match self.redirects.lock().get(root) {
            Some(target) => Ok(target.clone()),
            None => Err(FsError::Enumeration(root.display().to_string())),
        }
    }
}

/// Registry, pool and engine over a `photos` folder under `root` holding `files`
pub async fn draw_setup(
    root: &Path,
    files: &[&str],
    settings: crate::DrawConfig,
) -> (Arc<crate::FolderRegistry>, Arc<crate::ImagePool>, crate::DrawEngine) {
    let folder = root.join("photos");
    std::fs::create_dir_all(&folder).unwrap();
    for name in files {
        write_image(&folder.join(name), 8, 8);
    }

    let store = Arc::new(MemoryStore::new());
    let access = Arc::new(PathAccess::new());
    let registry = Arc::new(
        crate::FolderRegistry::load(store.clone(), access.clone(), None, Handle::current()).unwrap(),
    );
    registry.add_paths(&[folder]);

    let pool = Arc::new(crate::ImagePool::new(access.clone()));
    pool.load_images(registry.included_folder_info()).await;

    let engine = crate::DrawEngine::new(
        Arc::clone(&registry),
        Arc::clone(&pool),
        crate::ImageLoader::new(access),
        crate::LastResultStore::new(store, root.join("cache")),
        settings,
        Handle::current(),
    );
    (registry, pool, engine)
}
