//! Image pool: the de-duplicated, shuffled list of drawable files

use crate::FolderInfo;
use app_fs::{scan_images, AccessProvider, AccessToken, UniversalPath};
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// A drawable image and the folder it was found in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    pub path: UniversalPath,
    pub folder: Uuid,
}

/// Published after every change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStatus {
    pub len: usize,
    pub loading: bool,
}

pub struct ImagePool {
    access: Arc<dyn AccessProvider>,
    entries: RwLock<Arc<Vec<PoolEntry>>>,
    loading: AtomicBool,
    generation: AtomicU64,
    status: watch::Sender<PoolStatus>,
}

impl ImagePool {
    pub fn new(access: Arc<dyn AccessProvider>) -> Self {
        let (status, _) = watch::channel(PoolStatus::default());
        Self {
            access,
            entries: RwLock::new(Arc::new(Vec::new())),
            loading: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            status,
        }
    }

    /// Rebuild the pool from `folders`
    ///
    /// Returns the number of images published, or `None` when a newer load
    /// superseded this one.
    pub async fn load_images(&self, folders: Vec<FolderInfo>) -> Option<usize> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        *self.entries.write() = Arc::new(Vec::new());
        self.loading.store(true, Ordering::SeqCst);
        self.publish();

        let access = Arc::clone(&self.access);
        let collected = tokio::task::spawn_blocking(move || collect_images(access.as_ref(), &folders)).await;

        let mut entries = match collected {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Image enumeration task failed: {}", e);
                Vec::new()
            }
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Image pool load superseded");
            return None;
        }

        entries.shuffle(&mut rand::thread_rng());
        let count = entries.len();

        *self.entries.write() = Arc::new(entries);
        self.loading.store(false, Ordering::SeqCst);
        self.publish();

        tracing::info!("Image pool ready: {} image(s)", count);
        Some(count)
    }

    /// Random entry, avoiding `excluding` whenever another entry exists
    pub fn random_image(&self, excluding: Option<&UniversalPath>) -> Option<PoolEntry> {
        let entries = self.snapshot();
        pick_random(&entries, excluding, &mut rand::thread_rng()).cloned()
    }

    pub fn snapshot(&self) -> Arc<Vec<PoolEntry>> {
        Arc::clone(&self.entries.read())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<PoolStatus> {
        self.status.subscribe()
    }

    fn publish(&self) {
        self.status.send_replace(PoolStatus {
            len: self.len(),
            loading: self.is_loading(),
        });
    }
}

/// Enumerate every folder, de-duplicating across folders
///
/// A folder that cannot be read contributes nothing; the call as a whole
/// never fails.
pub fn collect_images(access: &dyn AccessProvider, folders: &[FolderInfo]) -> Vec<PoolEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for folder in folders {
        let token = if folder.is_shared {
            AccessToken::unscoped(folder.path.as_path())
        } else {
            match access.acquire(folder.path.as_path()) {
                Ok(token) => token,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", folder.path, e);
                    continue;
                }
            }
        };

        let files = match scan_images(token.root()) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("Listing {} failed ({}), retrying with a coordinated read", folder.path, e);
                match access.coordinate_read(folder.path.as_path()).map(|root| scan_images(&root)) {
                    Ok(Ok(files)) => files,
                    Ok(Err(e)) | Err(e) => {
                        tracing::warn!("Skipping {}: {}", folder.path, e);
                        continue;
                    }
                }
            }
        };

        let before = entries.len();
        for path in files {
            if seen.insert(path.clone()) {
                entries.push(PoolEntry { path, folder: folder.id });
            }
        }
        tracing::debug!("{}: {} image(s)", folder.path, entries.len() - before);
    }

    entries
}

/// Selection rule for draws
///
/// - empty pool: nothing
/// - one entry: that entry, even when it is the excluded one
/// - otherwise: uniform pick among the entries other than `excluding`
pub fn pick_random<'a, R: Rng + ?Sized>(
    entries: &'a [PoolEntry],
    excluding: Option<&UniversalPath>,
    rng: &mut R,
) -> Option<&'a PoolEntry> {
    match entries.len() {
        0 => None,
        1 => entries.first(),
        _ => {
            let candidates: Vec<&PoolEntry> = entries
                .iter()
                .filter(|entry| Some(&entry.path) != excluding)
                .collect();

            if candidates.is_empty() {
                entries.choose(rng)
            } else {
                candidates.choose(rng).copied()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_image, TestAccess};
    use app_fs::PathAccess;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::path::Path;
    use tempfile::TempDir;

    fn entry(path: &str) -> PoolEntry {
        PoolEntry {
            path: UniversalPath::new(path),
            folder: Uuid::nil(),
        }
    }

    fn folder(path: &Path) -> FolderInfo {
        FolderInfo {
            id: Uuid::new_v4(),
            path: UniversalPath::new(path),
            is_shared: false,
            display_name: None,
        }
    }

    fn names(entries: &[PoolEntry]) -> Vec<String> {
        let mut names: Vec<_> = entries
            .iter()
            .map(|e| e.path.file_name().unwrap().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_pick_from_empty_pool() {
        let mut rng = StdRng::seed_from_u64(7);
        let excluded = UniversalPath::new("/a.jpg");
        assert!(pick_random(&[], None, &mut rng).is_none());
        assert!(pick_random(&[], Some(&excluded), &mut rng).is_none());
    }

    #[test]
    fn test_single_entry_repeats() {
        let mut rng = StdRng::seed_from_u64(7);
        let pool = vec![entry("/pics/a.jpg")];
        let picked = pick_random(&pool, Some(&pool[0].path), &mut rng).unwrap();
        assert_eq!(picked, &pool[0]);
    }

    #[test]
    fn test_two_entries_never_repeat() {
        let mut rng = StdRng::seed_from_u64(7);
        let pool = vec![entry("/pics/a.jpg"), entry("/pics/b.jpg")];
        for _ in 0..50 {
            let picked = pick_random(&pool, Some(&pool[0].path), &mut rng).unwrap();
            assert_eq!(picked.path, pool[1].path);
        }
    }

    #[test]
    fn test_larger_pool_avoids_excluded() {
        let mut rng = StdRng::seed_from_u64(42);
        let pool: Vec<_> = (0..10).map(|i| entry(&format!("/pics/{}.png", i))).collect();
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let picked = pick_random(&pool, Some(&pool[3].path), &mut rng).unwrap();
            assert_ne!(picked.path, pool[3].path);
            seen.insert(picked.path.clone());
        }
        assert_eq!(seen.len(), 9);

        // Unknown exclusion leaves every entry eligible
        let outside = UniversalPath::new("/elsewhere.png");
        assert!(pick_random(&pool, Some(&outside), &mut rng).is_some());
    }

    #[test]
    fn test_collect_filters_by_extension() {
        let dir = TempDir::new().unwrap();
        write_image(&dir.path().join("a.jpg"), 4, 4);
        write_image(&dir.path().join("b.png"), 4, 4);
        std::fs::write(dir.path().join("readme.txt"), b"hello").unwrap();

        let access = PathAccess::new();
        let entries = collect_images(&access, &[folder(dir.path())]);
        assert_eq!(names(&entries), vec!["a.jpg", "b.png"]);
        assert_eq!(access.active_grants(), 0);
    }

    #[test]
    fn test_collect_dedups_overlapping_folders() {
        let dir = TempDir::new().unwrap();
        let library = dir.path().join("library");
        write_image(&library.join("a.png"), 4, 4);
        write_image(&library.join("cats/b.png"), 4, 4);

        let access = PathAccess::new();
        let folders = [folder(&library), folder(&library.join("cats")), folder(&library)];
        let entries = collect_images(&access, &folders);

        assert_eq!(names(&entries), vec!["a.png", "b.png"]);
        // Entries keep the folder that found them first
        assert!(entries.iter().all(|e| e.folder == folders[0].id));
    }

    #[test]
    fn test_collect_tolerates_failing_folders() {
        let dir = TempDir::new().unwrap();
        let ok = dir.path().join("ok");
        let denied = dir.path().join("denied");
        write_image(&ok.join("a.png"), 4, 4);
        write_image(&denied.join("b.png"), 4, 4);

        let access = TestAccess::new();
        access.deny(&denied);
        let missing = dir.path().join("missing");

        let entries = collect_images(&access, &[folder(&denied), folder(&missing), folder(&ok)]);
        assert_eq!(names(&entries), vec!["a.png"]);
        assert_eq!(access.active_grants(), 0);
    }

    #[test]
    fn test_collect_retries_with_coordinated_read() {
        let dir = TempDir::new().unwrap();
        let materialised = dir.path().join("provider-cache");
        write_image(&materialised.join("c.jpg"), 4, 4);

        let virtual_root = Path::new("/provider/virtual/photos");
        let access = TestAccess::new();
        access.redirect(virtual_root, &materialised);

        let entries = collect_images(&access, &[folder(virtual_root)]);
        assert_eq!(names(&entries), vec!["c.jpg"]);
    }

    #[test]
    fn test_shared_folder_needs_no_grant() {
        let dir = TempDir::new().unwrap();
        write_image(&dir.path().join("shared.png"), 4, 4);

        let access = TestAccess::new();
        access.deny(dir.path());
        let shared = FolderInfo {
            is_shared: true,
            ..folder(dir.path())
        };

        assert_eq!(collect_images(&access, &[shared]).len(), 1);
    }

    #[tokio::test]
    async fn test_load_images_publishes() {
        let dir = TempDir::new().unwrap();
        write_image(&dir.path().join("a.jpg"), 4, 4);
        write_image(&dir.path().join("b.png"), 4, 4);

        let pool = ImagePool::new(Arc::new(PathAccess::new()));
        let status = pool.subscribe();
        assert!(pool.is_empty());

        let count = pool.load_images(vec![folder(dir.path())]).await;
        assert_eq!(count, Some(2));
        assert_eq!(pool.len(), 2);
        assert!(!pool.is_loading());
        assert_eq!(*status.borrow(), PoolStatus { len: 2, loading: false });

        let first = pool.random_image(None).unwrap();
        let second = pool.random_image(Some(&first.path)).unwrap();
        assert_ne!(first.path, second.path);

        // Reload from nothing empties the pool
        assert_eq!(pool.load_images(Vec::new()).await, Some(0));
        assert!(pool.random_image(None).is_none());
    }
}
