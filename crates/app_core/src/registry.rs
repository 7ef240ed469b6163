//! Folder registry
//!
//! Owns the user's folder list (plus the built-in shared container), keeps it
//! persisted as one JSON blob, and maintains per-folder image counts.

use crate::{AppError, FolderInfo, ManagedFolder};
use app_db::{DbError, KeyValueStore, KeyValueStoreExt};
use app_fs::{count_images, AccessProvider, AccessToken, Locator, UniversalPath};
use dashmap::DashMap;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use uuid::Uuid;

/// Store key of the folder list
pub const FOLDERS_KEY: &str = "folders";

/// Store key of the single-folder format that predates the folder list
pub const LEGACY_FOLDER_KEY: &str = "folder_bookmark";

pub struct FolderRegistry {
    store: Arc<dyn KeyValueStore>,
    access: Arc<dyn AccessProvider>,
    shared_container: Option<UniversalPath>,
    folders: RwLock<Vec<ManagedFolder>>,
    counts: Arc<DashMap<Uuid, usize>>,
    count_generation: Arc<AtomicU64>,
    revision: Arc<watch::Sender<u64>>,
    runtime: Handle,
}

impl FolderRegistry {
    /// Load the persisted folder list
    ///
    /// Migrates the legacy single-folder key and inserts the shared container
    /// record when one is configured but missing.
    pub fn load(
        store: Arc<dyn KeyValueStore>,
        access: Arc<dyn AccessProvider>,
        shared_container: Option<PathBuf>,
        runtime: Handle,
    ) -> Result<Self, AppError> {
        let mut folders: Vec<ManagedFolder> = match store.get_json(FOLDERS_KEY) {
            Ok(Some(folders)) => folders,
            Ok(None) => Vec::new(),
            Err(DbError::Serialization(e)) => {
                tracing::warn!("Discarding unreadable folder list: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut changed = migrate_legacy(store.as_ref(), access.as_ref(), &mut folders)?;

        let shared_container = shared_container.and_then(|dir| match std::fs::create_dir_all(&dir) {
            Ok(()) => Some(UniversalPath::new(&dir)),
            Err(e) => {
                tracing::warn!("Shared container {:?} unavailable: {}", dir, e);
                None
            }
        });

        if let Some(shared) = &shared_container {
            changed |= ensure_shared_record(&mut folders, shared);
        }

        let (revision, _) = watch::channel(0);
        let registry = Self {
            store,
            access,
            shared_container,
            folders: RwLock::new(folders),
            counts: Arc::new(DashMap::new()),
            count_generation: Arc::new(AtomicU64::new(0)),
            revision: Arc::new(revision),
            runtime,
        };

        if changed {
            registry.persist();
        }

        tracing::info!("Folder registry loaded with {} folder(s)", registry.folders.read().len());
        Ok(registry)
    }

    /// Startup pass: folders that no longer grant access stop taking part
    /// in draws. They are never removed. Returns the number disabled.
    pub fn validate_access(&self) -> usize {
        let mut disabled = 0;
        let mut changed = false;

        {
            let mut folders = self.folders.write();
            for folder in folders.iter_mut().filter(|f| !f.is_shared_container) {
                let Some(locator) = &folder.locator else {
                    if folder.include_in_draw {
                        tracing::warn!("Folder {} has no locator, excluding it from draws", folder.name());
                        folder.include_in_draw = false;
                        disabled += 1;
                        changed = true;
                    }
                    continue;
                };

                let failure = match self.access.resolve(locator) {
                    Ok(resolved) if resolved.is_stale => Some("access grant is stale".to_string()),
                    Ok(resolved) => {
                        if folder.last_resolved_path != resolved.path.display() {
                            folder.last_resolved_path = resolved.path.display().to_string();
                            changed = true;
                        }
                        self.access.acquire(resolved.path.as_path()).err().map(|e| e.to_string())
                    }
                    Err(e) => Some(e.to_string()),
                };

                if let Some(reason) = failure {
                    if folder.include_in_draw {
                        tracing::warn!("Lost access to {}: {}. Excluding it from draws", folder.name(), reason);
                        folder.include_in_draw = false;
                        disabled += 1;
                        changed = true;
                    }
                }
            }
        }

        if changed {
            self.persist();
            self.bump();
        }
        disabled
    }

    /// Register folders the user just granted; returns how many were new
    pub fn add_folders(&self, locators: Vec<Locator>) -> usize {
        let mut added = 0;

        {
            let mut folders = self.folders.write();
            let mut known: HashSet<UniversalPath> = folders
                .iter()
                .filter(|f| !f.last_resolved_path.is_empty())
                .map(|f| UniversalPath::new(&f.last_resolved_path))
                .collect();

            for locator in locators {
                let resolved = match self.access.resolve(&locator) {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        tracing::warn!("Cannot resolve selected folder: {}", e);
                        continue;
                    }
                };

                if !known.insert(resolved.path.clone()) {
                    tracing::info!("Folder already registered: {}", resolved.path);
                    continue;
                }

                tracing::info!("Folder added: {}", resolved.path);
                folders.push(ManagedFolder::new(locator, &resolved.path));
                added += 1;
            }
        }

        if added > 0 {
            self.persist();
            self.bump();
            self.spawn_recount();
        }
        added
    }

    /// Create locators for `paths` and register them
    pub fn add_paths(&self, paths: &[PathBuf]) -> usize {
        let locators = paths
            .iter()
            .filter_map(|path| match self.access.create_locator(path) {
                Ok(locator) => Some(locator),
                Err(e) => {
                    tracing::warn!("Cannot add folder {:?}: {}", path, e);
                    None
                }
            })
            .collect();
        self.add_folders(locators)
    }

    pub fn remove_folder(&self, id: Uuid) -> bool {
        self.remove_where(|f| f.id == id) > 0
    }

    /// Remove by position in [`folders`](Self::folders)
    pub fn remove_folders(&self, indices: &[usize]) -> usize {
        let ids: HashSet<Uuid> = {
            let folders = self.folders.read();
            indices.iter().filter_map(|&i| folders.get(i)).map(|f| f.id).collect()
        };
        self.remove_where(|f| ids.contains(&f.id))
    }

    /// Remove every user folder; the shared container stays
    pub fn clear_all_folders(&self) -> usize {
        self.remove_where(|_| true)
    }

    fn remove_where(&self, mut predicate: impl FnMut(&ManagedFolder) -> bool) -> usize {
        let removed: Vec<Uuid> = {
            let mut folders = self.folders.write();
            let mut removed = Vec::new();
            folders.retain(|f| {
                let remove = !f.is_shared_container && predicate(f);
                if remove {
                    removed.push(f.id);
                }
                !remove
            });
            removed
        };

        if removed.is_empty() {
            return 0;
        }

        for id in &removed {
            self.counts.remove(id);
        }
        tracing::info!("Removed {} folder(s)", removed.len());

        self.persist();
        self.bump();
        self.spawn_recount();
        removed.len()
    }

    /// Toggle participation in draws; counts stay valid
    pub fn update_include(&self, id: Uuid, include: bool) -> bool {
        let changed = {
            let mut folders = self.folders.write();
            match folders.iter_mut().find(|f| f.id == id) {
                Some(folder) if folder.include_in_draw != include => {
                    folder.include_in_draw = include;
                    true
                }
                _ => false,
            }
        };

        if changed {
            self.persist();
            self.bump();
        }
        changed
    }

    /// Snapshot of the folder list
    pub fn folders(&self) -> Vec<ManagedFolder> {
        self.folders.read().clone()
    }

    pub fn shared_container(&self) -> Option<&UniversalPath> {
        self.shared_container.as_ref()
    }

    /// Resolved locations of the folders taking part in draws
    pub fn included_folder_info(&self) -> Vec<FolderInfo> {
        self.collect_info(|f| f.include_in_draw)
    }

    /// Resolved locations of every folder
    pub fn all_folder_info(&self) -> Vec<FolderInfo> {
        self.collect_info(|_| true)
    }

    pub fn folder_info(&self, id: Uuid) -> Option<FolderInfo> {
        self.collect_info(|f| f.id == id).into_iter().next()
    }

    pub fn all_resolved_folder_paths(&self) -> Vec<UniversalPath> {
        self.all_folder_info().into_iter().map(|info| info.path).collect()
    }

    /// At least one included folder resolves
    pub fn has_access(&self) -> bool {
        let folders = self.folders();
        folders
            .iter()
            .filter(|f| f.include_in_draw)
            .any(|f| self.resolve(f).is_some())
    }

    /// The folder that owns `file`
    ///
    /// Included folders are preferred over excluded ones. Within each group
    /// the match is tried as a path prefix, then as a percent-decoded prefix,
    /// then as a run of whole path components anywhere in the file path.
    /// The deepest matching root wins.
    pub fn parent_folder(&self, file: &UniversalPath) -> Option<FolderInfo> {
        let all = self.all_folder_info();
        let included: HashSet<Uuid> = self
            .folders
            .read()
            .iter()
            .filter(|f| f.include_in_draw)
            .map(|f| f.id)
            .collect();

        let preferred: Vec<&FolderInfo> = all.iter().filter(|f| included.contains(&f.id)).collect();
        let everything: Vec<&FolderInfo> = all.iter().collect();

        find_owner(file, &preferred)
            .or_else(|| find_owner(file, &everything))
            .cloned()
    }

    /// Current image counts by folder id
    pub fn folder_counts(&self) -> HashMap<Uuid, usize> {
        self.counts.iter().map(|entry| (*entry.key(), *entry.value())).collect()
    }

    /// Recount images in every resolvable folder
    pub async fn refresh_folder_counts(&self) {
        let job = self.count_job();
        if let Err(e) = tokio::task::spawn_blocking(job).await {
            tracing::error!("Folder count task failed: {}", e);
        }
    }

    /// Notified on every list or count change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn spawn_recount(&self) {
        let job = self.count_job();
        self.runtime.spawn_blocking(job);
    }

    fn count_job(&self) -> impl FnOnce() + Send + 'static {
        let targets = self.all_folder_info();
        let access = Arc::clone(&self.access);
        let counts = Arc::clone(&self.counts);
        let revision = Arc::clone(&self.revision);
        let latest = Arc::clone(&self.count_generation);
        let generation = latest.fetch_add(1, Ordering::SeqCst) + 1;

        move || {
            let results: Vec<(Uuid, usize)> = targets
                .par_iter()
                .filter_map(|folder| count_folder(access.as_ref(), folder))
                .collect();

            if latest.load(Ordering::SeqCst) != generation {
                tracing::debug!("Folder count superseded");
                return;
            }

            counts.clear();
            for (id, count) in results {
                counts.insert(id, count);
            }
            revision.send_modify(|r| *r += 1);
            tracing::debug!("Folder counts refreshed ({} folders)", counts.len());
        }
    }

    fn resolve(&self, folder: &ManagedFolder) -> Option<UniversalPath> {
        if folder.is_shared_container {
            return self.shared_container.clone();
        }

        let locator = folder.locator.as_ref()?;
        match self.access.resolve(locator) {
            Ok(resolved) => Some(resolved.path),
            Err(e) => {
                tracing::debug!("Folder {} does not resolve: {}", folder.name(), e);
                None
            }
        }
    }

    fn collect_info(&self, filter: impl Fn(&ManagedFolder) -> bool) -> Vec<FolderInfo> {
        let folders = self.folders();
        folders
            .iter()
            .filter(|f| filter(f))
            .filter_map(|f| {
                self.resolve(f).map(|path| FolderInfo {
                    id: f.id,
                    path,
                    is_shared: f.is_shared_container,
                    display_name: f.display_name.clone(),
                })
            })
            .collect()
    }

    fn persist(&self) {
        let folders = self.folders.read();
        if let Err(e) = self.store.set_json(FOLDERS_KEY, &*folders) {
            tracing::error!("Failed to save folder list: {}", e);
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }
}

fn migrate_legacy(
    store: &dyn KeyValueStore,
    access: &dyn AccessProvider,
    folders: &mut Vec<ManagedFolder>,
) -> Result<bool, AppError> {
    let Some(encoded) = store.get(LEGACY_FOLDER_KEY)? else {
        return Ok(false);
    };

    match Locator::from_base64(&encoded) {
        Ok(locator) => {
            let folder = match access.resolve(&locator) {
                Ok(resolved) => ManagedFolder::new(locator, &resolved.path),
                Err(e) => {
                    tracing::warn!("Legacy folder does not resolve ({}); migrating it excluded", e);
                    ManagedFolder {
                        id: Uuid::new_v4(),
                        locator: Some(locator),
                        include_in_draw: false,
                        last_resolved_path: String::new(),
                        display_name: None,
                        is_shared_container: false,
                    }
                }
            };

            let duplicate = !folder.last_resolved_path.is_empty()
                && folders.iter().any(|f| f.last_resolved_path == folder.last_resolved_path);
            if !duplicate {
                tracing::info!("Migrated legacy folder {}", folder.last_resolved_path);
                folders.push(folder);
            }
        }
        Err(e) => tracing::warn!("Dropping unreadable legacy folder reference: {}", e),
    }

    store.remove(LEGACY_FOLDER_KEY)?;
    Ok(true)
}

fn ensure_shared_record(folders: &mut Vec<ManagedFolder>, shared: &UniversalPath) -> bool {
    let mut changed = false;

    // At most one shared record
    let mut seen = false;
    folders.retain(|f| {
        if !f.is_shared_container {
            return true;
        }
        let keep = !seen;
        seen = true;
        changed |= !keep;
        keep
    });

    match folders.iter_mut().find(|f| f.is_shared_container) {
        Some(existing) => {
            if existing.last_resolved_path != shared.display() {
                existing.last_resolved_path = shared.display().to_string();
                changed = true;
            }
        }
        None => {
            tracing::info!("Created shared folder record at {}", shared);
            folders.insert(0, ManagedFolder::shared(shared));
            changed = true;
        }
    }
    changed
}

fn count_folder(access: &dyn AccessProvider, folder: &FolderInfo) -> Option<(Uuid, usize)> {
    let token = if folder.is_shared {
        AccessToken::unscoped(folder.path.as_path())
    } else {
        match access.acquire(folder.path.as_path()) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Skipping count for {}: {}", folder.path, e);
                return None;
            }
        }
    };

    match count_images(token.root()) {
        Ok(count) => Some((folder.id, count)),
        Err(e) => {
            tracing::warn!("Skipping count for {}: {}", folder.path, e);
            None
        }
    }
}

type MatchFn = fn(&UniversalPath, &UniversalPath) -> bool;

fn find_owner<'a>(file: &UniversalPath, candidates: &[&'a FolderInfo]) -> Option<&'a FolderInfo> {
    let strategies: [MatchFn; 3] = [is_prefix, is_decoded_prefix, contains_components];

    for matches in strategies {
        let best = candidates
            .iter()
            .copied()
            .filter(|folder| matches(file, &folder.path))
            .max_by_key(|folder| folder.path.as_path().components().count());
        if best.is_some() {
            return best;
        }
    }
    None
}

fn is_prefix(file: &UniversalPath, root: &UniversalPath) -> bool {
    file != root && file.starts_with(root)
}

fn is_decoded_prefix(file: &UniversalPath, root: &UniversalPath) -> bool {
    let file = file.percent_decoded();
    let root = root.percent_decoded();
    file != root && Path::new(&file).starts_with(&root)
}

/// `root`'s components appear as a contiguous run inside `file`'s parent
/// directories (e.g. the same folder seen through a different mount point)
fn contains_components(file: &UniversalPath, root: &UniversalPath) -> bool {
    let file = file.percent_decoded();
    let root = root.percent_decoded();

    let normal = |path: &str| -> Vec<String> {
        Path::new(path)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().to_string()),
                _ => None,
            })
            .collect()
    };

    let file_parts = normal(&file);
    let root_parts = normal(&root);

    if root_parts.is_empty() || root_parts.len() >= file_parts.len() {
        return false;
    }

    file_parts[..file_parts.len() - 1]
        .windows(root_parts.len())
        .any(|window| window == root_parts.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_image, TestAccess};
    use app_db::MemoryStore;
    use app_fs::PathAccess;
    use tempfile::TempDir;

    fn registry_with(store: Arc<MemoryStore>, access: Arc<dyn AccessProvider>, shared: Option<PathBuf>) -> FolderRegistry {
        FolderRegistry::load(store, access, shared, Handle::current()).unwrap()
    }

    fn mkdir(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_add_same_folder_twice() {
        let dir = TempDir::new().unwrap();
        let cats = mkdir(dir.path(), "cats");
        let registry = registry_with(Arc::new(MemoryStore::new()), Arc::new(PathAccess::new()), None);

        assert_eq!(registry.add_paths(&[cats.clone()]), 1);
        assert_eq!(registry.add_paths(&[cats.join(".").join("..").join("cats")]), 0);

        // Duplicates inside one batch
        let dogs = mkdir(dir.path(), "dogs");
        assert_eq!(registry.add_paths(&[dogs.clone(), dogs]), 1);

        assert_eq!(registry.folders().len(), 2);
        assert!(registry.folders().iter().all(|f| f.include_in_draw));
    }

    #[tokio::test]
    async fn test_persisted_and_reloaded() {
        let dir = TempDir::new().unwrap();
        let cats = mkdir(dir.path(), "cats");
        let store = Arc::new(MemoryStore::new());

        let id = {
            let registry = registry_with(Arc::clone(&store), Arc::new(PathAccess::new()), None);
            registry.add_paths(&[cats]);
            let id = registry.folders()[0].id;
            assert!(registry.update_include(id, false));
            id
        };

        let registry = registry_with(store, Arc::new(PathAccess::new()), None);
        let folders = registry.folders();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].id, id);
        assert!(!folders[0].include_in_draw);
        assert!(registry.included_folder_info().is_empty());
        assert!(!registry.has_access());
    }

    #[tokio::test]
    async fn test_shared_folder_survives_clear() {
        let dir = TempDir::new().unwrap();
        let shared = dir.path().join("SharedImages");
        let registry = registry_with(Arc::new(MemoryStore::new()), Arc::new(PathAccess::new()), Some(shared.clone()));

        assert!(shared.is_dir());
        registry.add_paths(&[mkdir(dir.path(), "a"), mkdir(dir.path(), "b")]);
        assert_eq!(registry.folders().len(), 3);

        assert_eq!(registry.clear_all_folders(), 2);
        let folders = registry.folders();
        assert_eq!(folders.len(), 1);
        assert!(folders[0].is_shared_container);

        // Cannot be removed individually either
        assert!(!registry.remove_folder(folders[0].id));
        assert_eq!(registry.remove_folders(&[0]), 0);
        assert!(registry.has_access());
    }

    #[tokio::test]
    async fn test_shared_record_created_once() {
        let dir = TempDir::new().unwrap();
        let shared = dir.path().join("SharedImages");
        let store = Arc::new(MemoryStore::new());

        registry_with(Arc::clone(&store), Arc::new(PathAccess::new()), Some(shared.clone()));
        let registry = registry_with(store, Arc::new(PathAccess::new()), Some(shared));

        let shared_count = registry.folders().iter().filter(|f| f.is_shared_container).count();
        assert_eq!(shared_count, 1);
    }

    #[tokio::test]
    async fn test_remove_by_index() {
        let dir = TempDir::new().unwrap();
        let registry = registry_with(Arc::new(MemoryStore::new()), Arc::new(PathAccess::new()), None);
        registry.add_paths(&[mkdir(dir.path(), "a"), mkdir(dir.path(), "b"), mkdir(dir.path(), "c")]);

        assert_eq!(registry.remove_folders(&[0, 2, 9]), 2);
        let names: Vec<_> = registry.folders().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[tokio::test]
    async fn test_validate_access_excludes_but_keeps() {
        let dir = TempDir::new().unwrap();
        let keep = mkdir(dir.path(), "keep");
        let revoked = mkdir(dir.path(), "revoked");
        let gone = mkdir(dir.path(), "gone");

        let access = Arc::new(TestAccess::new());
        let registry = registry_with(Arc::new(MemoryStore::new()), access.clone(), None);
        registry.add_paths(&[keep, revoked.clone(), gone.clone()]);

        access.deny(&revoked);
        std::fs::remove_dir(&gone).unwrap();

        assert_eq!(registry.validate_access(), 2);
        let folders = registry.folders();
        assert_eq!(folders.len(), 3);
        let included: Vec<_> = folders.iter().filter(|f| f.include_in_draw).map(|f| f.name()).collect();
        assert_eq!(included, vec!["keep"]);

        // Nothing left to disable
        assert_eq!(registry.validate_access(), 0);
    }

    #[tokio::test]
    async fn test_legacy_folder_migrated() {
        let dir = TempDir::new().unwrap();
        let legacy = mkdir(dir.path(), "legacy");
        let access = Arc::new(PathAccess::new());
        let store = Arc::new(MemoryStore::new());

        let locator = access.create_locator(&legacy).unwrap();
        store.set(LEGACY_FOLDER_KEY, &locator.to_base64()).unwrap();

        let registry = registry_with(Arc::clone(&store), access, None);
        let folders = registry.folders();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].locator.as_ref(), Some(&locator));
        assert!(folders[0].include_in_draw);

        assert_eq!(store.get(LEGACY_FOLDER_KEY).unwrap(), None);
        assert!(store.get(FOLDERS_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unreadable_folder_list_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        store.set(FOLDERS_KEY, "[{broken").unwrap();

        let registry = registry_with(store, Arc::new(PathAccess::new()), None);
        assert!(registry.folders().is_empty());
    }

    #[tokio::test]
    async fn test_parent_folder_prefers_deepest_and_included() {
        let dir = TempDir::new().unwrap();
        let library = mkdir(dir.path(), "library");
        let cats = mkdir(&library, "cats");
        let registry = registry_with(Arc::new(MemoryStore::new()), Arc::new(PathAccess::new()), None);
        registry.add_paths(&[library.clone(), cats.clone()]);

        let file = UniversalPath::new(cats.join("tabby.png"));
        let owner = registry.parent_folder(&file).unwrap();
        assert_eq!(owner.path, UniversalPath::new(&cats));

        // Excluded folders only match when no included folder does
        let cats_id = owner.id;
        registry.update_include(cats_id, false);
        let owner = registry.parent_folder(&file).unwrap();
        assert_eq!(owner.path, UniversalPath::new(&library));

        let library_id = owner.id;
        registry.update_include(library_id, false);
        let owner = registry.parent_folder(&file).unwrap();
        assert_eq!(owner.id, cats_id);
    }

    #[tokio::test]
    async fn test_parent_folder_fallback_strategies() {
        let dir = TempDir::new().unwrap();
        let photos = mkdir(dir.path(), "My Photos");
        let registry = registry_with(Arc::new(MemoryStore::new()), Arc::new(PathAccess::new()), None);
        registry.add_paths(&[photos.clone()]);
        let root = UniversalPath::new(&photos);

        // Percent-encoded spelling of the same folder
        let encoded = root.display().replace("My Photos", "My%20Photos");
        let file = UniversalPath::new(format!("{}/a.jpg", encoded));
        assert_eq!(registry.parent_folder(&file).map(|f| f.path), Some(root.clone()));

        // Same folder seen through another mount point
        let mounted = UniversalPath::new(format!("/mnt/mirror{}/nested/b.jpg", root.display()));
        assert_eq!(registry.parent_folder(&mounted).map(|f| f.path), Some(root.clone()));

        // A sibling sharing a name fragment is not a match
        let sibling = UniversalPath::new(format!("{} Backup/c.jpg", root.display()));
        assert!(registry.parent_folder(&sibling).is_none());

        let unrelated = UniversalPath::new("/somewhere/else/d.jpg");
        assert!(registry.parent_folder(&unrelated).is_none());
    }

    #[tokio::test]
    async fn test_refresh_folder_counts() {
        let dir = TempDir::new().unwrap();
        let cats = mkdir(dir.path(), "cats");
        let dogs = mkdir(dir.path(), "dogs");
        write_image(&cats.join("a.png"), 4, 4);
        write_image(&cats.join("nested/b.jpg"), 4, 4);
        std::fs::write(cats.join("notes.txt"), b"x").unwrap();
        write_image(&dogs.join("c.png"), 4, 4);

        let access = Arc::new(TestAccess::new());
        let registry = registry_with(Arc::new(MemoryStore::new()), access.clone(), None);
        registry.add_paths(&[cats.clone(), dogs.clone()]);
        access.deny(&dogs);

        let mut revisions = registry.subscribe();
        revisions.borrow_and_update();
        registry.refresh_folder_counts().await;
        assert!(revisions.has_changed().unwrap());

        let counts = registry.folder_counts();
        let cats_id = registry.folders()[0].id;
        assert_eq!(counts.get(&cats_id), Some(&2));
        assert_eq!(counts.len(), 1);
    }

    #[test]
    fn test_contains_components_is_aligned() {
        let root = UniversalPath::new("/library/cats");
        assert!(contains_components(&UniversalPath::new("/mnt/library/cats/a.jpg"), &root));
        assert!(!contains_components(&UniversalPath::new("/mnt/library/catsup/a.jpg"), &root));
        assert!(!contains_components(&UniversalPath::new("/mnt/library/cats"), &root));
    }
}
