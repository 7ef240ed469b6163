//! Application state management

use crate::config::{AppConfig, AppDirs};
use crate::draw::DrawEngine;
use crate::image_loader::ImageLoader;
use crate::last_result::LastResultStore;
use crate::pool::ImagePool;
use crate::registry::FolderRegistry;
use crate::AppError;
use app_db::{KeyValueStore, SqliteStore};
use app_fs::{AccessProvider, PathAccess, SharedInbox};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use uuid::Uuid;

/// Main application state
///
/// Owns every long-lived component; the presentation layer holds one of
/// these and drives it.
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Resolved on-disk locations
    dirs: AppDirs,

    /// User-selected folders
    registry: Arc<FolderRegistry>,

    /// Drawable images of the included folders
    pool: Arc<ImagePool>,

    /// Draw state machine
    engine: DrawEngine,

    /// Inbox of the shared container, when enabled
    inbox: Option<SharedInbox>,
}

impl AppState {
    /// Open the settings database in the configured data directory
    pub fn open(config: AppConfig, runtime: Handle) -> Result<Self, AppError> {
        let dirs = AppDirs::from_config(&config)?;
        let store = SqliteStore::open(&dirs.data)?;

        Self::with_parts(config, Arc::new(store), Arc::new(PathAccess::new()), dirs, runtime)
    }

    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        access: Arc<dyn AccessProvider>,
        dirs: AppDirs,
        runtime: Handle,
    ) -> Result<Self, AppError> {
        let registry = Arc::new(FolderRegistry::load(
            Arc::clone(&store),
            Arc::clone(&access),
            dirs.shared.clone(),
            runtime.clone(),
        )?);
        let pool = Arc::new(ImagePool::new(Arc::clone(&access)));

        let engine = DrawEngine::new(
            Arc::clone(&registry),
            Arc::clone(&pool),
            ImageLoader::new(access),
            LastResultStore::new(store, dirs.cache.clone()),
            config.draw.clone(),
            runtime,
        );

        let inbox = registry
            .shared_container()
            .map(|root| SharedInbox::new(root.to_path_buf()));

        Ok(Self {
            config,
            dirs,
            registry,
            pool,
            engine,
            inbox,
        })
    }

    /// Launch sequence: validate grants, show the cached preview, restore
    /// the last result while the pool loads, then recount folders
    pub async fn startup(&self) {
        let disabled = self.registry.validate_access();
        if disabled > 0 {
            tracing::warn!("{} folder(s) excluded after losing access", disabled);
        }

        self.engine.show_cached_preview_if_any();
        self.load_images_if_needed(false).await;
        self.registry.refresh_folder_counts().await;
    }

    /// Load the pool from the included folders
    ///
    /// Does nothing without access or included folders. Unless
    /// `suppress_restore` is set, the last result starts restoring before
    /// enumeration begins.
    pub async fn load_images_if_needed(&self, suppress_restore: bool) -> usize {
        if !self.registry.has_access() {
            tracing::debug!("Pool load skipped: no folder access");
            return 0;
        }

        let folders = self.registry.included_folder_info();
        if folders.is_empty() {
            tracing::debug!("Pool load skipped: no included folders");
            return 0;
        }

        if !suppress_restore {
            self.engine.start_restore_if_needed();
        }

        self.pool.load_images(folders).await.unwrap_or(0)
    }

    /// Rebuild the pool after the folder set changed
    pub async fn rebuild_pool(&self) -> usize {
        if !self.registry.has_access() {
            self.on_access_lost();
        }
        self.pool
            .load_images(self.registry.included_folder_info())
            .await
            .unwrap_or(0)
    }

    pub async fn add_folder_paths(&self, paths: &[PathBuf]) -> usize {
        let added = self.registry.add_paths(paths);
        if added > 0 {
            self.rebuild_pool().await;
        }
        added
    }

    /// Remove by position in the folder listing
    pub async fn remove_folders(&self, indices: &[usize]) -> usize {
        let removed = self.registry.remove_folders(indices);
        if removed > 0 {
            self.rebuild_pool().await;
        }
        removed
    }

    pub async fn set_include(&self, id: Uuid, include: bool) -> bool {
        let changed = self.registry.update_include(id, include);
        if changed {
            self.rebuild_pool().await;
        }
        changed
    }

    pub async fn clear_folders(&self) -> usize {
        let removed = self.registry.clear_all_folders();
        self.rebuild_pool().await;
        removed
    }

    /// Store image bytes in the shared container and make them drawable
    pub async fn import_shared_bytes(&self, data: &[u8]) -> Result<PathBuf, AppError> {
        let path = self.shared_inbox()?.save_bytes(data)?;
        self.after_inbox_change().await;
        Ok(path)
    }

    /// Copy an image file into the shared container
    pub async fn import_shared_file(&self, source: &Path) -> Result<PathBuf, AppError> {
        let path = self.shared_inbox()?.import_file(source)?;
        self.after_inbox_change().await;
        Ok(path)
    }

    pub async fn delete_shared(&self, paths: &[PathBuf]) -> Result<usize, AppError> {
        let deleted = self.shared_inbox()?.delete(paths)?;
        if deleted > 0 {
            self.after_inbox_change().await;
        }
        Ok(deleted)
    }

    /// Folder access went away while running
    pub fn on_access_lost(&self) {
        tracing::info!("Folder access lost, resetting draw state");
        self.engine.reset_draw();
    }

    /// Reset the draw state and forget the persisted last result
    pub fn clear_all_data(&self) {
        self.engine.clear_all_data();
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn dirs(&self) -> &AppDirs {
        &self.dirs
    }

    pub fn registry(&self) -> &Arc<FolderRegistry> {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<ImagePool> {
        &self.pool
    }

    pub fn engine(&self) -> &DrawEngine {
        &self.engine
    }

    pub fn inbox(&self) -> Option<&SharedInbox> {
        self.inbox.as_ref()
    }

    fn shared_inbox(&self) -> Result<&SharedInbox, AppError> {
        self.inbox
            .as_ref()
            .ok_or_else(|| AppError::Config("the shared container is disabled".into()))
    }

    async fn after_inbox_change(&self) {
        self.registry.refresh_folder_counts().await;
        self.rebuild_pool().await;
    }
}
