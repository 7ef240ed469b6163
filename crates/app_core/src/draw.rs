//! Draw engine
//!
//! A draw picks a pool entry (avoiding the image on screen), starts decoding
//! it at once, and reveals it no earlier than the configured pre-spin time.
//! When the full decode is slow a thumbnail is revealed first and replaced
//! once the full image lands. Every draw, restore and reset takes a new
//! ticket; work belonging to an older ticket is aborted or ignored.

use crate::config::DrawConfig;
use crate::image_loader::ImageLoader;
use crate::last_result::LastResultStore;
use crate::pool::{ImagePool, PoolEntry};
use crate::registry::FolderRegistry;
use crate::{AppError, DecodedImage, FolderInfo, ImageSource};
use app_fs::UniversalPath;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

/// Where the engine is in a draw
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DrawPhase {
    #[default]
    Idle,
    /// Waiting for the pre-spin to elapse; `target` is `None` when the pool
    /// emptied before a pick could be made
    Drawing { target: Option<UniversalPath> },
    /// A result was just revealed; the drawing state lingers briefly
    Revealing { source: ImageSource },
    /// Decoding the persisted last result
    Restoring { locator: UniversalPath },
}

/// Image on screen
#[derive(Debug, Clone)]
pub struct Shown {
    pub image: Arc<DecodedImage>,
    /// Source file; used to avoid drawing the same image twice in a row
    pub locator: Option<UniversalPath>,
}

/// Pre-selected next result and its preloaded bitmap
#[derive(Debug, Clone)]
pub struct Pending {
    pub locator: UniversalPath,
    pub image: Option<Arc<DecodedImage>>,
}

/// Published engine state
#[derive(Debug, Clone, Default)]
pub struct DrawSnapshot {
    pub phase: DrawPhase,
    pub current: Option<Shown>,
    pub pending: Option<Pending>,
}

impl DrawSnapshot {
    pub fn is_drawing(&self) -> bool {
        matches!(self.phase, DrawPhase::Drawing { .. } | DrawPhase::Revealing { .. })
    }

    pub fn is_restoring(&self) -> bool {
        matches!(self.phase, DrawPhase::Restoring { .. })
    }

    pub fn show_result(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_locator(&self) -> Option<&UniversalPath> {
        self.current.as_ref().and_then(|shown| shown.locator.as_ref())
    }

    pub fn current_source(&self) -> Option<ImageSource> {
        self.current.as_ref().map(|shown| shown.image.source)
    }
}

#[derive(Default)]
struct EngineState {
    ticket: u64,
    phase: DrawPhase,
    current: Option<Shown>,
    pending: Option<Pending>,
}

impl EngineState {
    fn snapshot(&self) -> DrawSnapshot {
        DrawSnapshot {
            phase: self.phase.clone(),
            current: self.current.clone(),
            pending: self.pending.clone(),
        }
    }
}

type LoadHandle = JoinHandle<Result<Arc<DecodedImage>, AppError>>;

struct Inner {
    registry: Arc<FolderRegistry>,
    pool: Arc<ImagePool>,
    loader: ImageLoader,
    last_result: LastResultStore,
    settings: DrawConfig,
    state: Mutex<EngineState>,
    updates: watch::Sender<DrawSnapshot>,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Held while the last result is written or cleared
    persisting: Mutex<()>,
    runtime: Handle,
}

#[derive(Clone)]
pub struct DrawEngine {
    inner: Arc<Inner>,
}

impl DrawEngine {
    pub fn new(
        registry: Arc<FolderRegistry>,
        pool: Arc<ImagePool>,
        loader: ImageLoader,
        last_result: LastResultStore,
        settings: DrawConfig,
        runtime: Handle,
    ) -> Self {
        let (updates, _) = watch::channel(DrawSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                registry,
                pool,
                loader,
                last_result,
                settings,
                state: Mutex::new(EngineState::default()),
                updates,
                task: Mutex::new(None),
                persisting: Mutex::new(()),
                runtime,
            }),
        }
    }

    /// Start a draw; returns `false` when there is nothing to draw from
    pub fn perform_random_draw(&self) -> bool {
        let inner = &self.inner;

        if !inner.registry.has_access() {
            tracing::info!("Draw skipped: no folder access");
            return false;
        }
        if inner.pool.is_empty() {
            tracing::info!("Draw skipped: the image pool is empty");
            return false;
        }

        let started = Instant::now();
        let excluding = inner.state.lock().current.as_ref().and_then(|shown| shown.locator.clone());
        let target = inner.pool.random_image(excluding.as_ref());

        let ticket = inner.update(|s| {
            s.ticket += 1;
            s.phase = DrawPhase::Drawing {
                target: target.as_ref().map(|entry| entry.path.clone()),
            };
            s.pending = target.as_ref().map(|entry| Pending {
                locator: entry.path.clone(),
                image: None,
            });
            s.ticket
        });

        match &target {
            Some(entry) => tracing::debug!("Draw #{} picked {}", ticket, entry.path),
            None => tracing::debug!("Draw #{} has no target yet", ticket),
        }

        let task_inner = Arc::clone(inner);
        let handle = inner
            .runtime
            .spawn(async move { task_inner.run_draw(ticket, target, excluding, started).await });
        inner.track(handle);
        true
    }

    /// A persisted last result exists and its folder is still registered
    pub fn has_stored_result(&self) -> bool {
        let Some(stored) = self.inner.last_result.load() else {
            return false;
        };
        let Some(folder) = stored.folder_path() else {
            return false;
        };
        self.inner.registry.all_resolved_folder_paths().contains(&folder)
    }

    /// Restore the last result unless something better is already on screen
    pub fn start_restore_if_needed(&self) -> bool {
        let snapshot = self.snapshot();
        if snapshot.is_drawing() || snapshot.is_restoring() {
            return false;
        }
        if snapshot.current_source() == Some(ImageSource::Full) {
            return false;
        }
        self.restore_last_result_if_available()
    }

    /// Decode the persisted last result in the background
    pub fn restore_last_result_if_available(&self) -> bool {
        let inner = &self.inner;

        if !inner.registry.has_access() {
            tracing::debug!("Restore skipped: no folder access");
            return false;
        }
        if !self.has_stored_result() {
            tracing::debug!("Restore skipped: no usable last result");
            return false;
        }
        let Some(stored) = inner.last_result.load() else {
            return false;
        };

        let locator = UniversalPath::new(stored.absolute_path());
        let ticket = inner.update(|s| {
            s.ticket += 1;
            s.phase = DrawPhase::Restoring {
                locator: locator.clone(),
            };
            s.ticket
        });
        tracing::info!("Restoring last result {}", locator);

        let task_inner = Arc::clone(inner);
        let handle = inner
            .runtime
            .spawn(async move { task_inner.run_restore(ticket, locator).await });
        inner.track(handle);
        true
    }

    /// Show the cached preview of the last result while nothing else is shown
    pub fn show_cached_preview_if_any(&self) -> bool {
        let inner = &self.inner;

        let Some(stored) = inner.last_result.load() else {
            return false;
        };
        if !self.has_stored_result() {
            return false;
        }
        let Some(preview) = inner.last_result.load_preview() else {
            return false;
        };

        let locator = UniversalPath::new(stored.absolute_path());
        let shown = inner.update(|s| {
            if s.current.is_some() || s.phase != DrawPhase::Idle {
                return false;
            }
            s.current = Some(Shown {
                image: Arc::new(preview),
                locator: Some(locator),
            });
            true
        });

        if shown {
            tracing::debug!("Showing cached preview");
        }
        shown
    }

    /// Back to idle, dropping everything in flight and on screen
    pub fn reset_draw(&self) {
        let inner = &self.inner;
        if let Some(task) = inner.task.lock().take() {
            task.abort();
        }
        inner.update(|s| {
            s.ticket += 1;
            s.phase = DrawPhase::Idle;
            s.current = None;
            s.pending = None;
        });
        tracing::debug!("Draw state reset");
    }

    /// Reset and forget the persisted last result and preview
    pub fn clear_all_data(&self) {
        self.reset_draw();
        // A write that passed its ticket check before the reset lands first
        let _persisting = self.inner.persisting.lock();
        self.inner.last_result.clear();
        tracing::info!("Draw data cleared");
    }

    /// Registry grants access and the pool has images
    pub fn can_draw(&self) -> bool {
        self.inner.registry.has_access() && !self.inner.pool.is_empty()
    }

    pub fn snapshot(&self) -> DrawSnapshot {
        self.inner.state.lock().snapshot()
    }

    pub fn current_image(&self) -> Option<Arc<DecodedImage>> {
        self.inner.state.lock().current.as_ref().map(|shown| Arc::clone(&shown.image))
    }

    pub fn subscribe(&self) -> watch::Receiver<DrawSnapshot> {
        self.inner.updates.subscribe()
    }

    /// Wait until no draw or restore is in flight
    pub async fn settled(&self) {
        let mut updates = self.subscribe();
        let _ = updates
            .wait_for(|s| !s.is_drawing() && !s.is_restoring())
            .await;
    }
}

impl Inner {
    /// Mutate the state and publish the result
    fn update<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> R {
        let mut state = self.state.lock();
        let result = f(&mut state);
        self.updates.send_replace(state.snapshot());
        result
    }

    fn track(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
    }

    async fn run_draw(
        self: Arc<Self>,
        ticket: u64,
        target: Option<PoolEntry>,
        excluding: Option<UniversalPath>,
        started: Instant,
    ) {
        let deadline = tokio::time::sleep_until(started + self.settings.pre_spin());
        tokio::pin!(deadline);

        let Some(entry) = target else {
            deadline.await;
            self.draw_in_background(ticket, excluding).await;
            return;
        };

        let owner = self.owner_of(&entry);
        let mut full = self.spawn_load_full(entry.path.clone(), owner.clone());
        let thumb = self.spawn_load_thumbnail(entry.path.clone(), owner);

        let mut preloaded = None;
        tokio::select! {
            res = &mut full => {
                preloaded = Some(joined(res));
            }
            _ = &mut deadline => {}
        }

        if preloaded.is_some() {
            thumb.abort();
        }
        match preloaded {
            Some(Ok(image)) => {
                self.store_pending(ticket, &entry.path, &image);
                deadline.await;
                self.finish_full(ticket, &entry.path, Ok(image)).await;
            }
            Some(Err(e)) => {
                deadline.await;
                self.fail(ticket, &entry.path, e);
            }
            None => self.reveal_two_stage(ticket, &entry.path, full, thumb).await,
        }
    }

    /// The full decode missed the pre-spin window: show the thumbnail if it
    /// lands first, then replace it
    async fn reveal_two_stage(
        self: &Arc<Self>,
        ticket: u64,
        locator: &UniversalPath,
        mut full: LoadHandle,
        mut thumb: LoadHandle,
    ) {
        tokio::select! {
            biased;
            res = &mut full => {
                thumb.abort();
                self.finish_full(ticket, locator, joined(res)).await;
                return;
            }
            res = &mut thumb => match joined(res) {
                Ok(image) => {
                    self.reveal(ticket, locator, image);
                }
                Err(e) => tracing::debug!("Thumbnail of {} failed: {}", locator, e),
            },
        }

        self.finish_full(ticket, locator, joined(full.await)).await;
    }

    /// The pool had no target when the draw started; pick again off the caller's path
    async fn draw_in_background(self: &Arc<Self>, ticket: u64, excluding: Option<UniversalPath>) {
        let Some(entry) = self.pool.random_image(excluding.as_ref()) else {
            tracing::info!("Draw #{} found nothing to draw", ticket);
            self.update(|s| {
                if s.ticket == ticket {
                    s.phase = DrawPhase::Idle;
                    s.pending = None;
                }
            });
            return;
        };

        self.update(|s| {
            if s.ticket == ticket {
                s.phase = DrawPhase::Drawing {
                    target: Some(entry.path.clone()),
                };
                s.pending = Some(Pending {
                    locator: entry.path.clone(),
                    image: None,
                });
            }
        });

        let owner = self.owner_of(&entry);
        let result = joined(self.spawn_load_full(entry.path.clone(), owner).await);
        self.finish_full(ticket, &entry.path, result).await;
    }

    async fn finish_full(
        self: &Arc<Self>,
        ticket: u64,
        locator: &UniversalPath,
        result: Result<Arc<DecodedImage>, AppError>,
    ) {
        match result {
            Ok(image) => {
                if self.reveal(ticket, locator, Arc::clone(&image)) {
                    self.persist(ticket, locator, image).await;
                    self.settle(ticket).await;
                }
            }
            Err(e) => self.fail(ticket, locator, e),
        }
    }

    fn store_pending(&self, ticket: u64, locator: &UniversalPath, image: &Arc<DecodedImage>) {
        self.update(|s| {
            if s.ticket != ticket {
                return;
            }
            if let Some(pending) = s.pending.as_mut().filter(|p| &p.locator == locator) {
                pending.image = Some(Arc::clone(image));
            }
        });
    }

    fn reveal(&self, ticket: u64, locator: &UniversalPath, image: Arc<DecodedImage>) -> bool {
        self.update(|s| {
            if s.ticket != ticket {
                tracing::debug!("Discarding result of superseded draw #{}", ticket);
                return false;
            }

            let source = image.source;
            if source == ImageSource::Full {
                s.pending = Some(Pending {
                    locator: locator.clone(),
                    image: Some(Arc::clone(&image)),
                });
            }
            s.phase = DrawPhase::Revealing { source };
            s.current = Some(Shown {
                image,
                locator: Some(locator.clone()),
            });
            true
        })
    }

    fn fail(&self, ticket: u64, locator: &UniversalPath, error: AppError) {
        tracing::warn!("Draw of {} failed: {}", locator, error);
        self.update(|s| {
            if s.ticket == ticket {
                s.phase = DrawPhase::Idle;
                s.pending = None;
            }
        });
    }

    /// Drawing state lingers for the overlap window, then goes idle
    async fn settle(&self, ticket: u64) {
        tokio::time::sleep(self.settings.reveal_overlap()).await;
        self.update(|s| {
            if s.ticket == ticket && matches!(s.phase, DrawPhase::Revealing { .. }) {
                s.phase = DrawPhase::Idle;
            }
        });
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.state.lock().ticket == ticket
    }

    /// Record the shown file and write its preview
    ///
    /// Runs to completion even if the draw task is aborted, so every write
    /// re-checks the ticket under the persist lock.
    async fn persist(self: &Arc<Self>, ticket: u64, locator: &UniversalPath, image: Arc<DecodedImage>) {
        let inner = Arc::clone(self);
        let locator = locator.clone();

        let written = self
            .runtime
            .spawn_blocking(move || -> Result<bool, AppError> {
                let owner = inner.registry.parent_folder(&locator).map(|folder| folder.path);
                let settings = &inner.settings;

                let _persisting = inner.persisting.lock();
                if !inner.is_current(ticket) {
                    return Ok(false);
                }
                inner.last_result.save(&locator, owner.as_ref())?;
                if !inner.is_current(ticket) {
                    return Ok(false);
                }
                inner
                    .last_result
                    .save_preview(&image, settings.preview_max_dimension, settings.preview_jpeg_quality)?;
                Ok(true)
            })
            .await;

        match written {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => tracing::debug!("Draw #{} superseded before its result was saved", ticket),
            Ok(Err(e)) => tracing::warn!("Cannot persist last result: {}", e),
            Err(e) => tracing::warn!("Persist task failed: {}", e),
        }
    }

    async fn run_restore(self: Arc<Self>, ticket: u64, locator: UniversalPath) {
        let owner = self.registry.parent_folder(&locator);
        let result = joined(self.spawn_load_full(locator.clone(), owner).await);

        match result {
            Ok(image) => {
                self.update(|s| {
                    if s.ticket != ticket {
                        return;
                    }
                    s.current = Some(Shown {
                        image: Arc::clone(&image),
                        locator: Some(locator.clone()),
                    });
                    s.pending = Some(Pending {
                        locator: locator.clone(),
                        image: Some(image),
                    });
                    s.phase = DrawPhase::Idle;
                });
                tracing::info!("Restored {}", locator);
            }
            Err(e) => {
                tracing::info!("Could not restore {}: {}", locator, e);
                self.update(|s| {
                    if s.ticket == ticket {
                        s.phase = DrawPhase::Idle;
                    }
                });
            }
        }
    }

    fn owner_of(&self, entry: &PoolEntry) -> Option<FolderInfo> {
        self.registry
            .folder_info(entry.folder)
            .or_else(|| self.registry.parent_folder(&entry.path))
    }

    fn spawn_load_full(&self, path: UniversalPath, owner: Option<FolderInfo>) -> LoadHandle {
        let loader = self.loader.clone();
        self.runtime
            .spawn_blocking(move || loader.load_full(&path, owner.as_ref()).map(Arc::new))
    }

    fn spawn_load_thumbnail(&self, path: UniversalPath, owner: Option<FolderInfo>) -> LoadHandle {
        let loader = self.loader.clone();
        let max_dimension = self.settings.thumbnail_max_dimension;
        self.runtime.spawn_blocking(move || {
            loader
                .load_thumbnail(&path, owner.as_ref(), max_dimension)
                .map(Arc::new)
        })
    }
}

fn joined<T>(result: Result<Result<T, AppError>, JoinError>) -> Result<T, AppError> {
    result.map_err(|e| AppError::ImageDecode(format!("decode task failed: {}", e)))?
}
