//! ShakeDraw Core Domain Logic
//!
//! This crate contains:
//! - Configuration and error types
//! - Folder registry (user-selected folders and their access grants)
//! - Image pool and random selection
//! - Draw engine, last-result persistence and restore
//! - Shake detection and slideshow
//! - Application state wiring everything together

pub mod config;
pub mod draw;
pub mod error;
pub mod folder;
pub mod image_loader;
pub mod last_result;
pub mod pool;
pub mod registry;
pub mod shake;
pub mod slideshow;
pub mod state;

#[cfg(test)]
mod test_support;

pub use config::{AppConfig, AppDirs, DrawConfig, GeneralConfig, ShakeConfig, SharedConfig, SlideshowConfig};
pub use draw::{DrawEngine, DrawPhase, DrawSnapshot, Pending, Shown};
pub use error::AppError;
pub use folder::{FolderInfo, ManagedFolder};
pub use image_loader::{DecodedImage, ImageLoader, ImageSource};
pub use last_result::{LastResultStore, StoredResult};
pub use pool::{ImagePool, PoolEntry, PoolStatus};
pub use registry::FolderRegistry;
pub use shake::{parse_sample, Acceleration, ShakeDetector};
pub use slideshow::{Slideshow, SlideshowControl, SlideshowHandle};
pub use state::AppState;
