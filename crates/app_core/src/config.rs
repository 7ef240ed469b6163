//! Application configuration

use crate::AppError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub draw: DrawConfig,
    pub slideshow: SlideshowConfig,
    pub shake: ShakeConfig,
    pub shared: SharedConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub verbose_logging: bool,
    /// Overrides the platform data directory (settings database, shared inbox)
    pub data_dir: Option<PathBuf>,
}

/// Draw timing and image sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    /// Minimum time between draw start and reveal
    pub pre_spin_ms: u64,
    /// How long the drawing state overlaps the revealed result
    pub reveal_overlap_ms: u64,
    pub thumbnail_max_dimension: u32,
    pub preview_max_dimension: u32,
    pub preview_jpeg_quality: u8,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            pre_spin_ms: 350,
            reveal_overlap_ms: 80,
            thumbnail_max_dimension: 600,
            preview_max_dimension: 600,
            preview_jpeg_quality: 85,
        }
    }
}

impl DrawConfig {
    pub fn pre_spin(&self) -> Duration {
        Duration::from_millis(self.pre_spin_ms)
    }

    pub fn reveal_overlap(&self) -> Duration {
        Duration::from_millis(self.reveal_overlap_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideshowConfig {
    pub interval_secs: f64,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self { interval_secs: 3.0 }
    }
}

impl SlideshowConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs.max(0.1))
    }
}

/// Accelerometer shake detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShakeConfig {
    /// Acceleration threshold in g
    pub threshold: f64,
    pub min_interval_ms: u64,
    pub sample_interval_ms: u64,
}

impl Default for ShakeConfig {
    fn default() -> Self {
        Self {
            threshold: 1.8,
            min_interval_ms: 600,
            sample_interval_ms: 50,
        }
    }
}

/// Shared container fed by other apps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedConfig {
    pub enabled: bool,
    /// Defaults to `<data dir>/<folder_name>`
    pub container_dir: Option<PathBuf>,
    pub folder_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            container_dir: None,
            folder_name: "SharedImages".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when missing
    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::info!("Configuration loaded from {:?}", config_path);
            Ok(config)
        } else {
            tracing::info!("Using default configuration");
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        tracing::info!("Configuration saved to {:?}", config_path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        project_dirs()
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("./config.toml"))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "ShakeDraw", "ShakeDraw")
}

/// Resolved on-disk locations
#[derive(Debug, Clone)]
pub struct AppDirs {
    /// Settings database
    pub data: PathBuf,
    /// Last-result preview
    pub cache: PathBuf,
    /// Shared container, when enabled
    pub shared: Option<PathBuf>,
}

impl AppDirs {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let dirs = project_dirs();

        let data = match (&config.general.data_dir, &dirs) {
            (Some(dir), _) => dir.clone(),
            (None, Some(dirs)) => dirs.data_dir().to_path_buf(),
            (None, None) => return Err(AppError::Config("cannot determine a data directory".into())),
        };

        let cache = match (&config.general.data_dir, &dirs) {
            (None, Some(dirs)) => dirs.cache_dir().to_path_buf(),
            _ => data.join("cache"),
        };

        Ok(Self::with_base(data, cache, &config.shared))
    }

    /// Everything under one root (tests, portable installs)
    pub fn under(root: &Path, shared: &SharedConfig) -> Self {
        Self::with_base(root.join("data"), root.join("cache"), shared)
    }

    fn with_base(data: PathBuf, cache: PathBuf, shared: &SharedConfig) -> Self {
        let shared = shared.enabled.then(|| {
            shared
                .container_dir
                .clone()
                .unwrap_or_else(|| data.join(&shared.folder_name))
        });
        Self { data, cache, shared }
    }
}
