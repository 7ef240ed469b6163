//! Managed folder records

use app_fs::{Locator, UniversalPath};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-selected folder (or the built-in shared container)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedFolder {
    pub id: Uuid,

    /// Persistable grant; `None` for the shared container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,

    #[serde(default = "default_include")]
    pub include_in_draw: bool,

    /// Cached absolute path, used for de-duplication and ownership lookups
    #[serde(default)]
    pub last_resolved_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub is_shared_container: bool,
}

fn default_include() -> bool {
    true
}

impl ManagedFolder {
    pub fn new(locator: Locator, path: &UniversalPath) -> Self {
        Self {
            id: Uuid::new_v4(),
            locator: Some(locator),
            include_in_draw: true,
            last_resolved_path: path.display().to_string(),
            display_name: path.file_name().map(str::to_string),
            is_shared_container: false,
        }
    }

    pub fn shared(path: &UniversalPath) -> Self {
        Self {
            id: Uuid::new_v4(),
            locator: None,
            include_in_draw: true,
            last_resolved_path: path.display().to_string(),
            display_name: None,
            is_shared_container: true,
        }
    }

    /// Label for listings
    pub fn name(&self) -> String {
        if self.is_shared_container {
            return "Shared".to_string();
        }
        self.display_name.clone().unwrap_or_else(|| {
            std::path::Path::new(&self.last_resolved_path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| self.last_resolved_path.clone())
        })
    }
}

/// A folder that currently resolves to a readable location
#[derive(Debug, Clone, PartialEq)]
pub struct FolderInfo {
    pub id: Uuid,
    pub path: UniversalPath,
    /// The shared container needs no access grant
    pub is_shared: bool,
    pub display_name: Option<String>,
}
