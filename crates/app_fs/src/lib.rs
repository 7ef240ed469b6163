//! ShakeDraw File System Layer
//!
//! Provides:
//! - UniversalPath: normalised path identity used for de-duplication
//! - Locators and scoped access tokens for user-granted folders
//! - Recursive image scanning
//! - The shared inbox written by the share-receiving side

mod universal_path;
mod access;
mod scan;
mod inbox;

pub use universal_path::UniversalPath;
pub use access::{AccessProvider, AccessToken, Locator, PathAccess, ResolvedLocation};
pub use scan::{count_images, is_hidden_name, is_supported_image, scan_images, SUPPORTED_EXTENSIONS};
pub use inbox::{detect_image_format, generate_file_name, InboxItem, SharedInbox};

use thiserror::Error;

/// File system errors
#[derive(Error, Debug)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Enumeration failed: {0}")]
    Enumeration(String),
}

pub type Result<T> = std::result::Result<T, FsError>;
