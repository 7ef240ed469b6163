//! Application error types

use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Recoverable Errors (log, resolve to empty result or unchanged state) =====
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Enumeration failed: {0}")]
    Enumeration(String),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Stale reference: {0}")]
    StaleReference(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ===== Fatal Errors (setup cannot continue) =====
    #[error("Database error: {0}")]
    Db(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Init(String),
}

impl AppError {
    /// Is this error recoverable?
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Io(_)
                | AppError::FileNotFound(_)
                | AppError::AccessDenied(_)
                | AppError::Enumeration(_)
                | AppError::ImageDecode(_)
                | AppError::UnsupportedFormat(_)
                | AppError::StaleReference(_)
                | AppError::Serialization(_)
        )
    }

    /// Is this a fatal error?
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Get a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AppError::FileNotFound(path) => format!("File not found: {}", path),
            AppError::AccessDenied(path) => format!("No permission to read {}. Please add the folder again.", path),
            AppError::Enumeration(path) => format!("Cannot list folder: {}", path),
            AppError::ImageDecode(msg) => format!("Cannot load image: {}", msg),
            AppError::UnsupportedFormat(path) => format!("{} is in a format that cannot be decoded", path),
            AppError::StaleReference(msg) => format!("The previous result is no longer available: {}", msg),
            _ => self.to_string(),
        }
    }
}

impl From<app_fs::FsError> for AppError {
    fn from(e: app_fs::FsError) -> Self {
        match e {
            app_fs::FsError::Io(e) => AppError::Io(e),
            app_fs::FsError::NotFound(p) => AppError::FileNotFound(p),
            app_fs::FsError::AccessDenied(p) => AppError::AccessDenied(p),
            app_fs::FsError::InvalidLocator(msg) => AppError::StaleReference(msg),
            app_fs::FsError::Enumeration(msg) => AppError::Enumeration(msg),
        }
    }
}

impl From<app_db::DbError> for AppError {
    fn from(e: app_db::DbError) -> Self {
        match e {
            app_db::DbError::Serialization(e) => AppError::Serialization(e),
            _ => AppError::Db(e.to_string()),
        }
    }
}

impl From<image::ImageError> for AppError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Unsupported(e) => AppError::UnsupportedFormat(e.to_string()),
            e => AppError::ImageDecode(e.to_string()),
        }
    }
}
