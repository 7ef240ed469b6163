//! Folder locators and scoped access grants
//!
//! A [`Locator`] is the persistable form of a user-granted folder. Before a
//! folder is read, an [`AccessToken`] is acquired from the
//! [`AccessProvider`]; the grant is released when the token is dropped.

use crate::{FsError, Result, UniversalPath};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Opaque, persistable reference to a folder
#[derive(Clone, PartialEq, Eq)]
pub struct Locator(Vec<u8>);

impl Locator {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        BASE64
            .decode(encoded.trim())
            .map(Self)
            .map_err(|e| FsError::InvalidLocator(e.to_string()))
    }
}

impl std::fmt::Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Locator({} bytes)", self.0.len())
    }
}

impl Serialize for Locator {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Locator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Result of resolving a locator
#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    pub path: UniversalPath,
    /// The grant still works but should be re-created from `path`
    pub is_stale: bool,
}

type ReleaseFn = Box<dyn FnOnce(&Path) + Send>;

/// A live read grant on a folder
///
/// Released exactly once, when dropped.
pub struct AccessToken {
    root: PathBuf,
    release: Option<ReleaseFn>,
}

impl AccessToken {
    /// Grant that needs no release (e.g. the shared container)
    pub fn unscoped(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), release: None }
    }

    /// Grant that runs `release` when dropped
    pub fn scoped(root: impl Into<PathBuf>, release: impl FnOnce(&Path) + Send + 'static) -> Self {
        Self {
            root: root.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_scoped(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for AccessToken {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(&self.root);
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("root", &self.root)
            .field("scoped", &self.is_scoped())
            .finish()
    }
}

/// Platform seam for folder grants
pub trait AccessProvider: Send + Sync {
    /// Create a locator for a folder the user just granted
    fn create_locator(&self, path: &Path) -> Result<Locator>;

    /// Resolve a stored locator back to a folder
    fn resolve(&self, locator: &Locator) -> Result<ResolvedLocation>;

    /// Start reading under `root`
    fn acquire(&self, root: &Path) -> Result<AccessToken>;

    /// Ask the owner of `root` to materialise it before enumeration is
    /// retried. Returns the path to enumerate.
    fn coordinate_read(&self, root: &Path) -> Result<PathBuf> {
        Ok(root.canonicalize()?)
    }
}

/// Desktop access provider: locators are raw path bytes
#[derive(Default)]
pub struct PathAccess {
    active: Arc<AtomicUsize>,
}

impl PathAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of grants currently held
    pub fn active_grants(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl AccessProvider for PathAccess {
    fn create_locator(&self, path: &Path) -> Result<Locator> {
        if !path.is_dir() {
            return Err(FsError::NotFound(path.display().to_string()));
        }
        Ok(Locator(UniversalPath::new(path).as_raw_bytes()))
    }

    fn resolve(&self, locator: &Locator) -> Result<ResolvedLocation> {
        let path = UniversalPath::from_raw_bytes(locator.as_bytes())
            .ok_or_else(|| FsError::InvalidLocator("empty locator".into()))?;

        if !path.is_dir() {
            return Err(FsError::NotFound(path.to_string()));
        }

        // Stored before canonicalisation (e.g. through a since-moved symlink)
        let is_stale = path.as_raw_bytes() != locator.as_bytes();
        Ok(ResolvedLocation { path, is_stale })
    }

    fn acquire(&self, root: &Path) -> Result<AccessToken> {
        match std::fs::read_dir(root) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(FsError::AccessDenied(root.display().to_string()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FsError::NotFound(root.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        self.active.fetch_add(1, Ordering::SeqCst);
        tracing::trace!("Access granted: {}", root.display());

        let active = Arc::clone(&self.active);
        Ok(AccessToken::scoped(root, move |root| {
            active.fetch_sub(1, Ordering::SeqCst);
            tracing::trace!("Access released: {}", root.display());
        }))
    }
}
