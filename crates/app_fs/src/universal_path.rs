//! UniversalPath - normalised path identity

use percent_encoding::percent_decode_str;
use std::ffi::OsString;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// A normalised absolute path
///
/// Features:
/// - Canonicalised when the path exists, so two spellings of the same
///   directory (or a symlink to it) compare equal
/// - Lexically normalised (`.`/`..` removed) when it does not
/// - Hash-based ID for cheap identity checks
/// - Raw bytes preservation for non-UTF8 paths
#[derive(Debug, Clone)]
pub struct UniversalPath {
    /// Normalised path for file system operations
    raw: PathBuf,

    /// UTF-8 display string (lossy conversion for logs and UI)
    display: String,

    /// xxh3 of the display string
    id: u64,
}

impl UniversalPath {
    /// Create a new UniversalPath from any path-like type
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let raw = Self::normalize_path(path.as_ref());
        let display = raw.to_string_lossy().to_string();
        let id = xxh3_64(display.as_bytes());

        Self { raw, display, id }
    }

    /// Reconstruct from stored bytes
    pub fn from_raw_bytes(bytes: &[u8]) -> Option<Self> {
        let path = Self::bytes_to_path(bytes)?;
        Some(Self::new(path))
    }

    /// Get the path for file system operations
    pub fn as_path(&self) -> &Path {
        &self.raw
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.raw.clone()
    }

    /// Get the display string
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Get the hash ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Raw bytes for persistence (preserves non-UTF8 paths)
    pub fn as_raw_bytes(&self) -> Vec<u8> {
        Self::path_to_bytes(&self.raw)
    }

    pub fn parent(&self) -> Option<Self> {
        self.raw.parent().map(Self::new)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.raw.file_name()?.to_str()
    }

    pub fn extension(&self) -> Option<&str> {
        self.raw.extension()?.to_str()
    }

    pub fn exists(&self) -> bool {
        self.raw.exists()
    }

    pub fn is_dir(&self) -> bool {
        self.raw.is_dir()
    }

    /// Join with another path component
    pub fn join<P: AsRef<Path>>(&self, path: P) -> Self {
        Self::new(self.raw.join(path))
    }

    /// Component-wise prefix check (`/a/bc` does not start with `/a/b`)
    pub fn starts_with(&self, root: &UniversalPath) -> bool {
        self.raw.starts_with(&root.raw)
    }

    /// Path relative to `root`, if this path lives under it
    pub fn strip_root(&self, root: &UniversalPath) -> Option<PathBuf> {
        self.raw.strip_prefix(&root.raw).ok().map(Path::to_path_buf)
    }

    /// Display string with `%XX` escapes decoded
    pub fn percent_decoded(&self) -> String {
        percent_decode_str(&self.display).decode_utf8_lossy().into_owned()
    }

    fn normalize_path(path: &Path) -> PathBuf {
        if let Ok(canonical) = path.canonicalize() {
            return canonical;
        }

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        };

        let mut normalized = PathBuf::new();
        for component in absolute.components() {
            match component {
                Component::ParentDir => {
                    normalized.pop();
                }
                Component::CurDir => {}
                _ => normalized.push(component),
            }
        }
        normalized
    }

    #[cfg(windows)]
    fn path_to_bytes(path: &Path) -> Vec<u8> {
        use std::os::windows::ffi::OsStrExt;

        path.as_os_str()
            .encode_wide()
            .flat_map(|c| c.to_le_bytes())
            .collect()
    }

    #[cfg(not(windows))]
    fn path_to_bytes(path: &Path) -> Vec<u8> {
        use std::os::unix::ffi::OsStrExt;
        path.as_os_str().as_bytes().to_vec()
    }

    #[cfg(windows)]
    fn bytes_to_path(bytes: &[u8]) -> Option<PathBuf> {
        use std::os::windows::ffi::OsStringExt;

        if bytes.is_empty() || bytes.len() % 2 != 0 {
            return None;
        }

        let wide: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
            .collect();

        Some(PathBuf::from(OsString::from_wide(&wide)))
    }

    #[cfg(not(windows))]
    fn bytes_to_path(bytes: &[u8]) -> Option<PathBuf> {
        use std::os::unix::ffi::OsStringExt;

        if bytes.is_empty() {
            return None;
        }
        Some(PathBuf::from(OsString::from_vec(bytes.to_vec())))
    }
}

impl PartialEq for UniversalPath {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.raw == other.raw
    }
}

impl Eq for UniversalPath {}

impl Hash for UniversalPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl AsRef<Path> for UniversalPath {
    fn as_ref(&self) -> &Path {
        &self.raw
    }
}

impl From<PathBuf> for UniversalPath {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for UniversalPath {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<&str> for UniversalPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl std::fmt::Display for UniversalPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let display = self.display.strip_prefix(r"\\?\").unwrap_or(&self.display);
        write!(f, "{}", display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_same_directory_different_spelling() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("photos")).unwrap();

        let a = UniversalPath::new(dir.path().join("photos"));
        let b = UniversalPath::new(dir.path().join("photos").join(".").join("..").join("photos"));
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_missing_path_is_normalized_lexically() {
        let path = UniversalPath::new("/definitely/not/../here/image.jpg");
        assert_eq!(path.as_path(), Path::new("/definitely/here/image.jpg"));
        assert_eq!(path.extension(), Some("jpg"));
    }

    #[test]
    fn test_strip_root_is_component_aware() {
        let root = UniversalPath::new("/library/cats");
        let inside = UniversalPath::new("/library/cats/2024/tabby.png");
        let sibling = UniversalPath::new("/library/catsup/bottle.png");

        assert!(inside.starts_with(&root));
        assert_eq!(inside.strip_root(&root), Some(PathBuf::from("2024/tabby.png")));
        assert!(!sibling.starts_with(&root));
        assert_eq!(sibling.strip_root(&root), None);
    }

    #[test]
    fn test_percent_decoded() {
        let path = UniversalPath::new("/library/My%20Photos/a.jpg");
        assert_eq!(path.percent_decoded(), "/library/My Photos/a.jpg");
    }

    #[test]
    fn test_raw_bytes_roundtrip_and_empty() {
        let path = UniversalPath::new("/library/cats");
        let restored = UniversalPath::from_raw_bytes(&path.as_raw_bytes()).unwrap();
        assert_eq!(path, restored);
        assert!(UniversalPath::from_raw_bytes(&[]).is_none());
    }
}
