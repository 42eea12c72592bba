//! Reading physical files.
//!
//! The importer never touches the filesystem directly; it goes through a
//! [`FileLoader`]. [`DiskLoader`] reads the real filesystem, [`MapLoader`]
//! serves files from memory (useful for embedding well-known schemas or for
//! tests).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Why a physical file could not be loaded.
///
/// Variants are distinguishable so callers can report the precise reason.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but may not be read.
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// The path names a directory.
    #[error("is a directory: {}", .0.display())]
    IsDirectory(PathBuf),

    /// The content is not UTF-8.
    #[error("file is not valid UTF-8: {}", .0.display())]
    InvalidUtf8(PathBuf),

    /// Any other I/O failure.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

impl LoadError {
    /// Classify an I/O error for `path`.
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// The physical path the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(path)
            | Self::PermissionDenied(path)
            | Self::IsDirectory(path)
            | Self::InvalidUtf8(path) => path,
            Self::Io { path, .. } => path,
        }
    }

    /// Whether the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// =============================================================================
// FileLoader Trait
// =============================================================================

/// Source of physical file contents.
///
/// Implementations must be `Send + Sync` because imports may be compiled
/// from several threads at once.
pub trait FileLoader: Send + Sync {
    /// Whether a file (not a directory) exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Read `path` as UTF-8 text.
    fn load(&self, path: &Path) -> Result<String, LoadError>;

    /// List every file below the directory `root`, recursively.
    ///
    /// The default lists nothing.
    fn walk(&self, _root: &Path) -> Result<Vec<PathBuf>, LoadError> {
        Ok(Vec::new())
    }
}

impl<L: FileLoader + ?Sized> FileLoader for Arc<L> {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn load(&self, path: &Path) -> Result<String, LoadError> {
        (**self).load(path)
    }

    fn walk(&self, root: &Path) -> Result<Vec<PathBuf>, LoadError> {
        (**self).walk(root)
    }
}

/// Decode bytes as UTF-8, stripping a BOM if present.
pub fn decode_utf8(mut buf: Vec<u8>, path: &Path) -> Result<String, LoadError> {
    if buf.starts_with(b"\xef\xbb\xbf") {
        buf.drain(..3);
    }
    String::from_utf8(buf).map_err(|_| LoadError::InvalidUtf8(path.to_path_buf()))
}

// =============================================================================
// DiskLoader
// =============================================================================

/// Loader backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskLoader;

impl FileLoader for DiskLoader {
    /// Regular files exist; directories and missing paths do not. A path
    /// whose metadata may not be read counts as existing so that loading
    /// it reports the permission problem.
    fn exists(&self, path: &Path) -> bool {
        match fs::metadata(path) {
            Ok(meta) => meta.is_file(),
            Err(err) => err.kind() == io::ErrorKind::PermissionDenied,
        }
    }

    fn load(&self, path: &Path) -> Result<String, LoadError> {
        read_disk(path).and_then(|bytes| decode_utf8(bytes, path))
    }

    fn walk(&self, root: &Path) -> Result<Vec<PathBuf>, LoadError> {
        let mut files = Vec::new();
        walk_disk(root, &mut files)?;
        files.sort();
        Ok(files)
    }
}

/// Read file from disk.
fn read_disk(path: &Path) -> Result<Vec<u8>, LoadError> {
    let map_err = |e| LoadError::from_io(e, path);
    fs::metadata(path).map_err(map_err).and_then(|m| {
        if m.is_dir() {
            Err(LoadError::IsDirectory(path.to_path_buf()))
        } else {
            fs::read(path).map_err(map_err)
        }
    })
}

fn walk_disk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), LoadError> {
    let entries = fs::read_dir(dir).map_err(|e| LoadError::from_io(e, dir))?;
    for entry in entries {
        let entry = entry.map_err(|e| LoadError::from_io(e, dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| LoadError::from_io(e, &path))?;
        if file_type.is_dir() {
            walk_disk(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

// =============================================================================
// MapLoader
// =============================================================================

/// A simple map-based in-memory loader.
///
/// # Example
///
/// ```
/// use proto_importer::file::{FileLoader, MapLoader};
/// use std::path::Path;
///
/// let mut loader = MapLoader::new();
/// loader.insert("/schemas/a.proto", "syntax = \"proto3\";");
/// assert!(loader.exists(Path::new("/schemas/a.proto")));
/// ```
#[derive(Debug, Default, Clone)]
pub struct MapLoader {
    files: FxHashMap<PathBuf, Vec<u8>>,
}

impl MapLoader {
    /// Create a new empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file with string content.
    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl AsRef<str>) {
        self.files
            .insert(path.into(), content.as_ref().as_bytes().to_vec());
    }

    /// Insert a file with binary content.
    pub fn insert_bytes(&mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), content.into());
    }

    /// Builder form of [`MapLoader::insert`].
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl AsRef<str>) -> Self {
        self.insert(path, content);
        self
    }

    /// Remove a file.
    pub fn remove(&mut self, path: &Path) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileLoader for MapLoader {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn load(&self, path: &Path) -> Result<String, LoadError> {
        let bytes = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_path_buf()))?;
        decode_utf8(bytes, path)
    }

    fn walk(&self, root: &Path) -> Result<Vec<PathBuf>, LoadError> {
        let mut files: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|path| path.starts_with(root) && path.as_path() != root)
            .cloned()
            .collect();
        files.sort();
        Ok(files)
    }
}
