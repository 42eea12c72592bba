//! Overlay of physical directories onto virtual path prefixes.
//!
//! ```text
//! SourceTree
//! ├── "/proto"          → /app/test/proto
//! └── "google/protobuf" → /app/lib/protobuf-3.19.4/src/google/protobuf
//!
//! resolve("/proto/happyday.proto")
//!   1. pick the longest prefix matching the path     ("/proto")
//!   2. join the remainder onto that prefix's root    (/app/test/proto/happyday.proto)
//!   3. ask the loader whether the file exists        (lazy, never at map time)
//! ```
//!
//! Only the single longest matching prefix is consulted: a more specific
//! mapping is never bypassed in favour of a shorter one, regardless of the
//! order in which the two were registered.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use super::loader::{FileLoader, LoadError};
use super::path::{normalize_prefix, PathError, VirtualPath};

/// Why a virtual path could not be resolved to a physical file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No registered prefix covers the path.
    #[error("no mapping covers \"{0}\"")]
    NoMapping(VirtualPath),

    /// The path maps to a physical file that does not exist.
    #[error("\"{path}\" maps to {} which does not exist", physical.display())]
    Missing {
        /// The requested virtual path.
        path: VirtualPath,
        /// Where the mapping pointed.
        physical: PathBuf,
    },
}

/// Result of mapping a disk file back into the virtual namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskMapping {
    /// The file is reachable under this virtual path.
    Virtual(VirtualPath),
    /// The file lies under a mapped root, but its virtual path resolves to
    /// another physical file.
    Shadowed {
        /// The virtual path the file would have.
        path: VirtualPath,
        /// The physical file that path resolves to instead.
        by: PathBuf,
    },
    /// No mapped root contains the file.
    NoMapping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Mapping {
    prefix: String,
    root: PathBuf,
}

/// Virtual path mapper.
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    mappings: Vec<Mapping>,
}

impl SourceTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `root` under the virtual `prefix`.
    ///
    /// Registering the exact same prefix again replaces its root. This never
    /// touches the filesystem.
    pub fn map_path(&mut self, prefix: &str, root: impl Into<PathBuf>) -> Result<(), PathError> {
        let prefix = normalize_prefix(prefix)?;
        let root = root.into();
        tracing::debug!(prefix = %prefix, root = %root.display(), "mapping virtual prefix");

        match self.mappings.iter_mut().find(|m| m.prefix == prefix) {
            Some(existing) => existing.root = root,
            None => self.mappings.push(Mapping { prefix, root }),
        }
        Ok(())
    }

    /// Builder form of [`SourceTree::map_path`].
    pub fn with_mapping(mut self, prefix: &str, root: impl Into<PathBuf>) -> Result<Self, PathError> {
        self.map_path(prefix, root)?;
        Ok(self)
    }

    /// Registered `(prefix, root)` pairs in registration order.
    pub fn mappings(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.mappings
            .iter()
            .map(|m| (m.prefix.as_str(), m.root.as_path()))
    }

    /// Whether no mapping is registered.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Physical location of `path` under its longest matching prefix,
    /// without checking that the file exists.
    pub fn map(&self, path: &VirtualPath) -> Option<PathBuf> {
        let (mapping, rest) = self
            .mappings
            .iter()
            .filter_map(|m| path.strip_prefix(&m.prefix).map(|rest| (m, rest)))
            .max_by_key(|(m, _)| m.prefix.len())?;

        let mut physical = mapping.root.clone();
        physical.extend(rest.split('/').filter(|s| !s.is_empty()));
        Some(physical)
    }

    /// Resolve `path` to an existing physical file.
    pub fn resolve(&self, path: &VirtualPath, loader: &dyn FileLoader) -> Result<PathBuf, ResolveError> {
        let physical = self
            .map(path)
            .ok_or_else(|| ResolveError::NoMapping(path.clone()))?;

        if loader.exists(&physical) {
            tracing::trace!(%path, physical = %physical.display(), "resolved");
            Ok(physical)
        } else {
            Err(ResolveError::Missing {
                path: path.clone(),
                physical,
            })
        }
    }

    /// Map a physical file back to its virtual path.
    ///
    /// When several roots contain the file, the most specific root wins.
    pub fn disk_file_to_virtual(&self, disk: &Path) -> DiskMapping {
        let mut candidates: Vec<&Mapping> = self
            .mappings
            .iter()
            .filter(|m| disk.starts_with(&m.root))
            .collect();
        candidates.sort_by_key(|m| std::cmp::Reverse(m.root.components().count()));

        let mut shadowed = None;
        for mapping in candidates {
            let Some(path) = virtual_path_under(mapping, disk) else {
                continue;
            };
            match self.map(&path) {
                Some(physical) if physical == disk => return DiskMapping::Virtual(path),
                Some(physical) => {
                    shadowed.get_or_insert(DiskMapping::Shadowed { path, by: physical });
                }
                None => {}
            }
        }
        shadowed.unwrap_or(DiskMapping::NoMapping)
    }

    /// Every file ending in `extension` reachable through the mappings.
    ///
    /// Files whose virtual path resolves elsewhere are skipped. Roots that
    /// do not exist contribute nothing. The result is sorted.
    pub fn list_files(&self, extension: &str, loader: &dyn FileLoader) -> Result<Vec<VirtualPath>, LoadError> {
        let mut found = Vec::new();

        for mapping in &self.mappings {
            let files = match loader.walk(&mapping.root) {
                Ok(files) => files,
                Err(err) if err.is_not_found() => {
                    tracing::debug!(root = %mapping.root.display(), "mapped root does not exist");
                    continue;
                }
                Err(err) => return Err(err),
            };

            for file in files {
                let Some(path) = virtual_path_under(mapping, &file) else {
                    continue;
                };
                if path.has_extension(extension) && self.map(&path).as_deref() == Some(file.as_path()) {
                    found.push(path);
                }
            }
        }

        found.sort();
        found.dedup();
        Ok(found)
    }
}

/// Virtual path of `disk` under `mapping`, if it lies below its root.
fn virtual_path_under(mapping: &Mapping, disk: &Path) -> Option<VirtualPath> {
    let relative = disk.strip_prefix(&mapping.root).ok()?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?),
            _ => return None,
        }
    }
    let rest = segments.join("/");

    let joined = match mapping.prefix.as_str() {
        "" => rest,
        "/" => format!("/{rest}"),
        prefix if rest.is_empty() => prefix.to_owned(),
        prefix => format!("{prefix}/{rest}"),
    };
    VirtualPath::new(joined).ok()
}
