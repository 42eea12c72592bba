//! Normalized virtual paths.
//!
//! A [`VirtualPath`] is the logical name of a schema file inside the overlaid
//! source tree, e.g. `/proto/happyday.proto` or `google/protobuf/any.proto`.
//! It is the key of the descriptor cache and of the source tree mappings, so
//! two spellings of the same file must compare equal:
//!
//! ```text
//! "proto//a/./b.proto"  ──►  "proto/a/b.proto"
//! "/proto/a.proto"      ──►  "/proto/a.proto"   (leading slash is kept)
//! "../a.proto"          ──►  PathError::ParentReference
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Reasons a string is not a valid virtual path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path has no segments left after normalization.
    #[error("virtual path is empty")]
    Empty,

    /// The path contains a `..` segment.
    #[error("\"..\" is not allowed in virtual path \"{0}\"")]
    ParentReference(String),

    /// The path contains a backslash.
    #[error("backslashes are not allowed in virtual path \"{0}\"")]
    Backslash(String),
}

/// A normalized, slash-separated logical file name.
///
/// Cloning is cheap (the string is reference counted).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualPath(Arc<str>);

impl VirtualPath {
    /// Normalize `raw` into a virtual path.
    ///
    /// Empty and `.` segments are dropped and a single leading `/` is kept.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, PathError> {
        let normalized = normalize(raw.as_ref())?;
        if normalized.is_empty() || normalized == "/" {
            return Err(PathError::Empty);
        }
        Ok(Self(normalized.into()))
    }

    /// The normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the path starts with `/`.
    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/')
    }

    /// The last segment of the path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Whether the file name ends with `extension` (e.g. `".proto"`).
    pub fn has_extension(&self, extension: &str) -> bool {
        self.file_name().ends_with(extension)
    }

    /// Strip a normalized mapping prefix, returning the remainder.
    ///
    /// Matching is segment-wise: `/proto` matches `/proto/a.proto` and
    /// `/proto` itself, but not `/protobuf/a.proto`. The empty prefix matches
    /// every relative path, and `/` matches every absolute path.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        let path = self.as_str();
        match prefix {
            "" => (!self.is_absolute()).then_some(path),
            "/" => path.strip_prefix('/'),
            _ => {
                let rest = path.strip_prefix(prefix)?;
                if rest.is_empty() {
                    Some(rest)
                } else {
                    rest.strip_prefix('/')
                }
            }
        }
    }
}

/// Normalize a mapping prefix.
///
/// Unlike [`VirtualPath::new`], the empty prefix and `/` are valid results.
pub fn normalize_prefix(raw: &str) -> Result<String, PathError> {
    normalize(raw)
}

fn normalize(raw: &str) -> Result<String, PathError> {
    if raw.contains('\\') {
        return Err(PathError::Backslash(raw.to_owned()));
    }

    let mut out = String::with_capacity(raw.len());
    if raw.starts_with('/') {
        out.push('/');
    }

    let mut first = true;
    for segment in raw.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(PathError::ParentReference(raw.to_owned())),
            _ => {}
        }
        if !first {
            out.push('/');
        }
        out.push_str(segment);
        first = false;
    }

    Ok(out)
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPath({:?})", &*self.0)
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for VirtualPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for VirtualPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_slashes_and_dots() {
        let path = VirtualPath::new("proto//a/./b.proto").unwrap();
        assert_eq!(path.as_str(), "proto/a/b.proto");
        assert_eq!(path, VirtualPath::new("./proto/a/b.proto").unwrap());
    }

    #[test]
    fn test_keeps_leading_slash() {
        let path = VirtualPath::new("//proto/happyday.proto").unwrap();
        assert_eq!(path.as_str(), "/proto/happyday.proto");
        assert!(path.is_absolute());
        assert_ne!(path, VirtualPath::new("proto/happyday.proto").unwrap());
    }

    #[test]
    fn test_rejects_parent_reference() {
        assert!(matches!(
            VirtualPath::new("a/../b.proto"),
            Err(PathError::ParentReference(_))
        ));
    }

    #[test]
    fn test_rejects_backslash_and_empty() {
        assert!(matches!(
            VirtualPath::new("a\\b.proto"),
            Err(PathError::Backslash(_))
        ));
        assert_eq!(VirtualPath::new(""), Err(PathError::Empty));
        assert_eq!(VirtualPath::new("/./"), Err(PathError::Empty));
    }

    #[test]
    fn test_file_name_and_extension() {
        let path = VirtualPath::new("google/protobuf/timestamp.proto").unwrap();
        assert_eq!(path.file_name(), "timestamp.proto");
        assert!(path.has_extension(".proto"));
    }

    #[test]
    fn test_strip_prefix_is_segment_wise() {
        let path = VirtualPath::new("/proto/happyday.proto").unwrap();
        assert_eq!(path.strip_prefix("/proto"), Some("happyday.proto"));
        assert_eq!(path.strip_prefix("/"), Some("proto/happyday.proto"));
        assert_eq!(path.strip_prefix("/pro"), None);
        assert_eq!(path.strip_prefix(""), None);

        let relative = VirtualPath::new("a/b.proto").unwrap();
        assert_eq!(relative.strip_prefix(""), Some("a/b.proto"));
        assert_eq!(relative.strip_prefix("a/b.proto"), Some(""));
    }

    #[test]
    fn test_normalize_prefix_allows_root_forms() {
        assert_eq!(normalize_prefix("").unwrap(), "");
        assert_eq!(normalize_prefix("/").unwrap(), "/");
        assert_eq!(normalize_prefix("google/protobuf/").unwrap(), "google/protobuf");
    }
}
