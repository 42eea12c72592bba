//! Virtual source tree over physical files.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    File Access Flow                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  import "google/protobuf/any.proto"                         │
//! │          │                                                  │
//! │          ├─► VirtualPath::new()     normalize, reject ".."  │
//! │          │                                                  │
//! │          ├─► SourceTree::resolve()  longest prefix → disk   │
//! │          │                                                  │
//! │          └─► FileLoader::load()     disk or in-memory       │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod loader;
mod path;
mod tree;

pub use loader::{decode_utf8, DiskLoader, FileLoader, LoadError, MapLoader};
pub use path::{normalize_prefix, PathError, VirtualPath};
pub use tree::{DiskMapping, ResolveError, SourceTree};
