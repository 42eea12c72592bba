//! Compilation error type.

use std::sync::Arc;

use thiserror::Error;

use super::info::Diagnostics;
use crate::descriptor::Descriptor;
use crate::file::VirtualPath;

/// A root that did not compile cleanly.
///
/// Still carries everything that did work: the root's descriptor when it
/// was published (but some import failed), every descriptor obtained during
/// the call, and the full diagnostic trail of the call.
///
/// # Example
///
/// ```ignore
/// match importer.compile(&root) {
///     Ok(desc) => println!("{} messages", desc.counts().messages),
///     Err(failure) => {
///         for diag in failure.diagnostics.errors() {
///             eprintln!("{diag}");
///         }
///         if let Some(partial) = &failure.descriptor {
///             println!("partial result for {}", partial.path);
///         }
///     }
/// }
/// ```
#[derive(Debug, Error)]
#[error("failed to compile \"{root}\": {}", diagnostics.summary())]
pub struct PartialFailure {
    /// The requested root.
    pub root: VirtualPath,
    /// The root's descriptor, if it was published despite failed imports.
    pub descriptor: Option<Arc<Descriptor>>,
    /// Every descriptor obtained during the call, in discovery order.
    pub compiled: Vec<Arc<Descriptor>>,
    /// Diagnostics reported during the call, in discovery order.
    pub diagnostics: Diagnostics,
}

impl PartialFailure {
    /// Whether at least the root itself was published.
    pub fn has_root(&self) -> bool {
        self.descriptor.is_some()
    }

    /// The published descriptor for `path`, if it was obtained during the call.
    pub fn find(&self, path: &VirtualPath) -> Option<&Arc<Descriptor>> {
        self.compiled.iter().find(|desc| desc.path == *path)
    }
}
