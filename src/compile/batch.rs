//! Parallel compilation of many roots.
//!
//! Each root is one worker. Workers share the importer's cache, so a file
//! imported by several roots is compiled by whichever worker claims it
//! first; the others wait for it (or detect a cycle through it).

use std::sync::Arc;

use rayon::prelude::*;

use crate::descriptor::Descriptor;
use crate::diagnostic::PartialFailure;
use crate::file::VirtualPath;

use super::Importer;

pub(super) fn compile_parallel(
    importer: &Importer,
    roots: &[VirtualPath],
) -> Vec<Result<Arc<Descriptor>, PartialFailure>> {
    if roots.is_empty() {
        return Vec::new();
    }

    tracing::debug!(roots = roots.len(), "batch compile");
    roots.par_iter().map(|root| importer.compile(root)).collect()
}
