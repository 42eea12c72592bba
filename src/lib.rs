//! # proto-importer
//!
//! Import resolution for protobuf schemas over a virtual source tree.
//!
//! Schema files name their imports with virtual paths
//! (`import "google/protobuf/timestamp.proto";`). This crate maps those
//! paths onto disk through prefix mappings, loads and parses each file,
//! follows its imports depth-first and links the result into a
//! [`Descriptor`]. Every file is compiled at most once per [`Importer`],
//! even when several roots are compiled concurrently, and every problem
//! along the way becomes a positioned [`Diagnostic`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use proto_importer::prelude::*;
//!
//! let tree = SourceTree::new()
//!     .with_mapping("/proto", "/app/test/proto")?
//!     .with_mapping("google/protobuf", "/app/lib/protobuf-3.19.4/src/google/protobuf")?;
//!
//! let importer = Importer::new(tree).with_sink(StreamSink::stderr());
//! let desc = importer.compile(&VirtualPath::new("/proto/happyday.proto")?)?;
//! println!("{}", desc.summary_json());
//! ```
//!
//! ## Modules
//!
//! - [`mod@file`]: virtual paths, prefix mappings and file loaders
//! - [`syntax`]: the [`Parser`] seam and the built-in protobuf parser
//! - [`descriptor`]: linked descriptors, the [`Linker`] seam and the registry
//! - [`cache`]: the per-file compilation state machine
//! - [`compile`]: the [`Importer`] itself
//! - [`diagnostic`]: diagnostics, sinks and formatting
//! - [`config`]: process-wide defaults

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod compile;
pub mod config;
pub mod descriptor;
pub mod diagnostic;
pub mod file;
pub mod prelude;
pub mod syntax;

// =============================================================================
// Compilation
// =============================================================================

pub use compile::Importer;
pub use descriptor::{Descriptor, Linker, ProtoLinker, Registry};
pub use syntax::{Parser, ProtoParser, SyntaxTree};

// =============================================================================
// Diagnostics
// =============================================================================

pub use diagnostic::{
    // Records
    Diagnostic, DiagnosticKind, Diagnostics, Severity,
    // Where they go
    BufferSink, DiagnosticSink, DiscardSink, StreamSink, TracingSink,
    // Failure of a compile call
    PartialFailure,
};

// =============================================================================
// Infrastructure
// =============================================================================

pub use config::{Config, ConfigBuilder};
pub use file::{DiskLoader, FileLoader, MapLoader, SourceTree, VirtualPath};
