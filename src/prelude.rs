//! Prelude module for convenient imports.
//!
//! ```ignore
//! use proto_importer::prelude::*;
//! ```

// Compilation
pub use crate::cache::{EntryState, FailureReason};
pub use crate::compile::Importer;

// Descriptors
pub use crate::descriptor::{
    Descriptor, EnumDescriptor, FieldDescriptor, Linker, LookupError, MessageDescriptor,
    ProtoLinker, Registry, ServiceDescriptor, TypeRef,
};

// Parsing
pub use crate::syntax::{Parser, ProtoParser, SyntaxError, SyntaxTree};

// Diagnostics
pub use crate::diagnostic::{
    BufferSink, Diagnostic, DiagnosticFilter, DiagnosticKind, DiagnosticOptions, DiagnosticSink,
    Diagnostics, DiscardSink, DisplayStyle, PartialFailure, Severity, StreamSink, TracingSink,
};

// Files
pub use crate::file::{DiskLoader, DiskMapping, FileLoader, MapLoader, SourceTree, VirtualPath};

// Configuration
pub use crate::config::{Config, ConfigBuilder};
