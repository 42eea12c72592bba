//! Diagnostics: structured records, sinks, filtering and formatting.

mod error;
mod filter;
mod format;
mod info;
mod sink;

pub use error::PartialFailure;
pub use filter::{DiagnosticFilter, FilterType};
pub use format::{
    format_diagnostics, format_diagnostics_with_options, format_diagnostics_with_sources,
    DiagnosticOptions, DisplayStyle,
};
pub use info::{
    count_diagnostics, has_errors, Diagnostic, DiagnosticKind, DiagnosticSummary, Diagnostics,
    Severity,
};
pub use sink::{BufferSink, DiagnosticSink, DiscardSink, StreamSink, TracingSink};
