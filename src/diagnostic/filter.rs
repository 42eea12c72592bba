//! Diagnostic filtering utilities.

use super::info::{Diagnostic, DiagnosticKind, Severity};

/// Filter type for matching diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterType {
    /// Match all diagnostics.
    All,
    /// Match diagnostics of one pipeline stage.
    Kind(DiagnosticKind),
    /// Match diagnostics attributed to files under a virtual path prefix.
    ///
    /// `"google/protobuf"` matches `google/protobuf/any.proto`.
    PathPrefix(String),
    /// Match diagnostics containing specific text in message.
    MessageContains(String),
}

impl FilterType {
    fn matches(&self, diag: &Diagnostic) -> bool {
        match self {
            FilterType::All => true,
            FilterType::Kind(kind) => diag.kind == *kind,
            FilterType::PathPrefix(prefix) => diag.path.strip_prefix(prefix).is_some(),
            FilterType::MessageContains(text) => diag.message.contains(text.as_str()),
        }
    }
}

/// Filter for excluding diagnostics.
///
/// Combines severity and filter type for precise control.
///
/// # Example
///
/// ```ignore
/// use proto_importer::diagnostic::{DiagnosticFilter, FilterType, Severity};
///
/// // Silence warnings coming from vendored well-known types
/// let filter = DiagnosticFilter::new(
///     Severity::Warning,
///     FilterType::PathPrefix("google/protobuf".into()),
/// );
/// let kept = diagnostics.filter_out(&[filter]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticFilter {
    /// The severity to match.
    pub severity: Severity,
    /// The filter type to apply.
    pub filter: FilterType,
}

impl DiagnosticFilter {
    /// Create a new diagnostic filter.
    pub fn new(severity: Severity, filter: FilterType) -> Self {
        Self { severity, filter }
    }

    /// Check if a diagnostic should be filtered out.
    pub fn matches(&self, diag: &Diagnostic) -> bool {
        diag.severity == self.severity && self.filter.matches(diag)
    }
}
