//! Structured diagnostic records.

use std::fmt;

use crate::file::VirtualPath;

use super::filter::DiagnosticFilter;
use super::format::{format_diagnostics_with_options, DiagnosticOptions};

// ============================================================================
// Severity & Kind
// ============================================================================

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// The file (or an import edge) could not be compiled.
    Error,
    /// Compilation succeeded, but something looks wrong.
    Warning,
}

impl Severity {
    /// Lowercase label used in output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stage of the import pipeline produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// An imported (or root) virtual path does not resolve to a file.
    PathNotFound,
    /// The file resolved, but reading it failed.
    IoFailure,
    /// The parser rejected the file.
    SyntaxError,
    /// An import closes a cycle.
    ImportCycle,
    /// A type name could not be bound to a declaration.
    UnresolvedReference,
    /// Any other linking problem.
    BindFailure,
}

impl DiagnosticKind {
    /// Kebab-case label used in output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PathNotFound => "path-not-found",
            Self::IoFailure => "io-failure",
            Self::SyntaxError => "syntax-error",
            Self::ImportCycle => "import-cycle",
            Self::UnresolvedReference => "unresolved-reference",
            Self::BindFailure => "bind-failure",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Diagnostic
// ============================================================================

/// One error or warning, attributed to a position in a virtual file.
///
/// Lines and columns are 1-based. `0:0` means the diagnostic concerns the
/// file as a whole (for example a root file that could not be found).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// File the diagnostic is attributed to.
    pub path: VirtualPath,
    /// Line (1-based, 0 = none).
    pub line: u32,
    /// Column (1-based, 0 = none).
    pub column: u32,
    /// Error or warning.
    pub severity: Severity,
    /// Pipeline stage.
    pub kind: DiagnosticKind,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(
        kind: DiagnosticKind,
        path: VirtualPath,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path,
            line,
            column,
            severity: Severity::Error,
            kind,
            message: message.into(),
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(
        kind: DiagnosticKind,
        path: VirtualPath,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, path, line, column, message)
        }
    }

    /// Whether this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Whether the diagnostic points at a position inside the file.
    pub fn has_position(&self) -> bool {
        self.line > 0
    }

    /// `path:line:column`, or just `path` without a position.
    pub fn location(&self) -> String {
        if self.has_position() {
            format!("{}:{}:{}", self.path, self.line, self.column)
        } else {
            self.path.to_string()
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location(), self.severity, self.message)
    }
}

// ============================================================================
// DiagnosticSummary
// ============================================================================

/// Summary of diagnostic counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticSummary {
    /// Number of errors.
    pub errors: usize,
    /// Number of warnings.
    pub warnings: usize,
}

impl DiagnosticSummary {
    /// Count the diagnostics in a slice.
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        let (errors, warnings) = count_diagnostics(diagnostics);
        Self { errors, warnings }
    }

    /// Total number of diagnostics.
    pub fn total(&self) -> usize {
        self.errors + self.warnings
    }

    /// Whether there are any errors.
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// Whether there are any diagnostics at all.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for DiagnosticSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.errors, self.warnings) {
            (0, 0) => write!(f, "no diagnostics"),
            (e, 0) => write!(f, "{e} error{}", if e == 1 { "" } else { "s" }),
            (0, w) => write!(f, "{w} warning{}", if w == 1 { "" } else { "s" }),
            (e, w) => write!(
                f,
                "{e} error{}, {w} warning{}",
                if e == 1 { "" } else { "s" },
                if w == 1 { "" } else { "s" }
            ),
        }
    }
}

/// Count `(errors, warnings)`.
pub fn count_diagnostics(diagnostics: &[Diagnostic]) -> (usize, usize) {
    diagnostics
        .iter()
        .fold((0, 0), |(errors, warnings), d| match d.severity {
            Severity::Error => (errors + 1, warnings),
            Severity::Warning => (errors, warnings + 1),
        })
}

/// Whether any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

// ============================================================================
// Diagnostics (Collection)
// ============================================================================

/// An ordered collection of diagnostics, in order of discovery.
///
/// # Example
///
/// ```ignore
/// let failure = importer.compile(&root).unwrap_err();
/// for diag in failure.diagnostics.errors() {
///     eprintln!("{diag}");
/// }
/// eprintln!("{}", failure.diagnostics.summary());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Check if there are no diagnostics.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the number of diagnostics.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        has_errors(&self.items)
    }

    /// Count errors.
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Count warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Get a summary of diagnostic counts.
    pub fn summary(&self) -> DiagnosticSummary {
        DiagnosticSummary::from_diagnostics(&self.items)
    }

    /// Iterate over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Iterate over errors only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Iterate over warnings only.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    /// Iterate over diagnostics of one kind.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    /// Drop every diagnostic matched by any of `filters`.
    pub fn filter_out(self, filters: &[DiagnosticFilter]) -> Self {
        self.items
            .into_iter()
            .filter(|d| !filters.iter().any(|f| f.matches(d)))
            .collect()
    }

    /// Format all diagnostics with the given options.
    pub fn format(&self, options: &DiagnosticOptions) -> String {
        format_diagnostics_with_options(&self.items, options)
    }

    /// Borrow the underlying slice.
    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    /// Consume into the underlying vector.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(&DiagnosticOptions::plain()))
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(items: Vec<Diagnostic>) -> Self {
        Self { items }
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
