//! Diagnostic formatting utilities.

use std::fmt::Write;

use crate::file::VirtualPath;

use super::info::{Diagnostic, Severity};

// ============================================================================
// Options
// ============================================================================

/// Display style for diagnostic output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayStyle {
    /// Header plus location gutter, with a source snippet when available.
    #[default]
    Rich,
    /// One line per diagnostic: `path:line:col: severity: message`.
    Short,
}

/// Options for controlling diagnostic formatting.
///
/// # Example
///
/// ```ignore
/// use proto_importer::diagnostic::{DiagnosticOptions, DisplayStyle};
///
/// // Plain text (no ANSI colors) for logging
/// let opts = DiagnosticOptions::plain();
///
/// // Short format for CI/IDE integration
/// let opts = DiagnosticOptions::short();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticOptions {
    /// Whether to use ANSI colors in output.
    pub colored: bool,
    /// Display style.
    pub style: DisplayStyle,
    /// Whether to show the diagnostic kind, e.g. `error[import-cycle]`.
    pub kinds: bool,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        Self {
            colored: true,
            style: DisplayStyle::Rich,
            kinds: true,
        }
    }
}

impl DiagnosticOptions {
    /// Create options for colored terminal output.
    pub fn colored() -> Self {
        Self::default()
    }

    /// Create options for plain text output (no ANSI colors).
    pub fn plain() -> Self {
        Self {
            colored: false,
            ..Self::default()
        }
    }

    /// Create options for short format (file:line:col: message).
    pub fn short() -> Self {
        Self {
            colored: false,
            style: DisplayStyle::Short,
            kinds: false,
        }
    }

    /// Set whether to use colors.
    pub fn with_colored(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    /// Set display style.
    pub fn with_style(mut self, style: DisplayStyle) -> Self {
        self.style = style;
        self
    }

    /// Set whether to show diagnostic kinds.
    pub fn with_kinds(mut self, kinds: bool) -> Self {
        self.kinds = kinds;
        self
    }
}

// ============================================================================
// Gutter Characters
// ============================================================================

/// Box-drawing characters for source code display.
mod gutter {
    pub const HEADER: &str = "┌─";
    pub const BAR: &str = "│";
    pub const MARKER: &str = "^";
}

// ============================================================================
// Coloring
// ============================================================================

#[cfg(feature = "colored-diagnostics")]
fn colorize(text: &str, severity: Severity) -> String {
    use owo_colors::OwoColorize;
    match severity {
        Severity::Error => text.red().to_string(),
        Severity::Warning => text.yellow().to_string(),
    }
}

#[cfg(not(feature = "colored-diagnostics"))]
fn colorize(text: &str, _severity: Severity) -> String {
    text.to_owned()
}

/// Get paint function based on options.
fn get_paint_fn(options: &DiagnosticOptions, severity: Severity) -> Box<dyn Fn(&str) -> String> {
    if options.colored {
        Box::new(move |s| colorize(s, severity))
    } else {
        Box::new(|s: &str| s.to_owned())
    }
}

// ============================================================================
// Public Formatting API
// ============================================================================

/// Format diagnostics with default options and no source snippets.
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    format_diagnostics_with_options(diagnostics, &DiagnosticOptions::default())
}

/// Format diagnostics with custom options and no source snippets.
pub fn format_diagnostics_with_options(diagnostics: &[Diagnostic], options: &DiagnosticOptions) -> String {
    format_diagnostics_with_sources(diagnostics, options, &|_| None)
}

/// Format diagnostics, pulling snippet lines from `sources`.
///
/// `sources` returns the text of a virtual file, or `None` when it is not
/// available. Errors are listed before warnings; within each group the
/// discovery order is kept.
pub fn format_diagnostics_with_sources(
    diagnostics: &[Diagnostic],
    options: &DiagnosticOptions,
    sources: &dyn Fn(&VirtualPath) -> Option<String>,
) -> String {
    let mut output = String::new();

    let (errors, warnings): (Vec<_>, Vec<_>) = diagnostics.iter().partition(|d| d.is_error());

    let all_diags: Vec<_> = errors.into_iter().chain(warnings).collect();
    for (i, diag) in all_diags.iter().enumerate() {
        match options.style {
            DisplayStyle::Short => write_short(&mut output, diag, options),
            DisplayStyle::Rich => {
                write_rich(&mut output, diag, options, sources);
                if i + 1 < all_diags.len() {
                    output.push('\n');
                }
            }
        }
    }

    output
}

fn severity_label(diag: &Diagnostic, options: &DiagnosticOptions) -> String {
    let paint = get_paint_fn(options, diag.severity);
    if options.kinds {
        paint(&format!("{}[{}]", diag.severity, diag.kind))
    } else {
        paint(diag.severity.as_str())
    }
}

fn write_short(output: &mut String, diag: &Diagnostic, options: &DiagnosticOptions) {
    _ = writeln!(
        output,
        "{}: {}: {}",
        diag.location(),
        severity_label(diag, options),
        diag.message
    );
}

fn write_rich(
    output: &mut String,
    diag: &Diagnostic,
    options: &DiagnosticOptions,
    sources: &dyn Fn(&VirtualPath) -> Option<String>,
) {
    let paint = get_paint_fn(options, diag.severity);

    _ = writeln!(output, "{}: {}", severity_label(diag, options), diag.message);

    let snippet = diag
        .has_position()
        .then(|| sources(&diag.path))
        .flatten()
        .and_then(|text| text.lines().nth(diag.line as usize - 1).map(str::to_owned));

    let width = diag.line.to_string().len();
    _ = writeln!(
        output,
        "{:>width$} {} {}",
        "",
        paint(gutter::HEADER),
        diag.location(),
    );

    if let Some(line_text) = snippet {
        let marker_offset = (diag.column as usize).saturating_sub(1);
        _ = writeln!(output, "{:>width$} {}", "", paint(gutter::BAR));
        _ = writeln!(output, "{} {} {}", paint(&diag.line.to_string()), paint(gutter::BAR), line_text);
        _ = writeln!(
            output,
            "{:>width$} {} {}{}",
            "",
            paint(gutter::BAR),
            " ".repeat(marker_offset),
            paint(gutter::MARKER),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticKind;

    fn diag(line: u32, column: u32, severity: Severity, message: &str) -> Diagnostic {
        Diagnostic {
            path: VirtualPath::new("a.proto").unwrap(),
            line,
            column,
            severity,
            kind: DiagnosticKind::SyntaxError,
            message: message.into(),
        }
    }

    #[test]
    fn test_short_format() {
        let diags = vec![
            diag(2, 5, Severity::Warning, "later"),
            diag(1, 3, Severity::Error, "first"),
        ];
        let out = format_diagnostics_with_options(&diags, &DiagnosticOptions::short());
        assert_eq!(out, "a.proto:1:3: error: first\na.proto:2:5: warning: later\n");
    }

    #[test]
    fn test_short_format_with_kinds() {
        let diags = vec![diag(1, 3, Severity::Error, "first")];
        let opts = DiagnosticOptions::short().with_kinds(true);
        let out = format_diagnostics_with_options(&diags, &opts);
        assert_eq!(out, "a.proto:1:3: error[syntax-error]: first\n");
    }

    #[test]
    fn test_rich_format_with_snippet() {
        let diags = vec![diag(2, 9, Severity::Error, "expected \"{\"")];
        let source = "syntax = \"proto3\";\nmessage Foo\n";
        let out = format_diagnostics_with_sources(&diags, &DiagnosticOptions::plain(), &|_| {
            Some(source.to_owned())
        });

        assert!(out.starts_with("error[syntax-error]: expected \"{\"\n"));
        assert!(out.contains("┌─ a.proto:2:9"));
        assert!(out.contains("2 │ message Foo"));
        assert!(out.contains("│         ^"));
    }

    #[test]
    fn test_rich_format_without_position() {
        let diags = vec![diag(0, 0, Severity::Error, "cannot find import")];
        let out = format_diagnostics_with_sources(&diags, &DiagnosticOptions::plain(), &|_| {
            panic!("no snippet lookup without a position")
        });
        assert!(out.contains("┌─ a.proto\n"));
        assert!(!out.contains('^'));
    }
}
