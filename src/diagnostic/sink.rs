//! Where diagnostics go.
//!
//! The importer reports every diagnostic through a [`DiagnosticSink`].
//! Reporting is infallible: it is the last line of failure reporting, so a
//! sink swallows its own problems (e.g. a closed stderr) instead of
//! propagating them.
//!
//! | Sink           | `report`                        | `drain`              |
//! |----------------|---------------------------------|----------------------|
//! | [`BufferSink`] | appends                         | everything, in order |
//! | [`StreamSink`] | writes one formatted diagnostic | empty                |
//! | [`TracingSink`]| emits a `tracing` event         | empty                |
//! | [`DiscardSink`]| nothing                         | empty                |

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use super::format::{format_diagnostics_with_options, DiagnosticOptions};
use super::info::{Diagnostic, Severity};

/// Receiver of diagnostics.
///
/// Implementations must be `Send + Sync`: imports may be compiled from
/// several threads, and appends from concurrent branches arrive in no
/// particular order.
pub trait DiagnosticSink: Send + Sync {
    /// Record one diagnostic. Must not fail.
    fn report(&self, diagnostic: Diagnostic);

    /// Take every buffered diagnostic, oldest first.
    ///
    /// Sinks that do not buffer return nothing.
    fn drain(&self) -> Vec<Diagnostic> {
        Vec::new()
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Arc<S> {
    fn report(&self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }

    fn drain(&self) -> Vec<Diagnostic> {
        (**self).drain()
    }
}

// =============================================================================
// BufferSink
// =============================================================================

/// Collects diagnostics in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    items: Mutex<Vec<Diagnostic>>,
}

impl BufferSink {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffered diagnostics.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Copy the buffer without draining it.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.items.lock().clone()
    }
}

impl DiagnosticSink for BufferSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.items.lock().push(diagnostic);
    }

    fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.items.lock())
    }
}

// =============================================================================
// StreamSink
// =============================================================================

/// Writes each diagnostic to a stream as soon as it is reported.
pub struct StreamSink {
    writer: Mutex<Box<dyn Write + Send>>,
    options: DiagnosticOptions,
}

impl StreamSink {
    /// Stream to `writer` using `options`.
    pub fn new(writer: impl Write + Send + 'static, options: DiagnosticOptions) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            options,
        }
    }

    /// Stream to stderr in the short format.
    pub fn stderr() -> Self {
        Self::new(io::stderr(), DiagnosticOptions::short())
    }
}

impl std::fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSink")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl DiagnosticSink for StreamSink {
    fn report(&self, diagnostic: Diagnostic) {
        let text = format_diagnostics_with_options(std::slice::from_ref(&diagnostic), &self.options);
        let mut writer = self.writer.lock();
        // A broken stream must not take compilation down with it.
        _ = writer.write_all(text.as_bytes());
        _ = writer.flush();
    }
}

// =============================================================================
// TracingSink
// =============================================================================

/// Emits each diagnostic as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, d: Diagnostic) {
        match d.severity {
            Severity::Error => tracing::error!(
                path = %d.path, line = d.line, column = d.column, kind = %d.kind,
                "{}", d.message
            ),
            Severity::Warning => tracing::warn!(
                path = %d.path, line = d.line, column = d.column, kind = %d.kind,
                "{}", d.message
            ),
        }
    }
}

// =============================================================================
// DiscardSink
// =============================================================================

/// Drops every diagnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl DiagnosticSink for DiscardSink {
    fn report(&self, _diagnostic: Diagnostic) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticKind;
    use crate::file::VirtualPath;

    fn diag(message: &str) -> Diagnostic {
        Diagnostic::error(
            DiagnosticKind::SyntaxError,
            VirtualPath::new("a.proto").unwrap(),
            1,
            2,
            message,
        )
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn test_buffer_sink_keeps_order() {
        let sink = BufferSink::new();
        sink.report(diag("first"));
        sink.report(diag("second"));
        assert_eq!(sink.len(), 2);

        let drained = sink.drain();
        assert_eq!(drained[0].message, "first");
        assert_eq!(drained[1].message, "second");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_stream_sink_writes_immediately() {
        let buf = SharedBuf::default();
        let sink = StreamSink::new(buf.clone(), DiagnosticOptions::short());

        sink.report(diag("boom"));
        assert_eq!(String::from_utf8(buf.0.lock().clone()).unwrap(), "a.proto:1:2: error: boom\n");
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_stream_sink_never_fails() {
        let sink = StreamSink::new(BrokenPipe, DiagnosticOptions::short());
        sink.report(diag("lost"));
    }

    #[test]
    fn test_discard_and_tracing_sinks() {
        DiscardSink.report(diag("ignored"));
        TracingSink.report(diag("logged"));
        assert!(DiscardSink.drain().is_empty());
        assert!(TracingSink.drain().is_empty());
    }

    #[test]
    fn test_arc_sink_forwards() {
        let sink = Arc::new(BufferSink::new());
        let shared: Arc<dyn DiagnosticSink> = sink.clone();
        shared.report(diag("via arc"));
        assert_eq!(sink.len(), 1);
    }
}
