//! One worker's walk through an import graph.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::cache::{CompileHandle, FailureReason, Lookup, WorkerId};
use crate::descriptor::{BindError, Descriptor, ResolvedImport};
use crate::diagnostic::{Diagnostic, DiagnosticKind, PartialFailure, Severity};
use crate::file::{ResolveError, VirtualPath};
use crate::syntax::{Position, SyntaxError};

use super::Importer;

/// Where an import statement sits.
pub(super) struct Site {
    file: VirtualPath,
    pos: Position,
}

/// State of one `compile` call.
pub(super) struct Job<'i> {
    importer: &'i Importer,
    worker: WorkerId,
    /// Files this job is compiling, outermost first.
    stack: Vec<VirtualPath>,
    diagnostics: Vec<Diagnostic>,
    compiled: Vec<Arc<Descriptor>>,
    seen: FxHashSet<VirtualPath>,
}

impl<'i> Job<'i> {
    pub fn new(importer: &'i Importer, worker: WorkerId) -> Self {
        Self {
            importer,
            worker,
            stack: Vec::new(),
            diagnostics: Vec::new(),
            compiled: Vec::new(),
            seen: FxHashSet::default(),
        }
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic.clone());
        self.importer.sink.report(diagnostic);
    }

    /// Report at the import statement, or at `path:0:0` for the root.
    fn report_at(&mut self, site: Option<&Site>, path: &VirtualPath, kind: DiagnosticKind, message: String) {
        let diagnostic = match site {
            Some(site) => Diagnostic::error(kind, site.file.clone(), site.pos.line, site.pos.column, message),
            None => Diagnostic::error(kind, path.clone(), 0, 0, message),
        };
        self.report(diagnostic);
    }

    fn note_compiled(&mut self, desc: &Arc<Descriptor>) {
        if self.seen.insert(desc.path.clone()) {
            self.compiled.push(Arc::clone(desc));
        }
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Obtain the descriptor for `path`, compiling it if nobody has.
    pub fn resolve(&mut self, path: &VirtualPath, site: Option<&Site>) -> Option<Arc<Descriptor>> {
        let importer = self.importer;
        match importer.cache.get_or_begin(path, self.worker) {
            Lookup::Compiled(desc) => {
                self.note_compiled(&desc);
                Some(desc)
            }
            Lookup::Failed(reason) => {
                self.report_failed(path, reason, site);
                None
            }
            Lookup::CycleDetected => {
                let message = match self.stack.iter().position(|p| p == path) {
                    Some(start) => {
                        let chain: Vec<&str> = self.stack[start..]
                            .iter()
                            .chain(std::iter::once(path))
                            .map(VirtualPath::as_str)
                            .collect();
                        format!("import cycle involving \"{path}\": {}", chain.join(" -> "))
                    }
                    None => format!("import cycle involving \"{path}\""),
                };
                self.report_at(site, path, DiagnosticKind::ImportCycle, message);
                None
            }
            Lookup::Begin(handle) => {
                self.stack.push(path.clone());
                let result = self.compile_file(handle, site);
                self.stack.pop();
                result
            }
        }
    }

    fn report_failed(&mut self, path: &VirtualPath, reason: FailureReason, site: Option<&Site>) {
        let (kind, message) = match (reason, site) {
            (FailureReason::NotFound, Some(_)) => (DiagnosticKind::PathNotFound, format!("cannot find import \"{path}\"")),
            (FailureReason::NotFound, None) => (DiagnosticKind::PathNotFound, format!("cannot find \"{path}\"")),
            (reason, Some(_)) => (DiagnosticKind::BindFailure, format!("import \"{path}\" has errors ({reason})")),
            (reason, None) => (DiagnosticKind::BindFailure, format!("\"{path}\" has errors ({reason})")),
        };
        self.report_at(site, path, kind, message);
    }

    fn compile_file(&mut self, handle: CompileHandle<'_>, site: Option<&Site>) -> Option<Arc<Descriptor>> {
        let importer = self.importer;
        let path = handle.path().clone();

        // Mapping
        let physical = match importer.tree.resolve(&path, importer.loader.as_ref()) {
            Ok(physical) => physical,
            Err(err) => {
                tracing::debug!(%path, %err, "not found");
                let detail = match &err {
                    ResolveError::NoMapping(_) => "no mapping covers it".to_owned(),
                    ResolveError::Missing { physical, .. } => format!("looked in {}", physical.display()),
                };
                let message = match site {
                    Some(_) => format!("cannot find import \"{path}\" ({detail})"),
                    None => format!("cannot find \"{path}\" ({detail})"),
                };
                self.report_at(site, &path, DiagnosticKind::PathNotFound, message);
                handle.fail(FailureReason::NotFound);
                return None;
            }
        };

        // Loading
        let text = match importer.loader.load(&physical) {
            Ok(text) => text,
            Err(err) => {
                let (kind, reason) = if err.is_not_found() {
                    (DiagnosticKind::PathNotFound, FailureReason::NotFound)
                } else {
                    (DiagnosticKind::IoFailure, FailureReason::Unreadable)
                };
                let message = match site {
                    Some(_) => format!("cannot read import \"{path}\": {err}"),
                    None => format!("cannot read \"{path}\": {err}"),
                };
                self.report_at(site, &path, kind, message);
                handle.fail(reason);
                return None;
            }
        };
        tracing::debug!(%path, physical = %physical.display(), "loaded");
        importer.record_load(&path, physical);

        // Parsing
        let tree = match importer.parser.parse(&path, &text) {
            Ok(tree) => tree,
            Err(mut errors) => {
                if errors.is_empty() {
                    errors.push(SyntaxError::new(0, 0, "the parser rejected the file"));
                }
                for err in errors {
                    self.report(Diagnostic::error(
                        DiagnosticKind::SyntaxError,
                        path.clone(),
                        err.line,
                        err.column,
                        err.message,
                    ));
                }
                handle.fail(FailureReason::Syntax);
                return None;
            }
        };

        // Imports, in declaration order
        let mut imports = Vec::with_capacity(tree.imports.len());
        let mut followed = FxHashSet::default();
        let mut broken_edge = false;

        for statement in &tree.imports {
            let pos = statement.pos;
            let target = match VirtualPath::new(&statement.path) {
                Ok(target) => target,
                Err(err) => {
                    self.report(Diagnostic::error(
                        DiagnosticKind::PathNotFound,
                        path.clone(),
                        pos.line,
                        pos.column,
                        format!("invalid import path \"{}\": {err}", statement.path),
                    ));
                    broken_edge = true;
                    continue;
                }
            };

            if !followed.insert(target.clone()) {
                self.report(Diagnostic::warning(
                    DiagnosticKind::BindFailure,
                    path.clone(),
                    pos.line,
                    pos.column,
                    format!("\"{target}\" is imported more than once"),
                ));
                continue;
            }

            let site = Site {
                file: path.clone(),
                pos,
            };
            let descriptor = self.resolve(&target, Some(&site));
            imports.push(ResolvedImport {
                path: target,
                kind: statement.kind,
                pos,
                descriptor,
            });
        }

        // Linking
        match importer.linker().link(&path, &tree, imports) {
            Ok(linked) => {
                for warning in linked.warnings {
                    self.report(Diagnostic::warning(
                        warning.kind,
                        path.clone(),
                        warning.pos.line,
                        warning.pos.column,
                        warning.message,
                    ));
                }
                let mut descriptor = linked.descriptor;
                if broken_edge {
                    descriptor.mark_incomplete();
                }
                let published = handle.publish(descriptor);
                self.note_compiled(&published);
                Some(published)
            }
            Err(mut problems) => {
                if !problems.iter().any(BindError::is_error) {
                    problems.push(BindError::error(
                        DiagnosticKind::BindFailure,
                        Position::default(),
                        "the linker rejected the file",
                    ));
                }
                for problem in problems {
                    let diagnostic = Diagnostic {
                        path: path.clone(),
                        line: problem.pos.line,
                        column: problem.pos.column,
                        severity: problem.severity,
                        kind: problem.kind,
                        message: problem.message,
                    };
                    self.report(diagnostic);
                }
                handle.fail(FailureReason::Bind);
                None
            }
        }
    }

    // =========================================================================
    // Outcome
    // =========================================================================

    pub fn finish(
        mut self,
        root: &VirtualPath,
        outcome: Option<Arc<Descriptor>>,
    ) -> Result<Arc<Descriptor>, PartialFailure> {
        let errors = self.diagnostics.iter().any(|d| d.severity == Severity::Error);

        if let Some(desc) = &outcome
            && desc.is_complete()
            && !errors
        {
            return Ok(Arc::clone(desc));
        }

        // A cached, incomplete root reports nothing new; say why it failed.
        if !errors {
            self.report(Diagnostic::error(
                DiagnosticKind::BindFailure,
                root.clone(),
                0,
                0,
                format!("\"{root}\" depends on imports that failed to compile"),
            ));
        }

        tracing::debug!(%root, diagnostics = self.diagnostics.len(), "compile failed");
        Err(PartialFailure {
            root: root.clone(),
            descriptor: outcome,
            compiled: self.compiled,
            diagnostics: self.diagnostics.into(),
        })
    }
}
