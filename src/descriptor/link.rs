//! Binding a syntax tree against its imports.
//!
//! Names are resolved the protobuf way: starting in the innermost scope and
//! walking outward one component at a time, unless the name starts with `.`
//! (fully qualified). A file sees its own declarations, the declarations of
//! its direct imports, and whatever those imports re-export through
//! `import public`, transitively.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::diagnostic::{DiagnosticKind, Severity};
use crate::file::VirtualPath;
use crate::syntax::{
    EnumDecl, ExtendDecl, FieldDecl, FieldTypeRef, ImportKind, MessageDecl, MethodDecl, OptionDecl,
    Position, ServiceDecl, SyntaxTree,
};

use super::{
    Descriptor, EnumDescriptor, EnumValueDescriptor, FieldDescriptor, MessageDescriptor,
    MethodDescriptor, ResolvedImport, ScalarType, ServiceDescriptor, SymbolKind, TypeRef,
};

/// A linking problem, positioned in the file being linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindError {
    /// `UnresolvedReference` or `BindFailure`.
    pub kind: DiagnosticKind,
    /// Warnings do not prevent publishing.
    pub severity: Severity,
    /// Where in the file.
    pub pos: Position,
    /// What went wrong.
    pub message: String,
}

impl BindError {
    /// Create an error.
    pub fn error(kind: DiagnosticKind, pos: Position, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            pos,
            message: message.into(),
        }
    }

    /// Create a `BindFailure` warning.
    pub fn warning(pos: Position, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::BindFailure,
            severity: Severity::Warning,
            pos,
            message: message.into(),
        }
    }

    /// Whether this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Result of a successful link.
#[derive(Debug)]
pub struct Linked {
    /// The compiled file.
    pub descriptor: Descriptor,
    /// Warnings found while linking.
    pub warnings: Vec<BindError>,
}

/// Binds a file's declarations against the descriptors of its imports.
pub trait Linker: Send + Sync {
    /// Link `tree`, the parsed content of `path`.
    ///
    /// `imports` lists the file's import edges in declaration order, each
    /// with the imported descriptor or `None` when that import failed. On
    /// failure every problem found is returned, warnings included.
    fn link(
        &self,
        path: &VirtualPath,
        tree: &SyntaxTree,
        imports: Vec<ResolvedImport>,
    ) -> Result<Linked, Vec<BindError>>;
}

/// The built-in protobuf linker.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtoLinker {
    warn_unused_imports: bool,
}

impl ProtoLinker {
    /// Create a linker with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Warn about imports none of whose declarations are referenced.
    pub fn with_unused_import_warnings(mut self, enabled: bool) -> Self {
        self.warn_unused_imports = enabled;
        self
    }
}

impl Linker for ProtoLinker {
    fn link(
        &self,
        path: &VirtualPath,
        tree: &SyntaxTree,
        imports: Vec<ResolvedImport>,
    ) -> Result<Linked, Vec<BindError>> {
        let mut binder = Binder {
            path,
            own: FxHashMap::default(),
            visible: visible_files(&imports),
            used: vec![false; imports.len()],
            degraded: imports
                .iter()
                .any(|import| !import.descriptor.as_ref().is_some_and(|d| d.is_complete())),
            problems: Vec::new(),
        };

        let package = tree.package.clone().unwrap_or_default();
        binder.declare_file(tree, &package);

        binder.touch_options(&tree.options, &package);
        let mut messages: Vec<_> = tree.messages.iter().map(|m| binder.message(m, &package)).collect();
        let enums = tree.enums.iter().map(|e| binder.enumeration(e, &package)).collect();
        let services = tree.services.iter().map(|s| binder.service(s, &package)).collect();
        let mut extensions = Vec::new();
        for extend in &tree.extends {
            extensions.extend(binder.extend(extend, &package, &mut messages));
        }

        if self.warn_unused_imports {
            for (index, import) in imports.iter().enumerate() {
                if import.is_resolved() && import.kind != ImportKind::Public && !binder.used[index] {
                    binder
                        .problems
                        .push(BindError::warning(import.pos, format!("import \"{}\" is unused", import.path)));
                }
            }
        }

        let Binder { own, problems, .. } = binder;
        if problems.iter().any(BindError::is_error) {
            tracing::debug!(%path, problems = problems.len(), "link failed");
            return Err(problems);
        }

        let complete = imports
            .iter()
            .all(|import| import.descriptor.as_ref().is_some_and(|d| d.is_complete()));

        let descriptor = Descriptor {
            path: path.clone(),
            syntax: tree.syntax.clone(),
            package: tree.package.clone(),
            options: tree.options.clone(),
            messages,
            enums,
            services,
            extensions,
            imports,
            symbols: own,
            complete,
        };

        Ok(Linked {
            descriptor,
            warnings: problems,
        })
    }
}

/// Files visible through each direct import: the import itself plus its
/// public imports, transitively.
fn visible_files(imports: &[ResolvedImport]) -> Vec<(usize, Arc<Descriptor>)> {
    let mut visible = Vec::new();
    for (index, import) in imports.iter().enumerate() {
        let Some(root) = &import.descriptor else {
            continue;
        };
        let mut seen = FxHashSet::default();
        let mut stack = vec![Arc::clone(root)];
        while let Some(desc) = stack.pop() {
            if !seen.insert(desc.path.clone()) {
                continue;
            }
            for public in desc.imports.iter().filter(|i| i.kind == ImportKind::Public) {
                if let Some(next) = &public.descriptor {
                    stack.push(Arc::clone(next));
                }
            }
            visible.push((index, desc));
        }
    }
    visible
}

fn join(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_owned()
    } else {
        format!("{scope}.{name}")
    }
}

/// A resolved name.
struct Symbol {
    full_name: String,
    kind: SymbolKind,
    file: VirtualPath,
}

struct Binder<'a> {
    path: &'a VirtualPath,
    own: FxHashMap<String, SymbolKind>,
    visible: Vec<(usize, Arc<Descriptor>)>,
    used: Vec<bool>,
    /// Some import failed, so names it would have supplied are missing.
    degraded: bool,
    problems: Vec<BindError>,
}

impl Binder<'_> {
    // =========================================================================
    // Symbol table
    // =========================================================================

    fn declare(&mut self, full_name: String, kind: SymbolKind, pos: Position) {
        if let Some(&existing) = self.own.get(&full_name) {
            if existing == SymbolKind::Package && kind == SymbolKind::Package {
                return;
            }
            self.problems.push(BindError::error(
                DiagnosticKind::BindFailure,
                pos,
                format!("\"{full_name}\" is already defined"),
            ));
            return;
        }

        let clash = self.visible.iter().find_map(|(_, desc)| {
            desc.symbol(&full_name)
                .filter(|other| *other != SymbolKind::Package || kind != SymbolKind::Package)
                .map(|_| desc.path.clone())
        });
        if let Some(other) = clash {
            self.problems.push(BindError::error(
                DiagnosticKind::BindFailure,
                pos,
                format!("\"{full_name}\" is already defined in file \"{other}\""),
            ));
            return;
        }

        self.own.insert(full_name, kind);
    }

    fn declare_file(&mut self, tree: &SyntaxTree, package: &str) {
        let mut prefix = String::new();
        for component in package.split('.').filter(|c| !c.is_empty()) {
            prefix = join(&prefix, component);
            self.declare(prefix.clone(), SymbolKind::Package, Position::default());
        }
        for message in &tree.messages {
            self.declare_message(message, package);
        }
        for decl in &tree.enums {
            self.declare_enum(decl, package);
        }
        for service in &tree.services {
            let full = join(package, &service.name);
            self.declare(full.clone(), SymbolKind::Service, service.pos);
            for method in &service.methods {
                self.declare(join(&full, &method.name), SymbolKind::Method, method.pos);
            }
        }
        for extend in &tree.extends {
            self.declare_extend(extend, package);
        }
    }

    fn declare_message(&mut self, decl: &MessageDecl, scope: &str) {
        let full = join(scope, &decl.name);
        self.declare(full.clone(), SymbolKind::Message, decl.pos);
        for field in &decl.fields {
            self.declare(join(&full, &field.name), SymbolKind::Field, field.pos);
        }
        for oneof in &decl.oneofs {
            self.declare(join(&full, &oneof.name), SymbolKind::Oneof, oneof.pos);
        }
        for nested in &decl.messages {
            self.declare_message(nested, &full);
        }
        for nested in &decl.enums {
            self.declare_enum(nested, &full);
        }
        for extend in &decl.extends {
            self.declare_extend(extend, &full);
        }
    }

    fn declare_enum(&mut self, decl: &EnumDecl, scope: &str) {
        self.declare(join(scope, &decl.name), SymbolKind::Enum, decl.pos);
        // Enum values live next to their enum, not inside it.
        for value in &decl.values {
            self.declare(join(scope, &value.name), SymbolKind::EnumValue, value.pos);
        }
    }

    fn declare_extend(&mut self, decl: &ExtendDecl, scope: &str) {
        for field in &decl.fields {
            self.declare(join(scope, &field.name), SymbolKind::Field, field.pos);
        }
        for group in &decl.messages {
            self.declare_message(group, scope);
        }
    }

    // =========================================================================
    // Name resolution
    // =========================================================================

    fn lookup(&self, full_name: &str) -> Option<Symbol> {
        if let Some(&kind) = self.own.get(full_name) {
            return Some(Symbol {
                full_name: full_name.to_owned(),
                kind,
                file: self.path.clone(),
            });
        }
        self.visible.iter().find_map(|(_, desc)| {
            desc.symbol(full_name).map(|kind| Symbol {
                full_name: full_name.to_owned(),
                kind,
                file: desc.path.clone(),
            })
        })
    }

    /// Resolve `name` as seen from `scope`.
    ///
    /// For a compound name only the first component is searched outward; once
    /// it hits an aggregate the rest must resolve inside it.
    fn resolve(&self, name: &str, scope: &str, types_only: bool) -> Option<Symbol> {
        if let Some(absolute) = name.strip_prefix('.') {
            return self.lookup(absolute);
        }

        let first = name.split_once('.').map_or(name, |(first, _)| first);
        let compound = first.len() < name.len();
        let mut scope = scope.to_owned();

        loop {
            if let Some(found) = self.lookup(&join(&scope, first)) {
                if compound {
                    if found.kind.is_aggregate() {
                        return self.lookup(&join(&scope, name));
                    }
                } else if !types_only || found.kind.is_type() {
                    return Some(found);
                }
            }

            if scope.is_empty() {
                return None;
            }
            match scope.rfind('.') {
                Some(dot) => scope.truncate(dot),
                None => scope.clear(),
            }
        }
    }

    fn mark_used(&mut self, symbol: &Symbol) {
        if symbol.file == *self.path {
            return;
        }
        for (index, desc) in &self.visible {
            if desc.symbol(&symbol.full_name).is_some() {
                self.used[*index] = true;
            }
        }
    }

    /// An unresolvable name is an error only when every import is intact.
    /// Otherwise the declaration using it is dropped and the file is
    /// published incomplete; the failed import was already reported.
    fn unresolved(&mut self, name: &str, pos: Position) {
        if self.degraded {
            tracing::debug!(path = %self.path, %name, "dropping reference into a failed import");
            return;
        }
        self.problems.push(BindError::error(
            DiagnosticKind::UnresolvedReference,
            pos,
            format!("\"{name}\" is not defined"),
        ));
    }

    fn bind_type(&mut self, name: &str, scope: &str, pos: Position) -> Option<TypeRef> {
        if let Some(scalar) = ScalarType::from_name(name) {
            return Some(TypeRef::Scalar(scalar));
        }

        let Some(symbol) = self.resolve(name, scope, true) else {
            self.unresolved(name, pos);
            return None;
        };
        self.mark_used(&symbol);

        match symbol.kind {
            SymbolKind::Message => Some(TypeRef::Message {
                full_name: symbol.full_name,
                file: symbol.file,
            }),
            SymbolKind::Enum => Some(TypeRef::Enum {
                full_name: symbol.full_name,
                file: symbol.file,
            }),
            other => {
                self.problems.push(BindError::error(
                    DiagnosticKind::BindFailure,
                    pos,
                    format!("\"{name}\" is a {}, not a type", other.describe()),
                ));
                None
            }
        }
    }

    fn bind_message(&mut self, name: &str, scope: &str, pos: Position) -> Option<String> {
        let Some(symbol) = self.resolve(name, scope, true) else {
            self.unresolved(name, pos);
            return None;
        };
        self.mark_used(&symbol);

        if symbol.kind == SymbolKind::Message {
            Some(symbol.full_name)
        } else {
            self.problems.push(BindError::error(
                DiagnosticKind::BindFailure,
                pos,
                format!("\"{name}\" is not a message type"),
            ));
            None
        }
    }

    /// Credit imports that supply extensions named in `(…)` option names.
    ///
    /// Option values are not validated, so a name that does not resolve is
    /// ignored here.
    fn touch_options(&mut self, options: &[OptionDecl], scope: &str) {
        for option in options {
            let Some(rest) = option.name.strip_prefix('(') else {
                continue;
            };
            let Some((extension, _)) = rest.split_once(')') else {
                continue;
            };
            if let Some(symbol) = self.resolve(extension, scope, false) {
                self.mark_used(&symbol);
            }
        }
    }

    // =========================================================================
    // Descriptors
    // =========================================================================

    fn field(&mut self, decl: &FieldDecl, scope: &str, extendee: Option<&str>) -> Option<FieldDescriptor> {
        self.touch_options(&decl.options, scope);

        let ty = match &decl.ty {
            FieldTypeRef::Named(name) => self.bind_type(name, scope, decl.type_pos)?,
            FieldTypeRef::Map { key, value } => {
                let key = match ScalarType::from_name(key) {
                    Some(key) if key.is_valid_map_key() => key,
                    _ => {
                        self.problems.push(BindError::error(
                            DiagnosticKind::BindFailure,
                            decl.type_pos,
                            format!("\"{key}\" is not a valid map key type"),
                        ));
                        return None;
                    }
                };
                let value = self.bind_type(value, scope, decl.type_pos)?;
                TypeRef::Map {
                    key,
                    value: Box::new(value),
                }
            }
        };

        Some(FieldDescriptor {
            name: decl.name.clone(),
            full_name: join(scope, &decl.name),
            number: decl.number,
            label: decl.label,
            ty,
            oneof: decl.oneof,
            extendee: extendee.map(str::to_owned),
            options: decl.options.clone(),
            pos: decl.pos,
        })
    }

    fn message(&mut self, decl: &MessageDecl, scope: &str) -> MessageDescriptor {
        let full_name = join(scope, &decl.name);
        self.touch_options(&decl.options, &full_name);

        let fields = decl
            .fields
            .iter()
            .filter_map(|field| self.field(field, &full_name, None))
            .collect();
        let mut messages: Vec<_> = decl.messages.iter().map(|m| self.message(m, &full_name)).collect();
        let enums = decl.enums.iter().map(|e| self.enumeration(e, &full_name)).collect();
        let mut extensions = Vec::new();
        for extend in &decl.extends {
            extensions.extend(self.extend(extend, &full_name, &mut messages));
        }

        MessageDescriptor {
            name: decl.name.clone(),
            full_name,
            fields,
            oneofs: decl.oneofs.iter().map(|o| o.name.clone()).collect(),
            messages,
            enums,
            extensions,
            options: decl.options.clone(),
            pos: decl.pos,
        }
    }

    fn enumeration(&mut self, decl: &EnumDecl, scope: &str) -> EnumDescriptor {
        let full_name = join(scope, &decl.name);
        self.touch_options(&decl.options, &full_name);

        EnumDescriptor {
            name: decl.name.clone(),
            full_name,
            values: decl
                .values
                .iter()
                .map(|v| EnumValueDescriptor {
                    name: v.name.clone(),
                    number: v.number,
                })
                .collect(),
            options: decl.options.clone(),
            pos: decl.pos,
        }
    }

    fn service(&mut self, decl: &ServiceDecl, scope: &str) -> ServiceDescriptor {
        let full_name = join(scope, &decl.name);
        self.touch_options(&decl.options, &full_name);

        let methods = decl
            .methods
            .iter()
            .filter_map(|method| self.method(method, &full_name))
            .collect();

        ServiceDescriptor {
            name: decl.name.clone(),
            full_name,
            methods,
            options: decl.options.clone(),
            pos: decl.pos,
        }
    }

    fn method(&mut self, decl: &MethodDecl, scope: &str) -> Option<MethodDescriptor> {
        self.touch_options(&decl.options, scope);
        let input = self.bind_message(&decl.input, scope, decl.input_pos);
        let output = self.bind_message(&decl.output, scope, decl.output_pos);

        Some(MethodDescriptor {
            name: decl.name.clone(),
            input: input?,
            output: output?,
            client_streaming: decl.client_streaming,
            server_streaming: decl.server_streaming,
            options: decl.options.clone(),
        })
    }

    /// Bind an `extend` block; group bodies are added to `messages`.
    fn extend(
        &mut self,
        decl: &ExtendDecl,
        scope: &str,
        messages: &mut Vec<MessageDescriptor>,
    ) -> Vec<FieldDescriptor> {
        messages.extend(decl.messages.iter().map(|m| self.message(m, scope)));

        let Some(extendee) = self.bind_message(&decl.extendee, scope, decl.pos) else {
            return Vec::new();
        };
        decl.fields
            .iter()
            .filter_map(|field| self.field(field, scope, Some(&extendee)))
            .collect()
    }
}
