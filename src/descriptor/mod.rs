//! Compiled, immutable representation of `.proto` files.
//!
//! A [`Descriptor`] is produced by a [`Linker`] and published into the
//! [`DescriptorCache`](crate::cache::DescriptorCache) exactly once. After
//! that it is only ever handed out as `Arc<Descriptor>`; nothing mutates it.
//!
//! ```text
//! Descriptor ("orders.proto")
//! ├── messages: [MessageDescriptor { fields, oneofs, messages, enums }]
//! ├── enums:    [EnumDescriptor { values }]
//! ├── services: [ServiceDescriptor { methods }]
//! └── imports:  [ResolvedImport { path, descriptor: Option<Arc<Descriptor>> }]
//!                                  └── None when that import failed
//! ```

mod link;
mod registry;

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::{json, Value as JsonValue};

use crate::file::VirtualPath;
use crate::syntax::{FieldLabel, ImportKind, OptionDecl, Position, Syntax};

pub use link::{BindError, Linked, Linker, ProtoLinker};
pub use registry::{LookupError, Registry, INFERRED_NAME_PREFIX};

// =============================================================================
// Types
// =============================================================================

/// Built-in scalar field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// `double`
    Double,
    /// `float`
    Float,
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `uint32`
    Uint32,
    /// `uint64`
    Uint64,
    /// `sint32`
    Sint32,
    /// `sint64`
    Sint64,
    /// `fixed32`
    Fixed32,
    /// `fixed64`
    Fixed64,
    /// `sfixed32`
    Sfixed32,
    /// `sfixed64`
    Sfixed64,
    /// `bool`
    Bool,
    /// `string`
    String,
    /// `bytes`
    Bytes,
}

impl ScalarType {
    const ALL: [Self; 15] = [
        Self::Double,
        Self::Float,
        Self::Int32,
        Self::Int64,
        Self::Uint32,
        Self::Uint64,
        Self::Sint32,
        Self::Sint64,
        Self::Fixed32,
        Self::Fixed64,
        Self::Sfixed32,
        Self::Sfixed64,
        Self::Bool,
        Self::String,
        Self::Bytes,
    ];

    /// Keyword for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    /// Parse a scalar keyword.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scalar| scalar.as_str() == name)
    }

    /// Whether this type may be used as a map key.
    pub fn is_valid_map_key(self) -> bool {
        !matches!(self, Self::Double | Self::Float | Self::Bytes)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The bound type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// A built-in scalar.
    Scalar(ScalarType),
    /// A message type.
    Message {
        /// Fully qualified name, without a leading dot.
        full_name: String,
        /// File that declares it.
        file: VirtualPath,
    },
    /// An enum type.
    Enum {
        /// Fully qualified name, without a leading dot.
        full_name: String,
        /// File that declares it.
        file: VirtualPath,
    },
    /// `map<key, value>`
    Map {
        /// Key type.
        key: ScalarType,
        /// Value type.
        value: Box<TypeRef>,
    },
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => scalar.fmt(f),
            Self::Message { full_name, .. } | Self::Enum { full_name, .. } => f.write_str(full_name),
            Self::Map { key, value } => write!(f, "map<{key}, {value}>"),
        }
    }
}

/// What a fully qualified name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// A package (or a leading component of one).
    Package,
    /// A message.
    Message,
    /// An enum.
    Enum,
    /// An enum value; scoped like a sibling of its enum.
    EnumValue,
    /// A message field or an extension.
    Field,
    /// A oneof.
    Oneof,
    /// A service.
    Service,
    /// A service method.
    Method,
}

impl SymbolKind {
    /// Messages and enums can be used as field types.
    pub fn is_type(self) -> bool {
        matches!(self, Self::Message | Self::Enum)
    }

    /// Symbols that can contain other symbols.
    pub fn is_aggregate(self) -> bool {
        matches!(self, Self::Package | Self::Message | Self::Enum | Self::Service)
    }

    /// Human-readable noun.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::Message => "message",
            Self::Enum => "enum",
            Self::EnumValue => "enum value",
            Self::Field => "field",
            Self::Oneof => "oneof",
            Self::Service => "service",
            Self::Method => "method",
        }
    }
}

// =============================================================================
// Declarations
// =============================================================================

/// A message field or an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Fully qualified name.
    pub full_name: String,
    /// Field number.
    pub number: i64,
    /// Explicit label, if any.
    pub label: Option<FieldLabel>,
    /// Bound type.
    pub ty: TypeRef,
    /// Index into the containing message's oneofs.
    pub oneof: Option<usize>,
    /// For extensions, the fully qualified extended message.
    pub extendee: Option<String>,
    /// Options as written.
    pub options: Vec<OptionDecl>,
    /// Position of the field name.
    pub pos: Position,
}

impl FieldDescriptor {
    /// Whether this field is `repeated` (maps count as repeated).
    pub fn is_repeated(&self) -> bool {
        self.label == Some(FieldLabel::Repeated) || matches!(self.ty, TypeRef::Map { .. })
    }
}

/// A message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    /// Simple name.
    pub name: String,
    /// Fully qualified name.
    pub full_name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Oneof names.
    pub oneofs: Vec<String>,
    /// Nested messages.
    pub messages: Vec<MessageDescriptor>,
    /// Nested enums.
    pub enums: Vec<EnumDescriptor>,
    /// Extensions declared inside this message.
    pub extensions: Vec<FieldDescriptor>,
    /// Options as written.
    pub options: Vec<OptionDecl>,
    /// Position of the name.
    pub pos: Position,
}

impl MessageDescriptor {
    /// Find a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Find a field by number.
    pub fn field_by_number(&self, number: i64) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.number == number)
    }

    fn visit<'a>(&'a self, messages: &mut Vec<&'a MessageDescriptor>, enums: &mut Vec<&'a EnumDescriptor>) {
        messages.push(self);
        enums.extend(&self.enums);
        for nested in &self.messages {
            nested.visit(messages, enums);
        }
    }
}

/// An enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValueDescriptor {
    /// Value name.
    pub name: String,
    /// Numeric value.
    pub number: i64,
}

/// An enum type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    /// Simple name.
    pub name: String,
    /// Fully qualified name.
    pub full_name: String,
    /// Values in declaration order.
    pub values: Vec<EnumValueDescriptor>,
    /// Options as written.
    pub options: Vec<OptionDecl>,
    /// Position of the name.
    pub pos: Position,
}

/// A service method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Method name.
    pub name: String,
    /// Fully qualified request message.
    pub input: String,
    /// Fully qualified response message.
    pub output: String,
    /// Request is a stream.
    pub client_streaming: bool,
    /// Response is a stream.
    pub server_streaming: bool,
    /// Options as written.
    pub options: Vec<OptionDecl>,
}

/// A service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Simple name.
    pub name: String,
    /// Fully qualified name.
    pub full_name: String,
    /// Methods in declaration order.
    pub methods: Vec<MethodDescriptor>,
    /// Options as written.
    pub options: Vec<OptionDecl>,
    /// Position of the name.
    pub pos: Position,
}

// =============================================================================
// Imports
// =============================================================================

/// An import edge and what it resolved to.
#[derive(Clone)]
pub struct ResolvedImport {
    /// Imported virtual path.
    pub path: VirtualPath,
    /// Import flavour.
    pub kind: ImportKind,
    /// Position of the import statement in the importing file.
    pub pos: Position,
    /// The imported descriptor, or `None` if the import failed or closed a cycle.
    pub descriptor: Option<Arc<Descriptor>>,
}

impl ResolvedImport {
    /// Whether the import produced a descriptor.
    pub fn is_resolved(&self) -> bool {
        self.descriptor.is_some()
    }
}

impl fmt::Debug for ResolvedImport {
    // Printing the imported graph would repeat shared files many times.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedImport")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("pos", &self.pos)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

// =============================================================================
// Descriptor
// =============================================================================

/// Number of declarations in a file, nested ones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeclarationCounts {
    /// Messages.
    pub messages: usize,
    /// Enums.
    pub enums: usize,
    /// Services.
    pub services: usize,
    /// Message fields (extensions excluded).
    pub fields: usize,
    /// Extensions.
    pub extensions: usize,
    /// Service methods.
    pub methods: usize,
}

/// A compiled `.proto` file.
#[derive(Debug)]
pub struct Descriptor {
    /// The file's virtual path.
    pub path: VirtualPath,
    /// Declared syntax.
    pub syntax: Syntax,
    /// Package, if declared.
    pub package: Option<String>,
    /// File options as written.
    pub options: Vec<OptionDecl>,
    /// Top-level messages.
    pub messages: Vec<MessageDescriptor>,
    /// Top-level enums.
    pub enums: Vec<EnumDescriptor>,
    /// Services.
    pub services: Vec<ServiceDescriptor>,
    /// Top-level extensions.
    pub extensions: Vec<FieldDescriptor>,
    /// Import edges in declaration order.
    pub imports: Vec<ResolvedImport>,
    symbols: FxHashMap<String, SymbolKind>,
    complete: bool,
}

impl Descriptor {
    /// Whether every import, transitively, produced a descriptor.
    ///
    /// An incomplete descriptor still holds every declaration that could be
    /// bound; references into the missing files are absent from it.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Clear the completeness flag before publishing.
    pub(crate) fn mark_incomplete(&mut self) {
        self.complete = false;
    }

    /// Look up a fully qualified name declared in this file.
    pub fn symbol(&self, full_name: &str) -> Option<SymbolKind> {
        self.symbols.get(full_name).copied()
    }

    /// Every fully qualified name declared in this file.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, SymbolKind)> {
        self.symbols.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    /// Resolved imports (failed edges skipped).
    pub fn dependencies(&self) -> impl Iterator<Item = &Arc<Descriptor>> {
        self.imports.iter().filter_map(|import| import.descriptor.as_ref())
    }

    /// Import edges that did not produce a descriptor.
    pub fn unresolved_imports(&self) -> impl Iterator<Item = &ResolvedImport> {
        self.imports.iter().filter(|import| !import.is_resolved())
    }

    /// All messages, nested ones included, in declaration order.
    pub fn all_messages(&self) -> Vec<&MessageDescriptor> {
        self.walk().0
    }

    /// All enums, nested ones included.
    pub fn all_enums(&self) -> Vec<&EnumDescriptor> {
        self.walk().1
    }

    fn walk(&self) -> (Vec<&MessageDescriptor>, Vec<&EnumDescriptor>) {
        let mut messages = Vec::new();
        let mut enums: Vec<&EnumDescriptor> = self.enums.iter().collect();
        for message in &self.messages {
            message.visit(&mut messages, &mut enums);
        }
        (messages, enums)
    }

    /// Find a message declared in this file by fully qualified name.
    pub fn message(&self, full_name: &str) -> Option<&MessageDescriptor> {
        self.all_messages().into_iter().find(|m| m.full_name == full_name)
    }

    /// Count declarations.
    pub fn counts(&self) -> DeclarationCounts {
        let (messages, enums) = self.walk();
        DeclarationCounts {
            messages: messages.len(),
            enums: enums.len(),
            services: self.services.len(),
            fields: messages.iter().map(|m| m.fields.len()).sum(),
            extensions: self.extensions.len() + messages.iter().map(|m| m.extensions.len()).sum::<usize>(),
            methods: self.services.iter().map(|s| s.methods.len()).sum(),
        }
    }

    /// JSON summary of this file.
    pub fn summary_json(&self) -> JsonValue {
        let counts = self.counts();
        json!({
            "path": self.path.as_str(),
            "syntax": self.syntax.to_string(),
            "package": self.package,
            "complete": self.complete,
            "imports": self.imports.iter().map(|import| json!({
                "path": import.path.as_str(),
                "resolved": import.is_resolved(),
            })).collect::<Vec<_>>(),
            "counts": {
                "messages": counts.messages,
                "enums": counts.enums,
                "services": counts.services,
                "fields": counts.fields,
                "extensions": counts.extensions,
                "methods": counts.methods,
            },
            "messages": self.all_messages().iter().map(|m| m.full_name.as_str()).collect::<Vec<_>>(),
            "services": self.services.iter().map(|s| s.full_name.as_str()).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Parser, ProtoParser};

    fn compile(path: &str, text: &str) -> Descriptor {
        let path = VirtualPath::new(path).unwrap();
        let tree = ProtoParser.parse(&path, text).unwrap();
        ProtoLinker::new().link(&path, &tree, Vec::new()).unwrap().descriptor
    }

    #[test]
    fn test_scalar_names() {
        assert_eq!(ScalarType::from_name("sfixed64"), Some(ScalarType::Sfixed64));
        assert_eq!(ScalarType::from_name("Message"), None);
        assert!(ScalarType::String.is_valid_map_key());
        assert!(!ScalarType::Double.is_valid_map_key());
    }

    #[test]
    fn test_counts_include_nested() {
        let desc = compile(
            "shop.proto",
            r#"
            syntax = "proto3";
            package shop;
            message Cart {
              message Line { string sku = 1; int32 qty = 2; }
              enum State { OPEN = 0; }
              repeated Line lines = 1;
            }
            enum Currency { EUR = 0; }
            service Checkout { rpc Pay (Cart) returns (Cart); }
            "#,
        );

        let counts = desc.counts();
        assert_eq!(counts.messages, 2);
        assert_eq!(counts.enums, 2);
        assert_eq!(counts.fields, 3);
        assert_eq!(counts.services, 1);
        assert_eq!(counts.methods, 1);
        assert!(desc.is_complete());
        assert_eq!(desc.symbol("shop.Cart.Line"), Some(SymbolKind::Message));
        assert_eq!(desc.symbol("shop"), Some(SymbolKind::Package));
        assert!(desc.message("shop.Cart.Line").is_some());
    }

    #[test]
    fn test_summary_json() {
        let desc = compile("a.proto", "syntax = \"proto3\"; message A { int32 x = 1; }");
        let json = desc.summary_json();
        assert_eq!(json["path"], "a.proto");
        assert_eq!(json["syntax"], "proto3");
        assert_eq!(json["counts"]["fields"], 1);
        assert_eq!(json["messages"][0], "A");
    }
}
