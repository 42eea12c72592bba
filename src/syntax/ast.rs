//! Syntax tree of a `.proto` file.
//!
//! Names are kept exactly as written; resolving them is the linker's job.

use std::fmt;

/// A 1-based source position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    /// Line (1-based).
    pub line: u32,
    /// Column (1-based).
    pub column: u32,
}

impl Position {
    /// Create a position.
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Language level declared by the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Syntax {
    /// `syntax = "proto2";`, also the default when nothing is declared.
    #[default]
    Proto2,
    /// `syntax = "proto3";`
    Proto3,
    /// `edition = "...";`
    Edition(String),
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proto2 => f.write_str("proto2"),
            Self::Proto3 => f.write_str("proto3"),
            Self::Edition(edition) => write!(f, "editions ({edition})"),
        }
    }
}

/// Flavour of an import statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ImportKind {
    /// `import "x.proto";`
    #[default]
    Default,
    /// `import public "x.proto";` re-exports the imported symbols.
    Public,
    /// `import weak "x.proto";`
    Weak,
}

/// An `import` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    /// Path as written.
    pub path: String,
    /// Import flavour.
    pub kind: ImportKind,
    /// Position of the `import` keyword.
    pub pos: Position,
}

/// `option name = value;` or a `[name = value]` field option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDecl {
    /// Option name as written, e.g. `java_package` or `(my.ext).field`.
    pub name: String,
    /// Value as written; aggregates keep their braces.
    pub value: String,
    /// Position of the option name.
    pub pos: Position,
}

/// Field label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldLabel {
    /// `optional`
    Optional,
    /// `required`
    Required,
    /// `repeated`
    Repeated,
}

/// The type part of a field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTypeRef {
    /// A scalar keyword or a (possibly qualified) type name.
    Named(String),
    /// `map<key, value>`
    Map {
        /// Key type name.
        key: String,
        /// Value type name.
        value: String,
    },
}

/// A field in a message, oneof or extend block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Field name.
    pub name: String,
    /// Field number.
    pub number: i64,
    /// Explicit label, if any.
    pub label: Option<FieldLabel>,
    /// Field type.
    pub ty: FieldTypeRef,
    /// Index into the enclosing message's oneofs.
    pub oneof: Option<usize>,
    /// Options in brackets.
    pub options: Vec<OptionDecl>,
    /// Position of the field name.
    pub pos: Position,
    /// Position of the type.
    pub type_pos: Position,
}

/// A `oneof` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneofDecl {
    /// Oneof name.
    pub name: String,
    /// Options declared inside the block.
    pub options: Vec<OptionDecl>,
    /// Position of the name.
    pub pos: Position,
}

/// A `message` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageDecl {
    /// Message name.
    pub name: String,
    /// Fields, in declaration order (oneof members included).
    pub fields: Vec<FieldDecl>,
    /// Oneofs, in declaration order.
    pub oneofs: Vec<OneofDecl>,
    /// Nested messages (including group bodies).
    pub messages: Vec<MessageDecl>,
    /// Nested enums.
    pub enums: Vec<EnumDecl>,
    /// Nested extend blocks.
    pub extends: Vec<ExtendDecl>,
    /// Message options.
    pub options: Vec<OptionDecl>,
    /// Position of the name.
    pub pos: Position,
}

/// An enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValueDecl {
    /// Value name.
    pub name: String,
    /// Numeric value.
    pub number: i64,
    /// Value options.
    pub options: Vec<OptionDecl>,
    /// Position of the name.
    pub pos: Position,
}

/// An `enum` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumDecl {
    /// Enum name.
    pub name: String,
    /// Values in declaration order.
    pub values: Vec<EnumValueDecl>,
    /// Enum options.
    pub options: Vec<OptionDecl>,
    /// Position of the name.
    pub pos: Position,
}

/// An `rpc` inside a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    /// Method name.
    pub name: String,
    /// Request type name.
    pub input: String,
    /// Position of the request type.
    pub input_pos: Position,
    /// `stream` request.
    pub client_streaming: bool,
    /// Response type name.
    pub output: String,
    /// Position of the response type.
    pub output_pos: Position,
    /// `stream` response.
    pub server_streaming: bool,
    /// Method options.
    pub options: Vec<OptionDecl>,
    /// Position of the name.
    pub pos: Position,
}

/// A `service` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDecl {
    /// Service name.
    pub name: String,
    /// Methods in declaration order.
    pub methods: Vec<MethodDecl>,
    /// Service options.
    pub options: Vec<OptionDecl>,
    /// Position of the name.
    pub pos: Position,
}

/// An `extend` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendDecl {
    /// Extended message name as written.
    pub extendee: String,
    /// Extension fields.
    pub fields: Vec<FieldDecl>,
    /// Group bodies declared inside the block.
    pub messages: Vec<MessageDecl>,
    /// Position of the extendee name.
    pub pos: Position,
}

/// A parsed `.proto` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntaxTree {
    /// Declared syntax or edition.
    pub syntax: Syntax,
    /// `package` name.
    pub package: Option<String>,
    /// Import statements in declaration order.
    pub imports: Vec<ImportStatement>,
    /// File options.
    pub options: Vec<OptionDecl>,
    /// Top-level messages.
    pub messages: Vec<MessageDecl>,
    /// Top-level enums.
    pub enums: Vec<EnumDecl>,
    /// Services.
    pub services: Vec<ServiceDecl>,
    /// Top-level extend blocks.
    pub extends: Vec<ExtendDecl>,
}
