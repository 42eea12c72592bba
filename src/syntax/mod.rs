//! Schema parsing.
//!
//! The importer only needs two things from a parser: a syntax tree it can
//! hand to the [`Linker`](crate::descriptor::Linker), and the file's import
//! statements with their positions. Anything implementing [`Parser`] can be
//! plugged in; [`ProtoParser`] is the built-in parser for the protobuf
//! language.

mod ast;
mod lexer;
mod parser;

use std::fmt;

pub use ast::{
    EnumDecl, EnumValueDecl, ExtendDecl, FieldDecl, FieldLabel, FieldTypeRef, ImportKind,
    ImportStatement, MessageDecl, MethodDecl, OneofDecl, OptionDecl, Position, ServiceDecl, Syntax,
    SyntaxTree,
};
pub use parser::ProtoParser;

use crate::file::VirtualPath;

/// A syntax error with a 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Line (1-based).
    pub line: u32,
    /// Column (1-based).
    pub column: u32,
    /// What went wrong.
    pub message: String,
}

impl SyntaxError {
    /// Create a syntax error.
    pub fn new(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Turns file text into a [`SyntaxTree`].
pub trait Parser: Send + Sync {
    /// Parse `text`, the content of the file at `path`.
    ///
    /// On failure, every syntax error found is returned, in source order.
    fn parse(&self, path: &VirtualPath, text: &str) -> Result<SyntaxTree, Vec<SyntaxError>>;
}
