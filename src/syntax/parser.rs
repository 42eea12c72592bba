//! Recursive-descent parser for the protobuf language.
//!
//! Errors do not stop parsing: after a failed statement the parser skips to
//! the end of that statement (a `;` or a balanced `{ ... }` block) and
//! carries on, so one pass reports every independent problem in a file.

use crate::file::VirtualPath;

use super::ast::*;
use super::lexer::{parse_int, tokenize, Token, TokenKind};
use super::{Parser, SyntaxError};

/// The built-in `.proto` parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtoParser;

impl Parser for ProtoParser {
    fn parse(&self, path: &VirtualPath, text: &str) -> Result<SyntaxTree, Vec<SyntaxError>> {
        let tokens = tokenize(text).map_err(|err| vec![err])?;
        let mut state = State {
            tokens: &tokens,
            pos: 0,
            errors: Vec::new(),
        };
        let tree = state.file();

        if state.errors.is_empty() {
            Ok(tree)
        } else {
            tracing::debug!(%path, errors = state.errors.len(), "syntax errors");
            Err(state.errors)
        }
    }
}

type PResult<T> = Result<T, SyntaxError>;

struct State<'t> {
    tokens: &'t [Token],
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl<'t> State<'t> {
    // =========================================================================
    // Token helpers
    // =========================================================================

    fn peek(&self) -> &'t Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &'t Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn bump(&mut self) -> &'t Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn position(&self) -> Position {
        let token = self.peek();
        Position::new(token.line, token.column)
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(token.line, token.column, message)
    }

    fn expected(&self, what: &str) -> SyntaxError {
        let token = self.peek();
        self.error_at(token, format!("expected {what}, found {token}"))
    }

    fn eat_symbol(&mut self, symbol: char) -> bool {
        if self.peek().is_symbol(symbol) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> PResult<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.expected(&format!("\"{symbol}\"")))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_ident(keyword) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.expected(&format!("\"{keyword}\"")))
        }
    }

    fn ident(&mut self) -> PResult<(String, Position)> {
        let pos = self.position();
        match self.peek().ident() {
            Some(name) => {
                self.bump();
                Ok((name.to_owned(), pos))
            }
            None => Err(self.expected("identifier")),
        }
    }

    /// `ident ("." ident)*`
    fn full_ident(&mut self) -> PResult<(String, Position)> {
        let (mut name, pos) = self.ident()?;
        while self.peek().is_symbol('.') {
            self.bump();
            name.push('.');
            name.push_str(&self.ident()?.0);
        }
        Ok((name, pos))
    }

    /// `["."] full_ident`
    fn type_name(&mut self) -> PResult<(String, Position)> {
        let pos = self.position();
        if self.eat_symbol('.') {
            let (name, _) = self.full_ident()?;
            Ok((format!(".{name}"), pos))
        } else {
            self.full_ident()
        }
    }

    /// One or more adjacent string literals, concatenated.
    fn string(&mut self) -> PResult<(String, Position)> {
        let pos = self.position();
        let mut out = String::new();
        let mut any = false;
        while let TokenKind::Str(s) = &self.peek().kind {
            out.push_str(s);
            self.bump();
            any = true;
        }
        if any {
            Ok((out, pos))
        } else {
            Err(self.expected("string"))
        }
    }

    fn integer(&mut self) -> PResult<i64> {
        let negative = self.eat_symbol('-');
        let token = self.peek();
        let TokenKind::Int(text) = &token.kind else {
            return Err(self.expected("integer"));
        };
        let value = parse_int(text)
            .and_then(|v| i64::try_from(v).ok())
            .ok_or_else(|| self.error_at(token, format!("integer \"{text}\" is out of range")))?;
        self.bump();
        Ok(if negative { -value } else { value })
    }

    /// Skip to the end of the current statement after an error.
    ///
    /// A `}` closing the enclosing block is left in place so that block's
    /// loop can finish normally.
    fn recover(&mut self) {
        let mut depth = 0usize;
        while !self.at_eof() {
            let token = self.peek();
            if token.is_symbol('}') && depth == 0 {
                return;
            }
            self.bump();
            if token.is_symbol(';') && depth == 0 {
                return;
            }
            if token.is_symbol('{') {
                depth += 1;
            } else if token.is_symbol('}') {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
        }
    }

    /// Run `statement`, recording its error and resynchronizing on failure.
    fn guarded(&mut self, statement: impl FnOnce(&mut Self) -> PResult<()>) {
        let start = self.pos;
        if let Err(err) = statement(self) {
            self.errors.push(err);
            self.recover();
            if self.pos == start {
                self.bump();
            }
        }
    }

    /// Whether a keyword at the cursor is really the type of a field,
    /// as in `message message = 1;`.
    fn keyword_is_type(&self) -> bool {
        self.peek_at(1).is_symbol('.') || self.peek_at(2).is_symbol('=')
    }

    /// Parse a `{ ... }` body until the closing brace.
    fn block(&mut self, what: &str, mut item: impl FnMut(&mut Self) -> PResult<()>) -> PResult<()> {
        self.expect_symbol('{')?;
        loop {
            if self.eat_symbol('}') {
                return Ok(());
            }
            if self.at_eof() {
                return Err(self.expected(&format!("\"}}\" to close {what}")));
            }
            self.guarded(&mut item);
        }
    }

    // =========================================================================
    // File level
    // =========================================================================

    fn file(&mut self) -> SyntaxTree {
        let mut tree = SyntaxTree::default();
        let mut first = true;

        while !self.at_eof() {
            let is_first = first;
            first = false;
            self.guarded(|s| s.top_level(&mut tree, is_first));
        }

        tree
    }

    fn top_level(&mut self, tree: &mut SyntaxTree, first: bool) -> PResult<()> {
        if self.eat_symbol(';') {
            return Ok(());
        }

        let token = self.peek();
        match token.ident() {
            Some(keyword @ ("syntax" | "edition")) => {
                if !first {
                    return Err(self.error_at(token, format!("\"{keyword}\" must be the first statement")));
                }
                self.bump();
                self.expect_symbol('=')?;
                let value_token = self.peek();
                let (value, _) = self.string()?;
                tree.syntax = match (keyword, value.as_str()) {
                    ("syntax", "proto2") => Syntax::Proto2,
                    ("syntax", "proto3") => Syntax::Proto3,
                    ("syntax", other) => {
                        return Err(self.error_at(
                            value_token,
                            format!("unrecognized syntax identifier \"{other}\"; expected \"proto2\" or \"proto3\""),
                        ));
                    }
                    (_, edition) => Syntax::Edition(edition.to_owned()),
                };
                self.expect_symbol(';')
            }
            Some("package") => {
                if tree.package.is_some() {
                    return Err(self.error_at(token, "multiple package definitions"));
                }
                self.bump();
                let (name, _) = self.full_ident()?;
                self.expect_symbol(';')?;
                tree.package = Some(name);
                Ok(())
            }
            Some("import") => {
                self.bump();
                let kind = if self.eat_keyword("public") {
                    ImportKind::Public
                } else if self.eat_keyword("weak") {
                    ImportKind::Weak
                } else {
                    ImportKind::Default
                };
                let (path, _) = self.string()?;
                self.expect_symbol(';')?;
                tree.imports.push(ImportStatement {
                    path,
                    kind,
                    pos: Position::new(token.line, token.column),
                });
                Ok(())
            }
            Some("option") => {
                tree.options.push(self.option_statement()?);
                Ok(())
            }
            Some("message") => {
                tree.messages.push(self.message()?);
                Ok(())
            }
            Some("enum") => {
                tree.enums.push(self.enumeration()?);
                Ok(())
            }
            Some("service") => {
                tree.services.push(self.service()?);
                Ok(())
            }
            Some("extend") => {
                tree.extends.push(self.extend()?);
                Ok(())
            }
            _ => Err(self.error_at(
                token,
                format!("expected top-level statement (e.g. \"message\"), found {token}"),
            )),
        }
    }

    // =========================================================================
    // Options
    // =========================================================================

    /// `option name = value ;`
    fn option_statement(&mut self) -> PResult<OptionDecl> {
        self.expect_keyword("option")?;
        let option = self.option_assignment()?;
        self.expect_symbol(';')?;
        Ok(option)
    }

    /// `name = value`
    fn option_assignment(&mut self) -> PResult<OptionDecl> {
        let pos = self.position();
        let name = self.option_name()?;
        self.expect_symbol('=')?;
        let value = self.constant()?;
        Ok(OptionDecl { name, value, pos })
    }

    /// `( "(" type_name ")" | ident ) ( "." ( "(" type_name ")" | ident ) )*`
    fn option_name(&mut self) -> PResult<String> {
        let mut name = String::new();
        loop {
            if self.eat_symbol('(') {
                let (ext, _) = self.type_name()?;
                self.expect_symbol(')')?;
                name.push('(');
                name.push_str(&ext);
                name.push(')');
            } else {
                name.push_str(&self.ident()?.0);
            }
            if !self.eat_symbol('.') {
                return Ok(name);
            }
            name.push('.');
        }
    }

    /// Scalar constant, string, or `{ ... }` aggregate, as written.
    fn constant(&mut self) -> PResult<String> {
        let token = self.peek();
        match &token.kind {
            TokenKind::Str(_) => Ok(self.string()?.0),
            TokenKind::Symbol('{') => self.aggregate(),
            TokenKind::Symbol(sign @ ('-' | '+')) => {
                self.bump();
                let token = self.peek();
                match &token.kind {
                    TokenKind::Int(v) | TokenKind::Float(v) | TokenKind::Ident(v) => {
                        self.bump();
                        Ok(format!("{sign}{v}"))
                    }
                    _ => Err(self.expected("number")),
                }
            }
            TokenKind::Int(v) | TokenKind::Float(v) | TokenKind::Ident(v) => {
                self.bump();
                Ok(v.clone())
            }
            _ => Err(self.expected("constant")),
        }
    }

    /// Balanced text-format aggregate, kept verbatim-ish.
    fn aggregate(&mut self) -> PResult<String> {
        let open = self.peek();
        self.expect_symbol('{')?;
        let mut depth = 1usize;
        let mut parts = vec!["{".to_owned()];

        while depth > 0 {
            let token = self.bump();
            match &token.kind {
                TokenKind::Eof => return Err(self.error_at(open, "aggregate value is never closed")),
                TokenKind::Symbol('{') => depth += 1,
                TokenKind::Symbol('}') => depth -= 1,
                _ => {}
            }
            parts.push(match &token.kind {
                TokenKind::Str(s) => format!("{s:?}"),
                TokenKind::Ident(s) | TokenKind::Int(s) | TokenKind::Float(s) => s.clone(),
                TokenKind::Symbol(c) => c.to_string(),
                TokenKind::Eof => String::new(),
            });
        }
        Ok(parts.join(" "))
    }

    /// `[ assignment ("," assignment)* ]`, if present.
    fn field_options(&mut self) -> PResult<Vec<OptionDecl>> {
        let mut options = Vec::new();
        if self.eat_symbol('[') {
            loop {
                options.push(self.option_assignment()?);
                if !self.eat_symbol(',') {
                    break;
                }
            }
            self.expect_symbol(']')?;
        }
        Ok(options)
    }

    /// Skip a statement whose content does not matter (`reserved`, `extensions`).
    fn skip_statement(&mut self) -> PResult<()> {
        let start = self.peek();
        self.bump();
        while !self.eat_symbol(';') {
            if self.at_eof() || self.peek().is_symbol('}') || self.peek().is_symbol('{') {
                return Err(self.error_at(start, format!("expected \";\" to end {start} statement")));
            }
            self.bump();
        }
        Ok(())
    }

    // =========================================================================
    // Messages
    // =========================================================================

    fn message(&mut self) -> PResult<MessageDecl> {
        self.expect_keyword("message")?;
        let (name, pos) = self.ident()?;
        let mut message = MessageDecl {
            name,
            pos,
            ..MessageDecl::default()
        };
        self.block("message", |s| s.message_item(&mut message))?;
        Ok(message)
    }

    fn message_item(&mut self, message: &mut MessageDecl) -> PResult<()> {
        if self.eat_symbol(';') {
            return Ok(());
        }

        match self.peek().ident() {
            Some("message") if !self.keyword_is_type() => message.messages.push(self.message()?),
            Some("enum") if !self.keyword_is_type() => message.enums.push(self.enumeration()?),
            Some("extend") if !self.keyword_is_type() => message.extends.push(self.extend()?),
            Some("option") => message.options.push(self.option_statement()?),
            Some("reserved" | "extensions") => self.skip_statement()?,
            Some("oneof") if !self.keyword_is_type() => self.oneof(message)?,
            _ => {
                let field = self.field(None, &mut message.messages)?;
                message.fields.push(field);
            }
        }
        Ok(())
    }

    fn oneof(&mut self, message: &mut MessageDecl) -> PResult<()> {
        self.expect_keyword("oneof")?;
        let (name, pos) = self.ident()?;
        let index = message.oneofs.len();
        message.oneofs.push(OneofDecl {
            name,
            options: Vec::new(),
            pos,
        });

        self.block("oneof", |s| {
            if s.eat_symbol(';') {
                return Ok(());
            }
            if s.peek().is_ident("option") {
                let option = s.option_statement()?;
                message.oneofs[index].options.push(option);
                return Ok(());
            }
            let field = s.field(Some(index), &mut message.messages)?;
            message.fields.push(field);
            Ok(())
        })
    }

    /// `[label] type name = number [options] ;` or a group.
    ///
    /// Group bodies are appended to `nested`.
    fn field(&mut self, oneof: Option<usize>, nested: &mut Vec<MessageDecl>) -> PResult<FieldDecl> {
        let label_token = self.peek();
        let label = match label_token.ident() {
            Some("optional") if !self.peek_at(1).is_symbol('=') => Some(FieldLabel::Optional),
            Some("required") if !self.peek_at(1).is_symbol('=') => Some(FieldLabel::Required),
            Some("repeated") if !self.peek_at(1).is_symbol('=') => Some(FieldLabel::Repeated),
            _ => None,
        };
        if label.is_some() {
            if oneof.is_some() {
                return Err(self.error_at(label_token, "fields in oneofs must not have labels"));
            }
            self.bump();
        }

        if self.peek().is_ident("group") && self.peek_at(1).ident().is_some() && self.peek_at(2).is_symbol('=') {
            return self.group(label, oneof, nested);
        }

        let type_pos = self.position();
        let ty = if self.peek().is_ident("map") && self.peek_at(1).is_symbol('<') {
            self.bump();
            self.bump();
            let (key, _) = self.type_name()?;
            self.expect_symbol(',')?;
            let (value, _) = self.type_name()?;
            self.expect_symbol('>')?;
            FieldTypeRef::Map { key, value }
        } else {
            FieldTypeRef::Named(self.type_name()?.0)
        };

        let (name, pos) = self.ident()?;
        self.expect_symbol('=')?;
        let number = self.integer()?;
        let options = self.field_options()?;
        self.expect_symbol(';')?;

        Ok(FieldDecl {
            name,
            number,
            label,
            ty,
            oneof,
            options,
            pos,
            type_pos,
        })
    }

    /// `group Name = number [options] { body }`
    fn group(
        &mut self,
        label: Option<FieldLabel>,
        oneof: Option<usize>,
        nested: &mut Vec<MessageDecl>,
    ) -> PResult<FieldDecl> {
        self.expect_keyword("group")?;
        let (name, pos) = self.ident()?;
        if !name.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Err(SyntaxError::new(pos.line, pos.column, "group names must start with a capital letter"));
        }
        self.expect_symbol('=')?;
        let number = self.integer()?;
        let options = self.field_options()?;

        let mut body = MessageDecl {
            name: name.clone(),
            pos,
            ..MessageDecl::default()
        };
        self.block("group", |s| s.message_item(&mut body))?;
        nested.push(body);

        Ok(FieldDecl {
            name: name.to_ascii_lowercase(),
            number,
            label,
            ty: FieldTypeRef::Named(name),
            oneof,
            options,
            pos,
            type_pos: pos,
        })
    }

    // =========================================================================
    // Enums, services, extends
    // =========================================================================

    fn enumeration(&mut self) -> PResult<EnumDecl> {
        self.expect_keyword("enum")?;
        let (name, pos) = self.ident()?;
        let mut decl = EnumDecl {
            name,
            pos,
            ..EnumDecl::default()
        };

        self.block("enum", |s| {
            if s.eat_symbol(';') {
                return Ok(());
            }
            match s.peek().ident() {
                Some("option") => decl.options.push(s.option_statement()?),
                Some("reserved") => s.skip_statement()?,
                _ => {
                    let (name, pos) = s.ident()?;
                    s.expect_symbol('=')?;
                    let number = s.integer()?;
                    let options = s.field_options()?;
                    s.expect_symbol(';')?;
                    decl.values.push(EnumValueDecl {
                        name,
                        number,
                        options,
                        pos,
                    });
                }
            }
            Ok(())
        })?;

        Ok(decl)
    }

    fn service(&mut self) -> PResult<ServiceDecl> {
        self.expect_keyword("service")?;
        let (name, pos) = self.ident()?;
        let mut decl = ServiceDecl {
            name,
            pos,
            ..ServiceDecl::default()
        };

        self.block("service", |s| {
            if s.eat_symbol(';') {
                return Ok(());
            }
            match s.peek().ident() {
                Some("option") => decl.options.push(s.option_statement()?),
                Some("rpc") => decl.methods.push(s.method()?),
                _ => return Err(s.expected("\"rpc\" or \"option\"")),
            }
            Ok(())
        })?;

        Ok(decl)
    }

    /// `rpc Name ( [stream] Req ) returns ( [stream] Resp ) ( ";" | "{" ... "}" )`
    fn method(&mut self) -> PResult<MethodDecl> {
        self.expect_keyword("rpc")?;
        let (name, pos) = self.ident()?;

        let (client_streaming, input, input_pos) = self.method_type()?;
        self.expect_keyword("returns")?;
        let (server_streaming, output, output_pos) = self.method_type()?;

        let mut options = Vec::new();
        if self.peek().is_symbol('{') {
            self.block("rpc", |s| {
                if !s.eat_symbol(';') {
                    options.push(s.option_statement()?);
                }
                Ok(())
            })?;
        } else {
            self.expect_symbol(';')?;
        }

        Ok(MethodDecl {
            name,
            input,
            input_pos,
            client_streaming,
            output,
            output_pos,
            server_streaming,
            options,
            pos,
        })
    }

    fn method_type(&mut self) -> PResult<(bool, String, Position)> {
        self.expect_symbol('(')?;
        let streaming = self.peek().is_ident("stream") && !self.peek_at(1).is_symbol(')') && !self.peek_at(1).is_symbol('.');
        if streaming {
            self.bump();
        }
        let (name, pos) = self.type_name()?;
        self.expect_symbol(')')?;
        Ok((streaming, name, pos))
    }

    fn extend(&mut self) -> PResult<ExtendDecl> {
        self.expect_keyword("extend")?;
        let (extendee, pos) = self.type_name()?;
        let mut decl = ExtendDecl {
            extendee,
            fields: Vec::new(),
            messages: Vec::new(),
            pos,
        };

        self.block("extend", |s| {
            if s.eat_symbol(';') {
                return Ok(());
            }
            let field = s.field(None, &mut decl.messages)?;
            decl.fields.push(field);
            Ok(())
        })?;

        Ok(decl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<SyntaxTree, Vec<SyntaxError>> {
        ProtoParser.parse(&VirtualPath::new("test.proto").unwrap(), text)
    }

    #[test]
    fn test_file_header() {
        let tree = parse(
            r#"
            syntax = "proto3";
            package acme.orders.v1;
            import "google/protobuf/timestamp.proto";
            import public "acme/common.proto";
            import weak "legacy.proto";
            option java_package = "com.acme.orders";
            option (acme.custom) = { name: "x" nested { a: 1 } };
            "#,
        )
        .unwrap();

        assert_eq!(tree.syntax, Syntax::Proto3);
        assert_eq!(tree.package.as_deref(), Some("acme.orders.v1"));
        assert_eq!(tree.imports.len(), 3);
        assert_eq!(tree.imports[0].path, "google/protobuf/timestamp.proto");
        assert_eq!(tree.imports[0].pos, Position::new(4, 13));
        assert_eq!(tree.imports[1].kind, ImportKind::Public);
        assert_eq!(tree.imports[2].kind, ImportKind::Weak);
        assert_eq!(tree.options[0].name, "java_package");
        assert_eq!(tree.options[0].value, "com.acme.orders");
        assert_eq!(tree.options[1].name, "(acme.custom)");
    }

    #[test]
    fn test_messages_and_fields() {
        let tree = parse(
            r#"
            syntax = "proto3";
            message Order {
              string id = 1;
              repeated .acme.Item items = 2 [deprecated = true, (x.y).z = -1];
              map<string, int64> counts = 3;
              oneof payment {
                Card card = 4;
                string voucher = 5;
              }
              message Item { int32 qty = 1; }
              enum State { STATE_UNSPECIFIED = 0; OPEN = 1; }
              reserved 6, 8 to 10;
              reserved "old";
            }
            "#,
        )
        .unwrap();

        let order = &tree.messages[0];
        assert_eq!(order.name, "Order");
        assert_eq!(order.fields.len(), 5);
        assert_eq!(order.fields[1].label, Some(FieldLabel::Repeated));
        assert_eq!(order.fields[1].ty, FieldTypeRef::Named(".acme.Item".into()));
        assert_eq!(order.fields[1].options.len(), 2);
        assert_eq!(
            order.fields[2].ty,
            FieldTypeRef::Map {
                key: "string".into(),
                value: "int64".into()
            }
        );
        assert_eq!(order.oneofs[0].name, "payment");
        assert_eq!(order.fields[3].oneof, Some(0));
        assert_eq!(order.fields[3].type_pos, Position::new(8, 17));
        assert_eq!(order.messages[0].name, "Item");
        assert_eq!(order.enums[0].values[1].name, "OPEN");
    }

    #[test]
    fn test_services() {
        let tree = parse(
            r#"
            service Orders {
              option deprecated = false;
              rpc Get (GetRequest) returns (Order);
              rpc Watch (stream WatchRequest) returns (stream Event) {
                option idempotency_level = NO_SIDE_EFFECTS;
              }
            }
            "#,
        )
        .unwrap();

        let service = &tree.services[0];
        assert_eq!(service.methods.len(), 2);
        assert!(!service.methods[0].client_streaming);
        assert!(service.methods[1].client_streaming);
        assert!(service.methods[1].server_streaming);
        assert_eq!(service.methods[1].output, "Event");
        assert_eq!(service.methods[1].options.len(), 1);
    }

    #[test]
    fn test_proto2_groups_and_extensions() {
        let tree = parse(
            r#"
            syntax = "proto2";
            message Search {
              extensions 100 to max;
              repeated group Result = 1 {
                required string url = 2;
              }
            }
            extend Search {
              optional int32 rank = 100;
            }
            "#,
        )
        .unwrap();

        let search = &tree.messages[0];
        assert_eq!(search.fields[0].name, "result");
        assert_eq!(search.fields[0].ty, FieldTypeRef::Named("Result".into()));
        assert_eq!(search.messages[0].name, "Result");
        assert_eq!(tree.extends[0].extendee, "Search");
        assert_eq!(tree.extends[0].fields[0].number, 100);
    }

    #[test]
    fn test_keyword_as_type_name() {
        let tree = parse("message message { message message = 1; }").unwrap();
        assert_eq!(tree.messages[0].fields[0].ty, FieldTypeRef::Named("message".into()));
    }

    #[test]
    fn test_missing_semicolon_position() {
        let errors = parse("syntax = \"proto3\";\nmessage Foo {\n  int32 x = 1\n}\n").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!((errors[0].line, errors[0].column), (4, 1));
        assert!(errors[0].message.contains("expected \";\""));
    }

    #[test]
    fn test_collects_independent_errors() {
        let errors = parse(
            "message A {\n  int32 = 1;\n}\nmessage B {\n  string name 2;\n}\nmessage C { int32 ok = 1; }\n",
        )
        .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line, 2);
        assert_eq!(errors[1].line, 5);
    }

    #[test]
    fn test_unknown_syntax() {
        let errors = parse("syntax = \"proto4\";").unwrap_err();
        assert_eq!((errors[0].line, errors[0].column), (1, 10));
    }

    #[test]
    fn test_syntax_must_come_first() {
        let errors = parse("package a;\nsyntax = \"proto3\";").unwrap_err();
        assert_eq!(errors[0].line, 2);
    }

    #[test]
    fn test_unclosed_message() {
        let errors = parse("message A {\n  int32 x = 1;\n").unwrap_err();
        assert!(errors[0].message.contains("to close message"));
    }

    #[test]
    fn test_labels_rejected_in_oneof() {
        let errors = parse("message A { oneof o { optional int32 x = 1; } }").unwrap_err();
        assert!(errors[0].message.contains("oneofs must not have labels"));
    }
}
