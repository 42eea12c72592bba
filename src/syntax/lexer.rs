//! Tokenizer for `.proto` source text.

use std::fmt;

use super::SyntaxError;

/// Token categories.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Identifier or keyword.
    Ident(String),
    /// Integer literal, as written (`42`, `0x2A`, `052`).
    Int(String),
    /// Floating point literal, as written.
    Float(String),
    /// String literal with escapes decoded.
    Str(String),
    /// Single punctuation character.
    Symbol(char),
    /// End of input.
    Eof,
}

/// A token with its 1-based start position.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_symbol(&self, symbol: char) -> bool {
        self.kind == TokenKind::Symbol(symbol)
    }

    pub fn is_ident(&self, keyword: &str) -> bool {
        self.ident() == Some(keyword)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Ident(s) | TokenKind::Int(s) | TokenKind::Float(s) => write!(f, "\"{s}\""),
            TokenKind::Str(s) => write!(f, "string {s:?}"),
            TokenKind::Symbol(c) => write!(f, "\"{c}\""),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
}

impl Cursor<'_> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, line: u32, column: u32, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(line, column, message)
    }
}

/// Split `text` into tokens, ending with [`TokenKind::Eof`].
pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut cursor = Cursor {
        chars: text.chars().peekable(),
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();

    while let Some(c) = cursor.peek() {
        let (line, column) = (cursor.line, cursor.column);

        if c.is_whitespace() {
            cursor.bump();
            continue;
        }

        if c == '/' {
            match cursor.peek_second() {
                Some('/') => {
                    while cursor.peek().is_some_and(|c| c != '\n') {
                        cursor.bump();
                    }
                    continue;
                }
                Some('*') => {
                    skip_block_comment(&mut cursor, line, column)?;
                    continue;
                }
                _ => {}
            }
        }

        let kind = if c.is_ascii_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(c) = cursor.peek().filter(|c| c.is_ascii_alphanumeric() || *c == '_') {
                ident.push(c);
                cursor.bump();
            }
            TokenKind::Ident(ident)
        } else if c.is_ascii_digit() || (c == '.' && cursor.peek_second().is_some_and(|c| c.is_ascii_digit())) {
            number(&mut cursor, line, column)?
        } else if c == '"' || c == '\'' {
            TokenKind::Str(string(&mut cursor, line, column)?)
        } else if "{}[]()<>;,=.:-+/".contains(c) {
            cursor.bump();
            TokenKind::Symbol(c)
        } else {
            return Err(cursor.error(line, column, format!("invalid character {c:?}")));
        };

        tokens.push(Token { kind, line, column });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line: cursor.line,
        column: cursor.column,
    });
    Ok(tokens)
}

fn skip_block_comment(cursor: &mut Cursor<'_>, line: u32, column: u32) -> Result<(), SyntaxError> {
    cursor.bump();
    cursor.bump();
    loop {
        match cursor.bump() {
            Some('*') if cursor.peek() == Some('/') => {
                cursor.bump();
                return Ok(());
            }
            Some(_) => {}
            None => return Err(cursor.error(line, column, "block comment is never terminated")),
        }
    }
}

fn number(cursor: &mut Cursor<'_>, line: u32, column: u32) -> Result<TokenKind, SyntaxError> {
    let mut text = String::new();
    while let Some(c) = cursor.peek() {
        let after_exponent = matches!(text.chars().last(), Some('e' | 'E')) && !text.starts_with("0x") && !text.starts_with("0X");
        if c.is_ascii_alphanumeric() || c == '_' || c == '.' || (after_exponent && (c == '+' || c == '-')) {
            text.push(c);
            cursor.bump();
        } else {
            break;
        }
    }

    let is_hex = text.starts_with("0x") || text.starts_with("0X");
    if !is_hex && (text.contains('.') || text.contains(['e', 'E'])) {
        return match text.parse::<f64>() {
            Ok(_) => Ok(TokenKind::Float(text)),
            Err(_) => Err(cursor.error(line, column, format!("invalid number \"{text}\""))),
        };
    }

    match parse_int(&text) {
        Some(_) => Ok(TokenKind::Int(text)),
        None => Err(cursor.error(line, column, format!("invalid integer \"{text}\""))),
    }
}

/// Parse an integer literal in decimal, hex (`0x`) or octal (leading `0`).
pub(crate) fn parse_int(text: &str) -> Option<u64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') {
        u64::from_str_radix(&text[1..], 8).ok()
    } else {
        text.parse().ok()
    }
}

fn string(cursor: &mut Cursor<'_>, line: u32, column: u32) -> Result<String, SyntaxError> {
    let Some(quote) = cursor.bump() else {
        return Err(cursor.error(line, column, "expected string"));
    };
    let mut out = String::new();

    loop {
        match cursor.bump() {
            None | Some('\n') => {
                return Err(cursor.error(line, column, "string literal is never terminated"));
            }
            Some(c) if c == quote => return Ok(out),
            Some('\\') => {
                let (esc_line, esc_column) = (cursor.line, cursor.column);
                let escaped = match cursor.bump() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some('a') => '\x07',
                    Some('b') => '\x08',
                    Some('f') => '\x0c',
                    Some('v') => '\x0b',
                    Some(first @ '0'..='7') => {
                        let mut value = first as u32 - '0' as u32;
                        for _ in 0..2 {
                            match cursor.peek().and_then(|c| c.to_digit(8)) {
                                Some(d) => {
                                    value = value * 8 + d;
                                    cursor.bump();
                                }
                                None => break,
                            }
                        }
                        char::from_u32(value).unwrap_or('\u{fffd}')
                    }
                    Some('x' | 'X') => {
                        let mut value = 0u32;
                        let mut digits = 0;
                        while digits < 2 {
                            match cursor.peek().and_then(|c| c.to_digit(16)) {
                                Some(d) => {
                                    value = value * 16 + d;
                                    cursor.bump();
                                    digits += 1;
                                }
                                None => break,
                            }
                        }
                        if digits == 0 {
                            return Err(cursor.error(esc_line, esc_column, "expected hex digits for escape sequence"));
                        }
                        char::from_u32(value).unwrap_or('\u{fffd}')
                    }
                    Some(c @ ('\\' | '\'' | '"' | '?')) => c,
                    Some(other) => {
                        return Err(cursor.error(esc_line, esc_column, format!("invalid escape sequence \\{other}")));
                    }
                    None => {
                        return Err(cursor.error(line, column, "string literal is never terminated"));
                    }
                };
                out.push(escaped);
            }
            Some(c) => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokens_and_positions() {
        let tokens = tokenize("message Foo {\n  int32 x = 1;\n}").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("message".into()));
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[3].line, tokens[3].column), (2, 3));
        assert_eq!(tokens[6].kind, TokenKind::Int("1".into()));
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("// line\n/* block\n comment */ foo"),
            vec![TokenKind::Ident("foo".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("0x1F 017 42 1.5 2e10 -3"),
            vec![
                TokenKind::Int("0x1F".into()),
                TokenKind::Int("017".into()),
                TokenKind::Int("42".into()),
                TokenKind::Float("1.5".into()),
                TokenKind::Float("2e10".into()),
                TokenKind::Symbol('-'),
                TokenKind::Int("3".into()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(parse_int("0x1F"), Some(31));
        assert_eq!(parse_int("017"), Some(15));
        assert_eq!(parse_int("0"), Some(0));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\n" 'c\x41\101'"#),
            vec![
                TokenKind::Str("a\"b\n".into()),
                TokenKind::Str("cAA".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("import \"a.proto;\n").unwrap_err();
        assert_eq!((err.line, err.column), (1, 8));
        assert!(err.message.contains("never terminated"));
    }

    #[test]
    fn test_unterminated_comment() {
        let err = tokenize("foo /* bar").unwrap_err();
        assert_eq!((err.line, err.column), (1, 5));
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("message Foo # {}").unwrap_err();
        assert_eq!((err.line, err.column), (1, 13));
    }
}
