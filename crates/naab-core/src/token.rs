//! The lexer: turns UTF-8 source text into a stream of [`Token`]s.

use std::{fmt, iter::Peekable, str::Chars};

/// A 1-based line/column pair. `NONE` marks a synthetic node with no source
/// location (e.g. a desugared pipeline call).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const NONE: Self = Self { line: 0, column: 0 };
    pub const START: Self = Self { line: 1, column: 1 };

    #[must_use]
    pub fn is_none(self) -> bool {
        self.line == 0
    }

    pub(crate) fn advance(&mut self) {
        self.column += 1;
    }

    pub(crate) fn newline(&mut self) {
        self.line += 1;
        self.column = 1;
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "<none>")
        } else {
            write!(f, "line {}, column {}", self.line, self.column)
        }
    }
}

/// Payload of an `<<lang[bindings] body >>` inline-code token, captured raw
/// (no interpolation) per `spec.md` §6.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineCodePayload {
    pub language: String,
    pub bindings: Vec<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // literals
    IntegerLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),
    Identifier(String),
    /// `BLOCK-<LANG>-<CODE>`, e.g. `BLOCK-CPP-MATH01`.
    BlockId(String),
    InlineCode(Box<InlineCodePayload>),

    // keywords
    Let,
    Fn,
    Struct,
    Enum,
    Use,
    Main,
    Return,
    If,
    Else,
    While,
    For,
    In,
    Try,
    Catch,
    Finally,
    Throw,
    Break,
    Continue,
    New,
    As,
    Null,
    Any,
    Void,
    List,
    Dict,

    // punctuation
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    SemiColon,
    Dot,
    Question,
    Pipe,
    Arrow,    // ->
    FatArrow, // => (reserved, unused by the current grammar)
    Pipeline, // |>
    Assign,   // =
    Eq,       // ==
    NotEq,    // !=
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
    /// Whether at least one `\n` was skipped between the previous token and
    /// this one. The parser uses this (rather than a dedicated `Newline`
    /// token) to decide statement termination per `spec.md` §4.1/§4.2: most
    /// punctuation swallows a preceding newline, `|>` is explicitly allowed
    /// to start a continuation line, and anything else starting a line acts
    /// as an implicit statement break.
    pub newline_before: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub position: Position,
    pub reason: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.reason, self.position)
    }
}

impl std::error::Error for LexError {}

fn keyword(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "let" => TokenKind::Let,
        "fn" => TokenKind::Fn,
        "struct" => TokenKind::Struct,
        "enum" => TokenKind::Enum,
        "use" => TokenKind::Use,
        "main" => TokenKind::Main,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "finally" => TokenKind::Finally,
        "throw" => TokenKind::Throw,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "new" => TokenKind::New,
        "as" => TokenKind::As,
        "null" => TokenKind::Null,
        "any" => TokenKind::Any,
        "void" => TokenKind::Void,
        "list" => TokenKind::List,
        "dict" => TokenKind::Dict,
        "true" => TokenKind::BoolLiteral(true),
        "false" => TokenKind::BoolLiteral(false),
        _ => return None,
    })
}

/// A `BLOCK-<LANG>-<CODE>` identifier matches `BLOCK-[A-Z]+-[0-9A-Z]+`.
#[must_use]
pub fn is_block_id(s: &str) -> bool {
    let Some(rest) = s.strip_prefix("BLOCK-") else {
        return false;
    };
    let Some((lang, code)) = rest.split_once('-') else {
        return false;
    };
    !lang.is_empty()
        && !code.is_empty()
        && lang.bytes().all(|b| b.is_ascii_uppercase())
        && code.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    pos: Position,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            pos: Position::START,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if let Some(c) = c {
            if c == '\n' {
                self.pos.newline();
            } else {
                self.pos.advance();
            }
        }
        c
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek2(&mut self) -> Option<char> {
        let mut clone = self.chars.clone();
        clone.next();
        clone.next()
    }

    /// Skip whitespace and comments, reporting whether a newline was seen.
    fn skip_insignificant(&mut self) -> bool {
        let mut saw_newline = false;
        loop {
            match self.peek() {
                Some('\n') => {
                    saw_newline = true;
                    self.bump();
                }
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        saw_newline
    }

    /// Produce the next token, or `Ok(None)` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        let newline_before = self.skip_insignificant();

        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let kind = match c {
            '0'..='9' => self.lex_number(start)?,
            '"' => self.lex_string(start)?,
            c if c.is_alphabetic() || c == '_' => self.lex_word(start)?,
            '<' if self.peek2() == Some('<') => self.lex_inline_code(start)?,
            _ => self.lex_punct(start)?,
        };

        Ok(Some(Token {
            kind,
            position: start,
            newline_before,
        }))
    }

    fn lex_punct(&mut self, start: Position) -> Result<TokenKind, LexError> {
        let c = self.bump().unwrap();
        let kind = match c {
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::SemiColon,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            '+' => TokenKind::Plus,
            '-' if self.peek() == Some('>') => {
                self.bump();
                TokenKind::Arrow
            }
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '|' if self.peek() == Some('>') => {
                self.bump();
                TokenKind::Pipeline
            }
            '|' if self.peek() == Some('|') => {
                self.bump();
                TokenKind::OrOr
            }
            '|' => TokenKind::Pipe,
            '&' if self.peek() == Some('&') => {
                self.bump();
                TokenKind::AndAnd
            }
            '=' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::Eq
            }
            '=' if self.peek() == Some('>') => {
                self.bump();
                TokenKind::FatArrow
            }
            '=' => TokenKind::Assign,
            '!' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::NotEq
            }
            '!' => TokenKind::Not,
            '<' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::LtEq
            }
            '<' => TokenKind::Lt,
            '>' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::GtEq
            }
            '>' => TokenKind::Gt,
            other => {
                return Err(LexError {
                    position: start,
                    reason: format!("unexpected character '{other}'"),
                })
            }
        };
        Ok(kind)
    }

    fn lex_number(&mut self, start: Position) -> Result<TokenKind, LexError> {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }

        // A float requires a dot with digits on both sides; `3.` alone is
        // left for the parser so that a later member-access-like form is
        // never swallowed into a number.
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            text.push(self.bump().unwrap()); // '.'
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
            }
            return text.parse::<f64>().map(TokenKind::FloatLiteral).map_err(|e| LexError {
                position: start,
                reason: format!("invalid float literal: {e}"),
            });
        }

        text.parse::<i64>().map(TokenKind::IntegerLiteral).map_err(|e| LexError {
            position: start,
            reason: format!("invalid integer literal: {e}"),
        })
    }

    fn lex_string(&mut self, start: Position) -> Result<TokenKind, LexError> {
        self.bump(); // opening quote
        let mut result = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(LexError {
                        position: start,
                        reason: "unterminated string literal".into(),
                    })
                }
                Some('"') => break,
                Some('\\') => {
                    let escaped = self.bump().ok_or_else(|| LexError {
                        position: start,
                        reason: "unterminated string literal".into(),
                    })?;
                    match escaped {
                        'n' => result.push('\n'),
                        't' => result.push('\t'),
                        'r' => result.push('\r'),
                        '\\' => result.push('\\'),
                        '"' => result.push('"'),
                        '\'' => result.push('\''),
                        'x' => {
                            let mut hex = String::with_capacity(2);
                            for _ in 0..2 {
                                hex.push(self.bump().ok_or_else(|| LexError {
                                    position: start,
                                    reason: "unterminated \\x escape".into(),
                                })?);
                            }
                            let byte = u8::from_str_radix(&hex, 16).map_err(|_| LexError {
                                position: start,
                                reason: format!("invalid \\x escape '\\x{hex}'"),
                            })?;
                            result.push(byte as char);
                        }
                        other => {
                            return Err(LexError {
                                position: start,
                                reason: format!("unknown escape sequence '\\{other}'"),
                            })
                        }
                    }
                }
                Some(c) => result.push(c),
            }
        }
        Ok(TokenKind::StringLiteral(result))
    }

    fn lex_word(&mut self, start: Position) -> Result<TokenKind, LexError> {
        let mut text = String::new();
        loop {
            match self.peek() {
                Some(c) if c.is_alphanumeric() || c == '_' => text.push(self.bump().unwrap()),
                // '-' only continues the word while it still looks like the
                // separator inside a `BLOCK-<LANG>-<CODE>` identifier;
                // otherwise it is the subtraction operator.
                Some('-') if text == "BLOCK" || looks_like_block_tail(&text) => {
                    let mut probe = self.chars.clone();
                    probe.next();
                    if matches!(probe.next(), Some(c) if c.is_ascii_alphanumeric()) {
                        text.push(self.bump().unwrap());
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }

        if is_block_id(&text) {
            return Ok(TokenKind::BlockId(text));
        }
        if let Some(kw) = keyword(&text) {
            return Ok(kw);
        }
        Ok(TokenKind::Identifier(text))
    }

    /// `<<lang[name1, name2] raw body text >>`
    fn lex_inline_code(&mut self, start: Position) -> Result<TokenKind, LexError> {
        self.bump(); // first '<'
        self.bump(); // second '<'

        let mut language = String::new();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            language.push(self.bump().unwrap());
        }

        let mut bindings = Vec::new();
        if self.peek() == Some('[') {
            self.bump();
            loop {
                while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                    self.bump();
                }
                if self.peek() == Some(']') {
                    self.bump();
                    break;
                }
                let mut name = String::new();
                while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
                    name.push(self.bump().unwrap());
                }
                if name.is_empty() {
                    return Err(LexError {
                        position: start,
                        reason: "expected a binding name in inline-code brackets".into(),
                    });
                }
                bindings.push(name);
                while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                    self.bump();
                }
                match self.peek() {
                    Some(',') => {
                        self.bump();
                    }
                    Some(']') => {
                        self.bump();
                        break;
                    }
                    _ => {
                        return Err(LexError {
                            position: start,
                            reason: "expected ',' or ']' in inline-code bindings".into(),
                        })
                    }
                }
            }
        }

        // Raw mode: scan verbatim until a `>>` not nested inside a deeper
        // `<<`/`>>` pair.
        let mut depth = 0usize;
        let mut body = String::new();
        loop {
            match (self.peek(), self.peek2()) {
                (Some('<'), Some('<')) => {
                    depth += 1;
                    body.push(self.bump().unwrap());
                    body.push(self.bump().unwrap());
                }
                (Some('>'), Some('>')) if depth == 0 => {
                    self.bump();
                    self.bump();
                    break;
                }
                (Some('>'), Some('>')) => {
                    depth -= 1;
                    body.push(self.bump().unwrap());
                    body.push(self.bump().unwrap());
                }
                (Some(_), _) => body.push(self.bump().unwrap()),
                (None, _) => {
                    return Err(LexError {
                        position: start,
                        reason: "unterminated inline-code block".into(),
                    })
                }
            }
        }

        Ok(TokenKind::InlineCode(Box::new(InlineCodePayload {
            language,
            bindings,
            body: body.trim().to_string(),
        })))
    }
}

fn looks_like_block_tail(text: &str) -> bool {
    // After "BLOCK-LANG" has been accumulated, a second '-' still belongs
    // to the identifier, e.g. "BLOCK-CPP" before "-MATH01".
    text.starts_with("BLOCK-") && text.matches('-').count() == 1
}

/// Tokenize an entire source string eagerly, the form the parser consumes.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token()? {
        tokens.push(tok);
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        position: lexer.pos,
        newline_before: true,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_let_binding() {
        assert_eq!(
            kinds("let x = 42"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier("x".into()),
                TokenKind::Assign,
                TokenKind::IntegerLiteral(42),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_float_requires_digits_both_sides() {
        assert_eq!(kinds("3.5"), vec![TokenKind::FloatLiteral(3.5), TokenKind::Eof]);
    }

    #[test]
    fn recognizes_block_id() {
        assert!(is_block_id("BLOCK-CPP-MATH01"));
        assert!(!is_block_id("BLOCK-cpp-MATH01"));
        assert!(!is_block_id("BLOCK-CPP-"));
        assert_eq!(
            kinds("use BLOCK-CPP-MATH01 as math"),
            vec![
                TokenKind::Use,
                TokenKind::BlockId("BLOCK-CPP-MATH01".into()),
                TokenKind::As,
                TokenKind::Identifier("math".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_inline_code_block() {
        let toks = kinds("<<python[x, y] return x + y >>");
        match &toks[0] {
            TokenKind::InlineCode(payload) => {
                assert_eq!(payload.language, "python");
                assert_eq!(payload.bindings, vec!["x", "y"]);
                assert_eq!(payload.body, "return x + y");
            }
            other => panic!("expected inline code, got {other:?}"),
        }
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\tb\x41""#),
            vec![TokenKind::StringLiteral("a\tbA".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_string_is_fatal() {
        assert!(tokenize("\"abc").is_err());
    }

    #[test]
    fn unterminated_inline_block_is_fatal() {
        assert!(tokenize("<<js[] 1+1").is_err());
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("let x = 1 # comment\nlet y = 2"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier("x".into()),
                TokenKind::Assign,
                TokenKind::IntegerLiteral(1),
                TokenKind::Let,
                TokenKind::Identifier("y".into()),
                TokenKind::Assign,
                TokenKind::IntegerLiteral(2),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn pipeline_after_newline_is_flagged() {
        let toks = tokenize("x\n|> f()").unwrap();
        let pipeline = toks.iter().find(|t| t.kind == TokenKind::Pipeline).unwrap();
        assert!(pipeline.newline_before);
    }
}
