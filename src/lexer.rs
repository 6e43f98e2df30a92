//! Lexer for IDL declaration files.

use std::iter::Peekable;
use std::str::CharIndices;

/// Token kinds for IDL declaration files.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Identifiers and literals
    Ident(String),
    StringLiteral(String),
    NumberLiteral(String),

    // Keywords
    Declare,
    Function,
    Interface,
    Type,
    Export,
    Import,
    Const,
    Let,
    Var,
    Readonly,
    Extends,
    New,

    // Primitive type keywords
    String_,
    Number_,
    Boolean_,
    Void_,
    Null_,
    Undefined_,
    Any_,
    Object_,

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    LAngle,    // <
    RAngle,    // >
    Comma,     // ,
    Semicolon, // ;
    Colon,     // :
    Dot,       // .
    DotDotDot, // ...
    Question,  // ?
    Pipe,      // |
    Amp,       // &
    Arrow,     // =>
    Eq,        // =
    At,        // @

    // Structural tags
    /// `/** ... */` with the comment markers stripped.
    DocComment(String),
    /// `// @ts-ignore` and friends, holding the directive name without `@`.
    Directive(String),
    /// `/// <reference ... />`
    TripleSlashRef(String),
    Eof,
}

/// A token with its kind and byte range.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn new(kind: TokenKind, start: usize, end: usize) -> Self {
        Self { kind, start, end }
    }
}

/// Lexer for IDL declaration files.
pub struct Lexer<'src> {
    src: &'src str,
    chars: Peekable<CharIndices<'src>>,
    pos: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
            pos: 0,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((pos, ch)) = self.chars.next() {
            self.pos = pos + ch.len_utf8();
            Some(ch)
        } else {
            None
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Consume the rest of the line and return it (without the newline).
    fn read_line(&mut self) -> &'src str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
        &self.src[start..self.pos]
    }

    /// Consume a block comment body; the leading `/*` is already consumed.
    fn read_block_comment(&mut self) -> &'src str {
        let start = self.pos;
        let mut end = self.pos;
        loop {
            match self.advance() {
                Some('*') if self.peek() == Some('/') => {
                    end = self.pos - 1;
                    self.advance();
                    break;
                }
                None => {
                    end = self.pos;
                    break;
                }
                _ => {}
            }
        }
        &self.src[start..end]
    }

    fn read_string(&mut self, quote: char) -> String {
        let mut s = String::new();
        loop {
            match self.advance() {
                Some('\\') => {
                    if let Some(escaped) = self.advance() {
                        match escaped {
                            'n' => s.push('\n'),
                            't' => s.push('\t'),
                            'r' => s.push('\r'),
                            '\\' => s.push('\\'),
                            '"' => s.push('"'),
                            '\'' => s.push('\''),
                            _ => {
                                s.push('\\');
                                s.push(escaped);
                            }
                        }
                    }
                }
                Some(c) if c == quote => break,
                Some(c) => s.push(c),
                None => break,
            }
        }
        s
    }

    fn read_number(&mut self, first: char) -> String {
        let mut s = String::new();
        s.push(first);
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' {
                s.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        s
    }

    fn read_ident(&mut self, first: char) -> String {
        let mut s = String::new();
        s.push(first);
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                s.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        s
    }

    fn keyword_or_ident(&self, s: &str) -> TokenKind {
        match s {
            "declare" => TokenKind::Declare,
            "function" => TokenKind::Function,
            "interface" => TokenKind::Interface,
            "type" => TokenKind::Type,
            "export" => TokenKind::Export,
            "import" => TokenKind::Import,
            "const" => TokenKind::Const,
            "let" => TokenKind::Let,
            "var" => TokenKind::Var,
            "readonly" => TokenKind::Readonly,
            "extends" => TokenKind::Extends,
            "new" => TokenKind::New,
            // Primitives
            "string" => TokenKind::String_,
            "number" => TokenKind::Number_,
            "boolean" => TokenKind::Boolean_,
            "void" => TokenKind::Void_,
            "null" => TokenKind::Null_,
            "undefined" => TokenKind::Undefined_,
            "any" => TokenKind::Any_,
            "object" => TokenKind::Object_,
            _ => TokenKind::Ident(s.to_string()),
        }
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();

            let start = self.pos;

            let ch = match self.advance() {
                Some(c) => c,
                None => return Token::new(TokenKind::Eof, start, start),
            };

            let kind = match ch {
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                '<' => TokenKind::LAngle,
                '>' => TokenKind::RAngle,
                ',' => TokenKind::Comma,
                ';' => TokenKind::Semicolon,
                ':' => TokenKind::Colon,
                '?' => TokenKind::Question,
                '|' => TokenKind::Pipe,
                '&' => TokenKind::Amp,
                '@' => TokenKind::At,
                '.' => {
                    if self.peek() == Some('.') {
                        self.advance();
                        if self.peek() == Some('.') {
                            self.advance();
                            TokenKind::DotDotDot
                        } else {
                            TokenKind::Dot
                        }
                    } else {
                        TokenKind::Dot
                    }
                }
                '=' => {
                    if self.peek() == Some('>') {
                        self.advance();
                        TokenKind::Arrow
                    } else {
                        TokenKind::Eq
                    }
                }
                '/' => {
                    if self.peek() == Some('/') {
                        self.advance();
                        if self.peek() == Some('/') {
                            self.advance();
                            let line = self.read_line().trim();
                            if line.starts_with("<reference") {
                                TokenKind::TripleSlashRef(line.to_string())
                            } else {
                                continue;
                            }
                        } else {
                            let line = self.read_line().trim();
                            match line.strip_prefix("@ts-") {
                                Some(rest) => {
                                    let name = rest.split_whitespace().next().unwrap_or_default();
                                    TokenKind::Directive(format!("ts-{name}"))
                                }
                                None => continue,
                            }
                        }
                    } else if self.peek() == Some('*') {
                        self.advance();
                        let is_doc = self.peek() == Some('*');
                        let body = self.read_block_comment();
                        if is_doc {
                            TokenKind::DocComment(clean_doc_comment(body))
                        } else {
                            continue;
                        }
                    } else {
                        // Stray slash; nothing in the dialect uses division.
                        continue;
                    }
                }
                '"' | '\'' => {
                    let s = self.read_string(ch);
                    TokenKind::StringLiteral(s)
                }
                c if c.is_ascii_digit() => {
                    let n = self.read_number(c);
                    TokenKind::NumberLiteral(n)
                }
                c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                    let ident = self.read_ident(c);
                    self.keyword_or_ident(&ident)
                }
                _ => {
                    // Skip unknown characters
                    continue;
                }
            };

            return Token::new(kind, start, self.pos);
        }
    }

    /// Collect all tokens into a vector.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}

/// Strip the leading `*` gutter from every line of a doc comment body.
fn clean_doc_comment(body: &str) -> String {
    let body = body.strip_prefix('*').unwrap_or(body);
    body.lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix('*').map(str::trim_start).unwrap_or(line)
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_interface() {
        let tokens = kinds("interface Foo extends Bar { x: string; }");

        assert_eq!(tokens[0], TokenKind::Interface);
        assert_eq!(tokens[1], TokenKind::Ident("Foo".to_string()));
        assert_eq!(tokens[2], TokenKind::Extends);
        assert_eq!(tokens[3], TokenKind::Ident("Bar".to_string()));
        assert_eq!(tokens[4], TokenKind::LBrace);
        assert_eq!(tokens[6], TokenKind::Colon);
        assert_eq!(tokens[7], TokenKind::String_);
    }

    #[test]
    fn test_marker_generic() {
        let tokens = kinds("width: DartImpl<int64>;");

        assert_eq!(tokens[2], TokenKind::Ident("DartImpl".to_string()));
        assert_eq!(tokens[3], TokenKind::LAngle);
        assert_eq!(tokens[4], TokenKind::Ident("int64".to_string()));
        assert_eq!(tokens[5], TokenKind::RAngle);
    }

    #[test]
    fn test_directive_and_decorator() {
        let tokens = kinds("// @ts-ignore\n@Dictionary()\ninterface Options {}");

        assert_eq!(tokens[0], TokenKind::Directive("ts-ignore".to_string()));
        assert_eq!(tokens[1], TokenKind::At);
        assert_eq!(tokens[2], TokenKind::Ident("Dictionary".to_string()));
        assert_eq!(tokens[3], TokenKind::LParen);
        assert_eq!(tokens[4], TokenKind::RParen);
        assert_eq!(tokens[5], TokenKind::Interface);
    }

    #[test]
    fn test_plain_comments_are_skipped() {
        let tokens = kinds("// just a note\n/* block */ readonly");
        assert_eq!(tokens, vec![TokenKind::Readonly, TokenKind::Eof]);
    }

    #[test]
    fn test_doc_comment() {
        let tokens = kinds("/**\n * The element width.\n * In pixels.\n */\nwidth: double;");
        assert_eq!(
            tokens[0],
            TokenKind::DocComment("The element width.\nIn pixels.".to_string())
        );
        assert_eq!(tokens[1], TokenKind::Ident("width".to_string()));
    }

    #[test]
    fn test_arrow_function_type() {
        let tokens = kinds("(a: string) => void");

        assert_eq!(tokens[0], TokenKind::LParen);
        assert_eq!(tokens[1], TokenKind::Ident("a".to_string()));
        assert_eq!(tokens[2], TokenKind::Colon);
        assert_eq!(tokens[3], TokenKind::String_);
        assert_eq!(tokens[4], TokenKind::RParen);
        assert_eq!(tokens[5], TokenKind::Arrow);
        assert_eq!(tokens[6], TokenKind::Void_);
    }

    #[test]
    fn test_triple_slash_reference() {
        let src = "/// <reference path=\"./types.d.ts\" />\ninterface A {}";
        let tokens = kinds(src);

        assert_eq!(
            tokens[0],
            TokenKind::TripleSlashRef("<reference path=\"./types.d.ts\" />".to_string())
        );
        assert_eq!(tokens[1], TokenKind::Interface);
    }

    #[test]
    fn test_string_literals() {
        let tokens = kinds(r#""hello" 'world'"#);

        assert_eq!(tokens[0], TokenKind::StringLiteral("hello".to_string()));
        assert_eq!(tokens[1], TokenKind::StringLiteral("world".to_string()));
    }

    #[test]
    fn test_spans() {
        let tokens = Lexer::new("  foo").tokenize();
        assert_eq!(tokens[0].start, 2);
        assert_eq!(tokens[0].end, 5);
    }
}
