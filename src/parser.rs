//! Recursive descent parser for IDL declaration files.

use crate::lexer::{Lexer, Token, TokenKind};
use crate::syntax::*;

/// A parse error at a byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub pos: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error at {}: {}", self.pos, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse declaration source text into an [`IdlFile`].
pub fn parse(src: &str) -> ParseResult<IdlFile> {
    let mut parser = Parser::new(src);
    parser.parse_file()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Self {
        Self {
            tokens: Lexer::new(src).tokenize(),
            pos: 0,
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_nth(&self, n: usize) -> &TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    /// End offset of the most recently consumed token.
    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].end
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(ParseError {
            message: message.into(),
            pos: self.current().start,
        })
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            self.error(format!("expected {:?}, found {:?}", kind, self.peek()))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => self.error(format!("expected identifier, found {:?}", self.peek())),
        }
    }

    /// Keywords are valid property names.
    fn keyword_name(kind: &TokenKind) -> Option<&'static str> {
        Some(match kind {
            TokenKind::Declare => "declare",
            TokenKind::Function => "function",
            TokenKind::Interface => "interface",
            TokenKind::Type => "type",
            TokenKind::Export => "export",
            TokenKind::Import => "import",
            TokenKind::Const => "const",
            TokenKind::Let => "let",
            TokenKind::Var => "var",
            TokenKind::Readonly => "readonly",
            TokenKind::Extends => "extends",
            TokenKind::New => "new",
            TokenKind::String_ => "string",
            TokenKind::Number_ => "number",
            TokenKind::Boolean_ => "boolean",
            TokenKind::Void_ => "void",
            TokenKind::Null_ => "null",
            TokenKind::Undefined_ => "undefined",
            TokenKind::Any_ => "any",
            TokenKind::Object_ => "object",
            _ => return None,
        })
    }

    fn expect_property_name(&mut self) -> ParseResult<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(s)
            }
            other => match Self::keyword_name(&other) {
                Some(name) => {
                    self.advance();
                    Ok(name.to_string())
                }
                None => self.error(format!("expected property name, found {:?}", other)),
            },
        }
    }

    /// `readonly name: T` vs a property literally named `readonly`.
    fn is_modifier_not_property(&self) -> bool {
        !matches!(
            self.peek_nth(1),
            TokenKind::Colon | TokenKind::Question | TokenKind::LParen | TokenKind::LAngle
        )
    }

    fn parse_file(&mut self) -> ParseResult<IdlFile> {
        let mut items = Vec::new();

        while !self.check(&TokenKind::Eof) {
            let leading = self.parse_leading()?;
            if let Some(item) = self.parse_item(leading)? {
                items.push(item);
            }
        }

        Ok(IdlFile { items })
    }

    /// Collect doc comments, directives and decorators in front of a declaration.
    fn parse_leading(&mut self) -> ParseResult<Leading> {
        let mut leading = Leading::default();

        loop {
            match self.peek().clone() {
                TokenKind::DocComment(text) => {
                    self.advance();
                    leading.doc = Some(text);
                }
                TokenKind::Directive(name) => {
                    self.advance();
                    leading.directives.push(name);
                }
                TokenKind::TripleSlashRef(_) => {
                    self.advance();
                }
                TokenKind::At => {
                    let start = self.advance().start;
                    let name = self.expect_ident()?;
                    if self.check(&TokenKind::LParen) {
                        self.skip_balanced(&TokenKind::LParen, &TokenKind::RParen)?;
                    }
                    leading.decorators.push(Decorator {
                        name,
                        span: start..self.prev_end(),
                    });
                }
                _ => break,
            }
        }

        Ok(leading)
    }

    fn parse_item(&mut self, leading: Leading) -> ParseResult<Option<IdlItem>> {
        let start = self.current().start;
        while matches!(self.peek(), TokenKind::Export | TokenKind::Declare) {
            self.advance();
        }

        if !leading.decorators.is_empty() && !self.check(&TokenKind::Interface) {
            return self.error("decorators are only allowed on interfaces");
        }

        match self.peek() {
            TokenKind::Interface => {
                let iface = self.parse_interface(leading, start)?;
                Ok(Some(IdlItem::Interface(iface)))
            }
            TokenKind::Type => {
                let alias = self.parse_type_alias(start)?;
                Ok(Some(IdlItem::TypeAlias(alias)))
            }
            TokenKind::Function => {
                let func = self.parse_function(leading, start)?;
                Ok(Some(IdlItem::Function(func)))
            }
            TokenKind::Const | TokenKind::Let | TokenKind::Var => self.parse_variable(leading, start),
            TokenKind::Import => {
                self.skip_until_semicolon();
                Ok(None)
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(None)
            }
            TokenKind::Eof => Ok(None),
            other => self.error(format!("unexpected {:?} at top level", other)),
        }
    }

    fn skip_until_semicolon(&mut self) {
        while !self.check(&TokenKind::Semicolon) && !self.check(&TokenKind::Eof) {
            self.advance();
        }
        self.matches(&TokenKind::Semicolon);
    }

    /// Skip a bracketed region, including nested pairs of the same kind.
    fn skip_balanced(&mut self, open: &TokenKind, close: &TokenKind) -> ParseResult<()> {
        self.expect(open)?;
        let mut depth = 1usize;
        while depth > 0 {
            if self.check(&TokenKind::Eof) {
                return self.error(format!("unterminated {:?}", open));
            }
            if self.check(open) {
                depth += 1;
            } else if self.check(close) {
                depth -= 1;
            }
            self.advance();
        }
        Ok(())
    }

    fn parse_interface(&mut self, leading: Leading, start: usize) -> ParseResult<IdlInterface> {
        self.expect(&TokenKind::Interface)?;
        let name = self.expect_ident()?;

        if self.check(&TokenKind::LAngle) {
            return self.error(format!("interface {name} cannot declare type parameters"));
        }

        let mut extends = Vec::new();
        if self.matches(&TokenKind::Extends) {
            loop {
                extends.push(self.expect_ident()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(&TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            members.push(self.parse_member()?);
        }
        self.expect(&TokenKind::RBrace)?;

        Ok(IdlInterface {
            name,
            leading,
            extends,
            members,
            span: start..self.prev_end(),
        })
    }

    fn parse_member(&mut self) -> ParseResult<IdlMember> {
        let leading = self.parse_leading()?;
        if !leading.decorators.is_empty() {
            return self.error("decorators are not allowed on members");
        }
        let start = self.current().start;

        let readonly = if self.check(&TokenKind::Readonly) && self.is_modifier_not_property() {
            self.advance();
            true
        } else {
            false
        };

        let kind = if self.check(&TokenKind::LBracket) {
            self.advance();
            self.expect_ident()?;
            self.expect(&TokenKind::Colon)?;
            let key = self.parse_type()?;
            self.expect(&TokenKind::RBracket)?;
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_type()?;
            IdlMemberKind::Index { key, value, readonly }
        } else if self.check(&TokenKind::New) && self.peek_nth(1) == &TokenKind::LParen {
            self.advance();
            let params = self.parse_params()?;
            let return_type = self.parse_return_type()?;
            IdlMemberKind::Construct {
                params,
                return_type,
            }
        } else {
            let name = self.expect_property_name()?;
            let optional = self.matches(&TokenKind::Question);

            if self.check(&TokenKind::LParen) {
                let params = self.parse_params()?;
                let return_type = self.parse_return_type()?;
                IdlMemberKind::Method {
                    name,
                    params,
                    return_type,
                    optional,
                }
            } else {
                self.expect(&TokenKind::Colon)?;
                let ty = self.parse_type()?;
                IdlMemberKind::Property {
                    name,
                    ty,
                    optional,
                    readonly,
                }
            }
        };

        let end = self.prev_end();
        if !self.matches(&TokenKind::Semicolon) {
            self.matches(&TokenKind::Comma);
        }

        Ok(IdlMember {
            leading,
            kind,
            span: start..end,
        })
    }

    /// `: Type`, defaulting to `void` when absent.
    fn parse_return_type(&mut self) -> ParseResult<IdlType> {
        if self.matches(&TokenKind::Colon) {
            self.parse_type()
        } else {
            Ok(IdlType::Keyword(Keyword::Void))
        }
    }

    fn parse_type_alias(&mut self, start: usize) -> ParseResult<IdlTypeAlias> {
        self.expect(&TokenKind::Type)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::Eq)?;
        let ty = self.parse_type()?;
        let end = self.prev_end();
        self.matches(&TokenKind::Semicolon);

        Ok(IdlTypeAlias {
            name,
            ty,
            span: start..end,
        })
    }

    fn parse_function(&mut self, leading: Leading, start: usize) -> ParseResult<IdlFunction> {
        self.expect(&TokenKind::Function)?;
        let name = self.expect_ident()?;
        let params = self.parse_params()?;
        let return_type = self.parse_return_type()?;
        let end = self.prev_end();
        self.matches(&TokenKind::Semicolon);

        Ok(IdlFunction {
            name,
            leading,
            params,
            return_type,
            span: start..end,
        })
    }

    /// `declare const name: Type;` is only meaningful for function types;
    /// plain value declarations carry no binding surface and are dropped.
    fn parse_variable(&mut self, leading: Leading, start: usize) -> ParseResult<Option<IdlItem>> {
        self.advance();
        let name = self.expect_property_name()?;
        self.expect(&TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let end = self.prev_end();
        self.matches(&TokenKind::Semicolon);

        match ty {
            IdlType::Function {
                params,
                return_type,
            } => Ok(Some(IdlItem::Function(IdlFunction {
                name,
                leading,
                params,
                return_type: *return_type,
                span: start..end,
            }))),
            _ => Ok(None),
        }
    }

    fn parse_params(&mut self) -> ParseResult<Vec<IdlParam>> {
        self.expect(&TokenKind::LParen)?;

        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.check(&TokenKind::Eof) {
            let rest = self.matches(&TokenKind::DotDotDot);
            let name = self.expect_property_name()?;
            let optional = self.matches(&TokenKind::Question);
            let ty = if self.matches(&TokenKind::Colon) {
                self.parse_type()?
            } else {
                IdlType::Keyword(Keyword::Any)
            };

            params.push(IdlParam {
                name,
                ty,
                optional,
                rest,
            });

            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    pub(crate) fn parse_type(&mut self) -> ParseResult<IdlType> {
        // Leading pipe is legal: `type A = | 'x' | 'y'`
        self.matches(&TokenKind::Pipe);

        let mut types = vec![self.parse_postfix_type()?];
        while self.matches(&TokenKind::Pipe) {
            types.push(self.parse_postfix_type()?);
        }

        if self.check(&TokenKind::Amp) {
            return self.error("intersection types are not supported");
        }

        if types.len() == 1 {
            Ok(types.remove(0))
        } else {
            Ok(IdlType::Union(types))
        }
    }

    fn parse_postfix_type(&mut self) -> ParseResult<IdlType> {
        let mut ty = self.parse_primary_type()?;

        while self.check(&TokenKind::LBracket) && self.peek_nth(1) == &TokenKind::RBracket {
            self.advance();
            self.advance();
            ty = IdlType::Array(Box::new(ty));
        }

        Ok(ty)
    }

    fn parse_primary_type(&mut self) -> ParseResult<IdlType> {
        let keyword = match self.peek() {
            TokenKind::String_ => Some(Keyword::String),
            TokenKind::Number_ => Some(Keyword::Number),
            TokenKind::Boolean_ => Some(Keyword::Boolean),
            TokenKind::Void_ => Some(Keyword::Void),
            TokenKind::Null_ => Some(Keyword::Null),
            TokenKind::Undefined_ => Some(Keyword::Undefined),
            TokenKind::Any_ => Some(Keyword::Any),
            TokenKind::Object_ => Some(Keyword::Object),
            _ => None,
        };
        if let Some(keyword) = keyword {
            self.advance();
            return Ok(IdlType::Keyword(keyword));
        }

        match self.peek().clone() {
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(IdlType::StringLiteral(s))
            }
            TokenKind::NumberLiteral(n) => {
                self.advance();
                Ok(IdlType::NumberLiteral(n))
            }
            TokenKind::LParen => self.parse_paren_or_function_type(),
            TokenKind::LBrace => {
                self.skip_balanced(&TokenKind::LBrace, &TokenKind::RBrace)?;
                Ok(IdlType::ObjectLiteral)
            }
            TokenKind::Ident(name) => {
                let start = self.advance().start;
                let args = if self.check(&TokenKind::LAngle) {
                    self.parse_type_args()?
                } else {
                    Vec::new()
                };
                Ok(IdlType::Named {
                    name,
                    args,
                    span: start..self.prev_end(),
                })
            }
            other => self.error(format!("unexpected token in type position: {:?}", other)),
        }
    }

    fn parse_type_args(&mut self) -> ParseResult<Vec<IdlType>> {
        self.expect(&TokenKind::LAngle)?;
        let mut args = Vec::new();

        loop {
            args.push(self.parse_type()?);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(&TokenKind::RAngle)?;
        Ok(args)
    }

    fn parse_paren_or_function_type(&mut self) -> ParseResult<IdlType> {
        let start_pos = self.pos;
        self.expect(&TokenKind::LParen)?;

        let is_function = match self.peek() {
            TokenKind::RParen | TokenKind::DotDotDot => true,
            TokenKind::Ident(_) => {
                matches!(self.peek_nth(1), TokenKind::Colon | TokenKind::Question)
            }
            _ => false,
        };

        if is_function {
            self.pos = start_pos;
            let params = self.parse_params()?;
            self.expect(&TokenKind::Arrow)?;
            let return_type = self.parse_type()?;
            return Ok(IdlType::Function {
                params,
                return_type: Box::new(return_type),
            });
        }

        let inner = self.parse_type()?;
        self.expect(&TokenKind::RParen)?;
        Ok(IdlType::Parenthesized(Box::new(inner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_interface(src: &str) -> IdlInterface {
        let file = parse(src).unwrap();
        match file.items.into_iter().next() {
            Some(IdlItem::Interface(i)) => i,
            other => panic!("expected interface, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_interface() {
        let iface = first_interface(
            r#"
            interface Person {
                name: string;
                age?: number;
                greet(msg: string): void;
            }
        "#,
        );

        assert_eq!(iface.name, "Person");
        assert_eq!(iface.members.len(), 3);
        assert!(matches!(
            &iface.members[1].kind,
            IdlMemberKind::Property { optional: true, .. }
        ));
        assert!(matches!(&iface.members[2].kind, IdlMemberKind::Method { .. }));
    }

    #[test]
    fn test_parse_extends() {
        let iface = first_interface("interface Canvas extends Element { new(): void; }");
        assert_eq!(iface.extends, vec!["Element".to_string()]);
        assert!(matches!(
            &iface.members[0].kind,
            IdlMemberKind::Construct { .. }
        ));
    }

    #[test]
    fn test_parse_dictionary_decorator() {
        let iface = first_interface(
            r#"
            // @ts-ignore
            @Dictionary()
            export interface ScrollOptions {
                top?: double;
            }
        "#,
        );

        assert_eq!(iface.leading.directives, vec!["ts-ignore".to_string()]);
        assert_eq!(iface.leading.decorators.len(), 1);
        assert_eq!(iface.leading.decorators[0].name, "Dictionary");
    }

    #[test]
    fn test_parse_readonly() {
        let iface = first_interface("interface A { readonly width: int64; readonly: boolean; }");

        assert!(matches!(
            &iface.members[0].kind,
            IdlMemberKind::Property { readonly: true, name, .. } if name == "width"
        ));
        assert!(matches!(
            &iface.members[1].kind,
            IdlMemberKind::Property { readonly: false, name, .. } if name == "readonly"
        ));
    }

    #[test]
    fn test_parse_marker_generics() {
        let iface = first_interface("interface A { remove(): ImplementedAs<void, 'removeNode'>; }");
        match &iface.members[0].kind {
            IdlMemberKind::Method { return_type, .. } => match return_type {
                IdlType::Named { name, args, .. } => {
                    assert_eq!(name, "ImplementedAs");
                    assert_eq!(args.len(), 2);
                    assert_eq!(args[1], IdlType::StringLiteral("removeNode".to_string()));
                }
                other => panic!("expected named type, got {:?}", other),
            },
            other => panic!("expected method, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_union_and_array() {
        let file = parse("type Value = string | double[] | null;").unwrap();
        match &file.items[0] {
            IdlItem::TypeAlias(t) => match &t.ty {
                IdlType::Union(types) => {
                    assert_eq!(types.len(), 3);
                    assert!(matches!(types[1], IdlType::Array(_)));
                }
                other => panic!("expected union, got {:?}", other),
            },
            other => panic!("expected alias, got {:?}", other),
        }
    }

    #[test]
    fn test_function_typed_property() {
        let iface = first_interface("interface A { onload: (event: Event) => void; }");
        match &iface.members[0].kind {
            IdlMemberKind::Property { ty, .. } => {
                assert!(matches!(ty, IdlType::Function { params, .. } if params.len() == 1));
            }
            other => panic!("expected property, got {:?}", other),
        }
    }

    #[test]
    fn test_declare_const_function() {
        let file = parse("declare const requestAnimationFrame: (callback: Function) => double;").unwrap();
        match &file.items[0] {
            IdlItem::Function(f) => {
                assert_eq!(f.name, "requestAnimationFrame");
                assert_eq!(f.params.len(), 1);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_declare_const_value_is_dropped() {
        let file = parse("declare const version: string;").unwrap();
        assert!(file.items.is_empty());
    }

    #[test]
    fn test_intersection_is_rejected() {
        let err = parse("type A = B & C;").unwrap_err();
        assert!(err.message.contains("intersection"));
    }

    #[test]
    fn test_decorator_on_alias_is_rejected() {
        let err = parse("@Dictionary() type A = string;").unwrap_err();
        assert!(err.message.contains("decorators"));
    }

    #[test]
    fn test_index_signature() {
        let iface = first_interface("interface Storage { readonly [key: string]: string; }");
        assert!(matches!(
            &iface.members[0].kind,
            IdlMemberKind::Index { readonly: true, .. }
        ));
    }

    #[test]
    fn test_member_doc_comment() {
        let iface = first_interface("interface A {\n/** Width in pixels. */\nwidth: double;\n}");
        assert_eq!(iface.members[0].leading.doc.as_deref(), Some("Width in pixels."));
    }
}
