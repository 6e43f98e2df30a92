//! Syntax tree for IDL declaration files, as produced by the parser.
//!
//! Nothing here is resolved: type names are plain strings and marker
//! generics are ordinary [`IdlType::Named`] nodes. The type resolver turns
//! these into [`crate::model::TypeRef`]s.

use std::ops::Range;

/// A parsed declaration file.
#[derive(Debug, Clone, PartialEq)]
pub struct IdlFile {
    pub items: Vec<IdlItem>,
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum IdlItem {
    Interface(IdlInterface),
    TypeAlias(IdlTypeAlias),
    /// `declare const name: (params) => Ret;` or `declare function name(params): Ret;`
    Function(IdlFunction),
}

/// Structural tags that may precede a declaration or member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Leading {
    /// Joined `/** */` comment text.
    pub doc: Option<String>,
    /// Directive comments such as `ts-ignore`.
    pub directives: Vec<String>,
    /// Decorator names such as `Dictionary`.
    pub decorators: Vec<Decorator>,
}

/// A decorator applied to an interface: `@Dictionary()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decorator {
    pub name: String,
    pub span: Range<usize>,
}

/// `interface Name extends Parent { members }`
#[derive(Debug, Clone, PartialEq)]
pub struct IdlInterface {
    pub name: String,
    pub leading: Leading,
    pub extends: Vec<String>,
    pub members: Vec<IdlMember>,
    pub span: Range<usize>,
}

/// `type Name = Type;`
#[derive(Debug, Clone, PartialEq)]
pub struct IdlTypeAlias {
    pub name: String,
    pub ty: IdlType,
    pub span: Range<usize>,
}

/// A global function object.
#[derive(Debug, Clone, PartialEq)]
pub struct IdlFunction {
    pub name: String,
    pub leading: Leading,
    pub params: Vec<IdlParam>,
    pub return_type: IdlType,
    pub span: Range<usize>,
}

/// A member of an interface body.
#[derive(Debug, Clone, PartialEq)]
pub struct IdlMember {
    pub leading: Leading,
    pub kind: IdlMemberKind,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdlMemberKind {
    /// `[readonly] name[?]: Type;`
    Property {
        name: String,
        ty: IdlType,
        optional: bool,
        readonly: bool,
    },
    /// `name(params): Type;`
    Method {
        name: String,
        params: Vec<IdlParam>,
        return_type: IdlType,
        optional: bool,
    },
    /// `new(params): Type;`
    Construct {
        params: Vec<IdlParam>,
        return_type: IdlType,
    },
    /// `[key: string]: Type;`
    Index {
        key: IdlType,
        value: IdlType,
        readonly: bool,
    },
}

/// A function or method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct IdlParam {
    pub name: String,
    pub ty: IdlType,
    pub optional: bool,
    pub rest: bool,
}

/// Primitive keyword types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    String,
    Number,
    Boolean,
    Void,
    Null,
    Undefined,
    Any,
    Object,
}

/// A type expression.
#[derive(Debug, Clone, PartialEq)]
pub enum IdlType {
    Keyword(Keyword),
    /// A named type with optional type arguments: `Foo`, `Promise<T>`, `DartImpl<int64>`.
    Named {
        name: String,
        args: Vec<IdlType>,
        span: Range<usize>,
    },
    StringLiteral(String),
    NumberLiteral(String),
    Array(Box<IdlType>),
    Union(Vec<IdlType>),
    Function {
        params: Vec<IdlParam>,
        return_type: Box<IdlType>,
    },
    /// An inline object literal type, accepted but treated as an opaque object.
    ObjectLiteral,
    Parenthesized(Box<IdlType>),
}

impl IdlItem {
    pub fn name(&self) -> &str {
        match self {
            IdlItem::Interface(i) => &i.name,
            IdlItem::TypeAlias(t) => &t.name,
            IdlItem::Function(f) => &f.name,
        }
    }
}
