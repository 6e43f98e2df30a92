//! Error types for the generator.

use std::ops::Range;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while analyzing a single source unit. All of them abort the batch.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Source text does not follow the declaration dialect.
    #[error("{}: syntax error: {message}", path.display())]
    Syntax {
        path: PathBuf,
        message: String,
        span: Range<usize>,
    },

    /// A decorator outside the closed tag vocabulary.
    #[error("{}: unknown decorator `@{name}` on `{symbol}`", path.display())]
    UnknownDecorator {
        path: PathBuf,
        symbol: String,
        name: String,
        span: Range<usize>,
    },

    /// A marker generic with the wrong arity, argument kind or placement.
    #[error("{}: malformed `{marker}` on `{symbol}`: {reason}", path.display())]
    MalformedMarker {
        path: PathBuf,
        symbol: String,
        marker: String,
        reason: String,
        span: Range<usize>,
    },

    /// A type expression the dialect does not support.
    #[error("{}: unsupported type in `{symbol}`: {reason}", path.display())]
    UnsupportedType {
        path: PathBuf,
        symbol: String,
        reason: String,
        span: Range<usize>,
    },

    /// More than one `extends` parent.
    #[error("{}: `{symbol}` extends more than one interface", path.display())]
    MultipleParents {
        path: PathBuf,
        symbol: String,
        span: Range<usize>,
    },

    /// The same declaration name in two places of one batch.
    #[error("{}: `{symbol}` is already declared in {}", path.display(), previous.display())]
    DuplicateDeclaration {
        path: PathBuf,
        symbol: String,
        previous: PathBuf,
        span: Range<usize>,
    },

    /// Two members renamed to the same identifier, or a rename onto a declared member.
    #[error("{}: rename target `{target}` in `{symbol}` is not unique", path.display())]
    RenameCollision {
        path: PathBuf,
        symbol: String,
        target: String,
        span: Range<usize>,
    },
}

impl AnalysisError {
    pub fn path(&self) -> &PathBuf {
        match self {
            AnalysisError::Syntax { path, .. }
            | AnalysisError::UnknownDecorator { path, .. }
            | AnalysisError::MalformedMarker { path, .. }
            | AnalysisError::UnsupportedType { path, .. }
            | AnalysisError::MultipleParents { path, .. }
            | AnalysisError::DuplicateDeclaration { path, .. }
            | AnalysisError::RenameCollision { path, .. } => path,
        }
    }

    pub fn span(&self) -> Range<usize> {
        match self {
            AnalysisError::Syntax { span, .. }
            | AnalysisError::UnknownDecorator { span, .. }
            | AnalysisError::MalformedMarker { span, .. }
            | AnalysisError::UnsupportedType { span, .. }
            | AnalysisError::MultipleParents { span, .. }
            | AnalysisError::DuplicateDeclaration { span, .. }
            | AnalysisError::RenameCollision { span, .. } => span.clone(),
        }
    }
}

/// Errors raised while linking names in pass 2.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// `extends` names an interface absent from the batch.
    #[error("{}: `{symbol}` extends undeclared interface `{parent}`", path.display())]
    UndeclaredParent {
        path: PathBuf,
        symbol: String,
        parent: String,
        span: Range<usize>,
    },

    /// The parent chain loops back on itself.
    #[error("{}: inheritance cycle through `{symbol}`", path.display())]
    InheritanceCycle {
        path: PathBuf,
        symbol: String,
        span: Range<usize>,
    },

    /// A type alias expands into itself.
    #[error("type alias `{name}` refers to itself")]
    AliasCycle { name: String },
}

impl ResolveError {
    pub fn location(&self) -> Option<(&PathBuf, Range<usize>)> {
        match self {
            ResolveError::UndeclaredParent { path, span, .. }
            | ResolveError::InheritanceCycle { path, span, .. } => Some((path, span.clone())),
            ResolveError::AliasCycle { .. } => None,
        }
    }
}

/// Errors scoped to one generation unit: a component family or a declaration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UnitError {
    #[error("{}: `{symbol}` references undeclared type `{name}`", path.display())]
    UnresolvedReference {
        path: PathBuf,
        symbol: String,
        name: String,
    },

    /// None of the family interfaces exist for a requested stem.
    #[error("component `{stem}` has no {stem}Properties, {stem}Methods or {stem}Events interface")]
    AmbiguousComponent { stem: String },

    /// The same member appears as a property and as a method across one family.
    #[error("{}: `{stem}.{member}` is declared both as {first} and as {second}", path.display())]
    DuplicateMember {
        path: PathBuf,
        stem: String,
        member: String,
        first: &'static str,
        second: &'static str,
    },

    /// A construct inside the unit the target cannot express.
    #[error("{target} cannot express `{symbol}`: {reason}")]
    Unsupported {
        target: &'static str,
        symbol: String,
        reason: String,
    },
}

/// A unit that produced no output, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFailure {
    /// Component stem or declaration name.
    pub unit: String,
    pub error: UnitError,
}

impl std::fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.unit, self.error)
    }
}

/// Errors raised while rendering templates.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("template render error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("invalid template: {0}")]
    InvalidTemplate(#[from] handlebars::TemplateError),

    /// A construct the target cannot express.
    #[error("{target} cannot express `{symbol}`: {reason}")]
    Unsupported {
        target: &'static str,
        symbol: String,
        reason: String,
    },
}

impl CodegenError {
    /// Narrow an error to the unit that raised it. Template errors stay fatal.
    pub fn into_unit_error(self) -> Result<UnitError, CodegenError> {
        match self {
            CodegenError::Unsupported {
                target,
                symbol,
                reason,
            } => Ok(UnitError::Unsupported {
                target,
                symbol,
                reason,
            }),
            other => Err(other),
        }
    }
}

/// Errors loading `idl-bindgen.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from [`crate::codegen::RecordCodec`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("`{0}` is not a record declaration")]
    UnknownRecord(String),

    #[error("`{record}` expects an object, found {found}")]
    NotAnObject { record: String, found: &'static str },
}

/// Top-level error of a generation run.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GenerateError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GenerateError::Io {
            path: path.into(),
            source,
        }
    }
}
