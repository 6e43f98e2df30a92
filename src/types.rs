//! Type resolver: syntax-level type expressions to [`TypeRef`]s.
//!
//! Named references are interned but not looked up here; linking them to
//! declarations is the resolver's job once the whole batch is known.

use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;

use crate::error::AnalysisError;
use crate::model::{FunctionSig, Marker, MarkerKind, Param, PrimitiveKind, SymbolTable, TypeRef};
use crate::naming::is_identifier;
use crate::syntax::{IdlParam, IdlType, Keyword};

/// Resolves type expressions of one source unit.
pub struct TypeResolver<'a> {
    symbols: &'a mut SymbolTable,
    path: &'a Path,
}

impl<'a> TypeResolver<'a> {
    pub fn new(symbols: &'a mut SymbolTable, path: &'a Path) -> Self {
        Self { symbols, path }
    }

    /// Resolve the type of a property or the return type of a method.
    ///
    /// A chain of marker generics may wrap the outside of the type, each
    /// marker at most once.
    pub fn resolve_member_type(
        &mut self,
        ty: &IdlType,
        owner: &str,
        span: &Range<usize>,
    ) -> Result<TypeRef, AnalysisError> {
        let mut seen = HashSet::new();
        self.resolve_marker_chain(ty, owner, span, &mut seen)
    }

    fn resolve_marker_chain(
        &mut self,
        ty: &IdlType,
        owner: &str,
        span: &Range<usize>,
        seen: &mut HashSet<MarkerKind>,
    ) -> Result<TypeRef, AnalysisError> {
        let (name, args, marker_span) = match ty {
            IdlType::Parenthesized(inner) => {
                return self.resolve_marker_chain(inner, owner, span, seen)
            }
            IdlType::Named { name, args, span } => (name, args, span),
            other => return self.resolve(other, owner, span),
        };

        let Some(kind) = Marker::from_generic_name(name) else {
            return self.resolve(ty, owner, span);
        };

        let path = self.path;
        let malformed = |reason: String| AnalysisError::MalformedMarker {
            path: path.to_path_buf(),
            symbol: owner.to_string(),
            marker: name.clone(),
            reason,
            span: marker_span.clone(),
        };

        if args.len() != kind.arity() {
            return Err(malformed(format!(
                "expected {} type argument{}, found {}",
                kind.arity(),
                if kind.arity() == 1 { "" } else { "s" },
                args.len()
            )));
        }
        if !seen.insert(kind) {
            return Err(malformed("marker applied twice".to_string()));
        }

        let marker = match kind {
            MarkerKind::HostImplemented => Marker::HostImplemented,
            MarkerKind::StaticFactory => Marker::StaticFactory,
            MarkerKind::StaticMember => Marker::StaticMember,
            MarkerKind::DualAsync => Marker::DualAsync,
            MarkerKind::AsyncOnly => Marker::AsyncOnly,
            MarkerKind::LayoutDependent => Marker::LayoutDependent,
            MarkerKind::NewObject => Marker::NewObject,
            MarkerKind::Rename => match &args[1] {
                IdlType::StringLiteral(target) if is_identifier(target) => {
                    Marker::Rename(target.clone())
                }
                IdlType::StringLiteral(target) => {
                    return Err(malformed(format!("`{target}` is not a valid identifier")))
                }
                _ => {
                    return Err(malformed(
                        "second argument must be a string literal".to_string(),
                    ))
                }
            },
        };

        if seen.contains(&MarkerKind::DualAsync) && seen.contains(&MarkerKind::AsyncOnly) {
            return Err(malformed(
                "SupportAsync and SupportAsyncManual are exclusive".to_string(),
            ));
        }

        let inner = self.resolve_marker_chain(&args[0], owner, span, seen)?;
        Ok(TypeRef::Marker(marker, Box::new(inner)))
    }

    /// Resolve a type in a position where markers are not allowed.
    pub fn resolve(
        &mut self,
        ty: &IdlType,
        owner: &str,
        span: &Range<usize>,
    ) -> Result<TypeRef, AnalysisError> {
        let path = self.path;
        let unsupported = |reason: String| AnalysisError::UnsupportedType {
            path: path.to_path_buf(),
            symbol: owner.to_string(),
            reason,
            span: span.clone(),
        };

        Ok(match ty {
            IdlType::Keyword(kw) => TypeRef::Primitive(match kw {
                Keyword::String => PrimitiveKind::DomString,
                Keyword::Number => PrimitiveKind::Double,
                Keyword::Boolean => PrimitiveKind::Boolean,
                Keyword::Void => PrimitiveKind::Void,
                Keyword::Null => PrimitiveKind::Null,
                Keyword::Undefined => PrimitiveKind::Undefined,
                Keyword::Any => PrimitiveKind::Any,
                Keyword::Object => PrimitiveKind::Object,
            }),
            IdlType::StringLiteral(s) => TypeRef::StringLiteral(s.clone()),
            IdlType::NumberLiteral(n) => {
                return Err(unsupported(format!("numeric literal type `{n}`")))
            }
            IdlType::ObjectLiteral => TypeRef::Primitive(PrimitiveKind::Object),
            IdlType::Parenthesized(inner) => self.resolve(inner, owner, span)?,
            IdlType::Array(inner) => TypeRef::Array(Box::new(self.resolve(inner, owner, span)?)),
            IdlType::Union(parts) => {
                let mut resolved = Vec::with_capacity(parts.len());
                for part in parts {
                    let part = self.resolve(part, owner, span)?;
                    // Nested unions flatten: `(A | B) | C`
                    match part {
                        TypeRef::Union(inner) => resolved.extend(inner),
                        other => resolved.push(other),
                    }
                }
                TypeRef::Union(resolved)
            }
            IdlType::Function {
                params,
                return_type,
            } => TypeRef::Function(self.resolve_signature(params, return_type, owner, span)?),
            IdlType::Named {
                name,
                args,
                span: name_span,
            } => self.resolve_named(name, args, owner, name_span)?,
        })
    }

    fn resolve_named(
        &mut self,
        name: &str,
        args: &[IdlType],
        owner: &str,
        span: &Range<usize>,
    ) -> Result<TypeRef, AnalysisError> {
        if Marker::from_generic_name(name).is_some() {
            return Err(AnalysisError::MalformedMarker {
                path: self.path.to_path_buf(),
                symbol: owner.to_string(),
                marker: name.to_string(),
                reason: "markers may only wrap a whole member type".to_string(),
                span: span.clone(),
            });
        }

        let primitive = match name {
            "int64" => Some(PrimitiveKind::Int64),
            "int32" => Some(PrimitiveKind::Int32),
            "double" => Some(PrimitiveKind::Double),
            "Function" => Some(PrimitiveKind::Function),
            "LegacyNullToEmptyString" => Some(PrimitiveKind::LegacyDomString),
            _ => None,
        };

        if name == "Promise" {
            let inner = match args {
                [] => TypeRef::Primitive(PrimitiveKind::Any),
                [arg] => self.resolve(arg, owner, span)?,
                _ => {
                    return Err(AnalysisError::UnsupportedType {
                        path: self.path.to_path_buf(),
                        symbol: owner.to_string(),
                        reason: "Promise takes one type argument".to_string(),
                        span: span.clone(),
                    })
                }
            };
            return Ok(TypeRef::Promise(Box::new(inner)));
        }

        if !args.is_empty() {
            return Err(AnalysisError::UnsupportedType {
                path: self.path.to_path_buf(),
                symbol: owner.to_string(),
                reason: format!("generic type `{name}<...>` is not supported"),
                span: span.clone(),
            });
        }

        Ok(match primitive {
            Some(kind) => TypeRef::Primitive(kind),
            None => TypeRef::Named(self.symbols.intern(name)),
        })
    }

    pub fn resolve_params(
        &mut self,
        params: &[IdlParam],
        owner: &str,
        span: &Range<usize>,
    ) -> Result<Vec<Param>, AnalysisError> {
        params
            .iter()
            .map(|p| {
                Ok(Param {
                    name: p.name.clone(),
                    ty: self.resolve(&p.ty, owner, span)?,
                    optional: p.optional,
                    variadic: p.rest,
                })
            })
            .collect()
    }

    fn resolve_signature(
        &mut self,
        params: &[IdlParam],
        return_type: &IdlType,
        owner: &str,
        span: &Range<usize>,
    ) -> Result<FunctionSig, AnalysisError> {
        Ok(FunctionSig {
            params: self.resolve_params(params, owner, span)?,
            ret: Box::new(self.resolve(return_type, owner, span)?),
        })
    }
}
