//! Union classification and canonical naming, shared by every emitter.
//!
//! A union is represented one of three ways:
//!
//! 1. **Nullable** (`T | null`) → the target's nullable form of `T`
//! 2. **String enum** (`'a' | 'b'`) → a string on the native side, an enum in UI code
//! 3. **Variant** (`string | double`) → one generated union class per canonical name

use crate::collector::UnionTypeCollector;
use crate::model::{Model, PrimitiveKind, TypeRef};
use crate::naming::to_snake_case;

/// Prefix of generated union classes.
pub const UNION_CLASS_PREFIX: &str = "QJSUnion";

/// How a union is represented.
#[derive(Debug, Clone, PartialEq)]
pub enum UnionShape<'a> {
    Nullable(&'a TypeRef),
    StringEnum(Vec<&'a str>),
    Variant(Vec<&'a TypeRef>),
}

fn is_nullish(ty: &TypeRef) -> bool {
    matches!(
        ty,
        TypeRef::Primitive(PrimitiveKind::Null) | TypeRef::Primitive(PrimitiveKind::Undefined)
    )
}

/// Whether any member of the union is `null` or `undefined`.
pub fn has_null(parts: &[TypeRef]) -> bool {
    parts.iter().any(is_nullish)
}

/// Classify a union by its non-null members, in declared order.
pub fn classify(parts: &[TypeRef]) -> UnionShape<'_> {
    let non_null: Vec<&TypeRef> = parts.iter().filter(|p| !is_nullish(p)).collect();

    match non_null.as_slice() {
        [] => UnionShape::Nullable(&parts[0]),
        [single] => UnionShape::Nullable(single),
        _ => {
            let literals: Option<Vec<&str>> = non_null
                .iter()
                .map(|p| match p {
                    TypeRef::StringLiteral(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            match literals {
                Some(values) => UnionShape::StringEnum(values),
                None => UnionShape::Variant(non_null),
            }
        }
    }
}

/// Name fragment for one union member.
pub fn part_name(ty: &TypeRef, model: &Model) -> String {
    match ty {
        TypeRef::Primitive(kind) => kind.canonical_name().to_string(),
        TypeRef::StringLiteral(_) => PrimitiveKind::DomString.canonical_name().to_string(),
        TypeRef::Array(inner) => format!("Sequence{}", part_name(inner, model)),
        TypeRef::Promise(_) => "Promise".to_string(),
        TypeRef::Named(sym) | TypeRef::Extern(sym) => model.symbols.name(*sym).to_string(),
        TypeRef::Record(id) | TypeRef::Interface(id) => model.decl(*id).name.clone(),
        TypeRef::Function(_) => "Function".to_string(),
        TypeRef::Union(parts) => parts
            .iter()
            .filter(|p| !is_nullish(p))
            .map(|p| part_name(p, model))
            .collect(),
        TypeRef::Marker(_, inner) => part_name(inner, model),
    }
}

/// Canonical class name: `QJSUnion` followed by each distinct non-null member.
pub fn union_class_name(parts: &[TypeRef], model: &Model) -> String {
    let mut seen: Vec<String> = Vec::new();
    for part in parts.iter().filter(|p| !is_nullish(p)) {
        let name = part_name(part, model);
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    format!("{}{}", UNION_CLASS_PREFIX, seen.concat())
}

/// File stem for a union class: `QJSUnionDomStringDouble` → `qjs_union_dom_string_double`.
pub fn union_file_stem(class_name: &str) -> String {
    let rest = class_name
        .strip_prefix(UNION_CLASS_PREFIX)
        .unwrap_or(class_name);
    format!("qjs_union_{}", to_snake_case(rest))
}

/// Register every variant union reachable from `ty`.
pub fn collect_unions(ty: &TypeRef, model: &Model, collector: &mut UnionTypeCollector) {
    ty.walk(&mut |node| {
        if let TypeRef::Union(parts) = node {
            if let UnionShape::Variant(_) = classify(parts) {
                let name = union_class_name(parts, model);
                collector.add(name, parts.clone());
            }
        }
    });
}
