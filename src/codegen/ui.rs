//! UI-framework emitter: one abstract Dart class per component family.

use serde::Serialize;
use tracing::{debug, warn};

use super::{
    doc_lines, sort_files, source_name, EmitContext, Emitter, GeneratedFile, Header, Rendered,
    Target, TemplateEngine,
};
use crate::component::Component;
use crate::error::{CodegenError, UnitFailure};
use crate::model::{Member, MemberKind, Model, PrimitiveKind, TypeRef};
use crate::naming::{escape_dart, to_camel_case, to_pascal_case, to_snake_case};
use crate::unions::{classify, has_null, UnionShape};

const TARGET: &str = "ui";

/// Renders `<Stem>Bindings` classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct UiEmitter;

impl Emitter for UiEmitter {
    fn render(
        &self,
        ctx: &EmitContext<'_>,
        engine: &TemplateEngine<'_>,
    ) -> Result<Rendered, CodegenError> {
        let mut out = Rendered::default();
        for component in ctx.components {
            let view = match ComponentView::new(ctx.model, component) {
                Ok(view) => view,
                Err(err) => {
                    let error = err.into_unit_error()?;
                    warn!(component = %component.stem(), %error, "skipping component");
                    out.failures.push(UnitFailure {
                        unit: component.stem().to_string(),
                        error,
                    });
                    continue;
                }
            };
            out.files.push(GeneratedFile::new(
                format!("{}_bindings_generated.dart", to_snake_case(component.stem())),
                engine.render("ui_bindings", &view)?,
            ));
            debug!(component = %component.stem(), "rendered ui bindings");
        }
        sort_files(&mut out.files);
        Ok(out)
    }
}

/// Dart scalar categories that can round-trip through an HTML attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    Bool,
    Int,
    Double,
    String,
}

fn scalar(ty: &TypeRef) -> Option<Scalar> {
    match ty {
        TypeRef::Primitive(PrimitiveKind::Boolean) => Some(Scalar::Bool),
        TypeRef::Primitive(PrimitiveKind::Int32 | PrimitiveKind::Int64) => Some(Scalar::Int),
        TypeRef::Primitive(PrimitiveKind::Double) => Some(Scalar::Double),
        TypeRef::Primitive(kind) if kind.is_string() => Some(Scalar::String),
        TypeRef::StringLiteral(_) => Some(Scalar::String),
        TypeRef::Union(parts) => match classify(parts) {
            UnionShape::Nullable(inner) => scalar(inner),
            _ => None,
        },
        _ => None,
    }
}

/// Dart spelling of a type, without nullability.
pub fn dart_type(ty: &TypeRef, model: &Model) -> String {
    match ty {
        TypeRef::Primitive(kind) => match kind {
            PrimitiveKind::DomString | PrimitiveKind::LegacyDomString => "String",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Int32 | PrimitiveKind::Int64 => "int",
            PrimitiveKind::Boolean => "bool",
            PrimitiveKind::Void => "void",
            PrimitiveKind::Function => "Function",
            PrimitiveKind::Any
            | PrimitiveKind::Object
            | PrimitiveKind::Null
            | PrimitiveKind::Undefined => "dynamic",
        }
        .to_string(),
        TypeRef::StringLiteral(_) => "String".to_string(),
        TypeRef::Array(inner) => format!("List<{}>", dart_type(inner, model)),
        TypeRef::Union(parts) => match classify(parts) {
            UnionShape::Nullable(inner) => dart_type(inner, model),
            // Complex unions travel as strings.
            UnionShape::StringEnum(_) | UnionShape::Variant(_) => "String".to_string(),
        },
        TypeRef::Promise(inner) => format!("Future<{}>", dart_type(inner, model)),
        TypeRef::Record(id) | TypeRef::Interface(id) => model.decl(*id).name.clone(),
        TypeRef::Named(sym) | TypeRef::Extern(sym) => model.symbols.name(*sym).to_string(),
        TypeRef::Function(_) => "Function".to_string(),
        TypeRef::Marker(_, inner) => dart_type(inner, model),
    }
}

/// Whether a property is nullable in Dart.
fn is_nullable(member: &Member) -> bool {
    let ty = member.value_type();
    let explicit_null = matches!(ty, TypeRef::Union(parts) if has_null(parts));
    match scalar(ty) {
        Some(Scalar::Bool) => explicit_null,
        _ if matches!(ty, TypeRef::Primitive(PrimitiveKind::Any)) => false,
        _ => explicit_null || matches!(member.kind, MemberKind::Property { optional: true, .. }),
    }
}

fn dart_ident(name: &str) -> String {
    escape_dart(&to_camel_case(name))
}

#[derive(Debug, Clone, Serialize)]
struct EnumValueView {
    ident: String,
    value: String,
}

#[derive(Debug, Clone, Serialize)]
struct EnumView {
    name: String,
    values: Vec<EnumValueView>,
}

impl EnumView {
    fn new(name: String, values: &[&str]) -> Self {
        let mut seen: Vec<String> = Vec::new();
        let values = values
            .iter()
            .filter_map(|value| {
                let mut ident = to_camel_case(value);
                if !ident.starts_with(|c: char| c.is_ascii_alphabetic()) {
                    ident = format!("v{ident}");
                }
                let ident = escape_dart(&ident);
                if seen.contains(&ident) {
                    return None;
                }
                seen.push(ident.clone());
                Some(EnumValueView {
                    ident,
                    value: value.to_string(),
                })
            })
            .collect();
        Self { name, values }
    }
}

#[derive(Debug, Clone, Serialize)]
struct PropertyView {
    /// Declared name, as seen by attribute lookups.
    name: String,
    ident: String,
    ty: String,
    readonly: bool,
    layout_dependent: bool,
    doc: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct AttributeView {
    key: String,
    getter: String,
    setter: Option<String>,
    deleter: Option<String>,
}

fn attribute_view(member: &Member, ident: &str, enum_name: Option<&str>) -> Option<AttributeView> {
    let ty = member.value_type();
    let nullable = is_nullable(member);
    let explicit_null = matches!(ty, TypeRef::Union(parts) if has_null(parts));

    let (getter, rhs, reset) = match enum_name {
        Some(enum_name) => {
            let getter = if nullable {
                format!("{ident}?.value")
            } else {
                format!("{ident}.value")
            };
            let parse = if nullable {
                format!("{enum_name}.parse(value)")
            } else {
                format!("{enum_name}.parse(value)!")
            };
            let reset = if nullable {
                "null".to_string()
            } else {
                format!("{enum_name}.values.first")
            };
            (getter, parse, reset)
        }
        None => {
            let kind = scalar(ty)?;
            let getter = if nullable {
                format!("{ident}?.toString()")
            } else {
                format!("{ident}.toString()")
            };
            let (rhs, reset) = match kind {
                Scalar::Bool => ("value == 'true' || value == ''", "false"),
                Scalar::Int => ("int.tryParse(value) ?? 0", "0"),
                Scalar::Double => ("double.tryParse(value) ?? 0.0", "0.0"),
                Scalar::String if nullable => ("value", "null"),
                Scalar::String => ("value", "''"),
            };
            (getter, rhs.to_string(), reset.to_string())
        }
    };

    let (setter, deleter) = if member.is_readonly() {
        (None, None)
    } else {
        let rhs = if explicit_null {
            format!("value == 'null' ? null : ({rhs})")
        } else {
            rhs
        };
        (
            Some(format!("{ident} = {rhs}")),
            Some(format!("{ident} = {reset}")),
        )
    };

    Some(AttributeView {
        key: member.name.clone(),
        getter,
        setter,
        deleter,
    })
}

#[derive(Debug, Clone, Serialize)]
struct MethodStubView {
    owner: String,
    /// Registration key: the declared name.
    name: String,
    ident: String,
    renamed: bool,
    doc: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct EventView {
    /// Event type as dispatched, e.g. `click` for `onclick`.
    event: String,
    ident: String,
    handler: String,
    doc: Vec<String>,
}

fn event_view(stem: &str, member: &Member, model: &Model) -> Result<EventView, CodegenError> {
    let ty = match member.params().first() {
        Some(param) if member.is_method() => &param.ty,
        _ => member.value_type(),
    };
    let ty = match ty {
        TypeRef::Union(parts) => match classify(parts) {
            UnionShape::Nullable(inner) => inner,
            _ => ty,
        },
        other => other,
    };
    // Handler signatures: `onclick: (event: Event) => void`.
    let ty = match ty {
        TypeRef::Function(sig) => sig.params.first().map_or(ty, |p| &p.ty),
        other => other,
    };
    let type_name = match ty {
        TypeRef::Extern(sym) => model.symbols.name(*sym),
        TypeRef::Interface(id) => model.decl(*id).name.as_str(),
        _ => "",
    };
    let handler = match type_name {
        "Event" => "EventHandler".to_string(),
        "CustomEvent" => "EventHandler<CustomEvent>".to_string(),
        _ => {
            return Err(CodegenError::Unsupported {
                target: TARGET,
                symbol: format!("{stem}Events.{}", member.name),
                reason: "event members must be typed Event or CustomEvent".to_string(),
            })
        }
    };
    let event = member
        .name
        .strip_prefix("on")
        .filter(|rest| !rest.is_empty())
        .unwrap_or(&member.name)
        .to_string();

    Ok(EventView {
        ident: dart_ident(&member.name),
        event,
        handler,
        doc: doc_lines(member.doc.as_deref()),
    })
}

#[derive(Debug, Clone, Serialize)]
struct ComponentView {
    header: Header,
    class: String,
    enums: Vec<EnumView>,
    properties: Vec<PropertyView>,
    attributes: Vec<AttributeView>,
    methods: Vec<MethodStubView>,
    events: Vec<EventView>,
}

impl ComponentView {
    fn new(model: &Model, component: &Component) -> Result<Self, CodegenError> {
        let stem = component.stem();
        let sources = component
            .family
            .decls()
            .map(|id| source_name(model.unit_of(model.decl(id))));

        let mut enums = Vec::new();
        let mut properties = Vec::new();
        let mut attributes = Vec::new();
        for member in &component.properties {
            let ident = dart_ident(member.binding_name());
            let enum_name = match member.value_type() {
                TypeRef::Union(parts) => match classify(parts) {
                    UnionShape::StringEnum(values) => {
                        let name = format!("{stem}{}", to_pascal_case(&member.name));
                        enums.push(EnumView::new(name.clone(), &values));
                        Some(name)
                    }
                    _ => None,
                },
                _ => None,
            };
            let base = enum_name
                .clone()
                .unwrap_or_else(|| dart_type(member.value_type(), model));
            let ty = if is_nullable(member) && base != "dynamic" {
                format!("{base}?")
            } else {
                base
            };
            if let Some(attribute) = attribute_view(member, &ident, enum_name.as_deref()) {
                attributes.push(attribute);
            }
            properties.push(PropertyView {
                name: member.name.clone(),
                ident,
                ty,
                readonly: member.is_readonly(),
                layout_dependent: member.modes.layout_dependent,
                doc: doc_lines(member.doc.as_deref()),
            });
        }

        let class = format!("{stem}Bindings");
        let methods = component
            .methods
            .iter()
            .map(|member| MethodStubView {
                owner: class.clone(),
                name: member.name.clone(),
                ident: dart_ident(member.binding_name()),
                renamed: member.modes.rename.is_some(),
                doc: doc_lines(member.doc.as_deref()),
            })
            .collect();

        let events = component
            .events
            .iter()
            .map(|member| event_view(stem, member, model))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            header: Header::new(Target::Ui, "//", sources),
            class,
            enums,
            properties,
            attributes,
            methods,
            events,
        })
    }
}
