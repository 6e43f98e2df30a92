//! Debug-protocol emitter: C parse/stringify routines for plain-data records.
//!
//! Every dictionary becomes a C struct in `dap_records.h` and a pair of
//! symmetric routines in `dap_<snake_name>.c`. [`RecordCodec`] applies the
//! same field rules to JSON values in process.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use super::{
    c_ident, doc_lines, sort_files, source_name, EmitContext, Emitter, GeneratedFile, Header,
    Rendered, Target, TemplateEngine,
};
use crate::component::inherited_members;
use crate::error::{CodecError, CodegenError};
use crate::model::{DeclId, Model, PrimitiveKind, TypeRef};
use crate::naming::{escape_cpp, to_snake_case};
use crate::unions::{classify, UnionShape};

/// Wire representation of one record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Double,
    Int,
    Bool,
    Record(String),
    Array(Box<FieldKind>),
}

impl FieldKind {
    fn from_type(ty: &TypeRef, model: &Model) -> Option<Self> {
        match ty.unwrap_markers() {
            TypeRef::Primitive(kind) if kind.is_string() => Some(FieldKind::String),
            TypeRef::Primitive(PrimitiveKind::Double) => Some(FieldKind::Double),
            TypeRef::Primitive(PrimitiveKind::Int32 | PrimitiveKind::Int64) => Some(FieldKind::Int),
            TypeRef::Primitive(PrimitiveKind::Boolean) => Some(FieldKind::Bool),
            TypeRef::StringLiteral(_) => Some(FieldKind::String),
            TypeRef::Record(id) => Some(FieldKind::Record(model.decl(*id).name.clone())),
            TypeRef::Array(inner) => match FieldKind::from_type(inner, model)? {
                FieldKind::Array(_) => None,
                kind => Some(FieldKind::Array(Box::new(kind))),
            },
            TypeRef::Union(parts) => match classify(parts) {
                UnionShape::Nullable(inner) => FieldKind::from_type(inner, model),
                UnionShape::StringEnum(_) => Some(FieldKind::String),
                UnionShape::Variant(_) => None,
            },
            _ => None,
        }
    }

    fn c_type(&self) -> String {
        match self {
            FieldKind::String => "char*".to_string(),
            FieldKind::Double => "double".to_string(),
            FieldKind::Int => "int64_t".to_string(),
            FieldKind::Bool => "int".to_string(),
            FieldKind::Record(name) => format!("{name}*"),
            FieldKind::Array(inner) => format!("{}*", inner.c_type()),
        }
    }

    /// Suffix of the runtime `get_property_*` helper for scalars.
    fn getter(&self) -> &'static str {
        match self {
            FieldKind::String => "string_copy",
            FieldKind::Double => "float64",
            FieldKind::Int => "int64",
            _ => "boolean",
        }
    }

    fn constructor(&self) -> &'static str {
        match self {
            FieldKind::String => "JS_NewString",
            FieldKind::Double => "JS_NewFloat64",
            FieldKind::Int => "JS_NewInt64",
            _ => "JS_NewBool",
        }
    }
}

/// A record field as both the C routines and [`RecordCodec`] see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Declared name, used as the JSON key.
    pub name: String,
    pub kind: FieldKind,
    pub optional: bool,
}

/// Fields of a record, parent fields first. Members whose type has no
/// wire form are returned separately.
pub fn record_fields(model: &Model, id: DeclId) -> (Vec<FieldSpec>, Vec<String>) {
    let mut fields = Vec::new();
    let mut skipped = Vec::new();
    for member in inherited_members(model, id) {
        if member.is_method() {
            continue;
        }
        match FieldKind::from_type(&member.ty, model) {
            Some(kind) => fields.push(FieldSpec {
                name: member.name.clone(),
                kind,
                optional: matches!(
                    member.kind,
                    crate::model::MemberKind::Property { optional: true, .. }
                ) || member.value_type().is_nullable(),
            }),
            None => skipped.push(member.name.clone()),
        }
    }
    (fields, skipped)
}

/// Renders `dap_records.h` and one `dap_<snake_name>.c` per dictionary.
#[derive(Debug, Clone, Copy, Default)]
pub struct DapEmitter;

impl Emitter for DapEmitter {
    fn render(
        &self,
        ctx: &EmitContext<'_>,
        engine: &TemplateEngine<'_>,
    ) -> Result<Rendered, CodegenError> {
        let mut records = Vec::new();
        for id in ctx.emittable_decls() {
            let decl = ctx.model.decl(id);
            if !decl.is_record() {
                continue;
            }
            records.push(RecordView::new(ctx.model, id));
        }
        if records.is_empty() {
            return Ok(Rendered::default());
        }

        let mut files = Vec::with_capacity(records.len() + 1);
        for record in &records {
            files.push(GeneratedFile::new(
                format!("dap_{}.c", record.snake),
                engine.render("dap_record", record)?,
            ));
            debug!(record = %record.name, "rendered dap record");
        }
        let header = RecordsHeaderView {
            header: Header::new(
                Target::Dap,
                "//",
                records.iter().flat_map(|r| r.header.sources.clone()),
            ),
            records,
        };
        files.push(GeneratedFile::new(
            "dap_records.h",
            engine.render("dap_records_header", &header)?,
        ));
        sort_files(&mut files);
        Ok(Rendered {
            files,
            failures: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct FieldView {
    name: String,
    optional: bool,
    decl: Vec<String>,
    parse: Vec<String>,
    reset: Vec<String>,
    stringify: Vec<String>,
    free: Vec<String>,
}

fn indent(lines: Vec<String>) -> Vec<String> {
    lines.into_iter().map(|l| format!("  {l}")).collect()
}

fn guarded(condition: &str, body: Vec<String>) -> Vec<String> {
    let mut out = vec![format!("if ({condition}) {{")];
    out.extend(indent(body));
    out.push("}".to_string());
    out
}

fn scoped(body: Vec<String>) -> Vec<String> {
    let mut out = vec!["{".to_string()];
    out.extend(indent(body));
    out.push("}".to_string());
    out
}

impl FieldView {
    fn new(field: &FieldSpec) -> Self {
        let key = &field.name;
        let f = format!("record->{}", escape_cpp(&c_ident(key)));
        let len = format!("{f}Len");

        let mut decl = vec![format!("{} {};", field.kind.c_type(), escape_cpp(&c_ident(key)))];
        let (parse, reset, stringify, free) = match &field.kind {
            FieldKind::Array(inner) => {
                decl.push(format!("size_t {}Len;", escape_cpp(&c_ident(key))));
                let parse = match inner.as_ref() {
                    FieldKind::Record(name) => scoped(vec![
                        format!("JSValue field = JS_GetPropertyStr(ctx, value, \"{key}\");"),
                        format!("{f} = parse_{name}_array(ctx, field, &{len});"),
                        "JS_FreeValue(ctx, field);".to_string(),
                    ]),
                    scalar => vec![format!(
                        "{f} = get_property_{}_1(ctx, value, \"{key}\", &{len});",
                        scalar.getter()
                    )],
                };
                let stringify = match inner.as_ref() {
                    FieldKind::Record(name) => vec![format!(
                        "JS_SetPropertyStr(ctx, object, \"{key}\", stringify_{name}_array(ctx, {f}, {len}));"
                    )],
                    scalar => {
                        let item = if *scalar == FieldKind::String {
                            format!("{f}[i] != NULL ? JS_NewString(ctx, {f}[i]) : JS_NULL")
                        } else {
                            format!("{}(ctx, {f}[i])", scalar.constructor())
                        };
                        scoped(vec![
                            "JSValue arr = JS_NewArray(ctx);".to_string(),
                            format!("for (size_t i = 0; i < {len}; i++) {{"),
                            format!("  JS_SetPropertyUint32(ctx, arr, (uint32_t)i, {item});"),
                            "}".to_string(),
                            format!("JS_SetPropertyStr(ctx, object, \"{key}\", arr);"),
                        ])
                    }
                };
                let free = match inner.as_ref() {
                    FieldKind::Record(name) => vec![format!("free_{name}_array(ctx, {f}, {len});")],
                    FieldKind::String => vec![
                        format!("for (size_t i = 0; i < {len}; i++) js_free(ctx, {f}[i]);"),
                        format!("js_free(ctx, {f});"),
                    ],
                    _ => vec![format!("js_free(ctx, {f});")],
                };
                let stringify = if field.optional {
                    guarded(&format!("{f} != NULL"), stringify)
                } else {
                    stringify
                };
                (
                    parse,
                    vec![format!("{f} = NULL;"), format!("{len} = 0;")],
                    stringify,
                    free,
                )
            }
            FieldKind::Record(name) => {
                let parse = scoped(vec![
                    format!("JSValue field = JS_GetPropertyStr(ctx, value, \"{key}\");"),
                    format!("{f} = parse_{name}(ctx, field);"),
                    "JS_FreeValue(ctx, field);".to_string(),
                ]);
                let set = format!("JS_SetPropertyStr(ctx, object, \"{key}\", stringify_{name}(ctx, {f}));");
                let stringify = if field.optional {
                    guarded(&format!("{f} != NULL"), vec![set])
                } else {
                    vec![set]
                };
                (
                    parse,
                    vec![format!("{f} = NULL;")],
                    stringify,
                    vec![format!("free_{name}(ctx, {f});")],
                )
            }
            scalar => {
                let parse = vec![format!(
                    "{f} = get_property_{}(ctx, value, \"{key}\");",
                    scalar.getter()
                )];
                let reset = match scalar {
                    FieldKind::String => "NULL",
                    FieldKind::Double => "NAN",
                    _ => "0",
                };
                let stringify = match (scalar, field.optional) {
                    (FieldKind::String, true) => guarded(
                        &format!("{f} != NULL"),
                        vec![format!("JS_SetPropertyStr(ctx, object, \"{key}\", JS_NewString(ctx, {f}));")],
                    ),
                    (FieldKind::String, false) => vec![format!(
                        "JS_SetPropertyStr(ctx, object, \"{key}\", {f} != NULL ? JS_NewString(ctx, {f}) : JS_NULL);"
                    )],
                    (FieldKind::Double, true) => guarded(
                        &format!("!isnan({f})"),
                        vec![format!("JS_SetPropertyStr(ctx, object, \"{key}\", JS_NewFloat64(ctx, {f}));")],
                    ),
                    _ => vec![format!(
                        "JS_SetPropertyStr(ctx, object, \"{key}\", {}(ctx, {f}));",
                        scalar.constructor()
                    )],
                };
                let free = if *scalar == FieldKind::String {
                    vec![format!("js_free(ctx, {f});")]
                } else {
                    Vec::new()
                };
                (parse, vec![format!("{f} = {reset};")], stringify, free)
            }
        };

        Self {
            name: key.clone(),
            optional: field.optional,
            decl,
            parse,
            reset,
            stringify,
            free,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct RecordView {
    header: Header,
    name: String,
    snake: String,
    doc: Vec<String>,
    fields: Vec<FieldView>,
    skipped: Vec<String>,
}

impl RecordView {
    fn new(model: &Model, id: DeclId) -> Self {
        let decl = model.decl(id);
        let (fields, skipped) = record_fields(model, id);
        for name in &skipped {
            warn!(symbol = %format!("{}.{}", decl.name, name), "field has no debug-protocol form, skipping");
        }
        let sources = model
            .ancestry(id)
            .into_iter()
            .map(|a| source_name(model.unit_of(model.decl(a))));
        Self {
            header: Header::new(Target::Dap, "//", sources),
            name: decl.name.clone(),
            snake: to_snake_case(&decl.name),
            doc: doc_lines(decl.doc.as_deref()),
            fields: fields.iter().map(FieldView::new).collect(),
            skipped,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct RecordsHeaderView {
    header: Header,
    records: Vec<RecordView>,
}

/// In-process mirror of the generated `parse_*` / `stringify_*` routines.
///
/// A parsed record is a JSON object holding every field of the C struct:
/// absent pointers and NaN doubles are `null`, absent integers and booleans
/// are zero, absent optional arrays are `null` and required ones are empty.
pub struct RecordCodec<'a> {
    model: &'a Model,
}

impl<'a> RecordCodec<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self { model }
    }

    fn fields(&self, record: &str) -> Result<Vec<FieldSpec>, CodecError> {
        self.model
            .lookup(record)
            .filter(|id| self.model.decl(*id).is_record())
            .map(|id| record_fields(self.model, id).0)
            .ok_or_else(|| CodecError::UnknownRecord(record.to_string()))
    }

    /// Mirror of `parse_<record>`: read a protocol object into a record.
    pub fn parse(&self, record: &str, value: &Value) -> Result<Value, CodecError> {
        let fields = self.fields(record)?;
        let object = value.as_object().ok_or_else(|| CodecError::NotAnObject {
            record: record.to_string(),
            found: kind_of(value),
        })?;

        let mut out = Map::new();
        for field in &fields {
            let parsed = match object.get(&field.name) {
                None if field.optional => absent(&field.kind, true),
                raw => self.parse_field(&field.kind, raw.unwrap_or(&Value::Null), field.optional)?,
            };
            out.insert(field.name.clone(), parsed);
        }
        Ok(Value::Object(out))
    }

    fn parse_field(&self, kind: &FieldKind, raw: &Value, optional: bool) -> Result<Value, CodecError> {
        Ok(match kind {
            FieldKind::String => match raw {
                Value::String(s) => Value::String(s.clone()),
                Value::Number(n) => Value::String(n.to_string()),
                Value::Bool(b) => Value::String(b.to_string()),
                _ => Value::Null,
            },
            FieldKind::Double => match raw {
                Value::Number(_) => raw.clone(),
                _ => to_f64(raw)
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            },
            FieldKind::Int => Value::from(to_f64(raw).filter(|n| n.is_finite()).map_or(0, |n| n.trunc() as i64)),
            FieldKind::Bool => Value::Bool(truthy(raw)),
            FieldKind::Record(name) => match raw {
                Value::Object(_) => self.parse(name, raw)?,
                _ => Value::Null,
            },
            FieldKind::Array(inner) => match raw {
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| match inner.as_ref() {
                            FieldKind::Record(name) => match item {
                                Value::Object(_) => self.parse(name, item),
                                _ => Ok(Value::Null),
                            },
                            scalar => self.parse_field(scalar, item, false),
                        })
                        .collect::<Result<_, _>>()?,
                ),
                _ => absent(kind, optional),
            },
        })
    }

    /// Mirror of `stringify_<record>`: write a record back as a protocol object.
    pub fn stringify(&self, record: &str, value: &Value) -> Result<Value, CodecError> {
        let fields = self.fields(record)?;
        let object = value.as_object().ok_or_else(|| CodecError::NotAnObject {
            record: record.to_string(),
            found: kind_of(value),
        })?;

        let mut out = Map::new();
        for field in &fields {
            let current = object.get(&field.name).unwrap_or(&Value::Null);
            let written = match (&field.kind, current) {
                (FieldKind::Int, Value::Null) => Value::from(0),
                (FieldKind::Bool, Value::Null) => Value::Bool(false),
                (_, Value::Null) if field.optional => continue,
                (FieldKind::Array(_), Value::Null) => Value::Array(Vec::new()),
                (FieldKind::Record(name), Value::Object(_)) => self.stringify(name, current)?,
                (FieldKind::Array(inner), Value::Array(items)) => match inner.as_ref() {
                    FieldKind::Record(name) => Value::Array(
                        items
                            .iter()
                            .map(|item| match item {
                                Value::Object(_) => self.stringify(name, item),
                                _ => Ok(Value::Null),
                            })
                            .collect::<Result<_, _>>()?,
                    ),
                    _ => current.clone(),
                },
                _ => current.clone(),
            };
            out.insert(field.name.clone(), written);
        }
        Ok(Value::Object(out))
    }
}

fn absent(kind: &FieldKind, optional: bool) -> Value {
    match kind {
        FieldKind::Int => Value::from(0),
        FieldKind::Bool => Value::Bool(false),
        FieldKind::Array(_) if !optional => Value::Array(Vec::new()),
        _ => Value::Null,
    }
}

fn to_f64(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truthy(raw: &Value) -> bool {
    match raw {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
