//! Native-binding emitter: QuickJS wrapper classes in C++.
//!
//! Per bindable interface it renders a `qjs_<name>.h/.cc` pair with one
//! trampoline per member; per dictionary a struct with QuickJS conversion;
//! per variant union a header-only tagged class. Batch-wide name tables and
//! the installer come last so they only list what was actually emitted.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use super::{
    c_ident, doc_lines, sort_files, source_name, EmitContext, Emitter, GeneratedFile, Header,
    Rendered, Target, TemplateEngine,
};
use crate::error::{CodegenError, UnitFailure};
use crate::model::{
    DeclId, DeclKind, Declaration, FunctionSig, Member, MemberKind, Model, Param, PrimitiveKind,
    TypeRef,
};
use crate::naming::{escape_cpp, to_pascal_case, to_snake_case};
use crate::unions::{classify, has_null, part_name, union_class_name, union_file_stem, UnionShape};

const TARGET: &str = "native";

/// Renders QuickJS bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEmitter;

impl Emitter for NativeEmitter {
    fn render(
        &self,
        ctx: &EmitContext<'_>,
        engine: &TemplateEngine<'_>,
    ) -> Result<Rendered, CodegenError> {
        let model = ctx.model;
        let mut files = Vec::new();
        let mut failures = Vec::new();
        let mut host_keys: BTreeSet<String> = BTreeSet::new();
        let mut emitted: HashSet<String> = HashSet::new();

        for id in ctx.emittable_decls() {
            let decl = model.decl(id);
            let stem = format!("qjs_{}", to_snake_case(&decl.name));
            match decl.kind {
                DeclKind::Mixin => continue,
                DeclKind::Dictionary => {
                    let view = DictionaryView::new(model, id);
                    files.push(GeneratedFile::new(
                        format!("{stem}.h"),
                        engine.render("native_dictionary_header", &view)?,
                    ));
                    files.push(GeneratedFile::new(
                        format!("{stem}.cc"),
                        engine.render("native_dictionary_source", &view)?,
                    ));
                }
                DeclKind::Interface => {
                    let view = match InterfaceView::new(model, id) {
                        Ok(view) => view,
                        Err(err) => {
                            let error = err.into_unit_error()?;
                            warn!(declaration = %decl.name, %error, "skipping interface");
                            failures.push(UnitFailure {
                                unit: decl.name.clone(),
                                error,
                            });
                            continue;
                        }
                    };
                    host_keys.extend(view.host_keys.iter().cloned());
                    emitted.insert(view.class.clone());
                    files.push(GeneratedFile::new(
                        format!("{stem}.h"),
                        engine.render("native_header", &view)?,
                    ));
                    files.push(GeneratedFile::new(
                        format!("{stem}.cc"),
                        engine.render("native_source", &view)?,
                    ));
                }
            }
            debug!(declaration = %decl.name, "rendered native binding");
        }

        for (name, parts) in ctx.collectors.unions.sorted() {
            let view = UnionView::new(model, name, parts);
            files.push(GeneratedFile::new(
                format!("{}.h", union_file_stem(name)),
                engine.render("native_union", &view)?,
            ));
        }

        let functions: Vec<_> = model
            .functions
            .iter()
            .enumerate()
            .filter(|(index, _)| !ctx.failed_functions.contains(index))
            .map(|(_, f)| f)
            .collect();
        if !functions.is_empty() {
            let mut includes = BTreeSet::new();
            let mut views = Vec::new();
            for function in &functions {
                includes.insert(model.units[function.unit].implementation.clone());
                views.push(MethodView::global(&function.name, &function.sig, function.doc.as_deref(), model));
            }
            let view = GlobalFunctionsView {
                header: Header::new(
                    Target::Native,
                    "//",
                    functions.iter().map(|f| source_name(&model.units[f.unit])),
                ),
                includes: includes.into_iter().collect(),
                registrations: views.iter().map(Registration::of).collect(),
                functions: views,
            };
            files.push(GeneratedFile::new(
                "qjs_global_functions.cc",
                engine.render("native_global_functions", &view)?,
            ));
        }

        let defined = NameTableView::new(
            "defined_properties",
            ctx.collectors.properties.sorted_properties().into_iter(),
        );
        files.push(GeneratedFile::new(
            "defined_properties.h",
            engine.render("native_name_table", &defined)?,
        ));
        let methods = NameTableView::new("binding_call_methods", host_keys.iter().map(String::as_str));
        files.push(GeneratedFile::new(
            "binding_call_methods.h",
            engine.render("native_name_table", &methods)?,
        ));

        let initializer = InitializerView::new(ctx, &emitted, !functions.is_empty());
        files.push(GeneratedFile::new(
            "binding_initializer.cc",
            engine.render("native_initializer", &initializer)?,
        ));

        sort_files(&mut files);
        Ok(Rendered { files, failures })
    }
}

/// `Converter<...>` tag for a type.
pub fn converter(ty: &TypeRef, model: &Model) -> String {
    match ty {
        TypeRef::Primitive(kind) => primitive_converter(*kind).to_string(),
        TypeRef::StringLiteral(_) => "IDLDOMString".to_string(),
        TypeRef::Array(inner) => format!("IDLSequence<{}>", converter(inner, model)),
        TypeRef::Union(parts) => {
            let base = match classify(parts) {
                UnionShape::Nullable(inner) => converter(inner, model),
                UnionShape::StringEnum(_) => "IDLDOMString".to_string(),
                UnionShape::Variant(_) => union_class_name(parts, model),
            };
            if has_null(parts) {
                format!("IDLNullable<{base}>")
            } else {
                base
            }
        }
        TypeRef::Promise(_) => "IDLPromise".to_string(),
        TypeRef::Record(id) => format!("IDLDictionary<{}>", model.decl(*id).name),
        TypeRef::Interface(id) => format!("IDLPointer<{}>", model.decl(*id).name),
        TypeRef::Named(sym) | TypeRef::Extern(sym) => {
            format!("IDLPointer<{}>", model.symbols.name(*sym))
        }
        TypeRef::Function(_) => "IDLCallback".to_string(),
        TypeRef::Marker(_, inner) => converter(inner, model),
    }
}

fn primitive_converter(kind: PrimitiveKind) -> &'static str {
    match kind {
        PrimitiveKind::DomString => "IDLDOMString",
        PrimitiveKind::LegacyDomString => "IDLLegacyDOMString",
        PrimitiveKind::Double => "IDLDouble",
        PrimitiveKind::Int32 => "IDLInt32",
        PrimitiveKind::Int64 => "IDLInt64",
        PrimitiveKind::Boolean => "IDLBoolean",
        PrimitiveKind::Any => "IDLAny",
        PrimitiveKind::Object => "IDLObject",
        PrimitiveKind::Void => "IDLVoid",
        PrimitiveKind::Null | PrimitiveKind::Undefined => "IDLNull",
        PrimitiveKind::Function => "IDLCallback",
    }
}

/// `NativeValueConverter<...>` tag for values crossing to the host.
pub fn native_type(ty: &TypeRef, model: &Model) -> String {
    match ty {
        TypeRef::Primitive(kind) => match kind {
            PrimitiveKind::DomString | PrimitiveKind::LegacyDomString => "NativeTypeString",
            PrimitiveKind::Double => "NativeTypeDouble",
            PrimitiveKind::Int32 | PrimitiveKind::Int64 => "NativeTypeInt64",
            PrimitiveKind::Boolean => "NativeTypeBool",
            PrimitiveKind::Void | PrimitiveKind::Null | PrimitiveKind::Undefined => "NativeTypeNull",
            PrimitiveKind::Function => "NativeTypeFunction",
            PrimitiveKind::Any | PrimitiveKind::Object => "NativeTypeJSON",
        }
        .to_string(),
        TypeRef::StringLiteral(_) => "NativeTypeString".to_string(),
        TypeRef::Array(inner) => format!("NativeTypeArray<{}>", native_type(inner, model)),
        TypeRef::Union(parts) => match classify(parts) {
            UnionShape::Nullable(inner) => native_type(inner, model),
            UnionShape::StringEnum(_) => "NativeTypeString".to_string(),
            UnionShape::Variant(_) => "NativeTypeJSON".to_string(),
        },
        TypeRef::Promise(_) | TypeRef::Record(_) => "NativeTypeJSON".to_string(),
        TypeRef::Interface(id) => format!("NativeTypePointer<{}>", model.decl(*id).name),
        TypeRef::Named(sym) | TypeRef::Extern(sym) => {
            format!("NativeTypePointer<{}>", model.symbols.name(*sym))
        }
        TypeRef::Function(_) => "NativeTypeFunction".to_string(),
        TypeRef::Marker(_, inner) => native_type(inner, model),
    }
}

/// Runtime check selecting a union member.
fn type_test(ty: &TypeRef, model: &Model) -> String {
    match ty {
        TypeRef::Primitive(kind) if kind.is_string() => "JS_IsString(value)".to_string(),
        TypeRef::Primitive(kind) if kind.is_numeric() => "JS_IsNumber(value)".to_string(),
        TypeRef::Primitive(PrimitiveKind::Boolean) => "JS_IsBool(value)".to_string(),
        TypeRef::Primitive(PrimitiveKind::Function) | TypeRef::Function(_) => {
            "JS_IsFunction(ctx, value)".to_string()
        }
        TypeRef::Primitive(PrimitiveKind::Any) => "true".to_string(),
        TypeRef::StringLiteral(_) => "JS_IsString(value)".to_string(),
        TypeRef::Array(_) => "JS_IsArray(ctx, value)".to_string(),
        TypeRef::Interface(id) => format!(
            "QJS{}::HasInstance(ExecutingContext::From(ctx), value)",
            model.decl(*id).name
        ),
        TypeRef::Named(sym) | TypeRef::Extern(sym) => format!(
            "QJS{}::HasInstance(ExecutingContext::From(ctx), value)",
            model.symbols.name(*sym)
        ),
        _ => "JS_IsObject(value)".to_string(),
    }
}

/// Headers of other generated files a set of types depends on.
fn referenced_headers<'a>(
    types: impl IntoIterator<Item = &'a TypeRef>,
    model: &Model,
    own_name: &str,
) -> Vec<String> {
    let mut out = BTreeSet::new();
    for ty in types {
        ty.walk(&mut |node| match node {
            TypeRef::Record(id) | TypeRef::Interface(id) => {
                let decl = model.decl(*id);
                if decl.name != own_name && decl.kind != DeclKind::Mixin {
                    out.insert(format!("qjs_{}", to_snake_case(&decl.name)));
                }
            }
            TypeRef::Union(parts) => {
                if let UnionShape::Variant(_) = classify(parts) {
                    out.insert(union_file_stem(&union_class_name(parts, model)));
                }
            }
            _ => {}
        });
    }
    out.into_iter().collect()
}

fn flush_reason(member: &Member) -> String {
    let mut reason = "FlushUICommandReason::kDependentsOnElement".to_string();
    if member.modes.layout_dependent {
        reason.push_str(" | FlushUICommandReason::kDependentsOnLayout");
    }
    reason
}

fn key(name: &str) -> String {
    format!("k{}", c_ident(name))
}

fn unsupported(owner: &str, member: &Member, reason: &str) -> CodegenError {
    CodegenError::Unsupported {
        target: TARGET,
        symbol: format!("{owner}.{}", member.name),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
struct ArgView {
    name: String,
    index: usize,
    conversion: String,
    native_type: String,
}

impl ArgView {
    /// `padded` reads past `argc` as `undefined` instead of relying on a fallback.
    fn new(param: &Param, index: usize, padded: bool, model: &Model) -> Self {
        let tag = converter(&param.ty, model);
        let conversion = if param.variadic {
            format!(
                "Converter<{tag}>::FromValue(ctx, argv + {index}, std::max(argc - {index}, 0), exception_state)"
            )
        } else if param.optional {
            let value = if padded {
                format!("argc > {index} ? argv[{index}] : JS_UNDEFINED")
            } else {
                format!("argv[{index}]")
            };
            format!("Converter<IDLOptional<{tag}>>::FromValue(ctx, {value}, exception_state)")
        } else {
            format!("Converter<{tag}>::FromValue(ctx, argv[{index}], exception_state)")
        };
        Self {
            name: format!("args_{}", c_ident(&param.name)),
            index,
            conversion,
            native_type: native_type(&param.ty, model),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct StepView {
    arg: ArgView,
    /// Call made when the optional argument is absent.
    fallback: Option<String>,
    returns_void: bool,
    return_converter: String,
}

enum Receiver<'a> {
    Instance,
    Static(&'a str),
    Global,
}

impl Receiver<'_> {
    fn call(&self, target: &str, args: &[String]) -> String {
        let mut list: Vec<&str> = Vec::new();
        if !matches!(self, Receiver::Instance) {
            list.push("context");
        }
        list.extend(args.iter().map(String::as_str));
        list.push("exception_state");
        let list = list.join(", ");
        match self {
            Receiver::Instance => format!("self->{target}({list})"),
            Receiver::Static(owner) => format!("{owner}::{target}({list})"),
            Receiver::Global => format!("{target}({list})"),
        }
    }
}

fn required_count(params: &[Param]) -> usize {
    params.iter().filter(|p| !p.optional && !p.variadic).count()
}

/// One arm of an overload switch.
#[derive(Debug, Clone, Serialize)]
struct DispatchCase {
    argc: usize,
    function: String,
}

#[derive(Debug, Clone, Serialize)]
struct MethodView {
    /// Name registered on the script side.
    name: String,
    owner: String,
    function: String,
    doc: Vec<String>,
    required: usize,
    is_static: bool,
    host: bool,
    key: String,
    flush: String,
    layout_dependent: bool,
    new_object: bool,
    returns_void: bool,
    return_converter: String,
    return_native: String,
    /// Conversions for host calls; every optional argument is padded.
    args: Vec<ArgView>,
    argument_count: usize,
    /// Conversions for direct calls, with fallbacks for absent optionals.
    steps: Vec<StepView>,
    call: String,
    /// Per-signature trampolines of an overloaded method.
    overloads: Vec<MethodView>,
    /// When non-empty this view only switches on `argc`.
    dispatch: Vec<DispatchCase>,
    dispatch_default: String,
}

impl MethodView {
    fn member(owner: &str, member: &Member, model: &Model) -> Result<Self, CodegenError> {
        if member.modes.is_static && member.modes.host_implemented {
            return Err(unsupported(owner, member, "host-implemented members cannot be static"));
        }
        let receiver = if member.modes.is_static {
            Receiver::Static(owner)
        } else {
            Receiver::Instance
        };
        let ident = c_ident(member.binding_name());
        let target = escape_cpp(member.binding_name());
        let make = |function: String, params: &[Param], ret: &TypeRef| {
            let mut view = Self::build(&member.name, owner, &function, &target, params, ret, &receiver, model);
            view.doc = doc_lines(member.doc.as_deref());
            view.host = member.modes.host_implemented;
            view.key = key(&member.name);
            view.flush = flush_reason(member);
            view.layout_dependent = member.modes.layout_dependent;
            view.new_object = member.modes.new_object;
            view
        };

        let callback = format!("{ident}Callback");
        if member.overloads.is_empty() {
            return Ok(make(callback, member.params(), member.value_type()));
        }

        let overloads: Vec<MethodView> = member
            .signatures()
            .into_iter()
            .enumerate()
            .map(|(index, (params, ret))| make(format!("{ident}_overload_{index}"), params, ret))
            .collect();
        let mut view = make(callback, member.params(), member.value_type());
        view.required = overloads.iter().map(|o| o.required).min().unwrap_or(0);
        view.dispatch = overloads
            .iter()
            .map(|o| DispatchCase {
                argc: o.argument_count,
                function: o.function.clone(),
            })
            .collect();
        view.dispatch_default = format!("{ident}_overload_0");
        view.overloads = overloads;
        Ok(view)
    }

    fn global(name: &str, sig: &FunctionSig, doc: Option<&str>, model: &Model) -> Self {
        let mut view = Self::build(
            name,
            "",
            &format!("{}Callback", c_ident(name)),
            &escape_cpp(name),
            &sig.params,
            sig.ret.unwrap_markers(),
            &Receiver::Global,
            model,
        );
        view.is_static = true;
        view.doc = doc_lines(doc);
        view
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        name: &str,
        owner: &str,
        function: &str,
        target: &str,
        params: &[Param],
        ret: &TypeRef,
        receiver: &Receiver<'_>,
        model: &Model,
    ) -> Self {
        let returns_void = ret.is_void();
        let return_converter = converter(ret, model);
        let mut steps = Vec::new();
        let mut names: Vec<String> = Vec::new();
        for (index, param) in params.iter().enumerate() {
            let fallback = (param.optional && !param.variadic).then(|| receiver.call(target, &names));
            let arg = ArgView::new(param, index, false, model);
            names.push(arg.name.clone());
            steps.push(StepView {
                arg,
                fallback,
                returns_void,
                return_converter: return_converter.clone(),
            });
        }

        Self {
            name: name.to_string(),
            owner: owner.to_string(),
            function: function.to_string(),
            doc: Vec::new(),
            required: required_count(params),
            is_static: !matches!(receiver, Receiver::Instance),
            host: false,
            key: key(name),
            flush: String::new(),
            layout_dependent: false,
            new_object: false,
            returns_void,
            return_converter,
            return_native: native_type(ret, model),
            args: params
                .iter()
                .enumerate()
                .map(|(index, p)| ArgView::new(p, index, true, model))
                .collect(),
            argument_count: params.len(),
            call: receiver.call(target, &names),
            steps,
            overloads: Vec::new(),
            dispatch: Vec::new(),
            dispatch_default: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct AsyncView {
    name: String,
    owner: String,
    function: String,
    key: String,
    is_property: bool,
    args: Vec<ArgView>,
    argument_count: usize,
}

impl AsyncView {
    fn new(owner: &str, member: &Member, model: &Model) -> Result<Self, CodegenError> {
        if member.modes.is_static {
            return Err(unsupported(owner, member, "async variants need an instance"));
        }
        Ok(Self {
            name: member.async_name(),
            owner: owner.to_string(),
            function: format!("{}AsyncCallback", c_ident(member.binding_name())),
            key: key(&member.name),
            is_property: !member.is_method(),
            args: member
                .params()
                .iter()
                .enumerate()
                .map(|(index, p)| ArgView::new(p, index, true, model))
                .collect(),
            argument_count: member.params().len(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct AttributeView {
    name: String,
    owner: String,
    key: String,
    getter: String,
    setter: Option<String>,
    converter: String,
    native_type: String,
    host: bool,
    is_static: bool,
    flush: String,
    layout_dependent: bool,
    doc: Vec<String>,
    call: String,
    setter_call: String,
}

impl AttributeView {
    fn new(owner: &str, member: &Member, model: &Model) -> Result<Self, CodegenError> {
        if member.modes.is_static && member.modes.host_implemented {
            return Err(unsupported(owner, member, "host-implemented members cannot be static"));
        }
        let binding = member.binding_name();
        let ident = c_ident(binding);
        Ok(Self {
            name: member.name.clone(),
            owner: owner.to_string(),
            key: key(&member.name),
            getter: format!("{ident}AttributeGetCallback"),
            setter: (!member.is_readonly()).then(|| format!("{ident}AttributeSetCallback")),
            converter: converter(member.value_type(), model),
            native_type: native_type(member.value_type(), model),
            host: member.modes.host_implemented,
            is_static: member.modes.is_static,
            flush: flush_reason(member),
            layout_dependent: member.modes.layout_dependent,
            doc: doc_lines(member.doc.as_deref()),
            call: escape_cpp(binding),
            setter_call: format!("set{}", to_pascal_case(binding)),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct Registration {
    name: String,
    function: String,
    length: usize,
}

impl Registration {
    fn of(method: &MethodView) -> Self {
        Self {
            name: method.name.clone(),
            function: method.function.clone(),
            length: method.required,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ParentView {
    class: String,
    header: String,
}

impl ParentView {
    fn named(name: &str) -> Self {
        Self {
            class: format!("QJS{name}"),
            header: format!("qjs_{}", to_snake_case(name)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ConstructorView {
    required: usize,
    args: Vec<ArgView>,
    call: String,
}

#[derive(Debug, Clone, Serialize)]
struct IndexedView {
    numeric: bool,
    converter: String,
    readonly: bool,
}

#[derive(Debug, Clone, Serialize)]
struct InterfaceView {
    header: Header,
    name: String,
    class: String,
    guard: String,
    file: String,
    implementation: String,
    doc: Vec<String>,
    parent: Option<ParentView>,
    includes: Vec<String>,
    attributes: Vec<AttributeView>,
    methods: Vec<MethodView>,
    async_methods: Vec<AsyncView>,
    prototype_functions: Vec<Registration>,
    prototype_attributes: Vec<AttributeView>,
    static_functions: Vec<Registration>,
    static_attributes: Vec<AttributeView>,
    constructor: Option<ConstructorView>,
    indexed: Option<IndexedView>,
    #[serde(skip)]
    host_keys: Vec<String>,
}

/// Own members followed by those of mixin ancestors, and the nearest
/// non-mixin parent name.
fn bindable_members<'m>(model: &'m Model, decl: &'m Declaration) -> (Vec<&'m Member>, Option<String>) {
    let mut members: Vec<&Member> = decl.visible_members().collect();
    let mut cur = decl;
    loop {
        match cur.parent {
            Some(pid) if model.decl(pid).kind == DeclKind::Mixin => {
                cur = model.decl(pid);
                for member in cur.visible_members() {
                    if !members.iter().any(|m| m.name == member.name) {
                        members.push(member);
                    }
                }
            }
            Some(pid) => return (members, Some(model.decl(pid).name.clone())),
            None => {
                return (
                    members,
                    cur.parent_symbol.map(|s| model.symbols.name(s).to_string()),
                )
            }
        }
    }
}

impl InterfaceView {
    fn new(model: &Model, id: DeclId) -> Result<Self, CodegenError> {
        let decl = model.decl(id);
        let unit = model.unit_of(decl);
        let name = decl.name.clone();
        let snake = to_snake_case(&name);
        let (members, parent) = bindable_members(model, decl);

        let mut attributes = Vec::new();
        let mut methods = Vec::new();
        let mut async_methods = Vec::new();
        let mut host_keys = Vec::new();
        for member in &members {
            if member.modes.host_implemented || member.has_async_form() {
                host_keys.push(member.name.clone());
            }
            if member.has_async_form() {
                async_methods.push(AsyncView::new(&name, member, model)?);
            }
            if !member.has_sync_form() {
                continue;
            }
            if member.is_method() {
                methods.push(MethodView::member(&name, member, model)?);
            } else {
                attributes.push(AttributeView::new(&name, member, model)?);
            }
        }

        let mut prototype_functions = Vec::new();
        let mut static_functions = Vec::new();
        for method in &methods {
            if method.is_static {
                static_functions.push(Registration::of(method));
            } else {
                prototype_functions.push(Registration::of(method));
            }
        }
        prototype_functions.extend(async_methods.iter().map(|a| Registration {
            name: a.name.clone(),
            function: a.function.clone(),
            length: 0,
        }));
        let (static_attributes, prototype_attributes): (Vec<_>, Vec<_>) =
            attributes.iter().cloned().partition(|a| a.is_static);

        let constructor = decl.constructor.as_ref().map(|ctor| {
            let args: Vec<ArgView> = ctor
                .params
                .iter()
                .enumerate()
                .map(|(index, p)| ArgView::new(p, index, true, model))
                .collect();
            let names: Vec<String> = args.iter().map(|a| a.name.clone()).collect();
            ConstructorView {
                required: required_count(&ctor.params),
                call: Receiver::Static(&name).call("Create", &names),
                args,
            }
        });

        let indexed = decl.indexed.as_ref().map(|idx| IndexedView {
            numeric: matches!(idx.key.unwrap_markers(), TypeRef::Primitive(k) if k.is_numeric()),
            converter: converter(&idx.value, model),
            readonly: idx.readonly,
        });

        let mut types: Vec<&TypeRef> = Vec::new();
        for member in &members {
            types.push(&member.ty);
            for (params, ret) in member.signatures() {
                types.push(ret);
                types.extend(params.iter().map(|p| &p.ty));
            }
        }
        if let Some(ctor) = &decl.constructor {
            types.extend(ctor.params.iter().map(|p| &p.ty));
        }
        if let Some(idx) = &decl.indexed {
            types.push(&idx.value);
        }

        Ok(Self {
            header: Header::new(Target::Native, "//", [source_name(unit)]),
            class: format!("QJS{name}"),
            guard: format!("BRIDGE_QJS_{}_H_", snake.to_uppercase()),
            file: format!("qjs_{snake}"),
            implementation: unit.implementation.clone(),
            doc: doc_lines(decl.doc.as_deref()),
            parent: parent.as_deref().map(ParentView::named),
            includes: referenced_headers(types, model, &name),
            attributes,
            methods,
            async_methods,
            prototype_functions,
            prototype_attributes,
            static_functions,
            static_attributes,
            constructor,
            indexed,
            host_keys,
            name,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct FieldView {
    name: String,
    ident: String,
    pascal: String,
    converter: String,
    required: bool,
    doc: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct DictionaryView {
    header: Header,
    name: String,
    guard: String,
    file: String,
    doc: Vec<String>,
    /// Parent dictionary class, if any.
    parent: Option<ParentView>,
    fields: Vec<FieldView>,
    includes: Vec<String>,
}

impl DictionaryView {
    fn new(model: &Model, id: DeclId) -> Self {
        let decl = model.decl(id);
        let snake = to_snake_case(&decl.name);
        let fields: Vec<FieldView> = decl
            .visible_members()
            .filter(|m| !m.is_method())
            .map(|m| FieldView {
                name: m.name.clone(),
                ident: escape_cpp(&c_ident(&to_snake_case(&m.name))),
                pascal: to_pascal_case(&m.name),
                converter: converter(m.value_type(), model),
                required: matches!(m.kind, MemberKind::Property { optional: false, .. }),
                doc: doc_lines(m.doc.as_deref()),
            })
            .collect();
        let parent = decl
            .parent
            .filter(|pid| model.decl(*pid).is_record())
            .map(|pid| {
                let name = &model.decl(pid).name;
                ParentView {
                    class: name.clone(),
                    header: format!("qjs_{}", to_snake_case(name)),
                }
            });

        Self {
            header: Header::new(Target::Native, "//", [source_name(model.unit_of(decl))]),
            name: decl.name.clone(),
            guard: format!("BRIDGE_QJS_{}_H_", snake.to_uppercase()),
            file: format!("qjs_{snake}"),
            doc: doc_lines(decl.doc.as_deref()),
            parent,
            includes: referenced_headers(decl.visible_members().map(|m| &m.ty), model, &decl.name),
            fields,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct UnionPartView {
    owner: String,
    name: String,
    ident: String,
    converter: String,
    test: String,
}

#[derive(Debug, Clone, Serialize)]
struct UnionView {
    header: Header,
    class: String,
    guard: String,
    description: String,
    parts: Vec<UnionPartView>,
    includes: Vec<String>,
}

impl UnionView {
    fn new(model: &Model, class: &str, parts: &[TypeRef]) -> Self {
        let mut views: Vec<UnionPartView> = Vec::new();
        let mut members: Vec<&TypeRef> = Vec::new();
        if let UnionShape::Variant(variant) = classify(parts) {
            for ty in variant {
                let name = part_name(ty, model);
                if views.iter().any(|v| v.name == name) {
                    continue;
                }
                members.push(ty);
                views.push(UnionPartView {
                    owner: class.to_string(),
                    ident: to_snake_case(&name),
                    converter: converter(ty, model),
                    test: type_test(ty, model),
                    name,
                });
            }
        }
        let stem = union_file_stem(class);
        Self {
            header: Header::new(Target::Native, "//", std::iter::empty()),
            class: class.to_string(),
            guard: format!("BRIDGE_{}_H_", stem.to_uppercase()),
            description: views
                .iter()
                .map(|v| v.name.as_str())
                .collect::<Vec<_>>()
                .join(" or "),
            includes: referenced_headers(members, model, ""),
            parts: views,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GlobalFunctionsView {
    header: Header,
    includes: Vec<String>,
    functions: Vec<MethodView>,
    registrations: Vec<Registration>,
}

#[derive(Debug, Clone, Serialize)]
struct TableEntry {
    name: String,
    ident: String,
}

#[derive(Debug, Clone, Serialize)]
struct NameTableView {
    header: Header,
    namespace: String,
    guard: String,
    names: Vec<TableEntry>,
}

impl NameTableView {
    fn new<'a>(namespace: &str, names: impl Iterator<Item = &'a str>) -> Self {
        let mut names: Vec<TableEntry> = names
            .map(|name| TableEntry {
                name: name.to_string(),
                ident: c_ident(name),
            })
            .collect();
        names.sort_by(|a, b| a.name.cmp(&b.name));
        names.dedup_by(|a, b| a.name == b.name);
        Self {
            header: Header::new(Target::Native, "//", std::iter::empty()),
            namespace: namespace.to_string(),
            guard: format!("BRIDGE_{}_H_", namespace.to_uppercase()),
            names,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct InitializerView {
    header: Header,
    includes: Vec<String>,
    classes: Vec<String>,
    global_functions: bool,
}

impl InitializerView {
    /// Installers of emitted classes, parents before descendants.
    fn new(ctx: &EmitContext<'_>, emitted: &HashSet<String>, global_functions: bool) -> Self {
        let model = ctx.model;
        let mut classes: Vec<(usize, String)> = ctx
            .collectors
            .properties
            .interfaces
            .iter()
            .filter(|class| emitted.contains(*class))
            .map(|class| {
                let depth = class
                    .strip_prefix("QJS")
                    .and_then(|name| model.lookup(name))
                    .map_or(0, |id| model.ancestry(id).len());
                (depth, class.clone())
            })
            .collect();
        classes.sort();

        let mut includes: BTreeSet<String> = ctx.collectors.properties.files.iter().cloned().collect();
        for (_, class) in &classes {
            let name = class.strip_prefix("QJS").unwrap_or(class);
            includes.insert(format!("qjs_{}", to_snake_case(name)));
        }

        Self {
            header: Header::new(Target::Native, "//", std::iter::empty()),
            includes: includes.into_iter().collect(),
            classes: classes.into_iter().map(|(_, class)| class).collect(),
            global_functions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{parse_unit, AnalyzeOptions, Analyzer};
    use crate::collector::Collectors;
    use crate::component::resolve_components;
    use crate::model::SourceUnit;
    use crate::resolver::link;

    fn emit(src: &str, options: &AnalyzeOptions) -> Rendered {
        let mut model = Model::default();
        let mut collectors = Collectors::default();
        model.units.push(SourceUnit::new("dom/element.d.ts", src));
        let file = parse_unit(&model.units[0]).unwrap();
        Analyzer::new(&mut model, &mut collectors, options)
            .analyze(0, &file)
            .unwrap();
        let report = link(&mut model, &mut collectors, &["Event".to_string()]).unwrap();
        let set = resolve_components(&model, &report.failed_decls, None);
        let ctx = EmitContext {
            model: &model,
            collectors: &collectors,
            components: &set.components,
            failed_decls: &report.failed_decls,
            failed_functions: &report.failed_functions,
        };
        NativeEmitter
            .render(&ctx, &TemplateEngine::new().unwrap())
            .unwrap()
    }

    fn render(src: &str) -> Vec<GeneratedFile> {
        let out = emit(src, &AnalyzeOptions::default());
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        out.files
    }

    fn file<'a>(files: &'a [GeneratedFile], path: &str) -> &'a str {
        &files
            .iter()
            .find(|f| f.path.to_str() == Some(path))
            .unwrap_or_else(|| panic!("missing {path}"))
            .contents
    }

    #[test]
    fn test_converter_tags() {
        let model = Model::default();
        let ty = TypeRef::Union(vec![
            TypeRef::Array(Box::new(TypeRef::Primitive(PrimitiveKind::Double))),
            TypeRef::Primitive(PrimitiveKind::Null),
        ]);
        assert_eq!(converter(&ty, &model), "IDLNullable<IDLSequence<IDLDouble>>");
        assert_eq!(native_type(&ty, &model), "NativeTypeArray<NativeTypeDouble>");
    }

    #[test]
    fn test_interface_files() {
        let files = render(
            r#"
            interface Element {
              readonly tagName: string;
              className: string;
              getAttribute(name: string): string | null;
            }
        "#,
        );
        let source = file(&files, "qjs_element.cc");
        assert!(source.starts_with("// Generated by idl-bindgen (native target). Do not edit.\n"));
        assert!(source.contains("static JSValue tagNameAttributeGetCallback("));
        assert!(!source.contains("tagNameAttributeSetCallback"));
        assert!(source.contains("self->setClassName(v, exception_state);"));
        assert!(source.contains(
            "auto&& return_value = self->getAttribute(args_name, exception_state);"
        ));
        assert!(source.contains("Converter<IDLNullable<IDLDOMString>>::ToValue"));
        assert!(source.contains("{\"getAttribute\", getAttributeCallback, 1 },"));
        let header = file(&files, "qjs_element.h");
        assert!(header.contains("#include \"dom/element.h\""));
        assert!(header.contains("class QJSElement : public QJSInterfaceBridge<QJSElement, Element>"));
        let defined = file(&files, "defined_properties.h");
        assert!(defined.contains("constexpr char kclassName[] = \"className\";"));
    }

    #[test]
    fn test_optional_argument_fallback() {
        let files = render("interface Node { cloneNode(deep?: boolean): Node; }");
        let source = file(&files, "qjs_node.cc");
        assert!(source.contains("if (argc <= 0) {"));
        assert!(source.contains("auto&& return_value = self->cloneNode(exception_state);"));
        assert!(source.contains("self->cloneNode(args_deep, exception_state)"));
    }

    #[test]
    fn test_host_call_through_with_layout_flush() {
        let files = render(
            r#"
            interface Element {
              readonly offsetWidth: DartImpl<DependentsOnLayout<double>>;
              scrollBy(x: double, y: double): DartImpl<void>;
            }
        "#,
        );
        let source = file(&files, "qjs_element.cc");
        assert!(source.contains(
            "self->GetBindingProperty(binding_call_methods::koffsetWidth, FlushUICommandReason::kDependentsOnElement | FlushUICommandReason::kDependentsOnLayout, exception_state)"
        ));
        assert!(source.contains("self->InvokeBindingMethod(binding_call_methods::kscrollBy, 2, arguments"));
        let methods = file(&files, "binding_call_methods.h");
        assert!(methods.contains("constexpr char koffsetWidth[] = \"offsetWidth\";"));
        assert!(methods.contains("constexpr char kscrollBy[] = \"scrollBy\";"));
    }

    #[test]
    fn test_rename_keeps_registered_name() {
        let files = render("interface Storage { delete(key: string): ImplementedAs<void, 'remove'>; }");
        let source = file(&files, "qjs_storage.cc");
        assert!(source.contains("self->remove(args_key, exception_state);"));
        assert!(source.contains("{\"delete\", removeCallback, 1 },"));
        assert!(!source.contains("self->delete("));
    }

    #[test]
    fn test_async_variants() {
        let files = render(
            r#"
            interface Element {
              readonly scrollTop: SupportAsync<DartImpl<double>>;
              measure(): SupportAsyncManual<DartImpl<double>>;
            }
        "#,
        );
        let source = file(&files, "qjs_element.cc");
        assert!(source.contains("{\"scrollTop_async\", scrollTopAsyncCallback, 0 },"));
        assert!(source.contains("self->GetBindingPropertyAsync(binding_call_methods::kscrollTop, exception_state)"));
        assert!(source.contains("{\"measure_async\", measureAsyncCallback, 0 },"));
        assert!(!source.contains("{\"measure\","));
    }

    #[test]
    fn test_static_factory_on_constructor() {
        let files = render(
            r#"
            interface DOMMatrix {
              new(init?: double[]): DOMMatrix;
              fromMatrix(other: DOMMatrix): StaticMethod<NewObject<DOMMatrix>>;
            }
        "#,
        );
        let source = file(&files, "qjs_dom_matrix.cc");
        assert!(source.contains("DOMMatrix::fromMatrix(context, args_other, exception_state)"));
        assert!(source.contains("DOMMatrix::Create(context, args_init, exception_state)"));
        assert!(source.contains("MemberInstaller::InstallFunctions(context, constructor, static_function_config);"));
    }

    #[test]
    fn test_union_header_and_dictionary() {
        let files = render(
            r#"
            @Dictionary()
            interface ScrollOptions { top?: double; behavior: string; }
            interface Element { scroll(options: ScrollOptions | double): void; }
        "#,
        );
        let union = file(&files, "qjs_union_scroll_options_double.h");
        assert!(union.contains("class QJSUnionScrollOptionsDouble final"));
        assert!(union.contains("if (JS_IsNumber(value)) {"));
        let dict = file(&files, "qjs_scroll_options.h");
        assert!(dict.contains("class ScrollOptions : public DictionaryBase"));
        let source = file(&files, "qjs_scroll_options.cc");
        assert!(source.contains("\"behavior\""));
    }

    #[test]
    fn test_global_functions_and_initializer() {
        let files = render(
            r#"
            interface Node {}
            interface Element extends Node {}
            declare const setTimeout: (handler: Function, timeout?: double) => double;
        "#,
        );
        let globals = file(&files, "qjs_global_functions.cc");
        assert!(globals.contains("{\"setTimeout\", setTimeoutCallback, 1 },"));
        let init = file(&files, "binding_initializer.cc");
        let node = init.find("QJSNode::Install").unwrap();
        let element = init.find("QJSElement::Install").unwrap();
        assert!(node < element);
        assert!(init.contains("InstallGlobalFunctions(context);"));
    }

    #[test]
    fn test_overloads_dispatch_on_argc() {
        let files = render(
            r#"
            interface Canvas {
              fill(): void;
              fill(rule: string): void;
            }
        "#,
        );
        let source = file(&files, "qjs_canvas.cc");
        assert!(source.contains("static JSValue fill_overload_0("));
        assert!(source.contains("static JSValue fill_overload_1("));
        assert!(source.contains("args_rule"));
        assert!(source.contains("if (argc == 1) {"));
        assert!(source.contains("return fill_overload_1(ctx, this_val, argc, argv);"));
        assert!(source.contains("return fill_overload_0(ctx, this_val, argc, argv);"));
        assert_eq!(source.matches("{\"fill\", fillCallback, 0 },").count(), 1);
    }

    #[test]
    fn test_denied_member_leaves_no_trace() {
        let mut options = AnalyzeOptions::default();
        options.deny.insert("Node.secret".to_string());
        let out = emit("interface Node { secret: string | double; id: string; }", &options);
        assert!(out.failures.is_empty());
        assert!(!out
            .files
            .iter()
            .any(|f| f.path.to_str() == Some("qjs_union_dom_string_double.h")));
        let defined = file(&out.files, "defined_properties.h");
        assert!(!defined.contains("ksecret"));
        assert!(defined.contains("kid[]"));
        let source = file(&out.files, "qjs_node.cc");
        assert!(!source.contains("secret"));
    }

    #[test]
    fn test_unsupported_interface_is_skipped() {
        let out = emit(
            r#"
            interface Bad { make(): StaticMethod<DartImpl<void>>; }
            interface Good { run(): void; }
        "#,
            &AnalyzeOptions::default(),
        );
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].unit, "Bad");
        assert!(out.files.iter().any(|f| f.path.to_str() == Some("qjs_good.cc")));
        assert!(!out.files.iter().any(|f| f.path.to_str() == Some("qjs_bad.cc")));
        let init = file(&out.files, "binding_initializer.cc");
        assert!(init.contains("QJSGood::Install"));
        assert!(!init.contains("QJSBad"));
    }
}
