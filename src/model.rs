//! The interface model: source units, declarations, members and resolved types.
//!
//! Declarations live in an arena addressed by [`DeclId`]. Type references
//! produced during analysis name other declarations through a [`SymbolId`]
//! only; the resolver links them to arena indices once every file of the
//! batch has been analyzed.

use std::ops::Range;
use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};

/// Index into the batch-wide [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

/// Index into the declaration arena of a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(u32);

impl DeclId {
    pub(crate) fn from_index(index: usize) -> Self {
        DeclId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interned names referenced anywhere in a batch.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    names: IndexSet<String>,
}

impl SymbolTable {
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(idx) = self.names.get_index_of(name) {
            return SymbolId(idx as u32);
        }
        let (idx, _) = self.names.insert_full(name.to_string());
        SymbolId(idx as u32)
    }

    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.names.get_index_of(name).map(|idx| SymbolId(idx as u32))
    }

    pub fn name(&self, id: SymbolId) -> &str {
        self.names
            .get_index(id.0 as usize)
            .map(String::as_str)
            .unwrap_or("<unknown>")
    }
}

/// One input declaration file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    /// Path relative to the batch source root.
    pub path: PathBuf,
    /// File stem without `.d.ts`.
    pub module: String,
    /// Relative directory joined with the module name, e.g. `html/canvas`.
    pub implementation: String,
    pub text: String,
}

impl SourceUnit {
    /// Build a unit from a path relative to the source root.
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let module = file_name
            .strip_suffix(".d.ts")
            .or_else(|| file_name.strip_suffix(".ts"))
            .unwrap_or(&file_name)
            .to_string();
        let implementation = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => {
                let dir = dir
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                format!("{dir}/{module}")
            }
            None => module.clone(),
        };

        Self {
            path,
            module,
            implementation,
            text: text.into(),
        }
    }
}

/// Index of a [`SourceUnit`] within a batch.
pub type UnitId = usize;

/// Builtin scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    DomString,
    /// `LegacyNullToEmptyString`: a string where `null` converts to `""`.
    LegacyDomString,
    Double,
    Int32,
    Int64,
    Boolean,
    Any,
    Object,
    Void,
    Null,
    Undefined,
    Function,
}

impl PrimitiveKind {
    /// Stable name used for canonical union naming.
    pub fn canonical_name(self) -> &'static str {
        match self {
            PrimitiveKind::DomString => "DomString",
            PrimitiveKind::LegacyDomString => "LegacyDomString",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::Int32 => "Int32",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Any => "Any",
            PrimitiveKind::Object => "Object",
            PrimitiveKind::Void => "Void",
            PrimitiveKind::Null => "Null",
            PrimitiveKind::Undefined => "Undefined",
            PrimitiveKind::Function => "Function",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Double | PrimitiveKind::Int32 | PrimitiveKind::Int64
        )
    }

    pub fn is_string(self) -> bool {
        matches!(
            self,
            PrimitiveKind::DomString | PrimitiveKind::LegacyDomString
        )
    }
}

/// Special generic wrappers of the dialect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Marker {
    /// `DartImpl<T>`
    HostImplemented,
    /// `StaticMethod<T>`
    StaticFactory,
    /// `StaticMember<T>`
    StaticMember,
    /// `SupportAsync<T>`
    DualAsync,
    /// `SupportAsyncManual<T>`
    AsyncOnly,
    /// `ImplementedAs<T, 'name'>`
    Rename(String),
    /// `DependentsOnLayout<T>`
    LayoutDependent,
    /// `NewObject<T>`
    NewObject,
}

impl Marker {
    /// Marker named by a generic in declaration files.
    pub fn from_generic_name(name: &str) -> Option<MarkerKind> {
        Some(match name {
            "DartImpl" => MarkerKind::HostImplemented,
            "StaticMethod" => MarkerKind::StaticFactory,
            "StaticMember" => MarkerKind::StaticMember,
            "SupportAsync" => MarkerKind::DualAsync,
            "SupportAsyncManual" => MarkerKind::AsyncOnly,
            "ImplementedAs" => MarkerKind::Rename,
            "DependentsOnLayout" => MarkerKind::LayoutDependent,
            "NewObject" => MarkerKind::NewObject,
            _ => return None,
        })
    }
}

/// Marker identity without its payload, used while validating composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    HostImplemented,
    StaticFactory,
    StaticMember,
    DualAsync,
    AsyncOnly,
    Rename,
    LayoutDependent,
    NewObject,
}

impl MarkerKind {
    /// Number of type arguments the marker takes.
    pub fn arity(self) -> usize {
        match self {
            MarkerKind::Rename => 2,
            _ => 1,
        }
    }
}

/// A function signature: `(a: T, b?: U) => R`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSig {
    pub params: Vec<Param>,
    pub ret: Box<TypeRef>,
}

/// A resolved type node.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Primitive(PrimitiveKind),
    /// A string literal type, used for enum-like unions.
    StringLiteral(String),
    Array(Box<TypeRef>),
    Union(Vec<TypeRef>),
    Promise(Box<TypeRef>),
    /// A name not yet linked; only present between pass 1 and pass 2.
    Named(SymbolId),
    /// A dictionary declaration.
    Record(DeclId),
    /// A bindable, non-dictionary declaration.
    Interface(DeclId),
    /// A host type listed in configuration.
    Extern(SymbolId),
    Function(FunctionSig),
    Marker(Marker, Box<TypeRef>),
}

impl TypeRef {
    /// Strip all marker wrappers.
    pub fn unwrap_markers(&self) -> &TypeRef {
        match self {
            TypeRef::Marker(_, inner) => inner.unwrap_markers(),
            other => other,
        }
    }

    /// Markers wrapping this type, outermost first.
    pub fn markers(&self) -> Vec<&Marker> {
        let mut out = Vec::new();
        let mut cur = self;
        while let TypeRef::Marker(marker, inner) = cur {
            out.push(marker);
            cur = inner;
        }
        out
    }

    pub fn is_void(&self) -> bool {
        matches!(
            self.unwrap_markers(),
            TypeRef::Primitive(PrimitiveKind::Void)
        )
    }

    pub fn is_nullable(&self) -> bool {
        match self.unwrap_markers() {
            TypeRef::Primitive(PrimitiveKind::Null) => true,
            TypeRef::Union(parts) => parts
                .iter()
                .any(|p| matches!(p, TypeRef::Primitive(PrimitiveKind::Null))),
            _ => false,
        }
    }

    /// Visit every node of the type, markers and function signatures included.
    pub fn walk(&self, f: &mut dyn FnMut(&TypeRef)) {
        f(self);
        match self {
            TypeRef::Array(inner) | TypeRef::Promise(inner) | TypeRef::Marker(_, inner) => {
                inner.walk(f)
            }
            TypeRef::Union(parts) => parts.iter().for_each(|p| p.walk(f)),
            TypeRef::Function(sig) => {
                sig.params.iter().for_each(|p| p.ty.walk(f));
                sig.ret.walk(f);
            }
            _ => {}
        }
    }
}

/// A method or function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    pub optional: bool,
    pub variadic: bool,
}

/// Whether a member has a sync form, an async form, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    Plain,
    /// Both `name` and `name_async`.
    Dual,
    /// Only `name_async`.
    AsyncOnly,
}

/// Flags derived from the markers on a member's type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemberModes {
    pub host_implemented: bool,
    pub layout_dependent: bool,
    pub sync: SyncMode,
    pub is_static: bool,
    pub new_object: bool,
    pub rename: Option<String>,
}

impl MemberModes {
    /// Collect modes from a member type's marker chain.
    pub fn from_type(ty: &TypeRef) -> Self {
        let mut modes = MemberModes::default();
        for marker in ty.markers() {
            match marker {
                Marker::HostImplemented => modes.host_implemented = true,
                Marker::LayoutDependent => modes.layout_dependent = true,
                Marker::StaticFactory | Marker::StaticMember => modes.is_static = true,
                Marker::DualAsync => modes.sync = SyncMode::Dual,
                Marker::AsyncOnly => modes.sync = SyncMode::AsyncOnly,
                Marker::Rename(name) => modes.rename = Some(name.clone()),
                Marker::NewObject => modes.new_object = true,
            }
        }
        modes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    Property { readonly: bool, optional: bool },
    Method { params: Vec<Param>, optional: bool },
}

/// A property or method of a declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Declared, public-facing name.
    pub name: String,
    pub kind: MemberKind,
    /// Property type or method return type, including markers.
    pub ty: TypeRef,
    pub modes: MemberModes,
    /// Further signatures of an overloaded method, in declaration order.
    pub overloads: Vec<FunctionSig>,
    pub doc: Option<String>,
    pub directives: Vec<String>,
    /// Excluded by the configured deny-list.
    pub skipped: bool,
    pub span: Range<usize>,
}

/// Suffix appended to async variants.
pub const ASYNC_SUFFIX: &str = "_async";

impl Member {
    pub fn is_method(&self) -> bool {
        matches!(self.kind, MemberKind::Method { .. })
    }

    pub fn is_readonly(&self) -> bool {
        matches!(self.kind, MemberKind::Property { readonly: true, .. })
    }

    pub fn params(&self) -> &[Param] {
        match &self.kind {
            MemberKind::Method { params, .. } => params,
            MemberKind::Property { .. } => &[],
        }
    }

    /// Every signature of a method, the first declared one first.
    pub fn signatures(&self) -> Vec<(&[Param], &TypeRef)> {
        let mut out = vec![(self.params(), self.value_type())];
        out.extend(
            self.overloads
                .iter()
                .map(|sig| (sig.params.as_slice(), sig.ret.unwrap_markers())),
        );
        out
    }

    /// The member type without markers.
    pub fn value_type(&self) -> &TypeRef {
        self.ty.unwrap_markers()
    }

    /// The identifier generated code calls: the rename target if any.
    pub fn binding_name(&self) -> &str {
        self.modes.rename.as_deref().unwrap_or(&self.name)
    }

    pub fn async_name(&self) -> String {
        format!("{}{}", self.name, ASYNC_SUFFIX)
    }

    pub fn has_sync_form(&self) -> bool {
        self.modes.sync != SyncMode::AsyncOnly
    }

    pub fn has_async_form(&self) -> bool {
        self.modes.sync != SyncMode::Plain
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeclKind {
    #[default]
    Interface,
    /// `@Dictionary()`: plain data.
    Dictionary,
    /// `@Mixin()`
    Mixin,
}

/// `new(params): T`
#[derive(Debug, Clone, PartialEq)]
pub struct Constructor {
    pub params: Vec<Param>,
    pub ty: TypeRef,
}

/// `[key: string]: T`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedProperty {
    pub key: TypeRef,
    pub value: TypeRef,
    pub readonly: bool,
}

/// One declared interface block.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclKind,
    /// Parent name as written; linked into `parent` by the resolver.
    pub parent_symbol: Option<SymbolId>,
    pub parent: Option<DeclId>,
    pub members: Vec<Member>,
    pub doc: Option<String>,
    pub directives: Vec<String>,
    pub unit: UnitId,
    pub constructor: Option<Constructor>,
    pub indexed: Option<IndexedProperty>,
    pub span: Range<usize>,
}

impl Declaration {
    pub fn is_record(&self) -> bool {
        self.kind == DeclKind::Dictionary
    }

    /// Members that are not excluded by the deny-list.
    pub fn visible_members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| !m.skipped)
    }

    /// Every marker attached to a member, in member order.
    pub fn markers(&self) -> Vec<(&str, &Marker)> {
        self.members
            .iter()
            .flat_map(|m| m.ty.markers().into_iter().map(move |mk| (m.name.as_str(), mk)))
            .collect()
    }
}

/// `declare const name: (params) => R;`
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalFunction {
    pub name: String,
    pub sig: FunctionSig,
    pub doc: Option<String>,
    pub unit: UnitId,
}

/// Everything analyzed from one batch.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub units: Vec<SourceUnit>,
    pub symbols: SymbolTable,
    pub decls: Vec<Declaration>,
    pub functions: Vec<GlobalFunction>,
    /// Type aliases by name, expanded during linking.
    pub aliases: IndexMap<SymbolId, TypeRef>,
    alias_units: IndexMap<SymbolId, UnitId>,
    by_name: IndexMap<SymbolId, DeclId>,
}

impl Model {
    pub fn decl(&self, id: DeclId) -> &Declaration {
        &self.decls[id.index()]
    }

    pub fn decl_ids(&self) -> impl Iterator<Item = DeclId> {
        (0..self.decls.len()).map(|i| DeclId(i as u32))
    }

    pub fn lookup(&self, name: &str) -> Option<DeclId> {
        let sym = self.symbols.get(name)?;
        self.by_name.get(&sym).copied()
    }

    /// Declared names and the declarations holding them.
    pub fn declared(&self) -> impl Iterator<Item = (SymbolId, DeclId)> + '_ {
        self.by_name.iter().map(|(sym, id)| (*sym, *id))
    }

    pub fn lookup_symbol(&self, sym: SymbolId) -> Option<DeclId> {
        self.by_name.get(&sym).copied()
    }

    pub fn find(&self, name: &str) -> Option<&Declaration> {
        self.lookup(name).map(|id| self.decl(id))
    }

    /// Add a declaration. Returns the previous holder of the name, if any.
    pub fn push_decl(&mut self, decl: Declaration) -> Result<DeclId, DeclId> {
        let sym = self.symbols.intern(&decl.name);
        if let Some(existing) = self.by_name.get(&sym) {
            return Err(*existing);
        }
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        self.by_name.insert(sym, id);
        Ok(id)
    }

    /// Add a type alias declared in `unit`. Returns the unit that already
    /// declared the name, if any.
    pub fn push_alias(&mut self, name: &str, ty: TypeRef, unit: UnitId) -> Result<(), UnitId> {
        let sym = self.symbols.intern(name);
        if let Some(existing) = self.alias_units.get(&sym) {
            return Err(*existing);
        }
        self.alias_units.insert(sym, unit);
        self.aliases.insert(sym, ty);
        Ok(())
    }

    pub fn unit_of(&self, decl: &Declaration) -> &SourceUnit {
        &self.units[decl.unit]
    }

    /// Walk the parent chain from the declaration itself to the root.
    pub fn ancestry(&self, id: DeclId) -> Vec<DeclId> {
        let mut out = vec![id];
        let mut cur = self.decl(id).parent;
        while let Some(parent) = cur {
            if out.contains(&parent) {
                break;
            }
            out.push(parent);
            cur = self.decl(parent).parent;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_interning_is_stable() {
        let mut table = SymbolTable::default();
        let a = table.intern("Element");
        let b = table.intern("Node");
        assert_eq!(table.intern("Element"), a);
        assert_ne!(a, b);
        assert_eq!(table.name(b), "Node");
        assert_eq!(table.get("Missing"), None);
    }

    #[test]
    fn test_source_unit_names() {
        let unit = SourceUnit::new("html/canvas/canvas_rendering_context.d.ts", "");
        assert_eq!(unit.module, "canvas_rendering_context");
        assert_eq!(unit.implementation, "html/canvas/canvas_rendering_context");

        let root = SourceUnit::new("node.d.ts", "");
        assert_eq!(root.implementation, "node");
    }

    #[test]
    fn test_modes_from_marker_chain() {
        let ty = TypeRef::Marker(
            Marker::HostImplemented,
            Box::new(TypeRef::Marker(
                Marker::LayoutDependent,
                Box::new(TypeRef::Primitive(PrimitiveKind::Double)),
            )),
        );
        let modes = MemberModes::from_type(&ty);
        assert!(modes.host_implemented);
        assert!(modes.layout_dependent);
        assert_eq!(ty.unwrap_markers(), &TypeRef::Primitive(PrimitiveKind::Double));
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let mut model = Model::default();
        let decl = Declaration {
            name: "Foo".to_string(),
            kind: DeclKind::Interface,
            parent_symbol: None,
            parent: None,
            members: Vec::new(),
            doc: None,
            directives: Vec::new(),
            unit: 0,
            constructor: None,
            indexed: None,
            span: 0..0,
        };
        let first = model.push_decl(decl.clone()).unwrap();
        assert_eq!(model.push_decl(decl).unwrap_err(), first);
    }
}
