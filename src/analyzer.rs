//! Analyzer: parsed declaration files to interface-model entries (pass 1).
//!
//! Every declaration is appended to the batch [`Model`] with its named
//! references left unlinked, and the batch [`Collectors`] pick up the
//! property names, bindable interfaces and variant unions it mentions.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::collector::Collectors;
use crate::error::AnalysisError;
use crate::model::{
    Constructor, DeclKind, Declaration, FunctionSig, GlobalFunction, IndexedProperty, Member,
    MemberKind, MemberModes, Model, SourceUnit, TypeRef, UnitId,
};
use crate::parser::parse;
use crate::syntax::{IdlFile, IdlFunction, IdlInterface, IdlItem, IdlMember, IdlMemberKind};
use crate::types::TypeResolver;
use crate::unions::collect_unions;

/// Aliases that only restate the builtin numeric precision types.
const PRECISION_ALIASES: &[&str] = &["int64", "int32", "double"];

/// Options that affect analysis.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// `Interface.member` names excluded from generation.
    pub deny: HashSet<String>,
}

impl AnalyzeOptions {
    pub fn is_denied(&self, decl: &str, member: &str) -> bool {
        !self.deny.is_empty() && self.deny.contains(&format!("{decl}.{member}"))
    }
}

/// Parse a unit's text, mapping syntax errors to the unit's path.
pub fn parse_unit(unit: &SourceUnit) -> Result<IdlFile, AnalysisError> {
    parse(&unit.text).map_err(|e| AnalysisError::Syntax {
        path: unit.path.clone(),
        message: e.message,
        span: e.pos..e.pos + 1,
    })
}

/// Analyzes source units into one batch model.
pub struct Analyzer<'a> {
    model: &'a mut Model,
    collectors: &'a mut Collectors,
    options: &'a AnalyzeOptions,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        model: &'a mut Model,
        collectors: &'a mut Collectors,
        options: &'a AnalyzeOptions,
    ) -> Self {
        Self {
            model,
            collectors,
            options,
        }
    }

    /// Analyze a parsed file belonging to `model.units[unit]`.
    pub fn analyze(&mut self, unit: UnitId, file: &IdlFile) -> Result<(), AnalysisError> {
        let path = self.model.units[unit].path.clone();
        let mut declared = 0usize;

        for item in &file.items {
            match item {
                IdlItem::Interface(iface) => {
                    self.analyze_interface(unit, iface)?;
                    declared += 1;
                }
                IdlItem::TypeAlias(alias) => {
                    if PRECISION_ALIASES.contains(&alias.name.as_str()) {
                        continue;
                    }
                    let ty = TypeResolver::new(&mut self.model.symbols, &path).resolve(
                        &alias.ty,
                        &alias.name,
                        &alias.span,
                    )?;
                    collect_unions(&ty, &*self.model, &mut self.collectors.unions);
                    if let Err(first) = self.model.push_alias(&alias.name, ty, unit) {
                        return Err(AnalysisError::DuplicateDeclaration {
                            path,
                            symbol: alias.name.clone(),
                            previous: self.model.units[first].path.clone(),
                            span: alias.span.clone(),
                        });
                    }
                }
                IdlItem::Function(func) => {
                    let global = self.analyze_function(unit, func)?;
                    self.model.functions.push(global);
                }
            }
        }

        debug!(file = %path.display(), declarations = declared, "analyzed unit");
        Ok(())
    }

    fn analyze_function(
        &mut self,
        unit: UnitId,
        func: &IdlFunction,
    ) -> Result<GlobalFunction, AnalysisError> {
        let path = self.model.units[unit].path.clone();
        let mut resolver = TypeResolver::new(&mut self.model.symbols, &path);
        let params = resolver.resolve_params(&func.params, &func.name, &func.span)?;
        let ret = resolver.resolve(&func.return_type, &func.name, &func.span)?;
        let sig = FunctionSig {
            params,
            ret: Box::new(ret),
        };
        collect_unions(
            &TypeRef::Function(sig.clone()),
            &*self.model,
            &mut self.collectors.unions,
        );

        Ok(GlobalFunction {
            name: func.name.clone(),
            sig,
            doc: func.leading.doc.clone(),
            unit,
        })
    }

    fn analyze_interface(&mut self, unit: UnitId, iface: &IdlInterface) -> Result<(), AnalysisError> {
        let path = self.model.units[unit].path.clone();

        let mut kind = DeclKind::Interface;
        for decorator in &iface.leading.decorators {
            kind = match decorator.name.as_str() {
                "Dictionary" => DeclKind::Dictionary,
                "Mixin" => DeclKind::Mixin,
                other => {
                    return Err(AnalysisError::UnknownDecorator {
                        path,
                        symbol: iface.name.clone(),
                        name: other.to_string(),
                        span: decorator.span.clone(),
                    })
                }
            };
        }

        if iface.extends.len() > 1 {
            return Err(AnalysisError::MultipleParents {
                path,
                symbol: iface.name.clone(),
                span: iface.span.clone(),
            });
        }
        let parent_symbol = iface
            .extends
            .first()
            .map(|parent| self.model.symbols.intern(parent));

        let mut decl = Declaration {
            name: iface.name.clone(),
            kind,
            parent_symbol,
            parent: None,
            members: Vec::new(),
            doc: iface.leading.doc.clone(),
            directives: iface.leading.directives.clone(),
            unit,
            constructor: None,
            indexed: None,
            span: iface.span.clone(),
        };

        for member in &iface.members {
            self.analyze_member(&path, &mut decl, member)?;
        }

        check_renames(&path, &decl)?;
        self.register(&decl);

        if let Err(existing) = self.model.push_decl(decl) {
            let previous = self.model.unit_of(self.model.decl(existing)).path.clone();
            return Err(AnalysisError::DuplicateDeclaration {
                path,
                symbol: iface.name.clone(),
                previous,
                span: iface.span.clone(),
            });
        }
        Ok(())
    }

    fn analyze_member(
        &mut self,
        path: &std::path::Path,
        decl: &mut Declaration,
        member: &IdlMember,
    ) -> Result<(), AnalysisError> {
        let mut resolver = TypeResolver::new(&mut self.model.symbols, path);
        let span = &member.span;

        let (name, kind, ty) = match &member.kind {
            IdlMemberKind::Property {
                name,
                ty,
                optional,
                readonly,
            } => {
                let owner = format!("{}.{}", decl.name, name);
                let resolved = resolver.resolve_member_type(ty, &owner, span)?;
                match split_function_type(resolved) {
                    Ok((params, ret)) => (
                        name,
                        MemberKind::Method {
                            params,
                            optional: *optional,
                        },
                        ret,
                    ),
                    Err(resolved) => (
                        name,
                        MemberKind::Property {
                            readonly: *readonly,
                            optional: *optional,
                        },
                        resolved,
                    ),
                }
            }
            IdlMemberKind::Method {
                name,
                params,
                return_type,
                optional,
            } => {
                let owner = format!("{}.{}", decl.name, name);
                let params = resolver.resolve_params(params, &owner, span)?;
                let ret = resolver.resolve_member_type(return_type, &owner, span)?;
                (
                    name,
                    MemberKind::Method {
                        params,
                        optional: *optional,
                    },
                    ret,
                )
            }
            IdlMemberKind::Construct {
                params,
                return_type,
            } => {
                let owner = format!("{}.constructor", decl.name);
                decl.constructor = Some(Constructor {
                    params: resolver.resolve_params(params, &owner, span)?,
                    ty: resolver.resolve(return_type, &owner, span)?,
                });
                return Ok(());
            }
            IdlMemberKind::Index {
                key,
                value,
                readonly,
            } => {
                let owner = format!("{}[]", decl.name);
                decl.indexed = Some(IndexedProperty {
                    key: resolver.resolve(key, &owner, span)?,
                    value: resolver.resolve_member_type(value, &owner, span)?,
                    readonly: *readonly,
                });
                return Ok(());
            }
        };

        if let Some(existing) = decl.members.iter_mut().find(|m| &m.name == name) {
            let symbol = format!("{}.{}", decl.name, name);
            match (&existing.kind, kind) {
                (MemberKind::Method { .. }, MemberKind::Method { params, .. }) => {
                    debug!(%symbol, overload = existing.overloads.len() + 1, "recording overload");
                    existing.overloads.push(FunctionSig {
                        params,
                        ret: Box::new(ty),
                    });
                }
                _ => warn!(%symbol, "ignoring repeated member declaration"),
            }
            return Ok(());
        }

        let skipped = self.options.is_denied(&decl.name, name);
        if skipped {
            debug!(symbol = %format!("{}.{}", decl.name, name), "member excluded by deny list");
        }

        decl.members.push(Member {
            name: name.clone(),
            kind,
            modes: MemberModes::from_type(&ty),
            ty,
            overloads: Vec::new(),
            doc: member.leading.doc.clone(),
            directives: member.leading.directives.clone(),
            skipped,
            span: member.span.clone(),
        });
        Ok(())
    }

    fn register(&mut self, decl: &Declaration) {
        let collectors = &mut *self.collectors;

        if decl.kind == DeclKind::Interface {
            let unit = &self.model.units[decl.unit];
            collectors
                .properties
                .interfaces
                .insert(format!("QJS{}", decl.name));
            collectors
                .properties
                .files
                .insert(unit.implementation.clone());
            collectors.properties.properties.insert(decl.name.clone());
        }

        for member in decl.visible_members() {
            if !member.is_method() {
                collectors.properties.properties.insert(member.name.clone());
            }
            collect_unions(&member.ty, &*self.model, &mut collectors.unions);
            for (params, _) in member.signatures() {
                for param in params {
                    collect_unions(&param.ty, &*self.model, &mut collectors.unions);
                }
            }
            for sig in &member.overloads {
                collect_unions(&sig.ret, &*self.model, &mut collectors.unions);
            }
        }
        if let Some(ctor) = &decl.constructor {
            for param in &ctor.params {
                collect_unions(&param.ty, &*self.model, &mut collectors.unions);
            }
        }
        if let Some(indexed) = &decl.indexed {
            collect_unions(&indexed.value, &*self.model, &mut collectors.unions);
        }
    }
}

/// A property whose value is a function type becomes a method; markers
/// around the function type move to its return type.
fn split_function_type(ty: TypeRef) -> Result<(Vec<crate::model::Param>, TypeRef), TypeRef> {
    match ty {
        TypeRef::Function(sig) => Ok((sig.params, *sig.ret)),
        TypeRef::Marker(marker, inner) => match split_function_type(*inner) {
            Ok((params, ret)) => Ok((params, TypeRef::Marker(marker, Box::new(ret)))),
            Err(inner) => Err(TypeRef::Marker(marker, Box::new(inner))),
        },
        other => Err(other),
    }
}

/// A rename target may not reuse another member's declared name or another rename.
fn check_renames(path: &std::path::Path, decl: &Declaration) -> Result<(), AnalysisError> {
    let mut targets = HashSet::new();
    for member in &decl.members {
        let Some(target) = &member.modes.rename else {
            continue;
        };
        let clashes_with_member = decl
            .members
            .iter()
            .any(|other| other.name != member.name && &other.name == target);
        if clashes_with_member || !targets.insert(target.as_str()) {
            return Err(AnalysisError::RenameCollision {
                path: path.to_path_buf(),
                symbol: decl.name.clone(),
                target: target.clone(),
                span: member.span.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_src(src: &str) -> Result<(Model, Collectors), AnalysisError> {
        analyze_with(src, &AnalyzeOptions::default())
    }

    fn analyze_with(
        src: &str,
        options: &AnalyzeOptions,
    ) -> Result<(Model, Collectors), AnalysisError> {
        let mut model = Model::default();
        let mut collectors = Collectors::default();
        model.units.push(SourceUnit::new("dom/node.d.ts", src));
        let file = parse_unit(&model.units[0])?;
        Analyzer::new(&mut model, &mut collectors, options).analyze(0, &file)?;
        Ok((model, collectors))
    }

    #[test]
    fn test_members_keep_source_order() {
        let (model, _) = analyze_src(
            r#"
            interface Node {
                readonly firstChild: Node | null;
                appendChild(node: Node): Node;
                textContent: string;
            }
        "#,
        )
        .unwrap();

        let node = model.find("Node").unwrap();
        let names: Vec<_> = node.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["firstChild", "appendChild", "textContent"]);
        assert!(node.members[0].is_readonly());
        assert!(node.members[1].is_method());
    }

    #[test]
    fn test_dictionary_kind() {
        let (model, collectors) = analyze_src(
            r#"
            // @ts-ignore
            @Dictionary()
            interface ScrollOptions { top?: double; left?: double; }
        "#,
        )
        .unwrap();

        let options = model.find("ScrollOptions").unwrap();
        assert!(options.is_record());
        assert_eq!(options.directives, vec!["ts-ignore".to_string()]);
        assert!(!collectors.properties.interfaces.contains("QJSScrollOptions"));
        assert!(collectors.properties.properties.contains("top"));
    }

    #[test]
    fn test_interface_registration() {
        let (_, collectors) = analyze_src("interface Node { nodeName: string; }").unwrap();
        assert!(collectors.properties.interfaces.contains("QJSNode"));
        assert!(collectors.properties.files.contains("dom/node"));
        assert!(collectors.properties.properties.contains("nodeName"));
    }

    #[test]
    fn test_unknown_decorator() {
        let err = analyze_src("@Component() interface A {}").unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownDecorator { ref name, .. } if name == "Component"));
    }

    #[test]
    fn test_multiple_parents() {
        let err = analyze_src("interface A extends B, C {}").unwrap_err();
        assert!(matches!(err, AnalysisError::MultipleParents { .. }));
    }

    #[test]
    fn test_malformed_marker_names_symbol() {
        let err = analyze_src("interface Canvas { width: DartImpl<int64, double>; }").unwrap_err();
        match err {
            AnalysisError::MalformedMarker { path, symbol, .. } => {
                assert_eq!(path, std::path::PathBuf::from("dom/node.d.ts"));
                assert_eq!(symbol, "Canvas.width");
            }
            other => panic!("expected malformed marker, got {other:?}"),
        }
    }

    #[test]
    fn test_function_property_becomes_method() {
        let (model, _) = analyze_src("interface W { onload: (event: Event) => void; }").unwrap();
        let w = model.find("W").unwrap();
        assert!(w.members[0].is_method());
        assert_eq!(w.members[0].params().len(), 1);
    }

    #[test]
    fn test_modes() {
        let (model, _) = analyze_src(
            r#"
            interface Element {
                readonly offsetWidth: DartImpl<DependentsOnLayout<double>>;
                getBoundingClientRect(): SupportAsync<BoundingClientRect>;
                toBlob(): SupportAsyncManual<Promise<ArrayBuffer>>;
                remove(): ImplementedAs<void, 'removeNode'>;
                create(): StaticMethod<Element>;
            }
        "#,
        )
        .unwrap();

        let el = model.find("Element").unwrap();
        assert!(el.members[0].modes.host_implemented);
        assert!(el.members[0].modes.layout_dependent);
        assert!(el.members[1].has_sync_form() && el.members[1].has_async_form());
        assert!(!el.members[2].has_sync_form());
        assert_eq!(el.members[3].binding_name(), "removeNode");
        assert_eq!(el.members[3].name, "remove");
        assert!(el.members[4].modes.is_static);
        assert_eq!(el.markers().len(), 6);
    }

    #[test]
    fn test_rename_collision() {
        let err = analyze_src(
            r#"
            interface A {
                remove(): ImplementedAs<void, 'detach'>;
                detach(): void;
            }
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::RenameCollision { ref target, .. } if target == "detach"));

        let err = analyze_src(
            r#"
            interface A {
                remove(): ImplementedAs<void, 'removeNode'>;
                delete(): ImplementedAs<void, 'removeNode'>;
            }
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::RenameCollision { .. }));
    }

    #[test]
    fn test_deny_list_marks_skipped() {
        let mut options = AnalyzeOptions::default();
        options.deny.insert("Node.baseURI".to_string());
        let (model, _) = analyze_with(
            "interface Node { baseURI: string; nodeName: string; }",
            &options,
        )
        .unwrap();
        let node = model.find("Node").unwrap();
        assert!(node.members[0].skipped);
        assert!(!node.members[1].skipped);
        assert_eq!(node.visible_members().count(), 1);
    }

    #[test]
    fn test_precision_aliases_ignored() {
        let (model, _) = analyze_src("type int64 = number; type double = number; type Mode = 'a' | 'b';").unwrap();
        assert_eq!(model.aliases.len(), 1);
    }

    #[test]
    fn test_duplicate_declaration() {
        let err = analyze_src("interface A {} interface A {}").unwrap_err();
        assert!(matches!(err, AnalysisError::DuplicateDeclaration { .. }));
    }

    #[test]
    fn test_duplicate_alias_names_first_unit() {
        let mut model = Model::default();
        let mut collectors = Collectors::default();
        model.units.push(SourceUnit::new("a.d.ts", "type Mode = 'on' | 'off';"));
        model.units.push(SourceUnit::new("b.d.ts", "type Mode = 'up' | 'down';"));
        let options = AnalyzeOptions::default();
        let first = parse_unit(&model.units[0]).unwrap();
        let second = parse_unit(&model.units[1]).unwrap();
        let mut analyzer = Analyzer::new(&mut model, &mut collectors, &options);
        analyzer.analyze(0, &first).unwrap();
        let err = analyzer.analyze(1, &second).unwrap_err();
        match err {
            AnalysisError::DuplicateDeclaration {
                path,
                symbol,
                previous,
                ..
            } => {
                assert_eq!(symbol, "Mode");
                assert_eq!(path, std::path::PathBuf::from("b.d.ts"));
                assert_eq!(previous, std::path::PathBuf::from("a.d.ts"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_overloads_recorded_on_first_member() {
        let (model, _) = analyze_src(
            "interface Canvas { fill(): void; fill(rule: string): void; stroke(): void; }",
        )
        .unwrap();
        let canvas = model.find("Canvas").unwrap();
        assert_eq!(canvas.members.len(), 2);
        let fill = &canvas.members[0];
        assert_eq!(fill.overloads.len(), 1);
        assert_eq!(fill.overloads[0].params[0].name, "rule");
        let arities: Vec<usize> = fill.signatures().iter().map(|(params, _)| params.len()).collect();
        assert_eq!(arities, vec![0, 1]);
    }

    #[test]
    fn test_denied_member_not_collected() {
        let mut options = AnalyzeOptions::default();
        options.deny.insert("Node.secret".to_string());
        let (_, collectors) = analyze_with(
            "interface Node { secret: string | double; id: string; }",
            &options,
        )
        .unwrap();
        assert!(collectors.unions.is_empty());
        assert!(!collectors.properties.properties.contains("secret"));
        assert!(collectors.properties.properties.contains("id"));
    }

    #[test]
    fn test_unions_collected() {
        let (_, collectors) =
            analyze_src("interface A { value: string | double; set(v: string | double): void; }").unwrap();
        assert_eq!(collectors.unions.len(), 1);
        assert!(collectors.unions.contains("QJSUnionDomStringDouble"));
    }

    #[test]
    fn test_constructor_and_index() {
        let (model, _) = analyze_src(
            "interface Storage { new(): void; readonly [key: string]: string; clear(): void; }",
        )
        .unwrap();
        let storage = model.find("Storage").unwrap();
        assert!(storage.constructor.is_some());
        assert!(storage.indexed.as_ref().map_or(false, |i| i.readonly));
        assert_eq!(storage.members.len(), 1);
    }

    #[test]
    fn test_syntax_error_has_path() {
        let err = analyze_src("interface A { x: ; }").unwrap_err();
        assert!(matches!(err, AnalysisError::Syntax { .. }));
        assert!(err.to_string().starts_with("dom/node.d.ts"));
    }

    #[test]
    fn test_global_function() {
        let (model, _) =
            analyze_src("declare const requestAnimationFrame: (callback: Function) => double;").unwrap();
        assert_eq!(model.functions.len(), 1);
        assert_eq!(model.functions[0].name, "requestAnimationFrame");
    }
}
