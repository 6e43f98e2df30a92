//! Pass-2 linking of named references.
//!
//! Runs once every unit of a batch has been analyzed, so declarations may
//! reference each other regardless of file order. Parent links that fail
//! abort the batch; an unresolved member type only fails its declaration.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::warn;

use crate::collector::{Collectors, UnionTypeCollector};
use crate::error::{ResolveError, UnitError, UnitFailure};
use crate::model::{
    DeclId, DeclKind, Declaration, GlobalFunction, MemberKind, Model, SymbolId, SymbolTable,
    TypeRef,
};
use crate::unions::{classify, collect_unions, union_class_name, UnionShape};

/// Outcome of linking a batch.
#[derive(Debug, Clone, Default)]
pub struct LinkReport {
    /// Declarations whose member types could not be linked.
    pub failed_decls: HashSet<DeclId>,
    /// Indices into `Model::functions` that could not be linked.
    pub failed_functions: HashSet<usize>,
    pub failures: Vec<UnitFailure>,
}

enum LinkFailure {
    Unresolved(String),
    AliasCycle(String),
}

struct Linker<'m> {
    symbols: &'m SymbolTable,
    decls: HashMap<SymbolId, (DeclId, DeclKind)>,
    aliases: &'m IndexMap<SymbolId, TypeRef>,
    linked_aliases: HashMap<SymbolId, TypeRef>,
    externs: HashSet<SymbolId>,
}

impl<'m> Linker<'m> {
    fn link(&mut self, ty: &mut TypeRef, stack: &mut Vec<SymbolId>) -> Result<(), LinkFailure> {
        match ty {
            TypeRef::Array(inner) | TypeRef::Promise(inner) | TypeRef::Marker(_, inner) => {
                self.link(inner, stack)?
            }
            TypeRef::Union(parts) => {
                for part in parts.iter_mut() {
                    self.link(part, stack)?;
                }
                // Aliased unions splice into the enclosing union.
                let flat = std::mem::take(parts)
                    .into_iter()
                    .flat_map(|p| match p {
                        TypeRef::Union(inner) => inner,
                        other => vec![other],
                    })
                    .collect();
                *parts = flat;
            }
            TypeRef::Function(sig) => {
                for param in sig.params.iter_mut() {
                    self.link(&mut param.ty, stack)?;
                }
                self.link(&mut sig.ret, stack)?;
            }
            TypeRef::Named(sym) => {
                let sym = *sym;
                *ty = self.lookup(sym, stack)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn lookup(&mut self, sym: SymbolId, stack: &mut Vec<SymbolId>) -> Result<TypeRef, LinkFailure> {
        if let Some(&(id, kind)) = self.decls.get(&sym) {
            return Ok(match kind {
                DeclKind::Dictionary => TypeRef::Record(id),
                DeclKind::Interface | DeclKind::Mixin => TypeRef::Interface(id),
            });
        }
        if let Some(linked) = self.linked_aliases.get(&sym) {
            return Ok(linked.clone());
        }
        if let Some(raw) = self.aliases.get(&sym) {
            if stack.contains(&sym) {
                return Err(LinkFailure::AliasCycle(self.symbols.name(sym).to_string()));
            }
            stack.push(sym);
            let mut linked = raw.clone();
            self.link(&mut linked, stack)?;
            stack.pop();
            self.linked_aliases.insert(sym, linked.clone());
            return Ok(linked);
        }
        if self.externs.contains(&sym) {
            return Ok(TypeRef::Extern(sym));
        }
        Err(LinkFailure::Unresolved(self.symbols.name(sym).to_string()))
    }

    fn link_all<'t>(
        &mut self,
        types: impl Iterator<Item = (&'t mut TypeRef, String)>,
    ) -> Result<Result<(), (String, String)>, ResolveError> {
        for (ty, owner) in types {
            let mut stack = Vec::new();
            match self.link(ty, &mut stack) {
                Ok(()) => {}
                Err(LinkFailure::Unresolved(name)) => return Ok(Err((owner, name))),
                Err(LinkFailure::AliasCycle(name)) => return Err(ResolveError::AliasCycle { name }),
            }
        }
        Ok(Ok(()))
    }
}

/// Link parents and member types of every declaration, then rebuild the
/// union collector from the linked types so canonical names are final.
pub fn link(
    model: &mut Model,
    collectors: &mut Collectors,
    externs: &[String],
) -> Result<LinkReport, ResolveError> {
    link_parents(model, externs)?;

    let decl_kinds: HashMap<SymbolId, (DeclId, DeclKind)> = model
        .declared()
        .map(|(sym, id)| (sym, (id, model.decl(id).kind)))
        .collect();

    let mut report = LinkReport::default();
    let mut decls = std::mem::take(&mut model.decls);
    let mut functions = std::mem::take(&mut model.functions);

    let result = {
        let mut linker = Linker {
            symbols: &model.symbols,
            decls: decl_kinds,
            aliases: &model.aliases,
            linked_aliases: HashMap::new(),
            externs: externs
                .iter()
                .filter_map(|name| model.symbols.get(name))
                .collect(),
        };

        link_declarations(&mut linker, model, &mut decls, &mut functions, &mut report)
            .map(|()| linker.linked_aliases)
    };

    model.decls = decls;
    model.functions = functions;
    let linked_aliases = result?;
    for (sym, ty) in linked_aliases {
        model.aliases.insert(sym, ty);
    }

    collectors.unions = relink_unions(model, &collectors.unions, &report);
    Ok(report)
}

fn link_declarations(
    linker: &mut Linker<'_>,
    model: &Model,
    decls: &mut [Declaration],
    functions: &mut [GlobalFunction],
    report: &mut LinkReport,
) -> Result<(), ResolveError> {
    for (index, decl) in decls.iter_mut().enumerate() {
        let decl_name = decl.name.clone();
        let mut types: Vec<(&mut TypeRef, String)> = Vec::new();
        for member in decl.members.iter_mut().filter(|m| !m.skipped) {
            let owner = format!("{}.{}", decl_name, member.name);
            if let MemberKind::Method { params, .. } = &mut member.kind {
                for param in params.iter_mut() {
                    types.push((&mut param.ty, owner.clone()));
                }
            }
            for sig in member.overloads.iter_mut() {
                for param in sig.params.iter_mut() {
                    types.push((&mut param.ty, owner.clone()));
                }
                types.push((&mut *sig.ret, owner.clone()));
            }
            types.push((&mut member.ty, owner));
        }
        if let Some(ctor) = decl.constructor.as_mut() {
            for param in ctor.params.iter_mut() {
                types.push((&mut param.ty, format!("{decl_name}.constructor")));
            }
            types.push((&mut ctor.ty, format!("{decl_name}.constructor")));
        }
        if let Some(indexed) = decl.indexed.as_mut() {
            types.push((&mut indexed.key, format!("{decl_name}[]")));
            types.push((&mut indexed.value, format!("{decl_name}[]")));
        }

        if let Err((symbol, name)) = linker.link_all(types.into_iter())? {
            let path = model.units[decl.unit].path.clone();
            warn!(file = %path.display(), %symbol, reference = %name, "unresolved type reference");
            report.failed_decls.insert(DeclId::from_index(index));
            report.failures.push(UnitFailure {
                unit: decl_name,
                error: UnitError::UnresolvedReference { path, symbol, name },
            });
        }
    }

    for (index, func) in functions.iter_mut().enumerate() {
        let name = func.name.clone();
        let mut types: Vec<(&mut TypeRef, String)> = Vec::new();
        for param in func.sig.params.iter_mut() {
            types.push((&mut param.ty, name.clone()));
        }
        types.push((&mut *func.sig.ret, name.clone()));

        if let Err((symbol, reference)) = linker.link_all(types.into_iter())? {
            let path = model.units[func.unit].path.clone();
            warn!(file = %path.display(), %symbol, %reference, "unresolved type reference");
            report.failed_functions.insert(index);
            report.failures.push(UnitFailure {
                unit: name,
                error: UnitError::UnresolvedReference {
                    path,
                    symbol,
                    name: reference,
                },
            });
        }
    }
    Ok(())
}

fn link_parents(model: &mut Model, externs: &[String]) -> Result<(), ResolveError> {
    for index in 0..model.decls.len() {
        let Some(sym) = model.decls[index].parent_symbol else {
            continue;
        };
        match model.lookup_symbol(sym) {
            Some(parent) => model.decls[index].parent = Some(parent),
            None if externs.iter().any(|e| e == model.symbols.name(sym)) => {}
            None => {
                let decl = &model.decls[index];
                return Err(ResolveError::UndeclaredParent {
                    path: model.units[decl.unit].path.clone(),
                    symbol: decl.name.clone(),
                    parent: model.symbols.name(sym).to_string(),
                    span: decl.span.clone(),
                });
            }
        }
    }

    for id in model.decl_ids() {
        let mut seen = HashSet::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            if !seen.insert(c) {
                let decl = model.decl(id);
                return Err(ResolveError::InheritanceCycle {
                    path: model.unit_of(decl).path.clone(),
                    symbol: decl.name.clone(),
                    span: decl.span.clone(),
                });
            }
            cur = model.decl(c).parent;
        }
    }
    Ok(())
}

/// Re-key the pass-1 unions after linking and add unions exposed by alias expansion.
fn relink_unions(
    model: &Model,
    pass_one: &UnionTypeCollector,
    report: &LinkReport,
) -> UnionTypeCollector {
    let mut unions = UnionTypeCollector::default();
    let mut add = |ty: &TypeRef| collect_unions(ty, model, &mut unions);

    for (id, decl) in model.decl_ids().zip(model.decls.iter()) {
        if report.failed_decls.contains(&id) {
            continue;
        }
        for member in decl.visible_members() {
            add(&member.ty);
            for (params, _) in member.signatures() {
                params.iter().for_each(|p| add(&p.ty));
            }
            member.overloads.iter().for_each(|sig| add(&sig.ret));
        }
        if let Some(ctor) = &decl.constructor {
            ctor.params.iter().for_each(|p| add(&p.ty));
        }
        if let Some(indexed) = &decl.indexed {
            add(&indexed.value);
        }
    }
    for (index, func) in model.functions.iter().enumerate() {
        if !report.failed_functions.contains(&index) {
            add(&TypeRef::Function(func.sig.clone()));
        }
    }
    for ty in model.aliases.values() {
        if !contains_unlinked(ty) {
            add(ty);
        }
    }

    // Pass-1 entries that still name a variant union after linking.
    for (_, parts) in pass_one.sorted() {
        if parts.iter().any(contains_unlinked) {
            continue;
        }
        if let UnionShape::Variant(_) = classify(parts) {
            let name = union_class_name(parts, model);
            if !unions.contains(&name) {
                unions.add(name, parts.to_vec());
            }
        }
    }
    unions
}

fn contains_unlinked(ty: &TypeRef) -> bool {
    let mut found = false;
    ty.walk(&mut |node| {
        if matches!(node, TypeRef::Named(_)) {
            found = true;
        }
    });
    found
}
