//! Component resolver: groups `<Stem>Properties`, `<Stem>Methods` and
//! `<Stem>Events` declarations into one bindable component per stem.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::error::{UnitError, UnitFailure};
use crate::model::{DeclId, Member, Model};

/// The role a declaration plays within its family, by name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FamilyRole {
    Properties,
    Methods,
    Events,
}

impl FamilyRole {
    /// Precedence order used to pick the authoritative declaration.
    pub const ALL: [FamilyRole; 3] = [
        FamilyRole::Properties,
        FamilyRole::Methods,
        FamilyRole::Events,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            FamilyRole::Properties => "Properties",
            FamilyRole::Methods => "Methods",
            FamilyRole::Events => "Events",
        }
    }

    /// Split `FooMethods` into (`Foo`, Methods). Case-sensitive; an empty stem is not a family.
    pub fn split(name: &str) -> Option<(&str, FamilyRole)> {
        Self::ALL.iter().find_map(|role| {
            name.strip_suffix(role.suffix())
                .filter(|stem| !stem.is_empty())
                .map(|stem| (stem, *role))
        })
    }
}

/// Up to three sibling declarations sharing a stem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentFamily {
    pub stem: String,
    pub properties: Option<DeclId>,
    pub methods: Option<DeclId>,
    pub events: Option<DeclId>,
}

impl ComponentFamily {
    pub fn get(&self, role: FamilyRole) -> Option<DeclId> {
        match role {
            FamilyRole::Properties => self.properties,
            FamilyRole::Methods => self.methods,
            FamilyRole::Events => self.events,
        }
    }

    fn slot(&mut self, role: FamilyRole) -> &mut Option<DeclId> {
        match role {
            FamilyRole::Properties => &mut self.properties,
            FamilyRole::Methods => &mut self.methods,
            FamilyRole::Events => &mut self.events,
        }
    }

    /// The declaration the family's name and source derive from:
    /// Properties, else Methods, else Events.
    pub fn primary(&self) -> Option<DeclId> {
        FamilyRole::ALL.iter().find_map(|role| self.get(*role))
    }

    pub fn decls(&self) -> impl Iterator<Item = DeclId> + '_ {
        FamilyRole::ALL.iter().filter_map(|role| self.get(*role))
    }
}

/// A family with its members merged and ready for emission.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub family: ComponentFamily,
    /// Properties of the Properties and Methods declarations, first declaration wins.
    pub properties: Vec<Member>,
    /// Methods of the Properties and Methods declarations, first declaration wins.
    pub methods: Vec<Member>,
    /// Members of the Events declaration.
    pub events: Vec<Member>,
}

impl Component {
    pub fn stem(&self) -> &str {
        &self.family.stem
    }
}

/// Result of grouping a batch.
#[derive(Debug, Clone, Default)]
pub struct ComponentSet {
    /// Resolved components, ordered by stem.
    pub components: Vec<Component>,
    pub failures: Vec<UnitFailure>,
}

/// Group the batch into families.
///
/// `failed` holds declarations that could not be linked; any family
/// containing one is dropped. With `requested`, only the named stems are
/// resolved and a stem without any family declaration is reported as
/// ambiguous.
pub fn resolve_components(
    model: &Model,
    failed: &HashSet<DeclId>,
    requested: Option<&[String]>,
) -> ComponentSet {
    let families = group_families(model);
    let mut set = ComponentSet::default();

    if let Some(requested) = requested {
        for stem in requested {
            if !families.contains_key(stem.as_str()) {
                set.failures.push(UnitFailure {
                    unit: stem.clone(),
                    error: UnitError::AmbiguousComponent { stem: stem.clone() },
                });
            }
        }
    }

    for (stem, family) in families {
        if let Some(requested) = requested {
            if !requested.iter().any(|r| r == &stem) {
                continue;
            }
        }
        if family.decls().any(|id| failed.contains(&id)) {
            debug!(component = %stem, "skipping component with unresolved declarations");
            continue;
        }
        match merge_family(model, family) {
            Ok(component) => set.components.push(component),
            Err(error) => set.failures.push(UnitFailure { unit: stem, error }),
        }
    }
    set
}

/// Every family in the batch, keyed by stem.
pub fn group_families(model: &Model) -> BTreeMap<String, ComponentFamily> {
    let mut families: BTreeMap<String, ComponentFamily> = BTreeMap::new();
    for id in model.decl_ids() {
        let decl = model.decl(id);
        if decl.is_record() {
            continue;
        }
        let Some((stem, role)) = FamilyRole::split(&decl.name) else {
            continue;
        };
        let family = families
            .entry(stem.to_string())
            .or_insert_with(|| ComponentFamily {
                stem: stem.to_string(),
                ..ComponentFamily::default()
            });
        *family.slot(role) = Some(id);
    }
    families
}

/// Members of a declaration and its ancestors, root first; a redeclared name
/// in a descendant replaces the inherited one in place.
pub fn inherited_members(model: &Model, id: DeclId) -> Vec<&Member> {
    let mut out: Vec<&Member> = Vec::new();
    for ancestor in model.ancestry(id).into_iter().rev() {
        for member in model.decl(ancestor).visible_members() {
            match out.iter_mut().find(|m| m.name == member.name) {
                Some(slot) => *slot = member,
                None => out.push(member),
            }
        }
    }
    out
}

fn kind_label(member: &Member) -> &'static str {
    if member.is_method() {
        "method"
    } else {
        "property"
    }
}

fn merge_family(model: &Model, family: ComponentFamily) -> Result<Component, UnitError> {
    let mut merged: Vec<&Member> = Vec::new();

    for role in [FamilyRole::Properties, FamilyRole::Methods] {
        let Some(id) = family.get(role) else {
            continue;
        };
        for member in inherited_members(model, id) {
            match merged.iter().find(|m| m.name == member.name) {
                None => merged.push(member),
                Some(existing) if existing.is_method() == member.is_method() => {}
                Some(existing) => {
                    return Err(UnitError::DuplicateMember {
                        path: model.unit_of(model.decl(id)).path.clone(),
                        stem: family.stem.clone(),
                        member: member.name.clone(),
                        first: kind_label(existing),
                        second: kind_label(member),
                    })
                }
            }
        }
    }

    let (methods, properties): (Vec<&Member>, Vec<&Member>) =
        merged.into_iter().partition(|m| m.is_method());
    let events = family
        .events
        .map(|id| inherited_members(model, id).into_iter().cloned().collect())
        .unwrap_or_default();

    Ok(Component {
        properties: properties.into_iter().cloned().collect(),
        methods: methods.into_iter().cloned().collect(),
        events,
        family,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{parse_unit, AnalyzeOptions, Analyzer};
    use crate::collector::Collectors;
    use crate::model::SourceUnit;
    use crate::resolver::link;

    fn model_of(src: &str) -> Model {
        let mut model = Model::default();
        let mut collectors = Collectors::default();
        model.units.push(SourceUnit::new("component.d.ts", src));
        let file = parse_unit(&model.units[0]).unwrap();
        Analyzer::new(&mut model, &mut collectors, &AnalyzeOptions::default())
            .analyze(0, &file)
            .unwrap();
        link(&mut model, &mut collectors, &["Event".to_string()]).unwrap();
        model
    }

    #[test]
    fn test_split() {
        assert_eq!(
            FamilyRole::split("FooMethods"),
            Some(("Foo", FamilyRole::Methods))
        );
        assert_eq!(FamilyRole::split("Methods"), None);
        assert_eq!(FamilyRole::split("Element"), None);
    }

    #[test]
    fn test_methods_only_family() {
        let model = model_of("interface FooMethods { bar(): void; }");
        let set = resolve_components(&model, &HashSet::new(), None);
        assert_eq!(set.components.len(), 1);
        let foo = &set.components[0];
        assert_eq!(foo.stem(), "Foo");
        assert_eq!(foo.family.primary(), foo.family.methods);
        assert_eq!(foo.methods.len(), 1);
        assert_eq!(foo.methods[0].name, "bar");
    }

    #[test]
    fn test_family_grouping_and_precedence() {
        let model = model_of(
            r#"
            interface ButtonEvents { onclick: Event; }
            interface ButtonProperties { label: string; }
            interface ButtonMethods { focus(): void; }
        "#,
        );
        let set = resolve_components(&model, &HashSet::new(), None);
        let button = &set.components[0];
        assert_eq!(button.family.primary(), model.lookup("ButtonProperties"));
        assert_eq!(button.properties.len(), 1);
        assert_eq!(button.methods.len(), 1);
        assert_eq!(button.events.len(), 1);
    }

    #[test]
    fn test_case_sensitive_stems() {
        let model = model_of("interface FooMethods { a(): void; } interface fooMethods { b(): void; }");
        let set = resolve_components(&model, &HashSet::new(), None);
        let stems: Vec<_> = set.components.iter().map(|c| c.stem()).collect();
        assert_eq!(stems, vec!["Foo", "foo"]);
    }

    #[test]
    fn test_same_kind_duplicate_keeps_properties_declaration() {
        let model = model_of(
            r#"
            interface TabProperties { select(index: double): void; }
            interface TabMethods { select(): void; }
        "#,
        );
        let set = resolve_components(&model, &HashSet::new(), None);
        assert!(set.failures.is_empty());
        assert_eq!(set.components[0].methods.len(), 1);
        assert_eq!(set.components[0].methods[0].params().len(), 1);
    }

    #[test]
    fn test_conflicting_duplicate_fails_only_that_component() {
        let model = model_of(
            r#"
            interface TabProperties { select: string; }
            interface TabMethods { select(): void; }
            interface ListMethods { scroll(): void; }
        "#,
        );
        let set = resolve_components(&model, &HashSet::new(), None);
        assert_eq!(set.components.len(), 1);
        assert_eq!(set.components[0].stem(), "List");
        assert_eq!(set.failures.len(), 1);
        assert!(matches!(
            &set.failures[0].error,
            UnitError::DuplicateMember { member, first: "property", second: "method", .. } if member == "select"
        ));
    }

    #[test]
    fn test_requested_missing_stem_is_ambiguous() {
        let model = model_of("interface FooMethods { bar(): void; }");
        let requested = vec!["Foo".to_string(), "Bar".to_string()];
        let set = resolve_components(&model, &HashSet::new(), Some(&requested));
        assert_eq!(set.components.len(), 1);
        assert_eq!(
            set.failures[0].error,
            UnitError::AmbiguousComponent {
                stem: "Bar".to_string()
            }
        );
    }

    #[test]
    fn test_inherited_members() {
        let model = model_of(
            r#"
            interface BaseProperties { id: string; title: string; }
            interface CardProperties extends BaseProperties { title: string; elevation: double; }
        "#,
        );
        let card = model.lookup("CardProperties").unwrap();
        let names: Vec<_> = inherited_members(&model, card)
            .into_iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "title", "elevation"]);
    }
}
