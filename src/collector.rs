//! Batch-scoped collectors that deduplicate cross-file registrations.

use indexmap::{IndexMap, IndexSet};

use crate::model::TypeRef;

/// Property names, source files and bindable interfaces seen in a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefinedPropertyCollector {
    pub properties: IndexSet<String>,
    /// Implementation names of the files that declared bindable interfaces.
    pub files: IndexSet<String>,
    /// Native wrapper class names, `QJS<Name>`.
    pub interfaces: IndexSet<String>,
}

impl DefinedPropertyCollector {
    pub fn sorted_properties(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.properties.iter().map(String::as_str).collect();
        out.sort_unstable();
        out
    }

    pub fn clear(&mut self) {
        self.properties.clear();
        self.files.clear();
        self.interfaces.clear();
    }
}

/// Variant unions keyed by canonical class name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnionTypeCollector {
    types: IndexMap<String, Vec<TypeRef>>,
}

impl UnionTypeCollector {
    /// Register a union. The first registration of a name wins.
    pub fn add(&mut self, name: String, parts: Vec<TypeRef>) -> bool {
        if self.types.contains_key(&name) {
            return false;
        }
        self.types.insert(name, parts);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&[TypeRef]> {
        self.types.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Unions ordered by name.
    pub fn sorted(&self) -> Vec<(&str, &[TypeRef])> {
        let mut out: Vec<_> = self
            .types
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    pub fn clear(&mut self) {
        self.types.clear();
    }
}

/// Both collectors of one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collectors {
    pub properties: DefinedPropertyCollector,
    pub unions: UnionTypeCollector,
}

impl Collectors {
    pub fn clear(&mut self) {
        self.properties.clear();
        self.unions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.properties.properties.is_empty()
            && self.properties.interfaces.is_empty()
            && self.unions.is_empty()
    }
}
