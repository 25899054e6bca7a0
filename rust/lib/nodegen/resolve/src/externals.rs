//! Opaque external types (symbol-table declarations, semantic types, ...).
//!
//! The resolver never inspects these; it only asks whether a name exists.

use std::collections::{BTreeSet, HashSet};

/// Confirms that an opaque external type name is known to its owner.
pub trait ExternalTypes {
    fn contains(&self, name: &str) -> bool;
}

impl ExternalTypes for BTreeSet<String> {
    fn contains(&self, name: &str) -> bool {
        BTreeSet::contains(self, name)
    }
}

impl ExternalTypes for HashSet<String> {
    fn contains(&self, name: &str) -> bool {
        HashSet::contains(self, name)
    }
}

impl<T: ExternalTypes + ?Sized> ExternalTypes for &T {
    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }
}

/// External names collected from the schema and, optionally, configuration.
#[derive(Debug, Clone, Default)]
pub struct DeclaredExternals {
    names: BTreeSet<String>,
}

impl DeclaredExternals {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl ExternalTypes for DeclaredExternals {
    fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_externals() {
        let mut ext = DeclaredExternals::new(["Type", "Location"]);
        assert!(ext.contains("Type"));
        assert!(!ext.contains("Environment"));
        ext.extend(["Environment"]);
        assert!(ext.contains("Environment"));
        assert_eq!(ext.names().collect::<Vec<_>>(), vec!["Environment", "Location", "Type"]);
    }

    #[test]
    fn std_sets() {
        let set: HashSet<String> = ["Type".to_string()].into_iter().collect();
        assert!(ExternalTypes::contains(&set, "Type"));
        let by_ref: &dyn ExternalTypes = &set;
        assert!(by_ref.contains("Type"));
    }
}
