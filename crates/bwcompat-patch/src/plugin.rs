//! Plugin catalog
//!
//! Stands in for an installed-package metadata index: entry points grouped by
//! name, plus the named directive collections that entry points may refer to.

use crate::directive::Directive;
use crate::error::ConfigError;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Externally declared `(group, name, value)` triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryPoint {
    /// Group the entry point is published under
    pub group: String,
    /// Entry point name
    pub name: String,
    /// Entry point value
    pub value: String,
}

impl EntryPoint {
    /// Create entry point
    #[inline]
    #[must_use]
    pub fn new(group: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Display for EntryPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} [{}]", self.name, self.value, self.group)
    }
}

/// Entry points and the directive collections they name
#[derive(Debug, Default)]
pub struct PluginCatalog {
    entry_points: RwLock<IndexMap<String, Vec<EntryPoint>>>,
    collections: RwLock<IndexMap<String, Vec<Directive>>>,
}

impl PluginCatalog {
    /// Create empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an entry point; an identical one is only kept once
    pub fn add_entry_point(&self, entry_point: EntryPoint) {
        let mut groups = self.entry_points.write();
        let group = groups.entry(entry_point.group.clone()).or_default();
        if !group.contains(&entry_point) {
            tracing::debug!(%entry_point, "publishing entry point");
            group.push(entry_point);
        }
    }

    /// Entry points in `group`, sorted by name
    #[must_use]
    pub fn entry_points(&self, group: &str) -> Option<Vec<EntryPoint>> {
        let mut found = self.entry_points.read().get(group)?.clone();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Some(found)
    }

    /// Names of the known groups
    #[must_use]
    pub fn groups(&self) -> Vec<String> {
        self.entry_points.read().keys().cloned().collect()
    }

    /// Make a ready-made directive collection available under `name`
    pub fn provide(&self, name: impl Into<String>, directives: impl IntoIterator<Item = Directive>) {
        self.collections
            .write()
            .insert(name.into(), directives.into_iter().collect());
    }

    /// Directive collection published under `name`
    ///
    /// # Errors
    /// Returns error if nothing was provided under `name`
    pub fn collection(&self, name: &str) -> Result<Vec<Directive>, ConfigError> {
        self.collections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownCollection {
                name: name.to_string(),
            })
    }

    /// Directives of the registry published as `name` in `group`
    ///
    /// # Errors
    /// Returns error listing the available names if `name` is not in
    /// `group`, or if its collection is missing
    pub fn load_registry(&self, name: &str, group: &str) -> Result<Vec<Directive>, ConfigError> {
        let entry_points = self.entry_points(group).unwrap_or_default();
        let Some(entry_point) = entry_points.iter().find(|ep| ep.name == name) else {
            return Err(ConfigError::UnknownRegistry {
                name: name.to_string(),
                group: group.to_string(),
                available: entry_points.into_iter().map(|ep| ep.name).collect(),
            });
        };
        self.collection(&entry_point.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::ModuleRedirect;
    use pretty_assertions::assert_eq;

    #[test]
    fn entry_points_sorted_and_deduplicated() {
        let catalog = PluginCatalog::new();
        catalog.add_entry_point(EntryPoint::new("g", "b", "x"));
        catalog.add_entry_point(EntryPoint::new("g", "a", "y"));
        catalog.add_entry_point(EntryPoint::new("g", "b", "x"));

        let names: Vec<_> = catalog
            .entry_points("g")
            .unwrap()
            .into_iter()
            .map(|ep| ep.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(catalog.entry_points("missing").is_none());
    }

    #[test]
    fn load_registry_lists_available() {
        let catalog = PluginCatalog::new();
        catalog.provide(
            "idaes:registry",
            [Directive::from(ModuleRedirect::new("a", Some("b")).unwrap())],
        );
        catalog.add_entry_point(EntryPoint::new("bwcompat.registries", "idaes", "idaes:registry"));

        assert_eq!(catalog.load_registry("idaes", "bwcompat.registries").unwrap().len(), 1);

        match catalog.load_registry("other", "bwcompat.registries") {
            Err(ConfigError::UnknownRegistry { available, .. }) => {
                assert_eq!(available, vec!["idaes".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_collection() {
        let catalog = PluginCatalog::new();
        assert!(matches!(
            catalog.collection("nope"),
            Err(ConfigError::UnknownCollection { .. })
        ));
    }
}
