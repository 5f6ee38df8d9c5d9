//! Static resource catalog and mutual-exclusion graph.
//!
//! The graph is table-driven configuration, not derived from bookings:
//! the combined ground conflicts with each individual ground and vice-versa.
//! Adding a fourth overlapping resource is a config edit, nothing more.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::model::ResourceKey;
use crate::pricing::RateTable;

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSpec {
    pub key: ResourceKey,
    pub name: String,
    /// Resources whose reservations must be considered when checking this
    /// one's availability. Must be symmetric across the catalog.
    #[serde(default)]
    pub conflicts_with: Vec<ResourceKey>,
    #[serde(default)]
    pub rates: RateTable,
}

#[derive(Debug)]
pub enum CatalogError {
    Empty,
    Parse(String),
    Duplicate(ResourceKey),
    SelfConflict(ResourceKey),
    UnknownConflict {
        resource: ResourceKey,
        other: ResourceKey,
    },
    Asymmetric {
        resource: ResourceKey,
        other: ResourceKey,
    },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Empty => write!(f, "catalog has no resources"),
            CatalogError::Parse(e) => write!(f, "catalog parse error: {e}"),
            CatalogError::Duplicate(k) => write!(f, "duplicate resource key: {k}"),
            CatalogError::SelfConflict(k) => write!(f, "resource {k} conflicts with itself"),
            CatalogError::UnknownConflict { resource, other } => {
                write!(f, "resource {resource} conflicts with unknown resource {other}")
            }
            CatalogError::Asymmetric { resource, other } => {
                write!(
                    f,
                    "exclusion must be symmetric: {resource} lists {other}, but not the reverse"
                )
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Immutable at runtime; operator-driven pricing edits live on the engine's
/// rate map, seeded from the specs here.
#[derive(Debug)]
pub struct Catalog {
    resources: BTreeMap<ResourceKey, ResourceSpec>,
}

impl Catalog {
    pub fn new(specs: Vec<ResourceSpec>) -> Result<Self, CatalogError> {
        if specs.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut resources = BTreeMap::new();
        for spec in specs {
            if resources.contains_key(&spec.key) {
                return Err(CatalogError::Duplicate(spec.key));
            }
            resources.insert(spec.key.clone(), spec);
        }
        for (key, spec) in &resources {
            for other in &spec.conflicts_with {
                if other == key {
                    return Err(CatalogError::SelfConflict(key.clone()));
                }
                let Some(peer) = resources.get(other) else {
                    return Err(CatalogError::UnknownConflict {
                        resource: key.clone(),
                        other: other.clone(),
                    });
                };
                if !peer.conflicts_with.contains(key) {
                    return Err(CatalogError::Asymmetric {
                        resource: key.clone(),
                        other: other.clone(),
                    });
                }
            }
        }
        Ok(Self { resources })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let specs: Vec<ResourceSpec> =
            serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(specs)
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&ResourceSpec> {
        self.resources.get(key)
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.resources.contains_key(key)
    }

    /// Resource keys whose reservations must be considered when checking
    /// `key`'s availability, excluding `key` itself.
    pub fn related(&self, key: &ResourceKey) -> &[ResourceKey] {
        self.resources
            .get(key)
            .map(|s| s.conflicts_with.as_slice())
            .unwrap_or(&[])
    }

    /// `key` plus its related resources, sorted. This is the lock set for the
    /// conflict-safe booking transaction.
    pub fn group(&self, key: &ResourceKey) -> Vec<ResourceKey> {
        let mut group = vec![key.clone()];
        group.extend_from_slice(self.related(key));
        group.sort();
        group.dedup();
        group
    }

    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.resources.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceSpec> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(key: &str, conflicts: &[&str]) -> ResourceSpec {
        ResourceSpec {
            key: ResourceKey::from(key),
            name: key.to_uppercase(),
            conflicts_with: conflicts.iter().map(|c| ResourceKey::from(*c)).collect(),
            rates: RateTable::default(),
        }
    }

    fn grounds() -> Vec<ResourceSpec> {
        vec![
            spec("ground-a", &["mega"]),
            spec("ground-b", &["mega"]),
            spec("mega", &["ground-a", "ground-b"]),
        ]
    }

    #[test]
    fn related_is_table_driven() {
        let catalog = Catalog::new(grounds()).unwrap();
        let mega = ResourceKey::from("mega");
        assert_eq!(
            catalog.related(&mega),
            &[ResourceKey::from("ground-a"), ResourceKey::from("ground-b")]
        );
        assert_eq!(
            catalog.related(&ResourceKey::from("ground-a")),
            &[ResourceKey::from("mega")]
        );
    }

    #[test]
    fn individuals_do_not_conflict() {
        let catalog = Catalog::new(grounds()).unwrap();
        let related = catalog.related(&ResourceKey::from("ground-a"));
        assert!(!related.contains(&ResourceKey::from("ground-b")));
    }

    #[test]
    fn group_includes_self_sorted() {
        let catalog = Catalog::new(grounds()).unwrap();
        let group = catalog.group(&ResourceKey::from("mega"));
        assert_eq!(
            group,
            vec![
                ResourceKey::from("ground-a"),
                ResourceKey::from("ground-b"),
                ResourceKey::from("mega"),
            ]
        );
    }

    #[test]
    fn asymmetric_graph_rejected() {
        let specs = vec![spec("ground-a", &["mega"]), spec("mega", &[])];
        assert!(matches!(
            Catalog::new(specs),
            Err(CatalogError::Asymmetric { .. })
        ));
    }

    #[test]
    fn unknown_conflict_rejected() {
        let specs = vec![spec("ground-a", &["ghost"])];
        assert!(matches!(
            Catalog::new(specs),
            Err(CatalogError::UnknownConflict { .. })
        ));
    }

    #[test]
    fn self_conflict_rejected() {
        let specs = vec![spec("ground-a", &["ground-a"])];
        assert!(matches!(
            Catalog::new(specs),
            Err(CatalogError::SelfConflict(_))
        ));
    }

    #[test]
    fn empty_catalog_rejected() {
        assert!(matches!(Catalog::new(vec![]), Err(CatalogError::Empty)));
    }

    #[test]
    fn loads_from_json_blob() {
        let json = r#"[
            {"key": "ground-a", "name": "Ground A", "conflicts_with": ["mega"],
             "rates": {"weekday_first_half": 1000}},
            {"key": "ground-b", "name": "Ground B", "conflicts_with": ["mega"]},
            {"key": "mega", "name": "Mega Ground",
             "conflicts_with": ["ground-a", "ground-b"]}
        ]"#;
        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 3);
        let a = catalog.get(&ResourceKey::from("ground-a")).unwrap();
        assert_eq!(a.name, "Ground A");
    }
}
