//! References to concepts, saved queries and imports.
//!
//! A reference points at a resource either by its node-local UUID or by its
//! universal identifier. Institutional callers use local ids; federated
//! callers use universal ids.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::urn::Urn;
use crate::user::CallerMode;

/// The kind of resource a panel item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    #[default]
    Concept,
    Query,
    Import,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concept => write!(f, "concept"),
            Self::Query => write!(f, "query"),
            Self::Import => write!(f, "import"),
        }
    }
}

/// A reference to a resource by local id or universal id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceRef {
    Id(Uuid),
    UniversalId(Urn),
}

impl ResourceRef {
    /// Parses either a UUID or a universal identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidReference`] when the input is neither.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if let Ok(id) = Uuid::parse_str(trimmed) {
            return Ok(Self::Id(id));
        }
        match Urn::parse(trimmed) {
            Ok(Some(urn)) => Ok(Self::UniversalId(urn)),
            _ => Err(CoreError::invalid_reference(input)),
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Self::Id(id) => Some(*id),
            Self::UniversalId(_) => None,
        }
    }

    pub fn universal_id(&self) -> Option<&Urn> {
        match self {
            Self::Id(_) => None,
            Self::UniversalId(urn) => Some(urn),
        }
    }

    /// Returns true if this reference uses the addressing scheme of `mode`.
    pub fn fits(&self, mode: CallerMode) -> bool {
        matches!(
            (self, mode),
            (Self::Id(_), CallerMode::Institutional) | (Self::UniversalId(_), CallerMode::Federated)
        )
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::UniversalId(urn) => write!(f, "{urn}"),
        }
    }
}

impl From<Uuid> for ResourceRef {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

impl From<Urn> for ResourceRef {
    fn from(urn: Urn) -> Self {
        Self::UniversalId(urn)
    }
}

/// Distinct resource references collected from a query definition,
/// grouped by kind and kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceRefs {
    pub concepts: IndexSet<ResourceRef>,
    pub queries: IndexSet<ResourceRef>,
    pub imports: IndexSet<ResourceRef>,
}

impl ResourceRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reference; duplicates are ignored.
    pub fn insert(&mut self, kind: ResourceKind, reference: ResourceRef) -> bool {
        match kind {
            ResourceKind::Concept => self.concepts.insert(reference),
            ResourceKind::Query => self.queries.insert(reference),
            ResourceKind::Import => self.imports.insert(reference),
        }
    }

    pub fn len(&self) -> usize {
        self.concepts.len() + self.queries.len() + self.imports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, &ResourceRef)> {
        self.concepts
            .iter()
            .map(|r| (ResourceKind::Concept, r))
            .chain(self.queries.iter().map(|r| (ResourceKind::Query, r)))
            .chain(self.imports.iter().map(|r| (ResourceKind::Import, r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid_reference() {
        let id = Uuid::new_v4();
        let r = ResourceRef::parse(&id.to_string()).unwrap();
        assert_eq!(r, ResourceRef::Id(id));
        assert_eq!(r.id(), Some(id));
        assert!(r.universal_id().is_none());
    }

    #[test]
    fn test_parse_urn_reference() {
        let r = ResourceRef::parse("urn:leaf:concept:diag:code=1").unwrap();
        assert!(r.id().is_none());
        assert_eq!(r.universal_id().unwrap().as_str(), "urn:leaf:concept:diag:code=1");
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(ResourceRef::parse("Patient/123").is_err());
        assert!(ResourceRef::parse("").is_err());
    }

    #[test]
    fn test_fits_caller_mode() {
        let local = ResourceRef::Id(Uuid::new_v4());
        let universal = ResourceRef::parse("urn:leaf:concept:x:y").unwrap();

        assert!(local.fits(CallerMode::Institutional));
        assert!(!local.fits(CallerMode::Federated));
        assert!(universal.fits(CallerMode::Federated));
        assert!(!universal.fits(CallerMode::Institutional));
    }

    #[test]
    fn test_serde_shape() {
        let id = Uuid::nil();
        let json = serde_json::to_value(ResourceRef::Id(id)).unwrap();
        assert_eq!(json, serde_json::json!({ "id": id.to_string() }));

        let back: ResourceRef =
            serde_json::from_value(serde_json::json!({ "universalId": "urn:leaf:query:abc:1" }))
                .unwrap();
        assert!(matches!(back, ResourceRef::UniversalId(_)));
    }

    #[test]
    fn test_resource_refs_dedup_and_order() {
        let a = ResourceRef::Id(Uuid::new_v4());
        let b = ResourceRef::Id(Uuid::new_v4());
        let q = ResourceRef::Id(Uuid::new_v4());

        let mut refs = ResourceRefs::new();
        assert!(refs.is_empty());
        assert!(refs.insert(ResourceKind::Concept, b.clone()));
        assert!(refs.insert(ResourceKind::Concept, a.clone()));
        assert!(!refs.insert(ResourceKind::Concept, b.clone()));
        assert!(refs.insert(ResourceKind::Query, q.clone()));

        assert_eq!(refs.len(), 3);
        let kinds: Vec<_> = refs.iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![ResourceKind::Concept, ResourceKind::Concept, ResourceKind::Query]
        );
        assert_eq!(refs.concepts.get_index(0), Some(&b));
    }
}
