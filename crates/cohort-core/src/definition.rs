//! Stub query definitions as submitted by a caller.
//!
//! Items only carry resource references; nothing here has been authorized
//! or resolved yet.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::panel::{DateFilter, JoinSequence, NumericFilter, RecencyFilterType};
use crate::reference::{ResourceKind, ResourceRef, ResourceRefs};
use crate::user::CallerMode;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryDefinition {
    pub query_id: Option<Uuid>,
    pub panels: Vec<PanelDto>,
    pub panel_filters: Vec<PanelFilterDto>,
}

impl QueryDefinition {
    /// Parses a definition from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::JsonError`] for malformed input and
    /// [`CoreError::InvalidDefinition`] when panel indices repeat.
    pub fn from_json(json: &str) -> Result<Self> {
        let definition: Self = serde_json::from_str(json)?;
        definition.check_indices()?;
        Ok(definition)
    }

    /// Panel indices must be unique within a query.
    pub fn check_indices(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for panel in &self.panels {
            if !seen.insert(panel.index) {
                return Err(CoreError::invalid_definition(format!(
                    "duplicate panel index {}",
                    panel.index
                )));
            }
        }
        Ok(())
    }

    pub fn items(&self) -> impl Iterator<Item = &PanelItemDto> {
        self.panels.iter().flat_map(|p| p.items())
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut PanelItemDto> {
        self.panels
            .iter_mut()
            .flat_map(|p| p.sub_panels.iter_mut())
            .flat_map(|s| s.panel_items.iter_mut())
    }

    /// Every distinct resource referenced by panel items and panel filters.
    pub fn resource_refs(&self) -> ResourceRefs {
        let mut refs = ResourceRefs::new();
        for item in self.items() {
            refs.insert(item.kind, item.resource.clone());
        }
        for filter in &self.panel_filters {
            refs.insert(ResourceKind::Concept, filter.concept.clone());
        }
        refs
    }

    /// Highest user panel index, or -1 when there are no panels.
    pub fn max_panel_index(&self) -> i32 {
        self.panels.iter().map(|p| p.index).max().unwrap_or(-1)
    }

    /// Returns true if every reference already fits `mode`.
    pub fn fits(&self, mode: CallerMode) -> bool {
        self.items().all(|i| i.resource.fits(mode))
            && self.panel_filters.iter().all(|f| f.concept.fits(mode))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelDto {
    pub index: i32,
    pub domain: Option<String>,
    pub include_panel: bool,
    pub date_filter: Option<DateFilter>,
    pub sub_panels: Vec<SubPanelDto>,
}

impl Default for PanelDto {
    fn default() -> Self {
        Self {
            index: 0,
            domain: None,
            include_panel: true,
            date_filter: None,
            sub_panels: Vec::new(),
        }
    }
}

impl PanelDto {
    pub fn items(&self) -> impl Iterator<Item = &PanelItemDto> {
        self.sub_panels.iter().flat_map(|s| s.panel_items.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubPanelDto {
    pub index: i32,
    pub include_sub_panel: bool,
    pub minimum_count: u32,
    pub join_sequence: JoinSequence,
    pub panel_items: Vec<PanelItemDto>,
}

impl Default for SubPanelDto {
    fn default() -> Self {
        Self {
            index: 0,
            include_sub_panel: true,
            minimum_count: 1,
            join_sequence: JoinSequence::default(),
            panel_items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelItemDto {
    #[serde(default)]
    pub index: i32,
    #[serde(default)]
    pub kind: ResourceKind,
    pub resource: ResourceRef,
    #[serde(default)]
    pub ui_display_name: Option<String>,
    #[serde(default)]
    pub numeric_filter: Option<NumericFilter>,
    #[serde(default)]
    pub recency_filter: Option<RecencyFilterType>,
    #[serde(default)]
    pub specializations: Vec<ResourceRef>,
}

impl PanelItemDto {
    pub fn concept(index: i32, resource: impl Into<ResourceRef>) -> Self {
        Self {
            index,
            kind: ResourceKind::Concept,
            resource: resource.into(),
            ui_display_name: None,
            numeric_filter: None,
            recency_filter: None,
            specializations: Vec::new(),
        }
    }
}

/// A user-selected filter applied to the whole query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelFilterDto {
    pub concept: ResourceRef,
    pub is_inclusion: bool,
    #[serde(default)]
    pub ui_display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = r#"{
        "panels": [
            {
                "index": 0,
                "domain": "diagnosis",
                "subPanels": [
                    {
                        "index": 0,
                        "panelItems": [
                            { "resource": { "id": "00000000-0000-0000-0000-000000000001" } },
                            { "index": 1, "kind": "query", "resource": { "id": "00000000-0000-0000-0000-000000000002" } }
                        ]
                    }
                ]
            },
            {
                "index": 1,
                "includePanel": false,
                "subPanels": [
                    {
                        "panelItems": [
                            { "resource": { "id": "00000000-0000-0000-0000-000000000001" } }
                        ]
                    }
                ]
            }
        ],
        "panelFilters": [
            { "concept": { "universalId": "urn:leaf:concept:filter:adult" }, "isInclusion": true }
        ]
    }"#;

    #[test]
    fn test_from_json_defaults() {
        let definition = QueryDefinition::from_json(DEFINITION).unwrap();
        assert_eq!(definition.panels.len(), 2);
        assert!(definition.panels[0].include_panel);
        assert!(!definition.panels[1].include_panel);

        let sub = &definition.panels[1].sub_panels[0];
        assert!(sub.include_sub_panel);
        assert_eq!(sub.minimum_count, 1);
        assert_eq!(definition.items().count(), 3);
        assert_eq!(definition.max_panel_index(), 1);
    }

    #[test]
    fn test_resource_refs_are_distinct_per_kind() {
        let definition = QueryDefinition::from_json(DEFINITION).unwrap();
        let refs = definition.resource_refs();
        assert_eq!(refs.concepts.len(), 2);
        assert_eq!(refs.queries.len(), 1);
        assert!(refs.imports.is_empty());
    }

    #[test]
    fn test_duplicate_panel_index_rejected() {
        let json = r#"{ "panels": [ { "index": 3 }, { "index": 3 } ] }"#;
        let err = QueryDefinition::from_json(json).unwrap_err();
        assert!(matches!(err, CoreError::InvalidDefinition { .. }));
    }

    #[test]
    fn test_fits_mode() {
        let definition = QueryDefinition::from_json(DEFINITION).unwrap();
        assert!(!definition.fits(CallerMode::Institutional));
        assert!(!definition.fits(CallerMode::Federated));

        let empty = QueryDefinition::default();
        assert!(empty.fits(CallerMode::Federated));
        assert_eq!(empty.max_panel_index(), -1);
    }
}
