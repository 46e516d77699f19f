//! Hydrated panel AST.
//!
//! Panels here carry fully resolved [`Concept`]s. They are produced by the
//! hydrator, pruned and re-indexed by the validator and finally handed to a
//! compiler/executor as a [`PatientCountQuery`].

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::concept::{Concept, Specialization};
use crate::reference::ResourceRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateIncrementType {
    #[default]
    None,
    Now,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
    Specific,
}

/// One side of a panel date filter: either a relative increment or an
/// absolute (`Specific`) date.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DateBoundary {
    pub date_increment_type: DateIncrementType,
    pub increment: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

impl DateBoundary {
    pub fn specific(date: OffsetDateTime) -> Self {
        Self {
            date_increment_type: DateIncrementType::Specific,
            increment: 0,
            date: Some(date),
        }
    }

    pub fn relative(date_increment_type: DateIncrementType, increment: i32) -> Self {
        Self {
            date_increment_type,
            increment,
            date: None,
        }
    }

    pub fn is_specific(&self) -> bool {
        self.date_increment_type == DateIncrementType::Specific
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateFilter {
    pub start: DateBoundary,
    pub end: DateBoundary,
}

impl DateFilter {
    /// Both bounds as absolute dates, if both are `Specific` and set.
    pub fn specific_range(&self) -> Option<(OffsetDateTime, OffsetDateTime)> {
        if !(self.start.is_specific() && self.end.is_specific()) {
            return None;
        }
        Some((self.start.date?, self.end.date?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumericFilterType {
    #[default]
    None,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    EqualTo,
    Between,
}

impl NumericFilterType {
    /// Number of arguments the operator takes; `None` for no filter.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::Between => Some(2),
            Self::GreaterThan
            | Self::GreaterThanOrEqualTo
            | Self::LessThan
            | Self::LessThanOrEqualTo
            | Self::EqualTo => Some(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericFilter {
    pub filter_type: NumericFilterType,
    #[serde(default)]
    pub filter: Vec<f64>,
}

impl NumericFilter {
    pub fn new(filter_type: NumericFilterType, filter: impl Into<Vec<f64>>) -> Self {
        Self {
            filter_type,
            filter: filter.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecencyFilterType {
    #[default]
    None,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SequenceType {
    #[default]
    Encounter,
    Event,
    PlusMinus,
    WithinFollowing,
    AnytimeFollowing,
}

/// How a sub-panel joins to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinSequence {
    pub sequence_type: SequenceType,
    pub increment: i32,
    pub date_increment_type: DateIncrementType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PanelType {
    Patient,
    Sequence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Panel {
    pub index: i32,
    pub domain: Option<String>,
    pub include_panel: bool,
    pub date_filter: Option<DateFilter>,
    pub sub_panels: Vec<SubPanel>,
}

impl Panel {
    /// Builds a single-item inclusion or exclusion panel around `concept`.
    pub fn for_concept(index: i32, concept: Concept, include_panel: bool) -> Self {
        Self {
            index,
            domain: None,
            include_panel,
            date_filter: None,
            sub_panels: vec![SubPanel {
                panel_index: index,
                index: 0,
                include_sub_panel: true,
                minimum_count: 1,
                join_sequence: JoinSequence::default(),
                panel_items: vec![PanelItem::new(index, 0, 0, concept)],
            }],
        }
    }

    pub fn panel_type(&self) -> PanelType {
        if self.sub_panels.len() > 1 {
            PanelType::Sequence
        } else {
            PanelType::Patient
        }
    }

    pub fn is_date_filtered(&self) -> bool {
        self.date_filter.is_some()
    }

    pub fn items(&self) -> impl Iterator<Item = &PanelItem> {
        self.sub_panels.iter().flat_map(|s| s.panel_items.iter())
    }

    pub fn item_count(&self) -> usize {
        self.sub_panels.iter().map(|s| s.panel_items.len()).sum()
    }

    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.items().map(|i| &i.concept)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubPanel {
    pub panel_index: i32,
    pub index: i32,
    pub include_sub_panel: bool,
    pub minimum_count: u32,
    pub join_sequence: JoinSequence,
    pub panel_items: Vec<PanelItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelItem {
    pub panel_index: i32,
    pub sub_panel_index: i32,
    pub index: i32,
    pub concept: Concept,
    pub numeric_filter: Option<NumericFilter>,
    /// Present when the caller turned the recency filter on.
    pub recency_filter: Option<RecencyFilterType>,
    /// Specialization references as requested by the caller.
    #[serde(default)]
    pub requested_specializations: Vec<ResourceRef>,
    /// Specializations resolved against the concept during validation.
    #[serde(default)]
    pub specializations: Vec<Specialization>,
}

impl PanelItem {
    pub fn new(panel_index: i32, sub_panel_index: i32, index: i32, concept: Concept) -> Self {
        Self {
            panel_index,
            sub_panel_index,
            index,
            concept,
            numeric_filter: None,
            recency_filter: None,
            requested_specializations: Vec::new(),
            specializations: Vec::new(),
        }
    }

    pub fn uses_numeric_filter(&self) -> bool {
        self.numeric_filter
            .as_ref()
            .is_some_and(|f| f.filter_type != NumericFilterType::None)
    }

    pub fn uses_recency_filter(&self) -> bool {
        self.recency_filter.is_some()
    }

    pub fn has_specializations(&self) -> bool {
        !self.requested_specializations.is_empty()
    }
}

/// A validated, executable cohort query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientCountQuery {
    pub query_id: Option<Uuid>,
    pub panels: Vec<Panel>,
}

impl PatientCountQuery {
    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.panels.iter().flat_map(|p| p.concepts())
    }

    pub fn inclusion_panels(&self) -> impl Iterator<Item = &Panel> {
        self.panels.iter().filter(|p| p.include_panel)
    }

    pub fn exclusion_panels(&self) -> impl Iterator<Item = &Panel> {
        self.panels.iter().filter(|p| !p.include_panel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn concept() -> Concept {
        Concept::new(Uuid::new_v4(), "dbo.Diagnosis")
    }

    #[test]
    fn test_numeric_arity() {
        assert_eq!(NumericFilterType::None.arity(), None);
        assert_eq!(NumericFilterType::EqualTo.arity(), Some(1));
        assert_eq!(NumericFilterType::LessThanOrEqualTo.arity(), Some(1));
        assert_eq!(NumericFilterType::Between.arity(), Some(2));
    }

    #[test]
    fn test_specific_range_requires_both_bounds() {
        let start = datetime!(2020-01-01 0:00 UTC);
        let end = datetime!(2021-01-01 0:00 UTC);

        let both = DateFilter {
            start: DateBoundary::specific(start),
            end: DateBoundary::specific(end),
        };
        assert_eq!(both.specific_range(), Some((start, end)));

        let mixed = DateFilter {
            start: DateBoundary::specific(start),
            end: DateBoundary::relative(DateIncrementType::Now, 0),
        };
        assert_eq!(mixed.specific_range(), None);
    }

    #[test]
    fn test_panel_type_from_sub_panel_count() {
        let mut panel = Panel::for_concept(0, concept(), true);
        assert_eq!(panel.panel_type(), PanelType::Patient);

        let mut second = panel.sub_panels[0].clone();
        second.index = 1;
        panel.sub_panels.push(second);
        assert_eq!(panel.panel_type(), PanelType::Sequence);
        assert_eq!(panel.item_count(), 2);
    }

    #[test]
    fn test_filter_flags() {
        let mut item = PanelItem::new(0, 0, 0, concept());
        assert!(!item.uses_numeric_filter());
        assert!(!item.uses_recency_filter());

        item.numeric_filter = Some(NumericFilter::new(NumericFilterType::None, vec![]));
        assert!(!item.uses_numeric_filter());

        item.numeric_filter = Some(NumericFilter::new(NumericFilterType::GreaterThan, vec![5.0]));
        item.recency_filter = Some(RecencyFilterType::Max);
        assert!(item.uses_numeric_filter());
        assert!(item.uses_recency_filter());
    }

    #[test]
    fn test_query_partitions_panels() {
        let query = PatientCountQuery {
            query_id: None,
            panels: vec![
                Panel::for_concept(0, concept(), true),
                Panel::for_concept(1, concept(), false),
                Panel::for_concept(2, concept(), true),
            ],
        };
        assert_eq!(query.inclusion_panels().count(), 2);
        assert_eq!(query.exclusion_panels().count(), 1);
        assert_eq!(query.concepts().count(), 3);
    }

    #[test]
    fn test_date_boundary_serde() {
        let boundary = DateBoundary::specific(datetime!(2020-06-01 12:00 UTC));
        let json = serde_json::to_value(boundary).unwrap();
        assert_eq!(json["dateIncrementType"], "specific");
        let back: DateBoundary = serde_json::from_value(json).unwrap();
        assert_eq!(back, boundary);
    }
}
