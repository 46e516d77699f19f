//! Stub definition to hydrated panels.
//!
//! Hydration authorizes every referenced resource in one preflight call and,
//! only if all of them pass, rebuilds the definition's panels with resolved
//! concepts attached. User panel filters and site-wide global filters are
//! appended as synthetic single-item panels.

use std::collections::HashMap;

use cohort_config::CompilerOptions;
use cohort_core::{
    CallerMode, CoreError, GlobalPanelFilter, Panel, PanelDto, PanelItem, PanelItemDto, PatientCountQuery, QueryDefinition,
    ResourceRef, SubPanel, SubPanelDto, UserContext,
};
use cohort_storage::DynPreflightReader;

use crate::context::PanelValidationContext;
use crate::error::{CompilerError, Result};
use crate::preflight::PreflightResourceChecker;
use crate::resources::{ConceptMap, resolve_concepts};

/// Domain tag of panels built from user panel filters.
pub const PANEL_FILTER_DOMAIN: &str = "PanelFilter";
/// Domain tag of panels built from global panel filters.
pub const GLOBAL_FILTER_DOMAIN: &str = "GlobalPanelFilter";

pub struct PanelHydrator {
    checker: PreflightResourceChecker,
    options: CompilerOptions,
}

impl PanelHydrator {
    pub fn new(reader: DynPreflightReader, options: CompilerOptions) -> Self {
        Self {
            checker: PreflightResourceChecker::new(reader),
            options,
        }
    }

    /// Authorizes and resolves `definition` for `user`.
    ///
    /// An authorization failure is returned as a context whose
    /// [`preflight_passed`](PanelValidationContext::preflight_passed) is false
    /// and which holds no panels.
    ///
    /// # Errors
    ///
    /// Returns an error if the preflight lookup itself fails or the
    /// definition is malformed.
    pub async fn hydrate(&self, definition: &QueryDefinition, user: &UserContext) -> Result<PanelValidationContext> {
        definition.check_indices()?;
        let stubs = with_panel_filters(definition)?;

        let refs = definition.resource_refs();
        let resources = self.checker.get_resources(&refs, user).await?;
        if !resources.ok() {
            return Ok(PanelValidationContext::failed(definition.query_id, resources));
        }

        let concepts = resolve_concepts(&resources, &self.options);
        let panels = hydrate_panels(&stubs, &concepts)?;
        let merged = merge_global_filters(panels, &resources.global_panel_filters)?;

        tracing::debug!(
            user = %user.username,
            mode = %user.mode,
            panels = merged.len(),
            "hydrated query definition"
        );
        Ok(PanelValidationContext::passed(definition.query_id, resources, merged))
    }
}

/// Index of the synthetic panel following `last`.
fn next_index(last: i32) -> Result<i32> {
    last.checked_add(1)
        .ok_or_else(|| CoreError::invalid_definition("panel index overflow").into())
}

/// User panels followed by one synthetic panel per panel filter.
fn with_panel_filters(definition: &QueryDefinition) -> Result<Vec<PanelDto>> {
    let mut stubs = definition.panels.clone();
    let mut last = definition.max_panel_index();
    for filter in &definition.panel_filters {
        last = next_index(last)?;
        let mut item = PanelItemDto::concept(0, filter.concept.clone());
        item.ui_display_name = filter.ui_display_name.clone();
        stubs.push(PanelDto {
            index: last,
            domain: Some(PANEL_FILTER_DOMAIN.to_string()),
            include_panel: filter.is_inclusion,
            date_filter: None,
            sub_panels: vec![SubPanelDto {
                panel_items: vec![item],
                ..SubPanelDto::default()
            }],
        });
    }
    Ok(stubs)
}

fn hydrate_panels(stubs: &[PanelDto], concepts: &ConceptMap) -> Result<Vec<Panel>> {
    stubs
        .iter()
        .map(|dto| {
            let sub_panels = dto
                .sub_panels
                .iter()
                .map(|sub| hydrate_sub_panel(dto.index, sub, concepts))
                .collect::<Result<Vec<_>>>()?;
            Ok(Panel {
                index: dto.index,
                domain: dto.domain.clone(),
                include_panel: dto.include_panel,
                date_filter: dto.date_filter,
                sub_panels,
            })
        })
        .collect()
}

fn hydrate_sub_panel(panel_index: i32, dto: &SubPanelDto, concepts: &ConceptMap) -> Result<SubPanel> {
    let panel_items = dto
        .panel_items
        .iter()
        .map(|item| {
            let concept = concepts
                .get(&item.resource)
                .cloned()
                .ok_or_else(|| CompilerError::unresolved(item.resource.clone()))?;
            Ok(PanelItem {
                panel_index,
                sub_panel_index: dto.index,
                index: item.index,
                concept,
                numeric_filter: item.numeric_filter.clone(),
                recency_filter: item.recency_filter,
                requested_specializations: item.specializations.clone(),
                specializations: Vec::new(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SubPanel {
        panel_index,
        index: dto.index,
        include_sub_panel: dto.include_sub_panel,
        minimum_count: dto.minimum_count,
        join_sequence: dto.join_sequence,
        panel_items,
    })
}

/// Appends one panel per global filter, indexed after every existing panel.
///
/// # Errors
///
/// Returns `CoreError::InvalidDefinition` if the indices would run past
/// `i32::MAX`.
pub fn merge_global_filters(mut panels: Vec<Panel>, filters: &[GlobalPanelFilter]) -> Result<Vec<Panel>> {
    let mut last = panels.iter().map(|p| p.index).max().unwrap_or(-1);
    for filter in filters {
        last = next_index(last)?;
        let mut panel = Panel::for_concept(last, filter.to_concept(), filter.is_inclusion);
        panel.domain = Some(GLOBAL_FILTER_DOMAIN.to_string());
        panels.push(panel);
    }
    Ok(panels)
}

/// Rewrites universal references in `definition` to the local ids of the
/// concepts in `local`, keeping any caller-supplied display name.
///
/// Does nothing for institutional callers. Running it twice changes nothing
/// further.
pub fn localize_definition(definition: &mut QueryDefinition, local: &PatientCountQuery, mode: CallerMode) {
    if mode == CallerMode::Institutional {
        return;
    }

    let map: HashMap<&cohort_core::Urn, ResourceRef> = local
        .concepts()
        .filter_map(|c| c.universal_id.as_ref().map(|urn| (urn, ResourceRef::Id(c.id))))
        .collect();

    let mut replaced = 0usize;
    for item in definition.items_mut() {
        if let Some(local_ref) = item.resource.universal_id().and_then(|urn| map.get(urn)) {
            item.resource = local_ref.clone();
            replaced += 1;
        }
    }
    for filter in &mut definition.panel_filters {
        if let Some(local_ref) = filter.concept.universal_id().and_then(|urn| map.get(urn)) {
            filter.concept = local_ref.clone();
            replaced += 1;
        }
    }
    tracing::debug!(replaced, "localized federated definition");
}
