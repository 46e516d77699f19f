//! Structural and filter checks on hydrated panels.

use cohort_core::{Panel, PanelItem, PatientCountQuery, SubPanel};

use crate::context::PanelValidationContext;
use crate::error::ValidationError;

/// Turns a hydrated context into an executable query.
///
/// Empty sub-panels and panels are dropped, every remaining item is checked
/// and panel/sub-panel indices are re-stamped. The first violation rejects
/// the whole query.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanelValidator;

impl PanelValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, ctx: PanelValidationContext) -> Result<PatientCountQuery, ValidationError> {
        if !ctx.preflight_passed() {
            tracing::warn!("refusing to validate a query that failed preflight");
            return Err(ValidationError::PreflightNotPassed);
        }

        let mut panels = Vec::with_capacity(ctx.panels.len());
        for panel in ctx.panels {
            if let Some(panel) = validate_panel(panel)? {
                panels.push(panel);
            }
        }

        Ok(PatientCountQuery {
            query_id: ctx.query_id,
            panels,
        })
    }
}

fn validate_panel(mut panel: Panel) -> Result<Option<Panel>, ValidationError> {
    panel.sub_panels.retain(|s| !s.panel_items.is_empty());
    if panel.sub_panels.is_empty() {
        tracing::debug!(panel = panel.index, "dropping empty panel");
        return Ok(None);
    }

    check_date_filter(&panel)?;

    let index = panel.index;
    for sub in &mut panel.sub_panels {
        for item in &mut sub.panel_items {
            align_specializations(index, item)?;
            check_recency_filter(index, item)?;
            check_numeric_filter(index, item)?;
        }
        restamp(index, sub);
    }
    Ok(Some(panel))
}

fn check_date_filter(panel: &Panel) -> Result<(), ValidationError> {
    let Some((start, end)) = panel.date_filter.as_ref().and_then(|f| f.specific_range()) else {
        return Ok(());
    };
    if start > end {
        tracing::warn!(panel = panel.index, %start, %end, "end date precedes start");
        return Err(ValidationError::EndDatePrecedesStart {
            panel_index: panel.index,
        });
    }
    Ok(())
}

/// Resolves each requested specialization to exactly one of the concept's.
fn align_specializations(panel_index: i32, item: &mut PanelItem) -> Result<(), ValidationError> {
    if !item.has_specializations() {
        return Ok(());
    }

    let mut resolved = Vec::with_capacity(item.requested_specializations.len());
    for reference in &item.requested_specializations {
        let matches = item.concept.find_specializations(reference);
        if matches.len() != 1 {
            tracing::warn!(
                panel = panel_index,
                item = item.index,
                concept = %item.concept.id,
                %reference,
                matches = matches.len(),
                "specialization misalignment"
            );
            return Err(ValidationError::SpecializationMisalignment {
                panel_index,
                item_index: item.index,
                reference: reference.clone(),
                matches: matches.len(),
            });
        }
        resolved.push(matches[0].clone());
    }
    item.specializations = resolved;
    Ok(())
}

fn check_recency_filter(panel_index: i32, item: &PanelItem) -> Result<(), ValidationError> {
    if item.recency_filter == Some(cohort_core::RecencyFilterType::None) {
        tracing::warn!(panel = panel_index, item = item.index, "no recency type selected");
        return Err(ValidationError::MissingRecencyType {
            panel_index,
            item_index: item.index,
        });
    }
    Ok(())
}

fn check_numeric_filter(panel_index: i32, item: &PanelItem) -> Result<(), ValidationError> {
    if !item.uses_numeric_filter() {
        return Ok(());
    }
    let Some(filter) = &item.numeric_filter else {
        return Ok(());
    };
    let Some(expected) = filter.filter_type.arity() else {
        return Ok(());
    };

    let actual = filter.filter.len();
    if actual < expected {
        tracing::warn!(
            panel = panel_index,
            item = item.index,
            filter_type = ?filter.filter_type,
            actual,
            "not enough numeric arguments"
        );
        return Err(ValidationError::MissingNumericArguments {
            panel_index,
            item_index: item.index,
            filter_type: filter.filter_type,
            expected,
            actual,
        });
    }
    if actual > expected {
        tracing::warn!(
            panel = panel_index,
            item = item.index,
            filter_type = ?filter.filter_type,
            actual,
            "too many numeric arguments"
        );
        return Err(ValidationError::ExcessiveNumericArguments {
            panel_index,
            item_index: item.index,
            filter_type: filter.filter_type,
            expected,
            actual,
        });
    }
    Ok(())
}

fn restamp(panel_index: i32, sub: &mut SubPanel) {
    sub.panel_index = panel_index;
    for item in &mut sub.panel_items {
        item.panel_index = panel_index;
        item.sub_panel_index = sub.index;
    }
}
