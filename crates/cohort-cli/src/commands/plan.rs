use anyhow::Result;
use cohort_config::AppConfig;
use cohort_engine::CohortPlanOutcome;
use serde_json::json;

use super::Request;
use super::count::print_preflight_errors;
use crate::cli::{OutputFormat, PlanArgs};
use crate::output::{print_json, print_table};

pub async fn plan(config: &AppConfig, args: &PlanArgs, format: OutputFormat) -> Result<()> {
    let request = Request::load(&args.caller, config)?;
    let service = request.service(config)?;

    let (query, definition) = match service.plan(&request.definition, &request.user).await? {
        CohortPlanOutcome::Planned { query, definition } => (query, definition),
        CohortPlanOutcome::PreflightFailed(errors) => {
            print_preflight_errors(&errors, format)?;
            anyhow::bail!("{} referenced resources are missing or not authorized", errors.len());
        }
    };

    match format {
        OutputFormat::Json => print_json(&json!({ "panels": query.panels, "definition": definition })),
        OutputFormat::Table => {
            let rows = query.panels.iter().flat_map(|panel| {
                panel.items().map(move |item| {
                    [
                        panel.index.to_string(),
                        panel.domain.clone().unwrap_or_default(),
                        if panel.include_panel { "include" } else { "exclude" }.to_string(),
                        item.sub_panel_index.to_string(),
                        item.concept.id.to_string(),
                        item.concept
                            .ui_display_name
                            .clone()
                            .unwrap_or_else(|| item.concept.sql_set_from.clone()),
                    ]
                })
            });
            print_table(&["Panel", "Domain", "Mode", "SubPanel", "Concept", "Name"], rows);
            Ok(())
        }
    }
}
