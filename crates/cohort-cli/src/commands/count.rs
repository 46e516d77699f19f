use anyhow::Result;
use cohort_config::AppConfig;
use cohort_core::PreflightResourcesErrors;
use cohort_engine::{CancellationToken, CohortCountOutcome};
use colored::Colorize;
use serde_json::json;

use super::Request;
use crate::cli::{CountArgs, OutputFormat};
use crate::output::{print_json, print_success, print_table};

pub async fn count(config: &AppConfig, args: &CountArgs, format: OutputFormat) -> Result<()> {
    let request = Request::load(&args.caller, config)?;
    let service = request.service(config)?;

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling count");
            on_interrupt.cancel();
        }
    });

    let response = match service.count(&request.definition, &request.user, &token).await? {
        CohortCountOutcome::Counted(response) => response,
        CohortCountOutcome::PreflightFailed(errors) => {
            print_preflight_errors(&errors, format)?;
            anyhow::bail!("{} referenced resources are missing or not authorized", errors.len());
        }
    };

    match format {
        OutputFormat::Json => {
            let mut body = json!({
                "queryId": response.query_id,
                "count": response.count,
            });
            if args.show_sql {
                body["sqlStatements"] = json!(response.sql_statements);
            }
            print_json(&body)?;
        }
        OutputFormat::Table => {
            let count = &response.count;
            let value = if count.under_threshold {
                format!("<= {}", count.value)
            } else if count.plus_minus > 0 {
                format!("{} ± {}", count.value, count.plus_minus)
            } else {
                count.value.to_string()
            };
            print_success(&format!("{} patients", value.cyan()));
            println!("{}: {}", "Query".cyan(), response.query_id);
            if args.show_sql {
                for sql in &response.sql_statements {
                    println!("{sql}\n");
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn print_preflight_errors(errors: &PreflightResourcesErrors, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(errors),
        OutputFormat::Table => {
            let concepts = errors
                .concept_errors
                .iter()
                .map(|e| ("concept", e.reference.to_string(), e.is_present, e.is_authorized));
            let queries = errors
                .query_errors
                .iter()
                .map(|e| ("query", e.reference.to_string(), e.is_present, e.is_authorized));
            let imports = errors
                .import_errors
                .iter()
                .map(|e| ("import", e.reference.to_string(), e.is_present, e.is_authorized));
            print_table(
                &["Kind", "Reference", "Present", "Authorized"],
                concepts.chain(queries).chain(imports).map(|(kind, reference, present, authorized)| {
                    [kind.to_string(), reference, present.to_string(), authorized.to_string()]
                }),
            );
            Ok(())
        }
    }
}
