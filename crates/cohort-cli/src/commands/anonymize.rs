use anyhow::{Context, Result};
use cohort_config::AppConfig;
use cohort_privacy::{Anonymizer, FieldDescriptor, MarshalPlan, RandomSalt, Row, Shape};

use super::read_json;
use crate::cli::{AnonymizeArgs, OutputFormat};
use crate::output::{print_json, print_table, print_warning};

pub fn anonymize(config: &AppConfig, args: &AnonymizeArgs, format: OutputFormat) -> Result<()> {
    let patient = &config.deidentification.patient;
    let pepper = patient
        .pepper
        .clone()
        .context("deidentification.patient.pepper must be set to anonymize records")?;
    if !patient.enabled {
        print_warning("deidentification.patient.enabled is false; anonymizing anyway");
    }

    let shape: Shape = args.shape.parse()?;
    let dynamic_fields = args
        .schema
        .as_deref()
        .map(read_json::<Vec<FieldDescriptor>>)
        .transpose()?;
    // Identifiers that cannot be masked are left out of the export.
    let schema = shape.schema(dynamic_fields)?.deidentified();
    let anonymizer = Anonymizer::new(pepper, &schema, patient.date_shifting)?;

    let rows: Vec<Row> = read_json(&args.input)?;
    let Some(first) = rows.first() else {
        print_warning("input contains no records");
        return Ok(());
    };
    let columns: Vec<&str> = first.keys().map(String::as_str).collect();
    let plan = MarshalPlan::new(&schema, &columns)?;

    let mut records = plan.marshal_all(&rows, &RandomSalt)?;
    anonymizer.anonymize_all(&mut records)?;
    tracing::info!(shape = %shape, records = records.len(), "records anonymized");

    match format {
        OutputFormat::Json => print_json(&records),
        OutputFormat::Table => {
            let names: Vec<&str> = schema.fields().iter().map(|f| f.name()).collect();
            let rows = records.iter().map(|record| {
                names
                    .iter()
                    .map(|name| serde_json::to_string(record.get(name)).unwrap_or_default())
                    .collect::<Vec<_>>()
            });
            print_table(&names, rows);
            Ok(())
        }
    }
}
