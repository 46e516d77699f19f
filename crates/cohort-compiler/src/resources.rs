//! Resolution of authorized resources into concepts.
//!
//! Saved queries and imports are not concepts, but panels only hold
//! concepts. Both are turned into synthetic concepts whose SQL set selects
//! from the application database's cohort and import tables.

use std::collections::HashMap;

use cohort_config::CompilerOptions;
use cohort_core::{
    Concept, ImportPreflightCheckResult, PreflightResources, QueryPreflightCheckResult, ResourceRef, Urn,
};
use uuid::Uuid;

/// Resolved concepts keyed by the reference the caller used.
pub type ConceptMap = HashMap<ResourceRef, Concept>;

/// Builds the lookup map for every passing resource.
///
/// Returns an empty map when the preflight check did not pass.
pub fn resolve_concepts(resources: &PreflightResources, opts: &CompilerOptions) -> ConceptMap {
    if !resources.ok() {
        return ConceptMap::new();
    }

    let mut map = ConceptMap::new();
    for result in resources.concepts.results.iter().filter(|r| r.ok()) {
        if let Some(concept) = &result.concept {
            map.insert(result.reference.clone(), concept.clone());
        }
    }
    for result in resources.queries.results.iter().filter(|r| r.ok()) {
        if let Some(concept) = query_concept(result, opts) {
            map.insert(result.reference.clone(), concept);
        }
    }
    for (reference, concept) in crosswalk_imports(resources, opts) {
        map.insert(reference, concept);
    }
    map
}

/// Matches import references to the checker's import results and attaches
/// the local import metadata id.
///
/// Universal references are matched on universal id, local references on
/// the import id.
pub fn crosswalk_imports(resources: &PreflightResources, opts: &CompilerOptions) -> Vec<(ResourceRef, Concept)> {
    resources
        .imports
        .results
        .iter()
        .filter(|r| r.ok())
        .filter_map(|result| {
            let matched = match &result.reference {
                ResourceRef::UniversalId(urn) => result.universal_id.as_ref() == Some(urn),
                ResourceRef::Id(id) => result.import_id == Some(*id),
            };
            if !matched {
                tracing::warn!(reference = %result.reference, "import result does not match its reference");
                return None;
            }
            import_concept(result, opts).map(|c| (result.reference.clone(), c))
        })
        .collect()
}

fn query_concept(result: &QueryPreflightCheckResult, opts: &CompilerOptions) -> Option<Concept> {
    let query_id = result.query_id?;
    let alias = format!("{}C", opts.alias);
    Some(Concept {
        id: query_id,
        universal_id: result.universal_id.clone(),
        root_id: None,
        sql_set_from: format!(
            "(SELECT {alias}.PersonId AS {person} FROM {db}.app.Cohort AS {alias} WHERE {alias}.QueryId = '{query_id}')",
            person = opts.field_person_id,
            db = opts.app_db,
        ),
        ..Concept::default()
    })
}

fn import_concept(result: &ImportPreflightCheckResult, opts: &CompilerOptions) -> Option<Concept> {
    let metadata_id = result.import_id?;
    let urn: Option<&Urn> = result.universal_id.as_ref();
    let alias = format!("{}I", opts.alias);

    let mut clauses = vec![format!("{alias}.ImportMetadataId = '{metadata_id}'")];
    let mut id = metadata_id;
    if let Some(args) = urn.and_then(Urn::import_args) {
        clauses.push(format!("{alias}.Id LIKE '{}%'", escape_literal(&args.base_segment)));
        if let Some(value) = args.value {
            clauses.push(format!("{alias}.ValueNumber = {value}"));
        }
        if let Some(modifier) = &args.modifier {
            clauses.push(format!("{alias}.SourceModifier = '{}'", escape_literal(modifier)));
        }
        id = Uuid::new_v5(&metadata_id, urn.map(Urn::as_str).unwrap_or_default().as_bytes());
    }

    Some(Concept {
        id,
        universal_id: urn.cloned(),
        is_numeric: true,
        sql_set_from: format!(
            "(SELECT {alias}.PersonId AS {person}, NULL AS {enc}, {alias}.ValueNumber, {alias}.ValueDate FROM {db}.app.Import AS {alias} WHERE {where_})",
            person = opts.field_person_id,
            enc = opts.field_encounter_id,
            db = opts.app_db,
            where_ = clauses.join(" AND "),
        ),
        sql_field_numeric: Some("ValueNumber".into()),
        sql_field_date: Some("ValueDate".into()),
        ..Concept::default()
    })
}

/// Caller text made safe inside a single-quoted SQL literal.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
