//! Authorization gate in front of the resource reader.

use std::collections::HashSet;

use cohort_core::{
    CallerMode, ConceptPreflightCheckResult, ImportPreflightCheckResult, PreflightResources,
    QueryPreflightCheckResult, ResourceRef, ResourceRefs, UserContext,
};
use cohort_storage::DynPreflightReader;

use crate::error::Result;

/// Runs the preflight check and closes any gaps in the reader's answer.
///
/// Every requested reference is guaranteed a result: references the reader
/// did not answer for, and references of the wrong form for the caller's mode,
/// are reported as not present.
pub struct PreflightResourceChecker {
    reader: DynPreflightReader,
}

impl PreflightResourceChecker {
    pub fn new(reader: DynPreflightReader) -> Self {
        Self { reader }
    }

    pub async fn get_resources(&self, refs: &ResourceRefs, user: &UserContext) -> Result<PreflightResources> {
        tracing::info!(
            user = %user.username,
            mode = %user.mode,
            concepts = refs.concepts.len(),
            queries = refs.queries.len(),
            imports = refs.imports.len(),
            "running preflight resource check"
        );

        let mut resources = self.reader.check(refs, user).await?;
        close_gaps(&mut resources, refs, user.mode);

        if !resources.ok() {
            tracing::info!(
                user = %user.username,
                failures = resources.errors().len(),
                "preflight resource check failed"
            );
        }
        Ok(resources)
    }
}

fn close_gaps(resources: &mut PreflightResources, refs: &ResourceRefs, mode: CallerMode) {
    let wrong_mode = |r: &ResourceRef| !r.fits(mode);

    for result in &mut resources.concepts.results {
        if wrong_mode(&result.reference) {
            *result = ConceptPreflightCheckResult::missing(result.reference.clone());
        }
    }
    let answered: HashSet<_> = resources.concepts.results.iter().map(|r| r.reference.clone()).collect();
    for r in refs.concepts.iter().filter(|r| !answered.contains(*r)) {
        resources.concepts.results.push(ConceptPreflightCheckResult::missing(r.clone()));
    }

    for result in &mut resources.queries.results {
        if wrong_mode(&result.reference) {
            *result = QueryPreflightCheckResult::missing(result.reference.clone());
        }
    }
    let answered: HashSet<_> = resources.queries.results.iter().map(|r| r.reference.clone()).collect();
    for r in refs.queries.iter().filter(|r| !answered.contains(*r)) {
        resources.queries.results.push(QueryPreflightCheckResult::missing(r.clone()));
    }

    for result in &mut resources.imports.results {
        if wrong_mode(&result.reference) {
            *result = ImportPreflightCheckResult::missing(result.reference.clone());
        }
    }
    let answered: HashSet<_> = resources.imports.results.iter().map(|r| r.reference.clone()).collect();
    for r in refs.imports.iter().filter(|r| !answered.contains(*r)) {
        resources.imports.results.push(ImportPreflightCheckResult::missing(r.clone()));
    }
}
