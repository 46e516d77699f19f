//! Count and cohort orchestration.

use cohort_compiler::{PanelHydrator, PanelValidator, localize_definition};
use cohort_config::{AppConfig, CohortOptions, ExecutionStrategy};
use cohort_core::{
    PatientCohort, PatientCount, PatientCountQuery, PreflightResourcesErrors, QueryDefinition, UserContext,
};
use cohort_privacy::ObfuscationService;
use cohort_storage::{
    CompiledStatement, DynCohortCache, DynPanelCompiler, DynPreflightReader, DynQueryExecutor,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::aggregator::PatientCountAggregator;
use crate::error::{CohortError, Result};
use crate::execution::{collect_patient_ids, run_parallel, run_sequential};

/// Produces the full, unobfuscated cohort for a validated query.
pub struct PatientCohortService {
    compiler: DynPanelCompiler,
    executor: DynQueryExecutor,
    options: CohortOptions,
    aggregator: PatientCountAggregator,
}

impl PatientCohortService {
    pub fn new(compiler: DynPanelCompiler, executor: DynQueryExecutor, options: CohortOptions) -> Self {
        Self {
            compiler,
            executor,
            options,
            aggregator: PatientCountAggregator::new(),
        }
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.options.strategy
    }

    /// Executes `query` with the configured strategy.
    ///
    /// The token is checked before any statement runs and again once every
    /// partial result is in; a running statement is never interrupted.
    ///
    /// # Errors
    ///
    /// `CohortError::Cancelled` if the token fired, `CohortError::ExecutionFailed`
    /// if compiling or running any statement failed.
    pub async fn cohort(&self, query: &PatientCountQuery, token: &CancellationToken) -> Result<PatientCohort> {
        if token.is_cancelled() {
            return Err(CohortError::Cancelled);
        }

        let (patient_ids, statements) = match self.options.strategy {
            ExecutionStrategy::Combined => {
                let statement = self
                    .compiler
                    .compile_query(query)
                    .map_err(CohortError::execution_failed)?;
                log_statement(&statement);
                let ids = collect_patient_ids(self.executor.as_ref(), &statement)
                    .await
                    .map_err(CohortError::execution_failed)?;
                ensure_active(token)?;
                (ids, vec![statement])
            }
            strategy => {
                let statements = query
                    .panels
                    .iter()
                    .map(|panel| self.compiler.compile_panel(panel))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(CohortError::execution_failed)?;
                statements.iter().for_each(log_statement);

                let partials = if strategy == ExecutionStrategy::Sequential {
                    run_sequential(&self.executor, &statements).await?
                } else {
                    run_parallel(&self.executor, &statements, self.options.max_parallelism).await?
                };
                ensure_active(token)?;
                (self.aggregator.aggregate(partials), statements)
            }
        };

        tracing::info!(
            strategy = ?self.options.strategy,
            statements = statements.len(),
            patients = patient_ids.len(),
            "Cohort aggregated"
        );

        Ok(PatientCohort {
            query_id: query.query_id,
            patient_ids,
            sql_statements: statements.iter().map(CompiledStatement::annotated).collect(),
        })
    }
}

fn log_statement(statement: &CompiledStatement) {
    tracing::debug!(panel = ?statement.panel_index, sql = %statement.annotated(), "Compiled statement");
}

fn ensure_active(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        tracing::info!("Cohort request cancelled before aggregation");
        return Err(CohortError::Cancelled);
    }
    Ok(())
}

/// A count ready to hand back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientCountResponse {
    /// Id of the cached unsaved query holding the cohort.
    pub query_id: Uuid,
    pub count: PatientCount,
    pub sql_statements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CohortCountOutcome {
    Counted(PatientCountResponse),
    /// Some referenced resource was missing or not authorized for the caller.
    PreflightFailed(PreflightResourcesErrors),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CohortPlanOutcome {
    Planned {
        query: PatientCountQuery,
        /// The caller's definition with references rewritten to local ids.
        definition: QueryDefinition,
    },
    PreflightFailed(PreflightResourcesErrors),
}

/// Runs a caller's definition end to end and returns a protected count.
pub struct PatientCountService {
    hydrator: PanelHydrator,
    validator: PanelValidator,
    cohorts: PatientCohortService,
    cache: DynCohortCache,
    obfuscation: ObfuscationService,
}

impl PatientCountService {
    pub fn new(
        hydrator: PanelHydrator,
        cohorts: PatientCohortService,
        cache: DynCohortCache,
        obfuscation: ObfuscationService,
    ) -> Self {
        Self {
            hydrator,
            validator: PanelValidator::new(),
            cohorts,
            cache,
            obfuscation,
        }
    }

    /// Wires the service from configuration and a set of backends.
    ///
    /// # Errors
    ///
    /// Returns `CohortError::Privacy` if the obfuscation settings would
    /// report true counts.
    pub fn from_config(
        config: &AppConfig,
        reader: DynPreflightReader,
        compiler: DynPanelCompiler,
        executor: DynQueryExecutor,
        cache: DynCohortCache,
    ) -> Result<Self> {
        Ok(Self::new(
            PanelHydrator::new(reader, config.compiler.clone()),
            PatientCohortService::new(compiler, executor, config.cohort.clone()),
            cache,
            ObfuscationService::new(config.deidentification.cohort)?,
        ))
    }

    /// Hydrates and validates without executing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if hydration or validation fails.
    pub async fn plan(&self, definition: &QueryDefinition, user: &UserContext) -> Result<CohortPlanOutcome> {
        let ctx = self.hydrator.hydrate(definition, user).await?;
        if !ctx.preflight_passed() {
            return Ok(CohortPlanOutcome::PreflightFailed(ctx.errors()));
        }
        let query = self.validator.validate(ctx)?;
        let mut localized = definition.clone();
        localize_definition(&mut localized, &query, user.mode);
        Ok(CohortPlanOutcome::Planned {
            query,
            definition: localized,
        })
    }

    /// Counts the patients matching `definition` on behalf of `user`.
    ///
    /// # Errors
    ///
    /// Validation failures, backend failures, cache failures and cancellation
    /// are returned as errors. Authorization failure is an `Ok` outcome.
    pub async fn count(
        &self,
        definition: &QueryDefinition,
        user: &UserContext,
        token: &CancellationToken,
    ) -> Result<CohortCountOutcome> {
        let ctx = self.hydrator.hydrate(definition, user).await?;
        if !ctx.preflight_passed() {
            let errors = ctx.errors();
            tracing::info!(user = %user.username, failures = errors.len(), "Count refused by preflight");
            return Ok(CohortCountOutcome::PreflightFailed(errors));
        }

        let query = self.validator.validate(ctx)?;
        let cohort = self.cohorts.cohort(&query, token).await?;

        let query_id = self
            .cache
            .create_unsaved_query(&cohort, user)
            .await
            .map_err(CohortError::CacheFailed)?;
        let count = self.obfuscation.obfuscate(cohort.count() as u64, &query);

        tracing::info!(
            user = %user.username,
            query_id = %query_id,
            under_threshold = count.under_threshold,
            "Count completed"
        );

        Ok(CohortCountOutcome::Counted(PatientCountResponse {
            query_id,
            count,
            sql_statements: cohort.sql_statements,
        }))
    }
}
