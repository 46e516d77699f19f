//! Statement rendering for the in-memory backend.
//!
//! Statements read like the SQL a relational backend would run, but they are
//! never parsed. Each rendered text is registered with the plan that
//! evaluates it, and the executor takes plans back out by that text.

use std::collections::HashSet;

use dashmap::mapref::entry::Entry;

use cohort_core::{Concept, Panel, PanelItem, PatientCountQuery};
use cohort_storage::{CompiledStatement, PanelCompiler, StorageError};

use crate::store::InMemoryStore;

/// Evaluation plan behind a compiled statement.
#[derive(Debug, Clone)]
pub(crate) enum Plan {
    Panel(PanelPlan),
    Query {
        include: Vec<PanelPlan>,
        exclude: Vec<PanelPlan>,
    },
}

/// A registered plan and the number of compiled statements not yet executed.
#[derive(Debug)]
pub(crate) struct PendingPlan {
    pub(crate) plan: Plan,
    pending: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct PanelPlan {
    sub_panels: Vec<SubPanelPlan>,
}

#[derive(Debug, Clone)]
struct SubPanelPlan {
    include: bool,
    concepts: Vec<Concept>,
}

impl Plan {
    pub(crate) fn evaluate(&self, store: &InMemoryStore) -> HashSet<String> {
        match self {
            Self::Panel(panel) => panel.evaluate(store),
            Self::Query { include, exclude } => {
                let excluded: HashSet<String> = exclude.iter().flat_map(|p| p.evaluate(store)).collect();
                let mut included = include.iter().map(|p| p.evaluate(store));
                let Some(first) = included.next() else {
                    return HashSet::new();
                };
                let mut ids = included.fold(first, |acc, next| &acc & &next);
                ids.retain(|id| !excluded.contains(id));
                ids
            }
        }
    }
}

impl PanelPlan {
    fn evaluate(&self, store: &InMemoryStore) -> HashSet<String> {
        let matched = |sub: &SubPanelPlan| -> HashSet<String> {
            sub.concepts.iter().flat_map(|c| store.patients_for(c)).collect()
        };

        let mut included = self.sub_panels.iter().filter(|s| s.include).map(matched);
        let Some(first) = included.next() else {
            return HashSet::new();
        };
        let mut ids = included.fold(first, |acc, next| &acc & &next);
        for sub in self.sub_panels.iter().filter(|s| !s.include) {
            let excluded = matched(sub);
            ids.retain(|id| !excluded.contains(id));
        }
        ids
    }
}

impl InMemoryStore {
    /// Registers `plan` for one more execution of `sql`.
    fn register_plan(&self, sql: &str, plan: Plan) {
        self.plans
            .entry(sql.to_string())
            .and_modify(|p| p.pending += 1)
            .or_insert(PendingPlan { plan, pending: 1 });
    }

    /// Claims the plan for one execution of `sql`, dropping it after the last.
    pub(crate) fn take_plan(&self, sql: &str) -> Option<Plan> {
        match self.plans.entry(sql.to_string()) {
            Entry::Occupied(mut entry) => {
                let remaining = {
                    let pending = &mut entry.get_mut().pending;
                    *pending = pending.saturating_sub(1);
                    *pending
                };
                if remaining == 0 {
                    Some(entry.remove().plan)
                } else {
                    Some(entry.get().plan.clone())
                }
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Compiled statements that have not been executed yet.
    pub fn pending_statements(&self) -> usize {
        self.plans.iter().map(|p| p.pending).sum()
    }

    fn render_item(&self, item: &PanelItem) -> Result<String, StorageError> {
        let concept = &item.concept;
        if concept.sql_set_from.trim().is_empty() {
            return Err(StorageError::compile_error(format!(
                "concept {} has no SqlSetFrom",
                concept.id
            )));
        }

        let alias = &self.options.alias;
        let mut conditions: Vec<String> = concept
            .sql_set_where
            .iter()
            .chain(item.specializations.iter().map(|s| &s.sql_set_where))
            .map(|w| w.replace('@', alias))
            .collect();
        if let Some(field) = concept.sql_field_numeric.as_ref().filter(|_| item.uses_numeric_filter()) {
            conditions.push(format!("{} IS NOT NULL", field.replace('@', alias)));
        }

        let mut sql = format!(
            "SELECT {alias}.{} FROM {} AS {alias} /* {} */",
            self.options.field_person_id, concept.sql_set_from, concept.id
        );
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        Ok(sql)
    }

    fn plan_panel(&self, panel: &Panel) -> Result<(String, PanelPlan), StorageError> {
        if panel.item_count() == 0 {
            return Err(StorageError::compile_error(format!(
                "panel {} has no items",
                panel.index
            )));
        }

        let mut included = Vec::new();
        let mut excluded = Vec::new();
        let mut sub_panels = Vec::with_capacity(panel.sub_panels.len());
        for sub in &panel.sub_panels {
            let items = sub
                .panel_items
                .iter()
                .map(|item| self.render_item(item))
                .collect::<Result<Vec<_>, _>>()?;
            let rendered = format!("({})", items.join(" UNION "));
            if sub.include_sub_panel {
                included.push(rendered);
            } else {
                excluded.push(rendered);
            }
            sub_panels.push(SubPanelPlan {
                include: sub.include_sub_panel,
                concepts: sub.panel_items.iter().map(|i| i.concept.clone()).collect(),
            });
        }

        let mut sql = included.join(" INTERSECT ");
        for rendered in excluded {
            sql.push_str(" EXCEPT ");
            sql.push_str(&rendered);
        }
        Ok((sql, PanelPlan { sub_panels }))
    }
}

impl PanelCompiler for InMemoryStore {
    fn compile_panel(&self, panel: &Panel) -> Result<CompiledStatement, StorageError> {
        let (sql, plan) = self.plan_panel(panel)?;
        self.register_plan(&sql, Plan::Panel(plan));
        Ok(CompiledStatement::for_panel(
            panel.index,
            panel.domain.clone(),
            panel.include_panel,
            sql,
        ))
    }

    fn compile_query(&self, query: &PatientCountQuery) -> Result<CompiledStatement, StorageError> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        let mut included_sql = Vec::new();
        let mut excluded_sql = Vec::new();
        for panel in &query.panels {
            let (sql, plan) = self.plan_panel(panel)?;
            if panel.include_panel {
                included_sql.push(format!("({sql})"));
                include.push(plan);
            } else {
                excluded_sql.push(format!("({sql})"));
                exclude.push(plan);
            }
        }

        let mut sql = included_sql.join("\nINTERSECT\n");
        if !excluded_sql.is_empty() {
            sql.push_str("\nEXCEPT\n");
            sql.push_str(&excluded_sql.join("\nUNION\n"));
        }
        self.register_plan(&sql, Plan::Query { include, exclude });
        Ok(CompiledStatement::for_query(sql))
    }
}
