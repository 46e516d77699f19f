use serde::{Deserialize, Serialize};

/// An executable statement produced by a [`PanelCompiler`](crate::PanelCompiler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledStatement {
    /// Source panel; `None` for a statement covering the whole query.
    pub panel_index: Option<i32>,
    pub domain: Option<String>,
    pub is_inclusion: bool,
    pub sql: String,
}

impl CompiledStatement {
    pub fn for_panel(
        panel_index: i32,
        domain: Option<String>,
        is_inclusion: bool,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            panel_index: Some(panel_index),
            domain,
            is_inclusion,
            sql: sql.into(),
        }
    }

    pub fn for_query(sql: impl Into<String>) -> Self {
        Self {
            panel_index: None,
            domain: None,
            is_inclusion: true,
            sql: sql.into(),
        }
    }

    pub fn status(&self) -> &'static str {
        if self.is_inclusion { "Included" } else { "Excluded" }
    }

    /// The statement prefixed with an audit comment naming its domain and
    /// whether it includes or excludes patients.
    pub fn annotated(&self) -> String {
        let domain = self.domain.as_deref().unwrap_or("");
        format!("/* {domain} - {} */\n{}", self.status(), self.sql)
    }
}
