use std::fmt;

use serde::{Deserialize, Serialize};

/// How the caller addresses resources.
///
/// Institutional callers belong to this node and use local ids. Federated
/// callers come from a peer node and can only use universal ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerMode {
    #[default]
    Institutional,
    Federated,
}

impl CallerMode {
    pub fn is_federated(&self) -> bool {
        matches!(self, Self::Federated)
    }
}

impl fmt::Display for CallerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Institutional => write!(f, "institutional"),
            Self::Federated => write!(f, "federated"),
        }
    }
}

/// The authenticated caller a query runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub username: String,
    pub mode: CallerMode,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl UserContext {
    pub fn institutional(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            mode: CallerMode::Institutional,
            groups: Vec::new(),
            is_admin: false,
        }
    }

    pub fn federated(username: impl Into<String>) -> Self {
        Self {
            mode: CallerMode::Federated,
            ..Self::institutional(username)
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}
