//! Universal resource identifiers.
//!
//! Federated callers address concepts, saved queries, imports and datasets
//! by a location-independent URN rather than by a node's local UUID.
//!
//! # Formats
//!
//! - Concept: `urn:leaf:concept:diag:codeset=ICD9+code=123.42`
//! - Query: `urn:leaf:query:<uuid>:<version>`
//! - Import: `urn:leaf:import:redcap:<project>:val=1&inst=2&mod=x`
//! - Dataset: `urn:leaf:dataset:diabetes-a1c`
//!
//! # Example
//!
//! ```
//! use cohort_core::urn::{Urn, UrnKind};
//!
//! let urn: Urn = "urn:leaf:concept:diag:codeset=ICD9+code=123.42".parse().unwrap();
//! assert_eq!(urn.kind(), UrnKind::Concept);
//! assert_eq!(urn.to_string(), "urn:leaf:concept:diag:codeset=ICD9+code=123.42");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Prefix shared by every universal identifier.
pub const URN_PREFIX: &str = "urn:leaf:";

/// The resource segment that follows [`URN_PREFIX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrnKind {
    Concept,
    Query,
    Import,
    Dataset,
}

impl UrnKind {
    pub const ALL: [UrnKind; 4] = [
        UrnKind::Concept,
        UrnKind::Query,
        UrnKind::Import,
        UrnKind::Dataset,
    ];

    pub fn segment(&self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::Query => "query",
            Self::Import => "import",
            Self::Dataset => "dataset",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.segment() == segment)
    }
}

impl fmt::Display for UrnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// A validated universal identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Urn {
    kind: UrnKind,
    value: String,
}

impl Urn {
    /// Parses a universal identifier, returning `Ok(None)` for blank input.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidUrn`] when the input is not blank but does
    /// not start with a known `urn:leaf:<kind>:` prefix.
    pub fn parse(input: &str) -> Result<Option<Self>> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let rest = trimmed
            .strip_prefix(URN_PREFIX)
            .ok_or_else(|| CoreError::invalid_urn(trimmed))?;
        let (segment, tail) = rest
            .split_once(':')
            .ok_or_else(|| CoreError::invalid_urn(trimmed))?;
        let kind = UrnKind::from_segment(segment).ok_or_else(|| CoreError::invalid_urn(trimmed))?;
        if tail.is_empty() {
            return Err(CoreError::invalid_urn(trimmed));
        }

        Ok(Some(Self {
            kind,
            value: trimmed.to_string(),
        }))
    }

    /// Parses a universal identifier that must be of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidUrn`] when the input is blank, malformed, or
    /// of a different kind.
    pub fn parse_kind(input: &str, kind: UrnKind) -> Result<Self> {
        match Self::parse(input)? {
            Some(urn) if urn.kind == kind => Ok(urn),
            _ => Err(CoreError::invalid_urn(format!(
                "{input} is not valid, {kind} identifiers must start with {URN_PREFIX}{kind}"
            ))),
        }
    }

    /// Builds the universal identifier of a saved query.
    pub fn for_query(id: Uuid, version: i32) -> Self {
        Self {
            kind: UrnKind::Query,
            value: format!("{URN_PREFIX}query:{id}:{version}"),
        }
    }

    pub fn kind(&self) -> UrnKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Everything after `urn:leaf:<kind>:`.
    pub fn body(&self) -> &str {
        let skip = URN_PREFIX.len() + self.kind.segment().len() + 1;
        &self.value[skip..]
    }

    /// Splits an import URN into its base segment and `val`/`inst`/`mod` args.
    ///
    /// Returns `None` for URNs that are not imports.
    pub fn import_args(&self) -> Option<ImportUrnArgs> {
        if self.kind != UrnKind::Import {
            return None;
        }

        let raw = self.value.as_str();
        let mut args = ImportUrnArgs {
            base_segment: raw.to_string(),
            value: None,
            instance: None,
            modifier: None,
        };

        let Some(idx) = raw.rfind(':') else {
            return Some(args);
        };
        let last = &raw[idx + 1..];
        if !last.contains('=') {
            return Some(args);
        }

        args.base_segment = raw[..idx].to_string();
        for pair in last.split('&') {
            let Some((key, val)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "val" => args.value = val.parse().ok(),
                "inst" => args.instance = val.parse().ok(),
                "mod" if !val.is_empty() => args.modifier = Some(val.to_string()),
                _ => {}
            }
        }
        Some(args)
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Urn {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)?.ok_or_else(|| CoreError::invalid_urn(s))
    }
}

impl TryFrom<String> for Urn {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Urn> for String {
    fn from(urn: Urn) -> Self {
        urn.value
    }
}

/// Arguments carried by an import URN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportUrnArgs {
    /// The URN without its trailing argument segment.
    pub base_segment: String,
    pub value: Option<i32>,
    pub instance: Option<i32>,
    pub modifier: Option<String>,
}

impl ImportUrnArgs {
    pub fn uses_modifier(&self) -> bool {
        self.modifier.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONCEPT: &str = "urn:leaf:concept:diag:codeset=ICD9+code=123.42";

    #[test]
    fn test_parse_concept_urn() {
        let urn: Urn = CONCEPT.parse().unwrap();
        assert_eq!(urn.kind(), UrnKind::Concept);
        assert_eq!(urn.to_string(), CONCEPT);
        assert_eq!(urn.body(), "diag:codeset=ICD9+code=123.42");
    }

    #[test]
    fn test_parse_query_and_dataset_urns() {
        let id = Uuid::new_v4();
        let query = format!("urn:leaf:query:{id}:12318742");
        assert_eq!(query.parse::<Urn>().unwrap().kind(), UrnKind::Query);

        let dataset: Urn = "urn:leaf:dataset:diabetes-a1c-agar-10x".parse().unwrap();
        assert_eq!(dataset.kind(), UrnKind::Dataset);
    }

    #[test]
    fn test_blank_input_is_none() {
        assert!(Urn::parse("").unwrap().is_none());
        assert!(Urn::parse("  ").unwrap().is_none());
        assert!("".parse::<Urn>().is_err());
    }

    #[test]
    fn test_unknown_or_malformed_urns_are_rejected() {
        assert!(Urn::parse("urn:leaf:test:other_stuff").is_err());
        assert!(Urn::parse("urn:leaf:").is_err());
        assert!(Urn::parse("urn:leaf:concept:").is_err());
        assert!(Urn::parse("urn:uuid:1234").is_err());
    }

    #[test]
    fn test_parse_kind_mismatch() {
        let id = Uuid::new_v4();
        let query = format!("urn:leaf:query:{id}:1");
        assert!(Urn::parse_kind(&query, UrnKind::Concept).is_err());
        assert!(Urn::parse_kind(CONCEPT, UrnKind::Query).is_err());
        assert!(Urn::parse_kind(CONCEPT, UrnKind::Concept).is_ok());
    }

    #[test]
    fn test_for_query_contains_id() {
        let id = Uuid::new_v4();
        let urn = Urn::for_query(id, 3);
        assert_eq!(urn.kind(), UrnKind::Query);
        assert!(urn.to_string().contains(&id.to_string()));
        assert!(urn.to_string().ends_with(":3"));
    }

    #[test]
    fn test_import_args_parsed() {
        let urn: Urn = "urn:leaf:import:redcap:42:val=1&inst=2&mod=baseline"
            .parse()
            .unwrap();
        let args = urn.import_args().unwrap();
        assert_eq!(args.base_segment, "urn:leaf:import:redcap:42");
        assert_eq!(args.value, Some(1));
        assert_eq!(args.instance, Some(2));
        assert_eq!(args.modifier.as_deref(), Some("baseline"));
        assert!(args.uses_modifier());
    }

    #[test]
    fn test_import_args_without_arguments() {
        let urn: Urn = "urn:leaf:import:redcap:42".parse().unwrap();
        let args = urn.import_args().unwrap();
        assert_eq!(args.base_segment, "urn:leaf:import:redcap:42");
        assert_eq!(args.value, None);
        assert!(!args.uses_modifier());

        let concept: Urn = CONCEPT.parse().unwrap();
        assert!(concept.import_args().is_none());
    }

    #[test]
    fn test_serde_as_string() {
        let urn: Urn = CONCEPT.parse().unwrap();
        let json = serde_json::to_string(&urn).unwrap();
        assert_eq!(json, format!("\"{CONCEPT}\""));

        let back: Urn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, urn);

        assert!(serde_json::from_str::<Urn>("\"urn:leaf:bogus:x\"").is_err());
    }
}
