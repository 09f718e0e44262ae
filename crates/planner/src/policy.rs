use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the top-level fields of an operation are grouped into upstream requests.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionPolicy {
    /// One request per upstream, carrying every field that upstream owns.
    #[default]
    Coalesce,

    /// One request per top-level field, even when several fields share an upstream.
    Split,
}

#[derive(Debug, Error)]
#[error("Unknown partition policy '{0}', expected 'coalesce' or 'split'.")]
pub struct ParsePolicyError(String);

impl FromStr for PartitionPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coalesce" => Ok(PartitionPolicy::Coalesce),
            "split" => Ok(PartitionPolicy::Split),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

impl fmt::Display for PartitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionPolicy::Coalesce => f.write_str("coalesce"),
            PartitionPolicy::Split => f.write_str("split"),
        }
    }
}
