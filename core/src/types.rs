//! Shared primitive types used across the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable agent identifier, as it appears in the `agent_code` column.
pub type AgentCode = String;

/// The canonical training-run identifier.
pub type RunId = String;

/// Performance tier assigned by the clusterer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl Tier {
    /// Tier for a 1-based composite-score rank. Rank 1 is the best cluster.
    pub fn from_rank(rank: usize) -> Option<Self> {
        match rank {
            1 => Some(Self::High),
            2 => Some(Self::Medium),
            3 => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low    => "Low",
            Self::Medium => "Medium",
            Self::High   => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Low"    => Some(Self::Low),
            "Medium" => Some(Self::Medium),
            "High"   => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
