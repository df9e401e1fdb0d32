use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};

/// A pipeline phase, ordered canonically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Routing,
    Drafting,
    Verifying,
    Delivered,
}

impl Phase {
    pub const CANONICAL: [Phase; 4] = [
        Phase::Routing,
        Phase::Drafting,
        Phase::Verifying,
        Phase::Delivered,
    ];

    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Routing => Some(Phase::Drafting),
            Phase::Drafting => Some(Phase::Verifying),
            Phase::Verifying => Some(Phase::Delivered),
            Phase::Delivered => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Routing => "routing",
            Phase::Drafting => "drafting",
            Phase::Verifying => "verifying",
            Phase::Delivered => "delivered",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Active,
    #[default]
    Complete,
    Failed,
}

/// One recorded step of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub status: PhaseStatus,
}

impl PhaseRecord {
    pub fn new(phase: Phase, status: PhaseStatus) -> Self {
        Self { phase, status }
    }
}
