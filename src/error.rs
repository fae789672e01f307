use serde::Serialize;
use thiserror::Error;

use crate::model::{Role, Team};

/// Failures that abort a run. Nothing is written when one of these occurs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RosterError {
    #[error("not enough candidates to fill {team} {role} (missing {missing})")]
    CapacityShortfall { team: Team, role: Role, missing: u32 },

    #[error("player '{player}' was assigned more than once")]
    DuplicateAssignment { player: String },

    #[error("{team} {role} filled {actual} slots, expected {expected}")]
    FillMismatch {
        team: Team,
        role: Role,
        expected: u32,
        actual: u32,
    },
}

impl RosterError {
    /// Shortfalls can be resolved by more signups or by permitting unfilled
    /// slots; the self-check variants point at a defect.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RosterError::CapacityShortfall { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AliasError {
    #[error("alias cycle detected starting at '{start}'")]
    Cycle { start: String },

    #[error("alias chain from '{start}' exceeds {max_depth} hops")]
    TooDeep { start: String, max_depth: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum InvalidForcedReason {
    UnknownPlayer,
    Duplicate,
    NotAMember,
    Absent,
    FilteredOut,
}

impl InvalidForcedReason {
    pub fn label(self) -> &'static str {
        match self {
            InvalidForcedReason::UnknownPlayer => "unknown_player",
            InvalidForcedReason::Duplicate => "duplicate",
            InvalidForcedReason::NotAMember => "not_in_alliance",
            InvalidForcedReason::Absent => "absent",
            InvalidForcedReason::FilteredOut => "inactive_or_filtered",
        }
    }
}

/// A problem that was handled by falling back to a default or by excluding
/// the offending entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recovered {
    ConfigDefaulted { key: String, raw: String },
    InvalidForced { player: String, reason: InvalidForcedReason },
    Overbooked { team: Team, role: Role, capacity: u32, forced: u32 },
    Unfilled { team: Team, role: Role, missing: u32 },
    DroppedEvent { event_id: String, assignees: u32 },
    SkippedRow { source: String, line: u64, reason: String },
}

impl std::fmt::Display for Recovered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recovered::ConfigDefaulted { key, raw } => {
                write!(f, "config {key}: invalid value '{raw}', using default")
            }
            Recovered::InvalidForced { player, reason } => {
                write!(f, "forced signup for '{player}' ignored ({})", reason.label())
            }
            Recovered::Overbooked {
                team,
                role,
                capacity,
                forced,
            } => write!(
                f,
                "{team} {role} overbooked: {forced} forced for {capacity} slots"
            ),
            Recovered::Unfilled {
                team,
                role,
                missing,
            } => write!(f, "{team} {role} left {missing} slots unfilled"),
            Recovered::DroppedEvent {
                event_id,
                assignees,
            } => write!(
                f,
                "event {event_id} dropped: none of {assignees} assignees attended"
            ),
            Recovered::SkippedRow {
                source,
                line,
                reason,
            } => write!(f, "{source}:{line} skipped: {reason}"),
        }
    }
}

/// Collects recovered problems for the report and logs each one as it arrives.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    warnings: Vec<Recovered>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: Recovered) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn warnings(&self) -> &[Recovered] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}
