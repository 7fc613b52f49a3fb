// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CellrunError;

/// Non-terminal stages a dataset passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovered,
    Segmenting,
    Segmented,
    Annotating,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stage::Discovered => write!(f, "DISCOVERED"),
            Stage::Segmenting => write!(f, "SEGMENTING"),
            Stage::Segmented => write!(f, "SEGMENTED"),
            Stage::Annotating => write!(f, "ANNOTATING"),
        }
    }
}

/// States from which a dataset does not move again within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalState {
    Skipped,
    GuardFailed,
    SegFailed,
    AnnFailed,
    Complete,
}

impl TerminalState {
    pub const ALL: [TerminalState; 5] = [
        TerminalState::Skipped,
        TerminalState::GuardFailed,
        TerminalState::SegFailed,
        TerminalState::AnnFailed,
        TerminalState::Complete,
    ];

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TerminalState::GuardFailed | TerminalState::SegFailed | TerminalState::AnnFailed
        )
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TerminalState::Skipped => write!(f, "SKIPPED"),
            TerminalState::GuardFailed => write!(f, "GUARD_FAILED"),
            TerminalState::SegFailed => write!(f, "SEG_FAILED"),
            TerminalState::AnnFailed => write!(f, "ANN_FAILED"),
            TerminalState::Complete => write!(f, "COMPLETE"),
        }
    }
}

/// Terminal state of one dataset with its payload
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Skipped {
        reason: String,
    },
    GuardFailed {
        error: CellrunError,
    },
    SegFailed {
        error: CellrunError,
    },
    AnnFailed {
        error: CellrunError,
        objects: usize,
        attempts: u32,
    },
    Complete {
        objects: usize,
        typed: usize,
        unclassified: usize,
        attempts: u32,
    },
}

impl Outcome {
    pub fn state(&self) -> TerminalState {
        match self {
            Outcome::Skipped { .. } => TerminalState::Skipped,
            Outcome::GuardFailed { .. } => TerminalState::GuardFailed,
            Outcome::SegFailed { .. } => TerminalState::SegFailed,
            Outcome::AnnFailed { .. } => TerminalState::AnnFailed,
            Outcome::Complete { .. } => TerminalState::Complete,
        }
    }

    pub fn error(&self) -> Option<&CellrunError> {
        match self {
            Outcome::GuardFailed { error }
            | Outcome::SegFailed { error }
            | Outcome::AnnFailed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Whether the outcome must stop the whole run
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.error(), Some(CellrunError::AnnotationAuth(_)))
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::AnnFailed { attempts, .. } | Outcome::Complete { attempts, .. } => *attempts,
            _ => 0,
        }
    }
}
