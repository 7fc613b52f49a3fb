// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CellrunError;
use crate::io::write_bytes_atomic;
use crate::pl::outcome::{Outcome, TerminalState};

/// Current UTC time as an RFC 3339 string
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Per-dataset run summary, written once processing of the dataset ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub dataset_id: String,
    pub state: TerminalState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unclassified: Option<usize>,
    pub annotation_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub finished_at: String,
}

impl DatasetSummary {
    pub fn from_outcome(dataset_id: &str, outcome: &Outcome) -> DatasetSummary {
        let mut summary = DatasetSummary {
            dataset_id: dataset_id.to_string(),
            state: outcome.state(),
            objects: None,
            typed: None,
            unclassified: None,
            annotation_attempts: outcome.attempts(),
            skip_reason: None,
            error_kind: outcome.error().map(|err| err.kind().to_string()),
            error_message: outcome.error().map(|err| err.to_string()),
            finished_at: timestamp(),
        };

        match outcome {
            Outcome::Skipped { reason } => summary.skip_reason = Some(reason.clone()),
            Outcome::AnnFailed { objects, .. } => summary.objects = Some(*objects),
            Outcome::Complete {
                objects,
                typed,
                unclassified,
                ..
            } => {
                summary.objects = Some(*objects);
                summary.typed = Some(*typed);
                summary.unclassified = Some(*unclassified);
            }
            _ => {}
        }

        summary
    }

    /// Short human-readable reason for a non-complete dataset
    pub fn reason(&self) -> Option<&str> {
        self.error_message.as_deref().or(self.skip_reason.as_deref())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CellrunError> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|err| CellrunError::OtherError(err.to_string()))?;

        write_bytes_atomic(path, &bytes)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<DatasetSummary, CellrunError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| CellrunError::NoFileError(format!("{}: {}", path.display(), err)))?;

        serde_json::from_str(&text)
            .map_err(|err| CellrunError::OtherError(format!("{}: {}", path.display(), err)))
    }
}
