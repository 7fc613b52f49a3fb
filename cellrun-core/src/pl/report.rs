// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CellrunError;
use crate::io::write_bytes_atomic;
use crate::pl::outcome::TerminalState;
use crate::pl::summary::DatasetSummary;

/// Why a run ended before every owned dataset was processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Halt {
    Authentication { dataset_id: String, message: String },
    Stopped,
}

/// Final report of one worker's run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub worker: String,
    pub started_at: String,
    pub finished_at: String,
    pub discovered: usize,
    pub counts: BTreeMap<TerminalState, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted: Option<Halt>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_processed: Vec<String>,
    pub datasets: Vec<DatasetSummary>,
}

impl RunReport {
    pub fn new(worker: String, started_at: String) -> Self {
        RunReport {
            worker,
            finished_at: started_at.clone(),
            started_at,
            discovered: 0,
            counts: TerminalState::ALL.iter().map(|&state| (state, 0)).collect(),
            halted: None,
            not_processed: Vec::new(),
            datasets: Vec::new(),
        }
    }

    pub fn record(&mut self, summary: DatasetSummary) {
        *self.counts.entry(summary.state).or_insert(0) += 1;
        self.datasets.push(summary);
    }

    pub fn count(&self, state: TerminalState) -> usize {
        self.counts.get(&state).copied().unwrap_or(0)
    }

    pub fn processed(&self) -> usize {
        self.datasets.len()
    }

    pub fn skipped(&self) -> usize {
        self.count(TerminalState::Skipped)
    }

    pub fn completed(&self) -> usize {
        self.count(TerminalState::Complete)
    }

    pub fn failed(&self) -> usize {
        self.datasets.iter().filter(|d| d.state.is_failure()).count()
    }

    /// Datasets that did not reach COMPLETE, in processing order
    pub fn incomplete(&self) -> impl Iterator<Item = &DatasetSummary> {
        self.datasets
            .iter()
            .filter(|d| d.state != TerminalState::Complete)
    }

    pub fn is_auth_halt(&self) -> bool {
        matches!(self.halted, Some(Halt::Authentication { .. }))
    }

    /// Plain-text lines enumerating counts and non-complete datasets
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Worker {}: discovered={} processed={}",
            self.worker,
            self.discovered,
            self.processed()
        )];

        lines.push(
            TerminalState::ALL
                .iter()
                .map(|&state| format!("{}={}", state, self.count(state)))
                .collect::<Vec<String>>()
                .join(" "),
        );

        for dataset in self.incomplete() {
            lines.push(format!(
                "{} {}: {}",
                dataset.state,
                dataset.dataset_id,
                dataset.reason().unwrap_or("")
            ));
        }

        match &self.halted {
            Some(Halt::Authentication {
                dataset_id,
                message,
            }) => lines.push(format!(
                "Run aborted at {} after an authentication failure: {}",
                dataset_id, message
            )),
            Some(Halt::Stopped) => lines.push("Run stopped before all datasets were processed".to_string()),
            None => {}
        }

        if !self.not_processed.is_empty() {
            lines.push(format!("Not processed: {}", self.not_processed.join(", ")));
        }

        lines
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CellrunError> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|err| CellrunError::OtherError(err.to_string()))?;

        write_bytes_atomic(path, &bytes)
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::pl::outcome::Outcome;

    fn report() -> RunReport {
        let mut report = RunReport::new("0/1".to_string(), "2026-01-01T00:00:00Z".to_string());
        report.discovered = 3;

        report.record(DatasetSummary::from_outcome(
            "ds1",
            &Outcome::Complete {
                objects: 4,
                typed: 4,
                unclassified: 0,
                attempts: 1,
            },
        ));
        report.record(DatasetSummary::from_outcome(
            "ds2",
            &Outcome::Skipped {
                reason: "missing nucleus channel".to_string(),
            },
        ));
        report.record(DatasetSummary::from_outcome(
            "ds3",
            &Outcome::GuardFailed {
                error: CellrunError::ConfigMalformed("bad".to_string()),
            },
        ));

        report
    }

    #[test]
    fn test_report_counts() {
        let report = report();

        assert_eq!(report.completed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.count(TerminalState::SegFailed), 0);
        assert_eq!(report.incomplete().count(), 2);
    }

    #[test]
    fn test_report_lines() {
        let lines = report().lines();

        assert_eq!(lines[0], "Worker 0/1: discovered=3 processed=3");
        assert_eq!(
            lines[1],
            "SKIPPED=1 GUARD_FAILED=1 SEG_FAILED=0 ANN_FAILED=0 COMPLETE=1"
        );
        assert!(lines[2].starts_with("SKIPPED ds2: missing nucleus channel"));
        assert!(lines[3].starts_with("GUARD_FAILED ds3"));
    }

    #[test]
    fn test_report_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_report.json");

        let mut report = report();
        report.halted = Some(Halt::Stopped);
        report.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["counts"]["COMPLETE"], 1);
        assert_eq!(value["halted"]["reason"], "stopped");
        assert_eq!(value["datasets"].as_array().unwrap().len(), 3);
    }
}
