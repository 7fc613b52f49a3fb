// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::fmt;
use std::str::FromStr;

use crate::error::CellrunError;

/// Shared-nothing split of the discovery sequence across worker processes
///
/// The dataset at sorted position `k` belongs to worker `k % count`.
///
/// # Examples
///
/// ```
/// use cellrun_core::ds::Partition;
///
/// let partition: Partition = "1/4".parse().unwrap();
/// assert!(partition.owns(5));
/// assert!(!partition.owns(4));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    index: usize,
    count: usize,
}

impl Default for Partition {
    fn default() -> Self {
        Partition { index: 0, count: 1 }
    }
}

impl Partition {
    pub fn new(index: usize, count: usize) -> Result<Partition, CellrunError> {
        if count == 0 {
            return Err(CellrunError::PartitionError(
                "Worker count must be at least 1".to_string(),
            ));
        }

        if index >= count {
            return Err(CellrunError::PartitionError(format!(
                "Worker index {} is out of range for {} workers",
                index, count
            )));
        }

        Ok(Partition { index, count })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_partitioned(&self) -> bool {
        self.count > 1
    }

    /// Whether the dataset at a sorted discovery position belongs to this worker
    pub fn owns(&self, position: usize) -> bool {
        position % self.count == self.index
    }

    /// File name of this worker's run report
    pub fn report_name(&self) -> String {
        if self.is_partitioned() {
            format!("run_report.worker-{}-of-{}.json", self.index, self.count)
        } else {
            "run_report.json".to_string()
        }
    }
}

impl FromStr for Partition {
    type Err = CellrunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CellrunError::PartitionError(format!("Found {:?}", s));

        let (index, count) = s.trim().split_once('/').ok_or_else(invalid)?;
        let index = index.trim().parse::<usize>().map_err(|_| invalid())?;
        let count = count.trim().parse::<usize>().map_err(|_| invalid())?;

        Partition::new(index, count)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}
