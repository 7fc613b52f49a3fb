// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::path::{Path, PathBuf};

use crate::constant::{CONFIG_FILE_NAME, CONFIG_FILE_SUFFIX, SUPPORTED_IMAGE_FORMATS};
use crate::error::CellrunError;
use crate::ut::path::{collect_file_paths, collect_subdirectories};

/// One discovered dataset
///
/// Created by discovery and never mutated during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRecord {
    pub id: String,
    pub dir: PathBuf,
    pub image_path: PathBuf,
    pub config_path: PathBuf,
    pub output_dir: PathBuf,
}

impl DatasetRecord {
    /// Inspect a directory and build a record if it holds an image and a config
    ///
    /// The first image and first configuration file in lexicographic order
    /// are used when several are present. Unreadable directories yield `None`.
    pub fn probe(dir: &Path, output_root: &Path) -> Option<DatasetRecord> {
        let id = dir.file_name()?.to_str()?.to_string();

        let image_path = collect_file_paths(dir, SUPPORTED_IMAGE_FORMATS.as_slice(), None)
            .ok()?
            .into_iter()
            .next()?;

        let config_path = collect_file_paths(dir, &["json"], None)
            .ok()?
            .into_iter()
            .find(|path| is_config_file(path))?;

        Some(DatasetRecord {
            output_dir: output_root.join(&id),
            id,
            dir: dir.to_path_buf(),
            image_path,
            config_path,
        })
    }

    /// Path of a per-dataset artifact, `<output_dir>/<id><suffix>`
    pub fn artifact(&self, suffix: &str) -> PathBuf {
        self.output_dir.join(format!("{}{}", self.id, suffix))
    }
}

fn is_config_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name == CONFIG_FILE_NAME || name.ends_with(CONFIG_FILE_SUFFIX))
}

/// Scans an input root for dataset directories
///
/// # Examples
///
/// ```no_run
/// use cellrun_core::ds::Discovery;
///
/// let discovery = Discovery::new("input-data/", "output-data/");
/// for record in discovery.iter().unwrap() {
///     println!("{}", record.id);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Discovery {
    input_root: PathBuf,
    output_root: PathBuf,
}

impl Discovery {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(input_root: P, output_root: Q) -> Self {
        Discovery {
            input_root: input_root.as_ref().to_path_buf(),
            output_root: output_root.as_ref().to_path_buf(),
        }
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Start a new pass over the input root
    ///
    /// Only the directory listing is taken up front; each candidate is
    /// probed when the iterator reaches it. Calling `iter` again restarts
    /// discovery from a fresh listing.
    pub fn iter(&self) -> Result<DatasetIter, CellrunError> {
        if !self.input_root.is_dir() {
            return Err(CellrunError::RootError(format!(
                "Input root {} is not a readable directory",
                self.input_root.display()
            )));
        }

        let dirs = collect_subdirectories(&self.input_root)
            .map_err(|err| CellrunError::RootError(err.to_string()))?;

        Ok(DatasetIter {
            dirs: dirs.into_iter(),
            output_root: self.output_root.clone(),
        })
    }
}

/// Lazy sequence of dataset records in lexicographic order
#[derive(Debug)]
pub struct DatasetIter {
    dirs: std::vec::IntoIter<PathBuf>,
    output_root: PathBuf,
}

impl Iterator for DatasetIter {
    type Item = DatasetRecord;

    fn next(&mut self) -> Option<DatasetRecord> {
        for dir in self.dirs.by_ref() {
            if let Some(record) = DatasetRecord::probe(&dir, &self.output_root) {
                return Some(record);
            }
        }

        None
    }
}
