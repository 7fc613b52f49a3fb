// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::path::PathBuf;

use crate::constant::SKIP_MISSING_NUCLEUS;
use crate::ds::config::{Channel, DatasetConfig};
use crate::ds::discovery::DatasetRecord;
use crate::error::CellrunError;

/// Dataset that passed the guard, with everything segmentation needs
#[derive(Debug, Clone, PartialEq)]
pub struct GuardedDataset {
    pub config: DatasetConfig,
    pub image_path: PathBuf,
    pub nucleus: Channel,
    pub membrane: Option<Channel>,
}

/// Outcome of inspecting a dataset before any collaborator is invoked
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Proceed(GuardedDataset),
    Skip(String),
    Fail(CellrunError),
}

/// Inspect a dataset's configuration
///
/// A configuration without a nucleus channel is skipped before any other
/// validation; every other structural problem fails the dataset.
///
/// # Arguments
///
/// * `record` - A discovered dataset
pub fn inspect(record: &DatasetRecord) -> Verdict {
    let config = match DatasetConfig::open(&record.config_path) {
        Ok(config) => config,
        Err(err) => return Verdict::Fail(err),
    };

    let Some(nucleus) = config.channels.nucleus().cloned() else {
        return Verdict::Skip(SKIP_MISSING_NUCLEUS.to_string());
    };

    if let Err(err) = config.validate(&record.dir) {
        return Verdict::Fail(err);
    }

    let membrane = config.channels.membrane().cloned();
    let image_path = config.resolve_image(&record.dir, &record.image_path);

    Verdict::Proceed(GuardedDataset {
        config,
        image_path,
        nucleus,
        membrane,
    })
}
