// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CellrunError;
use crate::io::write_bytes_atomic;

/// Biological meaning of an image channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelRole {
    Nucleus,
    #[serde(alias = "cell")]
    Membrane,
}

impl std::fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelRole::Nucleus => write!(f, "nucleus"),
            ChannelRole::Membrane => write!(f, "membrane"),
        }
    }
}

/// A named channel and its index within the multi-channel image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub number: usize,
}

/// Mapping of channel role to channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelConfig(BTreeMap<ChannelRole, Channel>);

impl ChannelConfig {
    pub fn new() -> Self {
        ChannelConfig(BTreeMap::new())
    }

    pub fn insert(&mut self, role: ChannelRole, channel: Channel) {
        self.0.insert(role, channel);
    }

    pub fn get(&self, role: ChannelRole) -> Option<&Channel> {
        self.0.get(&role)
    }

    pub fn nucleus(&self) -> Option<&Channel> {
        self.get(ChannelRole::Nucleus)
    }

    pub fn membrane(&self) -> Option<&Channel> {
        self.get(ChannelRole::Membrane)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelRole, &Channel)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn default_use_wsi() -> bool {
    true
}

/// Per-dataset configuration file
///
/// ```json
/// {
///   "image_path": "HBM279TQRS775.ome.tiff",
///   "use_wsi": true,
///   "MPP": 0.37744,
///   "channels": {
///     "nucleus": { "name": "DAPI-02", "number": 0 },
///     "membrane": { "name": "CD45", "number": 1 }
///   },
///   "markers": [
///     { "name": "DAPI-02", "number": 0 },
///     { "name": "CD45", "number": 1 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,

    #[serde(default = "default_use_wsi")]
    pub use_wsi: bool,

    #[serde(rename = "MPP", default, skip_serializing_if = "Option::is_none")]
    pub mpp: Option<f64>,

    #[serde(default)]
    pub channels: ChannelConfig,

    #[serde(default)]
    pub markers: Vec<Channel>,
}

impl DatasetConfig {
    /// Read and parse a configuration file
    ///
    /// Any read or parse failure is reported as `ConfigMalformed`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<DatasetConfig, CellrunError> {
        let path = path.as_ref();

        let text = std::fs::read_to_string(path).map_err(|err| {
            CellrunError::ConfigMalformed(format!("{} could not be read: {}", path.display(), err))
        })?;

        Self::parse(&text)
            .map_err(|err| CellrunError::ConfigMalformed(format!("{}: {}", path.display(), err)))
    }

    pub fn parse(text: &str) -> Result<DatasetConfig, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CellrunError> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|err| CellrunError::OtherError(err.to_string()))?;

        write_bytes_atomic(path, &bytes)
    }

    /// Check structural validity, apart from the presence of a nucleus channel
    ///
    /// # Arguments
    ///
    /// * `dataset_dir` - Directory that relative image paths resolve against
    pub fn validate(&self, dataset_dir: &Path) -> Result<(), CellrunError> {
        if let Some(mpp) = self.mpp {
            if !mpp.is_finite() || mpp <= 0.0 {
                return Err(CellrunError::ConfigMalformed(format!(
                    "MPP must be a positive number, found {}",
                    mpp
                )));
            }
        }

        let mut numbers = BTreeSet::new();
        for marker in self.markers.iter() {
            if marker.name.trim().is_empty() {
                return Err(CellrunError::ConfigMalformed(format!(
                    "Marker {} has an empty name",
                    marker.number
                )));
            }

            if !numbers.insert(marker.number) {
                return Err(CellrunError::ConfigMalformed(format!(
                    "Marker number {} is listed more than once",
                    marker.number
                )));
            }
        }

        if !self.markers.is_empty() {
            for (role, channel) in self.channels.iter() {
                if !numbers.contains(&channel.number) {
                    return Err(CellrunError::ConfigMalformed(format!(
                        "The {} channel {} (number {}) is not one of the {} markers",
                        role,
                        channel.name,
                        channel.number,
                        self.markers.len()
                    )));
                }
            }
        }

        if let Some(image) = &self.image_path {
            let path = dataset_dir.join(image);
            if !path.is_file() {
                return Err(CellrunError::ConfigMalformed(format!(
                    "image_path {} does not exist",
                    path.display()
                )));
            }
        }

        Ok(())
    }

    /// Image the configuration refers to, falling back to the discovered one
    pub fn resolve_image(&self, dataset_dir: &Path, discovered: &Path) -> PathBuf {
        match &self.image_path {
            Some(image) => dataset_dir.join(image),
            None => discovered.to_path_buf(),
        }
    }
}
