// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::path::{Path, PathBuf};

use kdam::TqdmIterator;
use serde_json::Value;

use crate::constant::{RAW_IMAGE_CANDIDATES, RAW_PIPELINE_CONFIG};
use crate::ds::config::{Channel, ChannelConfig, ChannelRole, DatasetConfig};
use crate::error::CellrunError;
use crate::io::{OmeMetadata, copy_atomic};
use crate::ut::path::{collect_subdirectories, normalize_dataset_id};
use crate::ut::track::{progress_bar, progress_log};

/// A raw dataset as delivered by the transfer tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDataset {
    pub id: String,
    pub dir: PathBuf,
    pub image_path: PathBuf,
    pub pipeline_config: PathBuf,
}

impl RawDataset {
    /// Locate the pipeline configuration and expression image of a raw directory
    pub fn probe(dir: &Path) -> Option<RawDataset> {
        let name = dir.file_name()?.to_str()?;

        let pipeline_config = dir.join(RAW_PIPELINE_CONFIG);
        if !pipeline_config.is_file() {
            return None;
        }

        let image_path = RAW_IMAGE_CANDIDATES
            .iter()
            .map(|candidate| dir.join(candidate))
            .find(|path| path.is_file())?;

        Some(RawDataset {
            id: normalize_dataset_id(name),
            dir: dir.to_path_buf(),
            image_path,
            pipeline_config,
        })
    }
}

/// Channel names assigned to each role by a `pipelineConfig.json`
///
/// Roles whose key is absent are left out, so the prepared dataset is
/// later skipped rather than failed.
pub fn channel_roles(pipeline: &Value) -> Vec<(ChannelRole, String)> {
    let region = &pipeline["report"]["reg1"];

    [
        (ChannelRole::Nucleus, "nucleus_channel"),
        (ChannelRole::Membrane, "cell_channel"),
    ]
    .into_iter()
    .filter_map(|(role, key)| {
        region[key]
            .as_str()
            .map(|name| (role, name.to_string()))
    })
    .collect()
}

/// Build a dataset configuration from channel roles and image metadata
///
/// # Arguments
///
/// * `id` - Normalised dataset identifier
/// * `roles` - Channel name for each role
/// * `meta` - Channel names and pixel size read from the image
pub fn build_config(
    id: &str,
    roles: &[(ChannelRole, String)],
    meta: &OmeMetadata,
) -> Result<DatasetConfig, CellrunError> {
    let mut channels = ChannelConfig::new();

    for (role, name) in roles {
        let number = meta.channel_index(name).ok_or_else(|| {
            CellrunError::MetadataError(format!(
                "The {} channel {} is not one of the image channels",
                role, name
            ))
        })?;

        channels.insert(
            *role,
            Channel {
                name: name.clone(),
                number,
            },
        );
    }

    let markers = meta
        .channels
        .iter()
        .enumerate()
        .map(|(number, name)| Channel {
            name: name.clone(),
            number,
        })
        .collect();

    Ok(DatasetConfig {
        image_path: Some(format!("{}.ome.tiff", id)),
        use_wsi: true,
        mpp: meta.mpp,
        channels,
        markers,
    })
}

/// Turn one raw dataset into an input dataset directory
///
/// Writes `<input_root>/<id>/<id>_config.json` and copies the image to
/// `<input_root>/<id>/<id>.ome.tiff`. Returns the new dataset directory.
pub fn prepare_dataset(raw: &RawDataset, input_root: &Path) -> Result<PathBuf, CellrunError> {
    let text = std::fs::read_to_string(&raw.pipeline_config).map_err(|err| {
        CellrunError::NoFileError(format!("{}: {}", raw.pipeline_config.display(), err))
    })?;

    let pipeline: Value = serde_json::from_str(&text).map_err(|err| {
        CellrunError::MetadataError(format!("{}: {}", raw.pipeline_config.display(), err))
    })?;

    let meta = OmeMetadata::open(&raw.image_path)?;
    let config = build_config(&raw.id, &channel_roles(&pipeline), &meta)?;

    let output = input_root.join(&raw.id);
    std::fs::create_dir_all(&output)
        .map_err(|err| CellrunError::DirError(format!("{}: {}", output.display(), err)))?;

    copy_atomic(&raw.image_path, output.join(format!("{}.ome.tiff", raw.id)))?;
    config.save(output.join(format!("{}_config.json", raw.id)))?;

    Ok(output)
}

/// Successes and failures of a preparation pass
#[derive(Debug, Default)]
pub struct PrepareReport {
    pub prepared: Vec<String>,
    pub ignored: Vec<PathBuf>,
    pub errors: Vec<(String, CellrunError)>,
}

/// Prepare every raw dataset directory beneath a root
///
/// A failing dataset is recorded and the loop moves on.
pub fn prepare_root(
    raw_root: &Path,
    input_root: &Path,
    verbose: bool,
) -> Result<PrepareReport, CellrunError> {
    let dirs = collect_subdirectories(raw_root)
        .map_err(|err| CellrunError::RootError(err.to_string()))?;

    progress_log(
        &format!("Found {} raw dataset directories.", dirs.len()),
        verbose,
    );

    let mut report = PrepareReport::default();
    let pb = progress_bar(dirs.len(), "Preparing", verbose);

    for dir in dirs.into_iter().tqdm_with_bar(pb) {
        let Some(raw) = RawDataset::probe(&dir) else {
            report.ignored.push(dir);
            continue;
        };

        match prepare_dataset(&raw, input_root) {
            Ok(_) => report.prepared.push(raw.id),
            Err(err) => report.errors.push((raw.id, err)),
        }
    }

    if verbose {
        println!()
    }

    Ok(report)
}

#[cfg(test)]
mod test {

    use super::*;
    use serde_json::json;

    fn meta() -> OmeMetadata {
        OmeMetadata {
            channels: vec!["DAPI-02".to_string(), "CD45".to_string(), "Ki67".to_string()],
            mpp: Some(0.37744),
        }
    }

    #[test]
    fn test_channel_roles() {
        let pipeline = json!({
            "report": { "reg1": { "nucleus_channel": "DAPI-02", "cell_channel": "CD45" } }
        });

        assert_eq!(
            channel_roles(&pipeline),
            vec![
                (ChannelRole::Nucleus, "DAPI-02".to_string()),
                (ChannelRole::Membrane, "CD45".to_string())
            ]
        );
    }

    #[test]
    fn test_channel_roles_missing_key() {
        let pipeline = json!({ "report": { "reg1": { "cell_channel": "CD45" } } });
        let roles = channel_roles(&pipeline);

        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].0, ChannelRole::Membrane);
        assert!(channel_roles(&json!({})).is_empty());
    }

    #[test]
    fn test_build_config() {
        let roles = vec![
            (ChannelRole::Nucleus, "DAPI-02".to_string()),
            (ChannelRole::Membrane, "CD45".to_string()),
        ];

        let config = build_config("HBM279TQRS775", &roles, &meta()).unwrap();

        assert_eq!(config.image_path.as_deref(), Some("HBM279TQRS775.ome.tiff"));
        assert_eq!(config.channels.membrane().unwrap().number, 1);
        assert_eq!(config.markers.len(), 3);
        assert_eq!(config.markers[2].name, "Ki67");
        assert_eq!(config.mpp, Some(0.37744));
    }

    #[test]
    fn test_build_config_unknown_channel() {
        let roles = vec![(ChannelRole::Nucleus, "Hoechst".to_string())];
        assert!(matches!(
            build_config("HBM1", &roles, &meta()),
            Err(CellrunError::MetadataError(_))
        ));
    }

    #[test]
    fn test_probe_raw_dataset() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("HBM279.TQRS.775-b3d9");
        std::fs::create_dir_all(dir.join("pipeline_output/expr")).unwrap();
        std::fs::write(dir.join("pipelineConfig.json"), "{}").unwrap();
        std::fs::write(dir.join("pipeline_output/expr/reg001_expr.ome.tiff"), b"x").unwrap();

        let raw = RawDataset::probe(&dir).unwrap();
        assert_eq!(raw.id, "HBM279TQRS775");
        assert!(raw.image_path.ends_with("pipeline_output/expr/reg001_expr.ome.tiff"));

        std::fs::remove_file(dir.join("pipelineConfig.json")).unwrap();
        assert!(RawDataset::probe(&dir).is_none());
    }

    #[test]
    fn test_prepare_root_records_errors() {
        let raw_root = tempfile::tempdir().unwrap();
        let input_root = tempfile::tempdir().unwrap();

        let dir = raw_root.path().join("HBM1.AAAA.111-x");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("pipelineConfig.json"), "{}").unwrap();
        std::fs::write(dir.join("reg001_expr.ome.tiff"), b"not a tiff").unwrap();
        std::fs::create_dir_all(raw_root.path().join("empty")).unwrap();

        let report = prepare_root(raw_root.path(), input_root.path(), false).unwrap();

        assert!(report.prepared.is_empty());
        assert_eq!(report.ignored.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].0, "HBM1AAAA111");
    }
}
