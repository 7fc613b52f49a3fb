// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use regex::Regex;
use tiff::decoder::Decoder;
use tiff::tags::Tag;

use crate::error::CellrunError;

/// Channel and pixel-size metadata carried in an OME-TIFF header
#[derive(Debug, Clone, PartialEq)]
pub struct OmeMetadata {
    pub channels: Vec<String>,
    pub mpp: Option<f64>,
}

impl OmeMetadata {
    /// Read the OME-XML stored in the first IFD's ImageDescription tag
    ///
    /// # Arguments
    ///
    /// * `path` - Path to an OME-TIFF image
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cellrun_core::io::OmeMetadata;
    /// let meta = OmeMetadata::open("reg001_expr.ome.tiff").unwrap();
    /// println!("{:?}", meta.channels);
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<OmeMetadata, CellrunError> {
        let path = path.as_ref();

        let file = File::open(path)
            .map_err(|err| CellrunError::NoFileError(format!("{}: {}", path.display(), err)))?;

        let mut decoder = Decoder::new(BufReader::new(file)).map_err(|err| {
            CellrunError::MetadataError(format!("{} is not a TIFF: {}", path.display(), err))
        })?;

        let description = decoder
            .get_tag_ascii_string(Tag::ImageDescription)
            .map_err(|err| {
                CellrunError::MetadataError(format!(
                    "{} has no ImageDescription tag: {}",
                    path.display(),
                    err
                ))
            })?;

        Self::parse(&description)
    }

    /// Extract channel names and microns-per-pixel from OME-XML text
    pub fn parse(xml: &str) -> Result<OmeMetadata, CellrunError> {
        if !xml.contains("<OME") && !xml.contains(":OME") {
            return Err(CellrunError::MetadataError(
                "ImageDescription does not contain OME-XML".to_string(),
            ));
        }

        Ok(OmeMetadata {
            channels: channel_names(xml)?,
            mpp: microns_per_pixel(xml)?,
        })
    }

    /// Position of a named channel within the image
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|channel| channel == name)
    }
}

fn channel_names(xml: &str) -> Result<Vec<String>, CellrunError> {
    let channel = Regex::new(r#"<(?:[A-Za-z0-9_]+:)?Channel\b[^>]*>"#)
        .map_err(|err| CellrunError::OtherError(err.to_string()))?;
    let name = Regex::new(r#"\bName="([^"]*)""#)
        .map_err(|err| CellrunError::OtherError(err.to_string()))?;

    Ok(channel
        .find_iter(xml)
        .map(|tag| {
            name.captures(tag.as_str())
                .map(|cap| cap[1].to_string())
                .unwrap_or_default()
        })
        .collect())
}

fn microns_per_pixel(xml: &str) -> Result<Option<f64>, CellrunError> {
    let size = Regex::new(r#"\bPhysicalSizeX="([^"]+)""#)
        .map_err(|err| CellrunError::OtherError(err.to_string()))?;
    let unit = Regex::new(r#"\bPhysicalSizeXUnit="([^"]+)""#)
        .map_err(|err| CellrunError::OtherError(err.to_string()))?;

    let Some(value) = size.captures(xml) else {
        return Ok(None);
    };

    let value: f64 = value[1].trim().parse().map_err(|_| {
        CellrunError::MetadataError(format!("PhysicalSizeX {:?} is not a number", &value[1]))
    })?;

    // OME defaults to micrometres when no unit is recorded
    let unit = unit
        .captures(xml)
        .map(|cap| cap[1].to_string())
        .unwrap_or_else(|| "µm".to_string());

    let mpp = match unit.as_str() {
        "nm" => value / 1000.0,
        "µm" | "um" | "μm" => value,
        "mm" => value * 1000.0,
        "m" => value * 1_000_000.0,
        _ => value,
    };

    Ok(Some((mpp * 1e5).round() / 1e5))
}

#[cfg(test)]
mod test {

    use super::*;

    const OME_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06">
  <Image ID="Image:0" Name="reg001">
    <Pixels DimensionOrder="XYZCT" ID="Pixels:0" PhysicalSizeX="377.44" PhysicalSizeXUnit="nm" SizeC="3" SizeX="4" SizeY="4">
      <Channel ID="Channel:0:0" Name="DAPI-02" SamplesPerPixel="1"/>
      <Channel ID="Channel:0:1" Name="CD45" SamplesPerPixel="1"/>
      <Channel ID="Channel:0:2" Name="Ki67" SamplesPerPixel="1"/>
    </Pixels>
  </Image>
</OME>"#;

    #[test]
    fn test_parse_channels() {
        let meta = OmeMetadata::parse(OME_XML).unwrap();
        assert_eq!(meta.channels, vec!["DAPI-02", "CD45", "Ki67"]);
        assert_eq!(meta.channel_index("CD45"), Some(1));
        assert_eq!(meta.channel_index("CD3"), None);
    }

    #[test]
    fn test_parse_mpp_nanometres() {
        let meta = OmeMetadata::parse(OME_XML).unwrap();
        assert_eq!(meta.mpp, Some(0.37744));
    }

    #[test]
    fn test_parse_mpp_units() {
        let xml = OME_XML.replace("PhysicalSizeXUnit=\"nm\"", "PhysicalSizeXUnit=\"mm\"");
        let meta = OmeMetadata::parse(&xml).unwrap();
        assert_eq!(meta.mpp, Some(377440.0));

        let xml = OME_XML.replace(" PhysicalSizeXUnit=\"nm\"", "");
        let meta = OmeMetadata::parse(&xml).unwrap();
        assert_eq!(meta.mpp, Some(377.44));
    }

    #[test]
    fn test_parse_missing_size() {
        let xml = OME_XML.replace(" PhysicalSizeX=\"377.44\"", "");
        let meta = OmeMetadata::parse(&xml).unwrap();
        assert_eq!(meta.mpp, None);
    }

    #[test]
    fn test_parse_prefixed_namespace() {
        let xml = r#"<ome:OME><ome:Channel ID="Channel:0:0" Name="Hoechst1"/></ome:OME>"#;
        let meta = OmeMetadata::parse(xml).unwrap();
        assert_eq!(meta.channels, vec!["Hoechst1"]);
    }

    #[test]
    fn test_parse_not_ome() {
        assert!(OmeMetadata::parse("ImageJ=1.53").is_err());
    }
}
