// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::collections::BTreeSet;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, open as open_dynamic};

use crate::constant;
use crate::error::CellrunError;
use crate::io::write_atomic;

/// A row-major label mask
///
/// Background pixels are 0 and every segmented object carries a distinct
/// positive label. The length of the buffer must be equal to the product
/// of `w` * `h`.
///
/// # Examples
///
/// ```
/// use cellrun_core::im::LabelMask;
///
/// let mask = LabelMask::new(2, 2, vec![0, 1, 2, 2]).unwrap();
/// assert_eq!(mask.labels().len(), 2);
///
/// assert!(LabelMask::new(2, 2, vec![0, 1]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMask {
    w: u32,
    h: u32,
    buffer: Vec<u32>,
}

impl LabelMask {
    /// Initialize a mask from a row-major label buffer
    pub fn new(width: u32, height: u32, buffer: Vec<u32>) -> Result<LabelMask, CellrunError> {
        if buffer.len() != (width as usize) * (height as usize) {
            return Err(CellrunError::MaskError(format!(
                "Buffer holds {} labels but a {}x{} mask needs {}",
                buffer.len(),
                width,
                height,
                (width as usize) * (height as usize)
            )));
        }

        Ok(LabelMask {
            w: width,
            h: height,
            buffer,
        })
    }

    pub fn width(&self) -> u32 {
        self.w
    }

    pub fn height(&self) -> u32 {
        self.h
    }

    pub fn as_raw(&self) -> &[u32] {
        &self.buffer
    }

    /// Label at a pixel position
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.buffer[(y as usize) * (self.w as usize) + (x as usize)]
    }

    /// Unique non-background labels in ascending order
    pub fn labels(&self) -> BTreeSet<u32> {
        self.buffer.iter().filter(|&&x| x != 0).copied().collect()
    }

    /// Largest label present, 0 for an empty mask
    pub fn max_label(&self) -> u32 {
        self.buffer.iter().copied().max().unwrap_or(0)
    }
}

// >>> I/O METHODS

impl LabelMask {
    /// Open a mask from an 8 or 16-bit grayscale image
    ///
    /// # Arguments
    ///
    /// * `path` - A path to a tiff or png label image
    ///
    /// ```no_run
    /// use cellrun_core::im::LabelMask;
    /// let mask = LabelMask::open("HBM123_segmented.tiff");
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<LabelMask, CellrunError> {
        let path = path.as_ref();

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        match extension.as_deref() {
            Some(ext) if constant::SUPPORTED_IMAGE_FORMATS.contains(&ext) || ext == "png" => {
                let image = open_dynamic(path).map_err(|err| {
                    CellrunError::MaskError(format!("{}: {}", path.display(), err))
                })?;

                Self::new_from_dynamic(image)
            }
            _ => Err(CellrunError::MaskError(format!(
                "{} does not have a tiff or png extension",
                path.display()
            ))),
        }
    }

    /// Initialize a new mask from a DynamicImage
    ///
    /// # Arguments
    ///
    /// * `image` - An 8 or 16-bit grayscale DynamicImage
    pub fn new_from_dynamic(mask: DynamicImage) -> Result<LabelMask, CellrunError> {
        let width = mask.width();
        let height = mask.height();

        match mask {
            DynamicImage::ImageLuma8(buffer) => LabelMask::new(
                width,
                height,
                buffer.into_raw().into_iter().map(|p| p as u32).collect(),
            ),
            DynamicImage::ImageLuma16(buffer) => LabelMask::new(
                width,
                height,
                buffer.into_raw().into_iter().map(|p| p as u32).collect(),
            ),
            DynamicImage::ImageLumaA16(buffer) => LabelMask::new(
                width,
                height,
                buffer
                    .into_raw()
                    .chunks_exact(2)
                    .map(|pixel| pixel[0] as u32)
                    .collect(),
            ),
            _ => Err(CellrunError::MaskError(
                "Label masks must be single-channel 8 or 16-bit images".to_string(),
            )),
        }
    }

    /// Save the mask as a 16-bit tiff, moved into place only once complete
    ///
    /// # Arguments
    ///
    /// * `path` - Output path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CellrunError> {
        let max = self.max_label();
        if max > u16::MAX as u32 {
            return Err(CellrunError::MaskWriteError(format!(
                "Label {} does not fit in a 16-bit mask",
                max
            )));
        }

        let pixels: Vec<u16> = self.buffer.iter().map(|&p| p as u16).collect();
        let image = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(self.w, self.h, pixels)
            .ok_or_else(|| CellrunError::MaskWriteError("Mask buffer size mismatch".to_string()))?;

        write_atomic(path, |file| {
            image
                .write_to(file, ImageFormat::Tiff)
                .map_err(|err| CellrunError::MaskWriteError(err.to_string()))
        })
    }
}

// <<< I/O METHODS

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_mask_new_size_mismatch() {
        assert!(LabelMask::new(3, 3, vec![0; 8]).is_err());
        assert!(LabelMask::new(3, 3, vec![0; 9]).is_ok());
    }

    #[test]
    fn test_mask_labels() {
        let mask = LabelMask::new(3, 2, vec![0, 5, 5, 2, 0, 9]).unwrap();
        let labels: Vec<u32> = mask.labels().into_iter().collect();

        assert_eq!(labels, vec![2, 5, 9]);
        assert_eq!(mask.max_label(), 9);
        assert_eq!(mask.get(2, 1), 9);
    }

    #[test]
    fn test_mask_save_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask_segmented.tiff");

        let mask = LabelMask::new(3, 2, vec![0, 1, 1, 300, 0, 2]).unwrap();
        mask.save(&path).unwrap();

        let reopened = LabelMask::open(&path).unwrap();
        assert_eq!(reopened, mask);
    }

    #[test]
    fn test_mask_save_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask_segmented.tiff");

        let mask = LabelMask::new(1, 1, vec![70_000]).unwrap();
        assert!(matches!(
            mask.save(&path),
            Err(CellrunError::MaskWriteError(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_mask_open_bad_extension() {
        assert!(LabelMask::open("mask.npy").is_err());
    }
}
