// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constant::MORPHOLOGY_DESCRIPTOR_NAMES;
use crate::error::CellrunError;
use crate::im::LabelMask;

/// Morphological descriptors of a single labelled object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMorphology {
    pub object_id: u32,
    pub area: u32,
    pub perimeter: u32,
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub bbox_min_x: u32,
    pub bbox_min_y: u32,
    pub bbox_max_x: u32,
    pub bbox_max_y: u32,
    pub equivalent_diameter: f64,
    pub extent: f64,
}

/// Per-object morphology keyed by object id, in ascending id order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MorphologyTable {
    rows: Vec<ObjectMorphology>,
}

#[derive(Clone, Copy)]
struct Accumulator {
    area: u32,
    perimeter: u32,
    sum_x: u64,
    sum_y: u64,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Accumulator {
    fn new(x: u32, y: u32) -> Self {
        Accumulator {
            area: 0,
            perimeter: 0,
            sum_x: 0,
            sum_y: 0,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }
}

impl MorphologyTable {
    /// Measure every object of a label mask in a single pass
    ///
    /// The perimeter is the number of pixel edges an object shares with a
    /// different label or with the image border (4-connectivity).
    ///
    /// # Examples
    ///
    /// ```
    /// use cellrun_core::im::LabelMask;
    /// use cellrun_core::mp::MorphologyTable;
    ///
    /// let mask = LabelMask::new(3, 3, vec![1, 1, 0, 1, 1, 0, 0, 0, 2]).unwrap();
    /// let table = MorphologyTable::measure(&mask);
    ///
    /// assert_eq!(table.len(), 2);
    /// assert_eq!(table.rows()[0].area, 4);
    /// assert_eq!(table.rows()[0].perimeter, 8);
    /// ```
    pub fn measure(mask: &LabelMask) -> MorphologyTable {
        let (w, h) = (mask.width(), mask.height());
        let mut objects: BTreeMap<u32, Accumulator> = BTreeMap::new();

        for y in 0..h {
            for x in 0..w {
                let label = mask.get(x, y);
                if label == 0 {
                    continue;
                }

                let acc = objects.entry(label).or_insert_with(|| Accumulator::new(x, y));

                acc.area += 1;
                acc.sum_x += x as u64;
                acc.sum_y += y as u64;
                acc.min_x = acc.min_x.min(x);
                acc.min_y = acc.min_y.min(y);
                acc.max_x = acc.max_x.max(x);
                acc.max_y = acc.max_y.max(y);

                let edges = [
                    x == 0 || mask.get(x - 1, y) != label,
                    x + 1 == w || mask.get(x + 1, y) != label,
                    y == 0 || mask.get(x, y - 1) != label,
                    y + 1 == h || mask.get(x, y + 1) != label,
                ];

                acc.perimeter += edges.iter().filter(|&&edge| edge).count() as u32;
            }
        }

        let rows = objects
            .into_iter()
            .map(|(object_id, acc)| {
                let area = acc.area as f64;
                let bbox_area =
                    ((acc.max_x - acc.min_x + 1) as f64) * ((acc.max_y - acc.min_y + 1) as f64);

                ObjectMorphology {
                    object_id,
                    area: acc.area,
                    perimeter: acc.perimeter,
                    centroid_x: acc.sum_x as f64 / area,
                    centroid_y: acc.sum_y as f64 / area,
                    bbox_min_x: acc.min_x,
                    bbox_min_y: acc.min_y,
                    bbox_max_x: acc.max_x,
                    bbox_max_y: acc.max_y,
                    equivalent_diameter: (4.0 * area / std::f64::consts::PI).sqrt(),
                    extent: area / bbox_area,
                }
            })
            .collect();

        MorphologyTable { rows }
    }


    pub fn rows(&self) -> &[ObjectMorphology] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn object_ids(&self) -> BTreeSet<u32> {
        self.rows.iter().map(|row| row.object_id).collect()
    }

    /// Convert the table into a DataFrame for writing
    pub fn to_dataframe(&self) -> Result<DataFrame, CellrunError> {
        let names = MORPHOLOGY_DESCRIPTOR_NAMES;
        let u32_column = |i: usize, f: fn(&ObjectMorphology) -> u32| {
            Column::new(names[i].into(), self.rows.iter().map(f).collect::<Vec<u32>>())
        };
        let f64_column = |i: usize, f: fn(&ObjectMorphology) -> f64| {
            Column::new(names[i].into(), self.rows.iter().map(f).collect::<Vec<f64>>())
        };

        DataFrame::new(vec![
            u32_column(0, |r| r.object_id),
            u32_column(1, |r| r.area),
            u32_column(2, |r| r.perimeter),
            f64_column(3, |r| r.centroid_x),
            f64_column(4, |r| r.centroid_y),
            u32_column(5, |r| r.bbox_min_x),
            u32_column(6, |r| r.bbox_min_y),
            u32_column(7, |r| r.bbox_max_x),
            u32_column(8, |r| r.bbox_max_y),
            f64_column(9, |r| r.equivalent_diameter),
            f64_column(10, |r| r.extent),
        ])
        .map_err(|err| CellrunError::OtherError(err.to_string()))
    }
}

#[cfg(test)]
mod test {

    use super::*;

    const EPSILON: f64 = 1e-9;

    fn two_objects() -> LabelMask {
        #[rustfmt::skip]
        let buffer = vec![
            1, 1, 0, 0,
            1, 1, 0, 3,
            0, 0, 0, 3,
        ];
        LabelMask::new(4, 3, buffer).unwrap()
    }

    #[test]
    fn test_measure_area_and_ids() {
        let table = MorphologyTable::measure(&two_objects());

        assert_eq!(table.object_ids().into_iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(table.rows()[0].area, 4);
        assert_eq!(table.rows()[1].area, 2);
    }

    #[test]
    fn test_measure_centroid_bbox() {
        let table = MorphologyTable::measure(&two_objects());
        let square = &table.rows()[0];

        assert!((square.centroid_x - 0.5).abs() < EPSILON);
        assert!((square.centroid_y - 0.5).abs() < EPSILON);
        assert_eq!((square.bbox_min_x, square.bbox_max_x), (0, 1));
        assert_eq!((square.bbox_min_y, square.bbox_max_y), (0, 1));
        assert!((square.extent - 1.0).abs() < EPSILON);

        let bar = &table.rows()[1];
        assert!((bar.centroid_x - 3.0).abs() < EPSILON);
        assert!((bar.centroid_y - 1.5).abs() < EPSILON);
    }

    #[test]
    fn test_measure_perimeter() {
        let table = MorphologyTable::measure(&two_objects());

        assert_eq!(table.rows()[0].perimeter, 8);
        assert_eq!(table.rows()[1].perimeter, 6);
    }

    #[test]
    fn test_measure_touching_objects() {
        let mask = LabelMask::new(2, 1, vec![1, 2]).unwrap();
        let table = MorphologyTable::measure(&mask);

        assert_eq!(table.rows()[0].perimeter, 4);
        assert_eq!(table.rows()[1].perimeter, 4);
    }

    #[test]
    fn test_measure_empty_mask() {
        let mask = LabelMask::new(2, 2, vec![0; 4]).unwrap();
        assert!(MorphologyTable::measure(&mask).is_empty());
    }

    #[test]
    fn test_equivalent_diameter() {
        let table = MorphologyTable::measure(&two_objects());
        let expected = (16.0 / std::f64::consts::PI).sqrt();
        assert!((table.rows()[0].equivalent_diameter - expected).abs() < EPSILON);
    }

    #[test]
    fn test_to_dataframe() {
        let df = MorphologyTable::measure(&two_objects()).to_dataframe().unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), MORPHOLOGY_DESCRIPTOR_NAMES.len());
    }
}
