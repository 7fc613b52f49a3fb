// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constant::UNCLASSIFIED;
use crate::ds::Channel;
use crate::error::CellrunError;
use crate::mp::MorphologyTable;

/// Credential for the annotation service
///
/// The token never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new<S: Into<String>>(token: S) -> Self {
        AuthToken(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AuthToken(***)")
    }
}

/// Everything the annotation collaborator receives for one dataset
#[derive(Debug, Clone, Copy)]
pub struct AnnotationRequest<'a> {
    pub dataset_id: &'a str,
    pub morphology: &'a MorphologyTable,
    pub markers: &'a [Channel],
    pub mpp: Option<f64>,
    pub token: &'a AuthToken,
}

/// Predicted type of one object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypePrediction {
    pub object_id: u32,
    pub cell_type: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Failure reported by an annotation collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationError {
    /// Timeouts, throttling, 5xx responses; retried with backoff
    Transient(String),
    /// The credential was refused; fatal to the whole run
    Auth(String),
    /// Any other failure; the dataset fails without retry
    Rejected(String),
}

impl AnnotationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AnnotationError::Transient(_))
    }
}

impl fmt::Display for AnnotationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnnotationError::Transient(message) => write!(f, "transient: {}", message),
            AnnotationError::Auth(message) => write!(f, "authentication: {}", message),
            AnnotationError::Rejected(message) => write!(f, "rejected: {}", message),
        }
    }
}

impl std::error::Error for AnnotationError {}

impl From<AnnotationError> for CellrunError {
    fn from(err: AnnotationError) -> Self {
        match err {
            AnnotationError::Transient(message) => CellrunError::AnnotationTransient(message),
            AnnotationError::Auth(message) => CellrunError::AnnotationAuth(message),
            AnnotationError::Rejected(message) => CellrunError::AnnotationRejected(message),
        }
    }
}

/// Boundary to the external annotation service
pub trait Annotator {
    fn annotate(&mut self, request: &AnnotationRequest) -> Result<Vec<TypePrediction>, AnnotationError>;
}

/// One row of the per-object type table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRow {
    pub object_id: u32,
    pub cell_type: String,
    pub confidence: Option<f64>,
}

/// Per-object types covering exactly the segmented objects
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeTable {
    rows: Vec<TypeRow>,
}

impl TypeTable {
    /// Align predictions with the morphology table
    ///
    /// Every segmented object receives a row. Objects without a prediction
    /// are marked unclassified. A prediction for an unknown object, or two
    /// predictions for the same object, is a contract violation.
    ///
    /// # Examples
    ///
    /// ```
    /// use cellrun_core::im::LabelMask;
    /// use cellrun_core::mp::MorphologyTable;
    /// use cellrun_core::pl::{TypePrediction, TypeTable};
    ///
    /// let mask = LabelMask::new(3, 1, vec![1, 0, 2]).unwrap();
    /// let morphology = MorphologyTable::measure(&mask);
    ///
    /// let predictions = vec![TypePrediction {
    ///     object_id: 2,
    ///     cell_type: "B cell".to_string(),
    ///     confidence: Some(0.9),
    /// }];
    ///
    /// let table = TypeTable::reconcile(&morphology, predictions).unwrap();
    /// assert_eq!(table.rows()[0].cell_type, "unclassified");
    /// assert_eq!(table.typed(), 1);
    /// ```
    pub fn reconcile(
        morphology: &MorphologyTable,
        predictions: Vec<TypePrediction>,
    ) -> Result<TypeTable, AnnotationError> {
        let ids: BTreeSet<u32> = morphology.object_ids();
        let mut by_id: BTreeMap<u32, TypePrediction> = BTreeMap::new();

        for prediction in predictions {
            if !ids.contains(&prediction.object_id) {
                return Err(AnnotationError::Rejected(format!(
                    "Prediction for object {} which was not segmented",
                    prediction.object_id
                )));
            }

            let object_id = prediction.object_id;
            if by_id.insert(object_id, prediction).is_some() {
                return Err(AnnotationError::Rejected(format!(
                    "Object {} was predicted more than once",
                    object_id
                )));
            }
        }

        let rows = ids
            .into_iter()
            .map(|object_id| match by_id.remove(&object_id) {
                Some(prediction) => TypeRow {
                    object_id,
                    cell_type: prediction.cell_type,
                    confidence: prediction.confidence,
                },
                None => TypeRow {
                    object_id,
                    cell_type: UNCLASSIFIED.to_string(),
                    confidence: None,
                },
            })
            .collect();

        Ok(TypeTable { rows })
    }

    pub fn rows(&self) -> &[TypeRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn unclassified(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.cell_type == UNCLASSIFIED)
            .count()
    }

    pub fn typed(&self) -> usize {
        self.rows.len() - self.unclassified()
    }

    /// Counts per type, most frequent first, ties broken by type name
    pub fn population(&self) -> Vec<PopulationRow> {
        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for row in self.rows.iter() {
            *counts.entry(row.cell_type.as_str()).or_insert(0) += 1;
        }

        let total = self.rows.len() as f64;

        let mut population: Vec<PopulationRow> = counts
            .into_iter()
            .map(|(cell_type, count)| PopulationRow {
                cell_type: cell_type.to_string(),
                count,
                percentage: (100.0 * count as f64 / total * 1e4).round() / 1e4,
            })
            .collect();

        // BTreeMap order is by name so a stable sort keeps name order within ties
        population.sort_by(|a, b| b.count.cmp(&a.count));

        population
    }

    /// `Cell_ID, Cell_Name, Confidence`
    pub fn to_dataframe(&self) -> Result<DataFrame, CellrunError> {
        DataFrame::new(vec![
            Column::new(
                "Cell_ID".into(),
                self.rows.iter().map(|r| r.object_id).collect::<Vec<u32>>(),
            ),
            Column::new(
                "Cell_Name".into(),
                self.rows
                    .iter()
                    .map(|r| r.cell_type.as_str())
                    .collect::<Vec<&str>>(),
            ),
            Column::new(
                "Confidence".into(),
                self.rows
                    .iter()
                    .map(|r| r.confidence)
                    .collect::<Vec<Option<f64>>>(),
            ),
        ])
        .map_err(|err| CellrunError::OtherError(err.to_string()))
    }
}

/// One row of the population table
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRow {
    pub cell_type: String,
    pub count: u32,
    pub percentage: f64,
}

/// `Cell_type, Cell_Count, Percentages`
pub fn population_dataframe(population: &[PopulationRow]) -> Result<DataFrame, CellrunError> {
    DataFrame::new(vec![
        Column::new(
            "Cell_type".into(),
            population
                .iter()
                .map(|r| r.cell_type.as_str())
                .collect::<Vec<&str>>(),
        ),
        Column::new(
            "Cell_Count".into(),
            population.iter().map(|r| r.count).collect::<Vec<u32>>(),
        ),
        Column::new(
            "Percentages".into(),
            population.iter().map(|r| r.percentage).collect::<Vec<f64>>(),
        ),
    ])
    .map_err(|err| CellrunError::OtherError(err.to_string()))
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::im::LabelMask;

    fn morphology() -> MorphologyTable {
        let mask = LabelMask::new(4, 1, vec![1, 2, 3, 4]).unwrap();
        MorphologyTable::measure(&mask)
    }

    fn prediction(object_id: u32, cell_type: &str) -> TypePrediction {
        TypePrediction {
            object_id,
            cell_type: cell_type.to_string(),
            confidence: Some(0.5),
        }
    }

    #[test]
    fn test_auth_token_redacted() {
        let token = AuthToken::new("secret-value");
        assert!(!format!("{:?}", token).contains("secret"));
        assert_eq!(token.expose(), "secret-value");
        assert!(AuthToken::new("  ").is_empty());
    }

    #[test]
    fn test_reconcile_fills_unclassified() {
        let table =
            TypeTable::reconcile(&morphology(), vec![prediction(3, "T cell"), prediction(1, "B cell")])
                .unwrap();

        let names: Vec<&str> = table.rows().iter().map(|r| r.cell_type.as_str()).collect();
        assert_eq!(names, vec!["B cell", "unclassified", "T cell", "unclassified"]);
        assert_eq!(table.typed(), 2);
        assert_eq!(table.unclassified(), 2);
        assert_eq!(table.rows()[1].confidence, None);
    }

    #[test]
    fn test_reconcile_rejects_unknown_object() {
        let result = TypeTable::reconcile(&morphology(), vec![prediction(9, "T cell")]);
        assert!(matches!(result, Err(AnnotationError::Rejected(_))));
    }

    #[test]
    fn test_reconcile_rejects_duplicate() {
        let result = TypeTable::reconcile(
            &morphology(),
            vec![prediction(1, "T cell"), prediction(1, "B cell")],
        );
        assert!(matches!(result, Err(AnnotationError::Rejected(_))));
    }

    #[test]
    fn test_population_order() {
        let table = TypeTable::reconcile(
            &morphology(),
            vec![
                prediction(1, "T cell"),
                prediction(2, "B cell"),
                prediction(3, "T cell"),
                prediction(4, "Endothelial"),
            ],
        )
        .unwrap();

        let population = table.population();
        let names: Vec<&str> = population.iter().map(|r| r.cell_type.as_str()).collect();

        assert_eq!(names, vec!["T cell", "B cell", "Endothelial"]);
        assert_eq!(population[0].count, 2);
        assert_eq!(population[0].percentage, 50.0);
        assert_eq!(population[1].percentage, 25.0);
    }

    #[test]
    fn test_type_dataframe() {
        let table = TypeTable::reconcile(&morphology(), vec![prediction(1, "T cell")]).unwrap();
        let df = table.to_dataframe().unwrap();

        assert_eq!(df.height(), 4);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("Confidence").unwrap().null_count(), 3);
    }

    #[test]
    fn test_error_classification() {
        assert!(AnnotationError::Transient("503".to_string()).is_transient());
        assert!(!AnnotationError::Auth("401".to_string()).is_transient());

        let err: CellrunError = AnnotationError::Auth("401".to_string()).into();
        assert_eq!(err.kind(), "annotation_auth");
    }
}
