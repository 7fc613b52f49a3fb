// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::constant::{MASK_SUFFIX, MORPHOLOGY_SUFFIX, POPULATION_SUFFIX, SUMMARY_SUFFIX, TYPE_SUFFIX};
use crate::ds::{DatasetRecord, Discovery, GuardedDataset, Partition, Verdict, inspect};
use crate::error::CellrunError;
use crate::io::write_table_csv;
use crate::pl::annotate::{
    AnnotationRequest, Annotator, AuthToken, TypeTable, population_dataframe,
};
use crate::pl::outcome::{Outcome, Stage};
use crate::pl::report::{Halt, RunReport};
use crate::pl::retry::RetryPolicy;
use crate::pl::segment::{SegmentationRequest, Segmenter};
use crate::pl::summary::{DatasetSummary, timestamp};
use crate::ut::track::{progress_log, progress_warn, thousands_format};

/// Explicit configuration of a run
///
/// Nothing here is read from the process environment by the driver.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub token: AuthToken,
    pub retry: RetryPolicy,
    pub partition: Partition,
    pub only: Option<BTreeSet<String>>,
    pub verbose: bool,
}

impl RunConfig {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(input_root: P, output_root: Q, token: AuthToken) -> Self {
        RunConfig {
            input_root: input_root.into(),
            output_root: output_root.into(),
            token,
            retry: RetryPolicy::default(),
            partition: Partition::default(),
            only: None,
            verbose: false,
        }
    }
}

/// Cooperative stop request, checked between datasets
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        StopSignal(Arc::new(AtomicBool::new(false)))
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sequential segmentation and annotation over every owned dataset
///
/// # Examples
///
/// ```no_run
/// use cellrun_core::pl::{AnnotationError, AnnotationRequest, Annotator, AuthToken};
/// use cellrun_core::pl::{Driver, RunConfig, Segmentation, SegmentationError};
/// use cellrun_core::pl::{SegmentationRequest, Segmenter, TypePrediction};
/// use cellrun_core::im::LabelMask;
///
/// struct Blank;
///
/// impl Segmenter for Blank {
///     fn segment(&mut self, _: &SegmentationRequest) -> Result<Segmentation, SegmentationError> {
///         Ok(Segmentation::from_mask(LabelMask::new(1, 1, vec![1]).unwrap()))
///     }
/// }
///
/// impl Annotator for Blank {
///     fn annotate(&mut self, _: &AnnotationRequest) -> Result<Vec<TypePrediction>, AnnotationError> {
///         Ok(vec![])
///     }
/// }
///
/// let config = RunConfig::new("input-data/", "output-data/", AuthToken::new("token"));
/// let report = Driver::new(config, Blank, Blank).run().unwrap();
/// println!("{}", report.completed());
/// ```
pub struct Driver<S: Segmenter, A: Annotator> {
    config: RunConfig,
    segmenter: S,
    annotator: A,
    stop: StopSignal,
}

impl<S: Segmenter, A: Annotator> Driver<S, A> {
    pub fn new(config: RunConfig, segmenter: S, annotator: A) -> Self {
        Driver {
            config,
            segmenter,
            annotator,
            stop: StopSignal::new(),
        }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn segmenter(&self) -> &S {
        &self.segmenter
    }

    pub fn annotator(&self) -> &A {
        &self.annotator
    }

    /// Check run-wide preconditions before any dataset is touched
    pub fn preflight(&self) -> Result<Discovery, CellrunError> {
        if self.config.token.is_empty() {
            return Err(CellrunError::AuthError(
                "No annotation access token was provided".to_string(),
            ));
        }

        if !self.config.input_root.is_dir() {
            return Err(CellrunError::RootError(format!(
                "Input root {} does not exist or is not a directory",
                self.config.input_root.display()
            )));
        }

        std::fs::create_dir_all(&self.config.output_root).map_err(|err| {
            CellrunError::RootError(format!(
                "Output root {} could not be created: {}",
                self.config.output_root.display(),
                err
            ))
        })?;

        Ok(Discovery::new(&self.config.input_root, &self.config.output_root))
    }

    /// Process every dataset owned by this worker exactly once
    ///
    /// Only a failed precondition returns `Err`. Per-dataset failures are
    /// recorded in the report; an authentication failure or a stop request
    /// ends the loop and the remaining datasets are listed as not processed.
    pub fn run(&mut self) -> Result<RunReport, CellrunError> {
        let discovery = self.preflight()?;
        let records = discovery.iter()?;

        let mut report = RunReport::new(self.config.partition.to_string(), timestamp());

        progress_log(
            &format!(
                "Starting worker {} over {}",
                self.config.partition,
                self.config.input_root.display()
            ),
            self.config.verbose,
        );

        let only = self.config.only.clone();
        let partition = self.config.partition;
        let owned = records
            .filter(|record| only.as_ref().is_none_or(|ids| ids.contains(&record.id)))
            .enumerate()
            .filter(|(position, _)| partition.owns(*position))
            .map(|(_, record)| record);

        for record in owned {
            report.discovered += 1;

            if report.halted.is_some() {
                report.not_processed.push(record.id);
                continue;
            }

            if self.stop.is_stopped() {
                progress_warn("Stop requested; remaining datasets will not be processed");
                report.halted = Some(Halt::Stopped);
                report.not_processed.push(record.id);
                continue;
            }

            let outcome = self.process(&record);

            if outcome.is_auth_failure() {
                let message = outcome
                    .error()
                    .map(|err| err.to_string())
                    .unwrap_or_default();

                report.halted = Some(Halt::Authentication {
                    dataset_id: record.id.clone(),
                    message,
                });
            }

            let summary = DatasetSummary::from_outcome(&record.id, &outcome);
            if let Err(err) = std::fs::create_dir_all(&record.output_dir)
                .map_err(CellrunError::from)
                .and_then(|_| summary.save(record.artifact(SUMMARY_SUFFIX)))
            {
                progress_warn(&format!("{} summary could not be written: {}", record.id, err));
            }

            report.record(summary);
        }

        report.finished_at = timestamp();

        let path = self.config.output_root.join(self.config.partition.report_name());
        if let Err(err) = report.save(&path) {
            progress_warn(&format!("Run report could not be written: {}", err));
        }

        Ok(report)
    }

    /// Drive one dataset from discovery to a terminal state
    pub fn process(&mut self, record: &DatasetRecord) -> Outcome {
        self.log_stage(record, Stage::Discovered);

        let outcome = match inspect(record) {
            Verdict::Skip(reason) => {
                discard_artifacts(record);
                Outcome::Skipped { reason }
            }
            Verdict::Fail(error) => {
                discard_artifacts(record);
                Outcome::GuardFailed { error }
            }
            Verdict::Proceed(dataset) => self.segment_and_annotate(record, &dataset),
        };

        let state = outcome.state();
        match outcome.error() {
            Some(err) => progress_warn(&format!("{} {}: {}", record.id, state, err)),
            None => progress_log(&format!("{} {}", record.id, state), self.config.verbose),
        }

        outcome
    }

    fn segment_and_annotate(&mut self, record: &DatasetRecord, dataset: &GuardedDataset) -> Outcome {
        if let Err(err) = std::fs::create_dir_all(&record.output_dir) {
            return Outcome::SegFailed {
                error: CellrunError::IoError(format!(
                    "{} could not be created: {}",
                    record.output_dir.display(),
                    err
                )),
            };
        }

        if let Err(error) = remove_artifacts(record) {
            return Outcome::SegFailed { error };
        }

        self.log_stage(record, Stage::Segmenting);

        let request = SegmentationRequest::new(&record.id, dataset, &record.output_dir);
        let segmentation = match self.segmenter.segment(&request) {
            Ok(segmentation) => segmentation,
            Err(err) => return Outcome::SegFailed { error: err.into() },
        };

        let written = segmentation
            .mask
            .save(record.artifact(MASK_SUFFIX))
            .and_then(|_| segmentation.morphology.to_dataframe())
            .and_then(|mut df| write_table_csv(&mut df, record.artifact(MORPHOLOGY_SUFFIX), true));

        if let Err(error) = written {
            return Outcome::SegFailed { error };
        }

        let objects = segmentation.morphology.len();

        progress_log(
            &format!(
                "{} {} ({} objects)",
                record.id,
                Stage::Segmented,
                thousands_format(objects)
            ),
            self.config.verbose,
        );

        self.log_stage(record, Stage::Annotating);

        let (types, attempts) = if segmentation.morphology.is_empty() {
            (Ok(TypeTable::default()), 0)
        } else {
            let request = AnnotationRequest {
                dataset_id: &record.id,
                morphology: &segmentation.morphology,
                markers: &dataset.config.markers,
                mpp: dataset.config.mpp,
                token: &self.config.token,
            };

            let annotator = &mut self.annotator;
            let verbose = self.config.verbose;
            let id = record.id.as_str();

            let attempted = self.config.retry.run(
                |attempt| {
                    progress_log(&format!("{} annotation attempt {}", id, attempt), verbose);
                    annotator
                        .annotate(&request)
                        .and_then(|predictions| TypeTable::reconcile(request.morphology, predictions))
                },
                |attempt, err, delay| {
                    progress_warn(&format!(
                        "{} annotation attempt {} failed ({}); retrying in {:.1}s",
                        id,
                        attempt,
                        err,
                        delay.as_secs_f64()
                    ))
                },
            );

            (attempted.result, attempted.attempts)
        };

        let types = match types {
            Ok(types) => types,
            Err(err) => {
                return Outcome::AnnFailed {
                    error: err.into(),
                    objects,
                    attempts,
                };
            }
        };

        let written = types
            .to_dataframe()
            .and_then(|mut df| write_table_csv(&mut df, record.artifact(TYPE_SUFFIX), true))
            .and_then(|_| population_dataframe(&types.population()))
            .and_then(|mut df| write_table_csv(&mut df, record.artifact(POPULATION_SUFFIX), true));

        if let Err(error) = written {
            return Outcome::AnnFailed {
                error,
                objects,
                attempts,
            };
        }

        Outcome::Complete {
            objects,
            typed: types.typed(),
            unclassified: types.unclassified(),
            attempts,
        }
    }

    fn log_stage(&self, record: &DatasetRecord, stage: Stage) {
        progress_log(&format!("{} {}", record.id, stage), self.config.verbose);
    }
}

/// Remove the result files an earlier run left for this dataset
///
/// The summary is not touched since every processed dataset rewrites it.
fn remove_artifacts(record: &DatasetRecord) -> Result<(), CellrunError> {
    for suffix in [MASK_SUFFIX, MORPHOLOGY_SUFFIX, TYPE_SUFFIX, POPULATION_SUFFIX] {
        let path = record.artifact(suffix);

        match std::fs::remove_file(&path) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                return Err(CellrunError::IoError(format!(
                    "{} could not be removed: {}",
                    path.display(),
                    err
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

fn discard_artifacts(record: &DatasetRecord) {
    if let Err(err) = remove_artifacts(record) {
        progress_warn(&format!("{} earlier results were kept: {}", record.id, err));
    }
}
