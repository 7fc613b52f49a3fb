pub mod annotate;
pub mod driver;
pub mod outcome;
pub mod report;
pub mod retry;
pub mod segment;
pub mod summary;

pub use annotate::{
    AnnotationError, AnnotationRequest, Annotator, AuthToken, PopulationRow, TypePrediction,
    TypeRow, TypeTable, population_dataframe,
};
pub use driver::{Driver, RunConfig, StopSignal};
pub use outcome::{Outcome, Stage, TerminalState};
pub use report::{Halt, RunReport};
pub use retry::{Attempted, RetryPolicy};
pub use segment::{Segmentation, SegmentationError, SegmentationRequest, Segmenter};
pub use summary::DatasetSummary;
