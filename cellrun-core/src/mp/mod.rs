pub mod morphology;

pub use morphology::{MorphologyTable, ObjectMorphology};
