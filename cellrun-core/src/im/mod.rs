mod mask;

pub use mask::LabelMask;
