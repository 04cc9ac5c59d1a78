// Pipeline processing: one module per aggregation stage, in data-flow order

pub mod normalize;
pub mod canonicalize;
pub mod denominator;
pub mod merge;
pub mod estimate;
pub mod validate;
