//! Land-cover algorithms
//!
//! - **proportions**: per-class pixel shares of a categorical band, using a lookup table

mod proportions;

pub use proportions::{
    class_proportions, class_proportions_from_file, ClassProportions, ClassProportionsParams,
    ClassShare, ProportionHistogram, MAX_CLASS_CODE,
};

pub(crate) use proportions::round_to;
