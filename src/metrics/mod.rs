//! Running metrics owned by the training module.

pub mod accuracy;
pub mod max;
pub mod mean;

pub use accuracy::Accuracy;
pub use max::MaxMetric;
pub use mean::MeanMetric;
