pub mod cross_entropy;
pub mod huber;
pub mod loss_fn;
pub mod loss_type;
pub mod mae;
pub mod mse;

pub use cross_entropy::CrossEntropyLoss;
pub use loss_fn::{LossFn, LossValue};
pub use loss_type::{LossKind, WeightedLoss};
