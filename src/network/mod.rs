pub mod metadata;
pub mod network;
pub mod prediction;
pub mod spec;

pub use metadata::ModelMetadata;
pub use network::{Gradients, Network, Trace};
pub use prediction::{HeadLayout, Prediction};
pub use spec::{LayerSpec, NetSpec};
