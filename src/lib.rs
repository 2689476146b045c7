pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod metrics;
pub mod data;
pub mod visualize;
pub mod logger;
pub mod train;
pub mod config;
pub mod error;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::network::Network;
pub use network::prediction::{HeadLayout, Prediction};
pub use loss::loss_fn::LossFn;
pub use loss::loss_type::{LossKind, WeightedLoss};
pub use data::charset::Charset;
pub use visualize::visualizer::{DataVisualizer, Visualizer};
pub use logger::experiment::{Experiment, RunDirectory};
pub use train::module::CaptchaModule;
pub use train::trainer::Trainer;
pub use config::ExperimentConfig;
pub use error::{Error, Result};
