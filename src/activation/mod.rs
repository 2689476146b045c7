pub mod activation;

pub use activation::{softmax, softmax_backward, ActivationFunction};
