pub mod visualizer;

pub use visualizer::{DataVisualizer, Figure, Visualizer};
