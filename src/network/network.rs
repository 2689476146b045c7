use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::dense::Layer;
use crate::math::matrix::Matrix;
use crate::network::metadata::ModelMetadata;
use crate::network::prediction::{HeadLayout, Prediction};

/// Per-layer activations recorded during a forward pass.
#[derive(Debug, Clone)]
pub struct Trace {
    pre: Vec<Vec<f64>>,
    post: Vec<Vec<f64>>,
}

impl Trace {
    pub fn output(&self) -> &[f64] {
        self.post.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Accumulated `(weights_grad, biases_grad)` per layer.
#[derive(Debug, Clone)]
pub struct Gradients {
    pub layers: Vec<(Matrix, Vec<f64>)>,
}

impl Gradients {
    pub fn zeros_for(network: &Network) -> Gradients {
        let layers = network.layers.iter()
            .map(|l| (Matrix::zeros_like(&l.weights), vec![0.0; l.biases.len()]))
            .collect();
        Gradients { layers }
    }
}

/// Dense captcha network ending in a per-position logit head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
    pub layout: HeadLayout,
    #[serde(default)]
    pub metadata: Option<ModelMetadata>,
}

impl Network {
    /// Builds a network from (size, input_size, activation) tuples.
    ///
    /// # Panics
    /// Panics if the last layer's size differs from `layout.output_size()`.
    pub fn new(layer_specs: Vec<(usize, usize, ActivationFunction)>, layout: HeadLayout) -> Network {
        let layers: Vec<Layer> = layer_specs.into_iter()
            .map(|(size, input_size, activation)| Layer::new(size, input_size, activation))
            .collect();
        assert_eq!(
            layers.last().map_or(0, |l| l.size),
            layout.output_size(),
            "last layer must produce max_len * classes logits"
        );
        Network { layers, layout, metadata: None }
    }

    /// Number of charset symbols (the head adds one blank class on top).
    pub fn num_classes(&self) -> usize {
        self.layout.classes - 1
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, Layer::input_size)
    }

    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = layer.feed_from(&current).1;
        }
        current
    }

    pub fn forward_trace(&self, input: &[f64]) -> Trace {
        let mut pre = Vec::with_capacity(self.layers.len());
        let mut post: Vec<Vec<f64>> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let x = post.last().map(Vec::as_slice).unwrap_or(input);
            let (z, a) = layer.feed_from(x);
            pre.push(z);
            post.push(a);
        }
        Trace { pre, post }
    }

    pub fn predict(&self, images: &[Vec<f64>]) -> Prediction {
        Prediction {
            logits: images.iter().map(|img| self.forward(img)).collect(),
            layout: self.layout,
        }
    }

    /// Back-propagates `grad_output` (∂L/∂logits) for one sample and adds the
    /// parameter gradients into `grads`.
    pub fn backward(&self, input: &[f64], trace: &Trace, grad_output: &[f64], grads: &mut Gradients) {
        let mut delta = grad_output.to_vec();
        for i in (0..self.layers.len()).rev() {
            let layer_input = if i == 0 { input } else { trace.post[i - 1].as_slice() };
            let (w_grad, b_grad, input_delta) =
                self.layers[i].compute_gradients(&delta, layer_input, &trace.pre[i]);
            grads.layers[i].0 += &w_grad;
            for (acc, g) in grads.layers[i].1.iter_mut().zip(&b_grad) {
                *acc += g;
            }
            delta = input_delta;
        }
    }

    /// Packs every layer for the forward pass. Outputs do not change.
    pub fn compile(&mut self) {
        for layer in &mut self.layers {
            layer.pack();
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.layers.iter().all(Layer::is_packed)
    }

    /// Must be called after the weights are modified in place.
    pub fn weights_updated(&mut self) {
        for layer in &mut self.layers {
            layer.refresh_pack();
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|l| l.weights.data.len() + l.biases.len()).sum()
    }

    pub fn check_input(&self, input: &[f64]) -> Result<()> {
        if input.len() != self.input_size() {
            return Err(Error::ShapeMismatch { expected: self.input_size(), got: input.len() });
        }
        Ok(())
    }

    /// Checks that the last layer emits exactly `max_len * classes` logits.
    pub fn check_head(&self) -> Result<()> {
        let got = self.layers.last().map_or(0, |l| l.size);
        if got != self.layout.output_size() {
            return Err(Error::ShapeMismatch { expected: self.layout.output_size(), got });
        }
        Ok(())
    }

    /// Serializes the network weights to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a network from a JSON file previously written by `save_json`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Network> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let net: Network = serde_json::from_reader(reader)?;
        net.check_head()?;
        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tiny() -> Network {
        let layout = HeadLayout::new(2, 2);
        Network::new(
            vec![
                (5, 4, ActivationFunction::Tanh),
                (layout.output_size(), 5, ActivationFunction::Identity),
            ],
            layout,
        )
    }

    #[test]
    fn test_compiled_forward_matches_plain_forward() {
        let mut net = tiny();
        let x = [0.1, 0.9, -0.4, 0.3];
        let plain = net.forward(&x);
        net.compile();
        assert!(net.is_compiled());
        for (a, b) in plain.iter().zip(net.forward(&x)) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_backward_matches_finite_difference_on_first_layer() {
        let mut net = tiny();
        let x = [0.1, 0.9, -0.4, 0.3];
        // L = 0.5 * ||logits||², so ∂L/∂logits = logits.
        let trace = net.forward_trace(&x);
        let mut grads = Gradients::zeros_for(&net);
        net.backward(&x, &trace, trace.output(), &mut grads);

        let loss = |n: &Network| 0.5 * n.forward(&x).iter().map(|v| v * v).sum::<f64>();
        let h = 1e-6;
        net.layers[0].weights.data[3] += h;
        let up = loss(&net);
        net.layers[0].weights.data[3] -= 2.0 * h;
        let down = loss(&net);
        assert_abs_diff_eq!(grads.layers[0].0.data[3], (up - down) / (2.0 * h), epsilon = 1e-5);
    }

    #[test]
    fn test_json_round_trip_keeps_layout_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        let mut net = tiny();
        net.metadata = Some(ModelMetadata {
            charset: "ab".into(),
            width: 2,
            height: 2,
            max_len: 2,
            description: None,
        });
        net.save_json(&path).unwrap();
        let loaded = Network::load_json(&path).unwrap();
        assert_eq!(loaded.layout, net.layout);
        assert_eq!(loaded.metadata, net.metadata);
        for (a, b) in loaded.forward(&[0.5; 4]).iter().zip(net.forward(&[0.5; 4])) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_load_json_rejects_head_that_does_not_match_last_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        tiny().save_json(&path).unwrap();

        let mut value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        value["layout"]["max_len"] = serde_json::json!(3);
        std::fs::write(&path, value.to_string()).unwrap();
        assert!(matches!(Network::load_json(&path), Err(Error::ShapeMismatch { expected: 9, got: 6 })));
    }
}
