use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::network::network::Network;
use crate::network::prediction::HeadLayout;

/// One hidden layer of the captcha network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSpec {
    pub size: usize,
    pub activation: ActivationFunction,
}

/// Architecture description: hidden stack between the flattened image and
/// the `max_len × (num_classes + 1)` logit head.
///
/// Input and output sizes are not stored here; they follow from the data
/// configuration when the network is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetSpec {
    pub hidden: Vec<LayerSpec>,
}

impl Default for NetSpec {
    fn default() -> Self {
        NetSpec {
            hidden: vec![
                LayerSpec { size: 256, activation: ActivationFunction::ReLU },
                LayerSpec { size: 128, activation: ActivationFunction::ReLU },
            ],
        }
    }
}

impl NetSpec {
    pub fn build(&self, input_size: usize, layout: HeadLayout) -> Network {
        let mut specs = Vec::with_capacity(self.hidden.len() + 1);
        let mut fan_in = input_size;
        for layer in &self.hidden {
            specs.push((layer.size, fan_in, layer.activation));
            fan_in = layer.size;
        }
        specs.push((layout.output_size(), fan_in, ActivationFunction::Identity));
        Network::new(specs, layout)
    }
}
