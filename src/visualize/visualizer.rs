use image::{Rgb, RgbImage};

use crate::data::charset::Charset;
use crate::network::network::Network;
use crate::network::prediction::Prediction;

/// Figure produced for the experiment log.
pub type Figure = RgbImage;

/// Inspects the network on a batch: renders predictions and counts whole
/// captchas read correctly.
pub trait Visualizer {
    /// Returns a figure of the batch and the whole-captcha accuracy in percent.
    fn visualize_prediction(&self, net: &Network, images: &[Vec<f64>], labels: &[Vec<usize>]) -> (Figure, f64);

    /// Returns `(correct, total)` whole-captcha counts for the batch.
    fn get_accuracy(&self, net: &Network, images: &[Vec<f64>], labels: &[Vec<usize>]) -> (usize, usize);
}

const BAR_HEIGHT: u32 = 4;
const PADDING: u32 = 2;
const CORRECT: Rgb<u8> = Rgb([40, 170, 60]);
const WRONG: Rgb<u8> = Rgb([210, 50, 40]);
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Default visualizer: greedy per-position decoding and a tiled figure.
///
/// Each tile is the grayscale input with a bar underneath, green when the
/// decoded text equals the label and red otherwise.
#[derive(Debug, Clone)]
pub struct DataVisualizer {
    charset: Charset,
    width: u32,
    height: u32,
    max_tiles: usize,
    columns: u32,
}

impl DataVisualizer {
    pub fn new(charset: Charset, width: u32, height: u32) -> Self {
        DataVisualizer { charset, width, height, max_tiles: 16, columns: 4 }
    }

    pub fn with_grid(mut self, max_tiles: usize, columns: u32) -> Self {
        self.max_tiles = max_tiles.max(1);
        self.columns = columns.max(1);
        self
    }

    /// Decoded prediction and decoded label for each sample.
    pub fn decode(&self, prediction: &Prediction, labels: &[Vec<usize>]) -> Vec<(String, String)> {
        labels.iter()
            .enumerate()
            .take(prediction.len())
            .map(|(i, label)| (self.charset.decode(&prediction.argmax(i)), self.charset.decode(label)))
            .collect()
    }

    fn render(&self, images: &[Vec<f64>], verdicts: &[bool]) -> Figure {
        let tiles = verdicts.len().min(self.max_tiles) as u32;
        let columns = self.columns.min(tiles.max(1));
        let rows = tiles.div_ceil(columns).max(1);
        let tile_w = self.width + PADDING;
        let tile_h = self.height + BAR_HEIGHT + PADDING;
        let mut figure = RgbImage::from_pixel(columns * tile_w + PADDING, rows * tile_h + PADDING, BACKGROUND);

        for (t, (image, &ok)) in images.iter().zip(verdicts).take(tiles as usize).enumerate() {
            let x0 = PADDING + (t as u32 % columns) * tile_w;
            let y0 = PADDING + (t as u32 / columns) * tile_h;
            for y in 0..self.height {
                for x in 0..self.width {
                    let v = image.get((y * self.width + x) as usize).copied().unwrap_or(0.0);
                    let level = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                    figure.put_pixel(x0 + x, y0 + y, Rgb([level, level, level]));
                }
            }
            let colour = if ok { CORRECT } else { WRONG };
            for y in 0..BAR_HEIGHT {
                for x in 0..self.width {
                    figure.put_pixel(x0 + x, y0 + self.height + y, colour);
                }
            }
        }
        figure
    }
}

impl Visualizer for DataVisualizer {
    fn visualize_prediction(&self, net: &Network, images: &[Vec<f64>], labels: &[Vec<usize>]) -> (Figure, f64) {
        let decoded = self.decode(&net.predict(images), labels);
        let verdicts: Vec<bool> = decoded.iter().map(|(p, l)| p == l).collect();
        for (predicted, expected) in decoded.iter().take(self.max_tiles) {
            log::debug!("predicted {predicted:?}, expected {expected:?}");
        }

        let correct = verdicts.iter().filter(|&&ok| ok).count();
        let accuracy = if verdicts.is_empty() {
            0.0
        } else {
            correct as f64 / verdicts.len() as f64 * 100.0
        };
        (self.render(images, &verdicts), accuracy)
    }

    fn get_accuracy(&self, net: &Network, images: &[Vec<f64>], labels: &[Vec<usize>]) -> (usize, usize) {
        let decoded = self.decode(&net.predict(images), labels);
        let correct = decoded.iter().filter(|(p, l)| p == l).count();
        (correct, decoded.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::network::prediction::HeadLayout;

    /// 2×1 images; the head reads class 1 at position 0 and blank at position 1
    /// whenever the first pixel is bright.
    fn network() -> Network {
        let layout = HeadLayout::new(2, 1);
        let mut net = Network::new(vec![(4, 2, ActivationFunction::Identity)], layout);
        net.layers[0].weights.data = vec![
            -5.0, 5.0, 5.0, -5.0,
            0.0, 0.0, 0.0, 0.0,
        ];
        net.layers[0].biases = vec![2.5, -2.5, 1.0, 0.0];
        net
    }

    fn visualizer() -> DataVisualizer {
        DataVisualizer::new(Charset::new("x", 2).unwrap(), 2, 1)
    }

    #[test]
    fn test_get_accuracy_compares_whole_strings() {
        let images = vec![vec![1.0, 0.0], vec![0.0, 0.0], vec![1.0, 1.0]];
        let labels = vec![vec![1, 0], vec![0, 0], vec![1, 1]];
        // Bright first pixel decodes "x"; dark decodes "".
        assert_eq!(visualizer().get_accuracy(&network(), &images, &labels), (2, 3));
    }

    #[test]
    fn test_figure_has_one_tile_per_sample_with_verdict_bar() {
        let images = vec![vec![1.0, 0.0], vec![0.0, 0.0]];
        let labels = vec![vec![1, 0], vec![1, 0]];
        let (figure, accuracy) = visualizer().with_grid(16, 4).visualize_prediction(&network(), &images, &labels);
        assert_eq!(accuracy, 50.0);
        // Two columns of (2 + 2) px plus leading padding; one row of (1 + 4 + 2) px plus padding.
        assert_eq!(figure.dimensions(), (10, 9));
        assert_eq!(*figure.get_pixel(PADDING, PADDING + 1), CORRECT);
        assert_eq!(*figure.get_pixel(PADDING + 4, PADDING + 1), WRONG);
        assert_eq!(*figure.get_pixel(PADDING, PADDING), Rgb([255, 255, 255]));
    }
}
