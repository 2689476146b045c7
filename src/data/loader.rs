use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::batch::Batch;
use crate::data::dataset::CaptchaDataset;

/// Splits a dataset into batches, optionally reshuffling every epoch.
///
/// With a seed, epoch `e` is shuffled with `seed + e`, so runs are
/// reproducible while still seeing a new order each epoch.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: CaptchaDataset,
    batch_size: usize,
    shuffle: bool,
    seed: Option<u64>,
}

impl DataLoader {
    /// # Panics
    /// Panics if `batch_size == 0`.
    pub fn new(dataset: CaptchaDataset, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be at least 1");
        DataLoader { dataset, batch_size, shuffle: false, seed: None }
    }

    pub fn shuffled(mut self, seed: Option<u64>) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }

    pub fn dataset(&self) -> &CaptchaDataset {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches per epoch; the last one may be partial.
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn iter(&self, epoch: usize) -> impl Iterator<Item = Batch> + '_ {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            match self.seed {
                Some(seed) => order.shuffle(&mut StdRng::seed_from_u64(seed.wrapping_add(epoch as u64))),
                None => order.shuffle(&mut rand::thread_rng()),
            }
        }

        let batch_size = self.batch_size;
        (0..self.num_batches()).map(move |b| {
            let chunk = &order[b * batch_size..((b + 1) * batch_size).min(order.len())];
            let samples = &self.dataset.samples;
            Batch {
                images: chunk.iter().map(|&i| samples[i].image.clone()).collect(),
                labels: chunk.iter().map(|&i| samples[i].label.clone()).collect(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::CaptchaSample;

    fn dataset(n: usize) -> CaptchaDataset {
        CaptchaDataset {
            samples: (0..n)
                .map(|i| CaptchaSample { image: vec![i as f64], label: vec![i], text: String::new() })
                .collect(),
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn test_keeps_partial_last_batch() {
        let loader = DataLoader::new(dataset(5), 2);
        let sizes: Vec<usize> = loader.iter(0).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(loader.num_batches(), 3);
    }

    #[test]
    fn test_seeded_shuffle_covers_every_sample_once() {
        let loader = DataLoader::new(dataset(10), 3).shuffled(Some(11));
        let mut seen: Vec<usize> = loader.iter(0).flat_map(|b| b.labels).map(|l| l[0]).collect();
        let again: Vec<usize> = loader.iter(0).flat_map(|b| b.labels).map(|l| l[0]).collect();
        assert_eq!(seen, again);
        seen.sort();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }
}
