use std::path::Path;

use image::imageops::FilterType;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::charset::Charset;
use crate::error::{Error, Result};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// One captcha image with its encoded label.
#[derive(Debug, Clone)]
pub struct CaptchaSample {
    /// Grayscale pixels in [0, 1], row-major, `width * height` long.
    pub image: Vec<f64>,
    pub label: Vec<usize>,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CaptchaDataset {
    pub samples: Vec<CaptchaSample>,
    pub width: u32,
    pub height: u32,
}

/// Decodes an image file, resizes it to `width × height`, converts to
/// grayscale and normalizes pixels to [0, 1].
pub fn load_grayscale(path: &Path, width: u32, height: u32) -> Result<Vec<f64>> {
    let img = image::open(path)?;
    let resized = img.resize_exact(width, height, FilterType::Triangle);
    let gray = resized.to_luma8();
    Ok(gray.pixels().map(|p| p.0[0] as f64 / 255.0).collect())
}

/// Label of a captcha file: the file stem up to the first `_`, so
/// `x7k2_003.png` and `x7k2.png` both read as `x7k2`.
pub fn label_from_path(path: &Path) -> Option<&str> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.split('_').next())
        .filter(|s| !s.is_empty())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl CaptchaDataset {
    /// Loads every image in `dir` (non-recursive), in file-name order.
    pub fn from_dir(dir: impl AsRef<Path>, charset: &Charset, width: u32, height: u32) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        paths.sort();

        let mut samples = Vec::with_capacity(paths.len());
        for path in &paths {
            let Some(text) = label_from_path(path) else {
                log::warn!("Skipping {}: no label in file name", path.display());
                continue;
            };
            let label = charset.encode(text)?;
            let image = load_grayscale(path, width, height)?;
            samples.push(CaptchaSample { image, label, text: text.to_owned() });
        }

        if samples.is_empty() {
            return Err(Error::EmptyDataset(dir.display().to_string()));
        }
        log::info!("Loaded {} captchas from {}", samples.len(), dir.display());
        Ok(CaptchaDataset { samples, width, height })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Shuffles with `seed` and splits by `fractions`; rounding leftovers go
    /// to the first split.
    ///
    /// # Errors
    /// Fails when the fractions are negative or do not sum to 1.
    pub fn random_split(self, fractions: &[f64], seed: u64) -> Result<Vec<CaptchaDataset>> {
        let sum: f64 = fractions.iter().sum();
        if fractions.is_empty() || fractions.iter().any(|&f| f < 0.0) || (sum - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!("split fractions {fractions:?} must be >= 0 and sum to 1")));
        }

        let (width, height) = (self.width, self.height);
        let n = self.samples.len();
        let sizes = split_sizes(n, fractions);

        let mut samples = self.samples;
        samples.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut rest = samples.into_iter();
        Ok(sizes.into_iter()
            .map(|size| CaptchaDataset {
                samples: rest.by_ref().take(size).collect(),
                width,
                height,
            })
            .collect())
    }
}

/// Floors `fraction * n` per split after normalising the fractions, then
/// gives the remainder to the first split. The sizes always sum to `n`.
fn split_sizes(n: usize, fractions: &[f64]) -> Vec<usize> {
    let sum: f64 = fractions.iter().sum();
    let mut sizes: Vec<usize> = fractions
        .iter()
        .map(|f| (f / sum * n as f64).floor() as usize)
        .collect();
    let assigned: usize = sizes.iter().sum();
    if assigned <= n {
        sizes[0] += n - assigned;
    } else {
        // Rounding overshoot: take it back from the last splits.
        let mut excess = assigned - n;
        for size in sizes.iter_mut().rev() {
            let cut = excess.min(*size);
            *size -= cut;
            excess -= cut;
        }
    }
    sizes
}
