//! Experiment configuration, read from a JSON file.
//!
//! ```json
//! {
//!   "data": { "data_dir": "captchas", "charset": "0123456789", "width": 96,
//!             "height": 32, "max_len": 5 },
//!   "losses": [ { "tag": "cross_entropy", "kind": "cross_entropy" } ],
//!   "optimizer": { "type": "adam", "lr": 0.001 },
//!   "scheduler": { "type": "reduce_on_plateau", "patience": 3 },
//!   "trainer": { "max_epochs": 30 }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::data::charset::Charset;
use crate::data::dataset::CaptchaDataset;
use crate::data::loader::DataLoader;
use crate::error::{Error, Result};
use crate::loss::loss_fn::LossFn;
use crate::loss::loss_type::{LossKind, WeightedLoss};
use crate::network::metadata::ModelMetadata;
use crate::network::network::Network;
use crate::network::prediction::HeadLayout;
use crate::network::spec::NetSpec;
use crate::optim::optimizer::OptimizerConfig;
use crate::optim::scheduler::SchedulerConfig;
use crate::train::module::{CaptchaModule, TestAccuracyMode, DEFAULT_VISUALIZE_EVERY};
use crate::train::train_config::{TrainerConfig, DEFAULT_SANITY_VAL_STEPS};
use crate::visualize::visualizer::DataVisualizer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory of `<label>[_<n>].<ext>` images.
    pub data_dir: PathBuf,
    /// Train / validation / test fractions.
    #[serde(default = "default_split")]
    pub split: [f64; 3],
    pub charset: String,
    pub width: u32,
    pub height: u32,
    pub max_len: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seeds the split and the per-epoch shuffles.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerSettings {
    #[serde(default = "default_max_epochs")]
    pub max_epochs: usize,
    #[serde(default = "default_sanity_val_steps")]
    pub sanity_val_steps: usize,
    #[serde(default = "default_visualize_every")]
    pub visualize_every: usize,
    #[serde(default)]
    pub test_accuracy: TestAccuracyMode,
    /// Best-validation checkpoint; defaults to `<run_dir>/best.json`.
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        TrainerSettings {
            max_epochs: default_max_epochs(),
            sanity_val_steps: default_sanity_val_steps(),
            visualize_every: default_visualize_every(),
            test_accuracy: TestAccuracyMode::default(),
            checkpoint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub data: DataConfig,
    #[serde(default)]
    pub net: NetSpec,
    #[serde(default = "default_losses")]
    pub losses: Vec<WeightedLoss>,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
    /// Pack the network for faster forward passes during `fit`.
    #[serde(default)]
    pub compile: bool,
    #[serde(default)]
    pub trainer: TrainerSettings,
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,
}

fn default_split() -> [f64; 3] { [0.8, 0.1, 0.1] }
fn default_batch_size() -> usize { 32 }
fn default_max_epochs() -> usize { 10 }
fn default_sanity_val_steps() -> usize { DEFAULT_SANITY_VAL_STEPS }
fn default_visualize_every() -> usize { DEFAULT_VISUALIZE_EVERY }
fn default_run_dir() -> PathBuf { PathBuf::from("runs/captcha") }

fn default_losses() -> Vec<WeightedLoss> {
    vec![WeightedLoss::new("cross_entropy", 1.0, LossKind::CrossEntropy)]
}

/// Train / validation / test loaders.
pub struct Splits {
    pub train: DataLoader,
    pub val: DataLoader,
    pub test: DataLoader,
}

impl ExperimentConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: ExperimentConfig = serde_json::from_str(&json)?;
        config.validate()?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let d = &self.data;
        if d.width == 0 || d.height == 0 {
            return Err(Error::Config(format!("image size {}x{} must be non-zero", d.width, d.height)));
        }
        if d.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        let sum: f64 = d.split.iter().sum();
        if d.split.iter().any(|&f| f < 0.0) || (sum - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!("split {:?} must be >= 0 and sum to 1", d.split)));
        }
        if self.optimizer.lr() <= 0.0 {
            return Err(Error::Config(format!("learning rate {} must be > 0", self.optimizer.lr())));
        }
        if self.trainer.max_epochs == 0 {
            return Err(Error::Config("max_epochs must be at least 1".into()));
        }
        if self.trainer.visualize_every == 0 {
            return Err(Error::Config("visualize_every must be at least 1".into()));
        }
        if let Some(bad) = self.losses.iter().find(|l| !l.weight.is_finite()) {
            return Err(Error::Config(format!("loss {:?} has non-finite weight", bad.tag)));
        }
        if self.net.hidden.iter().any(|l| l.size == 0) {
            return Err(Error::Config("hidden layer sizes must be non-zero".into()));
        }
        self.charset()?;
        Ok(())
    }

    pub fn charset(&self) -> Result<Charset> {
        Charset::new(&self.data.charset, self.data.max_len)
    }

    pub fn input_size(&self) -> usize {
        (self.data.width * self.data.height) as usize
    }

    /// Fresh network with metadata attached for later inference.
    pub fn build_network(&self) -> Result<Network> {
        let charset = self.charset()?;
        let mut net = self.net.build(self.input_size(), HeadLayout::new(charset.max_len(), charset.len()));
        net.metadata = Some(ModelMetadata {
            charset: charset.as_string(),
            width: self.data.width,
            height: self.data.height,
            max_len: charset.max_len(),
            description: None,
        });
        Ok(net)
    }

    /// Wraps `net` with this config's losses, optimizer and visualizer.
    pub fn build_module(&self, net: Network) -> Result<CaptchaModule> {
        let charset = self.charset()?;
        if net.num_classes() != charset.len() || net.layout.max_len != charset.max_len() {
            return Err(Error::Config(format!(
                "network head ({} positions, {} symbols) does not match charset ({}, {})",
                net.layout.max_len, net.num_classes(), charset.max_len(), charset.len(),
            )));
        }
        net.check_input(&vec![0.0; self.input_size()])?;
        net.check_head()?;

        let losses: Vec<Box<dyn LossFn>> = self.losses.iter()
            .cloned()
            .map(|l| Box::new(l) as Box<dyn LossFn>)
            .collect();
        let visualizer = DataVisualizer::new(charset, self.data.width, self.data.height);
        Ok(CaptchaModule::new(net, self.optimizer.clone(), losses, self.scheduler.clone(), Box::new(visualizer))
            .with_compile(self.compile)
            .with_visualize_every(self.trainer.visualize_every)
            .with_test_accuracy_mode(self.trainer.test_accuracy))
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.trainer.checkpoint.clone().unwrap_or_else(|| self.run_dir.join("best.json"))
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        let mut config = TrainerConfig::new(self.trainer.max_epochs);
        config.sanity_val_steps = self.trainer.sanity_val_steps;
        config.checkpoint_path = Some(self.checkpoint_path());
        config
    }

    /// Loads `data_dir` and splits it into shuffled training and ordered
    /// evaluation loaders.
    pub fn load_splits(&self) -> Result<Splits> {
        let charset = self.charset()?;
        let d = &self.data;
        let dataset = CaptchaDataset::from_dir(&d.data_dir, &charset, d.width, d.height)?;
        let seed = d.seed.unwrap_or(0);
        let mut parts = dataset.random_split(&d.split, seed)?.into_iter();
        let (Some(train), Some(val), Some(test)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::Config("split must have three parts".into()));
        };
        log::info!("Split: {} train, {} val, {} test", train.len(), val.len(), test.len());
        if train.is_empty() {
            return Err(Error::EmptyDataset("training split".into()));
        }
        Ok(Splits {
            train: DataLoader::new(train, d.batch_size).shuffled(d.seed),
            val: DataLoader::new(val, d.batch_size),
            test: DataLoader::new(test, d.batch_size),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::spec::LayerSpec;
    use crate::activation::activation::ActivationFunction;

    const MINIMAL: &str = r#"{
        "data": { "data_dir": "captchas", "charset": "abc", "width": 4, "height": 2, "max_len": 3 }
    }"#;

    #[test]
    fn test_minimal_config_takes_defaults() {
        let config: ExperimentConfig = serde_json::from_str(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.data.split, [0.8, 0.1, 0.1]);
        assert_eq!(config.data.batch_size, 32);
        assert_eq!(config.losses.len(), 1);
        assert_eq!(config.optimizer, OptimizerConfig::default());
        assert!(config.scheduler.is_none());
        assert_eq!(config.trainer.visualize_every, 100);
        assert_eq!(config.trainer.test_accuracy, TestAccuracyMode::LastBatch);
        assert_eq!(config.checkpoint_path(), PathBuf::from("runs/captcha/best.json"));
    }

    #[test]
    fn test_full_config_parses() {
        let json = r#"{
            "data": { "data_dir": "d", "split": [0.6, 0.2, 0.2], "charset": "0123456789",
                      "width": 8, "height": 4, "max_len": 4, "batch_size": 8, "seed": 3 },
            "net": { "hidden": [ { "size": 16, "activation": "ReLU" } ] },
            "losses": [
                { "tag": "ce", "kind": "cross_entropy" },
                { "tag": "huber", "weight": 0.5, "kind": "huber" }
            ],
            "optimizer": { "type": "sgd", "lr": 0.1, "momentum": 0.9 },
            "scheduler": { "type": "step_lr", "step_size": 5 },
            "compile": true,
            "trainer": { "max_epochs": 3, "test_accuracy": "accumulate" },
            "run_dir": "runs/x"
        }"#;
        let config: ExperimentConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.losses[0].weight, 1.0);
        assert_eq!(config.losses[1].weight, 0.5);
        assert_eq!(config.scheduler, Some(SchedulerConfig::StepLr { step_size: 5, gamma: 0.1 }));
        assert_eq!(config.trainer.test_accuracy, TestAccuracyMode::Accumulate);

        let net = config.build_network().unwrap();
        assert_eq!(net.input_size(), 32);
        assert_eq!(net.layout.output_size(), 4 * 11);
        assert_eq!(net.metadata.as_ref().map(|m| m.charset.as_str()), Some("0123456789"));
        let module = config.build_module(net).unwrap();
        assert_eq!(module.net().num_classes(), 10);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base: ExperimentConfig = serde_json::from_str(MINIMAL).unwrap();

        let mut c = base.clone();
        c.data.split = [0.5, 0.2, 0.2];
        assert!(matches!(c.validate(), Err(Error::Config(_))));

        let mut c = base.clone();
        c.data.batch_size = 0;
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.data.charset = "aa".into();
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.trainer.visualize_every = 0;
        assert!(c.validate().is_err());

        let mut c = base;
        c.optimizer = OptimizerConfig::Sgd { lr: 0.0, momentum: 0.0, weight_decay: 0.0 };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_build_module_rejects_mismatched_network() {
        let config: ExperimentConfig = serde_json::from_str(MINIMAL).unwrap();
        let other = NetSpec { hidden: vec![LayerSpec { size: 4, activation: ActivationFunction::Tanh }] }
            .build(8, HeadLayout::new(2, 3));
        assert!(matches!(config.build_module(other), Err(Error::Config(_))));
    }

    #[test]
    fn test_build_module_rejects_truncated_layer_stack() {
        let config: ExperimentConfig = serde_json::from_str(MINIMAL).unwrap();
        let mut net = config.build_network().unwrap();
        net.layers.pop();
        assert!(matches!(config.build_module(net), Err(Error::ShapeMismatch { expected: 12, got: 128 })));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, MINIMAL).unwrap();
        assert_eq!(ExperimentConfig::load(&path).unwrap().data.max_len, 3);
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(ExperimentConfig::load(&path), Err(Error::Json(_))));
    }
}
