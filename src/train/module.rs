//! The captcha training module: loss aggregation, step handlers, epoch hooks
//! and optimizer configuration, called by [`Trainer`](crate::train::trainer::Trainer).

use serde::{Serialize, Deserialize};

use crate::data::batch::Batch;
use crate::error::{Error, Result};
use crate::logger::record::{Cadence, ExperimentEvent, RunStage, StepLog};
use crate::loss::loss_fn::LossFn;
use crate::metrics::{Accuracy, MaxMetric, MeanMetric};
use crate::network::network::{Gradients, Network, Trace};
use crate::network::prediction::Prediction;
use crate::optim::optimizer::{Optimizer, OptimizerConfig};
use crate::optim::scheduler::{LrScheduler, SchedulerConfig};
use crate::visualize::visualizer::Visualizer;

pub const TOTAL_LOSS: &str = "total_loss";
pub const MONITOR: &str = "val/total_loss";
pub const VAL_ACCURACY: &str = "val/Accuracy";
pub const TEST_ACCURACY: &str = "Test Dataset Accuracy";
pub const FIGURE_TAG: &str = "Predicted_Images";
pub const ACCURACY_TAG: &str = "Accuracy";
pub const DEFAULT_VISUALIZE_EVERY: usize = 100;

/// Which run the module is being prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    Fit,
    Validate,
    Test,
    Predict,
}

/// How test batches feed the `Test Dataset Accuracy` counters.
///
/// `LastBatch` overwrites the counters on every test batch, so only the final
/// batch reaches the epoch-end percentage. `Accumulate` sums every batch and
/// resets at test-epoch start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestAccuracyMode {
    #[default]
    LastBatch,
    Accumulate,
}

/// Named losses of one step. `total_loss` is always first.
#[derive(Debug, Clone, PartialEq)]
pub struct LossRecord {
    entries: Vec<(String, f64)>,
}

impl LossRecord {
    fn new() -> Self {
        LossRecord { entries: vec![(TOTAL_LOSS.to_owned(), 0.0)] }
    }

    /// Sets `name`, replacing an earlier value under the same name.
    fn insert(&mut self, name: &str, value: f64) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_owned(), value)),
        }
    }

    fn add_to_total(&mut self, value: f64) {
        self.entries[0].1 += value;
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn total(&self) -> f64 {
        self.entries[0].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Output of [`CaptchaModule::model_step`].
#[derive(Debug, Clone)]
pub struct ModelStep {
    pub losses: LossRecord,
    pub prediction: Prediction,
    /// Weighted sum of every loss gradient w.r.t. the logits.
    pub grad: Vec<Vec<f64>>,
    traces: Vec<Trace>,
}

/// Position of a step inside the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepContext {
    pub batch_idx: usize,
    pub global_step: usize,
}

pub struct TrainStepOutput {
    pub loss: f64,
    pub grads: Gradients,
    pub log: StepLog,
}

/// When the trainer steps the scheduler. Only epoch-end stepping exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Epoch,
}

pub struct SchedulerSetup {
    pub scheduler: Box<dyn LrScheduler>,
    pub monitor: String,
    pub interval: Interval,
    pub frequency: usize,
}

/// Result of [`CaptchaModule::configure_optimizers`].
pub struct OptimizerSetup {
    pub optimizer: Box<dyn Optimizer>,
    pub lr_scheduler: Option<SchedulerSetup>,
}

/// Lifecycle adapter for captcha recognition.
///
/// Owns the network, the loss terms and the running metrics. The trainer
/// calls the hooks in stage order; every hook returns the records it wants
/// logged instead of writing them itself.
pub struct CaptchaModule {
    net: Network,
    loss_fns: Vec<Box<dyn LossFn>>,
    optimizer: OptimizerConfig,
    scheduler: Option<SchedulerConfig>,
    visualizer: Box<dyn Visualizer>,
    compile: bool,
    visualize_every: usize,
    test_accuracy_mode: TestAccuracyMode,

    train_acc: Accuracy,
    val_acc: Accuracy,
    test_acc: Accuracy,
    train_loss: MeanMetric,
    val_loss: MeanMetric,
    test_loss: MeanMetric,
    val_acc_best: MaxMetric,

    correct_count: usize,
    total_count: usize,
}

impl CaptchaModule {
    pub fn new(
        net: Network,
        optimizer: OptimizerConfig,
        loss_fns: Vec<Box<dyn LossFn>>,
        scheduler: Option<SchedulerConfig>,
        visualizer: Box<dyn Visualizer>,
    ) -> Self {
        // Charset symbols plus the blank class.
        let num_classes = net.num_classes() + 1;
        CaptchaModule {
            net,
            loss_fns,
            optimizer,
            scheduler,
            visualizer,
            compile: false,
            visualize_every: DEFAULT_VISUALIZE_EVERY,
            test_accuracy_mode: TestAccuracyMode::default(),
            train_acc: Accuracy::new(num_classes),
            val_acc: Accuracy::new(num_classes),
            test_acc: Accuracy::new(num_classes),
            train_loss: MeanMetric::new(),
            val_loss: MeanMetric::new(),
            test_loss: MeanMetric::new(),
            val_acc_best: MaxMetric::new(),
            correct_count: 0,
            total_count: 0,
        }
    }

    pub fn with_compile(mut self, compile: bool) -> Self {
        self.compile = compile;
        self
    }

    /// # Panics
    /// Panics if `every == 0`.
    pub fn with_visualize_every(mut self, every: usize) -> Self {
        assert!(every > 0, "visualize_every must be at least 1");
        self.visualize_every = every;
        self
    }

    pub fn with_test_accuracy_mode(mut self, mode: TestAccuracyMode) -> Self {
        self.test_accuracy_mode = mode;
        self
    }

    pub fn net(&self) -> &Network {
        &self.net
    }

    pub fn net_mut(&mut self) -> &mut Network {
        &mut self.net
    }

    pub fn forward(&self, images: &[Vec<f64>]) -> Prediction {
        self.net.predict(images)
    }

    fn check_batch(&self, batch: &Batch) -> Result<()> {
        if batch.labels.len() != batch.images.len() {
            return Err(Error::ShapeMismatch { expected: batch.images.len(), got: batch.labels.len() });
        }
        for image in &batch.images {
            self.net.check_input(image)?;
        }
        let max_len = self.net.layout.max_len;
        if let Some(label) = batch.labels.iter().find(|l| l.len() != max_len) {
            return Err(Error::ShapeMismatch { expected: max_len, got: label.len() });
        }
        let classes = self.net.layout.classes;
        if let Some(&class) = batch.labels.iter().flatten().find(|&&c| c >= classes) {
            return Err(Error::ShapeMismatch { expected: classes, got: class });
        }
        Ok(())
    }

    /// Forward pass plus every loss term, weighted and summed into `total_loss`.
    pub fn model_step(&self, batch: &Batch) -> Result<ModelStep> {
        self.check_batch(batch)?;

        let traces: Vec<Trace> = batch.images.iter().map(|img| self.net.forward_trace(img)).collect();
        let prediction = Prediction {
            logits: traces.iter().map(|t| t.output().to_vec()).collect(),
            layout: self.net.layout,
        };

        let mut losses = LossRecord::new();
        let mut grad: Vec<Vec<f64>> = prediction.logits.iter().map(|l| vec![0.0; l.len()]).collect();
        for loss_fn in &self.loss_fns {
            let value = loss_fn.evaluate(&prediction, &batch.images, &batch.labels);
            let weight = loss_fn.weight();
            losses.insert(loss_fn.tag(), value.value);
            losses.add_to_total(value.value * weight);
            for (acc, g) in grad.iter_mut().zip(&value.grad) {
                for (a, x) in acc.iter_mut().zip(g) {
                    *a += weight * x;
                }
            }
        }

        Ok(ModelStep { losses, prediction, grad, traces })
    }

    fn log_losses(log: &mut StepLog, stage: RunStage, losses: &LossRecord, batch_size: usize) {
        for (name, value) in losses.iter() {
            log.log(stage.metric(name), value, Cadence::EPOCH, true, batch_size);
        }
    }

    pub fn on_train_start(&mut self) {
        // Sanity-check validation batches must not leak into the first epoch.
        self.val_loss.reset();
        self.val_acc.reset();
        self.val_acc_best.reset();
    }

    pub fn on_train_epoch_start(&mut self) {
        self.train_loss.reset();
        self.train_acc.reset();
    }

    pub fn training_step(&mut self, batch: &Batch, _ctx: StepContext) -> Result<TrainStepOutput> {
        let step = self.model_step(batch)?;
        let loss = step.losses.total();
        self.train_loss.update(loss);
        self.train_acc.update(&step.prediction, &batch.labels);

        let mut log = StepLog::default();
        Self::log_losses(&mut log, RunStage::Train, &step.losses, batch.len());

        let mut grads = Gradients::zeros_for(&self.net);
        for ((image, trace), g) in batch.images.iter().zip(&step.traces).zip(&step.grad) {
            self.net.backward(image, trace, g, &mut grads);
        }
        Ok(TrainStepOutput { loss, grads, log })
    }

    pub fn on_train_epoch_end(&mut self) -> StepLog {
        StepLog::default()
    }

    pub fn on_validation_epoch_start(&mut self) {
        self.val_loss.reset();
        self.val_acc.reset();
    }

    pub fn validation_step(&mut self, batch: &Batch, ctx: StepContext) -> Result<StepLog> {
        let step = self.model_step(batch)?;
        self.val_loss.update(step.losses.total());
        self.val_acc.update(&step.prediction, &batch.labels);

        let mut log = StepLog::default();
        Self::log_losses(&mut log, RunStage::Val, &step.losses, batch.len());

        if ctx.batch_idx % self.visualize_every == 0 {
            let (figure, accuracy) = self.visualizer.visualize_prediction(&self.net, &batch.images, &batch.labels);
            log.events.push(ExperimentEvent::Figure {
                tag: FIGURE_TAG.to_owned(),
                figure,
                step: ctx.global_step,
            });
            log.events.push(ExperimentEvent::Scalar {
                tag: ACCURACY_TAG.to_owned(),
                value: accuracy,
                step: ctx.global_step,
            });
            log.log(VAL_ACCURACY, accuracy, Cadence::EPOCH, true, batch.len());
            self.val_acc_best.update(accuracy);
        }
        Ok(log)
    }

    pub fn on_validation_epoch_end(&mut self) -> StepLog {
        StepLog::default()
    }

    pub fn on_test_epoch_start(&mut self) {
        self.test_loss.reset();
        self.test_acc.reset();
        if self.test_accuracy_mode == TestAccuracyMode::Accumulate {
            self.correct_count = 0;
            self.total_count = 0;
        }
    }

    pub fn test_step(&mut self, batch: &Batch, _ctx: StepContext) -> Result<StepLog> {
        let step = self.model_step(batch)?;

        let (correct, total) = self.visualizer.get_accuracy(&self.net, &batch.images, &batch.labels);
        match self.test_accuracy_mode {
            TestAccuracyMode::LastBatch => {
                self.correct_count = correct;
                self.total_count = total;
            }
            TestAccuracyMode::Accumulate => {
                self.correct_count += correct;
                self.total_count += total;
            }
        }

        self.test_loss.update(step.losses.total());
        self.test_acc.update(&step.prediction, &batch.labels);

        let mut log = StepLog::default();
        Self::log_losses(&mut log, RunStage::Test, &step.losses, batch.len());
        Ok(log)
    }

    /// Logs `Test Dataset Accuracy` as a percentage of the counters.
    pub fn on_test_epoch_end(&mut self) -> Result<StepLog> {
        if self.total_count == 0 {
            return Err(Error::EmptyTestEpoch);
        }
        let accuracy = self.correct_count as f64 / self.total_count as f64 * 100.0;
        let mut log = StepLog::default();
        log.log(TEST_ACCURACY, accuracy, Cadence::EPOCH, false, 1);
        Ok(log)
    }

    pub fn setup(&mut self, stage: SetupStage) {
        if self.compile && stage == SetupStage::Fit {
            self.net.compile();
            log::info!("Compiled network ({} parameters)", self.net.parameter_count());
        }
    }

    pub fn configure_optimizers(&self) -> OptimizerSetup {
        let optimizer = self.optimizer.build(&self.net);
        let lr_scheduler = self.scheduler.as_ref().map(|factory| SchedulerSetup {
            scheduler: factory.build(optimizer.as_ref()),
            monitor: MONITOR.to_owned(),
            interval: Interval::Epoch,
            frequency: 1,
        });
        OptimizerSetup { optimizer, lr_scheduler }
    }

    /// Mean training loss and per-character accuracy of the current epoch.
    pub fn train_summary(&self) -> (Option<f64>, Option<f64>) {
        (self.train_loss.compute(), self.train_acc.compute())
    }

    pub fn val_summary(&self) -> (Option<f64>, Option<f64>) {
        (self.val_loss.compute(), self.val_acc.compute())
    }

    pub fn test_summary(&self) -> (Option<f64>, Option<f64>) {
        (self.test_loss.compute(), self.test_acc.compute())
    }

    /// Highest visualizer accuracy seen on validation since training started.
    pub fn best_val_accuracy(&self) -> Option<f64> {
        self.val_acc_best.compute()
    }

    /// `(correct, total)` feeding `Test Dataset Accuracy`.
    pub fn test_counters(&self) -> (usize, usize) {
        (self.correct_count, self.total_count)
    }
}
