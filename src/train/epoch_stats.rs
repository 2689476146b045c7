use serde::{Serialize, Deserialize};

/// Per-epoch summary emitted by `Trainer::fit`.
///
/// When a `progress_tx` channel is configured in `TrainerConfig`, the trainer
/// sends one `EpochStats` value at the end of every completed epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Optimizer steps taken so far.
    pub global_step: usize,
    /// Mean `total_loss` over the epoch's training batches.
    pub train_loss: f64,
    /// Mean validation `total_loss`, if a validation loader was given.
    pub val_loss: Option<f64>,
    /// Per-character accuracy as a fraction in [0, 1].
    pub train_accuracy: Option<f64>,
    pub val_accuracy: Option<f64>,
    /// Best whole-captcha validation accuracy so far, in percent.
    pub best_val_accuracy: Option<f64>,
    /// Learning rate after this epoch's scheduler step.
    pub lr: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}
