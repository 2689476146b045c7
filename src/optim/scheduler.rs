//! Learning rate schedulers

use std::f64::consts::PI;

use serde::{Serialize, Deserialize};

use crate::optim::optimizer::Optimizer;

/// Learning rate scheduler, stepped by the trainer at the configured interval.
pub trait LrScheduler {
    /// Advances the schedule and writes the new rate into `optimizer`.
    ///
    /// `monitored` is the latest value of the monitored metric, if one was
    /// logged; only schedulers with `uses_monitor() == true` read it.
    fn step(&mut self, optimizer: &mut dyn Optimizer, monitored: Option<f64>);

    fn uses_monitor(&self) -> bool {
        false
    }

    fn name(&self) -> &str;
}

/// Scheduler factory, bound to an optimizer in `configure_optimizers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerConfig {
    StepLr {
        step_size: usize,
        #[serde(default = "default_gamma")]
        gamma: f64,
    },
    CosineAnnealing {
        t_max: usize,
        #[serde(default)]
        eta_min: f64,
    },
    ReduceOnPlateau {
        #[serde(default = "default_factor")]
        factor: f64,
        #[serde(default = "default_patience")]
        patience: usize,
        #[serde(default = "default_threshold")]
        threshold: f64,
        #[serde(default)]
        min_lr: f64,
    },
}

fn default_gamma() -> f64 { 0.1 }
fn default_factor() -> f64 { 0.1 }
fn default_patience() -> usize { 10 }
fn default_threshold() -> f64 { 1e-4 }

impl SchedulerConfig {
    pub fn build(&self, optimizer: &dyn Optimizer) -> Box<dyn LrScheduler> {
        let base_lr = optimizer.lr();
        match *self {
            SchedulerConfig::StepLr { step_size, gamma } => {
                Box::new(StepLr { base_lr, step_size: step_size.max(1), gamma, epoch: 0 })
            }
            SchedulerConfig::CosineAnnealing { t_max, eta_min } => {
                Box::new(CosineAnnealingLr { base_lr, t_max, eta_min, epoch: 0 })
            }
            SchedulerConfig::ReduceOnPlateau { factor, patience, threshold, min_lr } => {
                Box::new(ReduceLrOnPlateau::new(factor, patience, threshold, min_lr))
            }
        }
    }
}

/// Decays the rate by `gamma` every `step_size` epochs.
pub struct StepLr {
    base_lr: f64,
    step_size: usize,
    gamma: f64,
    epoch: usize,
}

impl LrScheduler for StepLr {
    fn step(&mut self, optimizer: &mut dyn Optimizer, _monitored: Option<f64>) {
        self.epoch += 1;
        let decays = (self.epoch / self.step_size) as i32;
        optimizer.set_lr(self.base_lr * self.gamma.powi(decays));
    }

    fn name(&self) -> &str {
        "StepLR"
    }
}

/// Cosine annealing from the optimizer's initial rate down to `eta_min`:
///
/// lr_t = eta_min + 0.5 * (lr_0 - eta_min) * (1 + cos(π * t / t_max))
///
/// Stays at `eta_min` once `t >= t_max`.
pub struct CosineAnnealingLr {
    base_lr: f64,
    t_max: usize,
    eta_min: f64,
    epoch: usize,
}

impl CosineAnnealingLr {
    fn lr_at(&self, t: usize) -> f64 {
        if t >= self.t_max {
            return self.eta_min;
        }
        let progress = t as f64 / self.t_max as f64;
        self.eta_min + 0.5 * (self.base_lr - self.eta_min) * (1.0 + (PI * progress).cos())
    }
}

impl LrScheduler for CosineAnnealingLr {
    fn step(&mut self, optimizer: &mut dyn Optimizer, _monitored: Option<f64>) {
        self.epoch += 1;
        optimizer.set_lr(self.lr_at(self.epoch));
    }

    fn name(&self) -> &str {
        "CosineAnnealingLR"
    }
}

/// Multiplies the rate by `factor` once the monitored value (lower is better)
/// has not improved by a relative `threshold` for more than `patience` epochs.
pub struct ReduceLrOnPlateau {
    factor: f64,
    patience: usize,
    threshold: f64,
    min_lr: f64,
    best: f64,
    bad_epochs: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(factor: f64, patience: usize, threshold: f64, min_lr: f64) -> Self {
        ReduceLrOnPlateau {
            factor,
            patience,
            threshold,
            min_lr,
            best: f64::INFINITY,
            bad_epochs: 0,
        }
    }

    fn is_better(&self, value: f64) -> bool {
        value < self.best * (1.0 - self.threshold)
    }
}

impl LrScheduler for ReduceLrOnPlateau {
    fn step(&mut self, optimizer: &mut dyn Optimizer, monitored: Option<f64>) {
        let Some(value) = monitored else {
            return;
        };
        if self.is_better(value) {
            self.best = value;
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }
        if self.bad_epochs > self.patience {
            let new_lr = (optimizer.lr() * self.factor).max(self.min_lr);
            if new_lr < optimizer.lr() {
                log::info!("Reducing learning rate to {new_lr:.3e}");
            }
            optimizer.set_lr(new_lr);
            self.bad_epochs = 0;
        }
    }

    fn uses_monitor(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "ReduceLROnPlateau"
    }
}
