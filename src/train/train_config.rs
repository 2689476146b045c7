use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, atomic::AtomicBool};

use crate::train::epoch_stats::EpochStats;

pub const DEFAULT_SANITY_VAL_STEPS: usize = 2;

/// Configuration for a `Trainer` run.
///
/// # Fields
/// - `max_epochs`      : number of full passes over the training loader
/// - `sanity_val_steps`: validation batches run before training; their
///                        records are discarded
/// - `checkpoint_path` : where the network is saved whenever the best
///                        validation accuracy improves
/// - `progress_tx`     : optional channel sender; one `EpochStats` is sent
///                        per completed epoch. If the receiver is dropped the
///                        run stops after the current epoch.
/// - `stop_flag`       : optional atomic flag; when set to `true` from
///                        another thread the run stops after the current epoch.
pub struct TrainerConfig {
    pub max_epochs: usize,
    pub sanity_val_steps: usize,
    pub checkpoint_path: Option<PathBuf>,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl TrainerConfig {
    /// Creates a `TrainerConfig` with default sanity steps and no checkpoint,
    /// progress channel or stop flag.
    pub fn new(max_epochs: usize) -> Self {
        TrainerConfig {
            max_epochs,
            sanity_val_steps: DEFAULT_SANITY_VAL_STEPS,
            checkpoint_path: None,
            progress_tx: None,
            stop_flag: None,
        }
    }
}
