pub mod epoch_stats;
pub mod lifecycle;
pub mod module;
pub mod train_config;
pub mod trainer;

pub use epoch_stats::EpochStats;
pub use lifecycle::{Lifecycle, Stage};
pub use module::{CaptchaModule, OptimizerSetup, SetupStage, TestAccuracyMode};
pub use train_config::TrainerConfig;
pub use trainer::Trainer;
