//! captcha-train CLI
//!
//! ```bash
//! # Train, validate every epoch, then test the best checkpoint
//! captcha-train fit --config captcha.json
//!
//! # Evaluate saved weights on the test split
//! captcha-train test --config captcha.json --weights runs/captcha/best.json
//!
//! # Read captchas with a trained model
//! captcha-train predict --weights runs/captcha/best.json a.png b.png
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ferrite_captcha::data::dataset::load_grayscale;
use ferrite_captcha::train::TrainerConfig;
use ferrite_captcha::{Charset, Error, ExperimentConfig, Network, Result, RunDirectory, Trainer};

/// Captcha recognition training on a from-scratch dense network
#[derive(Parser, Debug)]
#[command(name = "captcha-train")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model from a JSON experiment config
    Fit {
        #[arg(short, long)]
        config: PathBuf,

        /// Start from saved weights instead of a fresh network
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Override the number of epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Do not evaluate on the test split after training
        #[arg(long)]
        skip_test: bool,
    },

    /// Evaluate saved weights on the test split
    Test {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long)]
        weights: PathBuf,
    },

    /// Decode captcha images with a trained model
    Predict {
        #[arg(short, long)]
        weights: PathBuf,

        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    let result = match cli.command {
        Command::Fit { config, resume, epochs, skip_test } => run_fit(config, resume, epochs, skip_test),
        Command::Test { config, weights } => run_test(config, weights),
        Command::Predict { weights, images } => run_predict(weights, images),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run_fit(config: PathBuf, resume: Option<PathBuf>, epochs: Option<usize>, skip_test: bool) -> Result<()> {
    let mut config = ExperimentConfig::load(config)?;
    if let Some(epochs) = epochs {
        config.trainer.max_epochs = epochs;
        config.validate()?;
    }

    let splits = config.load_splits()?;
    let net = match resume {
        Some(path) => {
            log::info!("Resuming from {}", path.display());
            Network::load_json(path)?
        }
        None => config.build_network()?,
    };
    let mut module = config.build_module(net)?;

    let experiment = RunDirectory::create(&config.run_dir)?;
    let mut trainer = Trainer::new(config.trainer_config(), experiment);
    let val = (!splits.val.dataset().is_empty()).then_some(&splits.val);
    let history = trainer.fit(&mut module, &splits.train, val)?;

    let last = config.run_dir.join("last.json");
    module.net().save_json(&last)?;
    if let Some(stats) = history.last() {
        log::info!(
            "Finished after {} epochs; train loss {:.4}, best val accuracy {}",
            stats.epoch,
            stats.train_loss,
            stats.best_val_accuracy.map_or("n/a".to_owned(), |a| format!("{a:.2}%")),
        );
    }
    log::info!("Saved final weights to {}", last.display());

    if skip_test {
        return Ok(());
    }
    if splits.test.dataset().is_empty() {
        log::warn!("Test split is empty; skipping test");
        return Ok(());
    }
    let best = config.checkpoint_path();
    if best.exists() {
        *module.net_mut() = Network::load_json(&best)?;
    }
    let metrics = trainer.test(&mut module, &splits.test)?;
    println!("{}", metrics.progress_line());
    Ok(())
}

fn run_test(config: PathBuf, weights: PathBuf) -> Result<()> {
    let config = ExperimentConfig::load(config)?;
    let splits = config.load_splits()?;
    let mut module = config.build_module(Network::load_json(&weights)?)?;

    let experiment = RunDirectory::create(config.run_dir.join("test"))?;
    let mut trainer = Trainer::new(TrainerConfig::new(1), experiment);
    let metrics = trainer.test(&mut module, &splits.test)?;
    for (name, value, _) in &metrics.values {
        println!("{name}: {value:.4}");
    }
    Ok(())
}

fn run_predict(weights: PathBuf, images: Vec<PathBuf>) -> Result<()> {
    let net = Network::load_json(&weights)?;
    let meta = net.metadata.clone()
        .ok_or_else(|| Error::Config(format!("{} has no model metadata", weights.display())))?;
    let charset = Charset::new(&meta.charset, meta.max_len)?;

    for path in &images {
        let input = load_grayscale(path, meta.width, meta.height)?;
        net.check_input(&input)?;
        let prediction = net.predict(std::slice::from_ref(&input));
        println!("{}\t{}", path.display(), charset.decode(&prediction.argmax(0)));
    }
    Ok(())
}
