//! Error types for ferrite-captcha

use thiserror::Error;

use crate::train::lifecycle::Stage;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Character {ch:?} is not part of the charset")]
    UnknownCharacter { ch: char },

    #[error("Label {label:?} is longer than max_len {max_len}")]
    LabelTooLong { label: String, max_len: usize },

    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("Invalid stage transition: {from:?} -> {to:?}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("Scheduler monitors '{0}' but it was not logged this epoch")]
    MissingMonitor(String),

    #[error("Test epoch ended without any counted samples")]
    EmptyTestEpoch,

    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),
}

pub type Result<T> = std::result::Result<T, Error>;
