use crate::plan::PlanState;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error(transparent)]
    Generation(#[from] nutrikid_generation::GenerationError),

    #[error("Illegal plan state transition {from:?} -> {to:?}")]
    InvalidTransition { from: PlanState, to: PlanState },
}
