use core_types::config::ConfigError;
use embedding_trainer::TrainerError;
use thiserror::Error;

/// Errors returned by the model and its observers.
#[derive(Debug, Error)]
pub enum Product2VecError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("cannot fit on an empty corpus")]
    EmptyCorpus,
    #[error("no product occurs at least {min_count} times")]
    EmptyVocabulary { min_count: usize },
    #[error("unknown product `{0}`")]
    UnknownProduct(String),
    #[error("model is not fitted; call fit() first")]
    ModelNotFitted,
    #[error("training failed: {0}")]
    Training(String),
    #[error("model snapshot error: {0}")]
    Persistence(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for Product2VecError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}

impl From<TrainerError> for Product2VecError {
    fn from(value: TrainerError) -> Self {
        match value {
            TrainerError::EmptyCorpus => Self::EmptyCorpus,
            TrainerError::EmptyVocabulary { min_count } => Self::EmptyVocabulary { min_count },
            TrainerError::InvalidConfig(msg) => Self::Configuration(msg),
            TrainerError::ThreadPool(msg) => Self::Training(msg),
            TrainerError::InconsistentSpace(msg) => Self::Persistence(msg),
        }
    }
}

impl From<bincode::Error> for Product2VecError {
    fn from(value: bincode::Error) -> Self {
        Self::Persistence(value.to_string())
    }
}

pub type Result<T, E = Product2VecError> = std::result::Result<T, E>;
