//! Product embedding trainer: vocabulary building, skip-gram with negative
//! sampling (SGNS) over baskets, and the resulting [`VectorSpace`].
//!
//! The model crate only talks to this crate through [`train`] and the
//! read-only [`VectorSpace`] it returns, so the optimiser can evolve without
//! touching query code.

pub mod observer;
pub mod sgns;
pub mod space;
pub mod vocab;

pub use observer::{EpochEnd, EpochObserver};
pub use sgns::train;
pub use space::{Side, VectorSpace, cosine_similarity};
pub use vocab::Vocabulary;

use thiserror::Error;

/// Errors that can surface while training.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrainerError {
    #[error("corpus contains no baskets")]
    EmptyCorpus,
    #[error("no product occurs at least {min_count} times")]
    EmptyVocabulary { min_count: usize },
    #[error("invalid trainer configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to start worker pool: {0}")]
    ThreadPool(String),
    #[error("inconsistent vector space: {0}")]
    InconsistentSpace(String),
}
