//! Typed dataset validation failures.

use thiserror::Error;

/// The kind of a [`ValidationError`], for matching without the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidCategories,
    MismatchingAnnotations,
    TooFewSamples,
    InvalidImageInfo,
    InsufficientGroundTruth,
    InvalidDataset,
}

/// A data problem that must be fixed by the task requester.
///
/// Messages are bounded in length, see [`format_sequence`](crate::utils::format_sequence).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Label or point category shape violates the task labels.
    #[error("invalid categories: {0}")]
    InvalidCategories(String),
    /// Annotated files are missing from the data files.
    #[error("mismatching annotations: {0}")]
    MismatchingAnnotations(String),
    /// The usable sample set is smaller than required.
    #[error("too few samples: {0}")]
    TooFewSamples(String),
    /// Recorded image size disagrees with the decoded image.
    #[error("invalid image info: {0}")]
    InvalidImageInfo(String),
    /// Not enough ground truth survived matching, or a job needs more decoys than exist.
    #[error("insufficient ground truth: {0}")]
    InsufficientGroundTruth(String),
    /// Any other dataset problem.
    #[error("dataset validation failed: {0}")]
    InvalidDataset(String),
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCategories(_) => ErrorKind::InvalidCategories,
            Self::MismatchingAnnotations(_) => ErrorKind::MismatchingAnnotations,
            Self::TooFewSamples(_) => ErrorKind::TooFewSamples,
            Self::InvalidImageInfo(_) => ErrorKind::InvalidImageInfo,
            Self::InsufficientGroundTruth(_) => ErrorKind::InsufficientGroundTruth,
            Self::InvalidDataset(_) => ErrorKind::InvalidDataset,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidCategories(message)
            | Self::MismatchingAnnotations(message)
            | Self::TooFewSamples(message)
            | Self::InvalidImageInfo(message)
            | Self::InsufficientGroundTruth(message)
            | Self::InvalidDataset(message) => message,
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;
