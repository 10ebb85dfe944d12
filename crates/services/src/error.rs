//! Shared error types for the services crate.

use thiserror::Error;

use mastery_core::model::{ProblemError, ScoreError, TopicError};
use mastery_core::prereq::PrereqError;
use mastery_storage::repository::StorageError;
use mastery_storage::sqlite::SqliteInitError;

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("editor access required")]
    EditorRequired,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `TopicService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TopicServiceError {
    #[error("prerequisite would close a cycle")]
    PrerequisiteCycle,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProblemService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProblemServiceError {
    #[error("topic {0} does not exist")]
    UnknownTopic(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ScoringService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScoringError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `TransferService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransferError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Prereq(#[from] PrereqError),
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
