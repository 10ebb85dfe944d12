#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth_service;
pub mod error;
pub mod problem_service;
pub mod progress_service;
pub mod scoring_service;
pub mod topic_service;
pub mod transfer_service;

pub use app_services::AppServices;
pub use auth_service::{AuthService, CurrentUser};
pub use error::{
    AppServicesError, AuthError, ProblemServiceError, ProgressError, ScoringError,
    TopicServiceError, TransferError,
};
pub use problem_service::{ProblemListing, ProblemPresentation, ProblemService};
pub use progress_service::{ProgressReport, ProgressService, RankedTopic};
pub use scoring_service::{AnswerOutcome, ScoringService};
pub use topic_service::{TopicOverview, TopicService};
pub use transfer_service::{
    Archive, ImportCounts, ProblemRecord, ScoreRecord, TopicRecord, TransferService, UserRecord,
};
