//! Wires every service to one storage backend.

use std::sync::Arc;

use mastery_storage::repository::Storage;

use crate::auth_service::AuthService;
use crate::error::AppServicesError;
use crate::problem_service::ProblemService;
use crate::progress_service::ProgressService;
use crate::scoring_service::ScoringService;
use crate::topic_service::TopicService;
use crate::transfer_service::TransferService;

/// Assembles the app-facing services over a shared backend.
#[derive(Clone)]
pub struct AppServices {
    auth: Arc<AuthService>,
    topics: Arc<TopicService>,
    problems: Arc<ProblemService>,
    scoring: Arc<ScoringService>,
    progress: Arc<ProgressService>,
    transfer: Arc<TransferService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, running migrations.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or
    /// migrated.
    pub async fn new_sqlite(db_url: &str) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage))
    }

    /// Build services over the in-memory backend.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_storage(&Storage::in_memory())
    }

    /// Wire every service to the given backend.
    #[must_use]
    pub fn from_storage(storage: &Storage) -> Self {
        let auth = Arc::new(AuthService::new(Arc::clone(&storage.users)));
        let topics = Arc::new(TopicService::new(
            Arc::clone(&storage.topics),
            Arc::clone(&storage.problems),
            Arc::clone(&storage.scores),
        ));
        let problems = Arc::new(ProblemService::new(
            Arc::clone(&storage.topics),
            Arc::clone(&storage.problems),
        ));
        let scoring = Arc::new(ScoringService::new(
            Arc::clone(&storage.problems),
            Arc::clone(&storage.scores),
        ));
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&storage.topics),
            Arc::clone(&storage.scores),
        ));
        let transfer = Arc::new(TransferService::new(
            Arc::clone(&storage.topics),
            Arc::clone(&storage.problems),
            Arc::clone(&storage.scores),
            Arc::clone(&storage.users),
        ));

        Self {
            auth,
            topics,
            problems,
            scoring,
            progress,
            transfer,
        }
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn topics(&self) -> Arc<TopicService> {
        Arc::clone(&self.topics)
    }

    #[must_use]
    pub fn problems(&self) -> Arc<ProblemService> {
        Arc::clone(&self.problems)
    }

    #[must_use]
    pub fn scoring(&self) -> Arc<ScoringService> {
        Arc::clone(&self.scoring)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn transfer(&self) -> Arc<TransferService> {
        Arc::clone(&self.transfer)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
