use std::sync::Arc;
use std::time::Duration;

use sqlx::{Executor, SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{
    ProblemRepository, ScoreRepository, Storage, TopicRepository, UserRepository,
};

mod mapping;
mod migrate;
mod problem_repo;
mod score_repo;
mod topic_repo;
mod user_repo;

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Session settings applied to every new connection. Cascades depend on
/// `foreign_keys`; WAL plus a busy timeout keeps concurrent score
/// submissions from failing with `SQLITE_BUSY`.
const SESSION_PRAGMAS: &str = "\
    PRAGMA foreign_keys = ON; \
    PRAGMA journal_mode = WAL; \
    PRAGMA busy_timeout = 5000;";

/// One pooled `SQLite` handle implementing all four repository traits.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open a pool against the given URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened or the
    /// session pragmas fail to apply.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute(sqlx::raw_sql(SESSION_PRAGMAS)).await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Bring the schema up to date; safe to run on every start.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a migration statement fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Connect, migrate, and expose the pooled handle behind all four
    /// repository traits.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened or
    /// migrated.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let topics: Arc<dyn TopicRepository> = Arc::new(repo.clone());
        let problems: Arc<dyn ProblemRepository> = Arc::new(repo.clone());
        let scores: Arc<dyn ScoreRepository> = Arc::new(repo.clone());
        let users: Arc<dyn UserRepository> = Arc::new(repo);
        Ok(Self {
            topics,
            problems,
            scores,
            users,
        })
    }
}
