#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    NewUser, ProblemRepository, ScoreRepository, Storage, StorageError, TopicRepository,
    UserRepository,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
