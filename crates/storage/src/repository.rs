use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mastery_core::model::{
    DEFAULT_LANGUAGE, Problem, ProblemId, Role, RoleSet, Score, Topic, TopicId, User, UserError,
    UserId,
};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Fields for a user row before storage assigns an id.
///
/// Mirrors the domain `User` minus the identifier; `into_user` performs
/// the domain validation once the id is known.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub language: String,
    pub roles: RoleSet,
}

impl NewUser {
    /// A student account with the default language.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: None,
            password: password.into(),
            language: DEFAULT_LANGUAGE.to_owned(),
            roles: RoleSet::empty().with(Role::Student),
        }
    }

    /// Converts the record into a domain `User` with the assigned id.
    ///
    /// # Errors
    ///
    /// Returns `UserError` if the username or password fail validation.
    pub fn into_user(self, id: UserId) -> Result<User, UserError> {
        User::from_parts(
            id,
            self.username,
            self.email,
            self.password,
            self.language,
            self.roles,
        )
    }
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Persist or update a topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the topic cannot be stored.
    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError>;

    /// Fetch a topic by id; `None` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_topic(&self, id: &TopicId) -> Result<Option<Topic>, StorageError>;

    /// All topics ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_topics(&self) -> Result<Vec<Topic>, StorageError>;

    /// Delete a topic; its problems and scores go with it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such topic exists.
    async fn delete_topic(&self, id: &TopicId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ProblemRepository: Send + Sync {
    /// Persist or update a problem.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the problem cannot be stored.
    async fn upsert_problem(&self, problem: &Problem) -> Result<(), StorageError>;

    /// Fetch a problem by id; `None` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_problem(&self, id: &ProblemId) -> Result<Option<Problem>, StorageError>;

    /// All problems ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_problems(&self) -> Result<Vec<Problem>, StorageError>;

    /// Problems attached to one topic, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn problems_for_topic(&self, topic_id: &TopicId) -> Result<Vec<Problem>, StorageError>;

    /// Number of problems attached to one topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_for_topic(&self, topic_id: &TopicId) -> Result<u32, StorageError>;

    /// Delete a problem.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such problem exists.
    async fn delete_problem(&self, id: &ProblemId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ScoreRepository: Send + Sync {
    /// Fetch one user's score on one topic; `None` when the user has
    /// never answered there. Reads never create rows.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_score(
        &self,
        user_id: UserId,
        topic_id: &TopicId,
    ) -> Result<Option<Score>, StorageError>;

    /// All score rows for one user, ordered by topic id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn scores_for_user(&self, user_id: UserId) -> Result<Vec<Score>, StorageError>;

    /// Every score row, ordered by user then topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_scores(&self) -> Result<Vec<Score>, StorageError>;

    /// Records one attempt as a single atomic increment, creating the
    /// row with zeroed counters first if needed. Returns the updated
    /// score. Concurrent submissions must not lose increments.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn apply_answer(
        &self,
        user_id: UserId,
        topic_id: &TopicId,
        correct: bool,
    ) -> Result<Score, StorageError>;

    /// Overwrites a score row with the given counters. Import path only.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_score(&self, score: &Score) -> Result<(), StorageError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a new user and returns it with the assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the username is taken.
    async fn insert_user(&self, new_user: &NewUser) -> Result<User, StorageError>;

    /// Fetch a user by id; `None` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// Fetch a user by exact username; `None` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// All users ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_users(&self) -> Result<Vec<User>, StorageError>;

    /// Grants or revokes the editor role by username.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such user exists.
    async fn set_editor(&self, username: &str, editor: bool) -> Result<(), StorageError>;

    /// Removes every user, and with them every score. Used by the CSV
    /// overwrite import.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn delete_all_users(&self) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    topics: Arc<Mutex<HashMap<TopicId, Topic>>>,
    problems: Arc<Mutex<HashMap<ProblemId, Problem>>>,
    scores: Arc<Mutex<HashMap<(UserId, TopicId), Score>>>,
    users: Arc<Mutex<HashMap<UserId, User>>>,
    next_user_id: Arc<Mutex<i64>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            problems: Arc::new(Mutex::new(HashMap::new())),
            scores: Arc::new(Mutex::new(HashMap::new())),
            users: Arc::new(Mutex::new(HashMap::new())),
            next_user_id: Arc::new(Mutex::new(1)),
        }
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl TopicRepository for InMemoryRepository {
    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        let mut guard = self.topics.lock().map_err(poisoned)?;
        guard.insert(topic.id().clone(), topic.clone());
        Ok(())
    }

    async fn get_topic(&self, id: &TopicId) -> Result<Option<Topic>, StorageError> {
        let guard = self.topics.lock().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    async fn list_topics(&self) -> Result<Vec<Topic>, StorageError> {
        let guard = self.topics.lock().map_err(poisoned)?;
        let mut topics: Vec<Topic> = guard.values().cloned().collect();
        topics.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(topics)
    }

    async fn delete_topic(&self, id: &TopicId) -> Result<(), StorageError> {
        let mut guard = self.topics.lock().map_err(poisoned)?;
        if guard.remove(id).is_none() {
            return Err(StorageError::NotFound);
        }
        drop(guard);

        // Cascade, matching the SQLite foreign keys.
        let mut problems = self.problems.lock().map_err(poisoned)?;
        problems.retain(|_, problem| problem.topic_id() != id);
        drop(problems);

        let mut scores = self.scores.lock().map_err(poisoned)?;
        scores.retain(|(_, topic_id), _| topic_id != id);
        Ok(())
    }
}

#[async_trait]
impl ProblemRepository for InMemoryRepository {
    async fn upsert_problem(&self, problem: &Problem) -> Result<(), StorageError> {
        let mut guard = self.problems.lock().map_err(poisoned)?;
        guard.insert(problem.id().clone(), problem.clone());
        Ok(())
    }

    async fn get_problem(&self, id: &ProblemId) -> Result<Option<Problem>, StorageError> {
        let guard = self.problems.lock().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    async fn list_problems(&self) -> Result<Vec<Problem>, StorageError> {
        let guard = self.problems.lock().map_err(poisoned)?;
        let mut problems: Vec<Problem> = guard.values().cloned().collect();
        problems.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(problems)
    }

    async fn problems_for_topic(&self, topic_id: &TopicId) -> Result<Vec<Problem>, StorageError> {
        let guard = self.problems.lock().map_err(poisoned)?;
        let mut problems: Vec<Problem> = guard
            .values()
            .filter(|problem| problem.topic_id() == topic_id)
            .cloned()
            .collect();
        problems.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(problems)
    }

    async fn count_for_topic(&self, topic_id: &TopicId) -> Result<u32, StorageError> {
        let guard = self.problems.lock().map_err(poisoned)?;
        let count = guard
            .values()
            .filter(|problem| problem.topic_id() == topic_id)
            .count();
        u32::try_from(count).map_err(|_| StorageError::Serialization("count overflow".into()))
    }

    async fn delete_problem(&self, id: &ProblemId) -> Result<(), StorageError> {
        let mut guard = self.problems.lock().map_err(poisoned)?;
        if guard.remove(id).is_none() {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ScoreRepository for InMemoryRepository {
    async fn get_score(
        &self,
        user_id: UserId,
        topic_id: &TopicId,
    ) -> Result<Option<Score>, StorageError> {
        let guard = self.scores.lock().map_err(poisoned)?;
        Ok(guard.get(&(user_id, topic_id.clone())).cloned())
    }

    async fn scores_for_user(&self, user_id: UserId) -> Result<Vec<Score>, StorageError> {
        let guard = self.scores.lock().map_err(poisoned)?;
        let mut scores: Vec<Score> = guard
            .values()
            .filter(|score| score.user_id() == user_id)
            .cloned()
            .collect();
        scores.sort_by(|a, b| a.topic_id().cmp(b.topic_id()));
        Ok(scores)
    }

    async fn list_scores(&self) -> Result<Vec<Score>, StorageError> {
        let guard = self.scores.lock().map_err(poisoned)?;
        let mut scores: Vec<Score> = guard.values().cloned().collect();
        scores.sort_by(|a, b| {
            a.user_id()
                .value()
                .cmp(&b.user_id().value())
                .then_with(|| a.topic_id().cmp(b.topic_id()))
        });
        Ok(scores)
    }

    async fn apply_answer(
        &self,
        user_id: UserId,
        topic_id: &TopicId,
        correct: bool,
    ) -> Result<Score, StorageError> {
        let mut guard = self.scores.lock().map_err(poisoned)?;
        let score = guard
            .entry((user_id, topic_id.clone()))
            .or_insert_with(|| Score::new(user_id, topic_id.clone()));
        score.record_attempt(correct);
        Ok(score.clone())
    }

    async fn upsert_score(&self, score: &Score) -> Result<(), StorageError> {
        let mut guard = self.scores.lock().map_err(poisoned)?;
        guard.insert(
            (score.user_id(), score.topic_id().clone()),
            score.clone(),
        );
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, new_user: &NewUser) -> Result<User, StorageError> {
        let mut guard = self.users.lock().map_err(poisoned)?;
        if guard
            .values()
            .any(|user| user.username() == new_user.username)
        {
            return Err(StorageError::Conflict);
        }

        let mut next = self.next_user_id.lock().map_err(poisoned)?;
        let id = UserId::new(*next);
        let user = new_user
            .clone()
            .into_user(id)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        *next += 1;
        guard.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let guard = self.users.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let guard = self.users.lock().map_err(poisoned)?;
        Ok(guard
            .values()
            .find(|user| user.username() == username)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let guard = self.users.lock().map_err(poisoned)?;
        let mut users: Vec<User> = guard.values().cloned().collect();
        users.sort_by_key(|user| user.id().value());
        Ok(users)
    }

    async fn set_editor(&self, username: &str, editor: bool) -> Result<(), StorageError> {
        let mut guard = self.users.lock().map_err(poisoned)?;
        let user = guard
            .values_mut()
            .find(|user| user.username() == username)
            .ok_or(StorageError::NotFound)?;
        user.set_role(Role::Editor, editor);
        Ok(())
    }

    async fn delete_all_users(&self) -> Result<(), StorageError> {
        let mut guard = self.users.lock().map_err(poisoned)?;
        guard.clear();
        let mut next = self.next_user_id.lock().map_err(poisoned)?;
        *next = 1;
        drop(guard);
        drop(next);

        // Scores reference users, so they go too.
        let mut scores = self.scores.lock().map_err(poisoned)?;
        scores.clear();
        Ok(())
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Aggregates the four repositories behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub topics: Arc<dyn TopicRepository>,
    pub problems: Arc<dyn ProblemRepository>,
    pub scores: Arc<dyn ScoreRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let topics: Arc<dyn TopicRepository> = Arc::new(repo.clone());
        let problems: Arc<dyn ProblemRepository> = Arc::new(repo.clone());
        let scores: Arc<dyn ScoreRepository> = Arc::new(repo.clone());
        let users: Arc<dyn UserRepository> = Arc::new(repo);
        Self {
            topics,
            problems,
            scores,
            users,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(id: &str) -> Topic {
        let mut topic = Topic::new(TopicId::new(id));
        topic.set_title(id);
        topic
    }

    fn problem(id: &str, topic_id: &str) -> Problem {
        Problem::new(ProblemId::new(id), TopicId::new(topic_id))
    }

    #[tokio::test]
    async fn lists_are_ordered_by_id() {
        let repo = InMemoryRepository::new();
        repo.upsert_topic(&topic("b")).await.unwrap();
        repo.upsert_topic(&topic("a")).await.unwrap();

        let ids: Vec<String> = repo
            .list_topics()
            .await
            .unwrap()
            .iter()
            .map(|t| t.id().as_str().to_owned())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn delete_topic_cascades_to_problems_and_scores() {
        let repo = InMemoryRepository::new();
        repo.upsert_topic(&topic("algebra")).await.unwrap();
        repo.upsert_problem(&problem("p1", "algebra")).await.unwrap();
        repo.apply_answer(UserId::new(1), &TopicId::new("algebra"), true)
            .await
            .unwrap();

        repo.delete_topic(&TopicId::new("algebra")).await.unwrap();

        assert!(repo.list_problems().await.unwrap().is_empty());
        assert!(
            repo.get_score(UserId::new(1), &TopicId::new("algebra"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn delete_missing_topic_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo.delete_topic(&TopicId::new("ghost")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn apply_answer_creates_then_increments() {
        let repo = InMemoryRepository::new();
        let topic_id = TopicId::new("algebra");

        let first = repo
            .apply_answer(UserId::new(1), &topic_id, false)
            .await
            .unwrap();
        assert_eq!(first.problems_seen(), 1);
        assert_eq!(first.correct_answers(), 0);

        let second = repo
            .apply_answer(UserId::new(1), &topic_id, true)
            .await
            .unwrap();
        assert_eq!(second.problems_seen(), 2);
        assert_eq!(second.correct_answers(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_submissions_lose_no_increments() {
        let repo = InMemoryRepository::new();
        let topic_id = TopicId::new("algebra");

        let mut handles = Vec::new();
        for i in 0..32 {
            let repo = repo.clone();
            let topic_id = topic_id.clone();
            handles.push(tokio::spawn(async move {
                repo.apply_answer(UserId::new(1), &topic_id, i % 2 == 0)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let score = repo
            .get_score(UserId::new(1), &topic_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(score.problems_seen(), 32);
        assert_eq!(score.correct_answers(), 16);
    }

    #[tokio::test]
    async fn insert_user_assigns_sequential_ids() {
        let repo = InMemoryRepository::new();
        let first = repo.insert_user(&NewUser::new("ada", "pw")).await.unwrap();
        let second = repo.insert_user(&NewUser::new("grace", "pw")).await.unwrap();
        assert_eq!(first.id().value(), 1);
        assert_eq!(second.id().value(), 2);
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&NewUser::new("ada", "pw")).await.unwrap();
        let err = repo
            .insert_user(&NewUser::new("ada", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn set_editor_flips_the_role() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&NewUser::new("ada", "pw")).await.unwrap();

        repo.set_editor("ada", true).await.unwrap();
        let user = repo.find_by_username("ada").await.unwrap().unwrap();
        assert!(user.has_role(Role::Editor));

        repo.set_editor("ada", false).await.unwrap();
        let user = repo.find_by_username("ada").await.unwrap().unwrap();
        assert!(!user.has_role(Role::Editor));
    }

    #[tokio::test]
    async fn delete_all_users_clears_scores_too() {
        let repo = InMemoryRepository::new();
        let user = repo.insert_user(&NewUser::new("ada", "pw")).await.unwrap();
        repo.apply_answer(user.id(), &TopicId::new("algebra"), true)
            .await
            .unwrap();

        repo.delete_all_users().await.unwrap();

        assert!(repo.list_users().await.unwrap().is_empty());
        assert!(repo.list_scores().await.unwrap().is_empty());
    }
}
