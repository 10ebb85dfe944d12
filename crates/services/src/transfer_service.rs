//! Bulk JSON and CSV import/export.
//!
//! List-valued fields travel as real JSON arrays; the delimiter-joined
//! string form is a storage detail and never leaves the adapter.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use mastery_core::model::{
    DEFAULT_LANGUAGE, Problem, ProblemId, Role, RoleSet, Score, Topic, TopicId, User, UserId,
};
use mastery_core::prereq::PrereqList;
use mastery_storage::repository::{
    NewUser, ProblemRepository, ScoreRepository, StorageError, TopicRepository, UserRepository,
};

use crate::error::TransferError;

//
// ─── WIRE SHAPES ───────────────────────────────────────────────────────────────
//

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_owned()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Present on export; imports assign fresh ids and use this only to
    /// match score rows to their user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_true")]
    pub is_student: bool,
    #[serde(default)]
    pub is_teacher: bool,
    #[serde(default)]
    pub is_editor: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub id: String,
    pub topic_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub solutions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub user_id: i64,
    pub topic_id: String,
    #[serde(default)]
    pub problems_seen: u32,
    #[serde(default)]
    pub correct_answers: u32,
}

/// The whole store as one JSON document. Missing keys read as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Archive {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub topics: Vec<TopicRecord>,
    #[serde(default)]
    pub problems: Vec<ProblemRecord>,
    #[serde(default)]
    pub scores: Vec<ScoreRecord>,
}

/// One row of the users CSV (`id,username,password`).
#[derive(Debug, Serialize, Deserialize)]
struct CsvUserRow {
    #[serde(default)]
    id: Option<i64>,
    username: String,
    password: String,
}

/// How many records an import wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub users: usize,
    pub topics: usize,
    pub problems: usize,
    pub scores: usize,
}

impl From<&User> for UserRecord {
    fn from(user: &User) -> Self {
        Self {
            id: Some(user.id().value()),
            username: user.username().to_owned(),
            email: user.email().map(str::to_owned),
            password: user.password().to_owned(),
            language: user.language().to_owned(),
            is_student: user.has_role(Role::Student),
            is_teacher: user.has_role(Role::Teacher),
            is_editor: user.has_role(Role::Editor),
        }
    }
}

impl UserRecord {
    fn into_new_user(self) -> NewUser {
        let mut roles = RoleSet::empty();
        roles.set(Role::Student, self.is_student);
        roles.set(Role::Teacher, self.is_teacher);
        roles.set(Role::Editor, self.is_editor);
        NewUser {
            username: self.username,
            email: self.email,
            password: self.password,
            language: self.language,
            roles,
        }
    }
}

impl From<&Topic> for TopicRecord {
    fn from(topic: &Topic) -> Self {
        Self {
            id: topic.id().as_str().to_owned(),
            title: topic.title().to_owned(),
            description: topic.description().to_owned(),
            prerequisites: topic
                .prerequisites()
                .iter()
                .map(|id| id.as_str().to_owned())
                .collect(),
        }
    }
}

impl TopicRecord {
    fn into_topic(self) -> Result<Topic, TransferError> {
        let prerequisites = PrereqList::from_ids(self.prerequisites.into_iter().map(TopicId::new))?;
        Ok(Topic::from_parts(
            TopicId::new(self.id),
            self.title,
            self.description,
            prerequisites,
        ))
    }
}

impl From<&Problem> for ProblemRecord {
    fn from(problem: &Problem) -> Self {
        Self {
            id: problem.id().as_str().to_owned(),
            topic_id: problem.topic_id().as_str().to_owned(),
            text: problem.text().to_owned(),
            solutions: problem.solutions().to_vec(),
        }
    }
}

impl ProblemRecord {
    fn into_problem(self) -> Result<Problem, TransferError> {
        let mut problem = Problem::new(ProblemId::new(self.id), TopicId::new(self.topic_id));
        problem.set_text(self.text);
        problem.set_solutions(self.solutions)?;
        Ok(problem)
    }
}

impl From<&Score> for ScoreRecord {
    fn from(score: &Score) -> Self {
        Self {
            user_id: score.user_id().value(),
            topic_id: score.topic_id().as_str().to_owned(),
            problems_seen: score.problems_seen(),
            correct_answers: score.correct_answers(),
        }
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Moves the whole store in and out as JSON, and user lists as CSV.
#[derive(Clone)]
pub struct TransferService {
    topics: Arc<dyn TopicRepository>,
    problems: Arc<dyn ProblemRepository>,
    scores: Arc<dyn ScoreRepository>,
    users: Arc<dyn UserRepository>,
}

impl TransferService {
    #[must_use]
    pub fn new(
        topics: Arc<dyn TopicRepository>,
        problems: Arc<dyn ProblemRepository>,
        scores: Arc<dyn ScoreRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            topics,
            problems,
            scores,
            users,
        }
    }

    /// Snapshot the whole store into wire records.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::Storage` if any listing fails.
    pub async fn archive(&self) -> Result<Archive, TransferError> {
        let users = self
            .users
            .list_users()
            .await?
            .iter()
            .map(UserRecord::from)
            .collect();
        let topics = self
            .topics
            .list_topics()
            .await?
            .iter()
            .map(TopicRecord::from)
            .collect();
        let problems = self
            .problems
            .list_problems()
            .await?
            .iter()
            .map(ProblemRecord::from)
            .collect();
        let scores = self
            .scores
            .list_scores()
            .await?
            .iter()
            .map(ScoreRecord::from)
            .collect();
        Ok(Archive {
            users,
            topics,
            problems,
            scores,
        })
    }

    /// Export everything as a pretty-printed JSON document.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::Storage` if a listing fails, or `Json` if
    /// serialization fails.
    pub async fn export_json(&self) -> Result<String, TransferError> {
        let archive = self.archive().await?;
        Ok(serde_json::to_string_pretty(&archive)?)
    }

    /// Import a JSON document produced by [`export_json`](Self::export_json).
    ///
    /// # Errors
    ///
    /// Returns `TransferError::Json` for malformed input, or the record
    /// validation/storage errors of [`import_archive`](Self::import_archive).
    pub async fn import_json(&self, json: &str) -> Result<ImportCounts, TransferError> {
        let archive: Archive = serde_json::from_str(json)?;
        self.import_archive(archive).await
    }

    /// Write an archive into the store.
    ///
    /// Users whose username is free are inserted with fresh ids; a taken
    /// username attaches to the existing account instead. Score rows
    /// follow their user via the id recorded in the document. Topics,
    /// problems, and scores are upserted in place.
    ///
    /// # Errors
    ///
    /// Returns validation errors for records the domain types reject,
    /// or `TransferError::Storage` if a write fails.
    pub async fn import_archive(&self, archive: Archive) -> Result<ImportCounts, TransferError> {
        let mut counts = ImportCounts::default();
        let mut user_ids: HashMap<i64, UserId> = HashMap::new();

        for record in archive.users {
            let exported_id = record.id;
            let new_user = record.into_new_user();
            let user = match self.users.insert_user(&new_user).await {
                Ok(user) => user,
                Err(StorageError::Conflict) => self
                    .users
                    .find_by_username(&new_user.username)
                    .await?
                    .ok_or(StorageError::Conflict)?,
                Err(e) => return Err(e.into()),
            };
            if let Some(old) = exported_id {
                user_ids.insert(old, user.id());
            }
            counts.users += 1;
        }

        for record in archive.topics {
            let topic = record.into_topic()?;
            self.topics.upsert_topic(&topic).await?;
            counts.topics += 1;
        }

        for record in archive.problems {
            let problem = record.into_problem()?;
            self.problems.upsert_problem(&problem).await?;
            counts.problems += 1;
        }

        for record in archive.scores {
            let user_id = user_ids
                .get(&record.user_id)
                .copied()
                .unwrap_or(UserId::new(record.user_id));
            let score = Score::from_persisted(
                user_id,
                TopicId::new(record.topic_id),
                record.problems_seen,
                record.correct_answers,
            )?;
            self.scores.upsert_score(&score).await?;
            counts.scores += 1;
        }

        log::info!(
            "imported {} users, {} topics, {} problems, {} scores",
            counts.users,
            counts.topics,
            counts.problems,
            counts.scores
        );
        Ok(counts)
    }

    /// Export accounts as CSV with an `id,username,password` header.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::Storage` if the listing fails, or `Csv`
    /// if a row cannot be written.
    pub async fn export_users_csv(&self) -> Result<String, TransferError> {
        let users = self.users.list_users().await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        for user in &users {
            writer.serialize(CsvUserRow {
                id: Some(user.id().value()),
                username: user.username().to_owned(),
                password: user.password().to_owned(),
            })?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let text =
            String::from_utf8(bytes).map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(text)
    }

    /// Import accounts from CSV.
    ///
    /// Rows whose username already exists are skipped. With `overwrite`
    /// set, every existing user (and their scores) is removed first and
    /// all rows are inserted fresh. Any `id` column is ignored; storage
    /// assigns ids.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::Csv` for malformed rows, or `Storage` if
    /// a write fails.
    pub async fn import_users_csv(
        &self,
        data: &str,
        overwrite: bool,
    ) -> Result<ImportCounts, TransferError> {
        if overwrite {
            log::info!("csv import in overwrite mode, clearing existing users");
            self.users.delete_all_users().await?;
        }

        let mut counts = ImportCounts::default();
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        for row in reader.deserialize() {
            let row: CsvUserRow = row?;
            if self.users.find_by_username(&row.username).await?.is_some() {
                log::debug!("skipping existing user {}", row.username);
                continue;
            }
            self.users
                .insert_user(&NewUser::new(row.username, row.password))
                .await?;
            counts.users += 1;
        }
        log::info!("imported {} users from csv", counts.users);
        Ok(counts)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use mastery_storage::repository::InMemoryRepository;

    fn service() -> (TransferService, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        let service = TransferService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        (service, repo)
    }

    async fn seed_store(repo: &InMemoryRepository) -> UserId {
        let mut editor = NewUser::new("ada", "pw");
        editor.roles.insert(Role::Editor);
        editor.email = Some("ada@example.com".to_owned());
        let user = repo.insert_user(&editor).await.unwrap();

        let mut algebra = Topic::new(TopicId::new("algebra"));
        algebra.set_title("Algebra");
        repo.upsert_topic(&algebra).await.unwrap();

        let mut calculus = Topic::new(TopicId::new("calculus"));
        calculus.set_title("Calculus");
        calculus.add_prerequisite(TopicId::new("algebra")).unwrap();
        repo.upsert_topic(&calculus).await.unwrap();

        let mut problem = Problem::new(ProblemId::new("p1"), TopicId::new("algebra"));
        problem.set_text("2 + 2 = ?");
        problem
            .set_solutions(vec!["4".to_owned(), "5".to_owned()])
            .unwrap();
        repo.upsert_problem(&problem).await.unwrap();

        for correct in [true, true, false] {
            repo.apply_answer(user.id(), &TopicId::new("algebra"), correct)
                .await
                .unwrap();
        }
        user.id()
    }

    #[tokio::test]
    async fn json_round_trip_preserves_the_store() {
        let (service, repo) = service();
        seed_store(&repo).await;
        let json = service.export_json().await.unwrap();

        let (restored, restored_repo) = self::service();
        let counts = restored.import_json(&json).await.unwrap();
        assert_eq!(
            counts,
            ImportCounts {
                users: 1,
                topics: 2,
                problems: 1,
                scores: 1
            }
        );

        let user = restored_repo.find_by_username("ada").await.unwrap().unwrap();
        assert!(user.has_role(Role::Editor));
        assert_eq!(user.email(), Some("ada@example.com"));

        let calculus = restored_repo
            .get_topic(&TopicId::new("calculus"))
            .await
            .unwrap()
            .unwrap();
        assert!(calculus.prerequisites().contains(&TopicId::new("algebra")));

        let problem = restored_repo
            .get_problem(&ProblemId::new("p1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(problem.canonical_answer(), Some("4"));

        let score = restored_repo
            .get_score(user.id(), &TopicId::new("algebra"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(score.problems_seen(), 3);
        assert_eq!(score.correct_answers(), 2);
    }

    #[tokio::test]
    async fn exported_lists_are_json_arrays() {
        let (service, repo) = service();
        seed_store(&repo).await;

        let json = service.export_json().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let topics = value["topics"].as_array().unwrap();
        let calculus = topics
            .iter()
            .find(|t| t["id"] == "calculus")
            .unwrap();
        assert_eq!(calculus["prerequisites"], serde_json::json!(["algebra"]));

        let problems = value["problems"].as_array().unwrap();
        assert_eq!(problems[0]["solutions"], serde_json::json!(["4", "5"]));
    }

    #[tokio::test]
    async fn scores_follow_their_user_across_id_reassignment() {
        let (service, repo) = service();
        // Two users so the exported ids are 1 and 2.
        repo.insert_user(&NewUser::new("first", "pw")).await.unwrap();
        let ada = repo.insert_user(&NewUser::new("ada", "pw")).await.unwrap();
        repo.upsert_topic(&Topic::new(TopicId::new("algebra")))
            .await
            .unwrap();
        repo.apply_answer(ada.id(), &TopicId::new("algebra"), true)
            .await
            .unwrap();
        let json = service.export_json().await.unwrap();

        // The target store already has an unrelated account, so "ada"
        // lands on a different id than the exported 2.
        let (restored, restored_repo) = self::service();
        restored_repo
            .insert_user(&NewUser::new("resident", "pw"))
            .await
            .unwrap();
        restored.import_json(&json).await.unwrap();

        let ada = restored_repo.find_by_username("ada").await.unwrap().unwrap();
        assert_ne!(ada.id().value(), 2);
        let score = restored_repo
            .get_score(ada.id(), &TopicId::new("algebra"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(score.problems_seen(), 1);
    }

    #[tokio::test]
    async fn missing_top_level_keys_read_as_empty() {
        let (service, _repo) = service();
        let counts = service.import_json("{}").await.unwrap();
        assert_eq!(counts, ImportCounts::default());
    }

    #[tokio::test]
    async fn inconsistent_score_counters_are_rejected() {
        let (service, _repo) = service();
        let json = r#"{"scores": [{"user_id": 1, "topic_id": "algebra",
            "problems_seen": 2, "correct_answers": 5}]}"#;
        let err = service.import_json(json).await.unwrap_err();
        assert!(matches!(err, TransferError::Score(_)));
    }

    #[tokio::test]
    async fn importing_an_existing_username_attaches_to_it() {
        let (service, repo) = service();
        repo.insert_user(&NewUser::new("ada", "original")).await.unwrap();

        let json = r#"{"users": [{"username": "ada", "password": "other",
            "is_editor": true}]}"#;
        let counts = service.import_json(json).await.unwrap();
        assert_eq!(counts.users, 1);

        // The existing account wins; nothing is overwritten.
        let ada = repo.find_by_username("ada").await.unwrap().unwrap();
        assert!(ada.verify_password("original"));
        assert!(!ada.has_role(Role::Editor));
    }

    #[tokio::test]
    async fn csv_export_uses_the_expected_header() {
        let (service, repo) = service();
        repo.insert_user(&NewUser::new("ada", "pw")).await.unwrap();

        let csv_text = service.export_users_csv().await.unwrap();
        let mut lines = csv_text.lines();
        assert_eq!(lines.next(), Some("id,username,password"));
        assert_eq!(lines.next(), Some("1,ada,pw"));
    }

    #[tokio::test]
    async fn csv_import_skips_existing_users() {
        let (service, repo) = service();
        repo.insert_user(&NewUser::new("ada", "original")).await.unwrap();

        let data = "id,username,password\n1,ada,changed\n2,grace,pw\n";
        let counts = service.import_users_csv(data, false).await.unwrap();
        assert_eq!(counts.users, 1);

        let ada = repo.find_by_username("ada").await.unwrap().unwrap();
        assert!(ada.verify_password("original"));
        assert!(repo.find_by_username("grace").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn csv_overwrite_replaces_everyone() {
        let (service, repo) = service();
        let old = repo.insert_user(&NewUser::new("old", "pw")).await.unwrap();
        repo.apply_answer(old.id(), &TopicId::new("algebra"), true)
            .await
            .unwrap();

        let data = "id,username,password\n7,ada,pw\n";
        service.import_users_csv(data, true).await.unwrap();

        assert!(repo.find_by_username("old").await.unwrap().is_none());
        let ada = repo.find_by_username("ada").await.unwrap().unwrap();
        // Fresh sequential id, not the one in the file.
        assert_eq!(ada.id().value(), 1);
        assert!(repo.list_scores().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn csv_round_trip_restores_credentials() {
        let (service, repo) = service();
        repo.insert_user(&NewUser::new("ada", "pw1")).await.unwrap();
        repo.insert_user(&NewUser::new("grace", "pw2")).await.unwrap();
        let csv_text = service.export_users_csv().await.unwrap();

        let (restored, restored_repo) = self::service();
        let counts = restored.import_users_csv(&csv_text, false).await.unwrap();
        assert_eq!(counts.users, 2);

        let grace = restored_repo
            .find_by_username("grace")
            .await
            .unwrap()
            .unwrap();
        assert!(grace.verify_password("pw2"));
    }
}
