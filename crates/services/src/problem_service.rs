//! Problem curation, listing, and practice presentation.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rng;
use rand::seq::{IndexedRandom, SliceRandom};

use mastery_core::model::{Problem, ProblemId, TopicId};
use mastery_storage::repository::{ProblemRepository, StorageError, TopicRepository};

use crate::auth_service::CurrentUser;
use crate::error::ProblemServiceError;

/// Label shown in listings when a problem's topic cannot be resolved.
const MISSING_TOPIC_LABEL: &str = "N/A";

/// A problem row for the curation table, annotated with its topic title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemListing {
    pub problem: Problem,
    pub topic_title: String,
}

/// A problem ready for practice, answer choices shuffled.
///
/// Only `choices` is shuffled; the stored solution order is untouched,
/// so the canonical answer stays index 0 in `problem`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemPresentation {
    pub problem: Problem,
    pub choices: Vec<String>,
}

/// Curates problems and hands them out for practice.
#[derive(Clone)]
pub struct ProblemService {
    topics: Arc<dyn TopicRepository>,
    problems: Arc<dyn ProblemRepository>,
}

impl ProblemService {
    #[must_use]
    pub fn new(topics: Arc<dyn TopicRepository>, problems: Arc<dyn ProblemRepository>) -> Self {
        Self { topics, problems }
    }

    /// Create a blank problem under an existing topic.
    ///
    /// # Errors
    ///
    /// Returns `ProblemServiceError::Auth` for non-editors, or
    /// `ProblemServiceError::UnknownTopic` if the topic does not exist.
    pub async fn create_problem(
        &self,
        actor: &CurrentUser,
        topic_id: &TopicId,
    ) -> Result<Problem, ProblemServiceError> {
        actor.require_editor()?;
        self.require_topic(topic_id).await?;

        let problem = Problem::new(ProblemId::generate(), topic_id.clone());
        self.problems.upsert_problem(&problem).await?;
        log::info!(
            "{} created problem {} under topic {topic_id}",
            actor.username,
            problem.id()
        );
        Ok(problem)
    }

    /// Replace a problem's text and solution list.
    ///
    /// The first solution is the canonical answer; the rest are decoys.
    ///
    /// # Errors
    ///
    /// Returns `ProblemServiceError::Problem` if a solution entry is
    /// blank or embeds the list delimiter, `Auth` for non-editors, or
    /// `Storage` with `NotFound` inside if the problem does not exist.
    pub async fn update_problem(
        &self,
        actor: &CurrentUser,
        id: &ProblemId,
        text: &str,
        solutions: Vec<String>,
    ) -> Result<Problem, ProblemServiceError> {
        actor.require_editor()?;
        let mut problem = self
            .problems
            .get_problem(id)
            .await?
            .ok_or(StorageError::NotFound)?;
        problem.set_text(text);
        problem.set_solutions(solutions)?;
        self.problems.upsert_problem(&problem).await?;
        Ok(problem)
    }

    /// Re-parent a problem to another existing topic.
    ///
    /// # Errors
    ///
    /// Returns `ProblemServiceError::UnknownTopic` if the target topic
    /// does not exist, `Auth` for non-editors, or `Storage` with
    /// `NotFound` inside if the problem does not exist.
    pub async fn move_problem(
        &self,
        actor: &CurrentUser,
        id: &ProblemId,
        topic_id: &TopicId,
    ) -> Result<Problem, ProblemServiceError> {
        actor.require_editor()?;
        let mut problem = self
            .problems
            .get_problem(id)
            .await?
            .ok_or(StorageError::NotFound)?;
        self.require_topic(topic_id).await?;

        problem.move_to(topic_id.clone());
        self.problems.upsert_problem(&problem).await?;
        Ok(problem)
    }

    /// Delete a problem. Scores are untouched; attempts already counted
    /// stay counted.
    ///
    /// # Errors
    ///
    /// Returns `ProblemServiceError::Auth` for non-editors, or `Storage`
    /// with `NotFound` inside if the problem does not exist.
    pub async fn delete_problem(
        &self,
        actor: &CurrentUser,
        id: &ProblemId,
    ) -> Result<(), ProblemServiceError> {
        actor.require_editor()?;
        self.problems.delete_problem(id).await?;
        log::info!("{} deleted problem {id}", actor.username);
        Ok(())
    }

    /// Fetch a problem by id; `None` when missing.
    ///
    /// # Errors
    ///
    /// Returns `ProblemServiceError::Storage` if repository access fails.
    pub async fn get_problem(&self, id: &ProblemId) -> Result<Option<Problem>, ProblemServiceError> {
        let problem = self.problems.get_problem(id).await?;
        Ok(problem)
    }

    /// Problems attached to one topic, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `ProblemServiceError::Storage` if repository access fails.
    pub async fn problems_for_topic(
        &self,
        topic_id: &TopicId,
    ) -> Result<Vec<Problem>, ProblemServiceError> {
        let problems = self.problems.problems_for_topic(topic_id).await?;
        Ok(problems)
    }

    /// Every problem annotated with its topic's title for the curation
    /// table.
    ///
    /// # Errors
    ///
    /// Returns `ProblemServiceError::Storage` if repository access fails.
    pub async fn list_problems(&self) -> Result<Vec<ProblemListing>, ProblemServiceError> {
        let titles: HashMap<TopicId, String> = self
            .topics
            .list_topics()
            .await?
            .into_iter()
            .map(|topic| (topic.id().clone(), topic.title().to_owned()))
            .collect();

        let problems = self.problems.list_problems().await?;
        let mut listings = Vec::with_capacity(problems.len());
        for problem in problems {
            let topic_title = titles
                .get(problem.topic_id())
                .cloned()
                .unwrap_or_else(|| MISSING_TOPIC_LABEL.to_owned());
            listings.push(ProblemListing {
                problem,
                topic_title,
            });
        }
        Ok(listings)
    }

    /// Uniform random pick from a topic's problems; `None` when the
    /// topic has no problems.
    ///
    /// # Errors
    ///
    /// Returns `ProblemServiceError::Storage` if repository access fails.
    pub async fn random_problem(
        &self,
        topic_id: &TopicId,
    ) -> Result<Option<Problem>, ProblemServiceError> {
        let pool = self.problems.problems_for_topic(topic_id).await?;
        let mut rng = rng();
        Ok(pool.choose(&mut rng).cloned())
    }

    /// A problem with its answer choices shuffled for display.
    ///
    /// # Errors
    ///
    /// Returns `ProblemServiceError::Storage` with `NotFound` inside if
    /// the problem does not exist.
    pub async fn presentation(
        &self,
        id: &ProblemId,
    ) -> Result<ProblemPresentation, ProblemServiceError> {
        let problem = self
            .problems
            .get_problem(id)
            .await?
            .ok_or(StorageError::NotFound)?;

        let mut choices = problem.solutions().to_vec();
        let mut rng = rng();
        choices.as_mut_slice().shuffle(&mut rng);
        Ok(ProblemPresentation { problem, choices })
    }

    async fn require_topic(&self, topic_id: &TopicId) -> Result<(), ProblemServiceError> {
        self.topics
            .get_topic(topic_id)
            .await?
            .ok_or_else(|| ProblemServiceError::UnknownTopic(topic_id.to_string()))?;
        Ok(())
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use mastery_core::model::{Role, RoleSet, Topic, UserId};
    use mastery_storage::repository::InMemoryRepository;

    use crate::error::AuthError;

    fn editor() -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            username: "editor".to_owned(),
            roles: RoleSet::of(&[Role::Student, Role::Editor]),
        }
    }

    fn student() -> CurrentUser {
        CurrentUser {
            id: UserId::new(2),
            username: "student".to_owned(),
            roles: RoleSet::of(&[Role::Student]),
        }
    }

    fn service() -> (ProblemService, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        let service = ProblemService::new(Arc::new(repo.clone()), Arc::new(repo.clone()));
        (service, repo)
    }

    async fn seed_topic(repo: &InMemoryRepository, id: &str, title: &str) -> TopicId {
        let mut topic = Topic::new(TopicId::new(id));
        topic.set_title(title);
        repo.upsert_topic(&topic).await.unwrap();
        topic.id().clone()
    }

    #[tokio::test]
    async fn create_then_update_round_trips() {
        let (service, repo) = service();
        let topic_id = seed_topic(&repo, "algebra", "Algebra").await;

        let problem = service.create_problem(&editor(), &topic_id).await.unwrap();
        assert_eq!(problem.text(), "");

        let updated = service
            .update_problem(
                &editor(),
                problem.id(),
                "2 + 2 = ?",
                vec!["4".to_owned(), "5".to_owned()],
            )
            .await
            .unwrap();
        assert_eq!(updated.canonical_answer(), Some("4"));
    }

    #[tokio::test]
    async fn create_under_unknown_topic_is_rejected() {
        let (service, _repo) = service();
        let err = service
            .create_problem(&editor(), &TopicId::new("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProblemServiceError::UnknownTopic(_)));
    }

    #[tokio::test]
    async fn non_editor_cannot_update() {
        let (service, repo) = service();
        let topic_id = seed_topic(&repo, "algebra", "Algebra").await;
        let problem = service.create_problem(&editor(), &topic_id).await.unwrap();

        let err = service
            .update_problem(&student(), problem.id(), "text", vec!["4".to_owned()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProblemServiceError::Auth(AuthError::EditorRequired)
        ));

        let stored = service.get_problem(problem.id()).await.unwrap().unwrap();
        assert_eq!(stored.text(), "");
    }

    #[tokio::test]
    async fn move_problem_validates_the_target() {
        let (service, repo) = service();
        let algebra = seed_topic(&repo, "algebra", "Algebra").await;
        seed_topic(&repo, "geometry", "Geometry").await;
        let problem = service.create_problem(&editor(), &algebra).await.unwrap();

        let moved = service
            .move_problem(&editor(), problem.id(), &TopicId::new("geometry"))
            .await
            .unwrap();
        assert_eq!(moved.topic_id(), &TopicId::new("geometry"));

        let err = service
            .move_problem(&editor(), problem.id(), &TopicId::new("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProblemServiceError::UnknownTopic(_)));
    }

    #[tokio::test]
    async fn listing_annotates_topic_titles() {
        let (service, repo) = service();
        let topic_id = seed_topic(&repo, "algebra", "Algebra").await;
        service.create_problem(&editor(), &topic_id).await.unwrap();

        // Bypass the service to orphan a problem.
        let stray = Problem::new(ProblemId::new("stray"), TopicId::new("gone"));
        repo.upsert_problem(&stray).await.unwrap();

        let listings = service.list_problems().await.unwrap();
        assert_eq!(listings.len(), 2);

        let titles: Vec<&str> = listings.iter().map(|l| l.topic_title.as_str()).collect();
        assert!(titles.contains(&"Algebra"));
        assert!(titles.contains(&"N/A"));
    }

    #[tokio::test]
    async fn random_problem_on_empty_topic_is_none() {
        let (service, repo) = service();
        let topic_id = seed_topic(&repo, "algebra", "Algebra").await;

        let picked = service.random_problem(&topic_id).await.unwrap();
        assert!(picked.is_none());
    }

    #[tokio::test]
    async fn random_problem_comes_from_the_topic() {
        let (service, repo) = service();
        let algebra = seed_topic(&repo, "algebra", "Algebra").await;
        let geometry = seed_topic(&repo, "geometry", "Geometry").await;
        let wanted = service.create_problem(&editor(), &algebra).await.unwrap();
        service.create_problem(&editor(), &geometry).await.unwrap();

        for _ in 0..10 {
            let picked = service.random_problem(&algebra).await.unwrap().unwrap();
            assert_eq!(picked.id(), wanted.id());
        }
    }

    #[tokio::test]
    async fn presentation_shuffles_a_copy_of_the_solutions() {
        let (service, repo) = service();
        let topic_id = seed_topic(&repo, "algebra", "Algebra").await;
        let problem = service.create_problem(&editor(), &topic_id).await.unwrap();
        let solutions: Vec<String> = ["4", "5", "6", "7"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        service
            .update_problem(&editor(), problem.id(), "2 + 2 = ?", solutions.clone())
            .await
            .unwrap();

        let shown = service.presentation(problem.id()).await.unwrap();

        let mut sorted_choices = shown.choices.clone();
        sorted_choices.sort();
        let mut sorted_solutions = solutions.clone();
        sorted_solutions.sort();
        assert_eq!(sorted_choices, sorted_solutions);

        // Stored order is untouched.
        assert_eq!(shown.problem.solutions(), solutions.as_slice());
        assert_eq!(shown.problem.canonical_answer(), Some("4"));
    }

    #[tokio::test]
    async fn delete_problem_removes_it() {
        let (service, repo) = service();
        let topic_id = seed_topic(&repo, "algebra", "Algebra").await;
        let problem = service.create_problem(&editor(), &topic_id).await.unwrap();

        service.delete_problem(&editor(), problem.id()).await.unwrap();
        assert!(service.get_problem(problem.id()).await.unwrap().is_none());

        let err = service
            .delete_problem(&editor(), problem.id())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProblemServiceError::Storage(StorageError::NotFound)
        ));
    }
}
