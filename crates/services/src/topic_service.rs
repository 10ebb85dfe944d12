//! Topic curation and the per-user topic catalogue.

use std::collections::HashMap;
use std::sync::Arc;

use mastery_core::graph::would_create_cycle;
use mastery_core::model::{Score, Topic, TopicId, UserId};
use mastery_core::prereq::PrereqList;
use mastery_storage::repository::{
    ProblemRepository, ScoreRepository, StorageError, TopicRepository,
};

use crate::auth_service::CurrentUser;
use crate::error::TopicServiceError;

/// A topic with the numbers the catalogue shows next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicOverview {
    pub topic: Topic,
    pub num_problems: u32,
    /// The user's integer percent score, 0 when unscored.
    pub percent: u32,
}

/// Curates topics. Every mutation is editor-gated.
#[derive(Clone)]
pub struct TopicService {
    topics: Arc<dyn TopicRepository>,
    problems: Arc<dyn ProblemRepository>,
    scores: Arc<dyn ScoreRepository>,
}

impl TopicService {
    #[must_use]
    pub fn new(
        topics: Arc<dyn TopicRepository>,
        problems: Arc<dyn ProblemRepository>,
        scores: Arc<dyn ScoreRepository>,
    ) -> Self {
        Self {
            topics,
            problems,
            scores,
        }
    }

    /// Create a blank topic for the editor to fill in.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::Auth` for non-editors, or `Storage`
    /// if persistence fails.
    pub async fn create_topic(&self, actor: &CurrentUser) -> Result<Topic, TopicServiceError> {
        actor.require_editor()?;
        let topic = Topic::new(TopicId::generate());
        self.topics.upsert_topic(&topic).await?;
        log::info!("{} created topic {}", actor.username, topic.id());
        Ok(topic)
    }

    /// Replace a topic's title and description.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::Auth` for non-editors, or `Storage`
    /// with `NotFound` inside if the topic does not exist.
    pub async fn update_topic(
        &self,
        actor: &CurrentUser,
        id: &TopicId,
        title: &str,
        description: &str,
    ) -> Result<Topic, TopicServiceError> {
        actor.require_editor()?;
        let mut topic = self
            .topics
            .get_topic(id)
            .await?
            .ok_or(StorageError::NotFound)?;
        topic.set_title(title);
        topic.set_description(description);
        self.topics.upsert_topic(&topic).await?;
        Ok(topic)
    }

    /// Add a prerequisite edge.
    ///
    /// Adding an edge that is already listed is a no-op. The edge is
    /// checked against the whole graph before it is persisted.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::Topic` for a self-reference or an id
    /// the codec rejects, and `TopicServiceError::PrerequisiteCycle`
    /// when the new edge would close a cycle.
    pub async fn add_prerequisite(
        &self,
        actor: &CurrentUser,
        id: &TopicId,
        prerequisite: &TopicId,
    ) -> Result<Topic, TopicServiceError> {
        actor.require_editor()?;
        let mut topic = self
            .topics
            .get_topic(id)
            .await?
            .ok_or(StorageError::NotFound)?;

        let added = topic.add_prerequisite(prerequisite.clone())?;
        if !added {
            return Ok(topic);
        }

        let graph = self.prerequisite_graph().await?;
        if would_create_cycle(id, prerequisite, &graph) {
            log::debug!("rejected prerequisite {prerequisite} for {id}: cycle");
            return Err(TopicServiceError::PrerequisiteCycle);
        }

        self.topics.upsert_topic(&topic).await?;
        Ok(topic)
    }

    /// Remove a prerequisite edge; removing an unlisted one is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::Auth` for non-editors, or `Storage`
    /// with `NotFound` inside if the topic does not exist.
    pub async fn remove_prerequisite(
        &self,
        actor: &CurrentUser,
        id: &TopicId,
        prerequisite: &TopicId,
    ) -> Result<Topic, TopicServiceError> {
        actor.require_editor()?;
        let mut topic = self
            .topics
            .get_topic(id)
            .await?
            .ok_or(StorageError::NotFound)?;
        if topic.remove_prerequisite(prerequisite) {
            self.topics.upsert_topic(&topic).await?;
        }
        Ok(topic)
    }

    /// Delete a topic; its problems and scores go with it.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::Auth` for non-editors, or `Storage`
    /// with `NotFound` inside if the topic does not exist.
    pub async fn delete_topic(
        &self,
        actor: &CurrentUser,
        id: &TopicId,
    ) -> Result<(), TopicServiceError> {
        actor.require_editor()?;
        self.topics.delete_topic(id).await?;
        log::info!("{} deleted topic {id}", actor.username);
        Ok(())
    }

    /// Fetch a topic by id; `None` when missing.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::Storage` if repository access fails.
    pub async fn get_topic(&self, id: &TopicId) -> Result<Option<Topic>, TopicServiceError> {
        let topic = self.topics.get_topic(id).await?;
        Ok(topic)
    }

    /// All topics ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::Storage` if repository access fails.
    pub async fn list_topics(&self) -> Result<Vec<Topic>, TopicServiceError> {
        let topics = self.topics.list_topics().await?;
        Ok(topics)
    }

    /// Every topic annotated with its problem count and the user's
    /// percent score. Reads only; unscored topics show 0 percent.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::Storage` if repository access fails.
    pub async fn topic_overviews(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TopicOverview>, TopicServiceError> {
        let topics = self.topics.list_topics().await?;
        let scores = self.scores.scores_for_user(user_id).await?;

        let mut overviews = Vec::with_capacity(topics.len());
        for topic in topics {
            let num_problems = self.problems.count_for_topic(topic.id()).await?;
            let percent = scores
                .iter()
                .find(|score| score.topic_id() == topic.id())
                .map_or(0, Score::percent);
            overviews.push(TopicOverview {
                topic,
                num_problems,
                percent,
            });
        }
        Ok(overviews)
    }

    async fn prerequisite_graph(&self) -> Result<HashMap<TopicId, PrereqList>, TopicServiceError> {
        let topics = self.topics.list_topics().await?;
        Ok(topics
            .iter()
            .map(|topic| (topic.id().clone(), topic.prerequisites().clone()))
            .collect())
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use mastery_core::model::{Role, RoleSet, TopicError};
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

    fn service() -> (TopicService, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        let service = TopicService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        (service, repo)
    }

    #[tokio::test]
    async fn create_then_update_round_trips() {
        let (service, _repo) = service();
        let topic = service.create_topic(&editor()).await.unwrap();
        assert_eq!(topic.title(), "");

        let updated = service
            .update_topic(&editor(), topic.id(), "Algebra", "Solving for x.")
            .await
            .unwrap();
        assert_eq!(updated.title(), "Algebra");

        let fetched = service.get_topic(topic.id()).await.unwrap().unwrap();
        assert_eq!(fetched.description(), "Solving for x.");
    }

    #[tokio::test]
    async fn non_editor_cannot_create() {
        let (service, _repo) = service();
        let err = service.create_topic(&student()).await.unwrap_err();
        assert!(matches!(
            err,
            TopicServiceError::Auth(AuthError::EditorRequired)
        ));
        assert!(service.list_topics().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_editor_cannot_delete() {
        let (service, _repo) = service();
        let topic = service.create_topic(&editor()).await.unwrap();

        let err = service.delete_topic(&student(), topic.id()).await.unwrap_err();
        assert!(matches!(
            err,
            TopicServiceError::Auth(AuthError::EditorRequired)
        ));
        assert_eq!(service.list_topics().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn prerequisite_edge_round_trips() {
        let (service, _repo) = service();
        let algebra = service.create_topic(&editor()).await.unwrap();
        let calculus = service.create_topic(&editor()).await.unwrap();

        let updated = service
            .add_prerequisite(&editor(), calculus.id(), algebra.id())
            .await
            .unwrap();
        assert!(updated.prerequisites().contains(algebra.id()));

        let updated = service
            .remove_prerequisite(&editor(), calculus.id(), algebra.id())
            .await
            .unwrap();
        assert!(updated.prerequisites().is_empty());
    }

    #[tokio::test]
    async fn self_prerequisite_is_rejected() {
        let (service, _repo) = service();
        let topic = service.create_topic(&editor()).await.unwrap();

        let err = service
            .add_prerequisite(&editor(), topic.id(), topic.id())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TopicServiceError::Topic(TopicError::SelfPrerequisite)
        ));
    }

    #[tokio::test]
    async fn cycle_is_rejected_and_not_persisted() {
        let (service, _repo) = service();
        let a = service.create_topic(&editor()).await.unwrap();
        let b = service.create_topic(&editor()).await.unwrap();

        service
            .add_prerequisite(&editor(), b.id(), a.id())
            .await
            .unwrap();
        let err = service
            .add_prerequisite(&editor(), a.id(), b.id())
            .await
            .unwrap_err();
        assert!(matches!(err, TopicServiceError::PrerequisiteCycle));

        let stored = service.get_topic(a.id()).await.unwrap().unwrap();
        assert!(stored.prerequisites().is_empty());
    }

    #[tokio::test]
    async fn transitive_cycle_is_rejected() {
        let (service, _repo) = service();
        let a = service.create_topic(&editor()).await.unwrap();
        let b = service.create_topic(&editor()).await.unwrap();
        let c = service.create_topic(&editor()).await.unwrap();

        service.add_prerequisite(&editor(), b.id(), a.id()).await.unwrap();
        service.add_prerequisite(&editor(), c.id(), b.id()).await.unwrap();

        let err = service
            .add_prerequisite(&editor(), a.id(), c.id())
            .await
            .unwrap_err();
        assert!(matches!(err, TopicServiceError::PrerequisiteCycle));
    }

    #[tokio::test]
    async fn duplicate_prerequisite_is_a_no_op() {
        let (service, _repo) = service();
        let a = service.create_topic(&editor()).await.unwrap();
        let b = service.create_topic(&editor()).await.unwrap();

        service.add_prerequisite(&editor(), b.id(), a.id()).await.unwrap();
        let again = service
            .add_prerequisite(&editor(), b.id(), a.id())
            .await
            .unwrap();
        assert_eq!(again.prerequisites().len(), 1);
    }

    #[tokio::test]
    async fn overviews_carry_counts_and_percent() {
        let (service, repo) = service();
        let topic = service.create_topic(&editor()).await.unwrap();

        let problem = mastery_core::model::Problem::new(
            mastery_core::model::ProblemId::new("p1"),
            topic.id().clone(),
        );
        repo.upsert_problem(&problem).await.unwrap();

        let user = UserId::new(7);
        for correct in [true, true, true] {
            repo.apply_answer(user, topic.id(), correct).await.unwrap();
        }

        let overviews = service.topic_overviews(user).await.unwrap();
        assert_eq!(overviews.len(), 1);
        assert_eq!(overviews[0].num_problems, 1);
        // 3 correct of max(3, 4) attempts.
        assert_eq!(overviews[0].percent, 75);
    }

    #[tokio::test]
    async fn overview_percent_defaults_to_zero() {
        let (service, _repo) = service();
        service.create_topic(&editor()).await.unwrap();

        let overviews = service.topic_overviews(UserId::new(9)).await.unwrap();
        assert_eq!(overviews[0].percent, 0);
        assert_eq!(overviews[0].num_problems, 0);
    }

    #[tokio::test]
    async fn update_missing_topic_is_not_found() {
        let (service, _repo) = service();
        let err = service
            .update_topic(&editor(), &TopicId::new("ghost"), "t", "d")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TopicServiceError::Storage(StorageError::NotFound)
        ));
    }
}
