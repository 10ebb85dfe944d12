//! Per-user progress reports for the dashboard.

use std::sync::Arc;

use rand::rng;
use rand::seq::SliceRandom;

use mastery_core::model::{Topic, TopicId, UserId};
use mastery_core::progress::{ProgressSnapshot, RECOMMENDATION_LIMIT};
use mastery_storage::repository::{ScoreRepository, TopicRepository};

use crate::error::ProgressError;

/// An active topic paired with its mastery fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedTopic {
    pub topic: Topic,
    pub fraction: f64,
}

/// One user's dashboard: the full classification plus two shortlists.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub snapshot: ProgressSnapshot,
    /// Up to five accessible topics, sampled uniformly without
    /// replacement.
    pub recommended: Vec<Topic>,
    /// Up to five active topics, highest fraction first.
    pub top_active: Vec<RankedTopic>,
}

/// Builds per-user progress reports. Reads only, never writes.
#[derive(Clone)]
pub struct ProgressService {
    topics: Arc<dyn TopicRepository>,
    scores: Arc<dyn ScoreRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(topics: Arc<dyn TopicRepository>, scores: Arc<dyn ScoreRepository>) -> Self {
        Self { topics, scores }
    }

    /// Classify every topic for the user.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if repository access fails.
    pub async fn snapshot(&self, user_id: UserId) -> Result<ProgressSnapshot, ProgressError> {
        let topics = self.topics.list_topics().await?;
        let scores = self.scores.scores_for_user(user_id).await?;
        Ok(ProgressSnapshot::classify(&topics, &scores))
    }

    /// The dashboard report: snapshot plus the two recommendation lists.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if repository access fails.
    pub async fn report(&self, user_id: UserId) -> Result<ProgressReport, ProgressError> {
        let topics = self.topics.list_topics().await?;
        let scores = self.scores.scores_for_user(user_id).await?;
        let snapshot = ProgressSnapshot::classify(&topics, &scores);

        let mut sampled: Vec<TopicId> = snapshot.accessible.clone();
        let mut rng = rng();
        sampled.as_mut_slice().shuffle(&mut rng);
        sampled.truncate(RECOMMENDATION_LIMIT);

        let recommended = sampled
            .iter()
            .filter_map(|id| topics.iter().find(|topic| topic.id() == id).cloned())
            .collect();

        let top_active = snapshot
            .top_active(RECOMMENDATION_LIMIT)
            .into_iter()
            .filter_map(|active| {
                topics
                    .iter()
                    .find(|topic| topic.id() == &active.topic_id)
                    .map(|topic| RankedTopic {
                        topic: topic.clone(),
                        fraction: active.fraction,
                    })
            })
            .collect();

        Ok(ProgressReport {
            snapshot,
            recommended,
            top_active,
        })
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    use mastery_core::progress::TopicState;
    use mastery_storage::repository::{InMemoryRepository, StorageError};

    fn service() -> (ProgressService, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        let service = ProgressService::new(Arc::new(repo.clone()), Arc::new(repo.clone()));
        (service, repo)
    }

    async fn seed_topic(repo: &InMemoryRepository, id: &str, prereqs: &[&str]) {
        let mut topic = Topic::new(TopicId::new(id));
        topic.set_title(id);
        for prereq in prereqs {
            topic.add_prerequisite(TopicId::new(*prereq)).unwrap();
        }
        repo.upsert_topic(&topic).await.unwrap();
    }

    async fn master(repo: &InMemoryRepository, user: UserId, topic: &str) {
        for _ in 0..10 {
            repo.apply_answer(user, &TopicId::new(topic), true)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn empty_catalogue_yields_an_empty_report() {
        let (service, _repo) = service();
        let report = service.report(UserId::new(1)).await.unwrap();
        assert!(report.recommended.is_empty());
        assert!(report.top_active.is_empty());
        assert!(report.snapshot.completed.is_empty());
    }

    #[tokio::test]
    async fn snapshot_tracks_mastery_and_unlocking() {
        let (service, repo) = service();
        seed_topic(&repo, "algebra", &[]).await;
        seed_topic(&repo, "calculus", &["algebra"]).await;
        let user = UserId::new(1);

        let before = service.snapshot(user).await.unwrap();
        assert_eq!(before.state_of(&TopicId::new("algebra")), TopicState::Inactive);
        assert!(!before.is_accessible(&TopicId::new("calculus")));

        master(&repo, user, "algebra").await;

        let after = service.snapshot(user).await.unwrap();
        assert_eq!(after.state_of(&TopicId::new("algebra")), TopicState::Completed);
        assert!(after.is_accessible(&TopicId::new("calculus")));
    }

    #[tokio::test]
    async fn recommended_draws_from_accessible_only() {
        let (service, repo) = service();
        seed_topic(&repo, "algebra", &[]).await;
        seed_topic(&repo, "calculus", &["algebra"]).await;
        seed_topic(&repo, "geometry", &[]).await;

        let report = service.report(UserId::new(1)).await.unwrap();

        let ids: HashSet<&str> = report
            .recommended
            .iter()
            .map(|topic| topic.id().as_str())
            .collect();
        assert_eq!(ids, HashSet::from(["algebra", "geometry"]));
    }

    #[tokio::test]
    async fn recommended_is_capped_at_five() {
        let (service, repo) = service();
        for i in 0..8 {
            seed_topic(&repo, &format!("t{i}"), &[]).await;
        }

        let report = service.report(UserId::new(1)).await.unwrap();
        assert_eq!(report.recommended.len(), 5);
        assert_eq!(report.snapshot.accessible.len(), 8);
    }

    #[tokio::test]
    async fn top_active_ranks_by_fraction() {
        let (service, repo) = service();
        let user = UserId::new(1);
        for (id, correct) in [("low", 2), ("high", 8), ("mid", 5)] {
            seed_topic(&repo, id, &[]).await;
            for i in 0..10 {
                repo.apply_answer(user, &TopicId::new(id), i < correct)
                    .await
                    .unwrap();
            }
        }

        let report = service.report(user).await.unwrap();
        let ids: Vec<&str> = report
            .top_active
            .iter()
            .map(|ranked| ranked.topic.id().as_str())
            .collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
        assert_eq!(report.top_active[0].fraction, 0.8);
    }

    #[tokio::test]
    async fn top_active_is_capped_at_five() {
        let (service, repo) = service();
        let user = UserId::new(1);
        for i in 0..7 {
            let id = format!("t{i}");
            seed_topic(&repo, &id, &[]).await;
            repo.apply_answer(user, &TopicId::new(&id), true).await.unwrap();
        }

        let report = service.report(user).await.unwrap();
        assert_eq!(report.top_active.len(), 5);
    }

    #[tokio::test]
    async fn mastered_topics_leave_both_lists() {
        let (service, repo) = service();
        seed_topic(&repo, "algebra", &[]).await;
        let user = UserId::new(1);
        master(&repo, user, "algebra").await;

        let report = service.report(user).await.unwrap();
        assert!(report.recommended.is_empty());
        assert!(report.top_active.is_empty());
        assert!(report.snapshot.completed.contains(&TopicId::new("algebra")));
    }

    struct FailingTopicRepo;

    #[async_trait::async_trait]
    impl TopicRepository for FailingTopicRepo {
        async fn upsert_topic(&self, _topic: &Topic) -> Result<(), StorageError> {
            Err(StorageError::Connection("fail".to_string()))
        }

        async fn get_topic(&self, _id: &TopicId) -> Result<Option<Topic>, StorageError> {
            Err(StorageError::Connection("fail".to_string()))
        }

        async fn list_topics(&self) -> Result<Vec<Topic>, StorageError> {
            Err(StorageError::Connection("fail".to_string()))
        }

        async fn delete_topic(&self, _id: &TopicId) -> Result<(), StorageError> {
            Err(StorageError::Connection("fail".to_string()))
        }
    }

    #[tokio::test]
    async fn storage_failures_surface_in_the_report() {
        let repo = InMemoryRepository::new();
        let service = ProgressService::new(Arc::new(FailingTopicRepo), Arc::new(repo));

        let err = service.report(UserId::new(1)).await.unwrap_err();
        assert!(matches!(
            err,
            ProgressError::Storage(StorageError::Connection(_))
        ));
    }
}
