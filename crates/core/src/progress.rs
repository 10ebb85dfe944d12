//! Pure progress classification over one user's scores.
//!
//! Given every topic and the user's score records, each topic lands in
//! exactly one state. Completed topics gate the accessible set; no
//! storage is touched, and a missing score simply reads as zero attempts.

use std::collections::HashSet;

use crate::model::{Score, Topic, TopicId};

/// Upper bound on each recommendation list.
pub const RECOMMENDATION_LIMIT: usize = 5;

/// Where a topic sits for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicState {
    /// Attempted and mastered.
    Completed,
    /// Attempted but below the mastery bar.
    Active,
    /// Never attempted (no score record, or zero problems seen).
    Inactive,
}

/// An active topic annotated with its mastery fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTopic {
    pub topic_id: TopicId,
    pub fraction: f64,
}

/// One user's progress across all topics at a point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub completed: HashSet<TopicId>,
    pub active: Vec<ActiveTopic>,
    pub inactive: Vec<TopicId>,
    /// Inactive topics whose prerequisites are all completed. Always a
    /// subset of `inactive`.
    pub accessible: Vec<TopicId>,
}

impl ProgressSnapshot {
    /// Classifies every topic for one user.
    ///
    /// `scores` must be the user's own records; rows for topics missing
    /// from `topics` are ignored. List order follows `topics`, which is
    /// what makes `top_active` ties deterministic.
    #[must_use]
    pub fn classify(topics: &[Topic], scores: &[Score]) -> Self {
        let mut snapshot = Self::default();

        for topic in topics {
            let score = scores.iter().find(|s| s.topic_id() == topic.id());
            match score {
                Some(score) if score.has_attempts() => {
                    if score.is_mastered() {
                        snapshot.completed.insert(topic.id().clone());
                    } else {
                        snapshot.active.push(ActiveTopic {
                            topic_id: topic.id().clone(),
                            fraction: score.fraction(),
                        });
                    }
                }
                _ => snapshot.inactive.push(topic.id().clone()),
            }
        }

        for topic in topics {
            if !snapshot.inactive.contains(topic.id()) {
                continue;
            }
            let unlocked = topic
                .prerequisites()
                .iter()
                .all(|prereq| snapshot.completed.contains(prereq));
            if unlocked {
                snapshot.accessible.push(topic.id().clone());
            }
        }

        snapshot
    }

    /// The state of a single topic in this snapshot.
    ///
    /// Topics unknown to the snapshot read as inactive, matching how a
    /// topic with no score record is classified.
    #[must_use]
    pub fn state_of(&self, topic_id: &TopicId) -> TopicState {
        if self.completed.contains(topic_id) {
            TopicState::Completed
        } else if self.active.iter().any(|a| &a.topic_id == topic_id) {
            TopicState::Active
        } else {
            TopicState::Inactive
        }
    }

    #[must_use]
    pub fn is_accessible(&self, topic_id: &TopicId) -> bool {
        self.accessible.contains(topic_id)
    }

    /// Up to `limit` active topics, highest fraction first. The sort is
    /// stable, so ties keep the classification order.
    #[must_use]
    pub fn top_active(&self, limit: usize) -> Vec<ActiveTopic> {
        let mut sorted = self.active.clone();
        sorted.sort_by(|a, b| b.fraction.total_cmp(&a.fraction));
        sorted.truncate(limit);
        sorted
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
