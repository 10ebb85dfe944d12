//! Per-user, per-topic attempt counters and the mastery computation.

use thiserror::Error;

use crate::model::ids::{TopicId, UserId};

/// Minimum denominator for the mastery fraction. Early attempts are
/// diluted so a lucky first answer does not read as mastery.
pub const ATTEMPT_FLOOR: u32 = 4;

/// Strict lower bound a fraction must exceed for a topic to count as
/// mastered.
pub const MASTERY_BAR: f64 = 0.95;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("correct answers ({correct}) exceed problems seen ({seen})")]
    CorrectExceedsSeen { seen: u32, correct: u32 },
}

/// Attempt counters for one user on one topic.
///
/// `correct_answers` never exceeds `problems_seen`; both only grow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    user_id: UserId,
    topic_id: TopicId,
    problems_seen: u32,
    correct_answers: u32,
}

impl Score {
    /// Creates a fresh score with zero attempts.
    #[must_use]
    pub fn new(user_id: UserId, topic_id: TopicId) -> Self {
        Self {
            user_id,
            topic_id,
            problems_seen: 0,
            correct_answers: 0,
        }
    }

    /// Rebuilds a score from stored counters.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::CorrectExceedsSeen` if the counters are
    /// inconsistent.
    pub fn from_persisted(
        user_id: UserId,
        topic_id: TopicId,
        problems_seen: u32,
        correct_answers: u32,
    ) -> Result<Self, ScoreError> {
        if correct_answers > problems_seen {
            return Err(ScoreError::CorrectExceedsSeen {
                seen: problems_seen,
                correct: correct_answers,
            });
        }
        Ok(Self {
            user_id,
            topic_id,
            problems_seen,
            correct_answers,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn topic_id(&self) -> &TopicId {
        &self.topic_id
    }

    #[must_use]
    pub fn problems_seen(&self) -> u32 {
        self.problems_seen
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn has_attempts(&self) -> bool {
        self.problems_seen > 0
    }

    /// Mastery fraction in `[0, 1]`.
    ///
    /// The denominator is floored at [`ATTEMPT_FLOOR`], so three correct
    /// answers out of three attempts yields 0.75, not 1.0.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        let denominator = self.problems_seen.max(ATTEMPT_FLOOR);
        f64::from(self.correct_answers) / f64::from(denominator)
    }

    /// Mastery fraction as a whole percentage, truncated toward zero.
    #[must_use]
    pub fn percent(&self) -> u32 {
        let denominator = u64::from(self.problems_seen.max(ATTEMPT_FLOOR));
        let percent = u64::from(self.correct_answers) * 100 / denominator;
        // correct_answers <= problems_seen keeps this within 0..=100.
        percent as u32
    }

    /// A topic is mastered once it has been attempted and the fraction
    /// strictly exceeds [`MASTERY_BAR`]. Exactly 0.95 is not enough.
    #[must_use]
    pub fn is_mastered(&self) -> bool {
        self.problems_seen > 0 && self.fraction() > MASTERY_BAR
    }

    /// Records one attempt, counting it as correct when `correct` is set.
    pub fn record_attempt(&mut self, correct: bool) {
        self.problems_seen = self.problems_seen.saturating_add(1);
        if correct {
            self.correct_answers = self.correct_answers.saturating_add(1);
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
