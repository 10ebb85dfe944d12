//! The scoring update applied on every answer submission.

use std::sync::Arc;

use mastery_core::model::{ProblemId, Score, UserId};
use mastery_storage::repository::{ProblemRepository, ScoreRepository, StorageError};

use crate::error::ScoringError;

/// Result of checking one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub correct: bool,
    /// The score after this attempt was counted.
    pub score: Score,
}

/// Applies answer submissions to the per-topic score counters.
#[derive(Clone)]
pub struct ScoringService {
    problems: Arc<dyn ProblemRepository>,
    scores: Arc<dyn ScoreRepository>,
}

impl ScoringService {
    #[must_use]
    pub fn new(problems: Arc<dyn ProblemRepository>, scores: Arc<dyn ScoreRepository>) -> Self {
        Self { problems, scores }
    }

    /// Check `answer` against the problem's canonical answer and count
    /// the attempt on the owning topic's score.
    ///
    /// Every submission counts one attempt; only a correct one moves the
    /// correct counter. The score row is created on first contact with
    /// the topic. A wrong answer is an outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns `ScoringError::Storage` with `StorageError::NotFound`
    /// inside if the problem does not exist, or other storage errors
    /// from the score write.
    pub async fn submit_answer(
        &self,
        user_id: UserId,
        problem_id: &ProblemId,
        answer: &str,
    ) -> Result<AnswerOutcome, ScoringError> {
        let problem = self
            .problems
            .get_problem(problem_id)
            .await?
            .ok_or(StorageError::NotFound)?;

        let correct = problem.check_answer(answer);
        let score = self
            .scores
            .apply_answer(user_id, problem.topic_id(), correct)
            .await?;

        log::debug!(
            "user {user_id} answered problem {problem_id} {}",
            if correct { "correctly" } else { "incorrectly" }
        );
        Ok(AnswerOutcome { correct, score })
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
