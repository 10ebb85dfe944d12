//! Practice problems and their solution lists.

use thiserror::Error;

use crate::model::ids::{ProblemId, TopicId};
use crate::prereq::LIST_DELIMITER;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProblemError {
    #[error("solution entry is empty")]
    EmptySolution,

    #[error("solution entry contains the list delimiter")]
    SolutionContainsDelimiter,
}

/// Encodes a solution list into its stored delimiter-joined form.
#[must_use]
pub fn encode_solutions(solutions: &[String]) -> String {
    solutions.join(LIST_DELIMITER)
}

/// Decodes a stored solution string, dropping empty tokens.
///
/// Unlike prerequisites, order matters (the first entry is the canonical
/// answer) and duplicates are kept.
#[must_use]
pub fn decode_solutions(raw: &str) -> Vec<String> {
    raw.split(LIST_DELIMITER)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

/// A practice problem attached to a topic. Like topics, problems are
/// created blank and filled in by editors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    id: ProblemId,
    topic_id: TopicId,
    text: String,
    solutions: Vec<String>,
}

impl Problem {
    /// Creates a blank problem under the given topic.
    #[must_use]
    pub fn new(id: ProblemId, topic_id: TopicId) -> Self {
        Self {
            id,
            topic_id,
            text: String::new(),
            solutions: Vec::new(),
        }
    }

    /// Rebuilds a problem from stored fields.
    #[must_use]
    pub fn from_parts(
        id: ProblemId,
        topic_id: TopicId,
        text: impl Into<String>,
        solutions: Vec<String>,
    ) -> Self {
        Self {
            id,
            topic_id,
            text: text.into(),
            solutions,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ProblemId {
        &self.id
    }

    #[must_use]
    pub fn topic_id(&self) -> &TopicId {
        &self.topic_id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Solutions in authored order. The first entry, if any, is the
    /// canonical answer; the rest are decoys for multiple choice.
    #[must_use]
    pub fn solutions(&self) -> &[String] {
        &self.solutions
    }

    /// The answer a submission is checked against.
    #[must_use]
    pub fn canonical_answer(&self) -> Option<&str> {
        self.solutions.first().map(String::as_str)
    }

    /// Exact-match check against the canonical answer. A problem with no
    /// solutions accepts nothing.
    #[must_use]
    pub fn check_answer(&self, answer: &str) -> bool {
        self.canonical_answer() == Some(answer)
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into().trim().to_owned();
    }

    /// Replaces the solution list wholesale, as the edit form does.
    ///
    /// Entries are stored exactly as given so answers match what the
    /// author typed.
    ///
    /// # Errors
    ///
    /// Returns `ProblemError` if an entry is blank or embeds the list
    /// delimiter.
    pub fn set_solutions(&mut self, solutions: Vec<String>) -> Result<(), ProblemError> {
        for entry in &solutions {
            if entry.trim().is_empty() {
                return Err(ProblemError::EmptySolution);
            }
            if entry.contains(LIST_DELIMITER) {
                return Err(ProblemError::SolutionContainsDelimiter);
            }
        }
        self.solutions = solutions;
        Ok(())
    }

    /// Reassigns the problem to another topic.
    pub fn move_to(&mut self, topic_id: TopicId) {
        self.topic_id = topic_id;
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
