//! Topics and their prerequisite lists.

use thiserror::Error;

use crate::model::ids::TopicId;
use crate::prereq::{PrereqError, PrereqList};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopicError {
    #[error("a topic cannot require itself")]
    SelfPrerequisite,

    #[error(transparent)]
    Prereq(#[from] PrereqError),
}

/// A unit of study. Topics start out blank and are filled in by editors;
/// an empty title is therefore a legal persisted state.
#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    id: TopicId,
    title: String,
    description: String,
    prerequisites: PrereqList,
}

impl Topic {
    /// Creates a blank topic, the state produced by the "new topic"
    /// editor action.
    #[must_use]
    pub fn new(id: TopicId) -> Self {
        Self {
            id,
            title: String::new(),
            description: String::new(),
            prerequisites: PrereqList::new(),
        }
    }

    /// Rebuilds a topic from stored fields.
    #[must_use]
    pub fn from_parts(
        id: TopicId,
        title: impl Into<String>,
        description: impl Into<String>,
        prerequisites: PrereqList,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            prerequisites,
        }
    }

    #[must_use]
    pub fn id(&self) -> &TopicId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn prerequisites(&self) -> &PrereqList {
        &self.prerequisites
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into().trim().to_owned();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into().trim().to_owned();
    }

    /// Adds a prerequisite; returns `false` if it was already listed.
    ///
    /// # Errors
    ///
    /// Returns `TopicError::SelfPrerequisite` when the topic is asked to
    /// require itself, or a `PrereqError` for ids the codec rejects.
    pub fn add_prerequisite(&mut self, prerequisite: TopicId) -> Result<bool, TopicError> {
        if prerequisite == self.id {
            return Err(TopicError::SelfPrerequisite);
        }
        Ok(self.prerequisites.insert(prerequisite)?)
    }

    /// Removes a prerequisite; returns `true` if it was listed.
    pub fn remove_prerequisite(&mut self, prerequisite: &TopicId) -> bool {
        self.prerequisites.remove(prerequisite)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
