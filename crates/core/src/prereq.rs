//! Codec for the delimiter-encoded prerequisite list.
//!
//! Prerequisites are persisted as a single string joined with
//! [`LIST_DELIMITER`]. Decoding drops empty tokens and collapses
//! duplicates; first-seen order is preserved for display, but equality is
//! set-like because the order carries no meaning for graph evaluation.

use thiserror::Error;

use crate::model::TopicId;

/// Delimiter used to persist list-valued fields as a single string.
pub const LIST_DELIMITER: &str = ";__;";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PrereqError {
    #[error("prerequisite id is empty")]
    EmptyId,

    #[error("prerequisite id contains the list delimiter")]
    ContainsDelimiter,
}

/// Validates an identifier before it may enter a prerequisite list.
///
/// # Errors
///
/// Returns `PrereqError::EmptyId` if the id is empty after trimming, or
/// `PrereqError::ContainsDelimiter` if it embeds [`LIST_DELIMITER`]
/// (which would corrupt the stored encoding).
pub fn validate_prereq_id(id: &TopicId) -> Result<(), PrereqError> {
    if id.as_str().trim().is_empty() {
        return Err(PrereqError::EmptyId);
    }
    if id.as_str().contains(LIST_DELIMITER) {
        return Err(PrereqError::ContainsDelimiter);
    }
    Ok(())
}

/// A deduplicated set of prerequisite topic ids.
///
/// Backed by a `Vec` so display order survives a round trip; `PartialEq`
/// compares as a set.
#[derive(Debug, Clone, Default, Eq)]
pub struct PrereqList {
    ids: Vec<TopicId>,
}

impl PrereqList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self { ids: Vec::new() }
    }

    /// Builds a list from ids, validating and deduplicating each.
    ///
    /// # Errors
    ///
    /// Returns `PrereqError` if any id fails [`validate_prereq_id`].
    pub fn from_ids(ids: impl IntoIterator<Item = TopicId>) -> Result<Self, PrereqError> {
        let mut list = Self::new();
        for id in ids {
            list.insert(id)?;
        }
        Ok(list)
    }

    /// Decodes a stored delimiter-joined string.
    ///
    /// Empty tokens are dropped and duplicates collapse to their first
    /// occurrence, so decoding never fails.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        let mut ids: Vec<TopicId> = Vec::new();
        for token in raw.split(LIST_DELIMITER) {
            if token.is_empty() {
                continue;
            }
            let id = TopicId::new(token);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Self { ids }
    }

    /// Encodes the list back into its stored form.
    #[must_use]
    pub fn encode(&self) -> String {
        let parts: Vec<&str> = self.ids.iter().map(TopicId::as_str).collect();
        parts.join(LIST_DELIMITER)
    }

    /// Adds an id, trimming surrounding whitespace first.
    ///
    /// Returns `false` if the id was already present.
    ///
    /// # Errors
    ///
    /// Returns `PrereqError` if the trimmed id is empty or contains the
    /// delimiter.
    pub fn insert(&mut self, id: TopicId) -> Result<bool, PrereqError> {
        let id = TopicId::new(id.as_str().trim());
        validate_prereq_id(&id)?;
        if self.ids.contains(&id) {
            return Ok(false);
        }
        self.ids.push(id);
        Ok(true)
    }

    /// Removes an id; returns `true` if it was present.
    pub fn remove(&mut self, id: &TopicId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id);
        self.ids.len() != before
    }

    #[must_use]
    pub fn contains(&self, id: &TopicId) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Ids in display (first-seen) order.
    #[must_use]
    pub fn ids(&self) -> &[TopicId] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicId> {
        self.ids.iter()
    }
}

impl PartialEq for PrereqList {
    fn eq(&self, other: &Self) -> bool {
        // Both sides are deduplicated, so equal length plus containment
        // is set equality.
        self.ids.len() == other.ids.len() && self.ids.iter().all(|id| other.contains(id))
    }
}

impl<'a> IntoIterator for &'a PrereqList {
    type Item = &'a TopicId;
    type IntoIter = std::slice::Iter<'a, TopicId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
