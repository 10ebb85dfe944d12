//! Prerequisite graph checks.
//!
//! Prerequisites form a directed graph over topics. Edits that would
//! close a cycle are rejected up front so progress evaluation never has
//! to defend against one.

use std::collections::{HashMap, HashSet};

use crate::model::TopicId;
use crate::prereq::PrereqList;

/// Returns `true` if adding `prerequisite` to `topic` would create a
/// cycle, i.e. `topic` is already reachable by following prerequisite
/// links starting from `prerequisite`.
///
/// Ids missing from `prerequisites_of` are treated as leaves.
#[must_use]
pub fn would_create_cycle(
    topic: &TopicId,
    prerequisite: &TopicId,
    prerequisites_of: &HashMap<TopicId, PrereqList>,
) -> bool {
    if topic == prerequisite {
        return true;
    }

    let mut visited: HashSet<&TopicId> = HashSet::new();
    let mut stack: Vec<&TopicId> = vec![prerequisite];

    while let Some(current) = stack.pop() {
        if current == topic {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(prereqs) = prerequisites_of.get(current) {
            stack.extend(prereqs.iter());
        }
    }

    false
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
