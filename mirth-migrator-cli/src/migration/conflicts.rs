//! Queue of migration conflicts reported by the server

use std::collections::VecDeque;

use uuid::Uuid;

use crate::api::models::ConflictDescriptor;

/// Whether a conflict id denotes the Mirth version conflict between the two systems
///
/// Only the hyphenated nil UUID counts, other spellings of it are ordinary ids.
pub fn is_version_conflict(id: &str) -> bool {
    id == Uuid::nil().hyphenated().to_string()
}

/// FIFO of conflicts; only the head is ever presented
///
/// A version conflict is moved to the head on construction, the relative
/// order of the other conflicts is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictQueue {
    items: VecDeque<ConflictDescriptor>,
}

impl ConflictQueue {
    pub fn new(conflicts: Vec<ConflictDescriptor>) -> Self {
        let (versions, rest): (Vec<_>, Vec<_>) = conflicts
            .into_iter()
            .partition(|conflict| is_version_conflict(&conflict.id));
        let mut items: VecDeque<_> = versions.into();
        items.extend(rest);
        Self { items }
    }

    pub fn head(&self) -> Option<&ConflictDescriptor> {
        self.items.front()
    }

    pub fn pop_head(&mut self) -> Option<ConflictDescriptor> {
        self.items.pop_front()
    }

    /// Remove and return every queued conflict
    pub fn drain(&mut self) -> Vec<ConflictDescriptor> {
        self.items.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::types::ComponentType;
    use serde_json::Map;

    const SENTINEL: &str = "00000000-0000-0000-0000-000000000000";

    fn conflict(id: &str) -> ConflictDescriptor {
        ConflictDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            component_type: ComponentType::Channel,
            extra: Map::new(),
        }
    }

    fn ids(queue: &ConflictQueue) -> Vec<String> {
        queue.items.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_version_conflict_moves_to_head() {
        let queue = ConflictQueue::new(vec![conflict("a"), conflict("b"), conflict(SENTINEL), conflict("c")]);
        assert_eq!(ids(&queue), vec![SENTINEL, "a", "b", "c"]);
        assert!(is_version_conflict(&queue.head().unwrap().id));
    }

    #[test]
    fn test_order_kept_without_version_conflict() {
        let queue = ConflictQueue::new(vec![conflict("b"), conflict("a")]);
        assert_eq!(ids(&queue), vec!["b", "a"]);
    }

    #[test]
    fn test_pop_and_drain() {
        let mut queue = ConflictQueue::new(vec![conflict("a"), conflict("b"), conflict("c")]);
        assert_eq!(queue.pop_head().map(|c| c.id), Some("a".to_string()));
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());
        assert!(queue.pop_head().is_none());
    }

    #[test]
    fn test_sentinel_detection() {
        assert!(is_version_conflict(SENTINEL));
        assert!(!is_version_conflict("00000000-0000-0000-0000-000000000001"));
        assert!(!is_version_conflict("not-a-uuid"));
    }

    #[test]
    fn test_only_hyphenated_nil_is_version_conflict() {
        assert!(!is_version_conflict("00000000000000000000000000000000"));
        assert!(!is_version_conflict("{00000000-0000-0000-0000-000000000000}"));
        assert!(!is_version_conflict("urn:uuid:00000000-0000-0000-0000-000000000000"));

        let queue = ConflictQueue::new(vec![conflict("a"), conflict("00000000000000000000000000000000")]);
        assert_eq!(ids(&queue), vec!["a", "00000000000000000000000000000000"]);
    }
}
