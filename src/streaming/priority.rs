//! Distance-ordered work queues for chunk builds
//!
//! A [`DirtyQueue`] is a set of chunk keys that hands out the key nearest to a
//! focus chunk first. Enqueueing is idempotent. Moving the focus re-sorts
//! lazily on the next dequeue.

use crate::streaming::chunk::ChunkKey;
use std::cmp::Reverse;
use std::collections::HashSet;

/// Ordered set of chunk keys, nearest to the focus first
#[derive(Debug, Default)]
pub struct DirtyQueue {
    /// Sorted farthest-first when `sorted`, so the nearest pops off the end
    items: Vec<ChunkKey>,
    members: HashSet<ChunkKey>,
    focus: Option<ChunkKey>,
    sorted: bool,
}

impl DirtyQueue {
    pub fn new() -> Self {
        Self {
            sorted: true,
            ..Default::default()
        }
    }

    /// Sort key: nearer and then lower keys compare greater
    fn rank(&self, key: &ChunkKey) -> Reverse<(i64, ChunkKey)> {
        let distance = self.focus.map_or(0, |focus| key.dist_sq(&focus));
        Reverse((distance, *key))
    }

    /// Add a key. Returns false if it was already queued.
    pub fn enqueue(&mut self, key: ChunkKey) -> bool {
        if !self.members.insert(key) {
            return false;
        }
        if self.sorted {
            let rank = self.rank(&key);
            let at = self.items.partition_point(|k| self.rank(k) < rank);
            self.items.insert(at, key);
        } else {
            self.items.push(key);
        }
        true
    }

    /// Remove and return the key nearest to the focus. Ties go to the lower key.
    pub fn dequeue_nearest(&mut self) -> Option<ChunkKey> {
        if !self.sorted {
            let mut items = std::mem::take(&mut self.items);
            items.sort_by_cached_key(|k| self.rank(k));
            self.items = items;
            self.sorted = true;
        }
        let key = self.items.pop()?;
        self.members.remove(&key);
        Some(key)
    }

    /// Measure distances from a new focus
    pub fn set_focus(&mut self, focus: ChunkKey) {
        if self.focus != Some(focus) {
            self.focus = Some(focus);
            self.sorted = self.items.len() <= 1;
        }
    }

    pub fn focus(&self) -> Option<ChunkKey> {
        self.focus
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.members.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.members.clear();
        self.sorted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::IVec3;

    fn key(x: i32, y: i32, z: i32) -> ChunkKey {
        ChunkKey::containing(IVec3::new(x, y, z) * 14)
    }

    fn drain(queue: &mut DirtyQueue) -> Vec<ChunkKey> {
        std::iter::from_fn(|| queue.dequeue_nearest()).collect()
    }

    #[test]
    fn test_queue_basic() {
        let mut queue = DirtyQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert!(queue.dequeue_nearest().is_none());

        assert!(queue.enqueue(key(1, 0, 0)));
        assert!(queue.contains(key(1, 0, 0)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let mut queue = DirtyQueue::new();
        assert!(queue.enqueue(key(1, 2, 3)));
        assert!(!queue.enqueue(key(1, 2, 3)));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.dequeue_nearest(), Some(key(1, 2, 3)));
        assert!(!queue.contains(key(1, 2, 3)));
        assert!(queue.enqueue(key(1, 2, 3)));
    }

    #[test]
    fn test_dequeues_nearest_first() {
        let mut queue = DirtyQueue::new();
        queue.set_focus(key(0, 0, 0));
        for k in [key(5, 0, 0), key(1, 0, 0), key(0, 3, 0), key(0, 0, 0), key(2, 2, 2)] {
            queue.enqueue(k);
        }

        let order = drain(&mut queue);
        assert_eq!(order, vec![key(0, 0, 0), key(1, 0, 0), key(0, 3, 0), key(2, 2, 2), key(5, 0, 0)]);
    }

    #[test]
    fn test_distances_non_decreasing() {
        let mut queue = DirtyQueue::new();
        let focus = key(2, 1, -1);
        queue.set_focus(focus);
        for x in -3..4 {
            for y in -2..3 {
                for z in -3..2 {
                    queue.enqueue(key(x, y, z));
                }
            }
        }

        let distances: Vec<i64> = drain(&mut queue).iter().map(|k| k.dist_sq(&focus)).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_ties_break_by_key() {
        let mut queue = DirtyQueue::new();
        queue.set_focus(key(0, 0, 0));
        queue.enqueue(key(0, 0, 1));
        queue.enqueue(key(1, 0, 0));
        queue.enqueue(key(0, 1, 0));

        assert_eq!(drain(&mut queue), vec![key(0, 0, 1), key(0, 1, 0), key(1, 0, 0)]);
    }

    #[test]
    fn test_refocus_resorts() {
        let mut queue = DirtyQueue::new();
        queue.set_focus(key(0, 0, 0));
        queue.enqueue(key(0, 0, 0));
        queue.enqueue(key(10, 0, 0));

        queue.set_focus(key(10, 0, 0));
        assert_eq!(queue.dequeue_nearest(), Some(key(10, 0, 0)));

        // Enqueue after a refocus still lands in order
        queue.enqueue(key(9, 0, 0));
        assert_eq!(queue.dequeue_nearest(), Some(key(9, 0, 0)));
        assert_eq!(queue.dequeue_nearest(), Some(key(0, 0, 0)));
    }

    #[test]
    fn test_queue_clear() {
        let mut queue = DirtyQueue::new();
        queue.enqueue(key(1, 0, 0));
        queue.enqueue(key(2, 0, 0));
        queue.clear();

        assert!(queue.is_empty());
        assert!(!queue.contains(key(1, 0, 0)));
        assert!(queue.enqueue(key(1, 0, 0)));
    }
}
