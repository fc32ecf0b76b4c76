//! Request queues
//!
//! Four insertion-ordered, duplicate-free queues, one per band. A newer
//! request supersedes a stale opposite one:
//!
//! - awaken removes from destroy
//! - enable removes from disable
//! - disable removes from enable
//! - destroy removes from awaken, enable and disable

use indexmap::IndexSet;

use super::phase::Band;

/// Identity key of a managed entity.
///
/// Derived from the entity's allocation address. The engine holds a `Weak`
/// to every keyed entity, which keeps the allocation (and so the key)
/// reserved until the entity is unmanaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(pub(crate) usize);

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

/// The four band queues.
#[derive(Debug, Default)]
pub struct RequestQueues {
    awaken: IndexSet<EntityKey>,
    enable: IndexSet<EntityKey>,
    disable: IndexSet<EntityKey>,
    destroy: IndexSet<EntityKey>,
}

impl RequestQueues {
    /// Creates empty queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `key` for `band`, cancelling superseded requests first.
    ///
    /// Returns `true` if the key was newly appended.
    pub fn push(&mut self, band: Band, key: EntityKey) -> bool {
        match band {
            Band::Awake => {
                self.destroy.shift_remove(&key);
            }
            Band::Enable => {
                self.disable.shift_remove(&key);
            }
            Band::Disable => {
                self.enable.shift_remove(&key);
            }
            Band::Destroy => {
                self.awaken.shift_remove(&key);
                self.enable.shift_remove(&key);
                self.disable.shift_remove(&key);
            }
        }
        self.queue_mut(band).insert(key)
    }

    /// Takes the whole queue for `band`, leaving it empty.
    ///
    /// Requests made after this call accumulate for the next drain.
    pub fn take(&mut self, band: Band) -> Vec<EntityKey> {
        std::mem::take(self.queue_mut(band)).into_iter().collect()
    }

    /// Removes `key` from every queue.
    pub fn remove(&mut self, key: EntityKey) {
        for band in Band::ORDER {
            self.queue_mut(band).shift_remove(&key);
        }
    }

    /// Returns `true` if `key` is waiting in `band`'s queue.
    #[must_use]
    pub fn contains(&self, band: Band, key: EntityKey) -> bool {
        self.queue(band).contains(&key)
    }

    /// Number of keys waiting in `band`'s queue.
    #[must_use]
    pub fn len(&self, band: Band) -> usize {
        self.queue(band).len()
    }

    /// Returns `true` if every queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Band::ORDER.iter().all(|band| self.queue(*band).is_empty())
    }

    const fn queue(&self, band: Band) -> &IndexSet<EntityKey> {
        match band {
            Band::Awake => &self.awaken,
            Band::Enable => &self.enable,
            Band::Disable => &self.disable,
            Band::Destroy => &self.destroy,
        }
    }

    const fn queue_mut(&mut self, band: Band) -> &mut IndexSet<EntityKey> {
        match band {
            Band::Awake => &mut self.awaken,
            Band::Enable => &mut self.enable,
            Band::Disable => &mut self.disable,
            Band::Destroy => &mut self.destroy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: EntityKey = EntityKey(1);
    const B: EntityKey = EntityKey(2);

    #[test]
    fn test_push_is_idempotent() {
        let mut queues = RequestQueues::new();
        assert!(queues.push(Band::Awake, A));
        assert!(!queues.push(Band::Awake, A));
        assert_eq!(queues.len(Band::Awake), 1);
    }

    #[test]
    fn test_take_preserves_insertion_order() {
        let mut queues = RequestQueues::new();
        queues.push(Band::Enable, B);
        queues.push(Band::Enable, A);
        queues.push(Band::Enable, B);
        assert_eq!(queues.take(Band::Enable), vec![B, A]);
        assert_eq!(queues.len(Band::Enable), 0);
    }

    #[test]
    fn test_destroy_supersedes_everything() {
        let mut queues = RequestQueues::new();
        queues.push(Band::Awake, A);
        queues.push(Band::Enable, A);
        queues.push(Band::Destroy, A);
        assert!(!queues.contains(Band::Awake, A));
        assert!(!queues.contains(Band::Enable, A));
        assert!(queues.contains(Band::Destroy, A));
    }

    #[test]
    fn test_awaken_revives_from_destroy() {
        let mut queues = RequestQueues::new();
        queues.push(Band::Destroy, A);
        queues.push(Band::Awake, A);
        assert!(!queues.contains(Band::Destroy, A));
        assert!(queues.contains(Band::Awake, A));
    }

    #[test]
    fn test_enable_and_disable_cancel_each_other() {
        let mut queues = RequestQueues::new();
        queues.push(Band::Enable, A);
        queues.push(Band::Disable, A);
        assert!(!queues.contains(Band::Enable, A));
        queues.push(Band::Enable, A);
        assert!(!queues.contains(Band::Disable, A));
        assert!(queues.contains(Band::Enable, A));
    }

    #[test]
    fn test_cancellation_only_touches_the_same_key() {
        let mut queues = RequestQueues::new();
        queues.push(Band::Enable, A);
        queues.push(Band::Enable, B);
        queues.push(Band::Disable, A);
        assert_eq!(queues.take(Band::Enable), vec![B]);
    }

    #[test]
    fn test_remove_clears_all_queues() {
        let mut queues = RequestQueues::new();
        queues.push(Band::Awake, A);
        queues.push(Band::Enable, A);
        queues.push(Band::Destroy, B);
        queues.remove(A);
        assert!(!queues.contains(Band::Awake, A));
        assert!(!queues.contains(Band::Enable, A));
        assert!(queues.contains(Band::Destroy, B));
        queues.remove(B);
        assert!(queues.is_empty());
    }
}
