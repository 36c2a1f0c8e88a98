//! Bounded set of watched client connections.
//!
//! The listening endpoint is implicitly part of every watch set; only
//! accepted clients are stored. Identifiers come from a slab, so they are
//! small, reused after removal, and double as mio tokens.

use slab::Slab;

/// Registry of client connections awaiting their one-shot exchange.
///
/// Provides O(1) insert, lookup, and remove operations.
pub struct WatchSet<C> {
    clients: Slab<C>,
    capacity: usize,
}

impl<C> WatchSet<C> {
    /// Create a new watch set holding at most `capacity` clients.
    pub fn new(capacity: usize) -> Self {
        Self {
            clients: Slab::with_capacity(capacity),
            capacity,
        }
    }

    /// Start watching a client.
    ///
    /// Returns `None`, leaving the set unchanged, if it is at capacity.
    pub fn insert(&mut self, client: C) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        Some(self.clients.insert(client))
    }

    /// Identifier the next `insert` will return, if there is room.
    pub fn next_id(&self) -> Option<usize> {
        (!self.is_full()).then(|| self.clients.vacant_key())
    }

    /// Stop watching a client and hand it back.
    pub fn remove(&mut self, id: usize) -> Option<C> {
        self.clients.try_remove(id)
    }

    pub fn get(&self, id: usize) -> Option<&C> {
        self.clients.get(id)
    }

    pub fn contains(&self, id: usize) -> bool {
        self.clients.contains(id)
    }

    /// Number of watched clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Number of watched endpoints, counting the listener.
    pub fn watched(&self) -> usize {
        self.clients.len() + 1
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.capacity
    }

    /// Maximum number of clients allowed.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate over watched clients in ascending identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &C)> {
        self.clients.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_enforced() {
        let mut watch = WatchSet::new(2);

        let a = watch.insert(10).unwrap();
        let b = watch.insert(11).unwrap();

        // At capacity
        assert!(watch.is_full());
        assert!(watch.next_id().is_none());
        assert!(watch.insert(12).is_none());
        assert_eq!(watch.len(), 2);
        assert_eq!(watch.get(a), Some(&10));
        assert_eq!(watch.get(b), Some(&11));
    }

    #[test]
    fn test_listener_always_counted() {
        let mut watch: WatchSet<i32> = WatchSet::new(4);
        assert!(watch.is_empty());
        assert_eq!(watch.watched(), 1);

        let a = watch.insert(7).unwrap();
        let b = watch.insert(8).unwrap();
        assert_eq!(watch.watched(), 3);

        watch.remove(a);
        watch.remove(b);
        assert_eq!(watch.watched(), 1);
    }

    #[test]
    fn test_service_restores_prior_state() {
        let mut watch = WatchSet::new(4);
        let existing = watch.insert("existing").unwrap();
        let before: Vec<_> = watch.iter().map(|(id, c)| (id, *c)).collect();

        let id = watch.insert("transient").unwrap();
        assert!(watch.contains(id));
        assert_eq!(watch.remove(id), Some("transient"));

        let after: Vec<_> = watch.iter().map(|(id, c)| (id, *c)).collect();
        assert_eq!(before, after);
        assert!(watch.contains(existing));
        assert!(!watch.contains(id));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut watch: WatchSet<u8> = WatchSet::new(1);
        assert!(watch.remove(3).is_none());
        assert_eq!(watch.len(), 0);
    }

    #[test]
    fn test_ids_reused_and_ordered() {
        let mut watch = WatchSet::new(8);
        let a = watch.insert('a').unwrap();
        let b = watch.insert('b').unwrap();
        let c = watch.insert('c').unwrap();

        watch.remove(b);
        assert_eq!(watch.next_id(), Some(b));
        let d = watch.insert('d').unwrap();
        assert_eq!(d, b); // Slab reuses slots

        let ids: Vec<usize> = watch.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, d, c]);
        assert_eq!(watch.get(a), Some(&'a'));
        assert_eq!(watch.capacity(), 8);
    }
}
