// ── Deferred notification queue ──
//
// Property notifications are not delivered while a reply or signal is
// being parsed. They are queued under a key and flushed on the next loop
// iteration. Scheduling a key that is already queued overwrites its value
// in place, so a burst of updates to the same property produces a single
// delivery carrying the last value.

use std::hash::Hash;

use indexmap::IndexMap;

#[derive(Debug)]
pub(crate) struct DeferredQueue<K, V> {
    queue: IndexMap<K, V>,
}

impl<K: Hash + Eq, V> Default for DeferredQueue<K, V> {
    fn default() -> Self {
        Self {
            queue: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq, V> DeferredQueue<K, V> {
    /// Queue `value` under `key`. Returns `true` when an earlier value
    /// for the same key was replaced.
    pub(crate) fn schedule(&mut self, key: K, value: V) -> bool {
        self.queue.insert(key, value).is_some()
    }

    /// Drop every queued task whose key matches.
    pub(crate) fn cancel_where<F>(&mut self, mut matches: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let before = self.queue.len();
        self.queue.retain(|k, _| !matches(k));
        before - self.queue.len()
    }

    /// Take everything queued, in first-scheduled order.
    pub(crate) fn drain(&mut self) -> Vec<(K, V)> {
        std::mem::take(&mut self.queue).into_iter().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, key: &K) -> bool {
        self.queue.contains_key(key)
    }
}
