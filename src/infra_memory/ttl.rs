use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Writes between two sweeps of expired entries.
const SWEEP_EVERY: usize = 64;

#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Expiring {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// A `DashMap` whose entries vanish once their TTL has passed. Reads hide
/// expired entries; writes periodically drop them.
pub(crate) struct TtlMap<K: Eq + Hash, V> {
    inner: DashMap<K, Expiring<V>>,
    writes: AtomicUsize,
}

impl<K: Eq + Hash, V: Clone> TtlMap<K, V> {
    pub fn new() -> Self {
        TtlMap {
            inner: DashMap::new(),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, key: K, value: V, ttl: Duration) {
        self.inner.insert(key, Expiring::new(value, ttl));
        self.note_write();
    }

    /// Must not be called while a shard guard is held.
    fn note_write(&self) {
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }
    }

    fn sweep(&self) {
        self.inner.retain(|_, e| e.is_live());
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let live = self.inner.get(key).map(|e| e.is_live().then(|| e.value.clone()));
        match live {
            Some(Some(value)) => Some(value),
            Some(None) => {
                self.inner.remove_if(key, |_, e| !e.is_live());
                None
            }
            None => None,
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&self, key: &K) {
        self.inner.remove(key);
    }

    /// Edits the live value in place, keeping its expiry. The entry is
    /// dropped when `f` returns false.
    pub fn modify(&self, key: &K, f: impl FnOnce(&mut V) -> bool) {
        let keep = match self.inner.get_mut(key) {
            Some(mut e) if e.is_live() => f(&mut e.value),
            Some(_) => false,
            None => return,
        };
        if !keep {
            self.inner.remove(key);
        }
    }

    /// Runs `f` on the live value (or `None`) and stores what it returns with
    /// a fresh TTL; `None` removes the entry.
    pub fn update(&self, key: K, ttl: Duration, f: impl FnOnce(Option<V>) -> Option<V>) {
        match self.inner.entry(key) {
            Entry::Occupied(mut o) => {
                let current = o.get().is_live().then(|| o.get().value.clone());
                match f(current) {
                    Some(value) => {
                        o.insert(Expiring::new(value, ttl));
                    }
                    None => {
                        o.remove();
                    }
                }
            }
            Entry::Vacant(v) => {
                if let Some(value) = f(None) {
                    v.insert(Expiring::new(value, ttl));
                }
            }
        }
        self.note_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_are_invisible() {
        let map: TtlMap<&str, u8> = TtlMap::new();
        map.set("live", 1, Duration::from_secs(60));
        map.set("dead", 2, Duration::ZERO);
        assert_eq!(map.get(&"live"), Some(1));
        assert_eq!(map.get(&"dead"), None);
        assert!(!map.contains(&"dead"));
    }

    #[test]
    fn writes_sweep_expired_entries() {
        let map: TtlMap<usize, ()> = TtlMap::new();
        for key in 0..SWEEP_EVERY - 1 {
            map.set(key, (), Duration::ZERO);
        }
        assert_eq!(map.inner.len(), SWEEP_EVERY - 1);

        map.set(usize::MAX, (), Duration::from_secs(60));
        assert_eq!(map.inner.len(), 1);
        assert!(map.contains(&usize::MAX));

        for key in 0..SWEEP_EVERY {
            map.update(key, Duration::ZERO, |_| Some(()));
        }
        assert_eq!(map.inner.len(), 1);
    }

    #[test]
    fn update_can_insert_modify_and_remove() {
        let map: TtlMap<&str, Vec<u8>> = TtlMap::new();
        map.update("k", Duration::from_secs(60), |v| {
            let mut v = v.unwrap_or_default();
            v.push(1);
            Some(v)
        });
        map.update("k", Duration::from_secs(60), |v| {
            let mut v = v.unwrap_or_default();
            v.push(2);
            Some(v)
        });
        assert_eq!(map.get(&"k"), Some(vec![1, 2]));
        map.modify(&"k", |v| {
            v.retain(|x| *x != 1);
            true
        });
        assert_eq!(map.get(&"k"), Some(vec![2]));
        map.update("k", Duration::from_secs(60), |_| None);
        assert_eq!(map.get(&"k"), None);
    }
}
