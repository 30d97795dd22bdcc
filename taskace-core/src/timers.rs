//! Keyed one-shot timers over virtual time.
//!
//! Nothing runs on its own: the owner polls [`TimerService::pop_due`] with the
//! current clock reading and applies whatever effect each key stands for.
//! A timer is due when `fire_at <= now`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    fire_at: DateTime<Utc>,
    /// Arming order, breaks ties between timers due at the same instant.
    seq: u64,
}

#[derive(Debug, Clone)]
pub struct TimerService<K> {
    pending: HashMap<K, Pending>,
    next_seq: u64,
}

impl<K> Default for TimerService<K> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<K: Eq + Hash + Clone> TimerService<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key`. Re-arming an armed key replaces its deadline.
    pub fn schedule_at(&mut self, key: K, fire_at: DateTime<Utc>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(key, Pending { fire_at, seq });
    }

    /// Disarm `key`. Returns whether it was armed.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.pending.remove(key).is_some()
    }

    pub fn deadline(&self, key: &K) -> Option<DateTime<Utc>> {
        self.pending.get(key).map(|p| p.fire_at)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.pending.values().map(|p| p.fire_at).min()
    }

    /// Remove and return every timer due at `now`, earliest first.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<(K, DateTime<Utc>)> {
        let mut due: Vec<(K, Pending)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.fire_at <= now)
            .map(|(k, p)| (k.clone(), *p))
            .collect();
        due.sort_by_key(|(_, p)| (p.fire_at, p.seq));

        for (key, _) in &due {
            self.pending.remove(key);
        }
        due.into_iter().map(|(k, p)| (k, p.fire_at)).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
