//! Process-local [`SharedStateStore`].
//!
//! Expiry uses `tokio::time::Instant`, so tests running with a paused clock
//! can advance through windows and block periods without sleeping.

use super::{SharedStateStore, StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

const CLEANUP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
        }
        Ok(())
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<String, Entry>, Instant) -> R) -> R {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if entries.len() > CLEANUP_THRESHOLD {
            entries.retain(|_, e| e.is_live(now));
        }
        f(&mut *entries, now)
    }
}

fn purge_expired(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) {
    if entries.get(key).is_some_and(|e| !e.is_live(now)) {
        entries.remove(key);
    }
}

fn live<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut Entry> {
    purge_expired(entries, key, now);
    entries.get_mut(key)
}

#[async_trait]
impl SharedStateStore for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_available()?;
        Ok(self.with_entries(|entries, now| live(entries, key, now).map(|e| e.value.clone())))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        self.check_available()?;
        self.with_entries(|entries, now| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: Some(now + Duration::from_secs(ttl_secs)),
                },
            );
        });
        Ok(())
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.check_available()?;
        self.with_entries(|entries, now| {
            purge_expired(entries, key, now);
            let entry = entries
                .entry(key.to_string())
                .or_insert(Entry { value: "0".to_string(), expires_at: None });
            let current: i64 = entry
                .value
                .parse()
                .map_err(|_| StoreError::NotAnInteger { key: key.to_string() })?;
            let next = current + 1;
            entry.value = next.to_string();
            Ok(next)
        })
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.with_entries(|entries, now| match live(entries, key, now) {
            Some(entry) => {
                entry.expires_at = Some(now + Duration::from_secs(ttl_secs));
                true
            },
            None => false,
        }))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.with_entries(|entries, now| live(entries, key, now).is_some()))
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<u64>> {
        self.check_available()?;
        Ok(self.with_entries(|entries, now| {
            live(entries, key, now).and_then(|e| e.expires_at).map(|at| {
                let remaining = at.saturating_duration_since(now);
                let secs = remaining.as_secs();
                if remaining.subsec_nanos() > 0 {
                    secs + 1
                } else {
                    secs
                }
            })
        }))
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.with_entries(|entries, now| {
            entries.remove(key).is_some_and(|e| e.is_live(now))
        }))
    }
}
