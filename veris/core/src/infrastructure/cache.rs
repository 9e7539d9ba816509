// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Prompt Cache
//!
//! Bounded TTL cache for built prompt contexts. Constructed by the caller and
//! passed into the coordinator explicitly — there is no process-wide
//! singleton, so tests and concurrent requests never share hidden state.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

const DEFAULT_CAPACITY: usize = 32;
const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

struct CachedEntry {
    value: String,
    inserted_at: Instant,
}

/// LRU cache whose entries expire after a fixed TTL.
pub struct PromptCache {
    entries: LruCache<u64, CachedEntry>,
    ttl: Duration,
}

impl Default for PromptCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl PromptCache {
    /// `capacity` is clamped to at least one entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Fetch a live entry, evicting it if the TTL has lapsed.
    pub fn get(&mut self, key: u64) -> Option<String> {
        let expired = match self.entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.pop(&key);
        }
        None
    }

    pub fn insert(&mut self, key: u64, value: String) {
        self.entries.put(
            key,
            CachedEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every entry.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
