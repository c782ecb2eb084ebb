//! Bounded in-memory plan cache with per-entry TTL.
//!
//! Keys are normalized goal fingerprints. Capacity pressure evicts the
//! earliest-inserted surviving key (FIFO by insertion), while `get` refreshes
//! a separate recency ordering. The asymmetry is deliberate and must stay:
//! recency reordering is read-freshness bookkeeping only and never influences
//! which entry eviction removes. Do not "fix" this into strict LRU.

use crate::config::{CACHE_CAPACITY, CACHE_TTL};
use crate::plan::GenerationResult;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Normalized cache key for a goal: lower-cased, trimmed, internal
/// whitespace runs collapsed to a single space.
pub fn fingerprint(goal: &str) -> String {
    goal.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

struct CacheEntry {
    data: GenerationResult,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

/// Cache access statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub capacity: usize,
    /// `hits / (hits + misses)` as a two-decimal percentage, `0%` before any
    /// access.
    pub hit_rate: String,
}

/// Bounded fingerprint-to-plan store.
pub struct PlanCache {
    entries: HashMap<String, CacheEntry>,
    /// FIFO eviction order; keys keep their slot for their whole lifetime.
    insertion_order: VecDeque<String>,
    /// Read-freshness bookkeeping; most-recently-read key sits at the back.
    recency: Vec<String>,
    capacity: usize,
    default_ttl: Duration,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::with_capacity(CACHE_CAPACITY, CACHE_TTL)
    }

    pub fn with_capacity(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            recency: Vec::new(),
            capacity,
            default_ttl,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Look up a goal. A hit refreshes the recency ordering and counts as a
    /// hit; a miss (absent or expired) counts as a miss. Expired entries are
    /// removed on sight so a stale plan is never returned.
    pub fn get(&mut self, goal: &str) -> Option<GenerationResult> {
        self.get_at(goal, Instant::now())
    }

    fn get_at(&mut self, goal: &str, now: Instant) -> Option<GenerationResult> {
        let key = fingerprint(goal);

        let expired = match self.entries.get(&key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.misses += 1;
                return None;
            }
        };
        if expired {
            self.remove_key(&key);
            self.misses += 1;
            return None;
        }

        self.touch(&key);
        self.hits += 1;
        self.entries.get(&key).map(|entry| entry.data.clone())
    }

    /// Whether a fresh entry exists for the goal. A TTL-expired entry is
    /// evicted as a side effect of the check. Does not affect hit/miss
    /// counters.
    pub fn contains(&mut self, goal: &str) -> bool {
        self.contains_at(goal, Instant::now())
    }

    fn contains_at(&mut self, goal: &str, now: Instant) -> bool {
        let key = fingerprint(goal);
        match self.entries.get(&key) {
            Some(entry) if entry.is_expired(now) => {
                self.remove_key(&key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Store a plan under the goal's fingerprint. Inserting a new key at
    /// capacity first evicts the earliest-inserted surviving key. Re-inserting
    /// an existing key refreshes its value and timestamp but keeps its
    /// eviction slot.
    pub fn insert(&mut self, goal: &str, data: GenerationResult, ttl: Option<Duration>) {
        self.insert_at(goal, data, ttl, Instant::now());
    }

    fn insert_at(
        &mut self,
        goal: &str,
        data: GenerationResult,
        ttl: Option<Duration>,
        now: Instant,
    ) {
        let key = fingerprint(goal);

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self.insertion_order.front().cloned() {
                self.remove_key(&oldest);
                self.evictions += 1;
            }
        }

        let entry = CacheEntry {
            data,
            inserted_at: now,
            ttl: ttl.unwrap_or(self.default_ttl),
        };
        if self.entries.insert(key.clone(), entry).is_none() {
            self.insertion_order.push_back(key.clone());
            self.recency.push(key);
        }
    }

    /// Sweep all expired entries. Run periodically so memory stays bounded
    /// independent of access patterns.
    pub fn cleanup(&mut self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.remove_key(&key);
        }
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
        self.recency.clear();
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        let hit_rate = if total > 0 {
            format!("{:.2}%", self.hits as f64 / total as f64 * 100.0)
        } else {
            "0%".to_string()
        };

        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            size: self.entries.len(),
            capacity: self.capacity,
            hit_rate,
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            let key = self.recency.remove(pos);
            self.recency.push(key);
        }
    }

    fn remove_key(&mut self, key: &str) {
        self.entries.remove(key);
        self.insertion_order.retain(|k| k != key);
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new()
    }
}
