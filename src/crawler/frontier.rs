//! Frontier manager: FIFO queue of discovered URLs plus the visited set
//!
//! Both sets are keyed by the normalized URL. An entry is rejected at insert
//! time if its key was already visited or is already queued, and marking a
//! key visited drops any queued copy, so the queue never holds a visited URL.
//!
//! One frontier belongs to one run; it is not shared between tasks.

use crate::url::{normalize, without_fragment};
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A queued URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Normalized form used for dedup
    pub key: String,
    /// URL to fetch (original casing, fragment removed)
    pub url: String,
}

impl FrontierEntry {
    fn new(url: &str) -> Self {
        let url = match Url::parse(url.trim()) {
            Ok(parsed) => without_fragment(&parsed).to_string(),
            Err(_) => url.trim().to_string(),
        };
        Self {
            key: normalize(&url),
            url,
        }
    }
}

#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `url` unless it was already visited or queued
    ///
    /// Returns true if the URL was added.
    pub fn offer(&mut self, url: &str) -> bool {
        let entry = FrontierEntry::new(url);
        if self.visited.contains(&entry.key) || self.queued.contains(&entry.key) {
            return false;
        }
        self.queued.insert(entry.key.clone());
        self.queue.push_back(entry);
        true
    }

    /// Pops the oldest queued entry
    pub fn next(&mut self) -> Option<FrontierEntry> {
        let entry = self.queue.pop_front()?;
        self.queued.remove(&entry.key);
        Some(entry)
    }

    /// Records `url` as visited
    ///
    /// Returns true if it had not been visited before.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        let key = normalize(url);
        if self.queued.remove(&key) {
            self.queue.retain(|entry| entry.key != key);
        }
        self.visited.insert(key)
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(&normalize(url))
    }

    /// Number of queued, unvisited entries
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
