use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::models::LeaderboardEntry;
use crate::store::{KeyValueStore, keys, read_json, read_json_or_none, write_json};

/// Entries kept in storage; older entries are dropped first
pub const LEADERBOARD_CAPACITY: usize = 50;

/// Entries shown on the leaderboard tab
pub const DISPLAY_LIMIT: usize = 10;

/// Drop the oldest entries until at most `capacity` remain
pub fn retain_most_recent(entries: &mut Vec<LeaderboardEntry>, capacity: usize) {
    if entries.len() > capacity {
        let excess = entries.len() - capacity;
        entries.drain(..excess);
    }
}

/// Highest percentage first; equal percentages keep insertion order
pub fn rank_for_display(entries: &[LeaderboardEntry], limit: usize) -> Vec<LeaderboardEntry> {
    let mut ranked = entries.to_vec();
    ranked.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    ranked.truncate(limit);
    ranked
}

/// Append-only leaderboard with bounded retention
#[derive(Clone)]
pub struct Leaderboard {
    store: Arc<dyn KeyValueStore>,
    capacity: usize,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_capacity(store, LEADERBOARD_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        Self { store, capacity }
    }

    /// Stored entries, oldest first; unreadable storage reads as empty
    pub async fn entries(&self) -> Vec<LeaderboardEntry> {
        read_json_or_none(self.store.as_ref(), keys::LEADERBOARD)
            .await
            .unwrap_or_default()
    }

    /// Add an entry. A failing store read aborts rather than overwriting stored entries.
    pub async fn append(&self, entry: LeaderboardEntry) -> Result<()> {
        let mut entries: Vec<LeaderboardEntry> = read_json(self.store.as_ref(), keys::LEADERBOARD)
            .await?
            .unwrap_or_default();
        entries.push(entry);
        retain_most_recent(&mut entries, self.capacity);
        write_json(self.store.as_ref(), keys::LEADERBOARD, &entries).await?;

        debug!(stored_entries = entries.len(), "Leaderboard entry appended");
        Ok(())
    }

    pub async fn top(&self, limit: usize) -> Vec<LeaderboardEntry> {
        rank_for_display(&self.entries().await, limit)
    }
}
