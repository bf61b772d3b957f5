//! Gift streak coalescing.
//!
//! The relay re-sends a combo gift with a growing running count while the
//! sender holds it down, then marks the last one with `repeatEnd`. This
//! tracker folds such a burst into one history entry per `(user, gift)`.
//!
//! History is bounded. The open index only ever points into history: an
//! entry evicted while still open is removed from the index as well, so a
//! later event for that key starts a fresh entry.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, trace};

use crate::message::GiftMessage;

/// Identity of a streak.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StreakKey {
    pub user_id: String,
    pub gift_id: i64,
}

impl StreakKey {
    pub fn new(user_id: impl Into<String>, gift_id: i64) -> Self {
        Self {
            user_id: user_id.into(),
            gift_id,
        }
    }
}

impl fmt::Display for StreakKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_id, self.gift_id)
    }
}

/// One coalesced streak.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GiftStreakEntry {
    pub key: StreakKey,
    /// Latest running count reported by the relay
    pub cumulative_combo: u64,
    /// `true` while the streak is in progress
    pub open: bool,
    /// Insertion order within the tracker
    pub inserted_at_seq: u64,
    pub sender_name: String,
    pub gift_name: String,
    pub diamond_count: i64,
    pub gift_picture_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl GiftStreakEntry {
    fn from_gift(gift: &GiftMessage, seq: u64) -> Self {
        Self {
            key: gift.streak_key(),
            cumulative_combo: gift.streak_count(),
            open: !gift.repeat_end,
            inserted_at_seq: seq,
            sender_name: gift.sender_name().to_string(),
            gift_name: gift.gift_name.clone(),
            diamond_count: gift.diamond_count,
            gift_picture_url: gift.gift_picture_url.clone(),
            updated_at: Utc::now(),
        }
    }

    /// Diamonds spent on the streak so far.
    pub fn total_diamonds(&self) -> u64 {
        (self.diamond_count.max(0) as u64).saturating_mul(self.cumulative_combo)
    }
}

/// Notification emitted for every history change.
#[derive(Debug, Clone, PartialEq)]
pub enum GiftStreakEvent {
    /// An entry was created or updated; `open` tells in-progress from finalized.
    Upserted(GiftStreakEntry),
    /// The oldest entry was dropped to make room. Its slot can be reclaimed.
    Evicted(GiftStreakEntry),
}

impl GiftStreakEvent {
    pub fn entry(&self) -> &GiftStreakEntry {
        match self {
            Self::Upserted(entry) | Self::Evicted(entry) => entry,
        }
    }
}

/// Bounded history of gift streaks with an index of the open ones.
#[derive(Debug)]
pub struct GiftStreakTracker {
    max_items: usize,
    history: VecDeque<GiftStreakEntry>,
    /// Open key -> `inserted_at_seq` of its history entry
    open_index: FxHashMap<StreakKey, u64>,
    next_seq: u64,
}

impl GiftStreakTracker {
    /// Create a tracker keeping at most `max_items` entries (at least one).
    pub fn new(max_items: usize) -> Self {
        let max_items = max_items.max(1);
        Self {
            max_items,
            history: VecDeque::with_capacity(max_items),
            open_index: FxHashMap::default(),
            next_seq: 0,
        }
    }

    /// Fold one gift event into the history.
    pub fn record(&mut self, gift: &GiftMessage) -> Vec<GiftStreakEvent> {
        let key = gift.streak_key();

        if let Some(seq) = self.open_index.get(&key).copied() {
            if let Some(entry) = self.entry_mut(seq) {
                entry.cumulative_combo = gift.streak_count();
                entry.updated_at = Utc::now();
                if !gift.gift_name.is_empty() {
                    entry.gift_name.clone_from(&gift.gift_name);
                }
                if gift.repeat_end {
                    entry.open = false;
                }
                let snapshot = entry.clone();

                if snapshot.open {
                    trace!(key = %key, combo = snapshot.cumulative_combo, "Gift streak updated");
                } else {
                    self.open_index.remove(&key);
                    debug!(key = %key, combo = snapshot.cumulative_combo, "Gift streak finished");
                }
                return vec![GiftStreakEvent::Upserted(snapshot)];
            }
            // Unreachable while the index invariant holds; heal it anyway.
            self.open_index.remove(&key);
        }

        let mut events = Vec::with_capacity(2);
        while self.history.len() >= self.max_items {
            let Some(evicted) = self.history.pop_front() else {
                break;
            };
            if evicted.open {
                self.open_index.remove(&evicted.key);
            }
            debug!(key = %evicted.key, open = evicted.open, "Evicted oldest gift streak");
            events.push(GiftStreakEvent::Evicted(evicted));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = GiftStreakEntry::from_gift(gift, seq);
        if entry.open {
            self.open_index.insert(key, seq);
            debug!(key = %entry.key, combo = entry.cumulative_combo, "Gift streak started");
        } else {
            debug!(key = %entry.key, combo = entry.cumulative_combo, "Single gift recorded");
        }
        self.history.push_back(entry.clone());
        events.push(GiftStreakEvent::Upserted(entry));
        events
    }

    fn entry_mut(&mut self, seq: u64) -> Option<&mut GiftStreakEntry> {
        let idx = self
            .history
            .binary_search_by_key(&seq, |entry| entry.inserted_at_seq)
            .ok()?;
        self.history.get_mut(idx)
    }

    /// The in-progress entry for `key`, if any.
    pub fn open_entry(&self, key: &StreakKey) -> Option<&GiftStreakEntry> {
        let seq = *self.open_index.get(key)?;
        let idx = self
            .history
            .binary_search_by_key(&seq, |entry| entry.inserted_at_seq)
            .ok()?;
        self.history.get(idx)
    }

    pub fn is_open(&self, key: &StreakKey) -> bool {
        self.open_index.contains_key(key)
    }

    /// Entries oldest first.
    pub fn history(&self) -> impl Iterator<Item = &GiftStreakEntry> {
        self.history.iter()
    }

    pub fn open_count(&self) -> usize {
        self.open_index.len()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Drop all history and open streaks.
    pub fn clear(&mut self) {
        self.history.clear();
        self.open_index.clear();
    }
}
