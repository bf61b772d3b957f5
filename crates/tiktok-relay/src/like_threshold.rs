//! Cumulative like milestones.
//!
//! Each user's cumulative like total is tracked and a milestone is emitted for
//! every multiple of the threshold crossed, including several at once when a
//! burst of likes jumps over more than one multiple.
//!
//! The relay's `totalLikeCount` is authoritative. A user seen for the first
//! time starts from zero; afterwards the stored total is the only baseline
//! and `likeCount` is informational.
//!
//! A single update emits at most [`MAX_MILESTONES_PER_EVENT`] milestones, the
//! highest ones crossed.

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::message::LikeMessage;

/// A crossed multiple of the like threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikeMilestone {
    pub user_id: String,
    pub nickname: Option<String>,
    /// The multiple that was crossed (`tier * threshold`)
    pub achieved_count: u64,
    pub threshold: u64,
    /// Cumulative total after the event that crossed it
    pub current_total: u64,
}

/// Upper bound on milestones emitted for one like event.
pub const MAX_MILESTONES_PER_EVENT: u64 = 64;

/// Number of multiples of `threshold` in `(previous, current]`.
pub fn tiers_crossed(previous: u64, current: u64, threshold: u64) -> u64 {
    if threshold == 0 || current <= previous {
        return 0;
    }
    current / threshold - previous / threshold
}

/// Multiples of `threshold` in `(previous, current]`, ascending.
///
/// Only the highest [`MAX_MILESTONES_PER_EVENT`] multiples are returned when
/// more were crossed.
pub fn milestones_between(previous: u64, current: u64, threshold: u64) -> Vec<u64> {
    let crossed = tiers_crossed(previous, current, threshold);
    if crossed == 0 {
        return Vec::new();
    }
    let current_tier = current / threshold;
    let first_tier = current_tier - crossed.min(MAX_MILESTONES_PER_EVENT) + 1;
    (first_tier..=current_tier)
        .map(|tier| tier * threshold)
        .collect()
}

/// Per-user cumulative like tracker.
#[derive(Debug)]
pub struct LikeThresholdTracker {
    threshold: u64,
    totals: FxHashMap<String, u64>,
}

impl LikeThresholdTracker {
    /// Create a tracker emitting a milestone every `threshold` likes (at least 1).
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold: threshold.max(1),
            totals: FxHashMap::default(),
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Fold one like event and return the milestones it crossed.
    pub fn record(&mut self, like: &LikeMessage) -> Vec<LikeMilestone> {
        let user_id = &like.user.user_id;
        let current = like.total_like_count;
        let previous = self.totals.get(user_id).copied().unwrap_or(0);

        if current < previous {
            debug!(
                user_id = %user_id,
                previous,
                current,
                "Ignoring regressing like total"
            );
            return Vec::new();
        }
        self.totals.insert(user_id.clone(), current);

        let crossed = tiers_crossed(previous, current, self.threshold);
        if crossed > MAX_MILESTONES_PER_EVENT {
            let skipped = crossed - MAX_MILESTONES_PER_EVENT;
            let first_skipped = (previous / self.threshold + 1) * self.threshold;
            let last_skipped = first_skipped + (skipped - 1) * self.threshold;
            warn!(
                user_id = %user_id,
                previous,
                current,
                skipped,
                first_skipped,
                last_skipped,
                "Like total jumped too far, skipping lower milestones"
            );
        }

        let milestones: Vec<LikeMilestone> = milestones_between(previous, current, self.threshold)
            .into_iter()
            .map(|achieved_count| LikeMilestone {
                user_id: user_id.clone(),
                nickname: like.user.nickname.clone(),
                achieved_count,
                threshold: self.threshold,
                current_total: current,
            })
            .collect();

        for milestone in &milestones {
            info!(
                user_id = %milestone.user_id,
                achieved = milestone.achieved_count,
                "Like milestone reached"
            );
        }
        milestones
    }

    /// Stored cumulative total for a user.
    pub fn total_for(&self, user_id: &str) -> Option<u64> {
        self.totals.get(user_id).copied()
    }

    /// Overwrite a user's stored total without emitting milestones.
    pub fn set_total(&mut self, user_id: impl Into<String>, total: u64) {
        self.totals.insert(user_id.into(), total);
    }

    pub fn tracked_users(&self) -> usize {
        self.totals.len()
    }

    /// Forget every user.
    pub fn reset_all(&mut self) {
        self.totals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn like(user: &str, like_count: u64, total: u64) -> LikeMessage {
        serde_json::from_value(serde_json::json!({
            "userId": user,
            "nickname": "liker",
            "likeCount": like_count,
            "totalLikeCount": total,
        }))
        .unwrap()
    }

    fn achieved(milestones: &[LikeMilestone]) -> Vec<u64> {
        milestones.iter().map(|m| m.achieved_count).collect()
    }

    #[test]
    fn test_single_crossing_from_zero() {
        let mut tracker = LikeThresholdTracker::new(100);
        let milestones = tracker.record(&like("u", 150, 150));
        assert_eq!(achieved(&milestones), vec![100]);
        assert_eq!(milestones[0].current_total, 150);
        assert_eq!(tracker.total_for("u"), Some(150));
    }

    #[test]
    fn test_burst_crosses_two_tiers() {
        let mut tracker = LikeThresholdTracker::new(100);
        assert!(tracker.record(&like("u", 50, 50)).is_empty());
        let milestones = tracker.record(&like("u", 200, 250));
        assert_eq!(achieved(&milestones), vec![100, 200]);
    }

    #[test]
    fn test_stored_total_beats_delta() {
        let mut tracker = LikeThresholdTracker::new(100);
        tracker.set_total("u", 50);
        // likeCount understates the jump; the stored total decides.
        let milestones = tracker.record(&like("u", 5, 250));
        assert_eq!(achieved(&milestones), vec![100, 200]);
    }

    #[test]
    fn test_first_sighting_starts_from_zero() {
        let mut tracker = LikeThresholdTracker::new(100);
        // likeCount does not lower the baseline below the relay total.
        let milestones = tracker.record(&like("u", 50, 150));
        assert_eq!(achieved(&milestones), vec![100]);
        assert_eq!(tracker.total_for("u"), Some(150));

        let milestones = tracker.record(&like("v", 15, 505));
        assert_eq!(achieved(&milestones), vec![100, 200, 300, 400, 500]);
    }

    #[test]
    fn test_huge_jump_is_capped_to_highest_milestones() {
        let mut tracker = LikeThresholdTracker::new(1);
        assert_eq!(achieved(&tracker.record(&like("u", 1, 1))), Vec::<u64>::new());

        let current = u64::MAX / 2;
        let milestones = tracker.record(&like("u", 1, current));
        assert_eq!(milestones.len() as u64, MAX_MILESTONES_PER_EVENT);
        assert_eq!(milestones.last().unwrap().achieved_count, current);
        assert_eq!(
            milestones[0].achieved_count,
            current - MAX_MILESTONES_PER_EVENT + 1
        );
        assert_eq!(tracker.total_for("u"), Some(current));
    }

    #[test]
    fn test_max_total_does_not_overflow() {
        let threshold = 1_000;
        let got = milestones_between(0, u64::MAX, threshold);
        assert_eq!(got.len() as u64, MAX_MILESTONES_PER_EVENT);
        assert_eq!(*got.last().unwrap(), u64::MAX / threshold * threshold);
    }

    #[test]
    fn test_duplicate_event_emits_nothing() {
        let mut tracker = LikeThresholdTracker::new(100);
        assert_eq!(tracker.record(&like("u", 100, 100)).len(), 1);
        assert!(tracker.record(&like("u", 100, 100)).is_empty());
    }

    #[test]
    fn test_regression_is_ignored() {
        let mut tracker = LikeThresholdTracker::new(100);
        tracker.record(&like("u", 120, 120));
        assert!(tracker.record(&like("u", 1, 90)).is_empty());
        assert_eq!(tracker.total_for("u"), Some(120));
        // 100 is not emitted twice when the total climbs back.
        assert_eq!(achieved(&tracker.record(&like("u", 90, 210))), vec![200]);
    }

    #[test]
    fn test_users_are_independent() {
        let mut tracker = LikeThresholdTracker::new(10);
        tracker.record(&like("a", 9, 9));
        tracker.record(&like("b", 9, 9));
        assert_eq!(achieved(&tracker.record(&like("a", 1, 10))), vec![10]);
        assert_eq!(tracker.tracked_users(), 2);
        assert_eq!(tracker.total_for("b"), Some(9));
    }

    #[test]
    fn test_reset_all() {
        let mut tracker = LikeThresholdTracker::new(100);
        tracker.record(&like("u", 150, 150));
        tracker.reset_all();
        assert_eq!(tracker.total_for("u"), None);
        assert_eq!(tracker.tracked_users(), 0);
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let tracker = LikeThresholdTracker::new(0);
        assert_eq!(tracker.threshold(), 1);
        assert!(milestones_between(0, 10, 0).is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_milestone_count_and_order(
            previous in 0u64..100_000,
            delta in 0u64..100_000,
            threshold in 1u64..1_000,
        ) {
            let current = previous + delta;
            let got = milestones_between(previous, current, threshold);
            let crossed = current / threshold - previous / threshold;

            prop_assert_eq!(got.len() as u64, crossed.min(MAX_MILESTONES_PER_EVENT));
            if let Some(last) = got.last() {
                prop_assert_eq!(*last, current / threshold * threshold);
            }
            prop_assert!(got.windows(2).all(|w| w[1] == w[0] + threshold));
            for value in &got {
                prop_assert_eq!(value % threshold, 0);
                prop_assert!(*value > previous && *value <= current);
            }
        }
    }
}
