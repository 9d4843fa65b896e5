//! Spaced-repetition scheduling.
//!
//! The queue is a pure in-memory structure: every operation takes `now` as
//! an argument, so scheduling is a function of (queue state, outcome, now)
//! and testable without persistence or a clock.

pub mod backoff;

pub use backoff::BackoffSchedule;

use crate::types::{Outcome, SrsItem, SrsKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A profile's review queue.
///
/// The `(id, kind)` pair is unique by construction: the only mutation path
/// is [`SrsQueue::schedule`], which reschedules an existing entry in place
/// rather than appending a duplicate. Serialized as a plain array, so a
/// missing `srsQueue` field in an old document deserializes to an empty
/// queue via `Default`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SrsQueue {
    items: Vec<SrsItem>,
}

impl SrsQueue {
    pub fn items(&self) -> &[SrsItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: i64, kind: SrsKind) -> Option<&SrsItem> {
        self.items.iter().find(|i| i.id == id && i.kind == kind)
    }

    /// Enroll an item or apply a review outcome to it.
    ///
    /// - No existing entry, `Success`: enroll at stage 0, due after the
    ///   base interval.
    /// - No existing entry, `Fail`: nothing is enrolled; a failed first
    ///   attempt only lands in the exercise log.
    /// - Existing entry, `Success`: stage advances (capped), due pushed out
    ///   by the stage's interval.
    /// - Existing entry, `Fail`: stage resets to 0 and the item is due
    ///   again after the base interval, regardless of how far it had
    ///   progressed.
    ///
    /// Returns the scheduled item, if any.
    pub fn schedule(
        &mut self,
        id: i64,
        kind: SrsKind,
        outcome: Outcome,
        schedule: &BackoffSchedule,
        now: DateTime<Utc>,
    ) -> Option<&SrsItem> {
        match self.items.iter().position(|i| i.id == id && i.kind == kind) {
            Some(idx) => {
                let item = &mut self.items[idx];
                item.interval_stage = match outcome {
                    Outcome::Success => (item.interval_stage + 1).min(schedule.max_stage()),
                    Outcome::Fail => 0,
                };
                item.due_at = now + schedule.interval(item.interval_stage);
                item.last_outcome = outcome;
                log::debug!(
                    "rescheduled {kind:?} {id}: stage {} due {}",
                    item.interval_stage,
                    item.due_at
                );
                Some(&self.items[idx])
            }
            None => {
                if outcome == Outcome::Fail {
                    return None;
                }
                self.items.push(SrsItem {
                    id,
                    kind,
                    due_at: now + schedule.interval(0),
                    interval_stage: 0,
                    last_outcome: Outcome::Success,
                });
                log::debug!("enrolled {kind:?} {id} at stage 0");
                self.items.last()
            }
        }
    }

    /// Items whose review time has passed, soonest first. An empty queue
    /// yields an empty result, never an error.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<&SrsItem> {
        let mut due: Vec<&SrsItem> = self.items.iter().filter(|i| i.due_at <= now).collect();
        due.sort_by_key(|i| i.due_at);
        due
    }

    /// Drop every entry whose referenced ID is in `ids` (used by progress
    /// resets). Returns how many were removed.
    pub fn remove_ids(&mut self, ids: &HashSet<i64>) -> usize {
        let before = self.items.len();
        self.items.retain(|i| !ids.contains(&i.id));
        before - self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
