use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::scheduler::job::{JobRecord, JobStatus, Priority};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    created_at: DateTime<Utc>,
    id: Uuid,
}

/// In-memory projection of all Queued jobs, one ordered lane per priority
/// level, each sorted by `created_at` ascending (id breaks exact ties).
///
/// Rebuilt from the store at startup; never persisted on its own. The
/// store stays authoritative, so callers re-read the record after a peek.
#[derive(Debug, Default)]
pub struct QueueIndex {
    high: Vec<Entry>,
    normal: Vec<Entry>,
    low: Vec<Entry>,
}

impl QueueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane_mut(&mut self, priority: Priority) -> &mut Vec<Entry> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
            Priority::Low => &mut self.low,
        }
    }

    /// Insert a queued job into its priority lane, keeping the lane
    /// sorted by (created_at, id).
    pub fn insert(&mut self, record: &JobRecord) {
        let entry = Entry {
            created_at: record.created_at,
            id: record.id,
        };
        let lane = self.lane_mut(record.priority);
        let pos = lane.partition_point(|e| (e.created_at, e.id) < (entry.created_at, entry.id));
        lane.insert(pos, entry);
    }

    /// Remove a job from whichever lane holds it. Returns true if found.
    pub fn remove(&mut self, id: Uuid) -> bool {
        for lane in [&mut self.high, &mut self.normal, &mut self.low] {
            if let Some(pos) = lane.iter().position(|e| e.id == id) {
                lane.remove(pos);
                return true;
            }
        }
        false
    }

    /// The oldest job in the highest non-empty priority lane, if any.
    pub fn peek_next(&self) -> Option<Uuid> {
        self.high
            .first()
            .or_else(|| self.normal.first())
            .or_else(|| self.low.first())
            .map(|e| e.id)
    }

    /// Move a job to a new priority lane, preserving its `created_at` so
    /// it keeps its fairness position among same-priority peers.
    pub fn reorder(&mut self, id: Uuid, new_priority: Priority) -> bool {
        let mut found = None;
        for lane in [&mut self.high, &mut self.normal, &mut self.low] {
            if let Some(pos) = lane.iter().position(|e| e.id == id) {
                found = Some(lane.remove(pos));
                break;
            }
        }
        match found {
            Some(entry) => {
                let lane = self.lane_mut(new_priority);
                let pos =
                    lane.partition_point(|e| (e.created_at, e.id) < (entry.created_at, entry.id));
                lane.insert(pos, entry);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        [&self.high, &self.normal, &self.low]
            .iter()
            .any(|lane| lane.iter().any(|e| e.id == id))
    }

    /// Rebuild from scratch out of a store scan of Queued records.
    pub fn rebuild<'a>(&mut self, records: impl IntoIterator<Item = &'a JobRecord>) {
        self.high.clear();
        self.normal.clear();
        self.low.clear();
        for record in records {
            debug_assert_eq!(record.status, JobStatus::Queued);
            self.insert(record);
        }
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job_at(priority: Priority, offset_secs: i64) -> JobRecord {
        let mut job = JobRecord::new("test", serde_json::Value::Null, priority);
        job.created_at = Utc::now() + Duration::seconds(offset_secs);
        job
    }

    #[test]
    fn peek_prefers_highest_lane() {
        let mut index = QueueIndex::new();
        let low = job_at(Priority::Low, 0);
        let normal = job_at(Priority::Normal, 1);
        let high = job_at(Priority::High, 2);
        index.insert(&low);
        index.insert(&normal);
        index.insert(&high);

        // High wins even though it is the newest.
        assert_eq!(index.peek_next(), Some(high.id));
        index.remove(high.id);
        assert_eq!(index.peek_next(), Some(normal.id));
        index.remove(normal.id);
        assert_eq!(index.peek_next(), Some(low.id));
    }

    #[test]
    fn fifo_within_lane() {
        let mut index = QueueIndex::new();
        let newer = job_at(Priority::Normal, 10);
        let older = job_at(Priority::Normal, 5);
        index.insert(&newer);
        index.insert(&older);
        assert_eq!(index.peek_next(), Some(older.id));
    }

    #[test]
    fn reorder_preserves_created_at_position() {
        let mut index = QueueIndex::new();
        let older = job_at(Priority::High, 0);
        let promoted = job_at(Priority::Low, -5);
        index.insert(&older);
        index.insert(&promoted);

        assert!(index.reorder(promoted.id, Priority::High));
        // The promoted job has the earlier created_at, so it now leads
        // the high lane.
        assert_eq!(index.peek_next(), Some(promoted.id));
    }

    #[test]
    fn remove_unknown_id() {
        let mut index = QueueIndex::new();
        assert!(!index.remove(Uuid::new_v4()));
        assert!(!index.reorder(Uuid::new_v4(), Priority::High));
    }

    #[test]
    fn rebuild_replaces_contents() {
        let mut index = QueueIndex::new();
        let stale = job_at(Priority::Normal, 0);
        index.insert(&stale);

        let fresh = job_at(Priority::Normal, 1);
        index.rebuild([&fresh]);
        assert_eq!(index.len(), 1);
        assert!(!index.contains(stale.id));
        assert_eq!(index.peek_next(), Some(fresh.id));
    }

    #[test]
    fn empty_index() {
        let index = QueueIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.peek_next(), None);
    }
}
