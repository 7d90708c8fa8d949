use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::model::MonthKey;

type Bucket = Arc<Mutex<BTreeSet<u32>>>;

/// Days already claimed for scheduling in this process, one locked bucket per month.
///
/// Buckets are created on first claim and kept for the process lifetime. Only the
/// three methods below touch a bucket, each under that bucket's lock; no lock is
/// ever held across an `await` or while another bucket is locked.
#[derive(Debug, Default)]
pub struct AvailabilityCache {
    months: DashMap<MonthKey, Bucket>,
}

impl AvailabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, key: MonthKey) -> Bucket {
        self.months.entry(key).or_default().value().clone()
    }

    /// Claim `day` if nobody holds it. Check and insert happen under one lock.
    pub fn try_claim(&self, key: MonthKey, day: u32) -> bool {
        self.bucket(key).lock().insert(day)
    }

    /// Drop claims, e.g. after the write they stood for failed.
    pub fn release(&self, key: MonthKey, days: &[u32]) {
        let Some(bucket) = self.months.get(&key).map(|e| e.value().clone()) else {
            return;
        };
        let mut claimed = bucket.lock();
        for day in days {
            claimed.remove(day);
        }
    }

    /// Read-only: never creates a bucket or claims the day.
    pub fn is_available(&self, key: MonthKey, day: u32) -> bool {
        match self.months.get(&key) {
            Some(bucket) => !bucket.lock().contains(&day),
            None => true,
        }
    }

    /// Claimed days of a month, ascending.
    pub fn claimed(&self, key: MonthKey) -> Vec<u32> {
        self.months
            .get(&key)
            .map(|bucket| bucket.lock().iter().copied().collect())
            .unwrap_or_default()
    }
}
