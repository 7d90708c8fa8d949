use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::AvailabilityCache;
use crate::error::ErrorKind;
use crate::limits::{MAX_CLASS_CAPACITY, MAX_SCHEDULE_DAYS, check_name};
use crate::model::*;
use crate::observability;
use crate::repository::ClassRepository;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("end date {end} is before start date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("invalid class: {0}")]
    Invalid(&'static str),
    #[error("date {0} is in the past")]
    DateInPast(NaiveDate),
    #[error("date {0} is already reserved")]
    DateReserved(NaiveDate),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A month's bulk insert failed. `not_scheduled` lists every unit of this
    /// call that did not persist: the failed month plus earlier conflicts.
    #[error("persisting classes for {month} failed: {source}")]
    Persistence {
        month: MonthKey,
        #[source]
        source: StoreError,
        not_scheduled: Vec<DayUnit>,
    },
}

impl ScheduleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScheduleError::InvalidRange { .. }
            | ScheduleError::Invalid(_)
            | ScheduleError::DateInPast(_) => ErrorKind::Validation,
            ScheduleError::DateReserved(_) => ErrorKind::Conflict,
            ScheduleError::Store(e) => e.kind(),
            ScheduleError::Persistence { .. } => ErrorKind::Persistence,
        }
    }
}

fn check_capacity(capacity: u32) -> Result<(), ScheduleError> {
    if capacity == 0 {
        return Err(ScheduleError::Invalid("capacity must be at least 1"));
    }
    if capacity > MAX_CLASS_CAPACITY {
        return Err(ScheduleError::Invalid("capacity too large"));
    }
    Ok(())
}

fn validate_request(request: &ScheduleRequest) -> Result<(), ScheduleError> {
    if request.end_date < request.start_date {
        return Err(ScheduleError::InvalidRange {
            start: request.start_date,
            end: request.end_date,
        });
    }
    check_name(&request.name).map_err(ScheduleError::Invalid)?;
    check_capacity(request.capacity)?;
    if request.day_count() > MAX_SCHEDULE_DAYS {
        return Err(ScheduleError::Invalid("date range too long"));
    }
    Ok(())
}

/// Ascending month order makes the stop-on-failure cut deterministic.
fn group_by_month(units: Vec<DayUnit>) -> BTreeMap<MonthKey, Vec<DayUnit>> {
    let mut groups: BTreeMap<MonthKey, Vec<DayUnit>> = BTreeMap::new();
    for unit in units {
        groups.entry(unit.month_key()).or_default().push(unit);
    }
    groups
}

/// Turns date-range requests into one class per free day, guarded by the
/// availability cache, and keeps the cache in step with what storage holds.
pub struct SchedulingCoordinator {
    cache: Arc<AvailabilityCache>,
    classes: Arc<dyn ClassRepository>,
    /// One lock per updated class. Held from reading the current date until
    /// the cache reflects the write, so the released day is the one replaced.
    updates: DashMap<ClassId, Arc<tokio::sync::Mutex<()>>>,
}

impl SchedulingCoordinator {
    pub fn new(cache: Arc<AvailabilityCache>, classes: Arc<dyn ClassRepository>) -> Self {
        Self {
            cache,
            classes,
            updates: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &AvailabilityCache {
        &self.cache
    }

    /// Schedule one class per day of the request and return the days that
    /// could not be scheduled because another request already claimed them.
    ///
    /// Months are claimed and persisted one at a time. If a month's insert
    /// fails, its claims are released and processing stops; the error carries
    /// everything from this call that did not persist.
    pub async fn create_classes(&self, request: &ScheduleRequest) -> Result<Vec<DayUnit>, ScheduleError> {
        validate_request(request)?;

        let mut not_scheduled = Vec::new();
        for (month, units) in group_by_month(request.expand()) {
            let (admitted, rejected): (Vec<DayUnit>, Vec<DayUnit>) = units
                .into_iter()
                .partition(|unit| self.cache.try_claim(month, unit.day()));
            debug!(
                "{month}: claimed {} days, {} already taken",
                admitted.len(),
                rejected.len()
            );

            if !admitted.is_empty() {
                if let Err(source) = self.classes.add_classes(&admitted).await {
                    let days: Vec<u32> = admitted.iter().map(DayUnit::day).collect();
                    self.cache.release(month, &days);
                    metrics::counter!(observability::CACHE_RELEASES_TOTAL).increment(days.len() as u64);
                    warn!("{month}: insert failed, released {} claims: {source}", days.len());

                    let mut report = admitted;
                    report.extend(not_scheduled);
                    report.extend(rejected);
                    return Err(ScheduleError::Persistence {
                        month,
                        source,
                        not_scheduled: report,
                    });
                }
                metrics::counter!(observability::CLASSES_SCHEDULED_TOTAL).increment(admitted.len() as u64);
            }
            not_scheduled.extend(rejected);
        }

        if !not_scheduled.is_empty() {
            metrics::counter!(observability::DAYS_REJECTED_TOTAL).increment(not_scheduled.len() as u64);
            warn!(
                "class {:?}: {} of {} days not scheduled",
                request.name,
                not_scheduled.len(),
                request.day_count()
            );
        }
        Ok(not_scheduled)
    }

    /// Update one class. Moving it to another day claims that day first and
    /// releases the old one once storage has accepted the change. Updates to
    /// the same class run one at a time.
    pub async fn update_class(&self, id: ClassId, patch: &ClassPatch) -> Result<u64, ScheduleError> {
        if let Some(name) = &patch.name {
            check_name(name).map_err(ScheduleError::Invalid)?;
        }
        if let Some(capacity) = patch.capacity {
            check_capacity(capacity)?;
        }
        if let Some(date) = patch.date
            && date < Utc::now().date_naive()
        {
            return Err(ScheduleError::DateInPast(date));
        }

        // Unknown ids fail here without allocating a lock.
        self.classes.get_class_by_id(id).await?;
        let lock = self.updates.entry(id).or_default().clone();
        let _serialized = lock.lock().await;

        let current = self.classes.get_class_by_id(id).await?;
        let Some(date) = patch.date.filter(|d| *d != current.date) else {
            return Ok(self.classes.update_class(id, patch).await?);
        };

        let (month, day) = (MonthKey::from(date), date.day());
        if !self.cache.is_available(month, day) || !self.cache.try_claim(month, day) {
            return Err(ScheduleError::DateReserved(date));
        }
        match self.classes.update_class(id, patch).await {
            Ok(rows) => {
                self.cache
                    .release(MonthKey::from(current.date), &[current.date.day()]);
                debug!("class {id}: moved from {} to {date}", current.date);
                Ok(rows)
            }
            Err(e) => {
                self.cache.release(month, &[day]);
                metrics::counter!(observability::CACHE_RELEASES_TOTAL).increment(1);
                Err(e.into())
            }
        }
    }

    /// Claim the day of every stored class dated today or later.
    pub async fn warm(&self) -> Result<usize, ScheduleError> {
        let filters = ClassFilters {
            date_gte: Some(Utc::now().date_naive()),
            ..Default::default()
        };
        let upcoming = self.classes.list_classes(&filters).await?;
        let claimed = upcoming
            .iter()
            .filter(|c| self.cache.try_claim(MonthKey::from(c.date), c.date.day()))
            .count();
        info!("availability cache warmed: {claimed} days from {} upcoming classes", upcoming.len());
        Ok(claimed)
    }
}
