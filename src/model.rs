use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type ClassId = u64;
pub type UserId = u64;

/// Calendar month partition used by the availability cache and batch inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month), "month out of range");
        Self { year, month }
    }
}

impl From<NaiveDate> for MonthKey {
    fn from(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A class to run once a day over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub capacity: u32,
}

impl ScheduleRequest {
    /// Number of calendar days in the range; zero or negative when reversed.
    pub fn day_count(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// One `DayUnit` per day in `[start_date, end_date]`. Empty when the range is reversed.
    pub fn expand(&self) -> Vec<DayUnit> {
        self.start_date
            .iter_days()
            .take_while(|d| *d <= self.end_date)
            .map(|date| DayUnit {
                name: self.name.clone(),
                date,
                capacity: self.capacity,
            })
            .collect()
    }
}

/// One day's worth of a schedule request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayUnit {
    pub name: String,
    pub date: NaiveDate,
    pub capacity: u32,
}

impl DayUnit {
    pub fn month_key(&self) -> MonthKey {
        MonthKey::from(self.date)
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }
}

/// A persisted class as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub id: ClassId,
    pub name: String,
    pub date: NaiveDate,
    pub capacity: u32,
    pub num_registrations: u32,
}

/// Partial update of a class. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassPatch {
    pub name: Option<String>,
    pub date: Option<NaiveDate>,
    pub capacity: Option<u32>,
}

impl ClassPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.date.is_none() && self.capacity.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassFilters {
    pub name: Option<String>,
    pub date_gte: Option<NaiveDate>,
    pub date_lte: Option<NaiveDate>,
    pub capacity_gte: Option<u32>,
    pub capacity_lte: Option<u32>,
    pub registrations_gte: Option<u32>,
    pub registrations_lte: Option<u32>,
}

impl ClassFilters {
    pub fn matches(&self, class: &ClassInfo) -> bool {
        fn at_least<T: PartialOrd>(bound: Option<T>, v: T) -> bool {
            bound.is_none_or(|b| v >= b)
        }
        fn at_most<T: PartialOrd>(bound: Option<T>, v: T) -> bool {
            bound.is_none_or(|b| v <= b)
        }

        self.name.as_deref().is_none_or(|n| n == class.name)
            && at_least(self.date_gte, class.date)
            && at_most(self.date_lte, class.date)
            && at_least(self.capacity_gte, class.capacity)
            && at_most(self.capacity_lte, class.capacity)
            && at_least(self.registrations_gte, class.num_registrations)
            && at_most(self.registrations_lte, class.num_registrations)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub user_id: UserId,
    pub class_id: ClassId,
    pub reserved_at: DateTime<Utc>,
}

/// A class a user has booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassBooked {
    pub class_id: ClassId,
    pub name: String,
    pub date: NaiveDate,
    pub reserved_at: DateTime<Utc>,
}

/// A user holding a booking on a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBooked {
    pub class_id: ClassId,
    pub user_id: UserId,
    pub user_name: String,
}

// ── Rows ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ClassRow {
    pub id: ClassId,
    pub name: String,
    pub date: NaiveDate,
    pub capacity: u32,
    /// Admission counter. Only moves when a `BookingAdded` record is applied.
    pub num_registrations: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClassRow {
    pub fn new(new: &NewClass, at: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            name: new.name.clone(),
            date: new.date,
            capacity: new.capacity,
            num_registrations: 0,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn info(&self) -> ClassInfo {
        ClassInfo {
            id: self.id,
            name: self.name.clone(),
            date: self.date,
            capacity: self.capacity,
            num_registrations: self.num_registrations,
        }
    }

    pub fn apply_patch(&mut self, patch: &ClassPatch, at: DateTime<Utc>) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(capacity) = patch.capacity {
            self.capacity = capacity;
        }
        self.updated_at = at;
    }

    pub fn is_full(&self) -> bool {
        self.num_registrations >= self.capacity
    }
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn user(&self) -> User {
        User {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// A class row as written by a bulk insert, id already assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClass {
    pub id: ClassId,
    pub name: String,
    pub date: NaiveDate,
    pub capacity: u32,
}

/// Journal records. One record per committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    UserCreated {
        id: UserId,
        name: String,
        at: DateTime<Utc>,
    },
    UserRenamed {
        id: UserId,
        name: String,
        at: DateTime<Utc>,
    },
    ClassesAdded {
        rows: Vec<NewClass>,
        at: DateTime<Utc>,
    },
    ClassUpdated {
        id: ClassId,
        patch: ClassPatch,
        at: DateTime<Utc>,
    },
    BookingAdded {
        user_id: UserId,
        class_id: ClassId,
        reserved_at: DateTime<Utc>,
    },
}
