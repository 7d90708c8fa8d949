//! Request and response bodies that are not plain model types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{ClassFilters, ClassId, ClassPatch, DayUnit, ScheduleRequest, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Body of user create and rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBody {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClassesRequest {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub capacity: u32,
}

impl From<CreateClassesRequest> for ScheduleRequest {
    fn from(req: CreateClassesRequest) -> Self {
        ScheduleRequest {
            name: req.name,
            start_date: req.start_date,
            end_date: req.end_date,
            capacity: req.capacity,
        }
    }
}

/// Days that another schedule already holds. Empty when everything was scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClassesResponse {
    pub not_scheduled: Vec<DayUnit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateClassRequest {
    pub name: Option<String>,
    pub date: Option<NaiveDate>,
    pub capacity: Option<u32>,
}

impl From<UpdateClassRequest> for ClassPatch {
    fn from(req: UpdateClassRequest) -> Self {
        ClassPatch {
            name: req.name,
            date: req.date,
            capacity: req.capacity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowsAffected {
    pub rows_affected: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: UserId,
    pub class_id: ClassId,
}

/// `GET /classes` query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassQuery {
    pub class_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub capacity_gte: Option<u32>,
    pub capacity_le: Option<u32>,
    pub num_registrations_gte: Option<u32>,
    pub num_registrations_le: Option<u32>,
}

impl From<ClassQuery> for ClassFilters {
    fn from(q: ClassQuery) -> Self {
        ClassFilters {
            name: q.class_name,
            date_gte: q.start_date,
            date_lte: q.end_date,
            capacity_gte: q.capacity_gte,
            capacity_lte: q.capacity_le,
            registrations_gte: q.num_registrations_gte,
            registrations_lte: q.num_registrations_le,
        }
    }
}
