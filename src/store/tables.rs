use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::model::*;

/// Plain, unlocked tables rebuilt from journal records.
///
/// Used to load the store on open and to derive the compacted journal.
#[derive(Debug, Default)]
pub(super) struct Tables {
    pub users: BTreeMap<UserId, UserRow>,
    pub classes: BTreeMap<ClassId, ClassRow>,
    pub bookings: BTreeMap<(UserId, ClassId), Booking>,
}

impl Tables {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut tables = Self::default();
        for record in records {
            tables.apply(record);
        }
        tables
    }

    /// Records referring to rows that do not exist are skipped.
    pub fn apply(&mut self, record: &Record) {
        match record {
            Record::UserCreated { id, name, at } => {
                self.users.insert(
                    *id,
                    UserRow {
                        id: *id,
                        name: name.clone(),
                        created_at: *at,
                        updated_at: *at,
                    },
                );
            }
            Record::UserRenamed { id, name, at } => {
                if let Some(row) = self.users.get_mut(id) {
                    row.name = name.clone();
                    row.updated_at = *at;
                }
            }
            Record::ClassesAdded { rows, at } => {
                for new in rows {
                    self.classes.insert(new.id, ClassRow::new(new, *at));
                }
            }
            Record::ClassUpdated { id, patch, at } => {
                if let Some(row) = self.classes.get_mut(id) {
                    row.apply_patch(patch, *at);
                }
            }
            Record::BookingAdded {
                user_id,
                class_id,
                reserved_at,
            } => {
                let Some(class) = self.classes.get_mut(class_id) else {
                    return;
                };
                if self.bookings.contains_key(&(*user_id, *class_id)) {
                    return;
                }
                class.num_registrations += 1;
                self.bookings.insert(
                    (*user_id, *class_id),
                    Booking {
                        user_id: *user_id,
                        class_id: *class_id,
                        reserved_at: *reserved_at,
                    },
                );
            }
        }
    }

    pub fn next_user_id(&self) -> UserId {
        self.users.keys().next_back().map_or(1, |id| id + 1)
    }

    pub fn next_class_id(&self) -> ClassId {
        self.classes.keys().next_back().map_or(1, |id| id + 1)
    }

    /// The shortest record list that rebuilds these tables.
    ///
    /// Classes created by one bulk insert stay in one record. Registration
    /// counters are not written; replaying the bookings restores them.
    pub fn into_records(self) -> Vec<Record> {
        let mut out = Vec::with_capacity(self.users.len() + self.classes.len() + self.bookings.len());

        for row in self.users.values() {
            out.push(Record::UserCreated {
                id: row.id,
                name: row.name.clone(),
                at: row.created_at,
            });
            if row.updated_at != row.created_at {
                out.push(Record::UserRenamed {
                    id: row.id,
                    name: row.name.clone(),
                    at: row.updated_at,
                });
            }
        }

        let mut batches: Vec<(DateTime<Utc>, Vec<NewClass>)> = Vec::new();
        let mut touched = Vec::new();
        for row in self.classes.values() {
            let new = NewClass {
                id: row.id,
                name: row.name.clone(),
                date: row.date,
                capacity: row.capacity,
            };
            match batches.last_mut() {
                Some((at, rows)) if *at == row.created_at => rows.push(new),
                _ => batches.push((row.created_at, vec![new])),
            }
            if row.updated_at != row.created_at {
                touched.push(Record::ClassUpdated {
                    id: row.id,
                    patch: ClassPatch::default(),
                    at: row.updated_at,
                });
            }
        }
        out.extend(batches.into_iter().map(|(at, rows)| Record::ClassesAdded { rows, at }));
        out.extend(touched);

        let mut bookings: Vec<Booking> = self.bookings.into_values().collect();
        bookings.sort_by_key(|b| (b.reserved_at, b.class_id, b.user_id));
        out.extend(bookings.into_iter().map(|b| Record::BookingAdded {
            user_id: b.user_id,
            class_id: b.class_id,
            reserved_at: b.reserved_at,
        }));
        out
    }
}
