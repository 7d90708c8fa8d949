mod error;
mod mutations;
mod queries;
mod tables;

pub use error::{Entity, StoreError};

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{error, info};

use crate::model::*;
use crate::observability;
use crate::wal::Wal;

use tables::Tables;

pub type SharedClassRow = Arc<RwLock<ClassRow>>;
pub type SharedUserRow = Arc<RwLock<UserRow>>;

type Ack = oneshot::Sender<io::Result<()>>;

// ── Group-commit journal channel ────────────────────────────────

pub(super) enum WalCommand {
    Append { record: Record, response: Ack },
    /// Rewrite the journal as the minimal record set for its own contents.
    Compact { response: Ack },
    AppendsSinceCompact { response: oneshot::Sender<u64> },
    /// Flush and stop. Later appends fail with a journal error.
    Shutdown { response: oneshot::Sender<()> },
}

/// Owns the journal. Appends that queue up behind the first one are
/// written together and acknowledged after a single fsync.
async fn journal_writer(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    let mut batch: Vec<(Record, Ack)> = Vec::new();
    while let Some(first) = rx.recv().await {
        let mut next = Some(first);
        while let Some(cmd) = next.take() {
            match cmd {
                WalCommand::Append { record, response } => {
                    batch.push((record, response));
                    next = rx.try_recv().ok();
                }
                control => {
                    commit_batch(&mut wal, &mut batch);
                    if !handle_control(&mut wal, control) {
                        return;
                    }
                }
            }
        }
        commit_batch(&mut wal, &mut batch);
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Record, Ack)>) {
    if batch.is_empty() {
        return;
    }
    metrics::histogram!(observability::JOURNAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = Instant::now();

    let result = wal.commit(batch.iter().map(|(record, _)| record));
    metrics::histogram!(observability::JOURNAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    if let Err(e) = &result {
        error!("journal flush of {} records failed: {e}", batch.len());
    }
    for (_, ack) in batch.drain(..) {
        let _ = ack.send(match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        });
    }
}

/// Returns `false` when the writer should stop.
fn handle_control(wal: &mut Wal, cmd: WalCommand) -> bool {
    match cmd {
        WalCommand::Compact { response } => {
            let _ = response.send(compact(wal));
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Shutdown { response } => {
            let _ = response.send(());
            return false;
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the caller"),
    }
    true
}

fn compact(wal: &mut Wal) -> io::Result<()> {
    let replayed = Wal::replay(wal.path())?;
    let before = replayed.records.len();
    let records = Tables::from_records(&replayed.records).into_records();
    Wal::write_compact_file(wal.path(), &records)?;
    wal.swap_compact_file()?;
    info!("journal compacted: {before} -> {} records", records.len());
    Ok(())
}

/// The authoritative store: users, classes and bookings, journaled before applied.
///
/// Each class row sits behind its own `RwLock`; holding the write guard is the
/// row lock that serializes capacity checks and updates on that class.
pub struct Database {
    classes: DashMap<ClassId, SharedClassRow>,
    users: DashMap<UserId, SharedUserRow>,
    bookings: DashMap<(UserId, ClassId), Booking>,
    next_class_id: AtomicU64,
    next_user_id: AtomicU64,
    wal_tx: mpsc::Sender<WalCommand>,
}

impl Database {
    /// Replay the journal at `path` and start its writer task. Must be called
    /// inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let (wal, records) = Wal::open(path)?;
        let tables = Tables::from_records(&records);
        info!(
            "journal {}: replayed {} records ({} users, {} classes, {} bookings)",
            path.display(),
            records.len(),
            tables.users.len(),
            tables.classes.len(),
            tables.bookings.len()
        );

        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer(wal, wal_rx));

        let db = Self {
            classes: DashMap::new(),
            users: DashMap::new(),
            bookings: DashMap::new(),
            next_class_id: AtomicU64::new(tables.next_class_id()),
            next_user_id: AtomicU64::new(tables.next_user_id()),
            wal_tx,
        };
        for (id, row) in tables.users {
            db.users.insert(id, Arc::new(RwLock::new(row)));
        }
        for (id, row) in tables.classes {
            db.classes.insert(id, Arc::new(RwLock::new(row)));
        }
        for (key, booking) in tables.bookings {
            db.bookings.insert(key, booking);
        }
        Ok(db)
    }

    async fn wal_append(&self, record: Record) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                record,
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Journal("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Journal("journal writer dropped response".into()))?
            .map_err(|e| StoreError::Journal(e.to_string()))
    }

    /// Rewrite the journal to the minimal record set. Concurrent appends are
    /// ordered before or after it by the writer task.
    pub async fn compact_journal(&self) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { response: tx })
            .await
            .map_err(|_| StoreError::Journal("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Journal("journal writer dropped response".into()))?
            .map_err(|e| StoreError::Journal(e.to_string()))
    }

    pub async fn journal_appends_since_compact(&self) -> Result<u64, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .map_err(|_| StoreError::Journal("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Journal("journal writer dropped response".into()))
    }

    /// Flush pending appends and stop the writer. Idempotent.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::Shutdown { response: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    pub(super) fn class_row(&self, id: ClassId) -> Result<SharedClassRow, StoreError> {
        self.classes
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::class_not_found(id))
    }

    pub(super) fn user_row(&self, id: UserId) -> Result<SharedUserRow, StoreError> {
        self.users
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::user_not_found(id))
    }
}
