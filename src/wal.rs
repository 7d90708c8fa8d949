use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::model::Record;

/// Frames longer than this are treated as garbage rather than allocated.
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Bytes of framing around each payload: length prefix and CRC.
const FRAME_OVERHEAD: u64 = 8;

/// Write one frame and return its length on disk.
fn encode_record(writer: &mut impl Write, record: &Record) -> io::Result<u64> {
    let payload =
        bincode::serialize(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(payload.len() as u64 + FRAME_OVERHEAD)
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    /// Fail after the first record of the next batch is buffered.
    Encode,
    /// Fail after the next batch reaches the file but before it is synced.
    Sync,
}

/// `read_exact` that reports a short read as `false` instead of an error.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Read one frame. `None` marks the end of the valid prefix: clean EOF,
/// a torn write, a CRC mismatch or an undecodable payload.
fn read_frame(reader: &mut impl Read) -> io::Result<Option<(Record, u64)>> {
    let mut len_buf = [0u8; 4];
    if !fill(reader, &mut len_buf)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    if !fill(reader, &mut payload)? {
        return Ok(None);
    }
    let mut crc_buf = [0u8; 4];
    if !fill(reader, &mut crc_buf)? {
        return Ok(None);
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(None);
    }

    Ok(bincode::deserialize::<Record>(&payload)
        .ok()
        .map(|record| (record, len as u64 + FRAME_OVERHEAD)))
}

/// Result of scanning a journal file.
#[derive(Debug, Default)]
pub struct Replayed {
    pub records: Vec<Record>,
    /// Byte length of the valid prefix. Anything after it is a damaged tail.
    pub valid_len: u64,
}

/// Append-only journal.
///
/// Each entry is `[u32 len][bincode Record][u32 crc32]`, little endian, where
/// `len` counts the payload only.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    /// File length covered by synced batches. A failed batch is cut back to it.
    committed_len: u64,
    /// Set when a failed batch could not be cut back; every later commit fails.
    poisoned: bool,
    appends_since_compact: u64,
    #[cfg(test)]
    fault: Option<Fault>,
}

impl Wal {
    /// Replay the journal at `path`, cut off any damaged tail, and open it for appends.
    ///
    /// The tail is truncated so that new records are never written behind bytes
    /// a later replay would stop at.
    pub fn open(path: &Path) -> io::Result<(Self, Vec<Record>)> {
        let replayed = Self::replay(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let on_disk = file.metadata()?.len();
        if on_disk > replayed.valid_len {
            warn!(
                "journal {}: discarding {} bytes of damaged tail",
                path.display(),
                on_disk - replayed.valid_len
            );
            file.set_len(replayed.valid_len)?;
            file.sync_all()?;
        }
        let wal = Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            committed_len: replayed.valid_len,
            poisoned: false,
            appends_since_compact: replayed.records.len() as u64,
            #[cfg(test)]
            fault: None,
        };
        Ok((wal, replayed.records))
    }

    /// Scan `path` and return every record of its valid prefix.
    pub fn replay(path: &Path) -> io::Result<Replayed> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replayed::default()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut replayed = Replayed::default();
        while let Some((record, frame_len)) = read_frame(&mut reader)? {
            replayed.records.push(record);
            replayed.valid_len += frame_len;
        }
        Ok(replayed)
    }

    #[cfg(test)]
    pub fn append(&mut self, record: &Record) -> io::Result<()> {
        self.commit([record])
    }

    #[cfg(test)]
    pub(crate) fn inject(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    #[cfg(test)]
    fn trip(&mut self, at: Fault) -> io::Result<()> {
        if self.fault == Some(at) {
            self.fault = None;
            return Err(io::Error::other(format!("injected {at:?} fault")));
        }
        Ok(())
    }

    /// Write `records` as one batch and fsync once.
    ///
    /// Either the whole batch is durable or none of it is: on failure the
    /// unwritten buffer is dropped and the file is cut back to the last
    /// committed length, so a later batch never carries these bytes.
    pub fn commit<'a>(&mut self, records: impl IntoIterator<Item = &'a Record>) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::other("journal unusable after a failed rollback"));
        }
        match self.write_batch(records) {
            Ok((len, count)) => {
                self.committed_len += len;
                self.appends_since_compact += count;
                Ok(())
            }
            Err(e) => {
                if let Err(undo) = self.rollback() {
                    error!("journal {}: rollback failed: {undo}", self.path.display());
                    self.poisoned = true;
                }
                Err(e)
            }
        }
    }

    fn write_batch<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a Record>,
    ) -> io::Result<(u64, u64)> {
        let (mut len, mut count) = (0, 0);
        for record in records {
            len += encode_record(&mut self.writer, record)?;
            count += 1;
            #[cfg(test)]
            self.trip(Fault::Encode)?;
        }
        self.writer.flush()?;
        #[cfg(test)]
        self.trip(Fault::Sync)?;
        self.writer.get_ref().sync_all()?;
        Ok((len, count))
    }

    fn rollback(&mut self) -> io::Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        // Dropping a BufWriter flushes it; take it apart so the buffer is lost.
        let _ = stale.into_parts();
        let file = self.writer.get_ref();
        file.set_len(self.committed_len)?;
        file.sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    fn compact_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// Write `records` to the sibling temp file and fsync it.
    pub fn write_compact_file(path: &Path, records: &[Record]) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(Self::compact_path(path))?);
        for record in records {
            encode_record(&mut writer, record)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the temp file over the journal and reopen it for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        fs::rename(Self::compact_path(&self.path), &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.committed_len = file.metadata()?.len();
        self.poisoned = false;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, records: &[Record]) -> io::Result<()> {
        Self::write_compact_file(&self.path, records)?;
        self.swap_compact_file()
    }
}
