//! Append-only log of every region state change
//!
//! The log subscribes with [`filter_all`](crate::pubsub::filter_all), so it
//! records backlog replay as well as live events. Records are stored one
//! JSON object per line, ids ascending.

mod record;

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::pubsub::Subscription;
use crate::shutdown::Shutdown;
use crate::types::Update;

pub use record::Record;

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history: io: {0}")]
    Io(#[from] io::Error),
    #[error("history: json: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON-lines history file
pub struct HistoryLog {
    path: PathBuf,
    /// Next record id to assign; also serializes appends
    next_id: Mutex<u64>,
}

impl HistoryLog {
    /// Open (or create) the log at `path`, continuing after its highest id
    pub fn open<P: AsRef<Path>>(path: P) -> HistoryResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        repair_tail(&path)?;
        let last_id = read_records(&path)?.last().map_or(0, |r| r.id);
        debug!(path = %path.display(), last_id, "history: open");

        Ok(Self {
            path,
            next_id: Mutex::new(last_id + 1),
        })
    }

    /// Append a record for `update` and return its id
    pub fn append(&self, update: &Update) -> HistoryResult<u64> {
        let mut next_id = self.next_id.lock();
        let record = Record::from_update(*next_id, update);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", record.to_json_line()?)?;
        file.sync_all()?;

        *next_id += 1;
        Ok(record.id)
    }

    /// Every record, ascending by id
    pub fn list_records(&self) -> HistoryResult<Vec<Record>> {
        // Hold the append lock so a half-written line is never read
        let _guard = self.next_id.lock();
        read_records(&self.path)
    }

    /// Append every update received on `subscription` until shutdown or
    /// the queue closes. A failed append stops the log.
    pub async fn run(
        &self,
        mut subscription: Subscription<Update>,
        shutdown: Shutdown,
    ) -> HistoryResult<()> {
        loop {
            let update = tokio::select! {
                _ = shutdown.cancelled() => break,
                update = subscription.recv() => match update {
                    Some(update) => update,
                    None => break,
                },
            };

            let id = self.append(&update)?;
            debug!(id, region = update.region.id, alert = update.region.alert, "history: append");
        }

        debug!(subscriber = subscription.name(), "history: exit");
        Ok(())
    }
}

/// Make sure the log ends on a line boundary after an interrupted append.
///
/// A final line without its newline is kept and terminated when it parses
/// as a record, otherwise it is cut off.
fn repair_tail(path: &Path) -> HistoryResult<()> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if file.metadata()?.len() == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let mut contents = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut contents)?;
    let keep = contents.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);

    let tail = String::from_utf8_lossy(&contents[keep..]);
    if Record::from_json_line(&tail).is_ok() {
        warn!(path = %path.display(), "history: terminate unfinished record");
        file.seek(SeekFrom::End(0))?;
        file.write_all(b"\n")?;
    } else {
        warn!(path = %path.display(), bytes = contents.len() - keep, "history: drop torn record");
        file.set_len(keep as u64)?;
    }
    file.sync_all()?;
    Ok(())
}

fn read_records(path: &Path) -> HistoryResult<Vec<Record>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match Record::from_json_line(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(line = line_num + 1, "history: skip malformed record: {e}"),
        }
    }

    records.sort_by_key(|r| r.id);
    Ok(records)
}
