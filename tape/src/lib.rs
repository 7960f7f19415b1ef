//! The checkpoint log ("tape").
//!
//! A plain-text, append-only file with one record per line:
//!
//! ```text
//! BLOCK <height> <blockHash> <prevBlockHash> <unixTimestamp>
//! ```
//!
//! A record for height N is appended only after block N has been fully
//! processed, so the last complete line always names a block that is safe to
//! resume after. Readers ignore a torn final line left by a crash mid-write.
//!
//! Two access styles are offered: the free functions [`write`], [`get`] and
//! [`last_record`] operate directly on a path, and [`Tape`] keeps an
//! in-memory cursor over the latest durable record so hot-path reads never
//! touch the filesystem.

mod error;

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use hummingbird_types::{CheckpointRecord, Height};

pub use error::TapeError;

/// Default tape location when the configuration does not name one.
pub const DEFAULT_TAPE_PATH: &str = "tape.txt";

/// Initial window scanned backwards from the end of the file.
const TAIL_WINDOW: u64 = 4096;

/// Append `record` as a newline-terminated line and fsync it.
///
/// The file (and any missing parent directories) is created on first use.
/// If a previous crash left a partial last line, it is terminated first so
/// the new record starts on a fresh line.
pub fn write(record: &CheckpointRecord, path: impl AsRef<Path>) -> Result<(), TapeError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| TapeError::io(path, e))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .read(true)
        .open(path)
        .map_err(|e| TapeError::io(path, e))?;

    let mut line = String::with_capacity(160);
    if ends_with_partial_line(&mut file).map_err(|e| TapeError::io(path, e))? {
        tracing::warn!(path = %path.display(), "terminating torn tape line");
        line.push('\n');
    }
    line.push_str(&record.to_string());
    line.push('\n');

    file.write_all(line.as_bytes())
        .and_then(|_| file.sync_data())
        .map_err(|e| TapeError::io(path, e))?;

    tracing::trace!(height = record.height, hash = %record.hash, "checkpoint written");
    Ok(())
}

/// Height of the most recent complete record, or `None` when the tape is
/// absent or holds no records.
pub fn get(path: impl AsRef<Path>) -> Result<Option<Height>, TapeError> {
    Ok(last_record(path)?.map(|r| r.height))
}

/// The most recent complete record, scanning backwards from the end.
pub fn last_record(path: impl AsRef<Path>) -> Result<Option<CheckpointRecord>, TapeError> {
    let path = path.as_ref();
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(TapeError::io(path, e)),
    };
    scan_tail(&mut file).map_err(|e| TapeError::io(path, e))
}

fn ends_with_partial_line(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Walk backwards in growing windows until a parseable, newline-terminated
/// record is found or the whole file has been examined.
fn scan_tail(file: &mut File) -> std::io::Result<Option<CheckpointRecord>> {
    let len = file.metadata()?.len();
    let mut window = TAIL_WINDOW.min(len);

    while window > 0 {
        let start = len - window;
        file.seek(SeekFrom::Start(start))?;
        let mut buf = Vec::with_capacity(window as usize);
        Read::by_ref(file).take(window).read_to_end(&mut buf)?;

        let text = String::from_utf8_lossy(&buf);
        // Only newline-terminated lines are complete.
        let complete = match text.rfind('\n') {
            Some(idx) => &text[..idx],
            None => "",
        };
        let mut lines: Vec<&str> = complete.split('\n').collect();
        // The first line of a partial window may be cut off mid-record.
        if start > 0 && !lines.is_empty() {
            lines.remove(0);
        }
        if let Some(record) = lines
            .iter()
            .rev()
            .find_map(|l| l.trim().parse::<CheckpointRecord>().ok())
        {
            return Ok(Some(record));
        }

        if window == len {
            break;
        }
        window = (window * 2).min(len);
    }
    Ok(None)
}

/// A tape file plus an in-memory cursor on its latest record.
///
/// The cursor is seeded from disk on [`Tape::open`] and only advances after
/// a record has been durably written, so [`Tape::height`] always reflects
/// the last write that would survive a restart.
#[derive(Debug)]
pub struct Tape {
    path: PathBuf,
    cursor: Mutex<Option<CheckpointRecord>>,
}

impl Tape {
    /// Open (without creating) the tape at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TapeError> {
        let path = path.into();
        let cursor = last_record(&path)?;
        if let Some(record) = &cursor {
            tracing::info!(path = %path.display(), height = record.height, "resuming from tape");
        }
        Ok(Self {
            path,
            cursor: Mutex::new(cursor),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Height of the latest durable record.
    pub fn height(&self) -> Option<Height> {
        self.last().map(|r| r.height)
    }

    /// The latest durable record.
    pub fn last(&self) -> Option<CheckpointRecord> {
        self.cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Durably append `record` and advance the cursor.
    ///
    /// Re-recording the current height is accepted (replays after a crash
    /// do this); recording a lower height is a [`TapeError::Regression`].
    pub fn append(&self, record: &CheckpointRecord) -> Result<(), TapeError> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = cursor.as_ref().map(|r| r.height) {
            if record.height < current {
                return Err(TapeError::Regression {
                    current,
                    attempted: record.height,
                });
            }
        }
        write(record, &self.path)?;
        *cursor = Some(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hummingbird_types::{BlockHash, Timestamp};

    fn record(height: Height) -> CheckpointRecord {
        CheckpointRecord {
            height,
            hash: BlockHash::new([height as u8; 32]),
            prev_hash: BlockHash::new([height.wrapping_sub(1) as u8; 32]),
            timestamp: Timestamp::new(1_574_304_292 + height),
        }
    }

    #[test]
    fn torn_last_line_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tape.txt");
        write(&record(5), &path).unwrap();
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"BLOCK 6 0000").unwrap();
        drop(f);

        assert_eq!(get(&path).unwrap(), Some(5));

        // The next write starts on a fresh line.
        write(&record(6), &path).unwrap();
        assert_eq!(get(&path).unwrap(), Some(6));
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn finds_record_beyond_first_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tape.txt");
        write(&record(1), &path).unwrap();
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        let junk = "# comment line that is not a record\n".repeat(400);
        f.write_all(junk.as_bytes()).unwrap();
        drop(f);

        assert!(fs::metadata(&path).unwrap().len() > TAIL_WINDOW * 2);
        assert_eq!(get(&path).unwrap(), Some(1));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/tape.txt");
        write(&record(0), &path).unwrap();
        assert_eq!(get(&path).unwrap(), Some(0));
    }

    #[test]
    fn cursor_rejects_regression_but_accepts_replay() {
        let dir = tempfile::tempdir().unwrap();
        let tape = Tape::open(dir.path().join("tape.txt")).unwrap();
        assert_eq!(tape.height(), None);

        tape.append(&record(10)).unwrap();
        tape.append(&record(10)).unwrap();
        assert_eq!(tape.height(), Some(10));

        let err = tape.append(&record(9)).unwrap_err();
        assert!(matches!(
            err,
            TapeError::Regression {
                current: 10,
                attempted: 9
            }
        ));
        assert_eq!(tape.height(), Some(10));
    }

    #[test]
    fn reopen_restores_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tape.txt");
        {
            let tape = Tape::open(&path).unwrap();
            tape.append(&record(41)).unwrap();
            tape.append(&record(42)).unwrap();
        }
        let tape = Tape::open(&path).unwrap();
        assert_eq!(tape.height(), Some(42));
        assert_eq!(tape.last(), Some(record(42)));
    }
}
