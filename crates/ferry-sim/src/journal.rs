//! File-backed journal sink and journal reader.

use std::fs::File;
use std::io::{BufRead, BufReader, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::warn;

use ferry_kernel::{Event, EventSink};

/// Default journal file name.
pub const DEFAULT_JOURNAL: &str = "proj2.out";

/// Writes one journal line per event, flushed at every newline.
///
/// The file is truncated when the journal is opened.
pub struct FileJournal {
    path: PathBuf,
    writer: Mutex<LineWriter<File>>,
}

impl std::fmt::Debug for FileJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileJournal")
            .field("path", &self.path)
            .finish()
    }
}

impl FileJournal {
    /// Create (or truncate) the journal at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .with_context(|| format!("cannot open journal {}", path.display()))?;
        Ok(Self {
            path,
            writer: Mutex::new(LineWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for FileJournal {
    fn record(&self, event: &Event) {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(writer, "{event}") {
            warn!(path = %self.path.display(), sequence = event.sequence, error = %e, "Journal write failed");
        }
    }
}

/// Parse every line of a journal file back into events.
///
/// Blank lines are skipped; any other unparseable line is an error naming its
/// line number.
pub fn read_journal(path: impl AsRef<Path>) -> Result<Vec<Event>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("cannot read journal {}", path.display()))?;

    let mut events = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("{}: read failed", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let event = line
            .parse::<Event>()
            .with_context(|| format!("{}:{}: malformed journal line", path.display(), index + 1))?;
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_kernel::{DockOccupancy, EventKind, PassengerTag, PassengerType};

    #[test]
    fn test_file_journal_writes_readable_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_JOURNAL);
        let journal = FileJournal::create(&path).unwrap();

        let hacker = PassengerTag::new(PassengerType::Hacker, 1);
        journal.record(&Event::new(1, hacker, EventKind::Starts, DockOccupancy::default()));
        journal.record(&Event::new(2, hacker, EventKind::Waits, DockOccupancy::new(1, 0)));

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "1: HACK 1: starts\n2: HACK 1: waits: 1: 0\n");

        let events = read_journal(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].occupancy, Some(DockOccupancy::new(1, 0)));
    }

    #[test]
    fn test_create_truncates_previous_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.out");
        std::fs::write(&path, "stale contents\n").unwrap();

        FileJournal::create(&path).unwrap();
        assert!(read_journal(&path).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_line_names_its_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.out");
        std::fs::write(&path, "1: HACK 1: starts\nnot a journal line\n").unwrap();

        let err = read_journal(&path).unwrap_err();
        assert!(format!("{err:#}").contains(":2:"));
    }
}
