//! Lifecycle events and the sequenced journal they are written to.
//!
//! Every emission takes the journal lock, bumps the sequence number and hands
//! the event to the sink while still holding the lock, so sink order always
//! equals sequence order. A captain may reserve the lock across group
//! formation to guarantee its "boards" line comes first.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex as StdMutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::formation::{DockOccupancy, OccupancyBoard};
use crate::passenger::{PassengerTag, PassengerType};

/// What happened to a passenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Starts,
    LeavesQueue,
    IsBack,
    Waits,
    Boards,
    MemberExits,
    CaptainExits,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        Self::Starts,
        Self::LeavesQueue,
        Self::IsBack,
        Self::Waits,
        Self::Boards,
        Self::MemberExits,
        Self::CaptainExits,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Starts => "starts",
            Self::LeavesQueue => "leaves queue",
            Self::IsBack => "is back",
            Self::Waits => "waits",
            Self::Boards => "boards",
            Self::MemberExits => "member exits",
            Self::CaptainExits => "captain exits",
        }
    }

    /// Whether the journal line carries a dock snapshot.
    pub fn carries_occupancy(&self) -> bool {
        !matches!(self, Self::Starts | Self::IsBack)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EventKind {
    type Err = ParseEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label() == s)
            .ok_or_else(|| ParseEventError(format!("unknown event kind '{s}'")))
    }
}

/// One journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub sequence: u64,
    pub passenger: PassengerTag,
    pub kind: EventKind,
    /// Dock snapshot at emission time, for dock-related events only
    pub occupancy: Option<DockOccupancy>,
}

impl Event {
    pub fn new(
        sequence: u64,
        passenger: PassengerTag,
        kind: EventKind,
        occupancy: DockOccupancy,
    ) -> Self {
        Self {
            sequence,
            passenger,
            kind,
            occupancy: kind.carries_occupancy().then_some(occupancy),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.sequence, self.passenger, self.kind)?;
        if let Some(occupancy) = self.occupancy {
            write!(f, ": {}: {}", occupancy.hackers, occupancy.surfers)?;
        }
        Ok(())
    }
}

/// A journal line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed journal line: {0}")]
pub struct ParseEventError(String);

impl FromStr for Event {
    type Err = ParseEventError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim().split(':').map(str::trim).collect();
        let number = |field: &str| {
            field
                .parse::<u64>()
                .map_err(|_| ParseEventError(format!("'{field}' is not a number in '{line}'")))
        };

        let (sequence, who, kind, occupancy) = match fields.as_slice() {
            [sequence, who, kind] => (*sequence, *who, *kind, None),
            [sequence, who, kind, hackers, surfers] => (
                *sequence,
                *who,
                *kind,
                Some(DockOccupancy::new(
                    number(hackers)? as usize,
                    number(surfers)? as usize,
                )),
            ),
            _ => return Err(ParseEventError(line.to_string())),
        };

        let kind: EventKind = kind.parse()?;
        if kind.carries_occupancy() != occupancy.is_some() {
            return Err(ParseEventError(format!(
                "'{kind}' has the wrong number of fields in '{line}'"
            )));
        }

        Ok(Self {
            sequence: number(sequence)?,
            passenger: who.parse()?,
            kind,
            occupancy,
        })
    }
}

impl FromStr for PassengerTag {
    type Err = ParseEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, id) = s
            .split_once(' ')
            .ok_or_else(|| ParseEventError(format!("'{s}' is not a passenger")))?;
        let kind = match label {
            "HACK" => PassengerType::Hacker,
            "SERF" => PassengerType::Surfer,
            other => return Err(ParseEventError(format!("unknown passenger type '{other}'"))),
        };
        let id = id
            .trim()
            .parse()
            .map_err(|_| ParseEventError(format!("'{id}' is not a passenger id")))?;
        Ok(PassengerTag::new(kind, id))
    }
}

/// Append-only destination for journal lines.
///
/// Called with the journal lock held; implementations must not block on
/// anything owned by the dock.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &Event);
}

impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn record(&self, event: &Event) {
        self.0.record(event);
        self.1.record(event);
    }
}

/// In-memory journal, cheap to clone and inspect after a run.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    events: Arc<StdMutex<Vec<Event>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemoryJournal {
    fn record(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

/// Sequenced, serialized access to the sink.
pub struct EventLog {
    sequence: Arc<Mutex<u64>>,
    sink: Arc<dyn EventSink>,
    board: Arc<OccupancyBoard>,
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl EventLog {
    pub fn new(sink: Arc<dyn EventSink>, board: Arc<OccupancyBoard>) -> Self {
        Self {
            sequence: Arc::new(Mutex::new(0)),
            sink,
            board,
        }
    }

    /// Write one event, returning its sequence number.
    pub async fn emit(&self, passenger: PassengerTag, kind: EventKind) -> u64 {
        let mut sequence = self.sequence.lock().await;
        *sequence += 1;
        let event = Event::new(*sequence, passenger, kind, self.board.snapshot());
        self.sink.record(&event);
        event.sequence
    }

    /// Hold the journal until the returned cursor writes its event.
    pub async fn reserve(&self) -> EventCursor {
        EventCursor {
            sequence: self.sequence.clone().lock_owned().await,
            sink: self.sink.clone(),
            board: self.board.clone(),
        }
    }

    /// Events written so far.
    pub async fn emitted(&self) -> u64 {
        *self.sequence.lock().await
    }
}

/// Exclusive claim on the next journal line.
pub struct EventCursor {
    sequence: OwnedMutexGuard<u64>,
    sink: Arc<dyn EventSink>,
    board: Arc<OccupancyBoard>,
}

impl fmt::Debug for EventCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCursor")
            .field("next", &(*self.sequence + 1))
            .finish()
    }
}

impl EventCursor {
    /// Write the reserved event and release the journal.
    pub fn emit(mut self, passenger: PassengerTag, kind: EventKind) -> u64 {
        *self.sequence += 1;
        let event = Event::new(*self.sequence, passenger, kind, self.board.snapshot());
        self.sink.record(&event);
        event.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn hacker(id: u32) -> PassengerTag {
        PassengerTag::new(PassengerType::Hacker, id)
    }

    #[test]
    fn test_display_matches_journal_layout() {
        let event = Event::new(3, hacker(1), EventKind::Waits, DockOccupancy::new(1, 2));
        assert_eq!(event.to_string(), "3: HACK 1: waits: 1: 2");

        let event = Event::new(
            1,
            PassengerTag::new(PassengerType::Surfer, 4),
            EventKind::Starts,
            DockOccupancy::new(1, 2),
        );
        assert_eq!(event.to_string(), "1: SERF 4: starts");
    }

    #[test]
    fn test_parse_accepts_written_lines() {
        let event: Event = "12: SERF 3: member exits: 0: 1".parse().unwrap();
        assert_eq!(event.sequence, 12);
        assert_eq!(event.passenger, PassengerTag::new(PassengerType::Surfer, 3));
        assert_eq!(event.kind, EventKind::MemberExits);
        assert_eq!(event.occupancy, Some(DockOccupancy::new(0, 1)));

        let event: Event = "7: HACK 2: is back".parse().unwrap();
        assert_eq!(event.occupancy, None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Event>().is_err());
        assert!("1: PIRATE 1: starts".parse::<Event>().is_err());
        assert!("1: HACK 1: sails".parse::<Event>().is_err());
        assert!("1: HACK 1: waits".parse::<Event>().is_err());
        assert!("1: HACK 1: starts: 0: 0".parse::<Event>().is_err());
        assert!("x: HACK 1: starts".parse::<Event>().is_err());
    }

    #[tokio::test]
    async fn test_sequence_is_contiguous() {
        let journal = MemoryJournal::new();
        let log = EventLog::new(Arc::new(journal.clone()), Arc::new(OccupancyBoard::default()));

        for id in 1..=3 {
            log.emit(hacker(id), EventKind::Starts).await;
        }

        let sequences: Vec<u64> = journal.events().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(log.emitted().await, 3);
    }

    #[tokio::test]
    async fn test_reserved_cursor_goes_first() {
        let journal = MemoryJournal::new();
        let log = Arc::new(EventLog::new(
            Arc::new(journal.clone()),
            Arc::new(OccupancyBoard::default()),
        ));

        let cursor = log.reserve().await;
        let other = {
            let log = log.clone();
            tokio::spawn(async move { log.emit(hacker(2), EventKind::Starts).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(journal.is_empty(), "nobody may write while the cursor is held");

        assert_eq!(cursor.emit(hacker(1), EventKind::Boards), 1);
        assert_eq!(other.await.unwrap(), 2);
        assert_eq!(journal.events()[0].kind, EventKind::Boards);
    }
}
