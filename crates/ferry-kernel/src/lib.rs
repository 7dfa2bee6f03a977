//! Ferry Kernel: dock admission, group formation and the captain/crew
//! crossing rendezvous for the hackers-and-surfers ferry.
//!
//! Passengers arrive at a dock of bounded capacity, wait until four of them
//! can leave together (four hackers, four surfers, or two of each), cross,
//! and disembark with the captain last off the boat. One crossing is in
//! flight at a time.

pub mod actors;
pub mod audit;
pub mod config;
pub mod dock;
pub mod error;
pub mod events;
pub mod formation;
pub mod gate;
pub mod journey;
pub mod messages;
pub mod passenger;
pub mod rendezvous;

pub use audit::{audit_journal, AuditReport, CrossingRecord};
pub use config::DockConfig;
pub use dock::{CaptainOrders, Dock, DockBuilder, DockSnapshot};
pub use error::FerryError;
pub use events::{Event, EventKind, EventSink, MemoryJournal};
pub use formation::{DockOccupancy, GroupComposition};
pub use messages::{CrossingBoarded, CrossingLanded, LedgerReport, ReportLedger};
pub use passenger::{Passenger, PassengerTag, PassengerType, Role, Voyage};
