//! Ferry Sim: runs the hackers-and-surfers ferry end to end.
//!
//! This crate drives `ferry-kernel` the way a real run would:
//! - Two generators spawn hackers and surfers with random arrival gaps
//! - Every journal line goes to a file and to memory
//! - The journal is audited and summarised in a JSON-serialisable report

pub mod generator;
pub mod journal;
pub mod results;
pub mod simulation;

pub use generator::PassengerGenerator;
pub use journal::{read_journal, FileJournal, DEFAULT_JOURNAL};
pub use results::SimulationReport;
pub use simulation::{load_config, SimulationRunner};
