//! Acton-reactive actors observing the dock.
//!
//! ```text
//! Captain (passenger task)
//!   ├─ CrossingBoarded ─→ CrossingLedger
//!   └─ CrossingLanded  ─→ CrossingLedger
//! Harness
//!   └─ ReportLedger ─→ CrossingLedger ─→ LedgerReport (mpsc)
//! ```

mod ledger;

pub use ledger::{CrossingLedger, CrossingLedgerState};
