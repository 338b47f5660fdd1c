//! Scheduler: the cadence table, per-tenant-per-task serialization, and
//! the dispatch function for each periodic task, spec.md §4.L.

pub mod beat;
pub mod cadence;
pub mod error;
pub mod outcome;
pub mod ports;
pub mod tasks;

pub use beat::Beat;
pub use cadence::{CadenceSpec, LockScope, TaskKind, CADENCE_TABLE};
pub use error::{Result, SchedulerError};
pub use outcome::{TaskOutcome, TaskStatus};
