//! The incremental sync engine: feed pagination, pending-queue reconciliation
//! and the per-invocation full/minimal cycle decision.

pub mod outcome;
pub mod pagination;
pub mod reconciler;
pub mod scheduler;


pub use outcome::{
    CycleKind, CycleOutcome, CycleReport, DispatchAction, DispatchOutcome, DrainReport,
    SkipReason, WalkReport,
};
pub use pagination::PaginationDriver;
pub use reconciler::QueueReconciler;
pub use scheduler::{Clock, Collaborators, CycleScheduler, FixedClock, SystemClock};
