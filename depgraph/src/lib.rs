//! A region-level happens-before dependency engine for a task-based
//! parallel runtime.
//!
//! User code spawns fine-grained tasks that declare their memory footprint
//! through typed data accesses (read, write, read-write, concurrent,
//! reduction; each optionally weak). This crate computes the inter-task
//! happens-before graph from those declarations, and reports to its
//! collaborators ([`collab::Scheduler`], [`collab::CpuManager`]) the moment
//! a task's inputs are satisfied or its accesses become reclaimable. The
//! worker-thread pool, CPU binding, the ready-queue scheduler itself, the
//! task allocator and the CLI/bootstrap layer are all out of scope — this
//! crate only computes the graph and its derived readiness/removability
//! signals.
//!
//! The pipeline is [`registration`] → [`linking`] → [`propagation`] →
//! [`finalization`], tied together for outside callers by [`engine`]'s four
//! entry points.

pub mod access;
pub mod collab;
pub mod config;
pub mod engine;
pub mod error;
pub mod finalization;
pub mod instrument;
pub mod linking;
mod locking;
pub mod propagation;
pub mod registration;
mod scratch;
pub mod task;

pub use access::{AccessKind, AccessStatus, DataAccess, ReductionOp};
pub use config::EngineConfig;
pub use engine::{handle_enter_blocking, handle_exit_blocking, handle_task_removal, register_task_accesses, unregister_task_accesses};
pub use error::{fatal, ConflictError};
pub use instrument::{Instrument, NoopInstrument, TracingInstrument};
pub use region::Region;
pub use registration::register_task_access;
pub use scratch::DependencyData;
pub use task::{BottomMapEntry, Task, TaskAccessMaps, TaskDataAccesses};
