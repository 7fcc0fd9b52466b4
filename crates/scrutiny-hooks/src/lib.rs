//! # scrutiny-hooks
//!
//! Ready-made hook implementations for the
//! [`scrutiny-core`](scrutiny_core) dispatch engine:
//!
//! - [`CounterHook`]: per-event invocation counts
//! - [`TimerHook`]: accumulated wall time per event
//! - [`TracingHook`]: adapter installing a [`TraceFn`](scrutiny_core::trace::TraceFn)
//!   into the process-wide tracing slot for the duration of an audited call
//!
//! All hooks here hold in-memory state only; the loggable ones format their
//! accumulated results to whatever sink the owning auditor fans out to.

#![deny(unsafe_code)]

pub mod counter;
pub mod timer;
pub mod tracing;

pub use counter::CounterHook;
pub use timer::TimerHook;
pub use tracing::TracingHook;
