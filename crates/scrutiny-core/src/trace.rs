//! Process-wide tracing singleton.
//!
//! At most one [`TraceFn`] can be installed at a time, process-wide: tracing
//! is inherently global, and two tracers would trample each other's view.
//! The slot is independent of any [`Auditor`](crate::auditor::Auditor) —
//! every auditor's dispatch feeds the same installed tracer.
//!
//! Acquisition is a single locked compare-and-set returning a [`TraceToken`]
//! that proves ownership; release only takes effect while the token still
//! matches the holder, so a stale release is a no-op.
//!
//! While a tracer is installed, the dispatch core emits a [`TraceRecord`] at
//! each phase boundary of every enabled event, which is the in-process
//! equivalent of installing a whole-program trace function.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::errors::SingletonViolation;

/// A callback receiving dispatch-phase records for every audited event in
/// the process while it holds the tracing slot.
pub trait TraceFn: Send + Sync {
    /// Observe one dispatch-phase boundary.
    fn trace(&self, record: &TraceRecord);
}

/// Dispatch phase boundaries reported to the installed tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracePhase {
    /// Dispatch entered: the event became current, prehooks are about to run.
    Enter,
    /// All prehooks succeeded; the wrapped function is about to run.
    BodyStart,
    /// The wrapped function returned (or failed).
    BodyEnd,
    /// The posthook/cleanup phase finished; the event is no longer current.
    Exit,
}

/// One record delivered to the installed tracer.
#[derive(Debug, Clone)]
pub struct TraceRecord {
    /// Name of the event being dispatched.
    pub event: Arc<str>,
    /// Which phase boundary was crossed.
    pub phase: TracePhase,
}

/// Proof of tracing-slot ownership. Dropping the token releases the slot.
#[derive(Debug)]
pub struct TraceToken {
    id: u64,
}

struct Slot {
    id: u64,
    holder: String,
    tracer: Arc<dyn TraceFn>,
}

static SLOT: Mutex<Option<Slot>> = Mutex::new(None);
static SLOT_OCCUPIED: AtomicBool = AtomicBool::new(false);
static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Install `tracer` as the process trace function.
///
/// `holder` is a human-readable description used in the violation message
/// when a second acquisition is refused.
///
/// # Errors
///
/// Returns [`SingletonViolation`] when another tracer already holds the
/// slot. Between an `acquire` and its matching release no other `acquire`
/// can succeed.
pub fn acquire(
    tracer: Arc<dyn TraceFn>,
    holder: impl Into<String>,
) -> Result<TraceToken, SingletonViolation> {
    let mut slot = SLOT.lock();
    if let Some(current) = slot.as_ref() {
        return Err(SingletonViolation {
            holder: current.holder.clone(),
        });
    }
    let id = NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed);
    *slot = Some(Slot {
        id,
        holder: holder.into(),
        tracer,
    });
    SLOT_OCCUPIED.store(true, Ordering::Release);
    Ok(TraceToken { id })
}

/// Release the slot held by `token`. Equivalent to dropping the token.
pub fn release(token: TraceToken) {
    drop(token);
}

/// The currently installed tracer, if any.
#[must_use]
pub fn current_tracer() -> Option<Arc<dyn TraceFn>> {
    SLOT.lock().as_ref().map(|slot| Arc::clone(&slot.tracer))
}

/// Deliver a phase-boundary record to the installed tracer, if any.
pub(crate) fn emit(event: &Arc<str>, phase: TracePhase) {
    if !SLOT_OCCUPIED.load(Ordering::Acquire) {
        return;
    }
    let tracer = {
        let slot = SLOT.lock();
        slot.as_ref().map(|slot| Arc::clone(&slot.tracer))
    };
    if let Some(tracer) = tracer {
        tracer.trace(&TraceRecord {
            event: Arc::clone(event),
            phase,
        });
    }
}

impl Drop for TraceToken {
    fn drop(&mut self) {
        let mut slot = SLOT.lock();
        // Only the live holder clears the slot; a stale token is a no-op.
        if slot.as_ref().is_some_and(|current| current.id == self.id) {
            *slot = None;
            SLOT_OCCUPIED.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullTracer;

    impl TraceFn for NullTracer {
        fn trace(&self, _record: &TraceRecord) {}
    }

    // The slot is process-global, so the whole lifecycle lives in one test
    // to keep parallel unit tests from interfering with each other.
    #[test]
    fn test_slot_lifecycle() {
        assert!(current_tracer().is_none());

        let first = acquire(Arc::new(NullTracer), "first").expect("slot was free");
        assert!(current_tracer().is_some());

        let violation = acquire(Arc::new(NullTracer), "second").expect_err("slot is held");
        assert_eq!(violation.holder, "first");

        // Two threads race for the slot after the holder releases: exactly
        // one wins while both tokens-or-errors are still alive.
        release(first);
        let barrier = std::sync::Barrier::new(2);
        let results: Vec<Result<TraceToken, SingletonViolation>> =
            std::thread::scope(|scope| {
                let barrier = &barrier;
                let handles: Vec<_> = (0..2)
                    .map(|n| {
                        scope.spawn(move || {
                            barrier.wait();
                            acquire(Arc::new(NullTracer), format!("racer-{n}"))
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().expect("join")).collect()
            });
        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);

        // Dropping the winner's token releases the slot; a fresh acquire
        // succeeds.
        drop(results);
        let again = acquire(Arc::new(NullTracer), "again").expect("slot was released");

        // A stale token from an earlier hold must not evict the new holder.
        let stale = TraceToken { id: 0 };
        drop(stale);
        assert!(current_tracer().is_some());

        drop(again);
        assert!(current_tracer().is_none());
    }
}
