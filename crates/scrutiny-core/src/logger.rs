//! Audit logging sinks.
//!
//! An [`Auditor`](crate::auditor::Auditor) owns an opaque [`AuditLogger`]
//! used for result-logging fan-out. While an audit session is open, the
//! session's logger is also pushed onto a process-visible stack so that
//! hook code running deep inside a wrapped function can reach the sink of
//! the innermost active session via [`current_audit_logger`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Opaque sink for accumulated hook results.
pub trait AuditLogger: Send + Sync {
    /// Write one line of output.
    fn info(&self, message: &str);
}

/// Default sink: forwards to [`tracing::info!`] under the `scrutiny` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl AuditLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "scrutiny", "{message}");
    }
}

/// In-memory sink capturing every line, for tests and ad-hoc dumps.
#[derive(Debug, Default)]
pub struct BufferLogger {
    lines: Mutex<Vec<String>>,
}

impl BufferLogger {
    /// Create an empty buffer sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line written so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Discard all captured lines.
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl AuditLogger for BufferLogger {
    fn info(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }
}

struct StackEntry {
    id: u64,
    logger: Arc<dyn AuditLogger>,
}

static LOGGER_STACK: Mutex<Vec<StackEntry>> = Mutex::new(Vec::new());
static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// The logger of the innermost active audit session, if any.
#[must_use]
pub fn current_audit_logger() -> Option<Arc<dyn AuditLogger>> {
    LOGGER_STACK
        .lock()
        .last()
        .map(|entry| Arc::clone(&entry.logger))
}

/// Push a session logger. Returns the id used to remove it again.
pub(crate) fn push_logger(logger: Arc<dyn AuditLogger>) -> u64 {
    let id = NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed);
    LOGGER_STACK.lock().push(StackEntry { id, logger });
    id
}

/// Remove the entry pushed under `id`. Sessions may be dropped out of order;
/// removal targets the session's own entry, not whatever is on top.
pub(crate) fn remove_logger(id: u64) {
    LOGGER_STACK.lock().retain(|entry| entry.id != id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_logger_captures_lines() {
        let logger = BufferLogger::new();
        logger.info("one");
        logger.info("two");
        assert_eq!(logger.lines(), vec!["one", "two"]);
        logger.clear();
        assert!(logger.lines().is_empty());
    }

    // Single test for the global stack so parallel unit tests in this
    // binary cannot interleave pushes and pops.
    #[test]
    fn test_logger_stack_lifecycle() {
        let first: Arc<dyn AuditLogger> = Arc::new(BufferLogger::new());
        let second: Arc<dyn AuditLogger> = Arc::new(BufferLogger::new());

        let first_id = push_logger(Arc::clone(&first));
        let second_id = push_logger(Arc::clone(&second));
        let top = current_audit_logger().expect("stack is non-empty");
        assert!(Arc::ptr_eq(&top, &second));

        // Out-of-order removal leaves the other entry in place.
        remove_logger(first_id);
        let top = current_audit_logger().expect("stack is non-empty");
        assert!(Arc::ptr_eq(&top, &second));

        remove_logger(second_id);
        // Duplicate removal is a no-op.
        remove_logger(second_id);
    }
}
