//! Error types for the dispatch core.
//!
//! Structured errors built on [`thiserror`]:
//!
//! - [`AuditError`]: registry failures (duplicate/unknown event names)
//! - [`NoActiveEvent`]: current-event query outside any dispatch
//! - [`SingletonViolation`]: second tracer attempting to claim the process slot
//! - [`EventError`]: what a wrapped call surfaces — either the function's (or a
//!   prehook's) own failure, or the aggregated posthook/cleanup failures
//!
//! Hook-raised errors are carried as opaque [`anyhow::Error`] values; the
//! aggregate never drops any of them.

use std::fmt;

use thiserror::Error;

/// Registry errors raised by [`Auditor`](crate::auditor::Auditor) operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// An event with this name has already been registered.
    #[error("an event named `{0}` is already registered")]
    DuplicateEvent(String),

    /// No event with this name is registered.
    #[error("no event named `{0}` is registered")]
    UnknownEvent(String),
}

/// Raised when querying the current event while no audited call is executing
/// on this logical thread of control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no audited event is currently executing")]
pub struct NoActiveEvent;

/// Raised when a tracer tries to claim the process-wide tracing slot while
/// another tracer already holds it.
#[derive(Debug, Error)]
#[error("a tracer is already installed (held by {holder})")]
pub struct SingletonViolation {
    /// Description of the current slot holder.
    pub holder: String,
}

/// The hook phase in which a failure was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// The hook's `prehook` raised.
    Prehook,
    /// The hook's `posthook` raised.
    Posthook,
    /// The hook's `cleanup` raised.
    Cleanup,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prehook => f.write_str("prehook"),
            Self::Posthook => f.write_str("posthook"),
            Self::Cleanup => f.write_str("cleanup"),
        }
    }
}

/// A single hook failure collected during the posthook/cleanup phase.
#[derive(Debug)]
pub struct HookFailure {
    /// Index of the failing hook in the event's registration order.
    pub hook_index: usize,
    /// Phase in which the hook raised.
    pub phase: HookPhase,
    /// The error the hook raised.
    pub error: anyhow::Error,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of hook #{}: {}", self.phase, self.hook_index, self.error)
    }
}

/// What a wrapped call surfaces when dispatch does not complete cleanly.
///
/// The two variants are deliberately distinct so callers can tell "the
/// function itself failed" apart from "one or more hooks failed while
/// observing it". When both happen in one invocation, [`EventError::Hooks`]
/// wins: the aggregation step runs inside the same protective block that
/// would otherwise let the original failure propagate. The superseded error
/// is still visible to hooks through `cleanup`.
#[derive(Debug, Error)]
pub enum EventError {
    /// The wrapped function (or one of the prehooks) failed.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),

    /// One or more hooks failed during the posthook/cleanup phase. Carries
    /// every collected failure; none are dropped.
    #[error("{}", format_failures(.0))]
    Hooks(Vec<HookFailure>),
}

impl EventError {
    /// The collected posthook/cleanup failures, if this is the aggregated
    /// variant.
    #[must_use]
    pub fn failures(&self) -> Option<&[HookFailure]> {
        match self {
            Self::Failed(_) => None,
            Self::Hooks(failures) => Some(failures),
        }
    }
}

fn format_failures(failures: &[HookFailure]) -> String {
    let mut message = format!(
        "{} hook failure(s) during posthook/cleanup",
        failures.len()
    );
    for failure in failures {
        message.push_str("\n  ");
        message.push_str(&failure.to_string());
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_phase_display() {
        assert_eq!(HookPhase::Prehook.to_string(), "prehook");
        assert_eq!(HookPhase::Posthook.to_string(), "posthook");
        assert_eq!(HookPhase::Cleanup.to_string(), "cleanup");
    }

    #[test]
    fn test_aggregate_display_lists_every_failure() {
        let error = EventError::Hooks(vec![
            HookFailure {
                hook_index: 0,
                phase: HookPhase::Posthook,
                error: anyhow::anyhow!("first"),
            },
            HookFailure {
                hook_index: 2,
                phase: HookPhase::Cleanup,
                error: anyhow::anyhow!("second"),
            },
        ]);
        let rendered = error.to_string();
        assert!(rendered.starts_with("2 hook failure(s)"));
        assert!(rendered.contains("posthook of hook #0: first"));
        assert!(rendered.contains("cleanup of hook #2: second"));
    }

    #[test]
    fn test_failed_is_transparent() {
        let error = EventError::Failed(anyhow::anyhow!("boom"));
        assert_eq!(error.to_string(), "boom");
        assert!(error.failures().is_none());
    }

    #[test]
    fn test_duplicate_event_message_names_the_event() {
        let error = AuditError::DuplicateEvent("test.foo".to_string());
        assert!(error.to_string().contains("test.foo"));
    }
}
