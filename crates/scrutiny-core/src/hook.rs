//! Hook contract.
//!
//! Defines the [`Hook`] trait every observer must satisfy, plus the narrower
//! optional capabilities — [`CleanupHook`] and [`LoggableHook`] — that are
//! discovered through capability probes rather than downcasting.
//!
//! A hook's `prehook` runs before the wrapped function and returns an opaque
//! [`HookContext`] that is handed back to `posthook` and `cleanup` for the
//! same invocation. Hooks are synchronous; a hook that blocks stalls the
//! whole dispatch chain.

use std::any::Any;
use std::fmt;

use crate::logger::AuditLogger;

/// Opaque per-invocation value produced by a hook's `prehook` and consumed by
/// its `posthook`/`cleanup`. Hooks that carry no state return `Box::new(())`.
pub type HookContext = Box<dyn Any + Send>;

/// Type-erased view of a value passed through the dispatch core: the wrapped
/// function's argument (in prehooks) or its result (in posthooks).
///
/// Supports both downcasting back to the concrete type and `Debug`
/// formatting, so statistic hooks can render payloads without knowing their
/// type while checking hooks can inspect them precisely.
#[derive(Clone, Copy)]
pub struct AnyValue<'a> {
    value: &'a dyn DebugAny,
}

impl<'a> AnyValue<'a> {
    /// Erase a reference to a concrete value.
    pub fn new<T: fmt::Debug + 'static>(value: &'a T) -> Self {
        Self { value }
    }

    /// Recover the concrete value, if `T` is its actual type.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&'a T> {
        self.value.as_any().downcast_ref()
    }
}

impl fmt::Debug for AnyValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

/// Object-safe bridge between `Debug` and `Any`.
trait DebugAny: fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: fmt::Debug + 'static> DebugAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A pluggable observer bracketing audited calls.
///
/// Prehooks run in ascending `(priority, registration index)` order; the
/// posthook/cleanup phase reuses the *same* order (not reversed). A high
/// priority therefore places a hook closest to the wrapped function on the
/// prehook side and last on the posthook side — tracers rely on this to
/// bracket the innermost hooks as tightly as possible.
///
/// Errors raised by `prehook` abort the remaining prehooks and the wrapped
/// function but never the cleanup phase; errors raised by `posthook` are
/// collected into the aggregated [`EventError::Hooks`](crate::errors::EventError)
/// without stopping the other hooks.
pub trait Hook: Send + Sync {
    /// Execution priority. Lower runs earlier among prehooks. Default: 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Whether this hook participates in dispatch. Disabled hooks are
    /// skipped entirely. Default: true.
    fn enabled(&self) -> bool {
        true
    }

    /// Run before the wrapped function. Returns the per-invocation context
    /// handed back to `posthook` and `cleanup`.
    fn prehook(&self, event: &str, args: AnyValue<'_>) -> anyhow::Result<HookContext>;

    /// Run after the wrapped function succeeded. Skipped when the function
    /// or an earlier prehook failed (use [`CleanupHook`] to observe those).
    fn posthook(
        &self,
        event: &str,
        result: AnyValue<'_>,
        context: &mut HookContext,
    ) -> anyhow::Result<()>;

    /// Clear any accumulated state. Called between audit sessions.
    fn reset(&self) {}

    /// Capability probe: a hook that wants to observe every invocation end,
    /// including failed and cancelled ones, returns `Some(self)`.
    fn as_cleanup(&self) -> Option<&dyn CleanupHook> {
        None
    }

    /// Capability probe: a hook that can report accumulated results returns
    /// `Some(self)`.
    fn as_loggable(&self) -> Option<&dyn LoggableHook> {
        None
    }
}

/// Optional capability: runs at the end of every invocation whose prehook
/// ran, whether the wrapped function returned, failed, or was cancelled.
pub trait CleanupHook: Hook {
    /// Consume the per-invocation context. `error` is the failure captured
    /// from a prehook or the wrapped function, if any; posthook failures are
    /// not routed here.
    fn cleanup(
        &self,
        event: &str,
        context: HookContext,
        error: Option<&anyhow::Error>,
    ) -> anyhow::Result<()>;
}

/// Optional capability: report accumulated results to an audit sink.
pub trait LoggableHook: Hook {
    /// Write the hook's accumulated results to `logger`.
    fn log_results(&self, logger: &dyn AuditLogger);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_value_downcasts_to_concrete_type() {
        let value = ("Alice".to_string(), 3_u32);
        let erased = AnyValue::new(&value);
        let recovered: &(String, u32) = erased.downcast_ref().expect("same type");
        assert_eq!(recovered.1, 3);
        assert!(erased.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_any_value_debug_renders_payload() {
        let value = vec![1, 2, 3];
        let erased = AnyValue::new(&value);
        assert_eq!(format!("{erased:?}"), "[1, 2, 3]");
    }

    struct MinimalHook;

    impl Hook for MinimalHook {
        fn prehook(&self, _event: &str, _args: AnyValue<'_>) -> anyhow::Result<HookContext> {
            Ok(Box::new(()))
        }

        fn posthook(
            &self,
            _event: &str,
            _result: AnyValue<'_>,
            _context: &mut HookContext,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_defaults_for_minimal_hook() {
        let hook = MinimalHook;
        assert_eq!(hook.priority(), 0);
        assert!(hook.enabled());
        assert!(hook.as_cleanup().is_none());
        assert!(hook.as_loggable().is_none());
    }
}
