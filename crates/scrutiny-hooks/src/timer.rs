//! Wall-time measurement.

use std::time::{Duration, Instant};

use anyhow::Context as _;
use dashmap::DashMap;
use scrutiny_core::hook::{AnyValue, Hook, HookContext, LoggableHook};
use scrutiny_core::logger::AuditLogger;

/// Relatively high priority so the timer starts soon before, and stops soon
/// after, the wrapped function itself.
pub const TIMER_HOOK_PRIORITY: i32 = 8;

/// Accumulates wall time spent in each event.
///
/// The prehook context carries the start [`Instant`]; the measured span
/// therefore includes any hooks that run between the timer and the body,
/// which its priority keeps to a minimum.
#[derive(Debug, Default)]
pub struct TimerHook {
    times: DashMap<String, Duration>,
}

impl TimerHook {
    /// Create a hook with no accumulated time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total time spent in `event` since the last reset.
    #[must_use]
    pub fn time_in(&self, event: &str) -> Duration {
        self.times.get(event).map_or(Duration::ZERO, |entry| *entry)
    }

    /// All accumulated times, sorted by event name.
    #[must_use]
    pub fn times(&self) -> Vec<(String, Duration)> {
        let mut times: Vec<(String, Duration)> = self
            .times
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        times.sort();
        times
    }
}

impl Hook for TimerHook {
    fn priority(&self) -> i32 {
        TIMER_HOOK_PRIORITY
    }

    fn prehook(&self, _event: &str, _args: AnyValue<'_>) -> anyhow::Result<HookContext> {
        Ok(Box::new(Instant::now()))
    }

    fn posthook(
        &self,
        event: &str,
        _result: AnyValue<'_>,
        context: &mut HookContext,
    ) -> anyhow::Result<()> {
        let started = context
            .downcast_ref::<Instant>()
            .context("timer prehook context was not an Instant")?;
        let elapsed = started.elapsed();
        *self
            .times
            .entry(event.to_string())
            .or_insert(Duration::ZERO) += elapsed;
        Ok(())
    }

    fn reset(&self) {
        self.times.clear();
    }

    fn as_loggable(&self) -> Option<&dyn LoggableHook> {
        Some(self)
    }
}

impl LoggableHook for TimerHook {
    fn log_results(&self, logger: &dyn AuditLogger) {
        logger.info("TimerHook results:");
        for (event, time_in_event) in self.times() {
            logger.info(&format!(
                "    Time spent in {event}: {:.6}s",
                time_in_event.as_secs_f64()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrutiny_core::BufferLogger;

    #[test]
    fn test_accumulates_elapsed_time() {
        let hook = TimerHook::new();
        let mut context = hook
            .prehook("test.slow", AnyValue::new(&()))
            .expect("prehook");
        std::thread::sleep(Duration::from_millis(5));
        hook.posthook("test.slow", AnyValue::new(&()), &mut context)
            .expect("posthook");

        assert!(hook.time_in("test.slow") >= Duration::from_millis(5));
        assert_eq!(hook.time_in("test.other"), Duration::ZERO);
    }

    #[test]
    fn test_reset_clears_times() {
        let hook = TimerHook::new();
        let mut context = hook.prehook("test.x", AnyValue::new(&())).expect("prehook");
        hook.posthook("test.x", AnyValue::new(&()), &mut context)
            .expect("posthook");
        hook.reset();
        assert!(hook.times().is_empty());
    }

    #[test]
    fn test_log_results_names_each_event() {
        let hook = TimerHook::new();
        let mut context = hook.prehook("test.y", AnyValue::new(&())).expect("prehook");
        hook.posthook("test.y", AnyValue::new(&()), &mut context)
            .expect("posthook");

        let logger = BufferLogger::new();
        hook.log_results(&logger);
        let lines = logger.lines();
        assert_eq!(lines[0], "TimerHook results:");
        assert!(lines[1].starts_with("    Time spent in test.y: "));
    }

    #[test]
    fn test_foreign_context_is_an_error() {
        let hook = TimerHook::new();
        let mut context: HookContext = Box::new(());
        let result = hook.posthook("test.z", AnyValue::new(&()), &mut context);
        assert!(result.is_err());
    }
}
