//! Invocation counting.

use dashmap::DashMap;
use scrutiny_core::hook::{AnyValue, Hook, HookContext, LoggableHook};
use scrutiny_core::logger::AuditLogger;

/// Counts how many times each event is raised.
#[derive(Debug, Default)]
pub struct CounterHook {
    counts: DashMap<String, u64>,
}

impl CounterHook {
    /// Create a hook with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `event` has been raised since the last reset.
    #[must_use]
    pub fn count(&self, event: &str) -> u64 {
        self.counts.get(event).map_or(0, |entry| *entry)
    }

    /// All counters, sorted by event name.
    #[must_use]
    pub fn counts(&self) -> Vec<(String, u64)> {
        let mut counts: Vec<(String, u64)> = self
            .counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        counts.sort();
        counts
    }
}

impl Hook for CounterHook {
    fn prehook(&self, event: &str, _args: AnyValue<'_>) -> anyhow::Result<HookContext> {
        *self.counts.entry(event.to_string()).or_insert(0) += 1;
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

    fn reset(&self) {
        self.counts.clear();
    }

    fn as_loggable(&self) -> Option<&dyn LoggableHook> {
        Some(self)
    }
}

impl LoggableHook for CounterHook {
    fn log_results(&self, logger: &dyn AuditLogger) {
        logger.info("CounterHook results:");
        for (event, count) in self.counts() {
            logger.info(&format!("    {event}: {count}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrutiny_core::BufferLogger;

    fn raise(hook: &CounterHook, event: &str, times: u64) {
        for _ in 0..times {
            let _context = hook
                .prehook(event, AnyValue::new(&()))
                .expect("counter prehook never fails");
        }
    }

    #[test]
    fn test_counts_per_event() {
        let hook = CounterHook::new();
        assert_eq!(hook.count("test.foo"), 0);
        raise(&hook, "test.foo", 3);
        raise(&hook, "test.bar", 1);
        assert_eq!(hook.count("test.foo"), 3);
        assert_eq!(hook.count("test.bar"), 1);
    }

    #[test]
    fn test_reset_clears_counts() {
        let hook = CounterHook::new();
        raise(&hook, "test.foo", 5);
        hook.reset();
        assert_eq!(hook.count("test.foo"), 0);
        assert!(hook.counts().is_empty());
    }

    #[test]
    fn test_log_results_sorted_by_event_name() {
        let hook = CounterHook::new();
        raise(&hook, "event_b", 904);
        raise(&hook, "event_c", 58);
        raise(&hook, "event_a", 441);

        let logger = BufferLogger::new();
        hook.log_results(&logger);
        assert_eq!(
            logger.lines(),
            vec![
                "CounterHook results:",
                "    event_a: 441",
                "    event_b: 904",
                "    event_c: 58",
            ]
        );
    }
}
