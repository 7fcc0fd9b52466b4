//! Tracer installation.
//!
//! [`TracingHook`] adapts any [`TraceFn`] into a hook that installs it as
//! the process trace function for the duration of an audited call. The
//! process-wide slot admits one tracer at a time; a second tracing hook's
//! prehook fails with
//! [`SingletonViolation`](scrutiny_core::errors::SingletonViolation), which
//! the dispatch core captures as the event's error while still running every
//! cleanup.

use std::sync::Arc;

use parking_lot::Mutex;
use scrutiny_core::hook::{AnyValue, CleanupHook, Hook, HookContext};
use scrutiny_core::trace::{self, TraceFn, TraceToken};

/// High priority so that, on the prehook side, the tracer is installed as
/// close to the wrapped function as possible and other hooks are not traced.
pub const TRACING_HOOK_PRIORITY: i32 = 15;

/// Per-invocation context: the event that was current for this hook before
/// the invocation began.
struct PriorEvent(Option<Arc<str>>);

struct TraceState {
    token: Option<TraceToken>,
    depth: usize,
    current: Option<Arc<str>>,
}

/// Hook that installs a tracer into the process-wide tracing slot while the
/// events it is attached to execute.
///
/// Reentrant: nested audited calls carrying the same hook keep the one
/// installation alive and release it when the outermost call finishes.
pub struct TracingHook<T: TraceFn + 'static> {
    tracer: Arc<T>,
    state: Mutex<TraceState>,
}

impl<T: TraceFn + 'static> TracingHook<T> {
    /// Wrap `tracer` as an installable hook.
    pub fn new(tracer: T) -> Self {
        Self {
            tracer: Arc::new(tracer),
            state: Mutex::new(TraceState {
                token: None,
                depth: 0,
                current: None,
            }),
        }
    }

    /// The adapted tracer.
    #[must_use]
    pub fn tracer(&self) -> &Arc<T> {
        &self.tracer
    }

    /// Whether an event using this hook is currently executing.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.lock().depth > 0
    }

    /// The innermost event currently traced by this hook, if any.
    #[must_use]
    pub fn current_event(&self) -> Option<String> {
        self.state.lock().current.as_deref().map(ToString::to_string)
    }
}

impl<T: TraceFn + 'static> Hook for TracingHook<T> {
    fn priority(&self) -> i32 {
        TRACING_HOOK_PRIORITY
    }

    fn prehook(&self, event: &str, _args: AnyValue<'_>) -> anyhow::Result<HookContext> {
        let mut state = self.state.lock();
        if state.depth == 0 {
            let tracer: Arc<dyn TraceFn> = self.tracer.clone();
            let token = trace::acquire(tracer, std::any::type_name::<T>())?;
            state.token = Some(token);
        }
        state.depth += 1;
        let prior = state.current.take();
        state.current = Some(Arc::from(event));
        Ok(Box::new(PriorEvent(prior)))
    }

    fn posthook(
        &self,
        _event: &str,
        _result: AnyValue<'_>,
        _context: &mut HookContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn as_cleanup(&self) -> Option<&dyn CleanupHook> {
        Some(self)
    }
}

impl<T: TraceFn + 'static> CleanupHook for TracingHook<T> {
    fn cleanup(
        &self,
        _event: &str,
        context: HookContext,
        _error: Option<&anyhow::Error>,
    ) -> anyhow::Result<()> {
        let prior = context
            .downcast::<PriorEvent>()
            .map_err(|_| anyhow::anyhow!("tracing hook context was not a PriorEvent"))?;
        let mut state = self.state.lock();
        state.current = prior.0;
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            // Dropping the token releases the process slot.
            state.token = None;
        }
        Ok(())
    }
}
