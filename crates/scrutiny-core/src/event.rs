//! Audited events and the dispatch state machine.
//!
//! An event couples a wrapped function to its name, enabled state, and
//! ordered hook list. Calling a [`Wrapped`]/[`WrappedAsync`] callable while
//! auditing is enabled drives the full sequence:
//!
//! 1. disabled short-circuit (no hooks, no context, no signals)
//! 2. current-event scope set, optional prehook signal
//! 3. prehooks in execution order, behind a capture boundary
//! 4. the wrapped function
//! 5. posthooks and cleanups in the *same* order, collecting failures
//! 6. unconditional scope restore
//! 7. error precedence: aggregated hook failures supersede a captured
//!    function/prehook error; otherwise the captured error propagates;
//!    otherwise the optional posthook signal fires and the result returns
//!
//! Cleanup always runs for every hook whose prehook produced a context —
//! including when the wrapped function fails or an async body is cancelled
//! mid-flight.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::context::{EventScope, Scoped};
use crate::errors::{EventError, HookFailure, HookPhase};
use crate::hook::{AnyValue, Hook, HookContext};
use crate::order::execution_order;
use crate::signal::{self, AuditSignal, SignalPhase};
use crate::trace::{self, TracePhase};

/// Configuration for one wrapped event. Explicit struct rather than open
/// keyword arguments; unspecified fields take their defaults.
#[derive(Debug, Clone)]
pub struct WrapOptions {
    /// Whether the event starts enabled. Default: true.
    pub enabled: bool,
    /// Whether to publish runtime signals around the wrapped function.
    /// Default: false.
    pub raise_runtime_signals: bool,
    /// Signal name for the prehook side. Default: `"prehook:<event>"`.
    pub prehook_signal: Option<String>,
    /// Signal name for the posthook side. Default: `"posthook:<event>"`.
    pub posthook_signal: Option<String>,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            raise_runtime_signals: false,
            prehook_signal: None,
            posthook_signal: None,
        }
    }
}

/// Hook list plus its cached execution order. The order is recomputed on
/// every mutation and is always a valid permutation of `0..hooks.len()`.
struct HookSet {
    hooks: Vec<Arc<dyn Hook>>,
    order: Vec<usize>,
}

/// Shared state of one audited event: everything except the wrapped
/// function, which lives (typed) in the [`Wrapped`]/[`WrappedAsync`] callable.
pub(crate) struct EventCore {
    name: Arc<str>,
    enabled: AtomicBool,
    raise_runtime_signals: bool,
    prehook_signal: Arc<str>,
    posthook_signal: Arc<str>,
    hooks: RwLock<HookSet>,
}

impl EventCore {
    pub(crate) fn new(name: &str, hooks: Vec<Arc<dyn Hook>>, options: WrapOptions) -> Self {
        let prehook_signal = options
            .prehook_signal
            .unwrap_or_else(|| format!("prehook:{name}"));
        let posthook_signal = options
            .posthook_signal
            .unwrap_or_else(|| format!("posthook:{name}"));
        let order = execution_order(&hooks);
        Self {
            name: Arc::from(name),
            enabled: AtomicBool::new(options.enabled),
            raise_runtime_signals: options.raise_runtime_signals,
            prehook_signal: Arc::from(prehook_signal.as_str()),
            posthook_signal: Arc::from(posthook_signal.as_str()),
            hooks: RwLock::new(HookSet { hooks, order }),
        }
    }

    pub(crate) fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Append hooks and recompute the execution order.
    pub(crate) fn add_hooks(&self, hooks: impl IntoIterator<Item = Arc<dyn Hook>>) {
        let mut set = self.hooks.write();
        set.hooks.extend(hooks);
        set.order = execution_order(&set.hooks);
    }

    fn snapshot(&self) -> (Vec<Arc<dyn Hook>>, Vec<usize>) {
        let set = self.hooks.read();
        (set.hooks.clone(), set.order.clone())
    }

    fn raise_prehook_signal(&self, payload: String) {
        signal::raise(AuditSignal {
            name: Arc::clone(&self.prehook_signal),
            event: Arc::clone(&self.name),
            phase: SignalPhase::Prehook,
            payload,
        });
    }

    /// Synchronous dispatch. The caller has already established that the
    /// auditor session and the event are enabled.
    pub(crate) fn dispatch<A, R>(
        &self,
        f: impl FnOnce(A) -> anyhow::Result<R>,
        args: A,
    ) -> Result<R, EventError>
    where
        A: fmt::Debug + 'static,
        R: fmt::Debug + 'static,
    {
        let (hooks, order) = self.snapshot();
        let _scope = EventScope::enter(Arc::clone(&self.name));
        trace::emit(&self.name, TracePhase::Enter);
        if self.raise_runtime_signals {
            self.raise_prehook_signal(format!("{args:?}"));
        }

        let (mut contexts, mut captured) =
            run_prehooks(&self.name, &hooks, &order, AnyValue::new(&args));

        let mut result = None;
        if captured.is_none() {
            trace::emit(&self.name, TracePhase::BodyStart);
            match f(args) {
                Ok(value) => result = Some(value),
                Err(error) => captured = Some(error),
            }
            trace::emit(&self.name, TracePhase::BodyEnd);
        }

        self.finish(&hooks, &order, &mut contexts, captured, result)
    }

    /// Asynchronous dispatch. The entire sequence runs under a [`Scoped`]
    /// future so the current event stays stable across `.await` points, and
    /// a cancel guard keeps the cleanup-always guarantee when the in-flight
    /// future is dropped mid-body.
    pub(crate) async fn dispatch_async<A, R, Fut>(
        &self,
        f: impl FnOnce(A) -> Fut,
        args: A,
    ) -> Result<R, EventError>
    where
        A: fmt::Debug + 'static,
        R: fmt::Debug + 'static,
        Fut: Future<Output = anyhow::Result<R>>,
    {
        Scoped::new(Arc::clone(&self.name), async move {
            let (hooks, order) = self.snapshot();
            trace::emit(&self.name, TracePhase::Enter);
            if self.raise_runtime_signals {
                self.raise_prehook_signal(format!("{args:?}"));
            }

            let (contexts, captured) =
                run_prehooks(&self.name, &hooks, &order, AnyValue::new(&args));

            let (hooks, order, mut contexts, captured, result) = if captured.is_none() {
                let mut guard = CancelGuard::new(Arc::clone(&self.name), hooks, order, contexts);
                trace::emit(&self.name, TracePhase::BodyStart);
                let body = f(args).await;
                trace::emit(&self.name, TracePhase::BodyEnd);
                let (hooks, order, contexts) = guard.disarm();
                match body {
                    Ok(value) => (hooks, order, contexts, None, Some(value)),
                    Err(error) => (hooks, order, contexts, Some(error), None),
                }
            } else {
                (hooks, order, contexts, captured, None)
            };

            self.finish(&hooks, &order, &mut contexts, captured, result)
        })
        .await
    }

    /// Posthook/cleanup phase plus the step-7 error precedence.
    fn finish<R>(
        &self,
        hooks: &[Arc<dyn Hook>],
        order: &[usize],
        contexts: &mut Vec<Option<HookContext>>,
        captured: Option<anyhow::Error>,
        result: Option<R>,
    ) -> Result<R, EventError>
    where
        R: fmt::Debug + 'static,
    {
        let failures = run_posthooks(
            &self.name,
            hooks,
            order,
            contexts,
            result.as_ref(),
            captured.as_ref(),
        );
        trace::emit(&self.name, TracePhase::Exit);

        if !failures.is_empty() {
            return Err(EventError::Hooks(failures));
        }
        if let Some(error) = captured {
            return Err(EventError::Failed(error));
        }
        let result = result.expect("event result was not recorded");
        if self.raise_runtime_signals {
            signal::raise(AuditSignal {
                name: Arc::clone(&self.posthook_signal),
                event: Arc::clone(&self.name),
                phase: SignalPhase::Posthook,
                payload: format!("{result:?}"),
            });
        }
        Ok(result)
    }
}

impl fmt::Debug for EventCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCore")
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .field("hooks", &self.hooks.read().hooks.len())
            .finish_non_exhaustive()
    }
}

/// Run prehooks in execution order behind the capture boundary: the first
/// failure stops the phase (and the body) but never the cleanup phase.
fn run_prehooks(
    name: &str,
    hooks: &[Arc<dyn Hook>],
    order: &[usize],
    args: AnyValue<'_>,
) -> (Vec<Option<HookContext>>, Option<anyhow::Error>) {
    let mut contexts: Vec<Option<HookContext>> = Vec::with_capacity(hooks.len());
    contexts.resize_with(hooks.len(), || None);
    let mut captured = None;
    for &index in order {
        let hook = &hooks[index];
        if !hook.enabled() {
            continue;
        }
        match hook.prehook(name, args) {
            Ok(context) => contexts[index] = Some(context),
            Err(error) => {
                captured = Some(error);
                break;
            }
        }
    }
    (contexts, captured)
}

/// Run posthooks and cleanups in execution order for every hook whose
/// prehook produced a context. One hook's failure never prevents the others
/// from running; all failures are collected.
fn run_posthooks<R>(
    name: &str,
    hooks: &[Arc<dyn Hook>],
    order: &[usize],
    contexts: &mut Vec<Option<HookContext>>,
    result: Option<&R>,
    captured: Option<&anyhow::Error>,
) -> Vec<HookFailure>
where
    R: fmt::Debug + 'static,
{
    let mut failures = Vec::new();
    for &index in order {
        let Some(mut context) = contexts[index].take() else {
            continue;
        };
        let hook = &hooks[index];
        if captured.is_none() {
            if let Some(result) = result {
                if let Err(error) = hook.posthook(name, AnyValue::new(result), &mut context) {
                    failures.push(HookFailure {
                        hook_index: index,
                        phase: HookPhase::Posthook,
                        error,
                    });
                }
            }
        }
        if let Some(cleanup) = hook.as_cleanup() {
            if let Err(error) = cleanup.cleanup(name, context, captured) {
                failures.push(HookFailure {
                    hook_index: index,
                    phase: HookPhase::Cleanup,
                    error,
                });
            }
        }
    }
    failures
}

/// Runs cleanups from `Drop` when an async body is cancelled mid-flight.
struct CancelGuard {
    name: Arc<str>,
    hooks: Vec<Arc<dyn Hook>>,
    order: Vec<usize>,
    contexts: Vec<Option<HookContext>>,
    armed: bool,
}

impl CancelGuard {
    fn new(
        name: Arc<str>,
        hooks: Vec<Arc<dyn Hook>>,
        order: Vec<usize>,
        contexts: Vec<Option<HookContext>>,
    ) -> Self {
        Self {
            name,
            hooks,
            order,
            contexts,
            armed: true,
        }
    }

    /// Normal completion: hand the state back for the regular posthook phase.
    fn disarm(&mut self) -> (Vec<Arc<dyn Hook>>, Vec<usize>, Vec<Option<HookContext>>) {
        self.armed = false;
        (
            mem::take(&mut self.hooks),
            mem::take(&mut self.order),
            mem::take(&mut self.contexts),
        )
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // The in-flight call was dropped before the body completed. Cleanup
        // still runs, with the cancellation captured as the error. Failures
        // cannot propagate out of Drop, so they are logged instead.
        let cancelled = anyhow::anyhow!("audited call was cancelled before completion");
        let failures = run_posthooks::<()>(
            &self.name,
            &self.hooks,
            &self.order,
            &mut self.contexts,
            None,
            Some(&cancelled),
        );
        for failure in failures {
            tracing::warn!(event = %self.name, %failure, "hook failed during cancellation cleanup");
        }
    }
}

/// Callable returned by [`Auditor::wrap`](crate::auditor::Auditor::wrap).
///
/// While the owning auditor is in an enabled session and the event is
/// enabled, `call` routes through the full dispatch sequence; otherwise it
/// invokes the wrapped function directly with zero overhead.
pub struct Wrapped<F, A, R> {
    core: Arc<EventCore>,
    session_enabled: Arc<AtomicBool>,
    f: F,
    _types: PhantomData<fn(A) -> R>,
}

impl<F, A, R> Wrapped<F, A, R>
where
    F: Fn(A) -> anyhow::Result<R>,
    A: fmt::Debug + 'static,
    R: fmt::Debug + 'static,
{
    pub(crate) fn new(core: Arc<EventCore>, session_enabled: Arc<AtomicBool>, f: F) -> Self {
        Self {
            core,
            session_enabled,
            f,
            _types: PhantomData,
        }
    }

    /// Name of the event this callable dispatches.
    #[must_use]
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Invoke the wrapped function, bracketed by hooks when auditing is
    /// enabled.
    pub fn call(&self, args: A) -> Result<R, EventError> {
        if !self.session_enabled.load(Ordering::Relaxed) || !self.core.is_enabled() {
            return (self.f)(args).map_err(EventError::Failed);
        }
        self.core.dispatch(&self.f, args)
    }
}

impl<F, A, R> fmt::Debug for Wrapped<F, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapped")
            .field("event", &self.core.name())
            .finish_non_exhaustive()
    }
}

/// Callable returned by
/// [`Auditor::wrap_async`](crate::auditor::Auditor::wrap_async); the async
/// counterpart of [`Wrapped`].
pub struct WrappedAsync<F, A, R> {
    core: Arc<EventCore>,
    session_enabled: Arc<AtomicBool>,
    f: F,
    _types: PhantomData<fn(A) -> R>,
}

impl<F, A, R> WrappedAsync<F, A, R> {
    pub(crate) fn new(core: Arc<EventCore>, session_enabled: Arc<AtomicBool>, f: F) -> Self {
        Self {
            core,
            session_enabled,
            f,
            _types: PhantomData,
        }
    }

    /// Name of the event this callable dispatches.
    #[must_use]
    pub fn name(&self) -> &str {
        self.core.name()
    }
}

impl<F, A, R> WrappedAsync<F, A, R>
where
    A: fmt::Debug + 'static,
    R: fmt::Debug + 'static,
{
    /// Invoke the wrapped async function, bracketed by hooks when auditing
    /// is enabled. The current event stays stable across `.await` points;
    /// dropping the returned future mid-body still runs hook cleanup.
    pub async fn call<Fut>(&self, args: A) -> Result<R, EventError>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
    {
        if !self.session_enabled.load(Ordering::Relaxed) || !self.core.is_enabled() {
            return (self.f)(args).await.map_err(EventError::Failed);
        }
        self.core.dispatch_async(&self.f, args).await
    }
}

impl<F, A, R> fmt::Debug for WrappedAsync<F, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedAsync")
            .field("event", &self.core.name())
            .finish_non_exhaustive()
    }
}
