//! Current-event propagation.
//!
//! Exposes "what event is executing right now" to code running inside a
//! wrapped function. The value lives in a thread-local *stack*, never a
//! single process-wide variable: concurrent calls on separate threads see
//! independent values, and nested calls see the innermost event until it
//! returns — including when it fails.
//!
//! Async bodies are covered by [`Scoped`], which enters the scope on every
//! poll and leaves it afterwards, so the current event stays stable across
//! `.await` points and tasks interleaved on one thread never observe each
//! other's value.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;

use crate::errors::NoActiveEvent;

thread_local! {
    static CURRENT_EVENT: RefCell<Vec<Arc<str>>> = const { RefCell::new(Vec::new()) };
}

/// Name of the event currently executing on this logical thread of control.
///
/// # Errors
///
/// Returns [`NoActiveEvent`] when no audited call is in flight.
pub fn current_event() -> Result<String, NoActiveEvent> {
    current_event_opt().ok_or(NoActiveEvent)
}

/// Like [`current_event`], but `None` instead of an error.
#[must_use]
pub fn current_event_opt() -> Option<String> {
    CURRENT_EVENT.with(|stack| stack.borrow().last().map(ToString::to_string))
}

/// Like [`current_event`], but falls back to `default` when no audited call
/// is in flight.
#[must_use]
pub fn current_event_or(default: impl Into<String>) -> String {
    current_event_opt().unwrap_or_else(|| default.into())
}

/// RAII scope marking `name` as the current event on this thread.
///
/// The prior value is restored exactly once, on drop, on every exit path.
pub struct EventScope {
    name: Arc<str>,
}

impl EventScope {
    /// Push `name` onto this thread's event stack.
    pub fn enter(name: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        CURRENT_EVENT.with(|stack| stack.borrow_mut().push(name.clone()));
        Self { name }
    }
}

impl Drop for EventScope {
    fn drop(&mut self) {
        let popped = CURRENT_EVENT.with(|stack| stack.borrow_mut().pop());
        debug_assert_eq!(
            popped.as_deref(),
            Some(&*self.name),
            "event scopes must unwind in LIFO order"
        );
    }
}

pin_project! {
    /// Future wrapper that holds an [`EventScope`] open for the duration of
    /// every poll of the inner future.
    pub struct Scoped<F> {
        #[pin]
        inner: F,
        name: Arc<str>,
    }
}

impl<F> Scoped<F> {
    /// Wrap `inner` so that `name` is the current event whenever it runs.
    pub fn new(name: impl Into<Arc<str>>, inner: F) -> Self {
        Self {
            inner,
            name: name.into(),
        }
    }
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _scope = EventScope::enter(this.name.clone());
        this.inner.poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_active_event_outside_dispatch() {
        assert_eq!(current_event(), Err(NoActiveEvent));
        assert_eq!(current_event_or("fallback"), "fallback");
    }

    #[test]
    fn test_nested_scopes_restore_in_order() {
        let outer = EventScope::enter("outer");
        assert_eq!(current_event().as_deref(), Ok("outer"));
        {
            let _inner = EventScope::enter("inner");
            assert_eq!(current_event().as_deref(), Ok("inner"));
        }
        assert_eq!(current_event().as_deref(), Ok("outer"));
        drop(outer);
        assert!(current_event().is_err());
    }

    #[test]
    fn test_threads_observe_independent_values() {
        let _scope = EventScope::enter("main-thread");
        let seen = std::thread::spawn(current_event_opt)
            .join()
            .expect("thread join");
        assert_eq!(seen, None);
        assert_eq!(current_event_or("x"), "main-thread");
    }

    #[tokio::test]
    async fn test_scoped_future_survives_suspension() {
        let inner = async {
            assert_eq!(current_event().as_deref(), Ok("task"));
            tokio::task::yield_now().await;
            assert_eq!(current_event().as_deref(), Ok("task"));
        };
        Scoped::new("task", inner).await;
        assert!(current_event().is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_interleaved_tasks_do_not_corrupt_each_other() {
        let a = tokio::spawn(Scoped::new("task-a", async {
            for _ in 0..8 {
                assert_eq!(current_event().as_deref(), Ok("task-a"));
                tokio::task::yield_now().await;
            }
        }));
        let b = tokio::spawn(Scoped::new("task-b", async {
            for _ in 0..8 {
                assert_eq!(current_event().as_deref(), Ok("task-b"));
                tokio::task::yield_now().await;
            }
        }));
        a.await.expect("task a");
        b.await.expect("task b");
    }
}
