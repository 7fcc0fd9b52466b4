//! Runtime signal bridge.
//!
//! Events created with `raise_runtime_signals` publish two named signals per
//! invocation — one before the wrapped function carrying the rendered
//! arguments, one after carrying the rendered result — onto a process-wide
//! broadcast channel. The dispatch core is a pure producer; it never
//! consumes from the channel, and publishing with no subscribers is a no-op.

use std::sync::Arc;
use std::sync::OnceLock;

use tokio::sync::broadcast;

/// Buffered signals per subscriber before the slowest one starts lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Which side of the wrapped function a signal was raised on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalPhase {
    /// Raised before the wrapped function, carrying its arguments.
    Prehook,
    /// Raised after the wrapped function returned, carrying its result.
    Posthook,
}

/// A signal published onto the process-wide audit-broadcast channel.
#[derive(Debug, Clone)]
pub struct AuditSignal {
    /// Signal name: caller-supplied or auto-derived
    /// (`"prehook:<event>"` / `"posthook:<event>"`).
    pub name: Arc<str>,
    /// Name of the event that raised the signal.
    pub event: Arc<str>,
    /// Which side of the wrapped function raised it.
    pub phase: SignalPhase,
    /// `Debug` rendering of the arguments (prehook) or result (posthook).
    pub payload: String,
}

static CHANNEL: OnceLock<broadcast::Sender<AuditSignal>> = OnceLock::new();

fn sender() -> &'static broadcast::Sender<AuditSignal> {
    CHANNEL.get_or_init(|| broadcast::channel(CHANNEL_CAPACITY).0)
}

/// Subscribe to the process-wide audit-broadcast channel.
#[must_use]
pub fn subscribe() -> broadcast::Receiver<AuditSignal> {
    sender().subscribe()
}

/// Publish a signal. Dropped silently when nobody is subscribed.
pub(crate) fn raise(signal: AuditSignal) {
    let _ = sender().send(signal);
}
