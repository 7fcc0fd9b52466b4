//! Event registry and session control.
//!
//! An [`Auditor`] owns a set of uniquely-named events, the union of all
//! hooks in use across them, an enabled flag scoped by [`AuditSession`],
//! and the logger used for result fan-out. Wrapping is a setup-phase
//! operation and should be serialized by the caller; *calling* wrapped
//! functions is safe from any number of threads or tasks.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::errors::AuditError;
use crate::event::{EventCore, WrapOptions, Wrapped, WrappedAsync};
use crate::hook::Hook;
use crate::logger::{self, AuditLogger, TracingLogger};

struct Shared {
    events: RwLock<HashMap<String, Arc<EventCore>>>,
    /// Union of hooks across all wrapped events, deduplicated by pointer
    /// identity, used for uniform result-logging and reset fan-out.
    hooks: Mutex<Vec<Arc<dyn Hook>>>,
    enabled: Arc<AtomicBool>,
    logger: Arc<dyn AuditLogger>,
}

/// Registry of audited events plus the enable/disable session scope.
#[derive(Clone)]
pub struct Auditor {
    shared: Arc<Shared>,
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new()
    }
}

impl Auditor {
    /// Create an auditor logging through [`TracingLogger`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_logger(Arc::new(TracingLogger))
    }

    /// Create an auditor with an explicit result sink.
    #[must_use]
    pub fn with_logger(logger: Arc<dyn AuditLogger>) -> Self {
        Self {
            shared: Arc::new(Shared {
                events: RwLock::new(HashMap::new()),
                hooks: Mutex::new(Vec::new()),
                enabled: Arc::new(AtomicBool::new(false)),
                logger,
            }),
        }
    }

    /// The auditor's result sink.
    #[must_use]
    pub fn logger(&self) -> Arc<dyn AuditLogger> {
        Arc::clone(&self.shared.logger)
    }

    /// Wrap `f` as the audited event `name`.
    ///
    /// # Errors
    ///
    /// Fails with [`AuditError::DuplicateEvent`] when `name` is already
    /// registered; the first registration remains intact.
    pub fn wrap<F, A, R>(
        &self,
        f: F,
        name: &str,
        hooks: Vec<Arc<dyn Hook>>,
        options: WrapOptions,
    ) -> Result<Wrapped<F, A, R>, AuditError>
    where
        F: Fn(A) -> anyhow::Result<R>,
        A: fmt::Debug + 'static,
        R: fmt::Debug + 'static,
    {
        let core = self.register(name, hooks, options)?;
        Ok(Wrapped::new(core, Arc::clone(&self.shared.enabled), f))
    }

    /// Wrap the async function `f` as the audited event `name`.
    ///
    /// # Errors
    ///
    /// Fails with [`AuditError::DuplicateEvent`] when `name` is already
    /// registered; the first registration remains intact.
    pub fn wrap_async<F, Fut, A, R>(
        &self,
        f: F,
        name: &str,
        hooks: Vec<Arc<dyn Hook>>,
        options: WrapOptions,
    ) -> Result<WrappedAsync<F, A, R>, AuditError>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
        A: fmt::Debug + 'static,
        R: fmt::Debug + 'static,
    {
        let core = self.register(name, hooks, options)?;
        Ok(WrappedAsync::new(core, Arc::clone(&self.shared.enabled), f))
    }

    /// Builder form of [`wrap`](Self::wrap): configure hooks and options
    /// fluently, then apply to a function.
    #[must_use]
    pub fn decorate(&self, name: impl Into<String>) -> EventBuilder<'_> {
        EventBuilder {
            auditor: self,
            name: name.into(),
            hooks: Vec::new(),
            options: WrapOptions::default(),
        }
    }

    fn register(
        &self,
        name: &str,
        hooks: Vec<Arc<dyn Hook>>,
        options: WrapOptions,
    ) -> Result<Arc<EventCore>, AuditError> {
        let mut events = self.shared.events.write();
        if events.contains_key(name) {
            return Err(AuditError::DuplicateEvent(name.to_string()));
        }
        self.extend_hook_set(&hooks);
        let hook_count = hooks.len();
        let core = Arc::new(EventCore::new(name, hooks, options));
        let _ = events.insert(name.to_string(), Arc::clone(&core));
        debug!(event = name, hooks = hook_count, "registered audited event");
        Ok(core)
    }

    fn extend_hook_set(&self, hooks: &[Arc<dyn Hook>]) {
        let mut set = self.shared.hooks.lock();
        for hook in hooks {
            if !set.iter().any(|known| Arc::ptr_eq(known, hook)) {
                set.push(Arc::clone(hook));
            }
        }
    }

    /// Enable or disable the given event.
    ///
    /// # Errors
    ///
    /// Fails with [`AuditError::UnknownEvent`] when no such event exists.
    pub fn toggle_event(&self, name: &str, enabled: bool) -> Result<(), AuditError> {
        let events = self.shared.events.read();
        let core = events
            .get(name)
            .ok_or_else(|| AuditError::UnknownEvent(name.to_string()))?;
        core.set_enabled(enabled);
        Ok(())
    }

    /// Append hooks to an existing event and re-run hook ordering.
    ///
    /// # Errors
    ///
    /// Fails with [`AuditError::UnknownEvent`] when no such event exists.
    pub fn add_hooks(&self, name: &str, hooks: Vec<Arc<dyn Hook>>) -> Result<(), AuditError> {
        let events = self.shared.events.read();
        let core = events
            .get(name)
            .ok_or_else(|| AuditError::UnknownEvent(name.to_string()))?;
        self.extend_hook_set(&hooks);
        core.add_hooks(hooks);
        Ok(())
    }

    /// Enable or disable auditing directly, outside the session API.
    pub fn enable(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether wrapped calls currently route through dispatch.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Relaxed)
    }

    /// Open an audit session: enables the auditor and publishes its logger
    /// as the current audit logger. Both are reverted when the returned
    /// session is dropped, on every exit path.
    #[must_use]
    pub fn start_auditing(&self) -> AuditSession {
        let was_enabled = self.shared.enabled.swap(true, Ordering::Relaxed);
        let logger_id = logger::push_logger(Arc::clone(&self.shared.logger));
        AuditSession {
            enabled: Arc::clone(&self.shared.enabled),
            was_enabled,
            logger_id,
        }
    }

    /// Fan out result logging: every hook in the auditor's set with the
    /// loggable capability writes to the auditor's logger; hooks without it
    /// are skipped silently.
    pub fn log_results(&self) {
        let hooks = self.shared.hooks.lock().clone();
        for hook in &hooks {
            if let Some(loggable) = hook.as_loggable() {
                loggable.log_results(self.shared.logger.as_ref());
            }
        }
    }

    /// Reset the accumulated state of every hook in the auditor's set.
    pub fn reset_hooks(&self) {
        let hooks = self.shared.hooks.lock().clone();
        for hook in &hooks {
            hook.reset();
        }
    }

    /// Names of all registered events, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.events.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Auditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auditor")
            .field("events", &self.shared.events.read().len())
            .field("hooks", &self.shared.hooks.lock().len())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// RAII audit session opened by [`Auditor::start_auditing`].
#[derive(Debug)]
pub struct AuditSession {
    enabled: Arc<AtomicBool>,
    was_enabled: bool,
    logger_id: u64,
}

impl Drop for AuditSession {
    fn drop(&mut self) {
        self.enabled.store(self.was_enabled, Ordering::Relaxed);
        logger::remove_logger(self.logger_id);
    }
}

/// Fluent configuration for one event, produced by [`Auditor::decorate`].
pub struct EventBuilder<'a> {
    auditor: &'a Auditor,
    name: String,
    hooks: Vec<Arc<dyn Hook>>,
    options: WrapOptions,
}

impl EventBuilder<'_> {
    /// Attach one hook.
    #[must_use]
    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Attach several hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: impl IntoIterator<Item = Arc<dyn Hook>>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Register the event disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.options.enabled = false;
        self
    }

    /// Publish runtime signals around the wrapped function.
    #[must_use]
    pub fn raise_runtime_signals(mut self) -> Self {
        self.options.raise_runtime_signals = true;
        self
    }

    /// Override the auto-derived prehook signal name.
    #[must_use]
    pub fn prehook_signal(mut self, name: impl Into<String>) -> Self {
        self.options.prehook_signal = Some(name.into());
        self
    }

    /// Override the auto-derived posthook signal name.
    #[must_use]
    pub fn posthook_signal(mut self, name: impl Into<String>) -> Self {
        self.options.posthook_signal = Some(name.into());
        self
    }

    /// Apply the configuration to `f`, producing the wrapped callable.
    ///
    /// # Errors
    ///
    /// Fails with [`AuditError::DuplicateEvent`] when the event name is
    /// already registered.
    pub fn apply<F, A, R>(self, f: F) -> Result<Wrapped<F, A, R>, AuditError>
    where
        F: Fn(A) -> anyhow::Result<R>,
        A: fmt::Debug + 'static,
        R: fmt::Debug + 'static,
    {
        self.auditor.wrap(f, &self.name, self.hooks, self.options)
    }

    /// Apply the configuration to the async function `f`.
    ///
    /// # Errors
    ///
    /// Fails with [`AuditError::DuplicateEvent`] when the event name is
    /// already registered.
    pub fn apply_async<F, Fut, A, R>(self, f: F) -> Result<WrappedAsync<F, A, R>, AuditError>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
        A: fmt::Debug + 'static,
        R: fmt::Debug + 'static,
    {
        self.auditor
            .wrap_async(f, &self.name, self.hooks, self.options)
    }
}

static GLOBAL_AUDITOR: OnceLock<Auditor> = OnceLock::new();

/// Process-wide auditor for code that wants to audit events without wiring
/// an [`Auditor`] through itself.
pub fn global_auditor() -> &'static Auditor {
    GLOBAL_AUDITOR.get_or_init(Auditor::new)
}
