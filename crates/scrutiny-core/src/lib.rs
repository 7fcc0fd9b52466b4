//! # scrutiny-core
//!
//! In-process instrumentation engine: wraps callable units of work
//! ("events") with ordered pre-/post-execution hooks so observability code
//! — counters, timers, tracers — can be attached and detached without
//! touching the wrapped logic.
//!
//! ## Dispatch Model
//!
//! An [`Auditor`] registers uniquely-named events. Calling a wrapped
//! function while an audit session is open runs every enabled hook's
//! prehook, the function, then every posthook and cleanup — in one
//! deterministic order, with hook cleanup guaranteed even when the function
//! or another hook fails, and with [`current_event`] tracking the innermost
//! audited call across threads, tasks, and `.await` points.
//!
//! ## Error Precedence
//!
//! A disabled auditor imposes zero error surface: wrapped calls behave
//! exactly like the unwrapped function. When enabled, hook failures during
//! posthook/cleanup are aggregated into
//! [`EventError::Hooks`](errors::EventError::Hooks) — never dropped, and
//! deliberately superseding the original failure so hook authors always see
//! their own bugs.
//!
//! ## Example
//!
//! ```rust
//! use scrutiny_core::{Auditor, WrapOptions};
//!
//! let auditor = Auditor::new();
//! let hello = auditor
//!     .wrap(
//!         |who: String| -> anyhow::Result<String> { Ok(format!("Hello, {who}!")) },
//!         "demo.hello",
//!         Vec::new(),
//!         WrapOptions::default(),
//!     )
//!     .unwrap();
//!
//! // Outside a session the call short-circuits straight to the function.
//! assert_eq!(hello.call("Bob".into()).unwrap(), "Hello, Bob!");
//!
//! let _session = auditor.start_auditing();
//! assert_eq!(hello.call("Alice".into()).unwrap(), "Hello, Alice!");
//! ```

#![deny(unsafe_code)]

pub mod auditor;
pub mod context;
pub mod errors;
pub mod event;
pub mod hook;
pub mod logger;
pub mod order;
pub mod signal;
pub mod trace;

pub use auditor::{AuditSession, Auditor, EventBuilder, global_auditor};
pub use context::{current_event, current_event_opt, current_event_or};
pub use errors::{AuditError, EventError, NoActiveEvent, SingletonViolation};
pub use event::{WrapOptions, Wrapped, WrappedAsync};
pub use hook::{AnyValue, CleanupHook, Hook, HookContext, LoggableHook};
pub use logger::{AuditLogger, BufferLogger, TracingLogger, current_audit_logger};
