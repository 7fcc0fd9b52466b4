//! Session logger publication.
//!
//! The logger stack is process-global, so this binary holds exactly one
//! test: every other suite that opens sessions would otherwise race it.

use std::sync::Arc;

use scrutiny_core::logger::BufferLogger;
use scrutiny_core::{Auditor, current_audit_logger};

#[test]
fn test_sessions_publish_and_revert_the_current_logger() {
    assert!(current_audit_logger().is_none());

    let outer = Auditor::with_logger(Arc::new(BufferLogger::new()));
    let inner = Auditor::with_logger(Arc::new(BufferLogger::new()));

    let outer_session = outer.start_auditing();
    let top = current_audit_logger().expect("outer session is open");
    assert!(Arc::ptr_eq(&top, &outer.logger()));

    // The innermost session's logger shadows the outer one.
    let inner_session = inner.start_auditing();
    let top = current_audit_logger().expect("inner session is open");
    assert!(Arc::ptr_eq(&top, &inner.logger()));

    // Out-of-order teardown removes the right entry.
    drop(outer_session);
    let top = current_audit_logger().expect("inner session is still open");
    assert!(Arc::ptr_eq(&top, &inner.logger()));
    assert!(!outer.is_enabled());
    assert!(inner.is_enabled());

    drop(inner_session);
    assert!(current_audit_logger().is_none());
    assert!(!inner.is_enabled());
}
