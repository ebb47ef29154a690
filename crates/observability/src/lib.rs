//! Tracing setup shared by the binaries.

/// Initialize process-wide tracing.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration and request correlation.
pub mod tracing;

pub use self::tracing::{RequestId, request_span};
