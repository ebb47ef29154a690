//! Tracing/logging initialization.
//!
//! Logs are emitted as JSON lines. The level filter comes from `RUST_LOG` and
//! defaults to `info`.

use std::fmt;

use tracing::Span;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_FILTER: &str = "info";

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// Correlation id attached to every HTTP request (UUIDv7, so ids sort by time).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Reuses a caller-supplied id when it parses as a UUID.
    pub fn from_header(value: Option<&str>) -> Self {
        value
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .map(Self)
            .unwrap_or_default()
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Span wrapping the handling of one request.
pub fn request_span(request_id: RequestId, method: &str, path: &str) -> Span {
    tracing::info_span!("request", request_id = %request_id, method, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init();
        init();
    }

    #[test]
    fn caller_supplied_ids_are_kept_when_valid() {
        let id = Uuid::now_v7();
        assert_eq!(RequestId::from_header(Some(&id.to_string())).as_uuid(), id);

        let fresh = RequestId::from_header(Some("not-a-uuid"));
        assert_eq!(fresh.as_uuid().get_version_num(), 7);
    }
}
