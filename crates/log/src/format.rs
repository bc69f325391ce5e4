//! Format utilities (time)

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};

/// Timer that either prints the system time or nothing at all.
///
/// Keeps a single layer type whether or not timestamps are shown.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timer {
    enabled: bool,
}

impl Timer {
    pub(crate) fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl FormatTime for Timer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        if self.enabled {
            SystemTime.format_time(w)
        } else {
            Ok(())
        }
    }
}
