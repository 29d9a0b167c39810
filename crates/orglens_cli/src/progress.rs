//! Progress reporting for sync operations.
//!
//! Library events are rendered as structured `tracing` output. The client and
//! the engine each take their own callback, so the reporter hands out as many
//! as needed.

mod logging;

use orglens::sync::ProgressCallback;

pub use logging::LoggingReporter;

impl LoggingReporter {
    /// Convert to a ProgressCallback for the library.
    pub fn as_callback(self) -> ProgressCallback {
        Box::new(move |event| self.handle(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orglens::sync::SyncProgress;

    #[test]
    fn test_callback_accepts_every_event_kind() {
        let callback = LoggingReporter::new().as_callback();
        callback(SyncProgress::FetchingRepos {
            org: "PaddlePaddle".to_string(),
        });
        callback(SyncProgress::Warning {
            message: "no subscriber installed".to_string(),
        });
    }
}
