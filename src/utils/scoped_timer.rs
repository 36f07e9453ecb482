use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Logs how long a named scope took when it is dropped.
pub struct ScopedTimer {
    start: Instant,
    name: &'static str,
}

impl ScopedTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        debug!(target: "timing", "[TIMING] {} took {} ms", self.name, elapsed.as_millis());
    }
}
