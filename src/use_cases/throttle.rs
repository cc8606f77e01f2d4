// Rate limiting for warnings raised on hot paths (full queues, bad frames).

use std::time::{Duration, Instant};

pub const LOG_THROTTLE: Duration = Duration::from_secs(2);

/// Lets at most one log line through per interval.
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn should_log(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for LogThrottle {
    fn default() -> Self {
        Self::new(LOG_THROTTLE)
    }
}
