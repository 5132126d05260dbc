//! Rate-limited warnings for deprecated producer behaviour.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Lets a message through at most once per time window.
///
/// Suppressed occurrences are logged at debug level.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter letting one message through per `window`.
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last: Mutex::new(None),
        }
    }

    /// Returns true if a message may be emitted now, and records it.
    pub fn check(&self) -> bool {
        self.check_at(Instant::now())
    }

    fn check_at(&self, now: Instant) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        match *last {
            Some(previous) if now.saturating_duration_since(previous) < self.window => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Logs `message` as a warning if the window allows it.
    pub fn warn(&self, message: &str) {
        if self.check() {
            log::warn!("{message}");
        } else {
            log::debug!("(rate-limited) {message}");
        }
    }
}

static EMPTY_UNTYPED: RateLimiter = RateLimiter::new(Duration::from_millis(1000));

/// Warns that an empty tensor without element type is being serialized.
pub(crate) fn empty_untyped_tensor(name: &str) {
    EMPTY_UNTYPED.warn(&format!(
        "You're trying to serialize tensor {name} with zero elements and no element type. \
         This is a legacy behavior and will be rejected in the future. Set the element type \
         before serializing."
    ));
}
