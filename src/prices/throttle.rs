//! Global minimum-interval throttle for upstream calls

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::common::clock::{age, Clock};

/// One throttle per process, shared by every symbol and every caller
///
/// The upstream quota is account-wide, so calls are spaced by at least
/// `min_interval` regardless of what they fetch. Waiters queue on a fair
/// mutex and are released one at a time.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_call: Mutex<Option<DateTime<Utc>>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until an upstream call is allowed and claim the slot
    pub async fn acquire(&self, clock: &dyn Clock) {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let elapsed = age(clock.now(), previous);
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("Rate limit: waiting {:?} before next upstream call", wait);
                clock.sleep(wait).await;
            }
        }

        *last_call = Some(clock.now());
    }
}
