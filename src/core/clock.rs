/*!
 * Clock
 * Source of UTC timestamps for link file names
 */

use super::types::Millis;
use std::sync::atomic::{AtomicI64, Ordering};
use time::OffsetDateTime;

/// Wall clock abstraction
pub trait Clock: Send + Sync {
    /// Current UTC time in milliseconds since the epoch
    fn now_millis(&self) -> Millis;
}

/// System UTC clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Millis {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as Millis
    }
}

/// Manually driven clock
///
/// Every read advances the clock by one millisecond so consecutive link
/// names never collide.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn starting_at(millis: Millis) -> Self {
        Self {
            now: AtomicI64::new(millis),
        }
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Millis {
        self.now.fetch_add(1, Ordering::SeqCst)
    }
}
