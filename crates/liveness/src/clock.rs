//! Wall-clock timestamps derived from the runtime's monotonic clock.

use std::time::SystemTime;
use tokio::time::Instant;

/// Produces `SystemTime` stamps that never go backwards.
///
/// The wall time is read once at construction; later stamps add the
/// monotonic time elapsed since then. Under a paused tokio runtime the
/// stamps advance with virtual time.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    wall: SystemTime,
    origin: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            wall: SystemTime::now(),
            origin: Instant::now(),
        }
    }

    /// Anchor the clock at a fixed wall time.
    pub fn starting_at(wall: SystemTime) -> Self {
        Self {
            wall,
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> SystemTime {
        self.wall + self.origin.elapsed()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
