// Torn-safe hand-off of vision target readings to the control loop.
//
// The vision worker runs concurrently with the control tick and publishes a
// small fixed-size record; the control loop reads one snapshot per tick. The
// channel is a version-tagged structure (seqlock): the writer bumps the
// version to an odd value, stores the fields, then bumps it even; the reader
// retries while it observes an odd or changed version. Freshness is
// advisory: a stale record reads as "no target" rather than an error.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// How old a record can be and still count as fresh.
pub const TARGET_MAX_AGE: Duration = Duration::from_millis(250);

const READ_RETRIES: usize = 8;

/// One vision result: offsets normalized to [-1, 1] across the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetReading {
    pub x_offset: f64,
    pub y_offset: f64,
    pub width: f64,
    pub height: f64,
}

/// Single-writer / single-reader target snapshot channel.
pub struct TargetChannel {
    version: AtomicU64,
    x: AtomicU64,
    y: AtomicU64,
    width: AtomicU64,
    height: AtomicU64,
    has_target: AtomicBool,
    /// Microseconds since `epoch` of the last publish.
    published_at: AtomicU64,
    epoch: Instant,
}

impl Default for TargetChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetChannel {
    pub fn new() -> Self {
        Self {
            version: AtomicU64::new(0),
            x: AtomicU64::new(0),
            y: AtomicU64::new(0),
            width: AtomicU64::new(0),
            height: AtomicU64::new(0),
            has_target: AtomicBool::new(false),
            published_at: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    fn now_micros(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    /// Publish a new reading, or `None` for "frame processed, no target".
    pub fn publish(&self, reading: Option<TargetReading>) {
        let v = self.version.fetch_add(1, Ordering::AcqRel); // now odd
        debug_assert!(v % 2 == 0, "concurrent writers on TargetChannel");

        match reading {
            Some(t) => {
                self.x.store(t.x_offset.to_bits(), Ordering::Relaxed);
                self.y.store(t.y_offset.to_bits(), Ordering::Relaxed);
                self.width.store(t.width.to_bits(), Ordering::Relaxed);
                self.height.store(t.height.to_bits(), Ordering::Relaxed);
                self.has_target.store(true, Ordering::Relaxed);
            }
            None => self.has_target.store(false, Ordering::Relaxed),
        }
        self.published_at.store(self.now_micros(), Ordering::Relaxed);

        self.version.fetch_add(1, Ordering::AcqRel); // even again
    }

    /// Latest reading, if there is a fresh target. Returns None on a stale
    /// record, a no-target frame, or if a consistent snapshot could not be
    /// read in a few retries (the writer will be done by the next tick).
    pub fn latest(&self) -> Option<TargetReading> {
        for _ in 0..READ_RETRIES {
            let v1 = self.version.load(Ordering::Acquire);
            if v1 % 2 != 0 {
                continue; // write in progress
            }

            let has_target = self.has_target.load(Ordering::Relaxed);
            let published_at = self.published_at.load(Ordering::Relaxed);
            let reading = TargetReading {
                x_offset: f64::from_bits(self.x.load(Ordering::Relaxed)),
                y_offset: f64::from_bits(self.y.load(Ordering::Relaxed)),
                width: f64::from_bits(self.width.load(Ordering::Relaxed)),
                height: f64::from_bits(self.height.load(Ordering::Relaxed)),
            };

            let v2 = self.version.load(Ordering::Acquire);
            if v1 != v2 {
                continue; // torn, retry
            }

            if !has_target {
                return None;
            }
            let age = self.now_micros().saturating_sub(published_at);
            if age > TARGET_MAX_AGE.as_micros() as u64 {
                return None;
            }
            return Some(reading);
        }
        None
    }
}
