// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clocks for stamping lifecycle events.
//!
//! Events need both a start time and a duration. For that we use a combination of a wall-clock
//! timestamp (reported in the XML) and a monotonic offset (used to compute elapsed times), so that
//! wall-clock adjustments in the middle of a run can't produce negative durations.

use chrono::{DateTime, FixedOffset, Local};
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

/// A point in time, as observed by a [`Clock`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Timestamp {
    wall: DateTime<FixedOffset>,
    monotonic: Duration,
}

impl Timestamp {
    /// Returns the wall-clock time.
    pub fn wall(&self) -> DateTime<FixedOffset> {
        self.wall
    }

    /// Returns the time elapsed between `earlier` and `self`, truncated to whole milliseconds.
    ///
    /// Saturates to zero if `earlier` is actually later than `self`.
    pub fn millis_since(&self, earlier: &Timestamp) -> Duration {
        truncate_to_millis(self.monotonic.saturating_sub(earlier.monotonic))
    }
}

fn truncate_to_millis(duration: Duration) -> Duration {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(millis)
}

/// A source of [`Timestamp`]s.
pub trait Clock: fmt::Debug + Send {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// The real-time clock: local wall time, plus a monotonic [`Instant`] for durations.
#[derive(Clone, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a new system clock.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp {
            // These two syscalls will happen imperceptibly close to each other, which is good
            // enough for our purposes.
            wall: Local::now().fixed_offset(),
            monotonic: self.origin.elapsed(),
        }
    }
}

/// A clock that only moves when told to.
///
/// Used to replay recorded event streams (where each event carries its own timestamp) and to get
/// deterministic output in tests. Clones share the same underlying time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualClockInner>>,
}

#[derive(Debug)]
struct ManualClockInner {
    origin: DateTime<FixedOffset>,
    offset: Duration,
}

impl ManualClock {
    /// Creates a new manual clock that starts at `origin`.
    pub fn new(origin: DateTime<FixedOffset>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualClockInner {
                origin,
                offset: Duration::ZERO,
            })),
        }
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut inner = self.lock();
        inner.offset += duration;
    }

    /// Moves the clock to `wall`.
    ///
    /// The clock never moves backwards: if `wall` is earlier than the current time, this is a
    /// no-op.
    pub fn set_wall(&self, wall: DateTime<FixedOffset>) {
        let mut inner = self.lock();
        if let Ok(offset) = (wall - inner.origin).to_std() {
            inner.offset = inner.offset.max(offset);
        }
    }

    /// Restarts the clock at `origin`, discarding any time it has advanced by.
    pub fn rebase(&self, origin: DateTime<FixedOffset>) {
        let mut inner = self.lock();
        inner.origin = origin;
        inner.offset = Duration::ZERO;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualClockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let inner = self.lock();
        let offset = chrono::Duration::from_std(inner.offset).unwrap_or(chrono::Duration::MAX);
        Timestamp {
            wall: inner.origin + offset,
            monotonic: inner.offset,
        }
    }
}
