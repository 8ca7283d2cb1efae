// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Admission Control for Outbound Model Calls
//!
//! Gates calls to the text-generation service under a per-process budget.
//!
//! ## Policy
//!
//! 1. **Sliding window**: at most `max_requests` admissions within any trailing
//!    `window`. When the window is full the caller is rejected immediately with the
//!    time until the oldest admission leaves the window.
//! 2. **Minimum spacing**: consecutive admissions are at least `window / max_requests`
//!    apart. A caller arriving too early is delayed (never rejected) until the spacing
//!    holds, then re-checked.
//!
//! The timestamp log is the only shared state. Each check-and-record runs under one
//! lock; the spacing delay is slept with the lock released.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Result, ToolbotError};

/// Configuration for admission control
#[derive(Clone, Debug)]
pub struct AdmissionConfig {
    /// Maximum admissions per window
    pub max_requests: u32,
    /// Length of the sliding window
    pub window: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_requests: 15,
            window: Duration::from_secs(60),
        }
    }
}

impl AdmissionConfig {
    /// Minimum gap between two consecutive admissions
    pub fn min_spacing(&self) -> Duration {
        self.window / self.max_requests.max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(ToolbotError::InvalidConfig(
                "max_requests must be at least 1".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(ToolbotError::InvalidConfig(
                "window must be longer than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Window is full. Not a failure of the process; the caller may retry after `retry_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "RATE_LIMIT_EXCEEDED: Please wait {:.2} seconds before sending another message.",
    .retry_after.as_secs_f64()
)]
pub struct AdmissionRejected {
    pub retry_after: Duration,
}

/// Successful admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admitted {
    /// Time spent throttled before the call was let through
    pub waited: Duration,
}

/// Outcome of a single check against the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Recorded; the call may proceed
    Admitted,
    /// Spacing not yet satisfied; check again after the delay
    Wait(Duration),
    /// Window full
    Rejected(AdmissionRejected),
}

/// Counters for admission control
#[derive(Debug, Default)]
pub struct AdmissionStats {
    pub admitted: AtomicU64,
    pub rejected: AtomicU64,
    pub throttled: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdmissionSnapshot {
    pub admitted: u64,
    pub rejected: u64,
    pub throttled: u64,
    pub in_window: usize,
    pub max_requests: u32,
    pub window_secs: f64,
}

/// Sliding-window admission controller shared by every caller in the process
#[derive(Debug)]
pub struct AdmissionController {
    config: AdmissionConfig,
    spacing: Duration,
    /// Admission instants, oldest first
    timestamps: Mutex<VecDeque<Instant>>,
    stats: AdmissionStats,
}

impl AdmissionController {
    pub fn new(mut config: AdmissionConfig) -> Self {
        config.max_requests = config.max_requests.max(1);
        let spacing = config.min_spacing();

        Self {
            timestamps: Mutex::new(VecDeque::with_capacity(config.max_requests as usize)),
            config,
            spacing,
            stats: AdmissionStats::default(),
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Run one check-and-record step at `now`.
    ///
    /// Never blocks beyond the lock itself. `Check::Wait` leaves the log untouched.
    pub fn check_at(&self, now: Instant) -> Check {
        let mut log = self.timestamps.lock();

        while let Some(oldest) = log.front() {
            if now.saturating_duration_since(*oldest) >= self.config.window {
                log.pop_front();
            } else {
                break;
            }
        }

        if log.len() >= self.config.max_requests as usize {
            if let Some(&oldest) = log.front() {
                let retry_after = (oldest + self.config.window).saturating_duration_since(now);
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                return Check::Rejected(AdmissionRejected { retry_after });
            }
        }

        if let Some(&last) = log.back() {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.spacing {
                self.stats.throttled.fetch_add(1, Ordering::Relaxed);
                return Check::Wait(self.spacing - elapsed);
            }
        }

        log.push_back(now);
        self.stats.admitted.fetch_add(1, Ordering::Relaxed);
        Check::Admitted
    }

    /// Wait for admission.
    ///
    /// Returns at once with `Err` when the window is full. When only the spacing is
    /// violated, sleeps (outside the lock) and re-checks, so a window that filled up
    /// during the sleep still rejects.
    pub async fn admit(&self) -> std::result::Result<Admitted, AdmissionRejected> {
        let started = Instant::now();

        loop {
            match self.check_at(Instant::now()) {
                Check::Admitted => {
                    let waited = started.elapsed();
                    debug!(waited_ms = waited.as_millis() as u64, "Outbound call admitted");
                    return Ok(Admitted { waited });
                }
                Check::Rejected(rejection) => {
                    warn!(
                        retry_after_secs = rejection.retry_after.as_secs_f64(),
                        "Outbound call rejected, window full"
                    );
                    return Err(rejection);
                }
                Check::Wait(delay) => {
                    debug!(delay_ms = delay.as_millis() as u64, "Throttling outbound call");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Admissions still inside the window at `now`
    pub fn in_window_at(&self, now: Instant) -> usize {
        self.timestamps
            .lock()
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < self.config.window)
            .count()
    }

    pub fn stats(&self) -> &AdmissionStats {
        &self.stats
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        AdmissionSnapshot {
            admitted: self.stats.admitted.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            throttled: self.stats.throttled.load(Ordering::Relaxed),
            in_window: self.in_window_at(Instant::now()),
            max_requests: self.config.max_requests,
            window_secs: self.config.window.as_secs_f64(),
        }
    }

    #[cfg(test)]
    fn recorded(&self) -> Vec<Instant> {
        self.timestamps.lock().iter().copied().collect()
    }
}
