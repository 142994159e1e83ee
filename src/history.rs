//! ==============================================================================
//! history.rs - bounded rolling history for the trend charts
//! ==============================================================================
//!
//! purpose:
//!     the grid only gives the charts the last few rows. the sparklines want a
//!     longer view, so every poll pushes the latest values into a fixed-size
//!     fifo per metric (about 90 seconds at a 1s interval).
//!
//! relationships:
//!     - used by: poll.rs (one record() per successful cycle)
//!
//! ==============================================================================

use std::collections::VecDeque;

use crate::domain::{Reading, Series};

/// entries kept per metric
pub const HISTORY_LIMIT: usize = 90;

/// fifo of recent samples for one metric
#[derive(Clone, Debug, Default)]
pub struct RollingHistory {
    samples: VecDeque<f64>,
}

impl RollingHistory {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY_LIMIT + 1),
        }
    }

    /// append a sample, evicting the oldest once the limit is exceeded
    pub fn push(&mut self, value: f64) {
        self.samples.push_back(value);
        if self.samples.len() > HISTORY_LIMIT {
            self.samples.pop_front();
        }
    }

    /// current contents, oldest first
    pub fn snapshot(&self) -> Series {
        self.samples.iter().copied().map(Some).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// per-metric histories owned by the poll loop
#[derive(Clone, Debug, Default)]
pub struct TelemetryHistory {
    pub voltage: RollingHistory,
    pub current: RollingHistory,
    pub temperature: RollingHistory,
}

impl TelemetryHistory {
    pub fn new() -> Self {
        Self {
            voltage: RollingHistory::new(),
            current: RollingHistory::new(),
            temperature: RollingHistory::new(),
        }
    }

    /// push every present value of `reading`.
    /// idle readings with exactly 0 V are dropped from the voltage history.
    pub fn record(&mut self, reading: &Reading) {
        if let Some(v) = reading.display_voltage() {
            self.voltage.push(v);
        } else if reading.is_idle_zero_voltage() {
            tracing::debug!("[HISTORY] skipping idle 0 V sample at {}", reading.timestamp);
        }
        if let Some(a) = reading.current {
            self.current.push(a);
        }
        if let Some(t) = reading.temp {
            self.temperature.push(t);
        }
    }
}
