//! Bounded sliding window over the most recent sensor samples.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::models::{SensorSample, AXIS_COUNT};
use crate::error::PipelineError;

pub const DEFAULT_WINDOW_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowState {
    pub ready: bool,
    pub samples_needed: usize,
}

/// FIFO window holding at most `capacity` samples in arrival order.
///
/// Once full, every push evicts exactly the oldest sample.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    capacity: usize,
    samples: VecDeque<SensorSample>,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: SensorSample) -> WindowState {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.state()
    }

    /// Validates raw axis values before touching the buffer.
    pub fn push_axes(
        &mut self,
        axes: [f64; AXIS_COUNT],
        received_at: DateTime<Utc>,
    ) -> Result<WindowState, PipelineError> {
        let sample = SensorSample::new(axes, received_at)?;
        Ok(self.push(sample))
    }

    /// Replaces the contents with the tail of `samples`, e.g. rows loaded at startup.
    pub fn seed<I>(&mut self, samples: I) -> WindowState
    where
        I: IntoIterator<Item = SensorSample>,
    {
        self.samples.clear();
        for sample in samples {
            self.push(sample);
        }
        self.state()
    }

    pub fn state(&self) -> WindowState {
        WindowState {
            ready: self.is_ready(),
            samples_needed: self.capacity - self.samples.len(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Owned copy of the window, oldest first.
    pub fn snapshot(&self) -> Vec<SensorSample> {
        self.samples.iter().cloned().collect()
    }

    pub fn magnitudes(&self) -> Vec<f64> {
        self.samples.iter().map(SensorSample::magnitude).collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
