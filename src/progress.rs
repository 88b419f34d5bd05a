//! Live progress aggregation
//!
//! Workers push `(worker_id, fraction)` samples through a [`ProgressReporter`]
//! without ever blocking. The coordinating task owns the
//! [`ProgressAggregator`], drains whatever is queued on each poll, keeps the
//! latest fraction per worker and renders one combined line:
//!
//! ```text
//! Total: 75.00% [ T0: 50.00%  T1: 100.00% ]
//! ```
//!
//! One aggregator is built per run and handed to the workers at spawn time;
//! there is no process-wide queue.

use std::collections::BTreeMap;

use tokio::sync::mpsc::{self, error::TryRecvError};

/// One worker's self-reported completion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub worker_id: usize,
    /// In `[0, 1]`, non-decreasing per worker
    pub fraction: f64,
}

/// Receives rendered progress lines
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, line: &str);
}

/// Sink that drops every line
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _line: &str) {}
}

/// Producer handle given to one worker
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    worker_id: usize,
    tx: mpsc::UnboundedSender<ProgressSample>,
}

impl ProgressReporter {
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Report `processed` of `total` keys done
    pub fn report(&self, processed: usize, total: usize) {
        let fraction = if total == 0 {
            1.0
        } else {
            (processed as f64 / total as f64).min(1.0)
        };
        // A closed channel only means nobody is watching any more.
        let _ = self.tx.send(ProgressSample {
            worker_id: self.worker_id,
            fraction,
        });
    }
}

/// Merges samples from concurrent workers
#[derive(Debug)]
pub struct ProgressAggregator {
    tx: mpsc::UnboundedSender<ProgressSample>,
    rx: mpsc::UnboundedReceiver<ProgressSample>,
    latest: BTreeMap<usize, f64>,
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressAggregator {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            latest: BTreeMap::new(),
        }
    }

    /// Reporter for worker `worker_id`
    pub fn reporter(&self, worker_id: usize) -> ProgressReporter {
        ProgressReporter {
            worker_id,
            tx: self.tx.clone(),
        }
    }

    /// Pull every queued sample without waiting; returns how many were read
    ///
    /// Last write wins per worker.
    pub fn drain(&mut self) -> usize {
        self.drain_samples().len()
    }

    /// Like [`drain`](Self::drain), returning the samples in arrival order
    pub fn drain_samples(&mut self) -> Vec<ProgressSample> {
        let mut samples = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(sample) => {
                    self.latest.insert(sample.worker_id, sample.fraction);
                    samples.push(sample);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        samples
    }

    /// Latest fraction per worker seen so far
    pub fn latest(&self) -> &BTreeMap<usize, f64> {
        &self.latest
    }

    /// Mean of the known worker fractions, as a percentage
    pub fn average_percent(&self) -> Option<f64> {
        if self.latest.is_empty() {
            return None;
        }
        let sum: f64 = self.latest.values().sum();
        Some(sum / self.latest.len() as f64 * 100.0)
    }

    /// Combined line, or `None` until some worker has reported
    pub fn render(&self) -> Option<String> {
        let total = self.average_percent()?;
        let breakdown: String = self
            .latest
            .iter()
            .map(|(worker_id, fraction)| format!(" T{worker_id}: {:.2}% ", fraction * 100.0))
            .collect();
        Some(format!("Total: {total:.2}% [{breakdown}]"))
    }
}

/// Drain queued samples and render the combined line
pub fn render_progress(aggregator: &mut ProgressAggregator) -> Option<String> {
    aggregator.drain();
    aggregator.render()
}
