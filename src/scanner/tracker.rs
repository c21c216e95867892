//! Scan termination tracking.
//!
//! Two events race during a scan: probe outcomes arriving one by one, and
//! the producer reporting how many tasks it created. Either can come last.
//! [`CompletionTracker`] keeps one counter per source and fires a single
//! edge when the total is known and every task has reported.

use crate::scanner::results::ResultTable;
use crate::scanner::traits::ProbeOutcome;
use indicatif::ProgressBar;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Edge-triggered completion predicate over two counters.
#[derive(Debug, Default, Clone)]
pub struct CompletionTracker {
    completed: usize,
    total: Option<usize>,
    fired: bool,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished task. Returns `true` only on the completing event.
    pub fn record_outcome(&mut self) -> bool {
        self.completed += 1;
        self.evaluate()
    }

    /// Learn the task total. Returns `true` only on the completing event.
    ///
    /// The total is reported once; later values are ignored.
    pub fn set_total(&mut self, total: usize) -> bool {
        if self.total.is_none() {
            self.total = Some(total);
        }
        self.evaluate()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> Option<usize> {
        self.total
    }

    /// Whether the completion edge has fired.
    pub fn is_complete(&self) -> bool {
        self.fired
    }

    fn evaluate(&mut self) -> bool {
        if self.fired || self.total != Some(self.completed) {
            return false;
        }
        self.fired = true;
        true
    }
}

/// Consume outcomes and the production total until the scan completes.
///
/// Owns the result table for the whole scan and hands it over through
/// `done` exactly once. If both sources close before completion, `done`
/// is dropped so the waiting side sees the failure.
pub(crate) async fn collect(
    mut outcomes: mpsc::Receiver<ProbeOutcome>,
    mut produced: oneshot::Receiver<usize>,
    progress: ProgressBar,
    done: oneshot::Sender<ResultTable>,
) {
    let mut table = ResultTable::new();
    let mut tracker = CompletionTracker::new();
    let mut outcomes_open = true;
    let mut total_pending = true;

    loop {
        let complete = tokio::select! {
            outcome = outcomes.recv(), if outcomes_open => match outcome {
                Some(outcome) => {
                    debug!(address = %outcome.address, port = outcome.port, state = %outcome.state, "probe finished");
                    table.record(outcome);
                    progress.inc(1);
                    tracker.record_outcome()
                }
                None => {
                    outcomes_open = false;
                    false
                }
            },
            total = &mut produced, if total_pending => {
                total_pending = false;
                match total {
                    Ok(total) => {
                        info!(total, "task production finished");
                        progress.set_length(total as u64);
                        tracker.set_total(total)
                    }
                    Err(_) => false,
                }
            },
            else => {
                error!(
                    completed = tracker.completed(),
                    total = ?tracker.total(),
                    "scan pipeline closed before completion"
                );
                progress.abandon();
                return;
            }
        };

        if complete {
            info!(completed = tracker.completed(), "scan finished");
            progress.finish_and_clear();
            let _ = done.send(table);
            return;
        }
    }
}
