//! Task production.
//!
//! The task manager walks the cartesian product of addresses and ports,
//! pushing one [`Task`] per pair through a bounded queue. Once the whole
//! product is queued it reports the task count on a one-shot channel and
//! closes the queue.

use crate::error::{ScanError, ScanResult};
use crate::scanner::traits::Task;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Lifecycle of task production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionState {
    Idle,
    Producing,
    Completed,
}

impl ProductionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Producing,
            _ => Self::Completed,
        }
    }
}

/// Receiving side of a running production.
#[derive(Debug)]
pub struct TaskStream {
    /// Queued tasks; yields `None` once production is over.
    pub tasks: mpsc::Receiver<Task>,
    /// Number of tasks produced, sent once after the last task is queued.
    pub produced: oneshot::Receiver<usize>,
    /// The producer itself.
    pub producer: JoinHandle<()>,
}

/// Generates scan tasks from pre-deduplicated address and port lists.
#[derive(Debug)]
pub struct TaskManager {
    addresses: Arc<[IpAddr]>,
    ports: Arc<[u16]>,
    queue_depth: usize,
    state: Arc<AtomicU8>,
}

impl TaskManager {
    /// Create a task manager whose queue holds at most
    /// `min(concurrency, total)` pending tasks.
    pub fn new(addresses: Vec<IpAddr>, ports: Vec<u16>, concurrency: usize) -> Self {
        let total = addresses.len() * ports.len();
        Self {
            addresses: addresses.into(),
            ports: ports.into(),
            queue_depth: concurrency.min(total).max(1),
            state: Arc::new(AtomicU8::new(ProductionState::Idle as u8)),
        }
    }

    /// Total number of tasks this manager produces.
    pub fn total(&self) -> usize {
        self.addresses.len() * self.ports.len()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    pub fn state(&self) -> ProductionState {
        ProductionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Spawn the producer. Production can only be started once.
    pub fn start(&self) -> ScanResult<TaskStream> {
        self.state
            .compare_exchange(
                ProductionState::Idle as u8,
                ProductionState::Producing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| ScanError::AlreadyStarted)?;

        let (task_tx, task_rx) = mpsc::channel(self.queue_depth);
        let (done_tx, done_rx) = oneshot::channel();
        let producer = tokio::spawn(produce(
            Arc::clone(&self.addresses),
            Arc::clone(&self.ports),
            task_tx,
            done_tx,
            Arc::clone(&self.state),
        ));

        Ok(TaskStream {
            tasks: task_rx,
            produced: done_rx,
            producer,
        })
    }
}

async fn produce(
    addresses: Arc<[IpAddr]>,
    ports: Arc<[u16]>,
    tasks: mpsc::Sender<Task>,
    done: oneshot::Sender<usize>,
    state: Arc<AtomicU8>,
) {
    let mut count = 0usize;

    'produce: for &address in addresses.iter() {
        for &port in ports.iter() {
            if tasks.send(Task::new(address, port)).await.is_err() {
                warn!(produced = count, "task queue closed before production finished");
                break 'produce;
            }
            count += 1;
        }
    }

    state.store(ProductionState::Completed as u8, Ordering::Release);
    debug!(total = count, "task production complete");
    let _ = done.send(count);
    // Dropping `tasks` here closes the queue for readers.
}
