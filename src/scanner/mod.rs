//! Scanner module - orchestrates a scan from task production to report.
//!
//! A [`Scanner`] runs four phases in order:
//!
//! 1. [`start`](Scanner::start) spawns the task producer and the collector.
//! 2. [`scan`](Scanner::scan) feeds queued tasks to a bounded pool of probe
//!    workers and waits for the collector's completion signal.
//! 3. [`report`](Scanner::report) renders the aggregated results.
//! 4. [`stop`](Scanner::stop) releases channels and the log handle.

pub mod results;
pub mod tasks;
pub mod tcp;
pub mod traits;
pub mod tracker;

pub use results::{ResultGroup, ResultSummary, ResultTable};
pub use tasks::{ProductionState, TaskManager, TaskStream};
pub use tcp::ConnectProbe;
pub use traits::{
    PortState, Probe, ProbeOutcome, ScanConfig, ScanType, Task, DEFAULT_CONCURRENCY,
    DEFAULT_TIMEOUT,
};
pub use tracker::CompletionTracker;

use crate::error::{ScanError, ScanResult};
use crate::logging::LogHandle;
use crate::output::{self, OutputFormat};
use crate::types::{PortError, TargetError};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

/// Select the probe for a scan type.
///
/// Privileged strategies are refused without root first; strategies
/// without an implementation are refused after that.
pub fn create_probe(scan_type: ScanType) -> ScanResult<Arc<dyn Probe>> {
    if scan_type.requires_privileges() && !is_root() {
        return Err(ScanError::PermissionDenied(format!(
            "{} scan requires root privileges",
            scan_type
        )));
    }

    match scan_type {
        ScanType::Connect => Ok(Arc::new(ConnectProbe::new())),
        ScanType::Syn | ScanType::Fin | ScanType::Device => {
            Err(ScanError::UnsupportedStrategy(scan_type))
        }
    }
}

/// Check if running with root privileges.
pub fn is_root() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Channels and tasks alive between `start` and the end of `scan`.
struct Pipeline {
    tasks: mpsc::Receiver<Task>,
    outcomes: mpsc::Sender<ProbeOutcome>,
    completion: oneshot::Receiver<ResultTable>,
    producer: JoinHandle<()>,
    collector: JoinHandle<()>,
}

enum Phase {
    Idle,
    Running(Pipeline),
    Finished(ResultTable),
    Failed,
}

/// Concurrent scan orchestrator.
pub struct Scanner {
    config: ScanConfig,
    probe: Arc<dyn Probe>,
    task_manager: TaskManager,
    phase: Phase,
    log: LogHandle,
}

impl Scanner {
    /// Build a scanner over pre-expanded address and port lists.
    ///
    /// Fails before any task exists when a list is empty, the config is
    /// invalid, or the strategy cannot run.
    pub fn new(
        addresses: Vec<IpAddr>,
        ports: Vec<u16>,
        config: ScanConfig,
        log: LogHandle,
    ) -> ScanResult<Self> {
        if addresses.is_empty() {
            return Err(TargetError::Empty.into());
        }
        if ports.is_empty() {
            return Err(PortError::Empty.into());
        }
        config.validate().map_err(ScanError::InvalidConfig)?;
        let probe = create_probe(config.scan_type)?;

        Ok(Self {
            task_manager: TaskManager::new(addresses, ports, config.concurrency),
            config,
            probe,
            phase: Phase::Idle,
            log,
        })
    }

    /// Replace the probe strategy.
    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Number of tasks this scan produces.
    pub fn total_tasks(&self) -> usize {
        self.task_manager.total()
    }

    pub fn is_started(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// Aggregated results, available once `scan` has completed.
    pub fn results(&self) -> Option<&ResultTable> {
        match &self.phase {
            Phase::Finished(table) => Some(table),
            _ => None,
        }
    }

    /// Launch task production and outcome collection.
    pub fn start(&mut self) -> ScanResult<()> {
        if self.is_started() {
            return Err(ScanError::AlreadyStarted);
        }

        info!(
            tasks = self.total_tasks(),
            concurrency = self.config.concurrency,
            scan_type = %self.config.scan_type,
            "scan start"
        );

        let TaskStream {
            tasks,
            produced,
            producer,
        } = self.task_manager.start()?;
        let (outcome_tx, outcome_rx) = mpsc::channel(self.task_manager.queue_depth());
        let (done_tx, done_rx) = oneshot::channel();
        let collector = tokio::spawn(tracker::collect(
            outcome_rx,
            produced,
            self.progress_bar(),
            done_tx,
        ));

        self.phase = Phase::Running(Pipeline {
            tasks,
            outcomes: outcome_tx,
            completion: done_rx,
            producer,
            collector,
        });
        Ok(())
    }

    /// Probe every queued task and wait until all outcomes are collected.
    ///
    /// At most `concurrency` probes are in flight at any time.
    pub async fn scan(&mut self) -> ScanResult<()> {
        let pipeline = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Running(pipeline) => pipeline,
            Phase::Idle => return Err(ScanError::NotStarted),
            finished @ Phase::Finished(_) => {
                self.phase = finished;
                return Err(ScanError::AlreadyScanned);
            }
            Phase::Failed => {
                self.phase = Phase::Failed;
                return Err(ScanError::PipelineClosed);
            }
        };

        match self.drive(pipeline).await {
            Ok(table) => {
                debug!(addresses = table.len(), "results collected");
                self.phase = Phase::Finished(table);
                Ok(())
            }
            Err(e) => {
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    /// Run the worker pool over a started pipeline until collection ends.
    async fn drive(&self, pipeline: Pipeline) -> ScanResult<ResultTable> {
        let Pipeline {
            mut tasks,
            outcomes,
            completion,
            producer,
            collector,
        } = pipeline;

        let gate = Arc::new(Semaphore::new(self.config.concurrency));
        let mut workers = JoinSet::new();

        while let Some(task) = tasks.recv().await {
            let permit = Arc::clone(&gate)
                .acquire_owned()
                .await
                .map_err(|_| ScanError::PipelineClosed)?;
            let probe = Arc::clone(&self.probe);
            let outcomes = outcomes.clone();
            let timeout = self.config.timeout;

            workers.spawn(async move {
                let _permit = permit;
                let state = probe.probe(task.address, task.port, timeout).await;
                let _ = outcomes.send(ProbeOutcome::new(task, state)).await;
            });

            while let Some(joined) = workers.try_join_next() {
                log_worker_failure(joined);
            }
        }
        drop(outcomes);

        while let Some(joined) = workers.join_next().await {
            log_worker_failure(joined);
        }

        let table = completion.await.map_err(|_| ScanError::PipelineClosed)?;
        for handle in [producer, collector] {
            if let Err(e) = handle.await {
                error!(error = %e, "scan pipeline task failed");
            }
        }

        Ok(table)
    }

    /// Render the results. Repeatable; never touches scan state.
    ///
    /// Before `scan` has finished the rendered table is empty.
    pub fn report<W: Write>(&self, format: OutputFormat, out: &mut W) -> ScanResult<()> {
        let empty = ResultTable::new();
        let table = match &self.phase {
            Phase::Idle => return Err(ScanError::NotStarted),
            Phase::Failed => return Err(ScanError::PipelineClosed),
            Phase::Running(_) => &empty,
            Phase::Finished(table) => table,
        };

        info!("start print result");
        output::write_report(table, format, out)?;
        info!("end print result");
        Ok(())
    }

    /// Tear the scanner down and flush the log.
    pub fn stop(self) -> ScanResult<()> {
        info!("scanner stop");
        if let Phase::Running(pipeline) = self.phase {
            pipeline.producer.abort();
            pipeline.collector.abort();
        }
        self.log.close()?;
        Ok(())
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(self.total_tasks() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb
    }
}

fn log_worker_failure(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "probe worker failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    /// Probe that records peak concurrency and reports even ports open.
    #[derive(Default)]
    struct CountingProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Probe for CountingProbe {
        fn scan_type(&self) -> ScanType {
            ScanType::Connect
        }

        async fn probe(&self, _address: IpAddr, port: u16, _timeout: Duration) -> PortState {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if port % 2 == 0 {
                PortState::Opened
            } else {
                PortState::Closed
            }
        }
    }

    struct PanickingProbe;

    #[async_trait]
    impl Probe for PanickingProbe {
        fn scan_type(&self) -> ScanType {
            ScanType::Connect
        }

        async fn probe(&self, _address: IpAddr, port: u16, _timeout: Duration) -> PortState {
            if port == 2 {
                panic!("probe failure");
            }
            PortState::Closed
        }
    }

    fn addresses(n: u8) -> Vec<IpAddr> {
        (1..=n).map(|i| IpAddr::V4(Ipv4Addr::new(10, 9, 8, i))).collect()
    }

    #[tokio::test]
    async fn test_listener_scenario() {
        let open = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let closed_a = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let closed_b = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let ports = vec![
            closed_a.local_addr().unwrap().port(),
            open.local_addr().unwrap().port(),
            closed_b.local_addr().unwrap().port(),
        ];
        drop(closed_a);
        drop(closed_b);

        let config = ScanConfig::new().with_timeout(Duration::from_secs(2));
        let mut scanner =
            Scanner::new(vec![LOCALHOST], ports.clone(), config, LogHandle::disabled()).unwrap();
        assert_ok!(scanner.start());
        assert_ok!(scanner.scan().await);

        let group = scanner.results().unwrap().get(&LOCALHOST).unwrap();
        assert_eq!(group.opened.iter().copied().collect::<Vec<_>>(), vec![ports[1]]);
        let mut closed = vec![ports[0], ports[2]];
        closed.sort_unstable();
        assert_eq!(group.closed.iter().copied().collect::<Vec<_>>(), closed);
        assert!(group.unresponsive.is_empty());

        assert_ok!(scanner.stop());
    }

    #[tokio::test]
    async fn test_every_task_reports_once_within_concurrency_limit() {
        let probe = Arc::new(CountingProbe::default());
        let config = ScanConfig::new().with_concurrency(4);
        let ports: Vec<u16> = (1..=25).collect();
        let mut scanner = Scanner::new(addresses(4), ports, config, LogHandle::disabled())
            .unwrap()
            .with_probe(probe.clone());
        assert_eq!(scanner.total_tasks(), 100);

        scanner.start().unwrap();
        scanner.scan().await.unwrap();

        let summary = scanner.results().unwrap().summary();
        assert_eq!(summary.addresses, 4);
        assert_eq!(summary.total(), 100);
        assert_eq!(summary.opened, 4 * 12);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 100);
        assert!(probe.peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_report_is_repeatable() {
        let mut scanner = Scanner::new(
            addresses(2),
            vec![3, 1, 2],
            ScanConfig::new(),
            LogHandle::disabled(),
        )
        .unwrap()
        .with_probe(Arc::new(CountingProbe::default()));
        scanner.start().unwrap();
        scanner.scan().await.unwrap();

        for format in [OutputFormat::Plain, OutputFormat::Json, OutputFormat::Csv] {
            let mut first = Vec::new();
            let mut second = Vec::new();
            scanner.report(format, &mut first).unwrap();
            scanner.report(format, &mut second).unwrap();
            assert_eq!(first, second);
        }
    }

    #[tokio::test]
    async fn test_usage_sequence_errors() {
        let mut scanner =
            Scanner::new(addresses(1), vec![1], ScanConfig::new(), LogHandle::disabled())
                .unwrap()
                .with_probe(Arc::new(CountingProbe::default()));

        assert!(matches!(scanner.scan().await, Err(ScanError::NotStarted)));
        assert!(matches!(
            scanner.report(OutputFormat::Plain, &mut Vec::new()),
            Err(ScanError::NotStarted)
        ));

        scanner.start().unwrap();
        assert!(matches!(scanner.start(), Err(ScanError::AlreadyStarted)));
        scanner.scan().await.unwrap();
        assert!(matches!(scanner.scan().await, Err(ScanError::AlreadyScanned)));
        assert!(scanner.results().is_some());
    }

    #[tokio::test]
    async fn test_stop_without_scan_releases_pipeline() {
        let mut scanner = Scanner::new(
            addresses(3),
            (1..=50).collect(),
            ScanConfig::new().with_concurrency(2),
            LogHandle::disabled(),
        )
        .unwrap();
        scanner.start().unwrap();
        assert_ok!(scanner.stop());
    }

    #[tokio::test]
    async fn test_panicking_probe_fails_scan() {
        let mut scanner =
            Scanner::new(addresses(1), vec![1, 2, 3], ScanConfig::new(), LogHandle::disabled())
                .unwrap()
                .with_probe(Arc::new(PanickingProbe));
        scanner.start().unwrap();
        assert!(matches!(scanner.scan().await, Err(ScanError::PipelineClosed)));

        assert!(scanner.is_started());
        assert!(scanner.results().is_none());
        assert!(matches!(
            scanner.report(OutputFormat::Plain, &mut Vec::new()),
            Err(ScanError::PipelineClosed)
        ));
        assert!(matches!(scanner.scan().await, Err(ScanError::PipelineClosed)));
        assert_ok!(scanner.stop());
    }

    #[test]
    fn test_construction_checks() {
        assert!(matches!(
            Scanner::new(vec![], vec![80], ScanConfig::new(), LogHandle::disabled()),
            Err(ScanError::Target(TargetError::Empty))
        ));
        assert!(matches!(
            Scanner::new(addresses(1), vec![], ScanConfig::new(), LogHandle::disabled()),
            Err(ScanError::Port(PortError::Empty))
        ));
        assert!(matches!(
            Scanner::new(
                addresses(1),
                vec![80],
                ScanConfig::new().with_concurrency(0),
                LogHandle::disabled()
            ),
            Err(ScanError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_strategy_selection() {
        assert!(create_probe(ScanType::Connect).is_ok());
        assert!(matches!(
            create_probe(ScanType::Device),
            Err(ScanError::UnsupportedStrategy(ScanType::Device))
        ));
        for scan_type in [ScanType::Syn, ScanType::Fin] {
            match create_probe(scan_type) {
                Err(ScanError::PermissionDenied(_)) => assert!(!is_root()),
                Err(ScanError::UnsupportedStrategy(t)) => {
                    assert!(is_root());
                    assert_eq!(t, scan_type);
                }
                other => panic!("unexpected selection result: {:?}", other.map(|p| p.scan_type())),
            }
        }
    }
}
