//! ==============================================================================
//! poll.rs - fetch / extract / render cycle and its scheduler
//! ==============================================================================
//!
//! purpose:
//!     one cycle: fetch the grid -> rebuild the table if it changed -> extract
//!     the latest reading -> update history -> redraw charts -> publish.
//!     the scheduler runs cycles on a repeating timer and on demand.
//!
//! cycle states:
//!
//!     Idle ──► Fetching ──┬──► Rendering ──► Idle   (status "Live")
//!                         └──► Failed ─────► Idle   (status "Error: ...")
//!
//!     a failed cycle never stops the timer. there is no backoff or retry.
//!
//! scheduling:
//!     a single task owns the Poller, so cycles never overlap:
//!     - timer ticks every max(1s, interval); a tick that comes due while a
//!       cycle is still running is skipped, not queued, and the next cycle
//!       waits for the following period boundary
//!     - refresh_now() runs an extra cycle, the timer keeps its phase
//!     - reconfigure() resets change detection, runs a cycle and restarts
//!       the timer with the new period
//!
//! relationships:
//!     - uses: source.rs, reading.rs, history.rs, fingerprint.rs, dashboard.rs
//!     - spawned by: main.rs; driven by: server.rs (PollHandle)
//!
//! ==============================================================================

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::config::PollConfig;
use crate::dashboard::{ChartImages, DashboardView, ReadoutPanel, StatusLine, TableView};
use crate::domain::RawGrid;
use crate::fingerprint::ChangeDetector;
use crate::history::TelemetryHistory;
use crate::reading::{last_n_series, latest_reading};
use crate::source::{FetchError, ValuesSource};

/// rows shown by the voltage and current charts
pub const CHART_ROWS: usize = 10;

/// dashboard view shared with the web server
pub type SharedView = Arc<RwLock<DashboardView>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollPhase {
    Idle,
    Fetching,
    Rendering,
    Failed,
}

// ==============================================================================
// one cycle
// ==============================================================================

/// owns everything that must survive between cycles
pub struct Poller {
    source: Arc<dyn ValuesSource>,
    history: TelemetryHistory,
    changes: ChangeDetector,
    view: SharedView,
    show_readings: bool,
}

impl Poller {
    pub fn new(source: Arc<dyn ValuesSource>, view: SharedView, show_readings: bool) -> Self {
        Self {
            source,
            history: TelemetryHistory::new(),
            changes: ChangeDetector::new(),
            view,
            show_readings,
        }
    }

    /// run one fetch-render cycle; the error is already published when returned
    pub async fn run_cycle(&mut self, config: &PollConfig) -> Result<(), FetchError> {
        self.set_phase(PollPhase::Fetching, Some(StatusLine::fetching()), config)
            .await;

        match self.source.fetch(&config.range).await {
            Ok(grid) => {
                self.set_phase(PollPhase::Rendering, None, config).await;
                self.render(&grid).await;
                Ok(())
            }
            Err(e) => {
                tracing::error!("[POLL] fetch from {} failed: {}", self.source.describe(), e);
                self.set_phase(PollPhase::Failed, Some(StatusLine::error(&e)), config)
                    .await;
                self.set_phase(PollPhase::Idle, None, config).await;
                Err(e)
            }
        }
    }

    /// next observation rebuilds the table regardless of content
    pub fn reset_change_detection(&mut self) {
        self.changes.reset();
    }

    async fn set_phase(&self, phase: PollPhase, status: Option<StatusLine>, config: &PollConfig) {
        tracing::trace!("[POLL] phase -> {:?}", phase);
        let mut view = self.view.write().await;
        view.phase = phase;
        if let Some(status) = status {
            view.status = status;
        }
        if view.config != *config {
            view.config = config.clone();
        }
    }

    async fn render(&mut self, grid: &RawGrid) {
        // heavy lifting happens before taking the lock
        let table = self.changes.observe(grid).then(|| TableView::from_grid(grid));

        let latest = latest_reading(grid);
        if let Some(reading) = &latest {
            self.history.record(reading);
            if self.show_readings {
                tracing::info!(
                    "[POLL] {} | SOC {:?}% | {:?} V | {:?} A | {:?} °C | {}",
                    reading.timestamp,
                    reading.soc_cc,
                    reading.v_meas,
                    reading.current,
                    reading.temp,
                    reading.status
                );
            }
        }

        let series = last_n_series(grid, CHART_ROWS);
        let charts = ChartImages::render(
            latest.as_ref().and_then(|r| r.soc_cc),
            &series,
            &self.history.temperature.snapshot(),
        );
        let panel = latest
            .as_ref()
            .map(ReadoutPanel::from_reading)
            .unwrap_or_default();
        let updated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        let mut view = self.view.write().await;
        if let Some(table) = table {
            view.table = table;
            view.table_revision += 1;
            tracing::debug!("[POLL] table rebuilt ({} rows)", grid.len());
        }
        view.panel = panel;
        view.charts = charts;
        view.last_updated = Some(updated);
        view.status = StatusLine::live();
        view.phase = PollPhase::Idle;
        tracing::debug!(
            "[POLL] history: {} V / {} A / {} °C samples",
            self.history.voltage.len(),
            self.history.current.len(),
            self.history.temperature.len()
        );
    }
}

// ==============================================================================
// scheduler
// ==============================================================================

#[derive(Debug)]
enum PollCommand {
    RefreshNow,
    Reconfigure(PollConfig),
    Shutdown,
}

/// cheap, cloneable control handle for the poll task
#[derive(Clone)]
pub struct PollHandle {
    commands: mpsc::Sender<PollCommand>,
}

impl PollHandle {
    /// run an extra cycle as soon as the current one (if any) finishes
    pub async fn refresh_now(&self) -> anyhow::Result<()> {
        self.send(PollCommand::RefreshNow).await
    }

    /// switch range/interval: immediate cycle, then the timer restarts
    pub async fn reconfigure(&self, config: PollConfig) -> anyhow::Result<()> {
        self.send(PollCommand::Reconfigure(config)).await
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.send(PollCommand::Shutdown).await
    }

    async fn send(&self, command: PollCommand) -> anyhow::Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("poll loop is not running"))
    }
}

/// start the poll task; the first cycle runs immediately
pub fn spawn(poller: Poller, config: PollConfig) -> (PollHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(16);
    let task = tokio::spawn(run(poller, config, rx));
    (PollHandle { commands: tx }, task)
}

fn ticker(config: &PollConfig, first: Instant) -> Interval {
    let mut ticker = interval_at(first, config.period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn run(mut poller: Poller, mut config: PollConfig, mut commands: mpsc::Receiver<PollCommand>) {
    tracing::info!(
        "[POLL] polling {} every {:?} from {}",
        config.range,
        config.period(),
        poller.source.describe()
    );
    // end of the last cycle; ticks due before it were missed while busy
    let mut idle_since = Instant::now();
    let mut timer = ticker(&config, Instant::now());

    loop {
        tokio::select! {
            due = timer.tick() => {
                if due < idle_since {
                    tracing::debug!("[POLL] tick missed during a running cycle, skipped");
                    continue;
                }
                let _ = poller.run_cycle(&config).await;
                idle_since = Instant::now();
            }
            command = commands.recv() => match command {
                Some(PollCommand::RefreshNow) => {
                    tracing::debug!("[POLL] manual refresh");
                    let _ = poller.run_cycle(&config).await;
                    idle_since = Instant::now();
                }
                Some(PollCommand::Reconfigure(next)) => {
                    tracing::info!("[POLL] reconfigured: {} every {:?}", next.range, next.period());
                    config = next;
                    poller.reset_change_detection();
                    let _ = poller.run_cycle(&config).await;
                    idle_since = Instant::now();
                    timer = ticker(&config, idle_since + config.period());
                }
                Some(PollCommand::Shutdown) | None => break,
            },
        }
    }
    tracing::info!("[POLL] stopped");
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// replays scripted responses, repeating the last one when exhausted
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<RawGrid, (u16, String)>>>,
        last: Mutex<Option<Result<RawGrid, (u16, String)>>>,
        calls: AtomicUsize,
        ranges: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<RawGrid, (u16, String)>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                ranges: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ValuesSource for ScriptedSource {
        async fn fetch(&self, range: &str) -> Result<RawGrid, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.ranges.lock().unwrap().push(range.to_string());
            let next = self.script.lock().unwrap().pop_front();
            let outcome = match next {
                Some(outcome) => {
                    *self.last.lock().unwrap() = Some(outcome.clone());
                    outcome
                }
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or_else(|| Ok(Vec::new())),
            };
            outcome.map_err(|(status, body)| FetchError::Http { status, body })
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    /// answers every fetch after a fixed delay
    struct SlowSource {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ValuesSource for SlowSource {
        async fn fetch(&self, _range: &str) -> Result<RawGrid, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Vec::new())
        }

        fn describe(&self) -> String {
            "slow".into()
        }
    }

    fn grid(rows: &[&[&str]]) -> RawGrid {
        rows.iter()
            .map(|r| r.iter().map(|c| Some(c.to_string())).collect())
            .collect()
    }

    fn telemetry(rows: &[&[&str]]) -> RawGrid {
        let mut g = grid(&[&[
            "Timestamp", "SOC CC", "SOC Model", "Status", "V Meas (V)", "V Model (V)",
            "Current (A)", "Temp (C)",
        ]]);
        g.extend(grid(rows));
        g
    }

    fn setup(source: Arc<ScriptedSource>) -> (Poller, SharedView) {
        let view = Arc::new(RwLock::new(DashboardView::new(PollConfig::default())));
        (Poller::new(source, view.clone(), false), view)
    }

    #[tokio::test]
    async fn test_successful_cycle_publishes_view() {
        let source = ScriptedSource::new(vec![Ok(telemetry(&[
            &["t1", "80", "79", "Discharging", "3.90", "3.91", "-1.2", "24.0"],
            &["t2", "75", "74", "Discharging", "3.85", "3.86", "-1.3", "24.5"],
        ]))]);
        let (mut poller, view) = setup(source.clone());

        poller.run_cycle(&PollConfig::default()).await.unwrap();

        let view = view.read().await;
        assert_eq!(view.status.text, "Live");
        assert!(!view.status.is_error);
        assert_eq!(view.phase, PollPhase::Idle);
        assert!(view.last_updated.is_some());
        assert_eq!(view.panel.soc, "75%");
        assert_eq!(view.panel.voltage, "3.850");
        assert_eq!(view.panel.timestamp, "t2");
        assert_eq!(view.table.rows.len(), 2);
        assert_eq!(view.table_revision, 1);
        assert!(view.charts.gauge.contains("#16a34a"), "75% is green");
        assert!(view.charts.voltage.contains("stroke-dasharray"));
        assert_eq!(source.ranges.lock().unwrap().as_slice(), ["Sheet1!A1:H1000"]);
    }

    #[tokio::test]
    async fn test_failed_cycle_surfaces_error() {
        let source = ScriptedSource::new(vec![
            Ok(telemetry(&[&["t1", "50", "", "Idle", "3.7", "", "0", "20"]])),
            Err((500, "backend exploded".into())),
        ]);
        let (mut poller, view) = setup(source);

        poller.run_cycle(&PollConfig::default()).await.unwrap();
        let err = poller.run_cycle(&PollConfig::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500: backend exploded");

        let view = view.read().await;
        assert_eq!(view.status.text, "Error: HTTP 500: backend exploded");
        assert!(view.status.is_error);
        assert_eq!(view.phase, PollPhase::Idle);
        assert_eq!(view.table.rows.len(), 1, "previous table stays");
        assert_eq!(view.panel.timestamp, "t1");
    }

    #[tokio::test]
    async fn test_table_rebuilt_only_on_change() {
        let first = telemetry(&[&["t1", "50", "", "Idle", "3.7", "", "0", "20"]]);
        let second = telemetry(&[&["t1", "50", "", "Idle", "3.7", "", "0", "21"]]);
        let source = ScriptedSource::new(vec![Ok(first.clone()), Ok(first), Ok(second)]);
        let (mut poller, view) = setup(source);
        let config = PollConfig::default();

        poller.run_cycle(&config).await.unwrap();
        poller.run_cycle(&config).await.unwrap();
        assert_eq!(view.read().await.table_revision, 1);

        poller.run_cycle(&config).await.unwrap();
        assert_eq!(view.read().await.table_revision, 2);

        poller.reset_change_detection();
        poller.run_cycle(&config).await.unwrap();
        assert_eq!(view.read().await.table_revision, 3);
    }

    #[tokio::test]
    async fn test_history_skips_idle_zero_voltage() {
        let source = ScriptedSource::new(vec![
            Ok(telemetry(&[&["t1", "50", "", "Idle", "0", "", "0", "20"]])),
            Ok(telemetry(&[&["t2", "50", "", "Charging", "0", "", "0.5", "21"]])),
        ]);
        let (mut poller, view) = setup(source);
        let config = PollConfig::default();

        poller.run_cycle(&config).await.unwrap();
        assert_eq!(view.read().await.panel.voltage, "--");
        poller.run_cycle(&config).await.unwrap();

        assert_eq!(poller.history.voltage.snapshot(), vec![Some(0.0)]);
        assert_eq!(poller.history.current.snapshot(), vec![Some(0.0), Some(0.5)]);
        assert_eq!(poller.history.temperature.snapshot(), vec![Some(20.0), Some(21.0)]);
    }

    #[tokio::test]
    async fn test_empty_grid_is_not_an_error() {
        let source = ScriptedSource::new(vec![Ok(Vec::new())]);
        let (mut poller, view) = setup(source);

        poller.run_cycle(&PollConfig::default()).await.unwrap();
        let view = view.read().await;
        assert_eq!(view.status.text, "Live");
        assert_eq!(view.panel, ReadoutPanel::default());
        assert!(view.table.placeholder.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_keeps_running_through_failures() {
        let source = ScriptedSource::new(vec![Err((503, "down".into()))]);
        let (poller, view) = setup(source.clone());
        let (handle, task) = spawn(poller, PollConfig::default());

        // ticks at 0s, 1s, 2s
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(source.calls(), 3);
        assert!(view.read().await.status.is_error);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_skips_ticks_due_mid_cycle() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_millis(2500),
            calls: AtomicUsize::new(0),
        });
        let view = Arc::new(RwLock::new(DashboardView::new(PollConfig::default())));
        let poller = Poller::new(source.clone(), view, false);
        let (handle, task) = spawn(poller, PollConfig::default());

        // first fetch runs 0s..2.5s; the 1s and 2s ticks are dropped
        tokio::time::sleep(Duration::from_millis(2600)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // next fetch waits for the 3s boundary, not right after the first
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        // 3s..5.5s busy, then idle until 6s
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_now_does_not_move_the_timer() {
        let source = ScriptedSource::new(vec![Ok(Vec::new())]);
        let (poller, _view) = setup(source.clone());
        let (handle, task) = spawn(poller, PollConfig::default());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(source.calls(), 1, "initial cycle");

        handle.refresh_now().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(source.calls(), 2);

        // the regular tick at 1s still fires
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(source.calls(), 3);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_restarts_timer() {
        let source = ScriptedSource::new(vec![Ok(Vec::new())]);
        let (poller, view) = setup(source.clone());
        let (handle, task) = spawn(poller, PollConfig::default());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(source.calls(), 1);

        let next = PollConfig { range: "Log!A1:H50".into(), interval: 5.0 };
        handle.reconfigure(next.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(source.calls(), 2, "immediate cycle on save");
        assert_eq!(view.read().await.config, next);

        // old 1s cadence is gone; next tick is 5s after the save
        tokio::time::sleep(Duration::from_millis(4000)).await;
        assert_eq!(source.calls(), 2);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(source.calls(), 3);
        assert_eq!(source.ranges.lock().unwrap().last().unwrap(), "Log!A1:H50");

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
