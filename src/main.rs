//! ==============================================================================
//! main.rs - battery dashboard host entry point
//! ==============================================================================
//!
//! purpose:
//!     polls a spreadsheet of battery telemetry on a timer, turns the newest
//!     rows into a readout panel and charts, and serves the result as a web
//!     dashboard.
//!
//! responsibilities:
//!     - load host.toml, .env and environment overrides
//!     - resolve the poll settings (env > persisted > defaults)
//!     - pick the values source (remote /api/values or the sheet directly)
//!     - run the poll task and the web server
//!
//! relationships:
//!     - uses: config.rs, source.rs, sheets.rs, poll.rs, server.rs
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                      rust host (this file)                   │
//!     │  ┌──────────────────┐             ┌───────────────────────┐  │
//!     │  │ poll task        │  PollHandle │ web server            │  │
//!     │  │ (timer + cmds)   │◄────────────│ (port 3000)           │  │
//!     │  └────────┬─────────┘             └───────────┬───────────┘  │
//!     │           │ write                        read │              │
//!     │           └──────► Arc<RwLock<DashboardView>> ◄┘              │
//!     └───────────┼──────────────────────────────────────────────────┘
//!                 │ fetch(range)
//!        ┌────────┴────────┐
//!        ▼                 ▼
//!   remote host       spreadsheet provider
//!   /api/values       (values.get)
//!
//! data flow per cycle:
//!     grid -> fingerprint (table rebuild?) -> latest reading -> history
//!          -> last 10 rows -> charts -> view
//!
//! ==============================================================================

mod config;
mod dashboard;
mod domain;
mod fingerprint;
mod grid;
mod history;
mod poll;
mod reading;
mod render;
mod server;
mod sheets;
mod source;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

use crate::config::{HostConfig, PollConfig, PollOverrides, SettingsStore};
use crate::dashboard::DashboardView;
use crate::poll::Poller;
use crate::sheets::SheetsClient;
use crate::source::{HttpValuesSource, UnconfiguredSource, ValuesSource};

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  Battery Dashboard Host");
    println!("  spreadsheet telemetry -> live gauges and charts");
    println!("===========================================================");

    // step 1: load configuration (.env first so it can feed the overrides)
    dotenv::dotenv().ok();
    let mut config = HostConfig::load_or_default();
    config.apply_env();
    init_logging(&config);
    config.print_summary();

    // step 2: resolve the poll settings
    let settings = SettingsStore::new(&config.dashboard.settings_path);
    let poll_config = PollConfig::resolve(PollOverrides::from_env(), settings.load());
    println!(
        "[STARTUP] Polling {} every {:?}",
        poll_config.range,
        poll_config.period()
    );

    // step 3: pick the values source
    let sheets = SheetsClient::from_config(&config.sheets);
    let source = select_source(&config, sheets.clone());
    println!("[STARTUP] ✓ Values source: {}", source.describe());

    // step 4: start the poll task
    let view = Arc::new(RwLock::new(DashboardView::new(poll_config.clone())));
    let poller = Poller::new(source, view.clone(), config.logging.show_readings);
    let (poll, poll_task) = poll::spawn(poller, poll_config);

    // step 5: serve the dashboard in the foreground
    let web_state = server::WebState {
        view,
        poll: poll.clone(),
        settings,
        sheets,
        default_range: config.sheets.default_range.clone(),
    };
    println!("[STARTUP] ✓ Dashboard at http://{}", config.server.bind);
    println!("────────────────────────────────────────────────────────────");

    let served = server::run_server(&config.server.bind, web_state).await;
    if let Err(e) = &served {
        tracing::error!("[WEB] server error: {:#}", e);
    }

    // the server only returns on failure; stop polling before exiting
    poll.shutdown().await.ok();
    poll_task.await.ok();
    served
}

/// RUST_LOG wins over `[logging] level`
fn init_logging(config: &HostConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// remote values endpoint if configured, else the spreadsheet provider directly.
/// with neither, the host still serves and every cycle reports the setup error.
fn select_source(config: &HostConfig, sheets: Option<SheetsClient>) -> Arc<dyn ValuesSource> {
    if let Some(endpoint) = config.source.endpoint.as_deref().filter(|e| !e.is_empty()) {
        return Arc::new(HttpValuesSource::new(endpoint));
    }
    match sheets {
        Some(client) => Arc::new(client),
        None => {
            tracing::warn!("[CONFIG] {}", source::UNCONFIGURED_MESSAGE);
            Arc::new(UnconfiguredSource)
        }
    }
}
