//! ==============================================================================
//! dashboard.rs - the rendered dashboard view
//! ==============================================================================
//!
//! purpose:
//!     everything the web side shows, computed by the poll loop and published
//!     through a shared lock: status line, readout panel, chart svgs and the
//!     raw table. also renders the html page around it.
//!
//! relationships:
//!     - written by: poll.rs
//!     - read by: server.rs (/, /api/dashboard, /api/charts/*)
//!     - uses: render (svg charts), reading.rs (battery state)
//!
//! ==============================================================================

use std::fmt::Write;

use serde::Serialize;

use crate::config::PollConfig;
use crate::domain::{ChartSeries, RawGrid, Reading};
use crate::poll::PollPhase;
use crate::reading::BatteryState;
use crate::render::charts::TEMPERATURE_LINE;
use crate::render::svg::SvgSurface;
use crate::render::{draw_dual_series_chart, draw_gauge, draw_single_series_chart, draw_sparkline};

/// shown for any value the sheet did not provide
pub const MISSING: &str = "--";

// chart surfaces, in pixels
const GAUGE_SIZE: (f64, f64) = (220.0, 140.0);
const LINE_CHART_SIZE: (f64, f64) = (320.0, 120.0);
const SPARKLINE_SIZE: (f64, f64) = (160.0, 40.0);

#[derive(Clone, Debug, Serialize)]
pub struct StatusLine {
    pub text: String,
    pub is_error: bool,
}

impl StatusLine {
    pub fn waiting() -> Self {
        Self::info("Waiting for first poll")
    }

    pub fn fetching() -> Self {
        Self::info("Fetching…")
    }

    pub fn live() -> Self {
        Self::info("Live")
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            text: format!("Error: {}", message),
            is_error: true,
        }
    }

    fn info(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_error: false,
        }
    }
}

/// numeric readout panel, already formatted for display
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReadoutPanel {
    pub soc: String,
    pub soc_cc: String,
    pub soc_model: String,
    pub voltage: String,
    pub voltage_model: String,
    pub current: String,
    pub temperature: String,
    pub state: String,
    pub state_class: &'static str,
    pub timestamp: String,
}

impl Default for ReadoutPanel {
    fn default() -> Self {
        Self {
            soc: MISSING.into(),
            soc_cc: MISSING.into(),
            soc_model: MISSING.into(),
            voltage: MISSING.into(),
            voltage_model: MISSING.into(),
            current: MISSING.into(),
            temperature: MISSING.into(),
            state: MISSING.into(),
            state_class: BatteryState::Idle.css_class(),
            timestamp: MISSING.into(),
        }
    }
}

impl ReadoutPanel {
    pub fn from_reading(reading: &Reading) -> Self {
        let percent = |v: Option<f64>| fmt_or_missing(v, |n| format!("{:.0}%", n));
        let fixed = |v: Option<f64>, places: usize| fmt_or_missing(v, |n| format!("{:.*}", places, n));
        let text = |s: &str| if s.is_empty() { MISSING.to_string() } else { s.to_string() };

        Self {
            soc: percent(reading.soc_cc),
            soc_cc: percent(reading.soc_cc),
            soc_model: percent(reading.soc_model),
            voltage: fixed(reading.display_voltage(), 3),
            voltage_model: fixed(reading.v_model, 3),
            current: fixed(reading.current, 3),
            temperature: fixed(reading.temp, 2),
            state: text(&reading.status),
            state_class: BatteryState::classify(&reading.status).css_class(),
            timestamp: text(&reading.timestamp),
        }
    }
}

fn fmt_or_missing(value: Option<f64>, fmt: impl Fn(f64) -> String) -> String {
    value.map(fmt).unwrap_or_else(|| MISSING.to_string())
}

/// raw grid as strings: row 0 is the header, the rest the body
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TableView {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub placeholder: Option<String>,
}

impl TableView {
    pub fn from_grid(grid: &RawGrid) -> Self {
        let stringify = |row: &Vec<Option<String>>| -> Vec<String> {
            row.iter().map(|c| c.clone().unwrap_or_default()).collect()
        };
        let Some((header, body)) = grid.split_first() else {
            return Self {
                placeholder: Some("No data in the selected range.".to_string()),
                ..Self::default()
            };
        };
        Self {
            header: stringify(header),
            rows: body.iter().map(stringify).collect(),
            placeholder: None,
        }
    }
}

/// the four chart images as standalone svg documents
#[derive(Clone, Debug, Serialize)]
pub struct ChartImages {
    pub gauge: String,
    pub voltage: String,
    pub current: String,
    pub temperature: String,
}

impl Default for ChartImages {
    fn default() -> Self {
        Self::render(None, &ChartSeries::default(), &[])
    }
}

impl ChartImages {
    pub fn render(soc: Option<f64>, series: &ChartSeries, temperature: &[Option<f64>]) -> Self {
        let mut gauge = SvgSurface::new("soc-gauge", GAUGE_SIZE.0, GAUGE_SIZE.1);
        draw_gauge(&mut gauge, soc);

        let mut voltage = SvgSurface::new("volt-chart", LINE_CHART_SIZE.0, LINE_CHART_SIZE.1);
        draw_dual_series_chart(&mut voltage, &series.v_meas, &series.v_model);

        let mut current = SvgSurface::new("curr-chart", LINE_CHART_SIZE.0, LINE_CHART_SIZE.1);
        draw_single_series_chart(&mut current, &series.current);

        let mut temp = SvgSurface::new("temp-spark", SPARKLINE_SIZE.0, SPARKLINE_SIZE.1);
        draw_sparkline(&mut temp, temperature, TEMPERATURE_LINE);

        Self {
            gauge: gauge.to_svg(),
            voltage: voltage.to_svg(),
            current: current.to_svg(),
            temperature: temp.to_svg(),
        }
    }

    /// chart by its url name
    pub fn by_name(&self, name: &str) -> Option<&str> {
        match name.trim_end_matches(".svg") {
            "gauge" => Some(self.gauge.as_str()),
            "voltage" => Some(self.voltage.as_str()),
            "current" => Some(self.current.as_str()),
            "temperature" => Some(self.temperature.as_str()),
            _ => None,
        }
    }
}

/// everything the dashboard page shows
#[derive(Clone, Debug, Serialize)]
pub struct DashboardView {
    pub status: StatusLine,
    pub phase: PollPhase,
    pub last_updated: Option<String>,
    pub panel: ReadoutPanel,
    pub table: TableView,
    /// bumped whenever the table is rebuilt
    pub table_revision: u64,
    pub charts: ChartImages,
    pub config: PollConfig,
}

impl DashboardView {
    pub fn new(config: PollConfig) -> Self {
        Self {
            status: StatusLine::waiting(),
            phase: PollPhase::Idle,
            last_updated: None,
            panel: ReadoutPanel::default(),
            table: TableView::default(),
            table_revision: 0,
            charts: ChartImages::default(),
            config,
        }
    }
}

// ==============================================================================
// html page
// ==============================================================================

/// full dashboard page; reloads itself at the poll interval
pub fn render_page(view: &DashboardView) -> String {
    let refresh = view.config.interval.max(1.0).ceil() as u64;
    let p = &view.panel;
    let status_class = if view.status.is_error { "status error" } else { "status" };
    let last_updated = view
        .last_updated
        .as_deref()
        .map(|t| format!("Last updated: {}", t))
        .unwrap_or_default();

    let mut page = String::with_capacity(16 * 1024);
    let _ = write!(
        page,
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{refresh}">
<title>Battery Dashboard</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 1.5rem; background: #f8fafc; color: #0f172a; }}
.grid {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(340px, 1fr)); gap: 1rem; }}
.card {{ background: #fff; border: 1px solid #e2e8f0; border-radius: 8px; padding: 1rem; }}
.status {{ color: #334155; }} .status.error {{ color: #b91c1c; }}
.state-charging {{ color: #16a34a; }} .state-discharging {{ color: #f59e0b; }} .state-idle {{ color: #64748b; }}
table {{ border-collapse: collapse; width: 100%; font-size: 0.85rem; }}
th, td {{ border-bottom: 1px solid #e2e8f0; padding: 0.25rem 0.5rem; text-align: left; }}
dt {{ color: #64748b; font-size: 0.8rem; }} dd {{ margin: 0 0 0.5rem 0; font-size: 1.2rem; }}
</style>
</head>
<body>
<header>
<h1>Battery Dashboard</h1>
<form method="post" action="/config">
<label>Range <input name="range" value="{range}"></label>
<label>Interval (s) <input name="interval" value="{interval}" size="4"></label>
<button type="submit">Save</button>
<button type="submit" formaction="/refresh">Refresh now</button>
</form>
<p class="{status_class}">{status}</p>
<p>{last_updated}</p>
</header>
<section class="grid">
<div class="card">
<h2>State of charge</h2>
{gauge}
<p><strong>{soc}</strong></p>
</div>
<div class="card">
<dl>
<dt>SOC (CC)</dt><dd>{soc_cc}</dd>
<dt>SOC (model)</dt><dd>{soc_model}</dd>
<dt>Voltage (V)</dt><dd>{voltage}</dd>
<dt>Model voltage (V)</dt><dd>{voltage_model}</dd>
<dt>Current (A)</dt><dd>{current}</dd>
<dt>Temperature (°C)</dt><dd>{temperature} {temp_spark}</dd>
<dt>State</dt><dd class="{state_class}">{state}</dd>
<dt>Timestamp</dt><dd>{timestamp}</dd>
</dl>
</div>
<div class="card"><h2>Voltage</h2>{volt_chart}</div>
<div class="card"><h2>Current</h2>{curr_chart}</div>
</section>
<section class="card">
<h2>Raw data</h2>
"#,
        refresh = refresh,
        range = html_escape(&view.config.range),
        interval = view.config.interval,
        status_class = status_class,
        status = html_escape(&view.status.text),
        last_updated = html_escape(&last_updated),
        gauge = view.charts.gauge,
        soc = html_escape(&p.soc),
        soc_cc = html_escape(&p.soc_cc),
        soc_model = html_escape(&p.soc_model),
        voltage = html_escape(&p.voltage),
        voltage_model = html_escape(&p.voltage_model),
        current = html_escape(&p.current),
        temperature = html_escape(&p.temperature),
        temp_spark = view.charts.temperature,
        state_class = p.state_class,
        state = html_escape(&p.state),
        timestamp = html_escape(&p.timestamp),
        volt_chart = view.charts.voltage,
        curr_chart = view.charts.current,
    );

    write_table(&mut page, &view.table);
    page.push_str("</section>\n</body>\n</html>\n");
    page
}

fn write_table(page: &mut String, table: &TableView) {
    if let Some(placeholder) = &table.placeholder {
        let _ = writeln!(page, "<p>{}</p>", html_escape(placeholder));
        return;
    }
    page.push_str("<table>\n<thead><tr>");
    for cell in &table.header {
        let _ = write!(page, "<th>{}</th>", html_escape(cell));
    }
    page.push_str("</tr></thead>\n<tbody>\n");
    for row in &table.rows {
        page.push_str("<tr>");
        for cell in row {
            let _ = write!(page, "<td>{}</td>", html_escape(cell));
        }
        page.push_str("</tr>\n");
    }
    page.push_str("</tbody>\n</table>\n");
}

/// escape html special characters to prevent xss
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
