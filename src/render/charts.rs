//! ==============================================================================
//! charts.rs - the four dashboard visualizations
//! ==============================================================================
//!
//! every function clears the surface and redraws from its inputs only, so a
//! chart never depends on what was drawn before. missing samples are gaps:
//! the line lifts the pen over them and carries on with the next defined point.
//!
//!     gauge          state of charge, semicircle 180° -> 360°
//!     dual series    measured (filled + solid) vs model (dashed) voltage
//!     single series  current, filled line with point markers
//!     sparkline      temperature history, bare line bridging gaps
//!
//! ==============================================================================

use std::f64::consts::PI;

use super::{Color, Domain, Paint, Scale, Surface};

const CHART_PAD: f64 = 12.0;
const SPARK_PAD: f64 = 4.0;
const SPARK_LINE_WIDTH: f64 = 2.0;

const GAUGE_STROKE: f64 = 16.0;
const GAUGE_TRACK: Color = Color::hex(0xe2e8f0);
const GAUGE_GREEN: Color = Color::hex(0x16a34a);
const GAUGE_AMBER: Color = Color::hex(0xf59e0b);
const GAUGE_RED: Color = Color::hex(0xef4444);

/// stroke and fill colors of one plotted series
#[derive(Clone, Copy, Debug)]
pub struct SeriesStyle {
    pub line: Color,
    pub line_width: f64,
    pub dash: &'static [f64],
    /// gradient stops (top, bottom) for the area under the line
    pub area: Option<(Color, Color)>,
}

pub const VOLTAGE_MEASURED: SeriesStyle = SeriesStyle {
    line: Color::hex(0x0ea5e9),
    line_width: 2.5,
    dash: &[],
    area: Some((Color::rgba(14, 165, 233, 0.25), Color::rgba(14, 165, 233, 0.05))),
};

pub const VOLTAGE_MODEL: SeriesStyle = SeriesStyle {
    line: Color::hex(0x64748b),
    line_width: 1.5,
    dash: &[4.0, 3.0],
    area: None,
};

pub const CURRENT: SeriesStyle = SeriesStyle {
    line: Color::hex(0x10b981),
    line_width: 2.5,
    dash: &[],
    area: Some((Color::rgba(16, 185, 129, 0.25), Color::rgba(16, 185, 129, 0.05))),
};

pub const TEMPERATURE_LINE: Color = Color::hex(0xf97316);

const MARKER_RADIUS: f64 = 2.5;

// ==============================================================================
// gauge
// ==============================================================================

/// green above 60, amber above 20, red otherwise (after clamping to 0..=100)
pub fn gauge_color(value: f64) -> Color {
    let clamped = clamp_percent(Some(value));
    if clamped > 60.0 {
        GAUGE_GREEN
    } else if clamped > 20.0 {
        GAUGE_AMBER
    } else {
        GAUGE_RED
    }
}

fn clamp_percent(value: Option<f64>) -> f64 {
    value
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 100.0)
}

/// semicircular state-of-charge gauge; absent values draw as 0 %
pub fn draw_gauge<S: Surface + ?Sized>(surface: &mut S, value: Option<f64>) {
    let (w, h) = (surface.width(), surface.height());
    surface.clear();

    // center sits low so the half circle fills the surface
    let (cx, cy) = (w / 2.0, h * 0.9);
    let radius = w.min(h * 1.6) / 2.0;
    let (start, end) = (PI, 2.0 * PI);

    surface.set_line_dash(&[]);
    surface.set_line_width(GAUGE_STROKE);
    surface.begin_path();
    surface.arc(cx, cy, radius, start, end);
    surface.stroke(GAUGE_TRACK);

    let percent = clamp_percent(value);
    let value_end = start + (end - start) * (percent / 100.0);
    surface.begin_path();
    surface.arc(cx, cy, radius, start, value_end);
    surface.stroke(gauge_color(percent));
}

// ==============================================================================
// line charts
// ==============================================================================

/// measured series filled and solid, model series dashed, one shared y axis
pub fn draw_dual_series_chart<S: Surface + ?Sized>(
    surface: &mut S,
    primary: &[Option<f64>],
    secondary: &[Option<f64>],
) {
    surface.clear();
    let primary = normalize(primary);
    let secondary = normalize(secondary);
    let scale = chart_scale(surface, &[primary.as_slice(), secondary.as_slice()], CHART_PAD);

    draw_area(surface, &scale, &primary, &VOLTAGE_MEASURED);
    draw_line(surface, &scale, &primary, &VOLTAGE_MEASURED);
    draw_line(surface, &scale, &secondary, &VOLTAGE_MODEL);
}

/// one filled series with a dot on every defined point
pub fn draw_single_series_chart<S: Surface + ?Sized>(surface: &mut S, series: &[Option<f64>]) {
    surface.clear();
    let series = normalize(series);
    let scale = chart_scale(surface, &[series.as_slice()], CHART_PAD);

    draw_area(surface, &scale, &series, &CURRENT);
    draw_line(surface, &scale, &series, &CURRENT);
    draw_markers(surface, &scale, &series, CURRENT.line);
}

/// bare trend line with its own scale; nothing below two defined points,
/// gaps between defined points are bridged
pub fn draw_sparkline<S: Surface + ?Sized>(surface: &mut S, data: &[Option<f64>], color: Color) {
    surface.clear();
    let data = normalize(data);
    let mut values = data.iter().flatten().copied();
    let Some(first) = values.next() else {
        return;
    };
    let (mut min, mut max, mut defined) = (first, first, 1usize);
    for v in values {
        min = min.min(v);
        max = max.max(v);
        defined += 1;
    }
    if defined < 2 {
        return;
    }

    let scale = Scale {
        width: surface.width(),
        height: surface.height(),
        pad: SPARK_PAD,
        domain: Domain { min, max },
    };

    // unlike the line charts, the trend line bridges gaps
    let count = data.len();
    let mut points = data
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (scale.x_at(i, count), scale.y_at(v))));
    surface.begin_path();
    if let Some((x, y)) = points.next() {
        surface.move_to(x, y);
    }
    for (x, y) in points {
        surface.line_to(x, y);
    }
    surface.set_line_dash(&[]);
    surface.set_line_width(SPARK_LINE_WIDTH);
    surface.stroke(color);
}

// ==============================================================================
// helpers
// ==============================================================================

fn normalize(series: &[Option<f64>]) -> Vec<Option<f64>> {
    series
        .iter()
        .map(|v| v.filter(|n| n.is_finite()))
        .collect()
}

fn chart_scale<S: Surface + ?Sized>(surface: &S, series: &[&[Option<f64>]], pad: f64) -> Scale {
    Scale {
        width: surface.width(),
        height: surface.height(),
        pad,
        domain: Domain::shared(series),
    }
}

/// contiguous stretches of defined points as screen coordinates
fn runs(scale: &Scale, series: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let count = series.len();
    let mut runs = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for (i, value) in series.iter().enumerate() {
        match value {
            Some(v) => current.push((scale.x_at(i, count), scale.y_at(*v))),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

fn draw_area<S: Surface + ?Sized>(
    surface: &mut S,
    scale: &Scale,
    series: &[Option<f64>],
    style: &SeriesStyle,
) {
    let Some((top, bottom)) = style.area else {
        return;
    };
    let mut any = false;
    surface.begin_path();
    for run in runs(scale, series).iter().filter(|r| r.len() >= 2) {
        let (first_x, _) = run[0];
        let (last_x, _) = run[run.len() - 1];
        surface.move_to(run[0].0, run[0].1);
        for &(x, y) in &run[1..] {
            surface.line_to(x, y);
        }
        surface.line_to(last_x, scale.baseline());
        surface.line_to(first_x, scale.baseline());
        surface.close_path();
        any = true;
    }
    if any {
        surface.fill(Paint::VerticalGradient {
            y0: scale.pad,
            y1: scale.height,
            top,
            bottom,
        });
    }
}

fn draw_line<S: Surface + ?Sized>(
    surface: &mut S,
    scale: &Scale,
    series: &[Option<f64>],
    style: &SeriesStyle,
) {
    let mut any = false;
    surface.begin_path();
    for run in runs(scale, series).iter().filter(|r| r.len() >= 2) {
        surface.move_to(run[0].0, run[0].1);
        for &(x, y) in &run[1..] {
            surface.line_to(x, y);
        }
        any = true;
    }
    if any {
        surface.set_line_dash(style.dash);
        surface.set_line_width(style.line_width);
        surface.stroke(style.line);
        surface.set_line_dash(&[]);
    }
}

fn draw_markers<S: Surface + ?Sized>(
    surface: &mut S,
    scale: &Scale,
    series: &[Option<f64>],
    color: Color,
) {
    for run in runs(scale, series) {
        for (x, y) in run {
            surface.begin_path();
            surface.arc(x, y, MARKER_RADIUS, 0.0, 2.0 * PI);
            surface.fill(Paint::Solid(color));
        }
    }
}
