//! ==============================================================================
//! render - vector drawing for the dashboard charts
//! ==============================================================================
//!
//! purpose:
//!     the chart code never talks to a concrete canvas. it draws through the
//!     `Surface` trait (canvas-style path primitives), so the same functions
//!     render to svg for the web page and to a recording surface in tests.
//!
//! layout:
//!     - mod.rs        colors, paints, the Surface trait, axis scaling
//!     - charts.rs     gauge, dual/single series charts, sparkline
//!     - svg.rs        svg backend (web dashboard)
//!     - recording.rs  op-recording backend (headless harness)
//!
//! ==============================================================================

pub mod charts;
#[cfg(test)]
pub mod recording;
pub mod svg;

pub use charts::{
    draw_dual_series_chart, draw_gauge, draw_single_series_chart, draw_sparkline,
};

use std::fmt;

/// rgba color; alpha in [0, 1]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    /// opaque color from 0xRRGGBB
    pub const fn hex(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xff) as u8,
            g: ((rgb >> 8) & 0xff) as u8,
            b: (rgb & 0xff) as u8,
            a: 1.0,
        }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// css notation: #rrggbb when opaque, rgba(...) otherwise
impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "rgba({},{},{},{})", self.r, self.g, self.b, self.a)
        }
    }
}

/// how a closed path is filled
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Paint {
    Solid(Color),
    /// vertical gradient from `top` at y0 to `bottom` at y1 (surface coordinates)
    VerticalGradient {
        y0: f64,
        y1: f64,
        top: Color,
        bottom: Color,
    },
}

/// minimal 2-D vector surface, modelled on the html canvas path api.
///
/// angles are radians measured from the +x axis, growing clockwise on screen
/// (y points down). `stroke` and `fill` consume the current path's geometry
/// but keep it, like canvas; call `begin_path` to start over.
pub trait Surface {
    fn width(&self) -> f64;
    fn height(&self) -> f64;

    /// erase everything drawn so far
    fn clear(&mut self);

    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    /// circular arc from `start` to `end`, clockwise. joins the current point
    /// to the arc start with a straight line if a sub-path is open.
    fn arc(&mut self, cx: f64, cy: f64, radius: f64, start: f64, end: f64);
    fn close_path(&mut self);

    fn set_line_width(&mut self, width: f64);
    /// dash pattern for subsequent strokes; empty slice means solid
    fn set_line_dash(&mut self, pattern: &[f64]);

    fn stroke(&mut self, color: Color);
    fn fill(&mut self, paint: Paint);
}

/// value range shared by everything drawn on one chart
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Domain {
    pub min: f64,
    pub max: f64,
}

impl Domain {
    /// min/max over every defined point of every series.
    /// [0, 1] when nothing is defined; a flat range is widened by 1.
    pub fn shared(series: &[&[Option<f64>]]) -> Self {
        let mut values = series.iter().flat_map(|s| s.iter().flatten().copied());
        let Some(first) = values.next() else {
            return Self { min: 0.0, max: 1.0 };
        };
        let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if min == max {
            Self { min, max: min + 1.0 }
        } else {
            Self { min, max }
        }
    }

    pub fn span(&self) -> f64 {
        (self.max - self.min).max(1e-9)
    }
}

/// maps (index, value) pairs into a padded drawing area
#[derive(Clone, Copy, Debug)]
pub struct Scale {
    pub width: f64,
    pub height: f64,
    pub pad: f64,
    pub domain: Domain,
}

impl Scale {
    /// x of point `i` in a series of `count` points
    pub fn x_at(&self, i: usize, count: usize) -> f64 {
        if count <= 1 {
            return self.pad;
        }
        self.pad + (self.width - 2.0 * self.pad) * (i as f64 / (count - 1) as f64)
    }

    /// y of `value`; larger values sit higher on screen
    pub fn y_at(&self, value: f64) -> f64 {
        self.height
            - self.pad
            - (self.height - 2.0 * self.pad) * ((value - self.domain.min) / self.domain.span())
    }

    /// bottom edge of the plot area
    pub fn baseline(&self) -> f64 {
        self.height - self.pad
    }
}
