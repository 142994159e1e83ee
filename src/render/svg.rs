//! ==============================================================================
//! svg.rs - svg backend for the Surface trait
//! ==============================================================================
//!
//! purpose:
//!     renders chart paths into a standalone <svg> element that the dashboard
//!     page inlines and /api/charts serves as image/svg+xml.
//!
//! notes:
//!     - every stroke/fill becomes one <path>; the path data is kept after
//!       painting, canvas style, until begin_path()
//!     - gradient ids are prefixed with the surface id so several charts can
//!       share one html page
//!
//! ==============================================================================

use std::f64::consts::PI;
use std::fmt::Write;

use super::{Color, Paint, Surface};

pub struct SvgSurface {
    id: String,
    width: f64,
    height: f64,
    defs: Vec<String>,
    elements: Vec<String>,
    path: String,
    painted_segments: bool,
    cursor: Option<(f64, f64)>,
    subpath_start: Option<(f64, f64)>,
    line_width: f64,
    dash: Vec<f64>,
    gradients: usize,
}

impl SvgSurface {
    pub fn new(id: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            defs: Vec::new(),
            elements: Vec::new(),
            path: String::new(),
            painted_segments: false,
            cursor: None,
            subpath_start: None,
            line_width: 1.0,
            dash: Vec::new(),
            gradients: 0,
        }
    }

    /// the finished document
    pub fn to_svg(&self) -> String {
        let mut out = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" id="{id}" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            id = self.id,
            w = num(self.width),
            h = num(self.height),
        );
        if !self.defs.is_empty() {
            out.push_str("<defs>");
            self.defs.iter().for_each(|d| out.push_str(d));
            out.push_str("</defs>");
        }
        self.elements.iter().for_each(|e| out.push_str(e));
        out.push_str("</svg>");
        out
    }

    fn push_move(&mut self, x: f64, y: f64) {
        let _ = write!(self.path, "M{} {} ", num(x), num(y));
        self.cursor = Some((x, y));
        self.subpath_start = Some((x, y));
    }

    fn push_line(&mut self, x: f64, y: f64) {
        let _ = write!(self.path, "L{} {} ", num(x), num(y));
        self.cursor = Some((x, y));
        self.painted_segments = true;
    }

    fn push_arc_segment(&mut self, radius: f64, large: bool, x: f64, y: f64) {
        let _ = write!(
            self.path,
            "A{r} {r} 0 {large} 1 {x} {y} ",
            r = num(radius),
            large = u8::from(large),
            x = num(x),
            y = num(y),
        );
        self.cursor = Some((x, y));
        self.painted_segments = true;
    }

    fn path_data(&self) -> &str {
        self.path.trim_end()
    }
}

impl Surface for SvgSurface {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn clear(&mut self) {
        self.defs.clear();
        self.elements.clear();
        self.gradients = 0;
        self.begin_path();
    }

    fn begin_path(&mut self) {
        self.path.clear();
        self.painted_segments = false;
        self.cursor = None;
        self.subpath_start = None;
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.push_move(x, y);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        if self.cursor.is_some() {
            self.push_line(x, y);
        } else {
            self.push_move(x, y);
        }
    }

    fn arc(&mut self, cx: f64, cy: f64, radius: f64, start: f64, end: f64) {
        let point = |angle: f64| (cx + radius * angle.cos(), cy + radius * angle.sin());
        let (sx, sy) = point(start);
        if self.cursor.is_some() {
            self.push_line(sx, sy);
        } else {
            self.push_move(sx, sy);
        }

        let sweep = end - start;
        if sweep <= 0.0 || radius <= 0.0 {
            return;
        }
        if sweep >= 2.0 * PI - 1e-9 {
            // svg cannot draw a closed circle in one arc command
            let (mx, my) = point(start + PI);
            self.push_arc_segment(radius, false, mx, my);
            self.push_arc_segment(radius, false, sx, sy);
        } else {
            let (ex, ey) = point(end);
            self.push_arc_segment(radius, sweep > PI, ex, ey);
        }
    }

    fn close_path(&mut self) {
        if self.cursor.is_some() {
            self.path.push_str("Z ");
            self.cursor = self.subpath_start;
        }
    }

    fn set_line_width(&mut self, width: f64) {
        self.line_width = width;
    }

    fn set_line_dash(&mut self, pattern: &[f64]) {
        self.dash = pattern.to_vec();
    }

    fn stroke(&mut self, color: Color) {
        if !self.painted_segments {
            return;
        }
        let mut element = format!(
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="{}""#,
            self.path_data(),
            color,
            num(self.line_width),
        );
        if !self.dash.is_empty() {
            let dash: Vec<String> = self.dash.iter().map(|d| num(*d)).collect();
            let _ = write!(element, r#" stroke-dasharray="{}""#, dash.join(" "));
        }
        element.push_str("/>");
        self.elements.push(element);
    }

    fn fill(&mut self, paint: Paint) {
        if !self.painted_segments {
            return;
        }
        let fill = match paint {
            Paint::Solid(color) => color.to_string(),
            Paint::VerticalGradient { y0, y1, top, bottom } => {
                self.gradients += 1;
                let gradient_id = format!("{}-grad{}", self.id, self.gradients);
                self.defs.push(format!(
                    r#"<linearGradient id="{gid}" gradientUnits="userSpaceOnUse" x1="0" y1="{y0}" x2="0" y2="{y1}"><stop offset="0" stop-color="{top}"/><stop offset="1" stop-color="{bottom}"/></linearGradient>"#,
                    gid = gradient_id,
                    y0 = num(y0),
                    y1 = num(y1),
                    top = top,
                    bottom = bottom,
                ));
                format!("url(#{})", gradient_id)
            }
        };
        self.elements
            .push(format!(r#"<path d="{}" fill="{}"/>"#, self.path_data(), fill));
    }
}

/// compact coordinate: at most two decimals, no trailing zeros
fn num(v: f64) -> String {
    let s = format!("{:.2}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
