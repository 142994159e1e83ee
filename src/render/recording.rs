//! op-recording surface, the headless backend used to inspect what a chart drew

use super::{Color, Paint, Surface};

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Clear,
    BeginPath,
    MoveTo(f64, f64),
    LineTo(f64, f64),
    Arc {
        cx: f64,
        cy: f64,
        radius: f64,
        start: f64,
        end: f64,
    },
    ClosePath,
    LineWidth(f64),
    LineDash(Vec<f64>),
    Stroke(Color),
    Fill(Paint),
}

/// remembers every call since the last `clear`
#[derive(Clone, Debug)]
pub struct RecordingSurface {
    width: f64,
    height: f64,
    ops: Vec<Op>,
}

impl RecordingSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn stroke_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Stroke(_))).count()
    }

    pub fn fill_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Fill(_))).count()
    }

    pub fn stroke_colors(&self) -> Vec<Color> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Stroke(color) => Some(*color),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.ops.push(Op::Clear);
    }

    fn begin_path(&mut self) {
        self.ops.push(Op::BeginPath);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.ops.push(Op::MoveTo(x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.ops.push(Op::LineTo(x, y));
    }

    fn arc(&mut self, cx: f64, cy: f64, radius: f64, start: f64, end: f64) {
        self.ops.push(Op::Arc {
            cx,
            cy,
            radius,
            start,
            end,
        });
    }

    fn close_path(&mut self) {
        self.ops.push(Op::ClosePath);
    }

    fn set_line_width(&mut self, width: f64) {
        self.ops.push(Op::LineWidth(width));
    }

    fn set_line_dash(&mut self, pattern: &[f64]) {
        self.ops.push(Op::LineDash(pattern.to_vec()));
    }

    fn stroke(&mut self, color: Color) {
        self.ops.push(Op::Stroke(color));
    }

    fn fill(&mut self, paint: Paint) {
        self.ops.push(Op::Fill(paint));
    }
}
