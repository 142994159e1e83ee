//! ==============================================================================
//! reading.rs - latest reading and recent series extraction
//! ==============================================================================
//!
//! purpose:
//!     turns a raw grid into the typed values the dashboard draws:
//!     - the latest reading (last non-empty data row)
//!     - the last n rows of voltage/current for the charts
//!
//! relationships:
//!     - uses: grid.rs (column index, typed cell access)
//!     - used by: poll.rs (every cycle)
//!
//! ==============================================================================

use crate::domain::{ChartSeries, RawGrid, Reading, Series};
use crate::grid::{cell_at, numeric_cell_at, ColumnIndex, Field};

/// latest reading in the grid, or None for a header-only/empty grid
pub fn latest_reading(grid: &RawGrid) -> Option<Reading> {
    if grid.len() < 2 {
        return None;
    }
    let idx = ColumnIndex::from_grid(grid);

    // walk back over blank rows, never onto the header
    let mut row = grid.len() - 1;
    while row > 1 && is_blank_row(grid, row) {
        row -= 1;
    }

    let text = |field| cell_at(grid, row, idx.get(field)).to_string();
    let number = |field| numeric_cell_at(grid, row, idx.get(field));

    Some(Reading {
        timestamp: text(Field::Timestamp),
        soc_cc: number(Field::SocCc),
        soc_model: number(Field::SocModel),
        status: text(Field::Status),
        v_meas: number(Field::VMeas),
        v_model: number(Field::VModel),
        current: number(Field::Current),
        temp: number(Field::Temp),
    })
}

/// voltage/current series over the last `n` data rows, oldest first
pub fn last_n_series(grid: &RawGrid, n: usize) -> ChartSeries {
    if grid.len() < 2 {
        return ChartSeries::default();
    }
    let idx = ColumnIndex::from_grid(grid);
    let start = grid.len().saturating_sub(n).max(1);

    let column = |field| -> Series {
        (start..grid.len())
            .map(|row| numeric_cell_at(grid, row, idx.get(field)))
            .collect()
    };

    ChartSeries {
        v_meas: column(Field::VMeas),
        v_model: column(Field::VModel),
        current: column(Field::Current),
    }
}

fn is_blank_row(grid: &RawGrid, row: usize) -> bool {
    grid.get(row).map_or(true, |cells| {
        cells.iter().all(|c| c.as_deref().map_or(true, str::is_empty))
    })
}

/// coarse battery state derived from the free-text status column
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryState {
    Charging,
    Discharging,
    Idle,
}

impl BatteryState {
    pub fn classify(status: &str) -> Self {
        let status = status.to_lowercase();
        // "discharging" also contains "charg", check it first
        if status.contains("discharg") {
            BatteryState::Discharging
        } else if status.contains("charg") {
            BatteryState::Charging
        } else {
            BatteryState::Idle
        }
    }

    /// css class for the state badge
    pub fn css_class(self) -> &'static str {
        match self {
            BatteryState::Charging => "state-charging",
            BatteryState::Discharging => "state-discharging",
            BatteryState::Idle => "state-idle",
        }
    }
}
