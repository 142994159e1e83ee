//! ==============================================================================
//! grid.rs - header-driven access to the raw cell grid
//! ==============================================================================
//!
//! purpose:
//!     the spreadsheet layout is not fixed. columns are located by header
//!     name on every fetch, so a reordered sheet keeps working.
//!
//! rules:
//!     - headers are normalized: lower-cased, every non-alphanumeric char removed
//!     - matching is exact on the normalized form, first match wins
//!     - missing columns, short rows and empty cells read as ""
//!     - numeric reads return None (never 0) when there is nothing to parse
//!
//! relationships:
//!     - used by: reading.rs (latest reading, last-n series)
//!
//! ==============================================================================

use crate::domain::RawGrid;

/// logical telemetry columns the dashboard understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Timestamp,
    SocCc,
    SocModel,
    Status,
    VMeas,
    VModel,
    Current,
    Temp,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Timestamp,
        Field::SocCc,
        Field::SocModel,
        Field::Status,
        Field::VMeas,
        Field::VModel,
        Field::Current,
        Field::Temp,
    ];

    /// normalized header text that identifies this column
    pub fn header_key(self) -> &'static str {
        match self {
            Field::Timestamp => "timestamp",
            Field::SocCc => "soccc",
            Field::SocModel => "socmodel",
            Field::Status => "status",
            Field::VMeas => "vmeasv",
            Field::VModel => "vmodelv",
            Field::Current => "currenta",
            Field::Temp => "tempc",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// lower-case and drop everything that is not [a-z0-9]
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .flat_map(char::to_lowercase)
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// column positions for one grid, built once per fetch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    positions: [Option<usize>; 8],
}

impl ColumnIndex {
    /// locate every logical field in the header row (row 0)
    pub fn from_grid(grid: &RawGrid) -> Self {
        let mut index = Self::default();
        let Some(headers) = grid.first() else {
            return index;
        };

        let normalized: Vec<String> = headers
            .iter()
            .map(|cell| normalize_header(cell.as_deref().unwrap_or("")))
            .collect();

        for field in Field::ALL {
            index.positions[field.slot()] =
                normalized.iter().position(|h| h == field.header_key());
        }
        index
    }

    /// zero-based column of `field`, or None when the header is missing
    pub fn get(&self, field: Field) -> Option<usize> {
        self.positions[field.slot()]
    }
}

/// cell text at (row, column); "" for anything missing
pub fn cell_at(grid: &RawGrid, row: usize, column: Option<usize>) -> &str {
    column
        .and_then(|col| grid.get(row)?.get(col)?.as_deref())
        .unwrap_or("")
}

/// numeric cell at (row, column); None when absent or unparsable
pub fn numeric_cell_at(grid: &RawGrid, row: usize, column: Option<usize>) -> Option<f64> {
    column.and_then(|_| parse_number(cell_at(grid, row, column)))
}

/// finite number from cell text, surrounding whitespace allowed
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}
