//! ==============================================================================
//! domain.rs - shared telemetry types
//! ==============================================================================
//!
//! purpose:
//!     the data shapes that flow between the values source, the extractors,
//!     the history store and the dashboard view.
//!
//! relationships:
//!     - produced by: source.rs, sheets.rs (RawGrid)
//!     - consumed by: grid.rs, reading.rs, fingerprint.rs, dashboard.rs
//!
//! ==============================================================================

use serde::{Deserialize, Deserializer, Serialize};

/// one spreadsheet cell; `None` is an empty/absent cell
pub type Cell = Option<String>;

/// a raw 2-D grid of cells, row 0 is the header row
pub type RawGrid = Vec<Vec<Cell>>;

/// index-aligned numeric samples, `None` marks a gap (never interpolated)
pub type Series = Vec<Option<f64>>;

/// the latest battery reading, extracted from a single grid row
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: String,
    /// state of charge, coulomb counted (%)
    pub soc_cc: Option<f64>,
    /// state of charge, model estimate (%)
    pub soc_model: Option<f64>,
    pub status: String,
    /// measured voltage (V)
    pub v_meas: Option<f64>,
    /// model voltage (V)
    pub v_model: Option<f64>,
    /// current (A)
    pub current: Option<f64>,
    /// temperature (°C)
    pub temp: Option<f64>,
}

impl Reading {
    /// true when the status reads idle and the measured voltage is exactly zero.
    /// such samples are sensor artifacts and are neither displayed nor recorded.
    pub fn is_idle_zero_voltage(&self) -> bool {
        self.status.to_lowercase().contains("idle") && self.v_meas == Some(0.0)
    }

    /// measured voltage suitable for display and history
    pub fn display_voltage(&self) -> Option<f64> {
        if self.is_idle_zero_voltage() {
            None
        } else {
            self.v_meas
        }
    }
}

/// the last-N series used by the voltage and current charts
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub v_meas: Series,
    pub v_model: Series,
    pub current: Series,
}

/// body of `GET /api/values`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValuesResponse {
    #[serde(default, deserialize_with = "deserialize_grid")]
    pub values: RawGrid,
}

/// accepts any json scalar as a cell.
/// numbers and booleans are stringified, null becomes an empty cell.
pub fn deserialize_grid<'de, D>(deserializer: D) -> Result<RawGrid, D::Error>
where
    D: Deserializer<'de>,
{
    let rows: Option<Vec<Vec<serde_json::Value>>> = Option::deserialize(deserializer)?;
    Ok(rows
        .unwrap_or_default()
        .into_iter()
        .map(|row| row.into_iter().map(cell_from_json).collect())
        .collect())
}

fn cell_from_json(value: serde_json::Value) -> Cell {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_response_accepts_mixed_cells() {
        let body = r#"{"values": [["timestamp", "socCc"], ["t1", 50, null, true]]}"#;
        let parsed: ValuesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.values[1][0].as_deref(), Some("t1"));
        assert_eq!(parsed.values[1][1].as_deref(), Some("50"));
        assert_eq!(parsed.values[1][2], None);
        assert_eq!(parsed.values[1][3].as_deref(), Some("true"));
    }

    #[test]
    fn test_values_response_missing_values_is_empty() {
        let parsed: ValuesResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.values.is_empty());

        let parsed: ValuesResponse = serde_json::from_str(r#"{"values": null}"#).unwrap();
        assert!(parsed.values.is_empty());
    }

    #[test]
    fn test_idle_zero_voltage() {
        let mut reading = Reading {
            status: "Idle".into(),
            v_meas: Some(0.0),
            ..Default::default()
        };
        assert!(reading.is_idle_zero_voltage());
        assert_eq!(reading.display_voltage(), None);

        reading.v_meas = Some(0.1);
        assert_eq!(reading.display_voltage(), Some(0.1));

        reading.status = "Discharging".into();
        reading.v_meas = Some(0.0);
        assert_eq!(reading.display_voltage(), Some(0.0));
    }
}
