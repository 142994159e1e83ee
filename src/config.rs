//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml` and the persisted poll settings.
//!     loads configuration from file or falls back to defaults, then lets
//!     environment variables (and a .env file) override the secrets.
//!
//! structure:
//!     - ServerConfig: where the dashboard listens.
//!     - SourceConfig: optional remote values endpoint for the poll loop.
//!     - SheetsConfig: spreadsheet id and read-only credentials.
//!     - DashboardConfig: where the poll settings are persisted.
//!     - LoggingConfig: log level and reading echo.
//!     - PollConfig: range + interval, saved by POST /api/config.
//!
//! ==============================================================================

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_RANGE: &str = "Sheet1!A1:H1000";
pub const DEFAULT_INTERVAL_SECONDS: f64 = 1.0;
/// service account key looked up in the working directory
pub const DEFAULT_CREDENTIALS_FILE: &str = "creds.json";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourceConfig {
    /// base url of a host serving /api/values; None polls the sheet in-process
    pub endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SheetsConfig {
    pub sheet_id: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    /// service account key file (json)
    pub credentials_path: Option<PathBuf>,
    pub api_base: String,
    /// range served by /api/values when the request names none
    pub default_range: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            sheet_id: None,
            api_key: None,
            access_token: None,
            credentials_path: None,
            api_base: "https://sheets.googleapis.com/v4".to_string(),
            default_range: "Sheet1!A1:D100".to_string(),
        }
    }
}

impl SheetsConfig {
    /// fall back to a key file on disk when nothing else is configured
    fn adopt_default_credentials(&mut self, path: &Path) {
        let configured = self.api_key.is_some()
            || self.access_token.is_some()
            || self.credentials_path.is_some();
        if !configured && path.is_file() {
            self.credentials_path = Some(path.to_path_buf());
        }
    }

    /// which credential the sheets client will use
    pub fn auth_label(&self) -> String {
        if self.access_token.as_deref().is_some_and(|t| !t.is_empty()) {
            "access token".to_string()
        } else if let Some(path) = &self.credentials_path {
            format!("service account ({})", path.display())
        } else if self.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            "api key".to_string()
        } else {
            "<none>".to_string()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub settings_path: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("config").join("poll.toml"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_readings: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_readings: false }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: HostConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("host.toml"),
            PathBuf::from("..").join("config").join("host.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// environment wins over the file: SHEET_ID, GOOGLE_API_KEY,
    /// GOOGLE_ACCESS_TOKEN, GOOGLE_APPLICATION_CREDENTIALS, VALUES_ENDPOINT
    /// and PORT. with no credentials at all, ./creds.json is used if present.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()));
        self.sheets.adopt_default_credentials(Path::new(DEFAULT_CREDENTIALS_FILE));
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(id) = var("SHEET_ID") {
            self.sheets.sheet_id = Some(id);
        }
        if let Some(key) = var("GOOGLE_API_KEY") {
            self.sheets.api_key = Some(key);
        }
        if let Some(token) = var("GOOGLE_ACCESS_TOKEN") {
            self.sheets.access_token = Some(token);
        }
        if let Some(path) = var("GOOGLE_APPLICATION_CREDENTIALS") {
            self.sheets.credentials_path = Some(PathBuf::from(path));
        }
        if let Some(endpoint) = var("VALUES_ENDPOINT") {
            self.source.endpoint = Some(endpoint);
        }
        if let Some(port) = var("PORT") {
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.bind = format!("{}:{}", host, port.trim());
        }
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let source = self.source.endpoint.as_deref().unwrap_or("in-process sheets client");
        let sheet = self.sheets.sheet_id.as_deref().unwrap_or("<unset>");
        println!("┌─────────────────────────────────────────┐");
        println!("│           HOST CONFIGURATION            │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Bind: {}", self.server.bind);
        println!("│ Source: {}", source);
        println!("│ Sheet ID: {}", sheet);
        println!("│ Auth: {}", self.sheets.auth_label());
        println!("│ Settings: {}", self.dashboard.settings_path.display());
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}

// ==============================================================================
// poll settings
// ==============================================================================

/// what to poll and how often
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    pub range: String,
    /// seconds between polls
    pub interval: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            range: DEFAULT_RANGE.to_string(),
            interval: DEFAULT_INTERVAL_SECONDS,
        }
    }
}

/// load-time overrides that beat the persisted settings
#[derive(Debug, Clone, Default)]
pub struct PollOverrides {
    pub range: Option<String>,
    pub interval: Option<f64>,
}

impl PollOverrides {
    /// DASH_RANGE / DASH_INTERVAL
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            range: var("DASH_RANGE").filter(|r| !r.trim().is_empty()),
            interval: var("DASH_INTERVAL").and_then(|s| s.trim().parse::<f64>().ok()),
        }
    }
}

impl PollConfig {
    /// overrides first, then persisted values, then defaults
    pub fn resolve(overrides: PollOverrides, persisted: Option<PollConfig>) -> Self {
        let (range, interval) = match persisted {
            Some(p) => (Some(p.range), Some(p.interval)),
            None => (None, None),
        };
        Self {
            range: overrides.range.or(range).unwrap_or_else(|| DEFAULT_RANGE.to_string()),
            interval: overrides.interval.or(interval).unwrap_or(DEFAULT_INTERVAL_SECONDS),
        }
    }

    /// normalize user input the way the settings form does:
    /// blank range -> default, interval below 1s (or not a number) -> 1s
    pub fn sanitized(range: &str, interval: Option<f64>) -> Self {
        let range = range.trim();
        let interval = interval
            .filter(|i| i.is_finite() && *i != 0.0)
            .unwrap_or(DEFAULT_INTERVAL_SECONDS)
            .max(1.0);
        Self {
            range: if range.is_empty() { DEFAULT_RANGE.to_string() } else { range.to_string() },
            interval,
        }
    }

    /// timer period, never shorter than one second
    pub fn period(&self) -> Duration {
        let millis = if self.interval.is_finite() { self.interval * 1000.0 } else { 0.0 };
        Duration::from_millis(millis.max(1000.0) as u64)
    }
}

/// toml file holding the saved PollConfig
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// saved settings, or None when nothing usable is on disk
    pub fn load(&self) -> Option<PollConfig> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("[CONFIG] ignoring unreadable {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, config: &PollConfig) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = toml::to_string(config).context("serializing poll settings")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}
