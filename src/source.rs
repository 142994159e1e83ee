//! ==============================================================================
//! source.rs - where the poll loop gets its grid from
//! ==============================================================================
//!
//! purpose:
//!     the poll loop only needs one capability: "give me the 2-D grid for this
//!     range". anything satisfying ValuesSource is interchangeable - the
//!     values endpoint of a running host, the spreadsheet provider directly,
//!     or a scripted source in tests.
//!
//! relationships:
//!     - implemented by: HttpValuesSource, UnconfiguredSource (this file),
//!       SheetsClient (sheets.rs)
//!     - used by: poll.rs
//!
//! ==============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{RawGrid, ValuesResponse};

/// failure to obtain a grid; its Display text is what the status line shows
#[derive(Debug, Error)]
pub enum FetchError {
    /// non-2xx answer, with the response body as sent
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// network, tls or decode failure
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// the source is misconfigured or the provider answered nonsense
    #[error("{0}")]
    Upstream(String),
}

#[async_trait]
pub trait ValuesSource: Send + Sync {
    async fn fetch(&self, range: &str) -> Result<RawGrid, FetchError>;

    /// short label for logs
    fn describe(&self) -> String;
}

/// client for `GET {base}/api/values?range=...`
pub struct HttpValuesSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpValuesSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn values_url(&self) -> String {
        format!("{}/api/values", self.base_url)
    }
}

#[async_trait]
impl ValuesSource for HttpValuesSource {
    async fn fetch(&self, range: &str) -> Result<RawGrid, FetchError> {
        let response = self
            .client
            .get(self.values_url())
            .query(&[("range", range)])
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: ValuesResponse = response.json().await?;
        Ok(body.values)
    }

    fn describe(&self) -> String {
        self.values_url()
    }
}

/// stands in when neither an endpoint nor sheet credentials are configured;
/// every cycle fails with the setup hint so the status line shows it
pub struct UnconfiguredSource;

pub const UNCONFIGURED_MESSAGE: &str = "no values source configured: set VALUES_ENDPOINT, \
     or SHEET_ID with GOOGLE_API_KEY / GOOGLE_ACCESS_TOKEN / GOOGLE_APPLICATION_CREDENTIALS";

#[async_trait]
impl ValuesSource for UnconfiguredSource {
    async fn fetch(&self, _range: &str) -> Result<RawGrid, FetchError> {
        Err(FetchError::Upstream(UNCONFIGURED_MESSAGE.to_string()))
    }

    fn describe(&self) -> String {
        "unconfigured".into()
    }
}
