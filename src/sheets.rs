//! ==============================================================================
//! sheets.rs - spreadsheet provider client (google sheets api v4)
//! ==============================================================================
//!
//! purpose:
//!     backs the host's read-only /api/values endpoint, and can feed the poll
//!     loop directly when no remote values endpoint is configured.
//!
//! auth (first configured wins):
//!     - pre-issued oauth bearer token (GOOGLE_ACCESS_TOKEN)
//!     - service account key file (GOOGLE_APPLICATION_CREDENTIALS / creds.json);
//!       tokens for the spreadsheets.readonly scope are minted and cached by
//!       gcp_auth, the key file is read on first use
//!     - api key (public/link-shared sheets)
//!
//! relationships:
//!     - configured by: config.rs ([sheets] section, SHEET_ID / GOOGLE_* env,
//!       ./creds.json)
//!     - used by: server.rs (/api/values), main.rs (in-process source)
//!
//! ==============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::config::SheetsConfig;
use crate::domain::{deserialize_grid, RawGrid};
use crate::source::{FetchError, ValuesSource};

pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

#[derive(Clone, Debug)]
pub enum Credential {
    ApiKey(String),
    AccessToken(String),
    ServiceAccount(ServiceAccount),
}

/// service account key file, loaded once and shared by every clone
#[derive(Clone)]
pub struct ServiceAccount {
    path: PathBuf,
    account: Arc<OnceCell<CustomServiceAccount>>,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount").field("path", &self.path).finish()
    }
}

impl ServiceAccount {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            account: Arc::new(OnceCell::new()),
        }
    }

    /// bearer token for the read-only scope; gcp_auth refreshes it before expiry
    pub async fn bearer(&self) -> Result<String, FetchError> {
        let path = self.path.clone();
        let account = self
            .account
            .get_or_try_init(|| async move { CustomServiceAccount::from_file(&path) })
            .await
            .map_err(|e| {
                FetchError::Upstream(format!("service account {}: {}", self.path.display(), e))
            })?;
        let token = account
            .token(&[SHEETS_READONLY_SCOPE])
            .await
            .map_err(|e| FetchError::Upstream(format!("service account token: {}", e)))?;
        Ok(token.as_str().to_string())
    }
}

#[derive(Clone)]
pub struct SheetsClient {
    api_base: String,
    sheet_id: String,
    credential: Credential,
    client: reqwest::Client,
}

/// body of `spreadsheets.values.get`
#[derive(Deserialize)]
struct ValueRange {
    #[serde(default, deserialize_with = "deserialize_grid")]
    values: RawGrid,
}

/// google error envelope: {"error": {"code": 403, "message": "..."}}
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl SheetsClient {
    pub fn new(api_base: impl Into<String>, sheet_id: impl Into<String>, credential: Credential) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            sheet_id: sheet_id.into(),
            credential,
            client: reqwest::Client::new(),
        }
    }

    /// build a client from config; None when the sheet id or credentials are missing
    pub fn from_config(config: &SheetsConfig) -> Option<Self> {
        let sheet_id = config.sheet_id.clone().filter(|s| !s.is_empty())?;
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        let credential = if let Some(token) = non_empty(&config.access_token) {
            Credential::AccessToken(token)
        } else if let Some(path) = config.credentials_path.clone() {
            Credential::ServiceAccount(ServiceAccount::new(path))
        } else if let Some(key) = non_empty(&config.api_key) {
            Credential::ApiKey(key)
        } else {
            return None;
        };
        Some(Self::new(config.api_base.clone(), sheet_id, credential))
    }

    /// `{api_base}/spreadsheets/{id}/values/{range}` with the range percent-encoded
    pub fn values_url(&self, range: &str) -> Result<reqwest::Url, FetchError> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|e| FetchError::Upstream(format!("invalid sheets api base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Upstream("sheets api base cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["spreadsheets", self.sheet_id.as_str(), "values", range]);
        Ok(url)
    }

    /// read one range as a raw grid; a range with no data yields an empty grid
    pub async fn values_get(&self, range: &str) -> Result<RawGrid, FetchError> {
        let url = self.values_url(range)?;
        let request = match &self.credential {
            Credential::ApiKey(key) => self.client.get(url).query(&[("key", key)]),
            Credential::AccessToken(token) => self.client.get(url).bearer_auth(token),
            Credential::ServiceAccount(account) => {
                let token = account.bearer().await?;
                self.client.get(url).bearer_auth(token)
            }
        };

        tracing::debug!("[SHEETS] values.get range={}", range);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(FetchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let range: ValueRange = response.json().await?;
        Ok(range.values)
    }
}

#[async_trait]
impl ValuesSource for SheetsClient {
    async fn fetch(&self, range: &str) -> Result<RawGrid, FetchError> {
        self.values_get(range).await
    }

    fn describe(&self) -> String {
        format!("sheets:{}", self.sheet_id)
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path as AxumPath, Query};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Json, Response};
    use axum::routing::get;
    use axum::Router;
    use serde_json::json;
    use std::collections::HashMap;

    fn config() -> SheetsConfig {
        SheetsConfig {
            sheet_id: Some("abc123".into()),
            api_key: Some("key".into()),
            ..SheetsConfig::default()
        }
    }

    #[test]
    fn test_values_url_encodes_range() {
        let client = SheetsClient::from_config(&config()).unwrap();
        let url = client.values_url("Sheet 1!A1:H1000").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/Sheet%201!A1:H1000"
        );
    }

    #[test]
    fn test_from_config_requires_id_and_credentials() {
        let mut cfg = config();
        cfg.sheet_id = None;
        assert!(SheetsClient::from_config(&cfg).is_none());

        let mut cfg = config();
        cfg.api_key = None;
        assert!(SheetsClient::from_config(&cfg).is_none());

        let mut cfg = config();
        cfg.access_token = Some("token".into());
        let client = SheetsClient::from_config(&cfg).unwrap();
        assert!(matches!(client.credential, Credential::AccessToken(_)));
    }

    #[test]
    fn test_from_config_prefers_token_then_service_account() {
        let mut cfg = config();
        cfg.credentials_path = Some(PathBuf::from("/etc/dash/sa.json"));
        let client = SheetsClient::from_config(&cfg).unwrap();
        assert!(matches!(client.credential, Credential::ServiceAccount(_)));

        cfg.access_token = Some("token".into());
        let client = SheetsClient::from_config(&cfg).unwrap();
        assert!(matches!(client.credential, Credential::AccessToken(_)));
    }

    #[tokio::test]
    async fn test_unreadable_key_file_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let client = SheetsClient::new(
            "http://127.0.0.1:9/v4",
            "abc123",
            Credential::ServiceAccount(ServiceAccount::new(&missing)),
        );
        let err = client.values_get("Sheet1!A1:B2").await.unwrap_err();
        assert!(matches!(err, FetchError::Upstream(_)));
        assert!(err.to_string().contains("missing.json"), "{}", err);

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "not a key").unwrap();
        let account = ServiceAccount::new(&garbage);
        assert!(matches!(account.bearer().await, Err(FetchError::Upstream(_))));
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}/v4", addr)
    }

    /// minimal stand-in for spreadsheets.values.get
    fn provider() -> Router {
        async fn values_get(
            AxumPath((id, range)): AxumPath<(String, String)>,
            Query(params): Query<HashMap<String, String>>,
        ) -> Response {
            if params.get("key").map(String::as_str) != Some("key") {
                let envelope = json!({"error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}});
                return (StatusCode::FORBIDDEN, Json(envelope)).into_response();
            }
            if range == "Empty!A1:B2" {
                return Json(json!({"range": range, "majorDimension": "ROWS"})).into_response();
            }
            Json(json!({
                "range": range.clone(),
                "values": [["Sheet", "Range"], [id, range], ["SOC CC", 42]]
            }))
            .into_response()
        }
        Router::new().route("/v4/spreadsheets/:id/values/:range", get(values_get))
    }

    #[tokio::test]
    async fn test_values_get_against_provider() {
        let base = serve(provider()).await;
        let client = SheetsClient::new(base.as_str(), "abc123", Credential::ApiKey("key".into()));

        let grid = client.values_get("Sheet 1!A1:H10").await.unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[1], vec![Some("abc123".to_string()), Some("Sheet 1!A1:H10".to_string())]);
        assert_eq!(grid[2][1].as_deref(), Some("42"));

        assert!(client.values_get("Empty!A1:B2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_values_get_unwraps_error_envelope() {
        let base = serve(provider()).await;
        let client = SheetsClient::new(base.as_str(), "abc123", Credential::ApiKey("wrong".into()));

        let err = client.values_get("Sheet1!A1:B2").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 403: The caller does not have permission");
    }

    #[test]
    fn test_value_range_without_values() {
        let parsed: ValueRange =
            serde_json::from_str(r#"{"range": "Sheet1!A1:H1000", "majorDimension": "ROWS"}"#).unwrap();
        assert!(parsed.values.is_empty());
    }
}
