//! ==============================================================================
//! server.rs - dashboard web server
//! ==============================================================================
//!
//! purpose:
//!     serves the rendered dashboard and the json/svg views of it, accepts
//!     poll settings changes, and proxies the spreadsheet as /api/values.
//!
//! routes:
//!     GET  /                      html dashboard (auto-refreshing)
//!     GET  /api/dashboard         dashboard view as json
//!     GET  /api/charts/:name      gauge | voltage | current | temperature (svg)
//!     GET  /api/values?range=     raw grid from the spreadsheet provider
//!     GET  /api/config            current poll settings
//!     POST /api/config            save poll settings {range, interval}
//!     POST /api/refresh           run a cycle now
//!     POST /config, /refresh      form posts from the html page, redirect to /
//!
//! relationships:
//!     - reads: poll.rs (SharedView), sends: poll.rs (PollHandle)
//!     - uses: config.rs (SettingsStore), sheets.rs (SheetsClient)
//!
//! ==============================================================================

use axum::{
    extract::{Form, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::config::{PollConfig, SettingsStore};
use crate::dashboard::{render_page, DashboardView};
use crate::poll::{PollHandle, SharedView};
use crate::sheets::SheetsClient;

/// everything the handlers need
#[derive(Clone)]
pub struct WebState {
    pub view: SharedView,
    pub poll: PollHandle,
    pub settings: SettingsStore,
    /// None when no sheet id / credentials are configured
    pub sheets: Option<SheetsClient>,
    /// range served by /api/values when the request names none
    pub default_range: String,
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/dashboard", get(dashboard_json_handler))
        .route("/api/charts/:name", get(chart_handler))
        .route("/api/values", get(values_handler))
        .route("/api/config", get(get_config_handler).post(save_config_handler))
        .route("/api/refresh", post(refresh_handler))
        .route("/config", post(config_form_handler))
        .route("/refresh", post(refresh_form_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(bind: &str, state: WebState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", bind, e))?;
    tracing::info!("[WEB] dashboard live at http://{}", bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ==============================================================================
// dashboard views
// ==============================================================================

async fn dashboard_handler(State(state): State<WebState>) -> Html<String> {
    let view = state.view.read().await;
    Html(render_page(&view))
}

async fn dashboard_json_handler(State(state): State<WebState>) -> Json<DashboardView> {
    let view = state.view.read().await;
    Json(view.clone())
}

async fn chart_handler(State(state): State<WebState>, Path(name): Path<String>) -> Response {
    let view = state.view.read().await;
    match view.charts.by_name(&name) {
        Some(svg) => (
            [
                (header::CONTENT_TYPE, "image/svg+xml"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            svg.to_string(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, format!("unknown chart: {}", name)).into_response(),
    }
}

// ==============================================================================
// values proxy
// ==============================================================================

#[derive(Deserialize)]
struct ValuesParams {
    range: Option<String>,
}

async fn values_handler(
    State(state): State<WebState>,
    Query(params): Query<ValuesParams>,
) -> Response {
    let Some(sheets) = &state.sheets else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "spreadsheet provider is not configured (set SHEET_ID and a credential)",
        )
            .into_response();
    };
    let range = params
        .range
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| state.default_range.clone());

    match sheets.values_get(&range).await {
        Ok(values) => Json(serde_json::json!({ "values": values })).into_response(),
        Err(e) => {
            tracing::warn!("[WEB] /api/values range={} failed: {}", range, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

// ==============================================================================
// settings and refresh
// ==============================================================================

/// body of POST /api/config; interval may be a number or a numeric string
#[derive(Deserialize, Default)]
#[serde(default)]
struct ConfigRequest {
    range: String,
    interval: Option<serde_json::Value>,
}

/// fields of the settings form on the html page
#[derive(Deserialize, Default)]
#[serde(default)]
struct ConfigForm {
    range: String,
    interval: String,
}

fn parse_interval(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// persist, then hand the new settings to the poll loop
async fn apply_config(state: &WebState, config: PollConfig) -> Result<PollConfig, (StatusCode, String)> {
    state.settings.save(&config).map_err(|e| {
        tracing::error!("[CONFIG] failed to save poll settings: {:#}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
    })?;
    state
        .poll
        .reconfigure(config.clone())
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    tracing::info!("[CONFIG] saved range={} interval={}s", config.range, config.interval);
    Ok(config)
}

async fn get_config_handler(State(state): State<WebState>) -> Json<PollConfig> {
    let view = state.view.read().await;
    Json(view.config.clone())
}

async fn save_config_handler(
    State(state): State<WebState>,
    Json(request): Json<ConfigRequest>,
) -> Result<Json<PollConfig>, (StatusCode, String)> {
    let interval = request.interval.as_ref().and_then(parse_interval);
    let config = PollConfig::sanitized(&request.range, interval);
    apply_config(&state, config).await.map(Json)
}

async fn config_form_handler(
    State(state): State<WebState>,
    Form(form): Form<ConfigForm>,
) -> Result<Redirect, (StatusCode, String)> {
    let config = PollConfig::sanitized(&form.range, form.interval.trim().parse().ok());
    apply_config(&state, config).await?;
    Ok(Redirect::to("/"))
}

async fn refresh_handler(State(state): State<WebState>) -> Result<StatusCode, (StatusCode, String)> {
    state
        .poll
        .refresh_now()
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    Ok(StatusCode::ACCEPTED)
}

async fn refresh_form_handler(State(state): State<WebState>) -> Result<Redirect, (StatusCode, String)> {
    refresh_handler(State(state)).await?;
    Ok(Redirect::to("/"))
}
