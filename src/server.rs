use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use maud::{html, PreEscaped, DOCTYPE};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::info;

use crate::display::{ActivityLog, ClockSink, Display};
use crate::types::{ConnectionState, StatusView};

const PAGE_TITLE: &str = "Bluetooth 人数カウント";
const REFRESH_SECS: u32 = 2;
const ACTIVITY_LINES: usize = 200;

/// Handle to the dashboard state. Cloned into the session as its display and
/// into the HTTP handlers as their state.
#[derive(Clone, Default)]
pub struct Dashboard {
    inner: Arc<RwLock<DashboardState>>,
}

#[derive(Debug, Default)]
struct DashboardState {
    status: StatusView,
    current: String,
    count: Option<usize>,
    history_markup: String,
    history_entries: usize,
    time: String,
    activity: Vec<ActivityLine>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActivityLine {
    pub message: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusBody {
    pub state: ConnectionState,
    pub message: String,
    pub stream_active: bool,
    pub count: Option<usize>,
    pub current: String,
    pub history_entries: usize,
    pub time: String,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusBody {
        let s = self.read();
        StatusBody {
            state: s.status.state,
            message: s.status.message.clone(),
            stream_active: s.status.stream_active,
            count: s.count,
            current: s.current.clone(),
            history_entries: s.history_entries,
            time: s.time.clone(),
        }
    }

    pub fn history_markup(&self) -> String {
        self.read().history_markup.clone()
    }

    pub fn activity(&self) -> Vec<ActivityLine> {
        self.read().activity.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, DashboardState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DashboardState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Display for Dashboard {
    fn show_current(&mut self, text: &str, count: usize) {
        let mut s = self.write();
        s.current = text.to_string();
        s.count = Some(count);
    }

    fn show_history(&mut self, markup: &str, entries: usize) {
        let mut s = self.write();
        s.history_markup = markup.to_string();
        s.history_entries = entries;
    }

    fn show_status(&mut self, status: &StatusView) {
        self.write().status = status.clone();
    }
}

impl ClockSink for Dashboard {
    fn show_time(&mut self, text: &str) {
        self.write().time = text.to_string();
    }
}

impl ActivityLog for Dashboard {
    fn append(&mut self, message: &str, is_error: bool) {
        let mut s = self.write();
        s.activity.push(ActivityLine {
            message: message.to_string(),
            is_error,
        });
        let excess = s.activity.len().saturating_sub(ACTIVITY_LINES);
        s.activity.drain(..excess);
    }
}

pub fn router(dashboard: Dashboard) -> Router {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/history/markup", get(get_history_markup))
        .with_state(dashboard.clone());

    Router::new()
        .route("/", get(get_page))
        .with_state(dashboard)
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                )),
        )
}

/// Serve the dashboard until `cancel` fires.
pub async fn spawn_server(bind: &str, dashboard: Dashboard, cancel: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind dashboard on {bind}"))?;
    info!(addr = %listener.local_addr()?, "dashboard listening");
    axum::serve(listener, router(dashboard))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

async fn get_status(State(dash): State<Dashboard>) -> impl IntoResponse {
    (StatusCode::OK, Json(dash.status()))
}

async fn get_history_markup(State(dash): State<Dashboard>) -> impl IntoResponse {
    Html(dash.history_markup())
}

async fn get_page(State(dash): State<Dashboard>) -> impl IntoResponse {
    Html(render_page(&dash))
}

fn render_page(dash: &Dashboard) -> String {
    let status = dash.status();
    let history = dash.history_markup();
    let activity = dash.activity();
    let status_class = match status.state {
        ConnectionState::Ok => "OK",
        ConnectionState::Error => "ERR",
        ConnectionState::Connecting => "",
    };
    let markup = html! {
        (DOCTYPE)
        html lang="ja" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                meta http-equiv="refresh" content=(REFRESH_SECS);
                title { (PAGE_TITLE) }
            }
            body {
                div id="loading-bar" class=[status.stream_active.then_some("enable")] {}
                header id="SystemStatus" class=(status_class) {
                    span id="SystemStatusText" { (status.message) }
                    time id="time" { (status.time) }
                }
                main {
                    h1 { (PAGE_TITLE) }
                    p {
                        "Devices: "
                        span id="deviceCount" {
                            @match status.count {
                                Some(n) => { (n) }
                                None => { "-" }
                            }
                        }
                    }
                    pre id="currentScanResultOutput" { code { (status.current) } }
                    section id="resultDetails" { (PreEscaped(history)) }
                }
                footer id="log_output" {
                    code {
                        @for line in &activity {
                            div class=[line.is_error.then_some("error")] { (line.message) }
                        }
                    }
                }
            }
        }
    };
    markup.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_tracks_latest_values() {
        let mut d = Dashboard::new();
        d.show_current("{}", 0);
        d.show_current("{\n  \"a\": 1\n}", 1);
        d.show_time("2024/05/01 09:00:00");
        let s = d.status();
        assert_eq!(s.count, Some(1));
        assert_eq!(s.current, "{\n  \"a\": 1\n}");
        assert_eq!(s.time, "2024/05/01 09:00:00");
        assert_eq!(s.state, ConnectionState::Connecting);
    }

    #[test]
    fn activity_is_capped() {
        let mut d = Dashboard::new();
        for i in 0..(ACTIVITY_LINES + 5) {
            d.append(&format!("line {i}"), false);
        }
        let lines = d.activity();
        assert_eq!(lines.len(), ACTIVITY_LINES);
        assert_eq!(lines[0].message, "line 5");
    }

    #[test]
    fn page_embeds_history_markup_unescaped() {
        let mut d = Dashboard::new();
        d.show_history("<details><summary>#1</summary></details>", 1);
        let page = render_page(&d);
        assert!(page.contains("<section id=\"resultDetails\"><details><summary>#1</summary></details></section>"));
    }
}
