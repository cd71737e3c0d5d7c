//! HTTP surface: index view with the moisture history, static stylesheet,
//! manual light checks, and the schedule resource.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::board::Board;
use crate::monitor;
use crate::sms::SmsClient;
use crate::state::{LightWindow, MoistureSample, SharedState};

const INDEX_HTML: &str = include_str!("ui/index.html");
const STYLES_CSS: &str = include_str!("ui/styles.css");

/// Placeholder in `index.html` replaced by the rendered history rows.
const HISTORY_MARKER: &str = "<!-- moisture history -->";

// ---------------------------------------------------------------------------
// Shared handler state
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub shared: SharedState,
    pub board: Arc<Board>,
    pub sms: Arc<SmsClient>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(app: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/styles.css", get(styles))
        .route("/on", get(lights_on))
        .route("/off", get(lights_off))
        .route("/schedule", get(get_schedule).put(put_schedule))
        .with_state(app)
}

async fn index(State(app): State<AppState>) -> impl IntoResponse {
    let rows = {
        let st = app.shared.read().await;
        render_history_rows(st.history.iter())
    };
    let body = INDEX_HTML.replace(HISTORY_MARKER, &rows);
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
}

fn render_history_rows<'a>(history: impl Iterator<Item = &'a MoistureSample>) -> String {
    history
        .map(|s| {
            format!(
                "<tr><td>{}</td><td>{:.3}</td></tr>\n",
                s.time.format("%Y-%m-%d %H:%M:%S UTC"),
                s.value
            )
        })
        .collect()
}

async fn styles() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], STYLES_CSS)
}

async fn lights_on(State(app): State<AppState>) -> Response {
    info!("manual lights-on check requested");
    run_assertion(&app, true).await
}

async fn lights_off(State(app): State<AppState>) -> Response {
    info!("manual lights-off check requested");
    run_assertion(&app, false).await
}

async fn run_assertion(app: &AppState, expect_on: bool) -> Response {
    let result = if expect_on {
        monitor::assert_on(&app.board, &app.shared, &app.sms).await
    } else {
        monitor::assert_off(&app.board, &app.shared, &app.sms).await
    };

    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            error!("manual light check failed: {e:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Serialize)]
struct ScheduleResponse {
    data: HashMap<u8, LightWindow>,
}

async fn get_schedule(State(app): State<AppState>) -> Json<ScheduleResponse> {
    let data = app.shared.read().await.schedule.clone();
    Json(ScheduleResponse { data })
}

/// Replace the schedule wholesale. Hour keys must be integers in 0-23 and
/// every entry must carry both `on` and `off` booleans; anything else is
/// rejected at the boundary instead of defaulting downstream.
async fn put_schedule(
    State(app): State<AppState>,
    Json(schedule): Json<HashMap<u8, LightWindow>>,
) -> Response {
    if let Some(bad) = schedule.keys().find(|h| **h > 23) {
        return (
            StatusCode::BAD_REQUEST,
            format!("hour {bad} out of range 0-23"),
        )
            .into_response();
    }

    info!(entries = schedule.len(), "schedule replaced");
    app.shared.write().await.replace_schedule(schedule);
    StatusCode::OK.into_response()
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(app: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("listening on http://{addr}");

    axum::serve(listener, router(app))
        .await
        .context("web server error")?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ControllerState;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    fn test_app() -> AppState {
        test_app_with_board(Board::fixed(0.4, 3.0))
    }

    fn test_app_with_board(board: Board) -> AppState {
        AppState {
            shared: ControllerState::shared(),
            board: Arc::new(board),
            sms: Arc::new(SmsClient::disabled()),
        }
    }

    async fn send(app: &AppState, req: Request<Body>) -> axum::response::Response {
        router(app.clone()).oneshot(req).await.unwrap()
    }

    async fn get(app: &AppState, uri: &str) -> axum::response::Response {
        send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn put_json(app: &AppState, uri: &str, body: &str) -> axum::response::Response {
        send(
            app,
            Request::builder()
                .method("PUT")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn body_string(resp: axum::response::Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        serde_json::from_str(&body_string(resp).await).unwrap()
    }

    // -- Index ----------------------------------------------------------------

    #[tokio::test]
    async fn index_embeds_moisture_history() {
        let app = test_app();
        {
            let mut st = app.shared.write().await;
            st.record_moisture(Utc::now(), 0.5);
        }

        let resp = get(&app, "/").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_string(resp).await;
        assert!(body.contains("<td>0.500</td>"), "missing sample in: {body}");
    }

    #[tokio::test]
    async fn index_with_empty_history_still_renders() {
        let app = test_app();
        let resp = get(&app, "/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_string(resp).await.contains("<table"));
    }

    // -- Static assets --------------------------------------------------------

    #[tokio::test]
    async fn stylesheet_served_as_css() {
        let app = test_app();
        let resp = get(&app, "/styles.css").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/css"
        );
    }

    // -- Manual light checks --------------------------------------------------

    #[tokio::test]
    async fn manual_on_check_returns_200_and_logs_event() {
        // Lux inside the band: no alert either way.
        let app = test_app();

        let resp = get(&app, "/on").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_string(resp).await.is_empty());

        let st = app.shared.read().await;
        assert!(st.events.iter().any(|e| e.detail == "lights-on"));
    }

    #[tokio::test]
    async fn manual_off_check_returns_200_and_logs_event() {
        let app = test_app();

        let resp = get(&app, "/off").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let st = app.shared.read().await;
        assert!(st.events.iter().any(|e| e.detail == "lights-off"));
    }

    #[tokio::test]
    async fn manual_on_check_low_lux_alerts() {
        let app = test_app_with_board(Board::fixed(0.4, 1.0));

        let resp = get(&app, "/on").await;
        assert_eq!(resp.status(), StatusCode::OK);

        assert_eq!(
            app.board.as_fixed().messages(),
            vec!["Lighting alert".to_string()]
        );
    }

    #[tokio::test]
    async fn manual_check_sensor_failure_returns_500() {
        let app = test_app();
        app.board.as_fixed().set_failing(true);

        let resp = get(&app, "/on").await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // -- Schedule -------------------------------------------------------------

    #[tokio::test]
    async fn schedule_starts_empty() {
        let app = test_app();
        let resp = get(&app, "/schedule").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!({"data": {}}));
    }

    #[tokio::test]
    async fn schedule_round_trip_is_exact() {
        let app = test_app();

        let resp = put_json(&app, "/schedule", r#"{"0":{"on":true,"off":false}}"#).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_string(resp).await.is_empty());

        let resp = get(&app, "/schedule").await;
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({"data": {"0": {"on": true, "off": false}}})
        );
    }

    #[tokio::test]
    async fn schedule_replacement_is_wholesale() {
        let app = test_app();

        put_json(&app, "/schedule", r#"{"0":{"on":true,"off":false}}"#).await;
        put_json(&app, "/schedule", r#"{"5":{"on":false,"off":true}}"#).await;

        let resp = get(&app, "/schedule").await;
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({"data": {"5": {"on": false, "off": true}}})
        );
    }

    #[tokio::test]
    async fn schedule_hour_out_of_range_rejected() {
        let app = test_app();

        let resp = put_json(&app, "/schedule", r#"{"24":{"on":true,"off":false}}"#).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(resp).await.contains("hour 24 out of range"));

        // Nothing was applied.
        let resp = get(&app, "/schedule").await;
        assert_eq!(body_json(resp).await, serde_json::json!({"data": {}}));
    }

    #[tokio::test]
    async fn schedule_non_numeric_hour_rejected() {
        let app = test_app();
        let resp = put_json(&app, "/schedule", r#"{"noon":{"on":true,"off":false}}"#).await;
        assert!(resp.status().is_client_error(), "got {}", resp.status());
    }

    #[tokio::test]
    async fn schedule_malformed_json_rejected() {
        let app = test_app();
        let resp = put_json(&app, "/schedule", "{not json").await;
        assert!(resp.status().is_client_error(), "got {}", resp.status());
    }

    #[tokio::test]
    async fn schedule_entry_missing_flag_rejected() {
        let app = test_app();
        let resp = put_json(&app, "/schedule", r#"{"0":{"on":true}}"#).await;
        assert!(resp.status().is_client_error(), "got {}", resp.status());
    }
}
