//! Development collector for edgefl round reports.
//!
//! `POST /update` accepts a report and answers 200; `GET /results` lists everything
//! received since startup. Nothing is persisted.

pub mod state;
pub mod types;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tracing::info;

use crate::state::AppState;
use crate::types::{Received, Report};

pub const DEFAULT_PORT: u16 = 8080;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/update", post(update))
        .route("/results", get(results))
        .with_state(state)
}

async fn update(State(state): State<AppState>, Json(report): Json<Report>) -> StatusCode {
    info!(
        device = %report.device_id,
        skipped = report.skipped(),
        battery = report.battery,
        cpu = report.cpu,
        "report received"
    );
    state.received.write().await.push(Received {
        received_at: Utc::now(),
        report,
    });
    StatusCode::OK
}

async fn results(State(state): State<AppState>) -> Json<Vec<Received>> {
    Json(state.received.read().await.clone())
}

/// `--port N`, `-p N` or `--port=N`, defaulting to `default_port`. The long form
/// wins when both are given. Port 0 is rejected since the collector's address
/// has to be known to the devices posting to it.
pub fn parse_port<I: IntoIterator<Item = String>>(
    args: I,
    default_port: u16,
) -> Result<u16, String> {
    let mut it = args.into_iter();
    let _ = it.next(); // program name
    let mut long: Option<String> = None;
    let mut short: Option<String> = None;
    while let Some(a) = it.next() {
        match a.as_str() {
            "--port" | "-p" => {
                let v = it.next().ok_or_else(|| format!("{a} needs a value"))?;
                if a == "-p" {
                    short = Some(v);
                } else {
                    long = Some(v);
                }
            }
            _ => match a.strip_prefix("--port=") {
                Some(v) => long = Some(v.to_string()),
                None => return Err(format!("Unexpected argument: {a}")),
            },
        }
    }
    let Some(raw) = long.or(short) else {
        return Ok(default_port);
    };
    match raw.parse::<u16>() {
        Ok(0) => Err("port must be non-zero".into()),
        Ok(p) => Ok(p),
        Err(e) => Err(format!("invalid port {raw:?}: {e}")),
    }
}
