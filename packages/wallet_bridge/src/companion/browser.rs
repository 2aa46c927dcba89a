//! Browser-side listener: what the wallet page (and its pairing session) talks to.

use std::convert::Infallible;
use std::path::Path;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::stream::{self, Stream};
use pairing_session::{AddressReport, PAYLOAD_EVENT, WalletAddress};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use super::{CompanionReply, CompanionState, health};

pub fn router(state: CompanionState, assets_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/sse", get(push_channel))
        .route("/address", post(report_address))
        .route("/health", get(health))
        .with_state(state);

    match assets_dir {
        Some(dir) => {
            router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true))
        }
        None => router,
    }
}

/// Hands the parked sign request to exactly one subscriber.
async fn push_channel(State(state): State<CompanionState>) -> Response {
    let Some(request) = state.take_payload().await else {
        warn!("push channel opened with no pending payload");
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no pending payload" })),
        )
            .into_response();
    };

    let body = match serde_json::to_string(&request) {
        Ok(body) => body,
        Err(e) => {
            error!(%e, "failed to encode pending payload");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    info!(function = %request.function, "streaming pending payload");
    payload_stream(body, state.sse_interval).into_response()
}

/// The payload right away, then again every `interval` until the client hangs up.
fn payload_stream(
    body: String,
    interval: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = stream::unfold(true, move |first| {
        let body = body.clone();
        async move {
            if !first {
                tokio::time::sleep(interval).await;
            }
            Some((Ok(Event::default().event(PAYLOAD_EVENT).data(body)), false))
        }
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(interval).text("keep-alive"))
}

async fn report_address(
    State(state): State<CompanionState>,
    Json(report): Json<AddressReport>,
) -> Json<CompanionReply> {
    info!(address = %report.hex, "wallet address reported");
    state.store_address(WalletAddress::new(report.hex));
    Json(CompanionReply::ok())
}
