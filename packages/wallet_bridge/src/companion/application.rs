//! Application-side listener: the program that wants something signed.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use pairing_session::SignRequest;
use pairing_session::launch::{ADDRESS_KEY, PAYLOAD_KEY};
use tracing::{error, info};

use super::{CompanionReply, CompanionState, health};
use crate::config::page_url;

pub fn router(state: CompanionState) -> Router {
    Router::new()
        .route("/", get(request_address).post(submit_payload))
        .route("/health", get(health))
        .with_state(state)
}

fn internal_error(message: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message.to_string() })),
    )
        .into_response()
}

/// Park the request, then open a payload session to pick it up.
async fn submit_payload(
    State(state): State<CompanionState>,
    Json(request): Json<SignRequest>,
) -> Response {
    info!(function = %request.function, "sign request received");
    state.park_payload(request).await;

    let url = match page_url(state.page_origin(), PAYLOAD_KEY) {
        Ok(url) => url,
        Err(e) => {
            state.take_payload().await;
            return internal_error(e);
        }
    };
    if let Err(e) = state.launcher.launch(&url).await {
        error!(%e, "failed to launch wallet page");
        state.take_payload().await;
        return internal_error(e);
    }

    Json(CompanionReply::ok()).into_response()
}

/// Open an address session and answer with whatever it reports.
async fn request_address(State(state): State<CompanionState>) -> Response {
    state.clear_address();

    let url = match page_url(state.page_origin(), ADDRESS_KEY) {
        Ok(url) => url,
        Err(e) => return internal_error(e),
    };
    if let Err(e) = state.launcher.launch(&url).await {
        error!(%e, "failed to launch wallet page");
        return internal_error(e);
    }

    match state.next_address().await {
        Some(address) => {
            info!(%address, "handing out reported address");
            Json(CompanionReply {
                message: address.to_string(),
            })
            .into_response()
        }
        None => internal_error("address slot closed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::companion::test_support::*;
    use axum::{body::Body, http::Request};
    use pairing_session::WalletAddress;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const TRANSFER: &str = r#"{
        "type": "entry_function_payload",
        "function": "0x1::coin::transfer",
        "arguments": ["0xB0B", "100"],
        "type_arguments": ["0x1::aptos_coin::AptosCoin"]
    }"#;

    fn submit(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn reply(resp: Response) -> CompanionReply {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn submit_parks_payload_and_launches_payload_page() {
        let launcher = Arc::new(RecordingLauncher::default());
        let state = test_state(launcher.clone());

        let resp = router(state.clone()).oneshot(submit(TRANSFER)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(reply(resp).await, CompanionReply::ok());

        assert_eq!(launcher.launched(), ["http://127.0.0.1:8080/?payload=true"]);
        let parked = state.take_payload().await.unwrap();
        assert_eq!(parked.function, "0x1::coin::transfer");
        assert_eq!(parked.arguments, ["0xB0B", "100"]);
    }

    #[tokio::test]
    async fn failed_launch_unparks_payload() {
        let state = test_state(Arc::new(RecordingLauncher::failing()));

        let resp = router(state.clone()).oneshot(submit(TRANSFER)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.take_payload().await.is_none());
    }

    #[tokio::test]
    async fn malformed_sign_request_is_rejected() {
        let launcher = Arc::new(RecordingLauncher::default());
        let state = test_state(launcher.clone());

        let resp = router(state)
            .oneshot(submit(r#"{"function": 7}"#))
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
        assert!(launcher.launched().is_empty());
    }

    #[tokio::test]
    async fn address_request_waits_for_report() {
        let launcher = Arc::new(RecordingLauncher::default());
        let state = test_state(launcher.clone());
        // stale report from an earlier session must not leak through
        state.store_address(WalletAddress::from("0xSTALE"));

        let pending = tokio::spawn(
            router(state.clone()).oneshot(Request::builder().uri("/").body(Body::empty()).unwrap()),
        );

        tokio::time::timeout(Duration::from_secs(5), async {
            while launcher.launched().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(launcher.launched(), ["http://127.0.0.1:8080/?address=true"]);

        state.store_address(WalletAddress::from("0xDEAD"));
        let resp = pending.await.unwrap().unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(reply(resp).await.message, "0xDEAD");
    }

    #[tokio::test]
    async fn address_request_fails_when_page_cannot_open() {
        let state = test_state(Arc::new(RecordingLauncher::failing()));
        let resp = router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
