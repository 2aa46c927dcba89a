//! The companion server.
//!
//! Two listeners share one state:
//!   browser side      GET /sse, POST /address, static wallet page
//!   application side  POST / (sign this), GET / (who is the wallet?)
//!
//! The application side parks a request, launches the hosting page, and the
//! page's pairing session picks it up from the browser side.

pub mod application;
pub mod browser;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Json, Router, error_handling::HandleErrorLayer, http::StatusCode, response::IntoResponse,
};
use pairing_session::{SignRequest, WalletAddress};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::config::CompanionConfig;
use crate::launcher::PageLauncher;

/// Reply body shared by both listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionReply {
    pub message: String,
}

impl CompanionReply {
    pub fn ok() -> Self {
        Self {
            message: "Ok".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct CompanionState {
    /// Sign request waiting for the next push channel subscriber
    pending_payload: Arc<Mutex<Option<SignRequest>>>,
    /// Last address reported by a session, cleared once handed out
    reported_address: Arc<watch::Sender<Option<WalletAddress>>>,
    launcher: Arc<dyn PageLauncher>,
    /// Origin of the browser-side listener, used to build page URLs
    page_origin: Url,
    sse_interval: Duration,
}

impl CompanionState {
    pub fn new(launcher: Arc<dyn PageLauncher>, page_origin: Url, sse_interval: Duration) -> Self {
        let (reported_address, _) = watch::channel(None);
        Self {
            pending_payload: Arc::new(Mutex::new(None)),
            reported_address: Arc::new(reported_address),
            launcher,
            page_origin,
            sse_interval,
        }
    }

    pub async fn park_payload(&self, request: SignRequest) {
        *self.pending_payload.lock().await = Some(request);
    }

    pub async fn take_payload(&self) -> Option<SignRequest> {
        self.pending_payload.lock().await.take()
    }

    pub fn store_address(&self, address: WalletAddress) {
        self.reported_address.send_replace(Some(address));
    }

    pub fn clear_address(&self) {
        self.reported_address.send_replace(None);
    }

    /// Wait for the next reported address and clear the slot.
    pub async fn next_address(&self) -> Option<WalletAddress> {
        let mut rx = self.reported_address.subscribe();
        let address = rx.wait_for(Option::is_some).await.ok()?.clone();
        self.clear_address();
        address
    }

    pub fn page_origin(&self) -> &Url {
        &self.page_origin
    }
}

/// Adds a unique request ID to each incoming request's span.
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

async fn handle_middleware_error(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "request timed out".to_string())
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Unhandled internal error: {err}"),
        )
    }
}

/// Liveness probe, mounted on both listeners.
pub(crate) async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Request tracing plus the optional request timeout.
pub(crate) fn with_middleware(router: Router, request_timeout: Option<Duration>) -> Router {
    let router = router.layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan));
    match request_timeout {
        Some(limit) => router.layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(limit),
        ),
        None => router,
    }
}

/// Both listeners, bound and ready to serve.
pub struct Companion {
    browser: TcpListener,
    application: TcpListener,
    browser_addr: SocketAddr,
    application_addr: SocketAddr,
    state: CompanionState,
    config: CompanionConfig,
}

impl Companion {
    pub async fn bind(config: CompanionConfig, launcher: Arc<dyn PageLauncher>) -> Result<Self> {
        let browser = TcpListener::bind(config.browser_addr)
            .await
            .with_context(|| format!("Failed to bind browser side on {}", config.browser_addr))?;
        let application = TcpListener::bind(config.application_addr)
            .await
            .with_context(|| {
                format!(
                    "Failed to bind application side on {}",
                    config.application_addr
                )
            })?;

        // Actual addresses matter when a port of 0 was requested
        let browser_addr = browser.local_addr()?;
        let application_addr = application.local_addr()?;

        let page_origin = Url::parse(&format!("http://{browser_addr}/"))?;
        let state = CompanionState::new(launcher, page_origin, config.sse_interval);

        Ok(Self {
            browser,
            application,
            browser_addr,
            application_addr,
            state,
            config,
        })
    }

    pub fn browser_addr(&self) -> SocketAddr {
        self.browser_addr
    }

    pub fn application_addr(&self) -> SocketAddr {
        self.application_addr
    }

    pub fn state(&self) -> &CompanionState {
        &self.state
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            browser: browser_listener,
            application: application_listener,
            browser_addr,
            application_addr,
            state,
            config,
        } = self;

        let browser_app = with_middleware(
            browser::router(state.clone(), config.assets_dir.as_deref()),
            config.request_timeout,
        );
        let application_app =
            with_middleware(application::router(state), config.request_timeout);

        info!("listening on {} for browser", browser_addr);
        info!("listening on {} for application", application_addr);
        info!("Endpoints:");
        info!("  GET  {}/sse      - push channel", browser_addr);
        info!("  POST {}/address  - address report", browser_addr);
        info!("  POST {}/         - submit a sign request", application_addr);
        info!("  GET  {}/         - request the wallet address", application_addr);

        let browser_server = async {
            axum::serve(browser_listener, browser_app)
                .await
                .context("Browser-side server failed")
        };
        let application_server = async {
            axum::serve(application_listener, application_app)
                .await
                .context("Application-side server failed")
        };
        tokio::try_join!(browser_server, application_server)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Records launched URLs instead of opening anything.
    #[derive(Default)]
    pub struct RecordingLauncher {
        pub launched: StdMutex<Vec<Url>>,
        pub fail: bool,
    }

    impl RecordingLauncher {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn launched(&self) -> Vec<String> {
            self.launched
                .lock()
                .unwrap()
                .iter()
                .map(|u| u.to_string())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl PageLauncher for RecordingLauncher {
        async fn launch(&self, url: &Url) -> Result<()> {
            if self.fail {
                anyhow::bail!("no browser available");
            }
            self.launched.lock().unwrap().push(url.clone());
            Ok(())
        }
    }

    pub fn test_state(launcher: Arc<RecordingLauncher>) -> CompanionState {
        CompanionState::new(
            launcher,
            Url::parse("http://127.0.0.1:8080/").unwrap(),
            Duration::from_secs(10),
        )
    }
}
