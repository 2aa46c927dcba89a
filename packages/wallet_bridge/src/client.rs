//! HTTP client for the application side of a running companion.

use pairing_session::SignRequest;
use reqwest::StatusCode;
use tracing::debug;

use crate::companion::CompanionReply;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("companion is unavailable")]
    Unavailable,

    #[error("companion answered {0}")]
    Rejected(StatusCode),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }
}

#[derive(Clone)]
pub struct CompanionClient {
    base_url: String,
    http: reqwest::Client,
}

impl CompanionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Hand a transaction to the companion for the wallet to sign.
    pub async fn submit(&self, request: &SignRequest) -> Result<CompanionReply, ClientError> {
        debug!(function = %request.function, "submitting sign request");
        let resp = self
            .http
            .post(format!("{}/", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        Self::reply(resp).await
    }

    /// Ask the companion which address the wallet reports. Blocks until a session answers.
    pub async fn request_address(&self) -> Result<CompanionReply, ClientError> {
        let resp = self
            .http
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        Self::reply(resp).await
    }

    async fn reply(resp: reqwest::Response) -> Result<CompanionReply, ClientError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Rejected(status));
        }
        resp.json::<CompanionReply>()
            .await
            .map_err(ClientError::from_reqwest)
    }
}
