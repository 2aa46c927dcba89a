use std::time::Duration;

use reqwest::StatusCode;

/// Failures reported by a wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// The user (or the wallet's policy) declined the request.
    #[error("wallet rejected the request: {0}")]
    Rejected(String),

    /// The wallet could not be reached or is not installed.
    #[error("wallet unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

/// Failures of the push channel subscription.
#[derive(Debug, thiserror::Error)]
pub enum PushChannelError {
    #[error("push channel is unavailable")]
    Unavailable,

    #[error("push channel subscription rejected with status {0}")]
    Rejected(StatusCode),

    #[error("push channel transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("push channel disconnected before a payload arrived")]
    Disconnected,

    #[error("no payload arrived within {0:?}")]
    TimedOut(Duration),

    #[error("push channel is already closed")]
    Closed,
}

impl PushChannelError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Transport(err)
        }
    }
}

/// Failures of the address-report call.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("companion server is unavailable")]
    Unavailable,

    #[error("address report rejected with status {0}")]
    Rejected(StatusCode),

    #[error("address report transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

impl ReportError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Transport(err)
        }
    }
}

/// Everything that can go wrong during a pairing session.
///
/// Only [`SessionError::WalletConnect`] and [`SessionError::InvalidLaunchUrl`]
/// ever leave [`crate::PairingSession::run`]. The rest are branch-local: they
/// are logged where they happen and end that branch.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid launch url: {0}")]
    InvalidLaunchUrl(#[from] url::ParseError),

    #[error("wallet connect failed: {0}")]
    WalletConnect(#[source] WalletError),

    #[error("payload is not a valid sign request: {0}")]
    PayloadDecode(#[source] serde_json::Error),

    #[error("wallet failed to sign payload: {0}")]
    Sign(#[source] WalletError),

    #[error("address report failed: {0}")]
    Report(#[source] ReportError),

    #[error(transparent)]
    PushChannel(#[from] PushChannelError),
}

impl SessionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidLaunchUrl(_) => "invalid_launch_url",
            Self::WalletConnect(_) => "wallet_connect_failure",
            Self::PayloadDecode(_) => "payload_decode_failure",
            Self::Sign(_) => "sign_failure",
            Self::Report(_) => "report_failure",
            Self::PushChannel(_) => "push_channel_failure",
        }
    }

    /// Whether the error ends the whole session rather than a single branch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidLaunchUrl(_) | Self::WalletConnect(_))
    }
}
