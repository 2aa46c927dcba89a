//! The pairing session state machine.
//!
//! ```text
//! Init → WalletConnecting → WalletConnected ─┬─ payload branch: AwaitingPayload → Signing ─┐
//!                                            └─ report branch:  ReportingAddress ─────────┴→ Closing → Closed
//! ```
//!
//! Both branches run on the caller's task (no spawning) and only read the
//! address. Each requested branch runs to its own end. The session moves to
//! `Closing` as soon as one of them asks for termination and closes once the
//! other has finished too; if nobody asks, the session never ends.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::SessionError;
use crate::launch::{LaunchParams, SessionMode};
use crate::push_channel::{PushChannelClient, PushChannelHandle};
use crate::report::AddressReporter;
use crate::request::{SignRequest, WalletAddress};
use crate::wallet::WalletProvider;

/// Whether a failed signature still closes the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosePolicy {
    /// Close once the wallet has answered, success or not.
    #[default]
    Always,
    /// Close only after a successful submission; a failure leaves the session open.
    OnSuccess,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub close_policy: ClosePolicy,
    /// `None` waits for the pushed payload indefinitely.
    pub payload_timeout: Option<Duration>,
    pub http: reqwest::Client,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            close_policy: ClosePolicy::default(),
            payload_timeout: None,
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    WalletConnecting,
    WalletConnected,
    ConnectFailed,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadState {
    /// Not requested, or not started yet.
    Idle,
    AwaitingPayload,
    Signing,
    Signed,
    SignFailed,
    /// No usable payload: channel error, timeout or decode failure.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Idle,
    ReportingAddress,
    Reported,
    Failed,
}

/// Observable view of a running session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub address: Option<WalletAddress>,
    pub payload: PayloadState,
    pub report: ReportState,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Init,
            address: None,
            payload: PayloadState::Idle,
            report: ReportState::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    PayloadSigned,
    PayloadSignFailed,
    AddressReported,
}

/// The termination signal: the hosting process should go away now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    pub reason: TerminationReason,
    pub address: WalletAddress,
}

pub struct PairingSession {
    wallet: Arc<dyn WalletProvider>,
    launch: LaunchParams,
    close_policy: ClosePolicy,
    push_client: PushChannelClient,
    reporter: AddressReporter,
    status: watch::Sender<SessionStatus>,
}

impl PairingSession {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        launch: LaunchParams,
        options: SessionOptions,
    ) -> Self {
        let push_client =
            PushChannelClient::new(options.http.clone()).with_payload_timeout(options.payload_timeout);
        let reporter = AddressReporter::new(options.http, launch.endpoints.address.clone());
        let (status, _) = watch::channel(SessionStatus::default());

        Self {
            wallet,
            launch,
            close_policy: options.close_policy,
            push_client,
            reporter,
            status,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.launch.mode
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Drive the session to completion.
    ///
    /// Returns `Err` only when the wallet cannot be connected. Branch failures
    /// are logged and swallowed. A session in which no branch asks for
    /// termination (connect-only, or every branch failed) never returns.
    pub async fn run(self) -> Result<Termination, SessionError> {
        let mode = self.launch.mode;
        info!(url = %self.launch.url, ?mode, "pairing session starting");

        self.status
            .send_modify(|s| s.state = SessionState::WalletConnecting);
        let address = match self.wallet.connect().await {
            Ok(address) => address,
            Err(err) => {
                let err = SessionError::WalletConnect(err);
                error!(code = err.error_code(), %err, "session aborted");
                self.status
                    .send_modify(|s| s.state = SessionState::ConnectFailed);
                return Err(err);
            }
        };
        info!(%address, "wallet connected");
        self.status.send_modify(|s| {
            s.state = SessionState::WalletConnected;
            s.address = Some(address.clone());
        });

        if mode.is_connect_only() {
            debug!("connect-only session, staying open");
        }

        // Subscribe before anything else so a payload pushed right after the
        // page loads has the smallest possible window to be missed.
        let channel = mode
            .wants_payload
            .then(|| self.push_client.open(self.launch.endpoints.push.clone()));

        let payload_branch = async {
            let reason = match channel {
                Some(channel) => self.payload_branch(channel).await,
                None => None,
            };
            self.closing_if_requested(reason)
        };
        let report_branch = async {
            let reason = if mode.wants_address_report {
                self.report_branch(&address).await
            } else {
                None
            };
            self.closing_if_requested(reason)
        };

        let (payload_reason, report_reason) = tokio::join!(payload_branch, report_branch);

        // A signed (or failed) payload says more about the session than the report.
        let Some(reason) = payload_reason.or(report_reason) else {
            debug!("no branch asked for termination, staying open");
            return std::future::pending().await;
        };

        info!(?reason, "pairing session closed");
        self.status.send_modify(|s| s.state = SessionState::Closed);

        Ok(Termination { reason, address })
    }

    async fn payload_branch(&self, mut channel: PushChannelHandle) -> Option<TerminationReason> {
        self.status
            .send_modify(|s| s.payload = PayloadState::AwaitingPayload);

        let event = match channel.await_first_payload().await {
            Ok(event) => event,
            Err(err) => {
                let err = SessionError::from(err);
                warn!(code = err.error_code(), %err, "payload branch ended");
                self.status.send_modify(|s| s.payload = PayloadState::Aborted);
                return None;
            }
        };
        drop(channel);
        debug!(bytes = event.data.len(), "payload received");

        let request = match SignRequest::from_event_body(&event.data) {
            Ok(request) => request,
            Err(err) => {
                error!(code = err.error_code(), %err, "discarding payload");
                self.status.send_modify(|s| s.payload = PayloadState::Aborted);
                return None;
            }
        };

        self.status.send_modify(|s| s.payload = PayloadState::Signing);
        info!(function = %request.function, "forwarding payload to wallet");

        match self.wallet.sign_and_submit_transaction(&request).await {
            Ok(receipt) => {
                info!(
                    hash = receipt.hash.as_deref().unwrap_or("unknown"),
                    "transaction submitted"
                );
                self.status.send_modify(|s| s.payload = PayloadState::Signed);
                Some(TerminationReason::PayloadSigned)
            }
            Err(err) => {
                let err = SessionError::Sign(err);
                warn!(code = err.error_code(), %err, policy = ?self.close_policy, "signing failed");
                self.status
                    .send_modify(|s| s.payload = PayloadState::SignFailed);
                match self.close_policy {
                    ClosePolicy::Always => Some(TerminationReason::PayloadSignFailed),
                    ClosePolicy::OnSuccess => None,
                }
            }
        }
    }

    /// The first termination request moves the session to `Closing`; the
    /// other branch may still be running.
    fn closing_if_requested(&self, reason: Option<TerminationReason>) -> Option<TerminationReason> {
        if let Some(reason) = reason {
            self.status.send_if_modified(|s| {
                if s.state == SessionState::Closing {
                    return false;
                }
                debug!(?reason, "termination requested");
                s.state = SessionState::Closing;
                true
            });
        }
        reason
    }

    async fn report_branch(&self, address: &WalletAddress) -> Option<TerminationReason> {
        self.status
            .send_modify(|s| s.report = ReportState::ReportingAddress);

        match self.reporter.report(address).await {
            Ok(()) => {
                info!(endpoint = %self.reporter.endpoint(), "address reported");
                self.status.send_modify(|s| s.report = ReportState::Reported);
                Some(TerminationReason::AddressReported)
            }
            Err(err) => {
                let err = SessionError::Report(err);
                warn!(code = err.error_code(), %err, "address branch ended");
                self.status.send_modify(|s| s.report = ReportState::Failed);
                None
            }
        }
    }
}
