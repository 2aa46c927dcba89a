//! Pairing Session - one-shot handshake between a wallet and a local companion
//!
//! A session connects to the wallet, then, depending on the launch URL, waits
//! for exactly one pushed transaction and has the wallet sign it, reports the
//! wallet address back to the companion, both, or neither. It has no server,
//! CLI or configuration of its own.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pairing_session::{LaunchParams, PairingSession, SessionOptions, WalletProvider};
//!
//! async fn pair(wallet: Arc<dyn WalletProvider>) -> Result<(), pairing_session::SessionError> {
//!     let launch = LaunchParams::parse("http://127.0.0.1:8080/?payload=true")?;
//!     let session = PairingSession::new(wallet, launch, SessionOptions::default());
//!
//!     let termination = session.run().await?;
//!     println!("done: {:?}", termination.reason);
//!     Ok(())
//! }
//! ```

mod error;
pub mod launch;
pub mod push_channel;
mod report;
pub mod request;
pub mod session;
pub mod sse;
mod wallet;

pub use error::{PushChannelError, ReportError, SessionError, WalletError};
pub use launch::{CompanionEndpoints, LaunchParams, SessionMode};
pub use push_channel::{PAYLOAD_EVENT, PayloadEvent, PushChannelClient, PushChannelHandle};
pub use report::AddressReporter;
pub use request::{AddressReport, SignRequest, TransactionReceipt, WalletAddress};
pub use session::{
    ClosePolicy, PairingSession, PayloadState, ReportState, SessionOptions, SessionState,
    SessionStatus, Termination, TerminationReason,
};
pub use wallet::WalletProvider;
