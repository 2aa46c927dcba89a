//! Wallet Bridge - the local side of the wallet pairing protocol
//!
//! Runs the companion server that parks sign requests for, and collects
//! addresses from, pairing sessions, plus the pieces the `bridge` CLI is
//! built from: configuration, page launchers, a loopback wallet for
//! development, and a client for the application-side listener.

pub mod client;
pub mod companion;
pub mod config;
pub mod launcher;
pub mod loopback_wallet;

pub use client::{ClientError, CompanionClient};
pub use companion::{Companion, CompanionReply, CompanionState};
pub use config::{CompanionConfig, FileConfig, LauncherKind, SessionConfig};
pub use launcher::{BrowserLauncher, InlineLauncher, LogLauncher, PageLauncher, launcher_for};
pub use loopback_wallet::LoopbackWallet;
