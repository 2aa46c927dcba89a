//! Opening the hosting page of a pairing session.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use pairing_session::{LaunchParams, PairingSession, SessionOptions, WalletProvider};
use tracing::{info, warn};
use url::Url;

use crate::config::{LauncherKind, SessionConfig};
use crate::loopback_wallet::LoopbackWallet;

#[async_trait]
pub trait PageLauncher: Send + Sync {
    async fn launch(&self, url: &Url) -> Result<()>;
}

/// Opens the page in the system browser, where the wallet extension runs the session.
pub struct BrowserLauncher;

#[async_trait]
impl PageLauncher for BrowserLauncher {
    async fn launch(&self, url: &Url) -> Result<()> {
        info!(%url, "opening wallet page in browser");
        let target = url.to_string();
        tokio::task::spawn_blocking(move || webbrowser::open(&target))
            .await
            .context("Browser launcher task failed")?
            .with_context(|| format!("Failed to open browser at {url}"))
    }
}

/// Leaves opening the page to the operator.
pub struct LogLauncher;

#[async_trait]
impl PageLauncher for LogLauncher {
    async fn launch(&self, url: &Url) -> Result<()> {
        info!("open {url} or run: bridge session --url '{url}'");
        Ok(())
    }
}

/// Runs the session in-process against the companion, no browser involved.
pub struct InlineLauncher {
    wallet: Arc<dyn WalletProvider>,
    options: SessionOptions,
}

impl InlineLauncher {
    pub fn new(wallet: Arc<dyn WalletProvider>, options: SessionOptions) -> Self {
        Self { wallet, options }
    }
}

#[async_trait]
impl PageLauncher for InlineLauncher {
    async fn launch(&self, url: &Url) -> Result<()> {
        let launch = LaunchParams::from_url(url.clone())?;
        let session = PairingSession::new(self.wallet.clone(), launch, self.options.clone());
        info!(%url, "starting inline pairing session");
        tokio::spawn(async move {
            match session.run().await {
                Ok(termination) => info!(reason = ?termination.reason, "inline session finished"),
                Err(err) => warn!(%err, "inline session failed"),
            }
        });
        Ok(())
    }
}

pub fn launcher_for(kind: LauncherKind, session: &SessionConfig) -> Arc<dyn PageLauncher> {
    match kind {
        LauncherKind::Browser => Arc::new(BrowserLauncher),
        LauncherKind::Log => Arc::new(LogLauncher),
        LauncherKind::Inline => Arc::new(InlineLauncher::new(
            Arc::new(LoopbackWallet::new(session.wallet_address.clone())),
            session.session_options(),
        )),
    }
}
