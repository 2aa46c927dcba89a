use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pairing_session::{LaunchParams, PairingSession, SignRequest, WalletAddress, launch};
use tracing::{debug, info, warn};
use tracing_subscriber::prelude::*;
use wallet_bridge::config::{self, CompanionConfig, SessionConfig};
use wallet_bridge::{ClientError, Companion, CompanionClient, LauncherKind, LoopbackWallet};

#[derive(Parser)]
#[command(name = "bridge")]
#[command(about = "Local companion for wallet pairing sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./bridge.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the companion server (browser and application listeners)
    Serve(ServeArgs),

    /// Run one pairing session with the loopback wallet
    Session(SessionArgs),

    /// Submit a sign request to a running companion
    Submit(SubmitArgs),

    /// Ask a running companion for the wallet address
    Address,
}

#[derive(Parser)]
struct ServeArgs {
    /// How to open the wallet page (overrides the config file)
    #[arg(long, value_enum)]
    launcher: Option<LauncherKind>,

    /// Directory holding the built wallet page
    #[arg(long)]
    assets_dir: Option<PathBuf>,
}

#[derive(Parser)]
struct SessionArgs {
    /// Launch URL of the hosting page, e.g. http://127.0.0.1:8080/?payload=true
    #[arg(long, default_value = launch::DEFAULT_ORIGIN)]
    url: String,

    /// Address the loopback wallet reports (overrides the config file)
    #[arg(long)]
    address: Option<String>,
}

#[derive(Parser)]
struct SubmitArgs {
    /// JSON file holding the sign request
    file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let file_config = config::load_file_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve(args) => {
            let mut companion = file_config.companion.clone();
            if let Some(dir) = args.assets_dir {
                companion.assets_dir = Some(dir);
            }
            let kind = args.launcher.unwrap_or(file_config.launcher);
            let session = SessionConfig::from_file(&file_config.session);
            serve(CompanionConfig::from_file(&companion)?, kind, &session).await
        }
        Commands::Session(args) => {
            let mut session = SessionConfig::from_file(&file_config.session);
            if let Some(address) = args.address {
                session.wallet_address = WalletAddress::new(address);
            }
            run_session(&args.url, &session).await
        }
        Commands::Submit(args) => {
            let companion = CompanionConfig::from_file(&file_config.companion)?;
            submit(&companion, &args.file).await
        }
        Commands::Address => {
            let companion = CompanionConfig::from_file(&file_config.companion)?;
            address(&companion).await
        }
    }
}

fn init_tracing(debug: bool) {
    let default_directive = if debug {
        "bridge=debug,wallet_bridge=debug,pairing_session=debug,tower_http=debug,info"
    } else {
        "bridge=info,wallet_bridge=info,pairing_session=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();
}

async fn serve(config: CompanionConfig, kind: LauncherKind, session: &SessionConfig) -> Result<()> {
    info!(launcher = ?kind, "Starting wallet bridge companion");
    let launcher = wallet_bridge::launcher_for(kind, session);
    let companion = Companion::bind(config, launcher).await?;

    tokio::select! {
        res = companion.run() => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

async fn run_session(url: &str, config: &SessionConfig) -> Result<()> {
    let launch = LaunchParams::parse(url).with_context(|| format!("Invalid launch URL: {url}"))?;
    if launch.mode.is_connect_only() {
        warn!("launch URL asks for neither payload nor address; session will stay open");
    }

    let wallet = Arc::new(LoopbackWallet::new(config.wallet_address.clone()));
    let session = PairingSession::new(wallet, launch, config.session_options());

    let mut status = session.subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            debug!(status = ?*status.borrow(), "session status");
        }
    });

    tokio::select! {
        res = session.run() => {
            let termination = res.with_context(|| format!("Pairing session failed for {url}"))?;
            info!(reason = ?termination.reason, address = %termination.address, "session closed");
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, abandoning session");
            Ok(())
        }
    }
}

async fn submit(config: &CompanionConfig, file: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let request: SignRequest = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a sign request", file.display()))?;

    let client = CompanionClient::new(config.application_url());
    let reply = client.submit(&request).await.map_err(explain)?;
    println!("{}", reply.message);
    Ok(())
}

async fn address(config: &CompanionConfig) -> Result<()> {
    let client = CompanionClient::new(config.application_url());
    let reply = client.request_address().await.map_err(explain)?;
    println!("{}", reply.message);
    Ok(())
}

fn explain(err: ClientError) -> anyhow::Error {
    match err {
        ClientError::Unavailable => {
            anyhow::anyhow!("companion is not running (start it with `bridge serve`)")
        }
        other => other.into(),
    }
}
