use anyhow::{Context, Result};
use pairing_session::{ClosePolicy, SessionOptions, WalletAddress};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

// =============================================================================
// File config (figment-deserialized from defaults / bridge.toml / env vars)
// =============================================================================
//
//   bridge.toml:     [companion]
//                    browser_port = 8080
//
//   env var:         BRIDGE_COMPANION__BROWSER_PORT=8080   (double underscore = nesting)

pub const DEFAULT_CONFIG_FILE: &str = "bridge.toml";

/// How the companion opens the hosting page for a new session.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LauncherKind {
    /// Open the page in the system browser (wallet extension session)
    #[default]
    Browser,
    /// Only log the page URL
    Log,
    /// Run the session in-process with the loopback wallet
    Inline,
}

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub companion: CompanionFileConfig,
    #[serde(default)]
    pub session: SessionFileConfig,
    #[serde(default)]
    pub launcher: LauncherKind,
}

/// Companion server knobs (lives under `[companion]` in bridge.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompanionFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Listener the wallet page talks to (`/sse`, `/address`, static assets)
    #[serde(default = "default_browser_port")]
    pub browser_port: u16,
    /// Listener the requesting application talks to
    #[serde(default = "default_application_port")]
    pub application_port: u16,
    /// 0 disables the request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_sse_interval_secs")]
    pub sse_interval_secs: u64,
    /// Built wallet page, served as the browser-side fallback
    #[serde(default)]
    pub assets_dir: Option<PathBuf>,
}

impl Default for CompanionFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            browser_port: default_browser_port(),
            application_port: default_application_port(),
            request_timeout_secs: default_request_timeout_secs(),
            sse_interval_secs: default_sse_interval_secs(),
            assets_dir: None,
        }
    }
}

/// Pairing session knobs (lives under `[session]` in bridge.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionFileConfig {
    #[serde(default)]
    pub close_policy: ClosePolicy,
    /// 0 waits for the pushed payload indefinitely
    #[serde(default)]
    pub payload_timeout_secs: u64,
    /// Address the loopback wallet reports
    #[serde(default = "default_wallet_address")]
    pub wallet_address: String,
}

impl Default for SessionFileConfig {
    fn default() -> Self {
        Self {
            close_policy: ClosePolicy::default(),
            payload_timeout_secs: 0,
            wallet_address: default_wallet_address(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_browser_port() -> u16 {
    8080
}
fn default_application_port() -> u16 {
    8081
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_sse_interval_secs() -> u64 {
    10
}
fn default_wallet_address() -> String {
    "0x1".to_string()
}

/// Build a figment that layers: defaults → config file → BRIDGE_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `BRIDGE_COMPANION__HOST=0.0.0.0`  →  `companion.host = "0.0.0.0"`
///   `BRIDGE_SESSION__CLOSE_POLICY=on_success`  →  `session.close_policy = "on_success"`
pub fn load_config(config_path: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("BRIDGE_").split("__"))
}

pub fn load_file_config(config_path: Option<&Path>) -> Result<FileConfig> {
    load_config(config_path)
        .extract()
        .context("Failed to load bridge configuration")
}

// =============================================================================
// Runtime config structs (derived from FileConfig)
// =============================================================================

#[derive(Clone, Debug)]
pub struct CompanionConfig {
    pub browser_addr: SocketAddr,
    pub application_addr: SocketAddr,
    /// None = no timeout
    pub request_timeout: Option<Duration>,
    /// Interval between payload re-sends and keep-alives on `/sse`
    pub sse_interval: Duration,
    pub assets_dir: Option<PathBuf>,
}

impl CompanionConfig {
    pub fn from_file(fc: &CompanionFileConfig) -> Result<Self> {
        let browser_addr = format!("{}:{}", fc.host, fc.browser_port)
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid companion host: {}", fc.host))?;
        let application_addr = format!("{}:{}", fc.host, fc.application_port)
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid companion host: {}", fc.host))?;

        Ok(Self {
            browser_addr,
            application_addr,
            request_timeout: if fc.request_timeout_secs == 0 {
                None
            } else {
                Some(Duration::from_secs(fc.request_timeout_secs))
            },
            sse_interval: Duration::from_secs(fc.sse_interval_secs.max(1)),
            assets_dir: fc.assets_dir.clone(),
        })
    }

    /// Base URL of the application-side listener, for the CLI client.
    pub fn application_url(&self) -> String {
        format!("http://{}", self.application_addr)
    }
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub close_policy: ClosePolicy,
    pub payload_timeout: Option<Duration>,
    pub wallet_address: WalletAddress,
}

impl SessionConfig {
    pub fn from_file(fc: &SessionFileConfig) -> Self {
        Self {
            close_policy: fc.close_policy,
            payload_timeout: if fc.payload_timeout_secs == 0 {
                None
            } else {
                Some(Duration::from_secs(fc.payload_timeout_secs))
            },
            wallet_address: WalletAddress::new(fc.wallet_address.clone()),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            close_policy: self.close_policy,
            payload_timeout: self.payload_timeout,
            ..SessionOptions::default()
        }
    }
}

/// Hosting page URL for a session in the given mode, e.g. `http://127.0.0.1:8080/?payload=true`.
pub fn page_url(origin: &Url, key: &str) -> Result<Url> {
    let mut url = origin.join("/")?;
    url.query_pairs_mut().append_pair(key, "true");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairing_session::LaunchParams;

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn test_companion_file_config_defaults() {
        let d = CompanionFileConfig::default();
        assert_eq!(d.host, "127.0.0.1");
        assert_eq!(d.browser_port, 8080);
        assert_eq!(d.application_port, 8081);
        assert_eq!(d.request_timeout_secs, 10);
        assert_eq!(d.sse_interval_secs, 10);
        assert!(d.assets_dir.is_none());
    }

    #[test]
    fn test_session_file_config_defaults() {
        let d = SessionFileConfig::default();
        assert_eq!(d.close_policy, ClosePolicy::Always);
        assert_eq!(d.payload_timeout_secs, 0);
        assert_eq!(d.wallet_address, "0x1");
    }

    // ── CompanionConfig::from_file ──────────────────────────────────────

    #[test]
    fn test_companion_config_from_file_defaults() {
        let cc = CompanionConfig::from_file(&CompanionFileConfig::default()).unwrap();
        assert_eq!(cc.browser_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cc.application_addr, "127.0.0.1:8081".parse().unwrap());
        assert_eq!(cc.request_timeout, Some(Duration::from_secs(10)));
        assert_eq!(cc.sse_interval, Duration::from_secs(10));
        assert_eq!(cc.application_url(), "http://127.0.0.1:8081");
    }

    #[test]
    fn test_companion_config_zero_timeout_disables() {
        let fc = CompanionFileConfig {
            request_timeout_secs: 0,
            sse_interval_secs: 0,
            ..Default::default()
        };
        let cc = CompanionConfig::from_file(&fc).unwrap();
        assert!(cc.request_timeout.is_none());
        // a zero interval would spin; clamp instead
        assert_eq!(cc.sse_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_companion_config_bad_host() {
        let fc = CompanionFileConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(CompanionConfig::from_file(&fc).is_err());
    }

    // ── SessionConfig::from_file ────────────────────────────────────────

    #[test]
    fn test_session_config_payload_timeout() {
        let sc = SessionConfig::from_file(&SessionFileConfig::default());
        assert!(sc.payload_timeout.is_none());

        let fc = SessionFileConfig {
            payload_timeout_secs: 30,
            close_policy: ClosePolicy::OnSuccess,
            ..Default::default()
        };
        let options = SessionConfig::from_file(&fc).session_options();
        assert_eq!(options.payload_timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.close_policy, ClosePolicy::OnSuccess);
    }

    // ── page_url ────────────────────────────────────────────────────────

    #[test]
    fn test_page_url_sets_mode_key() {
        let origin = Url::parse("http://127.0.0.1:8080").unwrap();
        let url = page_url(&origin, "payload").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/?payload=true");

        let launch = LaunchParams::from_url(url).unwrap();
        assert!(launch.mode.wants_payload);
        assert!(!launch.mode.wants_address_report);
    }

    // ── load_config ─────────────────────────────────────────────────────

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc = load_file_config(Some(&tmp.path().join("bridge.toml"))).unwrap();
        assert_eq!(fc.companion.browser_port, 8080);
        assert_eq!(fc.launcher, LauncherKind::Browser);
    }

    #[test]
    fn test_load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bridge.toml");
        std::fs::write(
            &path,
            "launcher = \"inline\"\n\
             [companion]\nbrowser_port = 9090\nassets_dir = \"/srv/wallet\"\n\
             [session]\nclose_policy = \"on_success\"\npayload_timeout_secs = 5\n",
        )
        .unwrap();
        let fc = load_file_config(Some(&path)).unwrap();
        assert_eq!(fc.launcher, LauncherKind::Inline);
        assert_eq!(fc.companion.browser_port, 9090);
        assert_eq!(fc.companion.application_port, 8081);
        assert_eq!(fc.companion.assets_dir, Some(PathBuf::from("/srv/wallet")));
        assert_eq!(fc.session.close_policy, ClosePolicy::OnSuccess);
        assert_eq!(fc.session.payload_timeout_secs, 5);
    }

    #[test]
    fn test_load_config_rejects_unknown_policy() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bridge.toml");
        std::fs::write(&path, "[session]\nclose_policy = \"sometimes\"\n").unwrap();
        assert!(load_file_config(Some(&path)).is_err());
    }
}
