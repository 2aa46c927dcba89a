//! Launch parameters: the hosting page URL decides what a session does and
//! which companion endpoints it talks to.

use url::Url;

use crate::error::SessionError;

/// Origin of the companion server's browser-side listener.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8080/";

/// Query key that enables the payload-signing branch.
pub const PAYLOAD_KEY: &str = "payload";
/// Query key that enables the address-report branch.
pub const ADDRESS_KEY: &str = "address";

const PUSH_PATH: &str = "/sse";
const ADDRESS_PATH: &str = "/address";

/// Which branches a session runs. Computed once at session start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMode {
    pub wants_payload: bool,
    pub wants_address_report: bool,
}

impl SessionMode {
    /// Only key presence matters; `?payload`, `?payload=1` and
    /// `?payload=true` all enable the payload branch.
    pub fn from_url(url: &Url) -> Self {
        let mut mode = Self::default();
        for (key, _) in url.query_pairs() {
            match key.as_ref() {
                PAYLOAD_KEY => mode.wants_payload = true,
                ADDRESS_KEY => mode.wants_address_report = true,
                _ => {}
            }
        }
        mode
    }

    pub fn is_connect_only(&self) -> bool {
        !self.wants_payload && !self.wants_address_report
    }
}

/// Companion endpoints, same-origin with the hosting page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionEndpoints {
    pub push: Url,
    pub address: Url,
}

impl CompanionEndpoints {
    pub fn for_origin(url: &Url) -> Result<Self, SessionError> {
        Ok(Self {
            push: url.join(PUSH_PATH)?,
            address: url.join(ADDRESS_PATH)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    pub url: Url,
    pub mode: SessionMode,
    pub endpoints: CompanionEndpoints,
}

impl LaunchParams {
    pub fn parse(launch_url: &str) -> Result<Self, SessionError> {
        Self::from_url(Url::parse(launch_url)?)
    }

    pub fn from_url(url: Url) -> Result<Self, SessionError> {
        let mode = SessionMode::from_url(&url);
        let endpoints = CompanionEndpoints::for_origin(&url)?;
        Ok(Self {
            url,
            mode,
            endpoints,
        })
    }
}

impl Default for LaunchParams {
    fn default() -> Self {
        let url = Url::parse(DEFAULT_ORIGIN).expect("default origin is a valid url");
        Self::from_url(url).expect("default origin is a base url")
    }
}
