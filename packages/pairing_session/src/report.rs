use tracing::debug;
use url::Url;

use crate::error::ReportError;
use crate::request::{AddressReport, WalletAddress};

/// Sends the connected address back to the companion (`POST /address`).
#[derive(Debug, Clone)]
pub struct AddressReporter {
    http: reqwest::Client,
    endpoint: Url,
}

impl AddressReporter {
    pub fn new(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// One POST with `{"hex": <address>}`. Only completion is observed; the
    /// response body is ignored.
    pub async fn report(&self, address: &WalletAddress) -> Result<(), ReportError> {
        debug!(endpoint = %self.endpoint, %address, "reporting address");
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&AddressReport::from(address))
            .send()
            .await
            .map_err(ReportError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Rejected(status));
        }
        Ok(())
    }
}
