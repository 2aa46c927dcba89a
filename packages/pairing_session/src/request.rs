use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SessionError;

/// A transaction the companion server wants the wallet to sign and submit.
///
/// Field names follow the companion's wire format (`type`, `function`,
/// `arguments`, `type_arguments`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    #[serde(rename = "type")]
    pub kind: String,
    /// Fully-qualified function identifier, e.g. `0x1::coin::transfer`.
    pub function: String,
    pub arguments: Vec<String>,
    pub type_arguments: Vec<String>,
}

impl SignRequest {
    /// Decode the body of a `payload` push event.
    pub fn from_event_body(body: &str) -> Result<Self, SessionError> {
        serde_json::from_str(body).map_err(SessionError::PayloadDecode)
    }
}

/// Opaque handle of the connected wallet account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WalletAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl From<&str> for WalletAddress {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

/// Body of `POST /address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressReport {
    pub hex: String,
}

impl From<&WalletAddress> for AddressReport {
    fn from(address: &WalletAddress) -> Self {
        Self {
            hex: address.as_str().to_string(),
        }
    }
}

/// Whatever the wallet hands back after submitting a transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_request_uses_companion_field_names() {
        let body = r#"{
            "type": "entry_function_payload",
            "function": "0x1::coin::transfer",
            "arguments": ["0xB0B", "100"],
            "type_arguments": ["0x1::aptos_coin::AptosCoin"]
        }"#;
        let request = SignRequest::from_event_body(body).unwrap();
        assert_eq!(request.kind, "entry_function_payload");
        assert_eq!(request.function, "0x1::coin::transfer");
        assert_eq!(request.arguments, vec!["0xB0B", "100"]);
        assert_eq!(request.type_arguments, vec!["0x1::aptos_coin::AptosCoin"]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "entry_function_payload");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn non_json_body_is_a_decode_failure() {
        let err = SignRequest::from_event_body("not-json").unwrap_err();
        assert!(matches!(err, SessionError::PayloadDecode(_)));
    }

    #[test]
    fn missing_field_is_a_decode_failure() {
        let err = SignRequest::from_event_body(r#"{"type":"x","function":"f","arguments":[]}"#)
            .unwrap_err();
        assert_eq!(err.error_code(), "payload_decode_failure");
    }

    #[test]
    fn address_report_body() {
        let address = WalletAddress::from("0xDEAD");
        let json = serde_json::to_string(&AddressReport::from(&address)).unwrap();
        assert_eq!(json, r#"{"hex":"0xDEAD"}"#);
    }

    #[test]
    fn wallet_address_is_transparent() {
        let address: WalletAddress = serde_json::from_str(r#""0xABC""#).unwrap();
        assert_eq!(address.as_str(), "0xABC");
        assert_eq!(address.to_string(), "0xABC");
    }

    #[test]
    fn receipt_tolerates_missing_fields() {
        let receipt: TransactionReceipt = serde_json::from_str("{}").unwrap();
        assert!(receipt.hash.is_none());
        assert!(receipt.raw.is_null());
    }
}
