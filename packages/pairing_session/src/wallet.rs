use async_trait::async_trait;

use crate::error::WalletError;
use crate::request::{SignRequest, TransactionReceipt, WalletAddress};

/// The wallet capability a session is handed at construction.
///
/// Implementations hold the keys; a session only ever asks for the connected
/// account and for one transaction to be signed and submitted.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Connect (prompting the user if needed) and return the account address.
    async fn connect(&self) -> Result<WalletAddress, WalletError>;

    async fn sign_and_submit_transaction(
        &self,
        request: &SignRequest,
    ) -> Result<TransactionReceipt, WalletError>;
}
