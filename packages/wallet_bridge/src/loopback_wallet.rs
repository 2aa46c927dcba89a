use async_trait::async_trait;
use pairing_session::{
    SignRequest, TransactionReceipt, WalletAddress, WalletError, WalletProvider,
};
use tracing::info;
use uuid::Uuid;

/// Development wallet: a fixed address that accepts every transaction.
///
/// Holds no keys and signs nothing; the receipt hash is random. Useful for
/// exercising the companion protocol without a browser extension.
#[derive(Debug, Clone)]
pub struct LoopbackWallet {
    address: WalletAddress,
}

impl LoopbackWallet {
    pub fn new(address: WalletAddress) -> Self {
        Self { address }
    }
}

#[async_trait]
impl WalletProvider for LoopbackWallet {
    async fn connect(&self) -> Result<WalletAddress, WalletError> {
        Ok(self.address.clone())
    }

    async fn sign_and_submit_transaction(
        &self,
        request: &SignRequest,
    ) -> Result<TransactionReceipt, WalletError> {
        if request.function.trim().is_empty() {
            return Err(WalletError::Rejected("empty function identifier".into()));
        }

        let hash = format!("0x{}", Uuid::new_v4().simple());
        info!(
            function = %request.function,
            arguments = request.arguments.len(),
            %hash,
            "loopback wallet accepted transaction"
        );
        Ok(TransactionReceipt {
            hash: Some(hash),
            raw: serde_json::json!({
                "sender": self.address,
                "function": request.function,
                "type_arguments": request.type_arguments,
            }),
        })
    }
}
