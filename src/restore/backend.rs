//! External collaborators of the restore flow
//!
//! The chain backend (address-usage checks, UTXO lookup, broadcast) and
//! the persistent wallet sink are consumed through object-safe traits;
//! the state machine never talks HTTP directly. An HTTP implementation
//! over the backend's JSON API is provided here; tests substitute
//! in-memory fakes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};
use crate::types::{
    AddressUsage, NetworkContext, RestoreMode, ServerStatus, Utxo, WalletHandle,
};

/// Boxed future alias so the traits stay object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Chain backend consumed by the restore flow.
pub trait ChainBackend: Send + Sync {
    /// Which of the given addresses have appeared on chain.
    fn check_addresses_in_use(
        &self,
        addresses: Vec<String>,
    ) -> BoxFuture<'_, WalletResult<AddressUsage>>;

    /// Spendable outputs at the given addresses.
    fn get_utxos_for_addresses(
        &self,
        addresses: Vec<String>,
    ) -> BoxFuture<'_, WalletResult<Vec<Utxo>>>;

    /// Submit a signed transaction; returns its id.
    fn broadcast_transaction(&self, signed_tx: Vec<u8>) -> BoxFuture<'_, WalletResult<String>>;

    /// Health probe, used as a preflight before scanning.
    fn check_server_status(&self) -> BoxFuture<'_, WalletResult<ServerStatus>>;
}

/// Everything the storage sink needs to persist a restored wallet.
#[derive(Clone, Serialize, Deserialize)]
pub struct RestoreWalletRequest {
    pub mode: RestoreMode,
    pub recovery_phrase: String,
    pub wallet_name: String,
    pub wallet_password: String,
    pub network_id: u8,
    pub account_index: u32,
}

impl std::fmt::Debug for RestoreWalletRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreWalletRequest")
            .field("wallet_name", &self.wallet_name)
            .field("account_index", &self.account_index)
            .field("recovery_phrase", &"<redacted>")
            .field("wallet_password", &"<redacted>")
            .finish()
    }
}

/// Persistent storage sink the finished restore is handed to.
pub trait WalletSink: Send + Sync {
    fn restore_wallet(
        &self,
        request: RestoreWalletRequest,
    ) -> BoxFuture<'_, WalletResult<WalletHandle>>;
}

// =============================================================================
// HTTP backend
// =============================================================================

/// JSON-over-HTTP `ChainBackend`.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(ctx: &NetworkContext) -> WalletResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: ctx.backend_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct AddressesPayload<'a> {
    addresses: &'a [String],
}

#[derive(Deserialize)]
struct UsedAddressesResponse {
    used: Vec<String>,
}

#[derive(Deserialize)]
struct UtxoResponse {
    utxos: Vec<Utxo>,
}

#[derive(Deserialize)]
struct BroadcastResponse {
    tx_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    is_server_ok: bool,
    is_maintenance: Option<bool>,
}

impl ChainBackend for HttpBackend {
    fn check_addresses_in_use(
        &self,
        addresses: Vec<String>,
    ) -> BoxFuture<'_, WalletResult<AddressUsage>> {
        Box::pin(async move {
            let url = format!("{}/v2/addresses/filterUsed", self.base_url);
            let response: UsedAddressesResponse = self
                .client
                .post(&url)
                .json(&AddressesPayload { addresses: &addresses })
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(AddressUsage { used: response.used })
        })
    }

    fn get_utxos_for_addresses(
        &self,
        addresses: Vec<String>,
    ) -> BoxFuture<'_, WalletResult<Vec<Utxo>>> {
        Box::pin(async move {
            let url = format!("{}/txs/utxoForAddresses", self.base_url);
            let response: UtxoResponse = self
                .client
                .post(&url)
                .json(&AddressesPayload { addresses: &addresses })
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(response.utxos)
        })
    }

    fn broadcast_transaction(&self, signed_tx: Vec<u8>) -> BoxFuture<'_, WalletResult<String>> {
        Box::pin(async move {
            let url = format!("{}/txs/signed", self.base_url);
            let payload = serde_json::json!({ "signedTx": hex::encode(&signed_tx) });
            let response: BroadcastResponse = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .map_err(|e| WalletError::broadcast_failed(e.to_string()))?;
            Ok(response.tx_id)
        })
    }

    fn check_server_status(&self) -> BoxFuture<'_, WalletResult<ServerStatus>> {
        Box::pin(async move {
            let url = format!("{}/v2/importerhealthcheck", self.base_url);
            let response: StatusResponse = self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let status = if !response.is_server_ok {
                ServerStatus::Down
            } else if response.is_maintenance.unwrap_or(false) {
                ServerStatus::Degraded
            } else {
                ServerStatus::Healthy
            };
            Ok(status)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_request_debug_redacts_secrets() {
        use crate::types::{RestoreExtra, RestorePurpose};

        let request = RestoreWalletRequest {
            mode: RestoreMode::new(RestorePurpose::Cip1852, RestoreExtra::None, 15).unwrap(),
            recovery_phrase: "abandon ability able".into(),
            wallet_name: "Main".into(),
            wallet_password: "hunter2".into(),
            network_id: 1,
            account_index: 0,
        };
        let dbg = format!("{:?}", request);
        assert!(dbg.contains("Main"));
        assert!(!dbg.contains("abandon"));
        assert!(!dbg.contains("hunter2"));
    }
}
