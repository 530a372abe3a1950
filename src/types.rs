//! Shared types for Laurel Core
//!
//! All data structures that cross module boundaries are defined here
//! for consistent serialization.

use serde::{Deserialize, Serialize};

// =============================================================================
// Network Context
// =============================================================================

/// Explicit per-call network configuration.
///
/// Passed into every derivation/restore call; the crate holds no ambient
/// network state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkContext {
    /// Network id carried in Shelley-era address headers (low nibble).
    pub network_id: u8,
    /// Protocol magic stamped into legacy address attributes off-mainnet.
    pub protocol_magic: u32,
    /// Whether the intermediate era is available on this network.
    pub supports_jormungandr: bool,
    /// Base URL of the chain backend for usage checks and broadcast.
    pub backend_url: String,
}

impl NetworkContext {
    pub const MAINNET_NETWORK_ID: u8 = 1;
    pub const MAINNET_PROTOCOL_MAGIC: u32 = 764824073;
    pub const TESTNET_NETWORK_ID: u8 = 0;
    pub const TESTNET_PROTOCOL_MAGIC: u32 = 1097911063;

    pub fn mainnet(backend_url: impl Into<String>) -> Self {
        Self {
            network_id: Self::MAINNET_NETWORK_ID,
            protocol_magic: Self::MAINNET_PROTOCOL_MAGIC,
            supports_jormungandr: false,
            backend_url: backend_url.into(),
        }
    }

    pub fn testnet(backend_url: impl Into<String>) -> Self {
        Self {
            network_id: Self::TESTNET_NETWORK_ID,
            protocol_magic: Self::TESTNET_PROTOCOL_MAGIC,
            supports_jormungandr: true,
            backend_url: backend_url.into(),
        }
    }

    pub fn is_mainnet(&self) -> bool {
        self.network_id == Self::MAINNET_NETWORK_ID
    }
}

// =============================================================================
// Eras
// =============================================================================

/// Protocol generations with distinct address formats and derivation
/// purpose constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Era {
    /// Legacy era: base58 bootstrap addresses, 2-level account/chain paths.
    Byron,
    /// Intermediate era: bech32 single/group addresses with a network
    /// discrimination bit.
    Jormungandr,
    /// Current era: bech32 base/enterprise addresses with a network id
    /// header nibble.
    Shelley,
}

impl Era {
    /// Derivation purpose constant for the multi-level path scheme.
    pub fn purpose(&self) -> u32 {
        match self {
            Era::Byron => crate::keys::path::purposes::BIP44,
            Era::Jormungandr | Era::Shelley => crate::keys::path::purposes::CIP1852,
        }
    }

    /// Whether account keys come from the legacy 2-level scheme rather
    /// than the purpose/coin-type/account scheme.
    pub fn uses_legacy_paths(&self) -> bool {
        matches!(self, Era::Byron)
    }
}

// =============================================================================
// Restore Modes
// =============================================================================

/// Derivation purpose family selected by the restore mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorePurpose {
    Bip44,
    Cip1852,
}

/// Extra input the restore mode expects beyond a standard phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreExtra {
    None,
    Paper,
    PrivateKey,
}

/// A fully specified restore mode.
///
/// `word_count` must be one of `supported_word_counts(purpose, extra)`;
/// `RestoreMode::new` enforces this so literal counts never leak into
/// callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreMode {
    pub purpose: RestorePurpose,
    pub extra: RestoreExtra,
    pub word_count: usize,
}

/// Single source of truth for accepted phrase lengths per mode family.
pub fn supported_word_counts(purpose: RestorePurpose, extra: RestoreExtra) -> &'static [usize] {
    match (purpose, extra) {
        (RestorePurpose::Bip44, RestoreExtra::None) => &[12, 15, 24],
        (RestorePurpose::Bip44, RestoreExtra::Paper) => &[21],
        (RestorePurpose::Cip1852, RestoreExtra::None) => &[15, 24],
        // Paper certificates are a legacy-era feature.
        (RestorePurpose::Cip1852, RestoreExtra::Paper) => &[],
        (_, RestoreExtra::PrivateKey) => &[0],
    }
}

impl RestoreMode {
    pub fn new(
        purpose: RestorePurpose,
        extra: RestoreExtra,
        word_count: usize,
    ) -> Option<Self> {
        if supported_word_counts(purpose, extra).contains(&word_count) {
            Some(Self { purpose, extra, word_count })
        } else {
            None
        }
    }

    pub fn is_paper(&self) -> bool {
        self.extra == RestoreExtra::Paper
    }

    /// Word count of the phrase after paper unscrambling (identity for
    /// non-paper modes).
    pub fn decoded_word_count(&self) -> usize {
        if self.is_paper() {
            crate::mnemonic::paper::UNSCRAMBLED_WORDS
        } else {
            self.word_count
        }
    }

    /// Eras this mode can produce plates and keys for.
    pub fn eras(&self, ctx: &NetworkContext) -> Vec<Era> {
        let mut eras = Vec::new();
        match (self.purpose, self.extra) {
            (_, RestoreExtra::Paper) => eras.push(Era::Byron),
            (RestorePurpose::Bip44, _) => {
                eras.push(Era::Byron);
                // A standard-length phrase is equally valid under the
                // current purpose; surface both for user confirmation.
                eras.push(Era::Shelley);
            }
            (RestorePurpose::Cip1852, _) => eras.push(Era::Shelley),
        }
        if ctx.supports_jormungandr && self.purpose == RestorePurpose::Cip1852 {
            eras.push(Era::Jormungandr);
        }
        eras
    }
}

// =============================================================================
// Plates
// =============================================================================

/// Short human-checkable wallet fingerprint plus identicon seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletChecksum {
    /// Display form, e.g. "NDPE-1058".
    pub text_part: String,
    /// Drives a deterministic avatar on the host side.
    pub image_seed: [u8; 32],
}

/// Verification addresses and checksum for one era.
///
/// Display-only: never persisted as wallet identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletPlate {
    pub era: Era,
    pub addresses: Vec<String>,
    pub checksum: WalletChecksum,
}

// =============================================================================
// Restore Session Inputs
// =============================================================================

/// What the UI collects before a restore can begin.
#[derive(Clone, Serialize, Deserialize)]
pub struct WalletRestoreMeta {
    pub recovery_phrase: String,
    pub wallet_name: String,
    pub wallet_password: String,
    /// Present only for paper modes. Empty strings are accepted.
    pub paper_password: Option<String>,
}

impl std::fmt::Debug for WalletRestoreMeta {
    // Recovery phrases and passwords must never reach logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletRestoreMeta")
            .field("wallet_name", &self.wallet_name)
            .field("recovery_phrase", &"<redacted>")
            .field("wallet_password", &"<redacted>")
            .field("paper_password", &self.paper_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// =============================================================================
// Backend Types
// =============================================================================

/// Usage flags for a batch of addresses, index-aligned with the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressUsage {
    pub used: Vec<String>,
}

/// UTXO at a legacy address, as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_hash: String,
    pub tx_index: u32,
    pub receiver: String,
    pub amount: u64,
}

/// Backend health probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Healthy,
    Degraded,
    Down,
}

/// Handle to a persisted wallet, as returned by the storage sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletHandle {
    pub wallet_id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_table() {
        assert!(RestoreMode::new(RestorePurpose::Bip44, RestoreExtra::None, 15).is_some());
        assert!(RestoreMode::new(RestorePurpose::Bip44, RestoreExtra::Paper, 21).is_some());
        assert!(RestoreMode::new(RestorePurpose::Cip1852, RestoreExtra::None, 24).is_some());

        // Unsupported combinations
        assert!(RestoreMode::new(RestorePurpose::Bip44, RestoreExtra::Paper, 15).is_none());
        assert!(RestoreMode::new(RestorePurpose::Cip1852, RestoreExtra::Paper, 21).is_none());
        assert!(RestoreMode::new(RestorePurpose::Cip1852, RestoreExtra::None, 12).is_none());
    }

    #[test]
    fn test_paper_mode_eras() {
        let ctx = NetworkContext::mainnet("http://localhost");
        let paper = RestoreMode::new(RestorePurpose::Bip44, RestoreExtra::Paper, 21).unwrap();
        assert_eq!(paper.eras(&ctx), vec![Era::Byron]);
        assert_eq!(paper.decoded_word_count(), 15);
    }

    #[test]
    fn test_jormungandr_gated_by_network() {
        let mode = RestoreMode::new(RestorePurpose::Cip1852, RestoreExtra::None, 15).unwrap();
        let mainnet = NetworkContext::mainnet("http://localhost");
        let testnet = NetworkContext::testnet("http://localhost");
        assert!(!mode.eras(&mainnet).contains(&Era::Jormungandr));
        assert!(mode.eras(&testnet).contains(&Era::Jormungandr));
    }

    #[test]
    fn test_meta_debug_redacts_secrets() {
        let meta = WalletRestoreMeta {
            recovery_phrase: "abandon ability".into(),
            wallet_name: "My Wallet".into(),
            wallet_password: "hunter2".into(),
            paper_password: Some("paper".into()),
        };
        let dbg = format!("{:?}", meta);
        assert!(dbg.contains("My Wallet"));
        assert!(!dbg.contains("abandon"));
        assert!(!dbg.contains("hunter2"));
        assert!(!dbg.contains("paper\""));
    }
}
