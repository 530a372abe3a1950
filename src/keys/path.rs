//! Derivation path constants and account-key composition
//!
//! The numeric constants here are shared configuration with the signing
//! and transaction layers; they are the only place purpose/coin-type
//! values appear.

use serde::{Deserialize, Serialize};

use crate::types::Era;

use super::derivation::XPrv;

/// Standard derivation purposes
pub mod purposes {
    /// Legacy-era multi-level scheme
    pub const BIP44: u32 = 44;
    /// Current-era multi-level scheme
    pub const CIP1852: u32 = 1852;
}

/// Coin types from SLIP-0044
pub mod coin_types {
    pub const CARDANO: u32 = 1815;
}

/// Hardened offset for derivation indices
pub const HARDENED: u32 = 0x8000_0000;

/// Index of the staking key on the staking chain.
pub const STAKING_KEY_INDEX: u32 = 0;

pub fn harden(index: u32) -> u32 {
    index | HARDENED
}

/// Role of the fourth path level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainRole {
    /// Receiving addresses
    External,
    /// Change addresses
    Internal,
    /// Staking keys
    Staking,
}

impl ChainRole {
    pub fn index(&self) -> u32 {
        match self {
            ChainRole::External => 0,
            ChainRole::Internal => 1,
            ChainRole::Staking => 2,
        }
    }
}

/// Account key via the multi-level scheme: three hardened steps
/// (purpose, coin type, account).
pub fn account_key(root: &XPrv, purpose: u32, coin_type: u32, account: u32) -> XPrv {
    root.derive(harden(purpose))
        .derive(harden(coin_type))
        .derive(harden(account))
}

/// Account key via the legacy 2-level scheme: a single hardened account
/// step directly under the root.
pub fn legacy_account_key(root: &XPrv, account: u32) -> XPrv {
    root.derive(harden(account))
}

/// Era dispatch for account-key derivation.
pub fn account_key_for_era(root: &XPrv, era: Era, account: u32) -> XPrv {
    if era.uses_legacy_paths() {
        legacy_account_key(root, account)
    } else {
        account_key(root, era.purpose(), coin_types::CARDANO, account)
    }
}
