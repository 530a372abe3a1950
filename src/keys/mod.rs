//! HD Key Derivation Engine
//!
//! Extended-ed25519 hierarchical deterministic keys: root-key
//! derivation from mnemonic entropy, hardened and soft child
//! derivation, public-only derivation for the non-hardened path
//! suffix, and per-era address encoding.

pub mod address;
pub mod derivation;
pub mod path;

pub use address::encode_address;
pub use derivation::{DerivationError, XPrv, XPub};
pub use path::{account_key, account_key_for_era, legacy_account_key, ChainRole, HARDENED};
