//! Laurel Core Library
//!
//! Restoration engine for the Laurel multi-era wallet.
//!
//! # Architecture
//!
//! This crate provides:
//! - **mnemonic**: recovery-phrase validation and paper-wallet scrambling
//! - **keys**: hierarchical deterministic key derivation and per-era
//!   address encoding
//! - **plate**: verification addresses and checksum plates
//! - **restore**: the restore-flow state machine, its fund-transfer
//!   sub-flow, and the backend/sink collaborator traits
//!
//! The mnemonic, keys, and plate modules are synchronous pure
//! computations with no shared state; the restore module performs async
//! I/O against the chain backend and the storage sink, both consumed
//! through traits.
//!
//! # Security
//!
//! Entropy, seeds, and extended private keys are wrapped in `zeroize`
//! guards and cleared on drop. Private key material never appears in
//! `Debug` output or logs.
//!
//! # Example
//!
//! ```rust,ignore
//! use laurel_core::types::{NetworkContext, RestoreExtra, RestoreMode, RestorePurpose};
//! use laurel_core::restore::RestoreFlow;
//!
//! let ctx = NetworkContext::mainnet("https://backend.example");
//! let mut flow = RestoreFlow::new(ctx, backend, sink);
//! flow.set_mode(RestoreMode::new(RestorePurpose::Cip1852, RestoreExtra::None, 15).unwrap());
//! flow.submit_fields(meta)?;
//! for plate in flow.plates() {
//!     println!("{}: {}", plate.checksum.text_part, plate.addresses[0]);
//! }
//! ```

pub mod error;
pub mod keys;
pub mod mnemonic;
pub mod plate;
pub mod restore;
pub mod types;

// Re-export key types for convenience
pub use error::{ErrorCode, WalletError, WalletResult};
pub use keys::{DerivationError, XPrv, XPub};
pub use restore::{
    ChainBackend, HttpBackend, RestoreFlow, RestoreStep, TransferOutcome, VerifyOutcome,
    WalletSink,
};
pub use types::*;

// Re-export the codec and plate entry points
pub use mnemonic::{scramble, unscramble};
pub use plate::{compute_checksum, generate_plate, generate_plates};
