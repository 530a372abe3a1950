//! Unified error types for Laurel Core
//!
//! All errors flow through this module for consistent handling.
//! Severity follows a three-way taxonomy: user-input errors are
//! recoverable (re-prompt the same step), sequencing errors indicate a
//! caller bug (fatal), backend errors are recoverable with retry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all Laurel operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl WalletError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn invalid_mnemonic(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidMnemonic, msg)
    }

    pub fn wrong_password(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::WrongPassword, msg)
    }

    pub fn word_count(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::WordCountMismatch, msg)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn sequencing(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Sequencing, msg)
    }

    pub fn network_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn server_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServerUnavailable, msg)
    }

    pub fn broadcast_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::BroadcastFailed, msg)
    }

    pub fn crypto_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CryptoError, msg)
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::PersistenceFailed, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// Whether the user can recover by correcting input or retrying.
    ///
    /// Sequencing and internal errors are caller bugs and must not be
    /// presented as retryable.
    pub fn is_recoverable(&self) -> bool {
        self.code.is_recoverable()
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for WalletError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // User-input errors (recoverable, re-prompt)
    InvalidMnemonic,
    WrongPassword,
    WordCountMismatch,
    InvalidInput,

    // Sequencing/invariant errors (fatal, caller bug)
    Sequencing,

    // Backend/transient errors (recoverable with retry)
    NetworkError,
    Timeout,
    ServerUnavailable,
    BroadcastFailed,
    PersistenceFailed,

    // Crypto errors
    CryptoError,

    // Parse errors
    JsonError,
    HexError,

    // Internal
    Internal,
}

impl ErrorCode {
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ErrorCode::Sequencing | ErrorCode::Internal | ErrorCode::CryptoError
        )
    }
}

/// Result type alias for Laurel operations
pub type WalletResult<T> = Result<T, WalletError>;

// Conversions from common error types

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for WalletError {
    fn from(e: hex::FromHexError) -> Self {
        WalletError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            WalletError::new(ErrorCode::Timeout, "Request timed out")
        } else if e.is_connect() {
            WalletError::new(ErrorCode::NetworkError, "Connection failed")
        } else {
            WalletError::new(ErrorCode::NetworkError, e.to_string())
        }
    }
}

impl From<bip39::Error> for WalletError {
    fn from(e: bip39::Error) -> Self {
        WalletError::new(ErrorCode::InvalidMnemonic, format!("BIP39 error: {}", e))
    }
}

impl From<bech32::Error> for WalletError {
    fn from(e: bech32::Error) -> Self {
        WalletError::new(ErrorCode::CryptoError, format!("Bech32 error: {}", e))
    }
}

impl From<crate::keys::DerivationError> for WalletError {
    fn from(e: crate::keys::DerivationError) -> Self {
        WalletError::new(ErrorCode::CryptoError, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = WalletError::wrong_password("Paper password did not match")
            .with_details("checksum suffix mismatch");

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("wrong_password"));
        assert!(json.contains("Paper password did not match"));
    }

    #[test]
    fn test_severity_taxonomy() {
        assert!(WalletError::invalid_mnemonic("bad checksum").is_recoverable());
        assert!(WalletError::network_error("down").is_recoverable());
        assert!(!WalletError::sequencing("mode unset").is_recoverable());
        assert!(!WalletError::internal("oops").is_recoverable());
    }
}
