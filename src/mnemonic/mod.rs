//! Mnemonic Codec
//!
//! Validates recovery phrases against the BIP39 wordlist and checksum,
//! generates fresh phrases, and hosts the paper-wallet scrambling
//! transform. Everything here is a synchronous pure computation; callers
//! decide error severity.

pub mod paper;

pub use paper::{scramble, unscramble};

use bip39::{Language, Mnemonic};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};

/// Lowercase, trim, and collapse inner whitespace.
///
/// Must run before any validation; users paste phrases with stray
/// newlines and double spaces.
pub fn normalize(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Check a standard recovery phrase: wordlist membership, word count,
/// and the BIP39 checksum.
pub fn validate(phrase: &str, expected_words: usize) -> bool {
    let normalized = normalize(phrase);
    if normalized.split(' ').count() != expected_words {
        return false;
    }
    Mnemonic::parse_in_normalized(Language::English, &normalized).is_ok()
}

/// Structural check for a scrambled paper phrase: membership and length
/// only. Checksum validity of the decoded phrase requires the paper
/// password, so it cannot be checked here.
pub fn validate_paper(phrase: &str, expected_words: usize) -> bool {
    let normalized = normalize(phrase);
    let words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();
    if words.len() != expected_words {
        return false;
    }
    words.iter().all(|w| in_wordlist(w))
}

/// Generate a fresh phrase of the given length from OS entropy.
pub fn generate(word_count: usize) -> WalletResult<String> {
    let entropy_len = match word_count {
        12 => 16,
        15 => 20,
        21 => 28,
        24 => 32,
        n => {
            return Err(WalletError::word_count(format!(
                "Unsupported mnemonic length: {} words",
                n
            )))
        }
    };

    let mut entropy = Zeroizing::new(vec![0u8; entropy_len]);
    OsRng.fill_bytes(entropy.as_mut());

    let mnemonic = Mnemonic::from_entropy(entropy.as_ref())
        .map_err(|e| WalletError::crypto_error(format!("Failed to encode mnemonic: {}", e)))?;
    Ok(mnemonic.to_string())
}

/// Decode a validated phrase into its raw entropy bytes.
pub fn entropy(phrase: &str) -> WalletResult<Zeroizing<Vec<u8>>> {
    let normalized = normalize(phrase);
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|e| WalletError::invalid_mnemonic(format!("Invalid mnemonic: {}", e)))?;
    Ok(Zeroizing::new(mnemonic.to_entropy()))
}

fn in_wordlist(word: &str) -> bool {
    Language::English
        .words_by_prefix(word)
        .iter()
        .any(|w| *w == word)
}
