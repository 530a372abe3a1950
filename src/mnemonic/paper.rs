//! Paper-wallet mnemonic scrambling
//!
//! A paper certificate carries a 21-word phrase that decodes, given the
//! paper password, into the user's standard 15-word phrase. The
//! transform XORs the phrase entropy with a password-derived keystream
//! and appends an 8-byte password-keyed check suffix, so a wrong
//! password is detected before any key derivation happens.
//!
//! Layout of the scrambled entropy (28 bytes, 21 words):
//!
//! ```text
//! [ entropy XOR keystream : 20 ][ check : 8 ]
//! ```
//!
//! The transform is deterministic; the same phrase and password always
//! produce the same certificate.

use bip39::{Language, Mnemonic};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};

/// Word count of the phrase a certificate decodes to.
pub const UNSCRAMBLED_WORDS: usize = 15;
/// Word count of the scrambled certificate phrase.
pub const SCRAMBLED_WORDS: usize = 21;

const ENTROPY_LEN: usize = 20;
const CHECK_LEN: usize = 8;
const KDF_ROUNDS: u32 = 10_000;
const KDF_SALT: &[u8] = b"laurel paper wallet v1";

type HmacSha512 = Hmac<Sha512>;

/// Password-derived material: 20-byte keystream plus 32-byte check key.
fn derive_key_material(password: &str) -> Zeroizing<[u8; ENTROPY_LEN + 32]> {
    let mut okm = Zeroizing::new([0u8; ENTROPY_LEN + 32]);
    pbkdf2_hmac::<Sha512>(password.as_bytes(), KDF_SALT, KDF_ROUNDS, okm.as_mut());
    okm
}

fn check_suffix(check_key: &[u8], payload: &[u8]) -> [u8; CHECK_LEN] {
    let mut mac = HmacSha512::new_from_slice(check_key)
        .expect("HMAC accepts any key length");
    mac.update(payload);
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; CHECK_LEN];
    out.copy_from_slice(&digest[..CHECK_LEN]);
    out
}

/// Scramble a standard 15-word phrase into a 21-word paper certificate.
///
/// Empty passwords are accepted; enforcing a minimum length is a host
/// policy, not an engine invariant.
pub fn scramble(standard_phrase: &str, password: &str) -> WalletResult<String> {
    let normalized = super::normalize(standard_phrase);
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|e| WalletError::invalid_mnemonic(format!("Invalid mnemonic: {}", e)))?;
    if mnemonic.word_count() != UNSCRAMBLED_WORDS {
        return Err(WalletError::word_count(format!(
            "Paper certificates encode {}-word phrases, got {}",
            UNSCRAMBLED_WORDS,
            mnemonic.word_count()
        )));
    }

    let entropy = Zeroizing::new(mnemonic.to_entropy());
    let material = derive_key_material(password);
    let (keystream, check_key) = material.split_at(ENTROPY_LEN);

    let mut scrambled = Zeroizing::new([0u8; ENTROPY_LEN + CHECK_LEN]);
    for (i, byte) in entropy.iter().enumerate() {
        scrambled[i] = byte ^ keystream[i];
    }
    let check = check_suffix(check_key, &scrambled[..ENTROPY_LEN]);
    scrambled[ENTROPY_LEN..].copy_from_slice(&check);

    let paper = Mnemonic::from_entropy(scrambled.as_ref())
        .map_err(|e| WalletError::crypto_error(format!("Failed to encode certificate: {}", e)))?;
    Ok(paper.to_string())
}

/// Recover the standard phrase from a paper certificate.
///
/// Returns `Ok(None)` when the check suffix does not validate against
/// the supplied password, i.e. a wrong password or a corrupted certificate.
/// That outcome is recoverable and user-facing, not a fatal error.
pub fn unscramble(
    scrambled_phrase: &str,
    expected_words: usize,
    password: &str,
) -> WalletResult<Option<String>> {
    if expected_words != SCRAMBLED_WORDS {
        return Err(WalletError::word_count(format!(
            "Paper certificates are {} words, got {}",
            SCRAMBLED_WORDS, expected_words
        )));
    }

    let normalized = super::normalize(scrambled_phrase);
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|e| WalletError::invalid_mnemonic(format!("Invalid certificate: {}", e)))?;
    if mnemonic.word_count() != SCRAMBLED_WORDS {
        return Err(WalletError::word_count(format!(
            "Paper certificates are {} words, got {}",
            SCRAMBLED_WORDS,
            mnemonic.word_count()
        )));
    }

    let scrambled = Zeroizing::new(mnemonic.to_entropy());
    let (payload, check) = scrambled.split_at(ENTROPY_LEN);

    let material = derive_key_material(password);
    let (keystream, check_key) = material.split_at(ENTROPY_LEN);

    if check_suffix(check_key, payload) != check {
        return Ok(None);
    }

    let mut entropy = Zeroizing::new([0u8; ENTROPY_LEN]);
    for (i, byte) in payload.iter().enumerate() {
        entropy[i] = byte ^ keystream[i];
    }

    let standard = Mnemonic::from_entropy(entropy.as_ref())
        .map_err(|e| WalletError::crypto_error(format!("Failed to decode phrase: {}", e)))?;
    Ok(Some(standard.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon \
                          abandon abandon abandon abandon abandon abandon address";

    #[test]
    fn test_scramble_roundtrip() {
        let paper = scramble(PHRASE, "correct horse").unwrap();
        assert_eq!(paper.split(' ').count(), SCRAMBLED_WORDS);

        let recovered = unscramble(&paper, SCRAMBLED_WORDS, "correct horse").unwrap();
        assert_eq!(recovered.as_deref(), Some(PHRASE));
    }

    #[test]
    fn test_wrong_password_returns_none() {
        let paper = scramble(PHRASE, "correct horse").unwrap();
        let recovered = unscramble(&paper, SCRAMBLED_WORDS, "battery staple").unwrap();
        assert_eq!(recovered, None);
    }

    #[test]
    fn test_empty_password_accepted() {
        let paper = scramble(PHRASE, "").unwrap();
        assert_eq!(unscramble(&paper, SCRAMBLED_WORDS, "").unwrap().as_deref(), Some(PHRASE));
        assert_eq!(unscramble(&paper, SCRAMBLED_WORDS, "x").unwrap(), None);
    }

    #[test]
    fn test_scramble_is_deterministic() {
        let a = scramble(PHRASE, "pw").unwrap();
        let b = scramble(PHRASE, "pw").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_scramble_rejects_wrong_length_input() {
        let twelve = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        assert!(scramble(twelve, "pw").is_err());
    }

    #[test]
    fn test_unscramble_rejects_malformed_certificate() {
        assert!(unscramble("not a mnemonic at all", SCRAMBLED_WORDS, "pw").is_err());
        let paper = scramble(PHRASE, "pw").unwrap();
        assert!(unscramble(&paper, 15, "pw").is_err());
    }
}
