//! Extended-ed25519 child key derivation
//!
//! Keys are 64-byte extended secrets (kL ‖ kR) plus a 32-byte chain
//! code. Child derivation mixes the parent chain code and key material
//! through HMAC-SHA512 and adds 8·trunc28(ZL) into the scalar half;
//! soft (non-hardened) derivation has a public-only counterpart that
//! adds the matching point, so
//! `to_public(derive(prv, i)) == derive(to_public(prv), i)` for every
//! soft index.
//!
//! Derivation is deterministic and total: one child per (parent, index).

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

use super::path::HARDENED;

type HmacSha512 = Hmac<Sha512>;

const ROOT_KDF_ROUNDS: u32 = 4096;

/// Derivation failures. Only public-key derivation can fail; private
/// derivation is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DerivationError {
    #[error("hardened derivation requires a private key")]
    HardenedFromPublic,
    #[error("invalid public key bytes")]
    InvalidPublicKey,
}

/// Extended private key: 64-byte secret (kL ‖ kR) + chain code.
///
/// Value type; derivation borrows the parent and returns an owned
/// child. The secret half is wiped on drop and never printed.
#[derive(Clone)]
pub struct XPrv {
    key: [u8; 64],
    chain_code: [u8; 32],
}

impl Drop for XPrv {
    fn drop(&mut self) {
        self.key.zeroize();
        self.chain_code.zeroize();
    }
}

impl std::fmt::Debug for XPrv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XPrv").field("key", &"<redacted>").finish()
    }
}

/// Extended public key: compressed point + chain code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPub {
    point: [u8; 32],
    chain_code: [u8; 32],
}

impl XPrv {
    /// Root key from mnemonic entropy: PBKDF2-HMAC-SHA512 with the
    /// entropy as salt, then scalar clamping on the kL half.
    pub fn from_entropy(entropy: &[u8]) -> Self {
        let mut okm = Zeroizing::new([0u8; 96]);
        pbkdf2_hmac::<Sha512>(b"", entropy, ROOT_KDF_ROUNDS, okm.as_mut());

        let mut key = [0u8; 64];
        key.copy_from_slice(&okm[..64]);
        // Clamp: clear the low cofactor bits and the top bit, set bit 254.
        key[0] &= 0b1111_1000;
        key[31] &= 0b0001_1111;
        key[31] |= 0b0100_0000;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&okm[64..]);

        Self { key, chain_code }
    }

    /// Reconstruct from raw parts (e.g. a stored account key).
    pub fn from_parts(key: [u8; 64], chain_code: [u8; 32]) -> Self {
        Self { key, chain_code }
    }

    /// Single-step derivation. Works for hardened and soft indices.
    pub fn derive(&self, index: u32) -> XPrv {
        let hardened = index >= HARDENED;

        let (z, cc) = if hardened {
            (
                self.mac(0x00, &self.key, index),
                self.mac(0x01, &self.key, index),
            )
        } else {
            let public = self.public_point_bytes();
            (
                self.mac(0x02, &public, index),
                self.mac(0x03, &public, index),
            )
        };

        let mut key = [0u8; 64];
        key[..32].copy_from_slice(&add_28_mul8(
            self.key[..32].try_into().expect("kL is 32 bytes"),
            z[..28].try_into().expect("ZL truncates to 28 bytes"),
        ));
        key[32..].copy_from_slice(&add_256(
            self.key[32..].try_into().expect("kR is 32 bytes"),
            z[32..].try_into().expect("ZR is 32 bytes"),
        ));

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&cc[32..]);

        XPrv { key, chain_code }
    }

    /// One-way projection to the extended public key.
    pub fn to_public(&self) -> XPub {
        XPub {
            point: self.public_point_bytes(),
            chain_code: self.chain_code,
        }
    }

    /// The 64-byte extended secret, for the signing boundary only.
    pub fn extended_secret(&self) -> &[u8; 64] {
        &self.key
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    fn public_point_bytes(&self) -> [u8; 32] {
        let kl: [u8; 32] = self.key[..32].try_into().expect("kL is 32 bytes");
        let scalar = Scalar::from_bytes_mod_order(kl);
        EdwardsPoint::mul_base(&scalar).compress().to_bytes()
    }

    fn mac(&self, tag: u8, data: &[u8], index: u32) -> [u8; 64] {
        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .expect("HMAC accepts any key length");
        mac.update(&[tag]);
        mac.update(data);
        mac.update(&index.to_le_bytes());
        let digest = mac.finalize().into_bytes();
        let mut out = [0u8; 64];
        out.copy_from_slice(&digest);
        out
    }
}

impl XPub {
    /// Validate and adopt raw bytes (point must be a canonical
    /// curve point).
    pub fn from_parts(point: [u8; 32], chain_code: [u8; 32]) -> Result<Self, DerivationError> {
        CompressedEdwardsY(point)
            .decompress()
            .ok_or(DerivationError::InvalidPublicKey)?;
        Ok(Self { point, chain_code })
    }

    /// Soft-index derivation on the public key alone. Hardened indices
    /// are rejected: they require the private key by construction.
    pub fn derive(&self, index: u32) -> Result<XPub, DerivationError> {
        if index >= HARDENED {
            return Err(DerivationError::HardenedFromPublic);
        }

        let z = self.mac(0x02, index);
        let cc = self.mac(0x03, index);

        let zl8 = add_28_mul8(
            [0u8; 32],
            z[..28].try_into().expect("ZL truncates to 28 bytes"),
        );
        let delta = EdwardsPoint::mul_base(&Scalar::from_bytes_mod_order(zl8));
        let parent = CompressedEdwardsY(self.point)
            .decompress()
            .ok_or(DerivationError::InvalidPublicKey)?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&cc[32..]);

        Ok(XPub {
            point: (parent + delta).compress().to_bytes(),
            chain_code,
        })
    }

    /// Raw 32-byte public key (no chain code).
    pub fn public_key_bytes(&self) -> &[u8; 32] {
        &self.point
    }

    /// Public key followed by chain code, the legacy spending-data form.
    pub fn extended_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.point);
        out[32..].copy_from_slice(&self.chain_code);
        out
    }

    fn mac(&self, tag: u8, index: u32) -> [u8; 64] {
        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .expect("HMAC accepts any key length");
        mac.update(&[tag]);
        mac.update(&self.point);
        mac.update(&index.to_le_bytes());
        let digest = mac.finalize().into_bytes();
        let mut out = [0u8; 64];
        out.copy_from_slice(&digest);
        out
    }
}

/// out = kl + 8·zl, little-endian over 32 bytes. The truncated zl keeps
/// the sum below 2^256, so no reduction is involved.
fn add_28_mul8(kl: [u8; 32], zl: [u8; 28]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry: u16 = 0;
    for i in 0..28 {
        let r = kl[i] as u16 + ((zl[i] as u16) << 3) + carry;
        out[i] = r as u8;
        carry = r >> 8;
    }
    for i in 28..32 {
        let r = kl[i] as u16 + carry;
        out[i] = r as u8;
        carry = r >> 8;
    }
    out
}

/// out = kr + zr mod 2^256, little-endian.
fn add_256(kr: [u8; 32], zr: [u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry: u16 = 0;
    for i in 0..32 {
        let r = kr[i] as u16 + zr[i] as u16 + carry;
        out[i] = r as u8;
        carry = r >> 8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::path::{harden, HARDENED};

    fn root() -> XPrv {
        XPrv::from_entropy(&[0u8; 20])
    }

    #[test]
    fn test_root_key_is_deterministic_and_clamped() {
        let a = XPrv::from_entropy(&[7u8; 20]);
        let b = XPrv::from_entropy(&[7u8; 20]);
        assert_eq!(a.extended_secret(), b.extended_secret());
        assert_ne!(a.extended_secret(), root().extended_secret());

        let kl = &a.extended_secret()[..32];
        assert_eq!(kl[0] & 0b0000_0111, 0);
        assert_eq!(kl[31] & 0b1000_0000, 0);
        assert_eq!(kl[31] & 0b0100_0000, 0b0100_0000);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let r = root();
        let a = r.derive(harden(0)).derive(0).derive(5);
        let b = r.derive(harden(0)).derive(0).derive(5);
        assert_eq!(a.extended_secret(), b.extended_secret());
        assert_eq!(a.to_public(), b.to_public());
    }

    #[test]
    fn test_distinct_indices_give_distinct_children() {
        let r = root();
        assert_ne!(
            r.derive(0).to_public(),
            r.derive(1).to_public()
        );
        assert_ne!(
            r.derive(harden(0)).to_public(),
            r.derive(harden(1)).to_public()
        );
        // Hardened and soft siblings at the same raw index differ too.
        assert_ne!(r.derive(0).to_public(), r.derive(harden(0)).to_public());
    }

    #[test]
    fn test_soft_derivation_public_private_consistency() {
        let parent = root().derive(harden(1852)).derive(harden(1815)).derive(harden(0));
        let parent_pub = parent.to_public();
        for index in [0u32, 1, 2, 31, 1000] {
            let via_private = parent.derive(index).to_public();
            let via_public = parent_pub.derive(index).unwrap();
            assert_eq!(via_private, via_public);
        }
    }

    #[test]
    fn test_hardened_derivation_guard() {
        let xpub = root().to_public();
        for index in [HARDENED, harden(1), harden(44), u32::MAX] {
            assert_eq!(xpub.derive(index), Err(DerivationError::HardenedFromPublic));
        }
        for index in [0u32, 1, HARDENED - 1] {
            assert!(xpub.derive(index).is_ok());
        }
    }

    #[test]
    fn test_xpub_from_parts_roundtrips_valid_points() {
        let good = root().to_public();
        let rebuilt = XPub::from_parts(*good.public_key_bytes(), [0u8; 32]).unwrap();
        assert_eq!(rebuilt.public_key_bytes(), good.public_key_bytes());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let dbg = format!("{:?}", root());
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("0x"));
    }
}
