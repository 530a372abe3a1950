//! Per-era address encoding
//!
//! Byron-era bootstrap addresses (base58 over a CBOR envelope with a
//! CRC32 check), Shelley-era bech32 addresses (header nibble + network
//! id, Blake2b-224 key hashes), and the intermediate era's bech32
//! single/group addresses with a test-discrimination bit.

use bech32::{ToBase32, Variant};
use blake2::digest::consts::U28;
use blake2::{Blake2b, Digest};

use crate::error::{WalletError, WalletResult};
use crate::types::{Era, NetworkContext};

use super::derivation::XPub;

type Blake2b224 = Blake2b<U28>;

// Shelley header types (high nibble); low nibble carries the network id.
const SHELLEY_BASE: u8 = 0b0000_0000;
const SHELLEY_ENTERPRISE: u8 = 0b0110_0000;
const SHELLEY_REWARD: u8 = 0b1110_0000;

// Intermediate-era address kinds.
const KIND_SINGLE: u8 = 0x03;
const KIND_GROUP: u8 = 0x04;
const TEST_DISCRIMINATION: u8 = 0x80;

/// Encode an address for any era.
///
/// `staking` feeds the delegation part where the era supports one
/// (ignored for the legacy era, required for group/base forms when
/// present).
pub fn encode_address(
    era: Era,
    payment: &XPub,
    staking: Option<&XPub>,
    ctx: &NetworkContext,
) -> WalletResult<String> {
    match era {
        Era::Byron => byron_address(payment, ctx),
        Era::Shelley => match staking {
            Some(stake) => shelley_base_address(payment, stake, ctx),
            None => shelley_enterprise_address(payment, ctx),
        },
        Era::Jormungandr => match staking {
            Some(stake) => jormungandr_group_address(payment, stake, ctx),
            None => jormungandr_single_address(payment, ctx),
        },
    }
}

// =============================================================================
// Legacy (Byron) encoding
// =============================================================================

/// Base58 bootstrap address from an extended public key.
///
/// The address root double-hashes (SHA3-256 then Blake2b-224) the CBOR
/// spending data; the outer envelope wraps the payload in CBOR tag 24
/// with a CRC32 check.
pub fn byron_address(key: &XPub, ctx: &NetworkContext) -> WalletResult<String> {
    use sha3::{Digest as Sha3Digest, Sha3_256};

    let attributes = byron_attributes(ctx);

    // Spending data: [ type 0 = public key, xpub bytes ]
    let mut spending = Cbor::new();
    spending.array(3);
    spending.uint(0);
    spending.array(2);
    spending.uint(0);
    spending.bytes(&key.extended_bytes());
    spending.raw(&attributes);

    let sha3 = Sha3_256::digest(spending.as_slice());
    let root = Blake2b224::digest(sha3.as_slice());

    let mut payload = Cbor::new();
    payload.array(3);
    payload.bytes(root.as_slice());
    payload.raw(&attributes);
    payload.uint(0);

    let crc = crc32fast::hash(payload.as_slice());

    let mut envelope = Cbor::new();
    envelope.array(2);
    envelope.tag(24);
    envelope.bytes(payload.as_slice());
    envelope.uint(crc as u64);

    Ok(bs58::encode(envelope.as_slice()).into_string())
}

/// Address attributes: empty on mainnet, protocol magic elsewhere so
/// testnet addresses cannot be replayed against mainnet.
fn byron_attributes(ctx: &NetworkContext) -> Vec<u8> {
    let mut attrs = Cbor::new();
    if ctx.is_mainnet() {
        attrs.map(0);
    } else {
        let mut magic = Cbor::new();
        magic.uint(ctx.protocol_magic as u64);
        attrs.map(1);
        attrs.uint(2);
        attrs.bytes(magic.as_slice());
    }
    attrs.into_vec()
}

// =============================================================================
// Shelley encoding
// =============================================================================

/// Base (delegation) address: payment key hash + staking key hash.
pub fn shelley_base_address(
    payment: &XPub,
    staking: &XPub,
    ctx: &NetworkContext,
) -> WalletResult<String> {
    let mut data = Vec::with_capacity(57);
    data.push(SHELLEY_BASE | ctx.network_id);
    data.extend_from_slice(&key_hash(payment));
    data.extend_from_slice(&key_hash(staking));
    bech32_encode(address_hrp(ctx), &data)
}

/// Enterprise address: payment key only, no delegation part.
pub fn shelley_enterprise_address(payment: &XPub, ctx: &NetworkContext) -> WalletResult<String> {
    let mut data = Vec::with_capacity(29);
    data.push(SHELLEY_ENTERPRISE | ctx.network_id);
    data.extend_from_slice(&key_hash(payment));
    bech32_encode(address_hrp(ctx), &data)
}

/// Reward (stake) address for the staking key.
pub fn shelley_reward_address(staking: &XPub, ctx: &NetworkContext) -> WalletResult<String> {
    let mut data = Vec::with_capacity(29);
    data.push(SHELLEY_REWARD | ctx.network_id);
    data.extend_from_slice(&key_hash(staking));
    let hrp = if ctx.is_mainnet() { "stake" } else { "stake_test" };
    bech32_encode(hrp, &data)
}

fn address_hrp(ctx: &NetworkContext) -> &'static str {
    if ctx.is_mainnet() {
        "addr"
    } else {
        "addr_test"
    }
}

fn key_hash(key: &XPub) -> [u8; 28] {
    let digest = Blake2b224::digest(key.public_key_bytes());
    let mut out = [0u8; 28];
    out.copy_from_slice(&digest);
    out
}

// =============================================================================
// Intermediate (Jormungandr) encoding
// =============================================================================

/// Single-key address: kind byte + spending public key.
pub fn jormungandr_single_address(key: &XPub, ctx: &NetworkContext) -> WalletResult<String> {
    let mut data = Vec::with_capacity(33);
    data.push(discriminated(KIND_SINGLE, ctx));
    data.extend_from_slice(key.public_key_bytes());
    bech32_encode(jormungandr_hrp(ctx), &data)
}

/// Group address: spending key + staking key, delegation-capable.
pub fn jormungandr_group_address(
    spend: &XPub,
    stake: &XPub,
    ctx: &NetworkContext,
) -> WalletResult<String> {
    let mut data = Vec::with_capacity(65);
    data.push(discriminated(KIND_GROUP, ctx));
    data.extend_from_slice(spend.public_key_bytes());
    data.extend_from_slice(stake.public_key_bytes());
    bech32_encode(jormungandr_hrp(ctx), &data)
}

fn discriminated(kind: u8, ctx: &NetworkContext) -> u8 {
    if ctx.is_mainnet() {
        kind
    } else {
        kind | TEST_DISCRIMINATION
    }
}

fn jormungandr_hrp(ctx: &NetworkContext) -> &'static str {
    if ctx.is_mainnet() {
        "addr"
    } else {
        "ta"
    }
}

fn bech32_encode(hrp: &str, data: &[u8]) -> WalletResult<String> {
    bech32::encode(hrp, data.to_base32(), Variant::Bech32)
        .map_err(|e| WalletError::crypto_error(format!("Bech32 encoding failed: {}", e)))
}

// =============================================================================
// Minimal CBOR writer
// =============================================================================

/// Just enough canonical CBOR for the legacy address envelope. The
/// legacy format is the only wire shape this crate owns.
struct Cbor {
    buf: Vec<u8>,
}

impl Cbor {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn header(&mut self, major: u8, value: u64) {
        let m = major << 5;
        if value < 24 {
            self.buf.push(m | value as u8);
        } else if value <= 0xff {
            self.buf.push(m | 24);
            self.buf.push(value as u8);
        } else if value <= 0xffff {
            self.buf.push(m | 25);
            self.buf.extend_from_slice(&(value as u16).to_be_bytes());
        } else if value <= 0xffff_ffff {
            self.buf.push(m | 26);
            self.buf.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buf.push(m | 27);
            self.buf.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn uint(&mut self, value: u64) {
        self.header(0, value);
    }

    fn bytes(&mut self, data: &[u8]) {
        self.header(2, data.len() as u64);
        self.buf.extend_from_slice(data);
    }

    fn array(&mut self, len: u64) {
        self.header(4, len);
    }

    fn map(&mut self, len: u64) {
        self.header(5, len);
    }

    fn tag(&mut self, tag: u64) {
        self.header(6, tag);
    }

    fn raw(&mut self, encoded: &[u8]) {
        self.buf.extend_from_slice(encoded);
    }

    fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}
