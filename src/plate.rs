//! Address/Plate Generator
//!
//! Derives a batch of verification addresses from an account key and
//! computes the checksum "plate" users compare across restorations.
//! Everything is deterministic: the same account key always reproduces
//! the same plate.

use blake2::digest::consts::U64;
use blake2::{Blake2b, Digest};

use crate::error::WalletResult;
use crate::keys::path::{ChainRole, STAKING_KEY_INDEX};
use crate::keys::{account_key_for_era, encode_address, XPrv, XPub};
use crate::types::{Era, NetworkContext, RestoreMode, WalletChecksum, WalletPlate};

type Blake2b512 = Blake2b<U64>;

/// Addresses shown on a verification plate.
pub const PLATE_ADDRESS_COUNT: usize = 5;

/// Derive `count` sequential soft addresses along the given chain.
///
/// Restartable: indices run 0..count, so the same inputs always yield
/// the same sequence.
pub fn generate_verification_addresses(
    account: &XPub,
    era: Era,
    chain: ChainRole,
    count: usize,
    ctx: &NetworkContext,
) -> WalletResult<Vec<String>> {
    let chain_key = account.derive(chain.index())?;
    let staking = staking_key(account, era)?;

    let mut addresses = Vec::with_capacity(count);
    for index in 0..count as u32 {
        let key = chain_key.derive(index)?;
        addresses.push(encode_address(era, &key, staking.as_ref(), ctx)?);
    }
    Ok(addresses)
}

/// The delegation half of an address, where the era has one.
fn staking_key(account: &XPub, era: Era) -> WalletResult<Option<XPub>> {
    if era.uses_legacy_paths() {
        return Ok(None);
    }
    let key = account
        .derive(ChainRole::Staking.index())?
        .derive(STAKING_KEY_INDEX)?;
    Ok(Some(key))
}

/// Deterministic fingerprint of an account public key.
///
/// `text_part` is the short human-checkable form ("NDPE-1058");
/// `image_seed` drives the host's identicon. Distinct keys produce
/// distinct text parts with overwhelming probability.
pub fn compute_checksum(account_public_key: &[u8]) -> WalletChecksum {
    let digest = Blake2b512::digest(account_public_key);

    let mut letters = String::with_capacity(4);
    for byte in &digest[..4] {
        letters.push((b'A' + byte % 26) as char);
    }
    let number = u32::from_be_bytes([digest[4], digest[5], digest[6], digest[7]]) % 10_000;

    let mut image_seed = [0u8; 32];
    image_seed.copy_from_slice(&digest[8..40]);

    WalletChecksum {
        text_part: format!("{}-{:04}", letters, number),
        image_seed,
    }
}

/// Plate for one era: account derivation + verification addresses +
/// checksum over the account public key.
pub fn generate_plate(
    root: &XPrv,
    account_index: u32,
    era: Era,
    ctx: &NetworkContext,
) -> WalletResult<WalletPlate> {
    let account = account_key_for_era(root, era, account_index).to_public();
    let addresses = generate_verification_addresses(
        &account,
        era,
        ChainRole::External,
        PLATE_ADDRESS_COUNT,
        ctx,
    )?;
    Ok(WalletPlate {
        era,
        addresses,
        checksum: compute_checksum(&account.extended_bytes()),
    })
}

/// Plate for one era under a restore mode; `None` when the mode does
/// not apply to that era (not an error).
pub fn plate_for_era(
    root: &XPrv,
    account_index: u32,
    era: Era,
    mode: &RestoreMode,
    ctx: &NetworkContext,
) -> WalletResult<Option<WalletPlate>> {
    if !mode.eras(ctx).contains(&era) {
        return Ok(None);
    }
    generate_plate(root, account_index, era, ctx).map(Some)
}

/// All plates a restore mode yields on this network, in era order.
pub fn generate_plates(
    root: &XPrv,
    account_index: u32,
    mode: &RestoreMode,
    ctx: &NetworkContext,
) -> WalletResult<Vec<WalletPlate>> {
    let mut plates = Vec::new();
    for era in mode.eras(ctx) {
        plates.push(generate_plate(root, account_index, era, ctx)?);
    }
    Ok(plates)
}
