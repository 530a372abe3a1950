//! Fund-Transfer Sub-flow
//!
//! When a legacy-era wallet is restored on the current era, its funds
//! are swept into the new wallet before restoration finalizes. The
//! sub-state lives inside the restore session (no sibling stores); the
//! pure pieces here (address scanning, sweep planning, witnessing)
//! are driven by the restore flow, which owns all backend I/O.
//!
//! Finding no funds is a successful no-op, not a failure: the sweep is
//! skipped and restoration proceeds.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};
use crate::keys::path::ChainRole;
use crate::keys::{account_key_for_era, encode_address, XPrv};
use crate::types::{Era, NetworkContext, Utxo};

type Blake2b256 = Blake2b<U32>;

/// How many addresses per chain the legacy scan covers.
pub const ADDRESS_SCAN_WINDOW: u32 = 20;

// Linear fee parameters shared with the transaction layer.
const FEE_CONSTANT: u64 = 155_381;
const FEE_COEFFICIENT: u64 = 44;
const TX_BASE_SIZE: u64 = 70;
const INPUT_SIZE: u64 = 140;
const OUTPUT_SIZE: u64 = 65;

/// Sub-flow states, in the order a successful run visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStep {
    RestoringAddresses,
    CheckingAddresses,
    GeneratingTx,
    ReadyToTransfer,
    Success,
    Error,
}

/// Mutable sub-state owned by the restore session.
#[derive(Debug, Clone)]
pub struct TransferState {
    pub step: TransferStep,
    pub error: Option<WalletError>,
    /// Set once planning succeeds; absent for the no-funds path.
    pub plan: Option<TransferPlan>,
    /// Broadcast transaction id, when a sweep actually ran.
    pub tx_id: Option<String>,
}

impl TransferState {
    pub fn new() -> Self {
        Self {
            step: TransferStep::RestoringAddresses,
            error: None,
            plan: None,
            tx_id: None,
        }
    }

    pub fn fail(&mut self, error: WalletError) {
        self.step = TransferStep::Error;
        self.error = Some(error);
    }
}

impl Default for TransferState {
    fn default() -> Self {
        Self::new()
    }
}

/// A legacy address together with the path that derived it, so inputs
/// can be witnessed later without re-scanning.
#[derive(Debug, Clone)]
pub struct ScannedAddress {
    pub address: String,
    pub chain: ChainRole,
    pub index: u32,
}

/// Sweep plan: every discovered input into a single output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferPlan {
    pub inputs: Vec<Utxo>,
    pub receiver: String,
    pub amount: u64,
    pub fee: u64,
}

/// Witnessed sweep ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransfer {
    pub tx_id: String,
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
struct TransferWitness {
    public_key: String,
    signature: String,
}

#[derive(Serialize)]
struct TransferEnvelope<'a> {
    plan: &'a TransferPlan,
    witnesses: Vec<TransferWitness>,
}

/// Candidate legacy addresses for the funds scan: both chains, indices
/// `0..window`.
pub fn legacy_scan_addresses(
    root: &XPrv,
    account_index: u32,
    window: u32,
    ctx: &NetworkContext,
) -> WalletResult<Vec<ScannedAddress>> {
    let account = account_key_for_era(root, Era::Byron, account_index).to_public();

    let mut scanned = Vec::with_capacity(2 * window as usize);
    for chain in [ChainRole::External, ChainRole::Internal] {
        let chain_key = account.derive(chain.index())?;
        for index in 0..window {
            let key = chain_key.derive(index)?;
            scanned.push(ScannedAddress {
                address: encode_address(Era::Byron, &key, None, ctx)?,
                chain,
                index,
            });
        }
    }
    Ok(scanned)
}

/// Linear fee for a sweep of `input_count` inputs and one output.
pub fn estimate_fee(input_count: usize) -> u64 {
    let size = TX_BASE_SIZE + INPUT_SIZE * input_count as u64 + OUTPUT_SIZE;
    FEE_CONSTANT + FEE_COEFFICIENT * size
}

/// Plan the sweep. `None` means there is nothing worth transferring:
/// no inputs, or a total below the fee floor. Callers treat that as
/// benign success.
pub fn build_plan(utxos: Vec<Utxo>, receiver: String) -> Option<TransferPlan> {
    if utxos.is_empty() {
        return None;
    }
    let total: u64 = utxos.iter().map(|u| u.amount).sum();
    let fee = estimate_fee(utxos.len());
    if total <= fee {
        // Dust: sweeping would burn everything in fees.
        return None;
    }
    Some(TransferPlan {
        amount: total - fee,
        fee,
        inputs: utxos,
        receiver,
    })
}

/// Witness the plan: one signature per input, keyed by the scanned path
/// that produced the input's address.
pub fn sign_plan(
    plan: &TransferPlan,
    root: &XPrv,
    account_index: u32,
    scanned: &[ScannedAddress],
) -> WalletResult<SignedTransfer> {
    let body_hash = plan_hash(plan);
    let account = account_key_for_era(root, Era::Byron, account_index);

    let mut witnesses = Vec::with_capacity(plan.inputs.len());
    for input in &plan.inputs {
        let source = scanned
            .iter()
            .find(|s| s.address == input.receiver)
            .ok_or_else(|| {
                WalletError::sequencing(format!(
                    "UTXO at unscanned address {}",
                    input.receiver
                ))
            })?;
        let key = account
            .derive(source.chain.index())
            .derive(source.index);
        let (public_key, signature) = sign_extended(&key, &body_hash)?;
        witnesses.push(TransferWitness {
            public_key: hex::encode(public_key),
            signature: hex::encode(signature),
        });
    }

    let envelope = TransferEnvelope { plan, witnesses };
    Ok(SignedTransfer {
        tx_id: hex::encode(body_hash),
        bytes: serde_json::to_vec(&envelope)?,
    })
}

/// Canonical digest of the sweep body; doubles as the transaction id.
fn plan_hash(plan: &TransferPlan) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for input in &plan.inputs {
        hasher.update(input.tx_hash.as_bytes());
        hasher.update(input.tx_index.to_be_bytes());
    }
    hasher.update(plan.receiver.as_bytes());
    hasher.update(plan.amount.to_be_bytes());
    hasher.update(plan.fee.to_be_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Sign with an extended key. The scalar half is used as-is; re-clamping
/// a derived child would change the key.
fn sign_extended(key: &XPrv, message: &[u8]) -> WalletResult<([u8; 32], [u8; 64])> {
    use curve25519_dalek::scalar::Scalar;
    use ed25519_dalek::hazmat::{raw_sign, ExpandedSecretKey};
    use ed25519_dalek::VerifyingKey;
    use sha2::Sha512;

    let secret = key.extended_secret();
    let scalar_bytes: [u8; 32] = secret[..32].try_into().expect("kL is 32 bytes");
    let mut hash_prefix = [0u8; 32];
    hash_prefix.copy_from_slice(&secret[32..]);

    let expanded = ExpandedSecretKey {
        scalar: Scalar::from_bytes_mod_order(scalar_bytes),
        hash_prefix,
    };

    let public = *key.to_public().public_key_bytes();
    let verifying = VerifyingKey::from_bytes(&public)
        .map_err(|e| WalletError::crypto_error(format!("Invalid verifying key: {}", e)))?;

    let signature = raw_sign::<Sha512>(&expanded, message, &verifying);
    Ok((public, signature.to_bytes()))
}
