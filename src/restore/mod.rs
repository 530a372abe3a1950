//! Restore Flow State Machine
//!
//! Orchestrates end-to-end wallet restoration: collects the entered
//! phrase and metadata, validates/unscrambles it, derives the root key
//! and verification plates, walks the user through confirmation, runs
//! the legacy fund-transfer sub-flow when needed, and hands the result
//! to the storage sink.
//!
//! Transitions are synchronous; the machine suspends only at backend
//! and persistence awaits. Callers hold `&mut` on the flow, so
//! transitions appear atomic. A session epoch is bumped on every
//! `reset`; async continuations re-check it and no-op when the session
//! they started under is gone.

pub mod backend;
pub mod transfer;

pub use backend::{BoxFuture, ChainBackend, HttpBackend, RestoreWalletRequest, WalletSink};
pub use transfer::{TransferState, TransferStep};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};
use crate::keys::path::ChainRole;
use crate::keys::{account_key_for_era, encode_address, XPrv};
use crate::mnemonic;
use crate::plate::generate_plates;
use crate::types::{
    Era, NetworkContext, RestoreExtra, RestoreMode, ServerStatus, WalletHandle, WalletPlate,
    WalletRestoreMeta,
};

/// Top-level steps of the restore dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStep {
    Start,
    VerifyMnemonic,
    LegacyExplanation,
    TransferTxGen,
}

/// Decoded phrase, root key and plates derived from the entered fields.
pub struct RecoveryResult {
    /// Standard-form phrase (paper certificates already unscrambled).
    pub phrase: String,
    /// Root private key; stays inside the flow.
    pub root: XPrv,
    /// Per-era plates for user confirmation.
    pub plates: Vec<WalletPlate>,
}

impl std::fmt::Debug for RecoveryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryResult")
            .field("phrase", &"<redacted>")
            .field("plates", &self.plates.len())
            .finish()
    }
}

/// What `verify_mnemonic` decided.
#[derive(Debug)]
pub enum VerifyOutcome {
    /// A legacy-era wallet: show the migration explanation first.
    LegacyExplanation,
    /// Persisted directly; the session has been reset.
    Restored(WalletHandle),
}

/// Terminal result of the fund-transfer sub-flow.
#[derive(Debug)]
pub enum TransferOutcome {
    /// Wallet persisted. `tx_id` is set when funds were actually swept,
    /// absent on the benign no-funds path.
    Completed {
        handle: WalletHandle,
        tx_id: Option<String>,
    },
    /// Sub-flow failed; session stays in the transfer step for retry.
    Failed(WalletError),
    /// The session was reset while an operation was in flight.
    Cancelled,
}

/// The restore session and its owning state machine.
///
/// One session per wallet-creation context; concurrent mutation is
/// excluded by `&mut` receivers.
pub struct RestoreFlow {
    ctx: NetworkContext,
    backend: Arc<dyn ChainBackend>,
    sink: Arc<dyn WalletSink>,
    account_index: u32,

    mode: Option<RestoreMode>,
    meta: Option<WalletRestoreMeta>,
    recovery: Option<RecoveryResult>,
    step: RestoreStep,
    transfer: Option<TransferState>,
    epoch: u64,
}

impl RestoreFlow {
    pub fn new(
        ctx: NetworkContext,
        backend: Arc<dyn ChainBackend>,
        sink: Arc<dyn WalletSink>,
    ) -> Self {
        Self {
            ctx,
            backend,
            sink,
            account_index: 0,
            mode: None,
            meta: None,
            recovery: None,
            step: RestoreStep::Start,
            transfer: None,
            epoch: 0,
        }
    }

    pub fn with_account_index(mut self, account_index: u32) -> Self {
        self.account_index = account_index;
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn step(&self) -> RestoreStep {
        self.step
    }

    pub fn mode(&self) -> Option<RestoreMode> {
        self.mode
    }

    pub fn recovery(&self) -> Option<&RecoveryResult> {
        self.recovery.as_ref()
    }

    pub fn plates(&self) -> &[WalletPlate] {
        self.recovery.as_ref().map(|r| r.plates.as_slice()).unwrap_or(&[])
    }

    pub fn transfer_state(&self) -> Option<&TransferState> {
        self.transfer.as_ref()
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Select the restore mode. Must happen before `submit_fields`.
    pub fn set_mode(&mut self, mode: RestoreMode) {
        self.mode = Some(mode);
    }

    /// Validate the entered fields, derive the recovery result, and
    /// move to the verification step.
    ///
    /// User-input problems (bad checksum, wrong paper password) are
    /// recoverable: the session stays in `Start` and the caller
    /// re-prompts. An unset mode is a sequencing bug and fatal.
    pub fn submit_fields(&mut self, meta: WalletRestoreMeta) -> WalletResult<()> {
        if self.step != RestoreStep::Start {
            return Err(WalletError::sequencing(format!(
                "submit_fields called in {:?}",
                self.step
            )));
        }
        let mode = self
            .mode
            .ok_or_else(|| WalletError::sequencing("Restore mode not set"))?;

        let recovery = self.decode_and_derive(&mode, &meta)?;

        log::debug!(
            "restore fields accepted: {} plate(s), step -> verify",
            recovery.plates.len()
        );
        self.meta = Some(meta);
        self.recovery = Some(recovery);
        self.step = RestoreStep::VerifyMnemonic;
        Ok(())
    }

    fn decode_and_derive(
        &self,
        mode: &RestoreMode,
        meta: &WalletRestoreMeta,
    ) -> WalletResult<RecoveryResult> {
        if mode.extra == RestoreExtra::PrivateKey {
            return self.derive_from_private_key(mode, meta);
        }

        let entered = mnemonic::normalize(&meta.recovery_phrase);
        let phrase = if mode.is_paper() {
            let password = meta.paper_password.clone().unwrap_or_default();
            match mnemonic::unscramble(&entered, mode.word_count, &password)? {
                Some(decoded) => decoded,
                None => {
                    log::warn!("paper certificate rejected: check suffix mismatch");
                    return Err(WalletError::wrong_password(
                        "Invalid recovery phrase or paper password",
                    ));
                }
            }
        } else {
            entered
        };

        if !mnemonic::validate(&phrase, mode.decoded_word_count()) {
            return Err(WalletError::invalid_mnemonic("Invalid recovery phrase"));
        }

        let entropy = mnemonic::entropy(&phrase)?;
        let root = XPrv::from_entropy(&entropy);
        let plates = generate_plates(&root, self.account_index, mode, &self.ctx)?;

        Ok(RecoveryResult { phrase, root, plates })
    }

    /// Private-key restores skip the mnemonic codec entirely: the field
    /// carries a hex-encoded 96-byte extended key (secret ‖ chain code).
    fn derive_from_private_key(
        &self,
        mode: &RestoreMode,
        meta: &WalletRestoreMeta,
    ) -> WalletResult<RecoveryResult> {
        let bytes = hex::decode(meta.recovery_phrase.trim())?;
        if bytes.len() != 96 {
            return Err(WalletError::invalid_input(format!(
                "Extended private key must be 96 bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = [0u8; 64];
        key.copy_from_slice(&bytes[..64]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&bytes[64..]);

        let root = XPrv::from_parts(key, chain_code);
        let plates = generate_plates(&root, self.account_index, mode, &self.ctx)?;
        Ok(RecoveryResult {
            phrase: String::new(),
            root,
            plates,
        })
    }

    /// The user confirmed the plate. Legacy-era wallets detour through
    /// the migration explanation; current-era wallets persist directly.
    pub async fn verify_mnemonic(&mut self) -> WalletResult<VerifyOutcome> {
        if self.step != RestoreStep::VerifyMnemonic {
            return Err(WalletError::sequencing(format!(
                "verify_mnemonic called in {:?}",
                self.step
            )));
        }
        let mode = self
            .mode
            .ok_or_else(|| WalletError::sequencing("Restore mode not set"))?;

        if mode.purpose == crate::types::RestorePurpose::Bip44 {
            self.step = RestoreStep::LegacyExplanation;
            return Ok(VerifyOutcome::LegacyExplanation);
        }

        let handle = self.persist_wallet().await?;
        self.reset();
        Ok(VerifyOutcome::Restored(handle))
    }

    /// From the explanation step: persist without checking for funds.
    pub async fn start_restore(&mut self) -> WalletResult<WalletHandle> {
        if self.step != RestoreStep::LegacyExplanation {
            return Err(WalletError::sequencing(format!(
                "start_restore called in {:?}",
                self.step
            )));
        }
        let handle = self.persist_wallet().await?;
        self.reset();
        Ok(handle)
    }

    /// From the explanation step: run the fund-transfer sub-flow, then
    /// persist. Retryable via `retry_transfer` on failure.
    pub async fn start_check(&mut self) -> WalletResult<TransferOutcome> {
        if self.step != RestoreStep::LegacyExplanation {
            return Err(WalletError::sequencing(format!(
                "start_check called in {:?}",
                self.step
            )));
        }
        self.step = RestoreStep::TransferTxGen;
        self.transfer = Some(TransferState::new());
        self.run_transfer().await
    }

    /// Re-enter the sub-flow from its error state.
    pub async fn retry_transfer(&mut self) -> WalletResult<TransferOutcome> {
        match (&self.step, self.transfer.as_ref().map(|t| t.step)) {
            (RestoreStep::TransferTxGen, Some(TransferStep::Error)) => {}
            _ => {
                return Err(WalletError::sequencing(
                    "retry_transfer outside a failed transfer",
                ))
            }
        }
        self.transfer = Some(TransferState::new());
        self.run_transfer().await
    }

    async fn run_transfer(&mut self) -> WalletResult<TransferOutcome> {
        let epoch = self.epoch;
        let backend = Arc::clone(&self.backend);

        // Preflight: a downed backend fails fast instead of surfacing a
        // confusing mid-scan error.
        let status = backend.check_server_status().await;
        if self.epoch != epoch {
            return Ok(TransferOutcome::Cancelled);
        }
        match status {
            Ok(ServerStatus::Down) => {
                let err = WalletError::server_unavailable("Backend is down");
                return Ok(self.fail_transfer(err));
            }
            Ok(_) => {}
            Err(err) => return Ok(self.fail_transfer(err)),
        }

        let (root, receiver) = {
            let recovery = match self.recovery.as_ref() {
                Some(r) => r,
                None => {
                    return Err(WalletError::sequencing(
                        "Transfer started without a recovery result",
                    ))
                }
            };
            (recovery.root.clone(), self.sweep_receiver(&recovery.root)?)
        };

        let scanned =
            transfer::legacy_scan_addresses(&root, self.account_index, transfer::ADDRESS_SCAN_WINDOW, &self.ctx)?;
        let addresses: Vec<String> = scanned.iter().map(|s| s.address.clone()).collect();

        self.set_transfer_step(TransferStep::CheckingAddresses);
        let usage = backend.check_addresses_in_use(addresses.clone()).await;
        if self.epoch != epoch {
            return Ok(TransferOutcome::Cancelled);
        }
        let usage = match usage {
            Ok(u) => u,
            Err(err) => return Ok(self.fail_transfer(err)),
        };

        // Query UTXOs only where the chain has seen the address.
        let candidates: Vec<String> = if usage.used.is_empty() {
            Vec::new()
        } else {
            addresses
                .into_iter()
                .filter(|a| usage.used.contains(a))
                .collect()
        };

        let utxos = if candidates.is_empty() {
            Vec::new()
        } else {
            let utxos = backend.get_utxos_for_addresses(candidates).await;
            if self.epoch != epoch {
                return Ok(TransferOutcome::Cancelled);
            }
            match utxos {
                Ok(u) => u,
                Err(err) => return Ok(self.fail_transfer(err)),
            }
        };

        self.set_transfer_step(TransferStep::GeneratingTx);
        let plan = transfer::build_plan(utxos, receiver);

        let tx_id = match plan {
            None => {
                // Nothing to sweep: benign success, no broadcast.
                log::debug!("legacy scan found no transferable funds; skipping sweep");
                None
            }
            Some(plan) => {
                let signed =
                    match transfer::sign_plan(&plan, &root, self.account_index, &scanned) {
                        Ok(s) => s,
                        Err(err) => return Ok(self.fail_transfer(err)),
                    };
                if let Some(state) = self.transfer.as_mut() {
                    state.plan = Some(plan);
                }
                self.set_transfer_step(TransferStep::ReadyToTransfer);

                let broadcast = backend.broadcast_transaction(signed.bytes.clone()).await;
                if self.epoch != epoch {
                    return Ok(TransferOutcome::Cancelled);
                }
                match broadcast {
                    Ok(tx_id) => Some(tx_id),
                    Err(err) => return Ok(self.fail_transfer(err)),
                }
            }
        };

        let handle = match self.persist_wallet().await {
            Ok(h) => h,
            Err(err) => return Ok(self.fail_transfer(err)),
        };
        if self.epoch != epoch {
            return Ok(TransferOutcome::Cancelled);
        }

        if let Some(state) = self.transfer.as_mut() {
            state.step = TransferStep::Success;
            state.tx_id = tx_id.clone();
        }
        let outcome = TransferOutcome::Completed { handle, tx_id };
        self.reset();
        Ok(outcome)
    }

    /// The sweep destination: the new wallet's first internal-chain
    /// address in the current era.
    fn sweep_receiver(&self, root: &XPrv) -> WalletResult<String> {
        let account = account_key_for_era(root, Era::Shelley, self.account_index).to_public();
        let payment = account.derive(ChainRole::Internal.index())?.derive(0)?;
        let staking = account
            .derive(ChainRole::Staking.index())?
            .derive(crate::keys::path::STAKING_KEY_INDEX)?;
        encode_address(Era::Shelley, &payment, Some(&staking), &self.ctx)
    }

    fn set_transfer_step(&mut self, step: TransferStep) {
        if let Some(state) = self.transfer.as_mut() {
            state.step = step;
        }
    }

    fn fail_transfer(&mut self, error: WalletError) -> TransferOutcome {
        log::warn!("fund transfer failed: {}", error);
        if let Some(state) = self.transfer.as_mut() {
            state.fail(error.clone());
        }
        TransferOutcome::Failed(error)
    }

    async fn persist_wallet(&self) -> WalletResult<WalletHandle> {
        let mode = self
            .mode
            .ok_or_else(|| WalletError::sequencing("Restore mode not set"))?;
        let meta = self
            .meta
            .as_ref()
            .ok_or_else(|| WalletError::sequencing("No entered fields to persist"))?;
        let recovery = self
            .recovery
            .as_ref()
            .ok_or_else(|| WalletError::sequencing("No recovery result to persist"))?;

        let request = RestoreWalletRequest {
            mode,
            recovery_phrase: recovery.phrase.clone(),
            wallet_name: meta.wallet_name.clone(),
            wallet_password: meta.wallet_password.clone(),
            network_id: self.ctx.network_id,
            account_index: self.account_index,
        };
        self.sink
            .restore_wallet(request)
            .await
            .map_err(|e| WalletError::persistence(e.message).with_details(format!("{:?}", e.code)))
    }

    /// Pop one step. No-op in `Start`; leaving `VerifyMnemonic` clears
    /// the derived recovery result.
    pub fn back(&mut self) {
        match self.step {
            RestoreStep::Start | RestoreStep::TransferTxGen => {}
            RestoreStep::VerifyMnemonic => {
                self.recovery = None;
                self.step = RestoreStep::Start;
            }
            RestoreStep::LegacyExplanation => {
                self.step = RestoreStep::VerifyMnemonic;
            }
        }
    }

    /// Return to the initial state and discard all session data. Safe
    /// from any state, including with operations in flight: bumping the
    /// epoch makes stale continuations no-op.
    pub fn reset(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.mode = None;
        self.meta = None;
        self.recovery = None;
        self.transfer = None;
        self.step = RestoreStep::Start;
    }

    /// Explicit cancellation; identical to `reset`.
    pub fn cancel(&mut self) {
        log::debug!("restore session cancelled");
        self.reset();
    }
}
