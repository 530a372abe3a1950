//! End-to-end restore-flow tests over in-memory backend and sink fakes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use laurel_core::restore::backend::{
    BoxFuture, ChainBackend, RestoreWalletRequest, WalletSink,
};
use laurel_core::restore::transfer::{estimate_fee, legacy_scan_addresses, TransferStep};
use laurel_core::restore::{RestoreFlow, RestoreStep, TransferOutcome, VerifyOutcome};
use laurel_core::types::{
    AddressUsage, Era, NetworkContext, RestoreExtra, RestoreMode, RestorePurpose, ServerStatus,
    Utxo, WalletHandle, WalletRestoreMeta,
};
use laurel_core::{mnemonic, XPrv};

const PHRASE_15: &str = "abandon abandon abandon abandon abandon abandon abandon abandon \
                         abandon abandon abandon abandon abandon abandon address";

// =============================================================================
// Fakes
// =============================================================================

struct FakeBackend {
    /// Address -> spendable amount.
    funded: Mutex<HashMap<String, u64>>,
    status: Mutex<ServerStatus>,
    fail_usage_check: AtomicBool,
    broadcasts: Mutex<Vec<Vec<u8>>>,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            funded: Mutex::new(HashMap::new()),
            status: Mutex::new(ServerStatus::Healthy),
            fail_usage_check: AtomicBool::new(false),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    fn fund(&self, address: &str, amount: u64) {
        self.funded.lock().unwrap().insert(address.to_string(), amount);
    }
}

impl ChainBackend for FakeBackend {
    fn check_addresses_in_use(
        &self,
        addresses: Vec<String>,
    ) -> BoxFuture<'_, laurel_core::WalletResult<AddressUsage>> {
        Box::pin(async move {
            if self.fail_usage_check.load(Ordering::SeqCst) {
                return Err(laurel_core::WalletError::network_error("usage check down"));
            }
            let funded = self.funded.lock().unwrap();
            Ok(AddressUsage {
                used: addresses
                    .into_iter()
                    .filter(|a| funded.contains_key(a))
                    .collect(),
            })
        })
    }

    fn get_utxos_for_addresses(
        &self,
        addresses: Vec<String>,
    ) -> BoxFuture<'_, laurel_core::WalletResult<Vec<Utxo>>> {
        Box::pin(async move {
            let funded = self.funded.lock().unwrap();
            Ok(addresses
                .iter()
                .filter_map(|a| {
                    funded.get(a).map(|amount| Utxo {
                        tx_hash: "cc".repeat(32),
                        tx_index: 0,
                        receiver: a.clone(),
                        amount: *amount,
                    })
                })
                .collect())
        })
    }

    fn broadcast_transaction(
        &self,
        signed_tx: Vec<u8>,
    ) -> BoxFuture<'_, laurel_core::WalletResult<String>> {
        Box::pin(async move {
            self.broadcasts.lock().unwrap().push(signed_tx);
            Ok("txid-1".to_string())
        })
    }

    fn check_server_status(&self) -> BoxFuture<'_, laurel_core::WalletResult<ServerStatus>> {
        Box::pin(async move { Ok(*self.status.lock().unwrap()) })
    }
}

/// Backend whose first call never resolves; used for cancellation tests.
struct HangingBackend;

impl ChainBackend for HangingBackend {
    fn check_addresses_in_use(
        &self,
        _addresses: Vec<String>,
    ) -> BoxFuture<'_, laurel_core::WalletResult<AddressUsage>> {
        Box::pin(async { std::future::pending().await })
    }

    fn get_utxos_for_addresses(
        &self,
        _addresses: Vec<String>,
    ) -> BoxFuture<'_, laurel_core::WalletResult<Vec<Utxo>>> {
        Box::pin(async { std::future::pending().await })
    }

    fn broadcast_transaction(
        &self,
        _signed_tx: Vec<u8>,
    ) -> BoxFuture<'_, laurel_core::WalletResult<String>> {
        Box::pin(async { std::future::pending().await })
    }

    fn check_server_status(&self) -> BoxFuture<'_, laurel_core::WalletResult<ServerStatus>> {
        Box::pin(async { std::future::pending().await })
    }
}

#[derive(Default)]
struct FakeSink {
    restored: Mutex<Vec<RestoreWalletRequest>>,
}

impl WalletSink for FakeSink {
    fn restore_wallet(
        &self,
        request: RestoreWalletRequest,
    ) -> BoxFuture<'_, laurel_core::WalletResult<WalletHandle>> {
        Box::pin(async move {
            let name = request.wallet_name.clone();
            self.restored.lock().unwrap().push(request);
            Ok(WalletHandle {
                wallet_id: "wallet-1".to_string(),
                name,
            })
        })
    }
}

fn meta(phrase: &str) -> WalletRestoreMeta {
    WalletRestoreMeta {
        recovery_phrase: phrase.to_string(),
        wallet_name: "Restored".to_string(),
        wallet_password: "wallet-pw".to_string(),
        paper_password: None,
    }
}

fn flow_with(
    backend: Arc<dyn ChainBackend>,
    sink: Arc<FakeSink>,
) -> RestoreFlow {
    RestoreFlow::new(NetworkContext::mainnet("http://localhost"), backend, sink)
}

// =============================================================================
// Happy paths
// =============================================================================

#[tokio::test]
async fn shelley_restore_persists_directly() {
    let backend = Arc::new(FakeBackend::new());
    let sink = Arc::new(FakeSink::default());
    let mut flow = flow_with(backend, sink.clone());

    flow.set_mode(RestoreMode::new(RestorePurpose::Cip1852, RestoreExtra::None, 15).unwrap());
    flow.submit_fields(meta(PHRASE_15)).unwrap();
    assert_eq!(flow.step(), RestoreStep::VerifyMnemonic);

    let plates = flow.plates();
    assert!(!plates.is_empty());
    assert!(plates.iter().any(|p| p.era == Era::Shelley));
    assert!(plates[0].addresses[0].starts_with("addr1"));

    let outcome = flow.verify_mnemonic().await.unwrap();
    let handle = match outcome {
        VerifyOutcome::Restored(handle) => handle,
        other => panic!("expected direct restore, got {:?}", other),
    };
    assert_eq!(handle.name, "Restored");

    // Successful completion resets the session.
    assert_eq!(flow.step(), RestoreStep::Start);
    assert!(flow.plates().is_empty());

    let restored = sink.restored.lock().unwrap();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].recovery_phrase, PHRASE_15);
}

#[tokio::test]
async fn paper_restore_unscrambles_and_goes_through_explanation() {
    let backend = Arc::new(FakeBackend::new());
    let sink = Arc::new(FakeSink::default());
    let mut flow = flow_with(backend, sink.clone());

    let certificate = mnemonic::scramble(PHRASE_15, "paper-pw").unwrap();

    flow.set_mode(RestoreMode::new(RestorePurpose::Bip44, RestoreExtra::Paper, 21).unwrap());
    let mut paper_meta = meta(&certificate);
    paper_meta.paper_password = Some("paper-pw".to_string());
    flow.submit_fields(paper_meta).unwrap();

    // Paper restores surface only the legacy plate.
    let eras: Vec<Era> = flow.plates().iter().map(|p| p.era).collect();
    assert_eq!(eras, vec![Era::Byron]);

    match flow.verify_mnemonic().await.unwrap() {
        VerifyOutcome::LegacyExplanation => {}
        other => panic!("expected explanation step, got {:?}", other),
    }
    assert_eq!(flow.step(), RestoreStep::LegacyExplanation);

    let handle = flow.start_restore().await.unwrap();
    assert_eq!(handle.wallet_id, "wallet-1");

    // The sink receives the unscrambled standard phrase.
    let restored = sink.restored.lock().unwrap();
    assert_eq!(restored[0].recovery_phrase, PHRASE_15);
}

// =============================================================================
// User-input failures (recoverable)
// =============================================================================

#[tokio::test]
async fn wrong_paper_password_is_recoverable_and_stays_in_start() {
    let backend = Arc::new(FakeBackend::new());
    let sink = Arc::new(FakeSink::default());
    let mut flow = flow_with(backend, sink);

    let certificate = mnemonic::scramble(PHRASE_15, "right").unwrap();

    flow.set_mode(RestoreMode::new(RestorePurpose::Bip44, RestoreExtra::Paper, 21).unwrap());
    let mut paper_meta = meta(&certificate);
    paper_meta.paper_password = Some("wrong".to_string());

    let err = flow.submit_fields(paper_meta).unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(flow.step(), RestoreStep::Start);

    // Same step re-prompts; the right password then succeeds.
    let mut retry_meta = meta(&certificate);
    retry_meta.paper_password = Some("right".to_string());
    flow.submit_fields(retry_meta).unwrap();
    assert_eq!(flow.step(), RestoreStep::VerifyMnemonic);
}

#[tokio::test]
async fn invalid_mnemonic_is_recoverable() {
    let backend = Arc::new(FakeBackend::new());
    let sink = Arc::new(FakeSink::default());
    let mut flow = flow_with(backend, sink);

    flow.set_mode(RestoreMode::new(RestorePurpose::Cip1852, RestoreExtra::None, 15).unwrap());
    let bad = meta("abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon");
    let err = flow.submit_fields(bad).unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(flow.step(), RestoreStep::Start);
}

#[tokio::test]
async fn private_key_restore_skips_the_mnemonic_codec() {
    let backend = Arc::new(FakeBackend::new());
    let sink = Arc::new(FakeSink::default());
    let mut flow = flow_with(backend, sink.clone());

    // Same wallet as PHRASE_15, entered as a raw extended key.
    let entropy = mnemonic::entropy(PHRASE_15).unwrap();
    let root = XPrv::from_entropy(&entropy);
    let mut exported = root.extended_secret().to_vec();
    exported.extend_from_slice(root.chain_code());
    let key_hex = hex::encode(exported);

    flow.set_mode(RestoreMode::new(RestorePurpose::Cip1852, RestoreExtra::PrivateKey, 0).unwrap());
    flow.submit_fields(meta(&key_hex)).unwrap();

    // Plates match the mnemonic-derived ones for the same root.
    let expected = laurel_core::generate_plate(
        &root,
        0,
        Era::Shelley,
        &NetworkContext::mainnet("http://localhost"),
    )
    .unwrap();
    assert_eq!(flow.plates(), std::slice::from_ref(&expected));

    match flow.verify_mnemonic().await.unwrap() {
        VerifyOutcome::Restored(_) => {}
        other => panic!("expected direct restore, got {:?}", other),
    }

    // A truncated key is a recoverable input error.
    flow.set_mode(RestoreMode::new(RestorePurpose::Cip1852, RestoreExtra::PrivateKey, 0).unwrap());
    let err = flow.submit_fields(meta("deadbeef")).unwrap_err();
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn unset_mode_is_a_fatal_sequencing_error() {
    let backend = Arc::new(FakeBackend::new());
    let sink = Arc::new(FakeSink::default());
    let mut flow = flow_with(backend, sink);

    let err = flow.submit_fields(meta(PHRASE_15)).unwrap_err();
    assert!(!err.is_recoverable());
}

// =============================================================================
// Back / reset semantics
// =============================================================================

#[tokio::test]
async fn back_and_reset_semantics() {
    let backend = Arc::new(FakeBackend::new());
    let sink = Arc::new(FakeSink::default());
    let mut flow = flow_with(backend, sink);

    // back() in Start is a no-op.
    flow.back();
    assert_eq!(flow.step(), RestoreStep::Start);

    flow.set_mode(RestoreMode::new(RestorePurpose::Bip44, RestoreExtra::None, 15).unwrap());
    flow.submit_fields(meta(PHRASE_15)).unwrap();
    assert!(!flow.plates().is_empty());

    // back() from VerifyMnemonic clears the recovery result.
    flow.back();
    assert_eq!(flow.step(), RestoreStep::Start);
    assert!(flow.recovery().is_none());

    // Resubmit and walk to the explanation step, then back up one.
    flow.submit_fields(meta(PHRASE_15)).unwrap();
    flow.verify_mnemonic().await.unwrap();
    assert_eq!(flow.step(), RestoreStep::LegacyExplanation);
    flow.back();
    assert_eq!(flow.step(), RestoreStep::VerifyMnemonic);
    assert!(flow.recovery().is_some());

    // reset() from any state empties the session.
    flow.reset();
    assert_eq!(flow.step(), RestoreStep::Start);
    assert!(flow.recovery().is_none());
    assert!(flow.mode().is_none());
}

// =============================================================================
// Fund-transfer sub-flow
// =============================================================================

fn legacy_mode() -> RestoreMode {
    RestoreMode::new(RestorePurpose::Bip44, RestoreExtra::None, 15).unwrap()
}

async fn flow_at_explanation(
    backend: Arc<dyn ChainBackend>,
    sink: Arc<FakeSink>,
) -> RestoreFlow {
    let mut flow = flow_with(backend, sink);
    flow.set_mode(legacy_mode());
    flow.submit_fields(meta(PHRASE_15)).unwrap();
    flow.verify_mnemonic().await.unwrap();
    assert_eq!(flow.step(), RestoreStep::LegacyExplanation);
    flow
}

#[tokio::test]
async fn transfer_with_no_funds_is_benign_success() {
    let backend = Arc::new(FakeBackend::new());
    let sink = Arc::new(FakeSink::default());
    let mut flow = flow_at_explanation(backend.clone(), sink.clone()).await;

    match flow.start_check().await.unwrap() {
        TransferOutcome::Completed { tx_id, .. } => assert!(tx_id.is_none()),
        other => panic!("expected benign success, got {:?}", other),
    }

    // Nothing was broadcast, the wallet still got persisted.
    assert!(backend.broadcasts.lock().unwrap().is_empty());
    assert_eq!(sink.restored.lock().unwrap().len(), 1);
    assert_eq!(flow.step(), RestoreStep::Start);
}

#[tokio::test]
async fn transfer_sweeps_funds_into_new_wallet() {
    let backend = Arc::new(FakeBackend::new());
    let sink = Arc::new(FakeSink::default());

    // Fund two addresses the legacy scan will discover.
    let ctx = NetworkContext::mainnet("http://localhost");
    let entropy = mnemonic::entropy(PHRASE_15).unwrap();
    let root = XPrv::from_entropy(&entropy);
    let scanned = legacy_scan_addresses(&root, 0, 4, &ctx).unwrap();
    backend.fund(&scanned[0].address, 3_000_000);
    backend.fund(&scanned[5].address, 2_000_000);

    let mut flow = flow_at_explanation(backend.clone(), sink.clone()).await;
    let outcome = flow.start_check().await.unwrap();
    match outcome {
        TransferOutcome::Completed { tx_id, .. } => assert_eq!(tx_id.as_deref(), Some("txid-1")),
        other => panic!("expected sweep, got {:?}", other),
    }

    let broadcasts = backend.broadcasts.lock().unwrap();
    assert_eq!(broadcasts.len(), 1);

    let envelope: serde_json::Value = serde_json::from_slice(&broadcasts[0]).unwrap();
    let plan = &envelope["plan"];
    assert_eq!(plan["inputs"].as_array().unwrap().len(), 2);
    assert_eq!(
        plan["amount"].as_u64().unwrap(),
        5_000_000 - estimate_fee(2)
    );
    // Sole output is a current-era address of the restored wallet.
    assert!(plan["receiver"].as_str().unwrap().starts_with("addr1"));
    assert_eq!(envelope["witnesses"].as_array().unwrap().len(), 2);

    assert_eq!(sink.restored.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn transfer_error_allows_retry() {
    let backend = Arc::new(FakeBackend::new());
    let sink = Arc::new(FakeSink::default());
    backend.fail_usage_check.store(true, Ordering::SeqCst);

    let mut flow = flow_at_explanation(backend.clone(), sink.clone()).await;
    match flow.start_check().await.unwrap() {
        TransferOutcome::Failed(err) => assert!(err.is_recoverable()),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(flow.step(), RestoreStep::TransferTxGen);
    assert_eq!(
        flow.transfer_state().map(|t| t.step),
        Some(TransferStep::Error)
    );

    // Backend recovers; retry re-enters the sub-flow from the top.
    backend.fail_usage_check.store(false, Ordering::SeqCst);
    match flow.retry_transfer().await.unwrap() {
        TransferOutcome::Completed { .. } => {}
        other => panic!("expected completion after retry, got {:?}", other),
    }
}

#[tokio::test]
async fn downed_server_fails_preflight() {
    let backend = Arc::new(FakeBackend::new());
    *backend.status.lock().unwrap() = ServerStatus::Down;
    let sink = Arc::new(FakeSink::default());

    let mut flow = flow_at_explanation(backend, sink.clone()).await;
    match flow.start_check().await.unwrap() {
        TransferOutcome::Failed(err) => {
            assert_eq!(err.code, laurel_core::ErrorCode::ServerUnavailable)
        }
        other => panic!("expected preflight failure, got {:?}", other),
    }
    assert!(sink.restored.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancelling_a_hung_transfer_leaves_a_clean_session() {
    let backend = Arc::new(HangingBackend);
    let sink = Arc::new(FakeSink::default());
    let mut flow = flow_with(backend, sink);

    flow.set_mode(legacy_mode());
    flow.submit_fields(meta(PHRASE_15)).unwrap();
    flow.verify_mnemonic().await.unwrap();

    // The backend never answers; the host gives up and cancels.
    let result =
        tokio::time::timeout(std::time::Duration::from_millis(50), flow.start_check()).await;
    assert!(result.is_err());

    flow.cancel();
    assert_eq!(flow.step(), RestoreStep::Start);
    assert!(flow.recovery().is_none());
    assert!(flow.transfer_state().is_none());
}
