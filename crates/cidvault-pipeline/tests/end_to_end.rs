//! Publish and retrieve scenarios over in-process collaborators and real
//! HTTP mirrors.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use cidvault_crypto::LocalIdentity;
use cidvault_pipeline::{
    FailureCategory, Pipeline, PipelineError, PublishStage, RetrievalSession, RetrievalStage,
    SelectedFile, VaultConfig,
};
use cidvault_registry::{InMemoryLedger, NoMetadata, StaticMetadata, SubmitPolicy};
use cidvault_store::{BlobStore, Gateway, HttpGateway, InMemoryBlobStore, MemoryGateway, MirrorSet};
use cidvault_types::{Account, ChainId, Cid};
use proptest::prelude::*;

struct Vault {
    wallet: Arc<LocalIdentity>,
    blobs: Arc<InMemoryBlobStore>,
    primary: Arc<MemoryGateway>,
    secondary: Arc<MemoryGateway>,
    ledger: Arc<InMemoryLedger>,
    pipeline: Pipeline,
    alice: Account,
}

fn vault() -> Vault {
    let wallet = Arc::new(LocalIdentity::new(ChainId::SEPOLIA));
    let alice = wallet.add_account("alice");
    let blobs = Arc::new(InMemoryBlobStore::new());
    let primary = Arc::new(MemoryGateway::new("primary", blobs.clone()));
    let secondary = Arc::new(MemoryGateway::new("secondary", blobs.clone()));
    let mirrors = MirrorSet::new(vec![
        primary.clone() as Arc<dyn Gateway>,
        secondary.clone() as Arc<dyn Gateway>,
    ]);
    let ledger = Arc::new(InMemoryLedger::new());
    let pipeline = Pipeline::new(
        wallet.clone(),
        ChainId::SEPOLIA,
        BlobStore::new(blobs.clone(), mirrors),
        ledger.clone(),
        Arc::new(StaticMetadata::new()),
    );
    Vault {
        wallet,
        blobs,
        primary,
        secondary,
        ledger,
        pipeline,
        alice,
    }
}

fn cid(s: &str) -> Cid {
    Cid::new(s).unwrap()
}

// ---------------------------------------------------------------------------
// Scenario A: publish a small binary file
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_registers_exact_cid_for_signer() {
    let v = vault();
    let pdf_header = vec![0x50, 0x44, 0x46, 0x2d];
    let session = v
        .pipeline
        .publish(&v.alice, SelectedFile::new("contract.pdf", pdf_header.clone()))
        .await;
    assert_eq!(session.stage(), &PublishStage::Done);
    let receipt = session.into_result().unwrap();
    assert!(!receipt.cid.as_str().is_empty());

    let events = v.ledger.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].owner, v.alice);
    assert_eq!(events[0].cid, receipt.cid);
    assert_eq!(events[0].tx_hash, Some(receipt.tx_hash));

    let file = v.pipeline.retrieve_cid(&v.alice, &receipt.cid).await.unwrap();
    assert_eq!(file.bytes.as_ref(), pdf_header.as_slice());
}

#[tokio::test]
async fn empty_file_roundtrips() {
    let v = vault();
    let receipt = v
        .pipeline
        .publish(&v.alice, SelectedFile::anonymous(Vec::new()))
        .await
        .into_result()
        .unwrap();
    let file = v.pipeline.retrieve_cid(&v.alice, &receipt.cid).await.unwrap();
    assert!(file.bytes.is_empty());
}

// ---------------------------------------------------------------------------
// Scenario B: HTTP mirror fallback
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct MirrorHits {
    down: Arc<AtomicUsize>,
    up: Arc<AtomicUsize>,
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn fetch_falls_back_to_second_mirror() {
    let hits = MirrorHits::default();
    let router = Router::new()
        .route(
            "/down/ipfs/:cid",
            get(|State(hits): State<MirrorHits>| async move {
                hits.down.fetch_add(1, Ordering::SeqCst);
                StatusCode::SERVICE_UNAVAILABLE
            }),
        )
        .route(
            "/up/ipfs/:cid",
            get(
                |State(hits): State<MirrorHits>, Path(cid): Path<String>| async move {
                    hits.up.fetch_add(1, Ordering::SeqCst);
                    if cid == "bafy123" {
                        (StatusCode::OK, b"pinned bytes".to_vec()).into_response()
                    } else {
                        StatusCode::NOT_FOUND.into_response()
                    }
                },
            ),
        )
        .with_state(hits.clone());
    let base = serve(router).await;

    let wallet = Arc::new(LocalIdentity::new(ChainId::SEPOLIA));
    let mirrors = MirrorSet::new(vec![
        Arc::new(HttpGateway::new(format!("{base}/down/ipfs/"))) as Arc<dyn Gateway>,
        Arc::new(HttpGateway::new(format!("{base}/up/ipfs/"))) as Arc<dyn Gateway>,
    ]);
    let pipeline = Pipeline::new(
        wallet,
        ChainId::SEPOLIA,
        BlobStore::new(Arc::new(InMemoryBlobStore::new()), mirrors),
        Arc::new(InMemoryLedger::new()),
        Arc::new(NoMetadata),
    );

    let bytes = pipeline.download_raw(&cid("bafy123")).await.unwrap();
    assert_eq!(bytes.as_ref(), b"pinned bytes");
    assert_eq!(hits.down.load(Ordering::SeqCst), 1);
    assert_eq!(hits.up.load(Ordering::SeqCst), 1);

    let err = pipeline.download_raw(&cid("bafymissing")).await.unwrap_err();
    match err {
        PipelineError::BlobNotFound { attempts, .. } => assert_eq!(attempts.len(), 2),
        other => panic!("expected BlobNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn retrieve_survives_primary_outage() {
    let v = vault();
    let receipt = v
        .pipeline
        .publish(&v.alice, SelectedFile::anonymous(b"resilient".to_vec()))
        .await
        .into_result()
        .unwrap();

    v.primary.set_offline(true);
    let file = v.pipeline.retrieve_cid(&v.alice, &receipt.cid).await.unwrap();
    assert_eq!(file.bytes.as_ref(), b"resilient");
    assert_eq!(v.primary.calls(), 1);
    assert_eq!(v.secondary.calls(), 1);

    v.secondary.set_offline(true);
    let err = v.pipeline.retrieve_cid(&v.alice, &receipt.cid).await.unwrap_err();
    assert!(matches!(err, PipelineError::BlobNotFound { .. }));
    assert_eq!(err.category(), FailureCategory::NetworkOrService);
}

// ---------------------------------------------------------------------------
// Scenario C and listing order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn owner_without_events_lists_empty() {
    let v = vault();
    let mut session = RetrievalSession::new(Account::from_label("nobody"));
    let docs = v.pipeline.list_documents(&mut session).await.unwrap();
    assert!(docs.is_empty());
    assert_eq!(session.stage(), &RetrievalStage::Selecting);
}

#[tokio::test]
async fn listing_is_ascending_and_owner_filtered() {
    let v = vault();
    let bob = Account::from_label("bob");
    let base = Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap();
    v.ledger.append_event(v.alice, cid("bafyC"), base + Duration::minutes(30));
    v.ledger.append_event(bob, cid("bafyBob"), base + Duration::minutes(10));
    v.ledger.append_event(v.alice, cid("bafyA"), base);
    v.ledger.append_event(v.alice, cid("bafyB"), base + Duration::minutes(20));

    let docs = v.pipeline.list(&v.alice).await.unwrap();
    let cids: Vec<_> = docs.iter().map(|d| d.cid.as_str()).collect();
    assert_eq!(cids, vec!["bafyA", "bafyB", "bafyC"]);
    assert!(docs.iter().all(|d| d.owner == v.alice));
}

#[tokio::test]
async fn listing_ignores_wrong_network() {
    let v = vault();
    v.pipeline
        .publish(&v.alice, SelectedFile::anonymous(b"x".to_vec()))
        .await
        .into_result()
        .unwrap();
    v.wallet.switch_network(ChainId::MAINNET);
    assert_eq!(v.pipeline.list(&v.alice).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Orphaned blobs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_signature_leaves_fetchable_orphan() {
    let v = vault();
    v.ledger.set_policy(SubmitPolicy::Reject);
    let session = v
        .pipeline
        .publish(&v.alice, SelectedFile::anonymous(b"orphan".to_vec()))
        .await;

    assert!(matches!(
        session.last_error(),
        Some(PipelineError::RegistrationRejected(_))
    ));
    assert!(session.is_orphaned());
    let orphan = session.cid().cloned().unwrap();

    assert!(v.pipeline.list(&v.alice).await.unwrap().is_empty());
    assert!(v.pipeline.download_raw(&orphan).await.is_ok());
    // The blob is still decryptable by its owner; it is only unindexed.
    let file = v.pipeline.retrieve_cid(&v.alice, &orphan).await.unwrap();
    assert_eq!(file.bytes.as_ref(), b"orphan");
}

#[tokio::test]
async fn reverted_registration_leaves_orphan_and_no_document() {
    let v = vault();
    v.ledger.set_policy(SubmitPolicy::Revert);
    let session = v
        .pipeline
        .publish(&v.alice, SelectedFile::anonymous(b"reverted".to_vec()))
        .await;

    assert!(matches!(
        session.last_error(),
        Some(PipelineError::RegistrationReverted { .. })
    ));
    assert!(session.tx_hash().is_some());
    assert!(session.receipt().is_none());
    assert_eq!(v.blobs.len(), 1);
    assert!(v.pipeline.list(&v.alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn retry_after_failure_pins_again() {
    let v = vault();
    v.ledger.set_policy(SubmitPolicy::Reject);
    let first = v
        .pipeline
        .publish(&v.alice, SelectedFile::anonymous(b"again".to_vec()))
        .await;
    v.ledger.set_policy(SubmitPolicy::Accept);
    let second = v
        .pipeline
        .publish(&v.alice, SelectedFile::anonymous(b"again".to_vec()))
        .await;

    assert_ne!(first.id(), second.id());
    // Fresh ephemeral keys make a fresh envelope, hence a fresh CID.
    assert_ne!(first.cid(), second.cid());
    assert_eq!(v.blobs.pin_calls(), 2);
    assert_eq!(v.pipeline.list(&v.alice).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Network guard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wrong_network_publish_has_no_side_effects() {
    let v = vault();
    v.wallet.switch_network(ChainId(5));
    let session = v
        .pipeline
        .publish(&v.alice, SelectedFile::anonymous(b"blocked".to_vec()))
        .await;

    assert_eq!(
        session.last_error(),
        Some(&PipelineError::WrongNetwork {
            expected: ChainId::SEPOLIA,
            actual: ChainId(5),
        })
    );
    assert!(session.cid().is_none());
    assert_eq!(v.blobs.pin_calls(), 0);
    assert!(v.blobs.is_empty());
    assert_eq!(v.ledger.submit_calls(), 0);
}

#[tokio::test]
async fn wrong_network_decrypt_never_reaches_provider() {
    let v = vault();
    let receipt = v
        .pipeline
        .publish(&v.alice, SelectedFile::anonymous(b"guarded".to_vec()))
        .await
        .into_result()
        .unwrap();

    v.wallet.switch_network(ChainId::MAINNET);
    let mut session = RetrievalSession::new(v.alice);
    let err = v.pipeline.retrieve(&mut session, &receipt.cid).await.unwrap_err();
    assert!(matches!(err, PipelineError::WrongNetwork { .. }));
    assert_eq!(v.wallet.decrypt_calls(), 0);
    assert!(matches!(session.stage(), RetrievalStage::Failed(_)));
}

// ---------------------------------------------------------------------------
// Store and identity failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pin_failure_stops_before_ledger() {
    let v = vault();
    v.blobs.set_fail_pins(true);
    let session = v
        .pipeline
        .publish(&v.alice, SelectedFile::anonymous(b"x".to_vec()))
        .await;
    let err = session.last_error().cloned().unwrap();
    assert!(matches!(err, PipelineError::StoreUnavailable { .. }));
    assert!(err.to_string().contains("503"));
    assert!(!session.is_orphaned());
    assert_eq!(v.ledger.submit_calls(), 0);
}

#[tokio::test]
async fn unknown_account_is_identity_unavailable() {
    let v = vault();
    let stranger = Account::from_label("mallory");
    let session = v
        .pipeline
        .publish(&stranger, SelectedFile::anonymous(b"x".to_vec()))
        .await;
    assert!(matches!(
        session.last_error(),
        Some(PipelineError::IdentityUnavailable(_))
    ));
    assert_eq!(v.blobs.pin_calls(), 0);
}

#[tokio::test]
async fn envelope_for_another_account_fails_to_decrypt() {
    let v = vault();
    let bob = v.wallet.add_account("bob");
    let receipt = v
        .pipeline
        .publish(&v.alice, SelectedFile::anonymous(b"for alice".to_vec()))
        .await
        .into_result()
        .unwrap();
    let err = v.pipeline.retrieve_cid(&bob, &receipt.cid).await.unwrap_err();
    assert!(matches!(err, PipelineError::DecryptionFailed(_)));
    assert_eq!(err.category(), FailureCategory::InvalidData);
}

#[test]
fn incomplete_config_is_configuration_missing() {
    let config = VaultConfig::from_lookup(|key| match key {
        "CIDVAULT_CHAIN_ID" => Some("11155111".into()),
        _ => None,
    })
    .unwrap();
    let err = Pipeline::from_config(&config).unwrap_err();
    assert!(matches!(err, PipelineError::ConfigurationMissing(_)));
    assert_eq!(err.category(), FailureCategory::Configuration);
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn publish_then_retrieve_returns_original(
        payload in proptest::collection::vec(any::<u8>(), 0..4096)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let v = vault();
        let out = rt.block_on(async {
            let receipt = v
                .pipeline
                .publish(&v.alice, SelectedFile::anonymous(payload.clone()))
                .await
                .into_result()
                .unwrap();
            v.pipeline.retrieve_cid(&v.alice, &receipt.cid).await.unwrap()
        });
        prop_assert_eq!(out.bytes.as_ref(), payload.as_slice());
    }
}
