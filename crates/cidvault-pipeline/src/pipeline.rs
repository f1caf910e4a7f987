use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cidvault_crypto::{
    CiphertextEnvelope, CryptoAdapter, CryptoError, IdentityProvider, NetworkGuard, ProviderEvent,
    RpcIdentity,
};
use cidvault_registry::{
    LedgerClient, MetadataLookup, NoMetadata, PinataMetadata, RegistryIndex, RpcLedger,
    RpcLedgerOptions,
};
use cidvault_rpc::RpcClient;
use cidvault_store::{BlobStore, Gateway, HttpGateway, MirrorSet, PinataPinner};
use cidvault_types::{codec, Account, ChainId, Cid, Document};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::VaultConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::session::{PublishSession, RetrievalSession, RetrievedFile, SelectedFile};
use crate::stage::{PublishStage, RetrievalStage};

/// The connected identity, as reported by the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub account: Account,
    pub accounts: Vec<Account>,
    pub network: ChainId,
    pub expected_network: ChainId,
}

impl Connection {
    pub fn on_expected_network(&self) -> bool {
        self.network == self.expected_network
    }
}

/// One refreshed listing from [`Pipeline::watch_documents`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentListing {
    pub account: Account,
    pub documents: Vec<Document>,
}

/// Live listings for an account. Background work stops when dropped.
pub struct DocumentWatch {
    receiver: mpsc::Receiver<PipelineResult<DocumentListing>>,
    tasks: Vec<JoinHandle<()>>,
}

impl DocumentWatch {
    /// Next listing, or `None` once the provider has gone away.
    pub async fn next(&mut self) -> Option<PipelineResult<DocumentListing>> {
        self.receiver.recv().await
    }
}

impl Drop for DocumentWatch {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for DocumentWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentWatch")
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

/// Orchestrates publish (encrypt, pin, register) and retrieve (list, fetch,
/// decrypt) over injected collaborators.
///
/// Each call runs one attempt per step. Failures end the session; retrying
/// means starting a new one.
#[derive(Clone)]
pub struct Pipeline {
    identity: Arc<dyn IdentityProvider>,
    crypto: CryptoAdapter,
    store: BlobStore,
    registry: RegistryIndex,
    /// Wallets without push notifications are polled while a watch is open.
    poller: Option<(Arc<RpcIdentity>, Duration)>,
}

impl Pipeline {
    /// Wire a pipeline around `identity`, guarding state changes on `expected_chain`.
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        expected_chain: ChainId,
        store: BlobStore,
        ledger: Arc<dyn LedgerClient>,
        metadata: Arc<dyn MetadataLookup>,
    ) -> Self {
        let guard = NetworkGuard::new(identity.clone(), expected_chain);
        let crypto = CryptoAdapter::new(identity.clone(), guard.clone());
        let registry = RegistryIndex::new(ledger, metadata, guard);
        Self::from_parts(identity, crypto, store, registry)
    }

    pub fn from_parts(
        identity: Arc<dyn IdentityProvider>,
        crypto: CryptoAdapter,
        store: BlobStore,
        registry: RegistryIndex,
    ) -> Self {
        Self {
            identity,
            crypto,
            store,
            registry,
            poller: None,
        }
    }

    /// Build the networked pipeline described by `config`.
    ///
    /// Validates the configuration first; nothing is contacted here.
    pub fn from_config(config: &VaultConfig) -> PipelineResult<Self> {
        config.validate()?;
        let contract = config.require_registry_address()?;
        let chain = config.require_chain_id()?;
        let rpc = RpcClient::new(config.require_rpc_url()?);

        let identity = Arc::new(RpcIdentity::new(rpc.clone()));
        let pinner = Arc::new(PinataPinner::new(
            config.pin_endpoint.clone(),
            config.require_pin_jwt()?,
        ));
        let mirrors = MirrorSet::new(
            config
                .gateways
                .iter()
                .map(|base| Arc::new(HttpGateway::new(base.clone())) as Arc<dyn Gateway>)
                .collect(),
        );
        let ledger = Arc::new(RpcLedger::new(
            rpc,
            contract,
            RpcLedgerOptions {
                confirmations: config.confirmations,
                poll_interval: config.poll_interval(),
                from_block: config.from_block,
            },
        ));
        let metadata: Arc<dyn MetadataLookup> = match &config.metadata_jwt {
            Some(jwt) => Arc::new(PinataMetadata::new(
                config.metadata_endpoint.clone(),
                jwt.clone(),
            )),
            None => Arc::new(NoMetadata),
        };

        info!(
            %contract,
            %chain,
            mirrors = config.gateways.len(),
            names = config.metadata_jwt.is_some(),
            "pipeline configured"
        );
        let mut pipeline = Self::new(
            identity.clone(),
            chain,
            BlobStore::new(pinner, mirrors),
            ledger,
            metadata,
        );
        pipeline.poller = Some((identity, config.poll_interval()));
        Ok(pipeline)
    }

    pub fn expected_network(&self) -> ChainId {
        self.crypto.guard().expected()
    }

    pub fn store(&self) -> &BlobStore {
        &self.store
    }

    pub fn registry(&self) -> &RegistryIndex {
        &self.registry
    }

    /// Ask the provider to connect and report the selected account.
    pub async fn connect(&self) -> PipelineResult<Connection> {
        let accounts = self
            .identity
            .request_accounts()
            .await
            .map_err(CryptoError::from_identity)?;
        let account = *accounts
            .first()
            .ok_or_else(|| PipelineError::IdentityUnavailable("no accounts connected".into()))?;
        let network = self
            .identity
            .current_network()
            .await
            .map_err(CryptoError::from_identity)?;
        debug!(%account, %network, "connected");
        Ok(Connection {
            account,
            accounts,
            network,
            expected_network: self.expected_network(),
        })
    }


    /// Encrypt `file` to `account`, pin it, and register its CID.
    ///
    /// The returned session is always terminal: `Done` or `Failed`.
    #[instrument(skip(self, file), fields(%account, len = file.bytes.len()))]
    pub async fn publish(&self, account: &Account, file: SelectedFile) -> PublishSession {
        let mut session = PublishSession::new(file);
        match self.run_publish(&mut session, account).await {
            Ok(()) => {
                if let Some(receipt) = session.receipt() {
                    info!(
                        session = %session.id(),
                        tx_hash = %receipt.tx_hash,
                        block = receipt.block_number,
                        "published"
                    );
                }
            }
            Err(err) => {
                if let Some(cid) = session.cid() {
                    warn!(%cid, "pinned blob left unregistered");
                }
                session.fail(err);
            }
        }
        session
    }

    async fn run_publish(
        &self,
        session: &mut PublishSession,
        account: &Account,
    ) -> PipelineResult<()> {
        // Fails closed before anything leaves the machine.
        self.crypto.guard().assert_network().await?;

        session.advance(PublishStage::Encrypting);
        let key = self.crypto.get_public_key(account).await?;
        let envelope = self.crypto.encrypt(&key, &session.file.bytes)?;
        let text = envelope.to_text()?;

        session.advance(PublishStage::Pinning);
        let name = session.file.name.clone();
        let cid = self.store.pin(Bytes::from(text), name.as_deref()).await?;
        info!(%cid, "ciphertext pinned");
        session.cid = Some(cid.clone());

        session.advance(PublishStage::AwaitingSignature);
        let tx_hash = self.registry.submit(account, &cid).await?;
        session.tx_hash = Some(tx_hash);

        session.advance(PublishStage::AwaitingFinality);
        let receipt = self.registry.await_finality(&tx_hash).await?;
        session.receipt = Some(receipt);

        session.advance(PublishStage::Done);
        Ok(())
    }


    /// Populate `session` with its account's documents, oldest first.
    ///
    /// Read path: the network guard is not consulted. An empty listing is a
    /// successful result.
    pub async fn list_documents<'s>(
        &self,
        session: &'s mut RetrievalSession,
    ) -> PipelineResult<&'s [Document]> {
        session.ensure_live()?;
        session.advance(RetrievalStage::Listing);
        match self.registry.list_by_owner(session.account()).await {
            Ok(documents) => {
                session.documents = documents;
                session.advance(RetrievalStage::Selecting);
                Ok(&session.documents)
            }
            Err(err) => Err(session.fail(err.into())),
        }
    }

    /// Fetch and decrypt `cid` within `session`.
    ///
    /// Works from a fresh session (direct CID), after listing, or after a
    /// previous document was retrieved.
    #[instrument(skip(self, session), fields(session = %session.id(), %cid))]
    pub async fn retrieve<'s>(
        &self,
        session: &'s mut RetrievalSession,
        cid: &Cid,
    ) -> PipelineResult<&'s RetrievedFile> {
        session.ensure_live()?;
        if *session.stage() == RetrievalStage::Idle {
            session.advance(RetrievalStage::Selecting);
        }
        session.cid = Some(cid.clone());
        session.raw_envelope_text = None;
        session.decrypted = None;

        session.advance(RetrievalStage::Fetching);
        match self.run_retrieve(session, cid).await {
            Ok(file) => {
                session.advance(RetrievalStage::Ready);
                info!(len = file.bytes.len(), "document decrypted");
                Ok(session.decrypted.insert(file))
            }
            Err(err) => Err(session.fail(err)),
        }
    }

    async fn run_retrieve(
        &self,
        session: &mut RetrievalSession,
        cid: &Cid,
    ) -> PipelineResult<RetrievedFile> {
        let raw = self.store.fetch(cid).await?;
        let text = codec::utf8_from_bytes(raw.to_vec())
            .map_err(|e| PipelineError::DecryptionFailed(format!("stored blob is not text: {e}")))?;
        let envelope = CiphertextEnvelope::from_text(text.as_bytes())?;
        session.raw_envelope_text = Some(text);

        session.advance(RetrievalStage::Decrypting);
        let plaintext = self.crypto.decrypt(&envelope, session.account()).await?;
        Ok(RetrievedFile {
            cid: cid.clone(),
            name: session.name_for(cid),
            bytes: Bytes::from(plaintext),
        })
    }

    /// One-shot listing for `account`.
    pub async fn list(&self, account: &Account) -> PipelineResult<Vec<Document>> {
        let mut session = RetrievalSession::new(*account);
        self.list_documents(&mut session).await?;
        Ok(session.documents)
    }

    /// One-shot fetch and decrypt of a known CID.
    pub async fn retrieve_cid(
        &self,
        account: &Account,
        cid: &Cid,
    ) -> PipelineResult<RetrievedFile> {
        let mut session = RetrievalSession::new(*account);
        self.retrieve(&mut session, cid).await?;
        session
            .take_decrypted()
            .ok_or_else(|| PipelineError::DecryptionFailed("no plaintext produced".into()))
    }

    /// Fetch and decrypt `cid`, named from `account`'s listing when the ledger
    /// answers. A failed listing falls back to retrieving the bare CID.
    pub async fn retrieve_named(
        &self,
        account: &Account,
        cid: &Cid,
    ) -> PipelineResult<RetrievedFile> {
        let mut session = RetrievalSession::new(*account);
        if let Err(err) = self.list_documents(&mut session).await {
            warn!(%cid, error = %err, "listing failed, retrieving without a display name");
            return self.retrieve_cid(account, cid).await;
        }
        self.retrieve(&mut session, cid).await?;
        session
            .take_decrypted()
            .ok_or_else(|| PipelineError::DecryptionFailed("no plaintext produced".into()))
    }

    /// The stored envelope text for `cid`, without decrypting.
    pub async fn download_raw(&self, cid: &Cid) -> PipelineResult<Bytes> {
        Ok(self.store.fetch(cid).await?)
    }


    /// Re-list `account`'s documents now and after every account or network
    /// change the provider reports.
    ///
    /// An account switch follows the provider's newly selected account.
    pub fn watch_documents(&self, account: Account) -> DocumentWatch {
        let (sender, receiver) = mpsc::channel(8);
        let mut events = self.identity.subscribe();
        let registry = self.registry.clone();

        let mut tasks = Vec::new();
        if let Some((identity, interval)) = &self.poller {
            tasks.push(identity.clone().spawn_watcher(*interval));
        }
        tasks.push(tokio::spawn(async move {
            let mut account = account;
            loop {
                let listing = registry
                    .list_by_owner(&account)
                    .await
                    .map(|documents| DocumentListing { account, documents })
                    .map_err(PipelineError::from);
                if sender.send(listing).await.is_err() {
                    return;
                }

                match events.recv().await {
                    Ok(ProviderEvent::AccountsChanged(accounts)) => {
                        if let Some(first) = accounts.first() {
                            account = *first;
                        }
                        debug!(%account, "accounts changed; re-listing");
                    }
                    Ok(ProviderEvent::ChainChanged(chain)) => {
                        debug!(%chain, "network changed; re-listing");
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed provider events; re-listing");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }));

        DocumentWatch { receiver, tasks }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("expected_network", &self.expected_network())
            .field("store", &self.store)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
