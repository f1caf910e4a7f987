use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cidvault_rpc::{parse_quantity, to_quantity, RpcClient};
use cidvault_types::{codec, Account, Cid, EventPosition, TransactionReceipt, TxHash};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::abi;
use crate::error::{RegistryError, RegistryResult};
use crate::event::RegisteredEvent;
use crate::traits::LedgerClient;

/// Tunables for [`RpcLedger`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcLedgerOptions {
    /// Blocks that must include the transaction, counting its own block.
    pub confirmations: u64,
    pub poll_interval: Duration,
    /// First block scanned for registration events.
    pub from_block: u64,
}

impl Default for RpcLedgerOptions {
    fn default() -> Self {
        Self {
            confirmations: 1,
            poll_interval: Duration::from_millis(1500),
            from_block: 0,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: String,
    topics: Vec<String>,
    data: String,
    block_number: Option<String>,
    log_index: Option<String>,
    transaction_hash: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    status: Option<String>,
    block_number: Option<String>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

/// Registry contract reached through a JSON-RPC node and wallet.
///
/// Registration uses `eth_sendTransaction`, so the endpoint's wallet signs
/// (and may prompt for) the call. Finality is observed by polling
/// `eth_getTransactionReceipt` and then `eth_blockNumber` until the configured
/// confirmation depth is reached. No timeout is imposed.
#[derive(Clone, Debug)]
pub struct RpcLedger {
    client: RpcClient,
    contract: Account,
    options: RpcLedgerOptions,
}

impl RpcLedger {
    pub fn new(client: RpcClient, contract: Account, options: RpcLedgerOptions) -> Self {
        Self {
            client,
            contract,
            options,
        }
    }

    pub fn contract(&self) -> &Account {
        &self.contract
    }

    fn parse_u64(field: &str, value: Option<&str>) -> RegistryResult<u64> {
        let raw = value.ok_or_else(|| RegistryError::InvalidEvent(format!("missing {field}")))?;
        parse_quantity(raw).map_err(|e| RegistryError::InvalidEvent(format!("{field}: {e}")))
    }

    fn decode_log(&self, log: &RpcLog) -> RegistryResult<RegisteredEvent> {
        let address = Account::from_hex(&log.address)
            .map_err(|e| RegistryError::InvalidEvent(format!("log address: {e}")))?;
        if address != self.contract {
            return Err(RegistryError::InvalidEvent(format!(
                "log emitted by {address}, not the registry"
            )));
        }

        let topics = log
            .topics
            .iter()
            .map(|t| {
                let bytes = codec::decode_hex_prefixed(t)
                    .map_err(|e| RegistryError::InvalidEvent(format!("topic: {e}")))?;
                <[u8; 32]>::try_from(bytes.as_slice())
                    .map_err(|_| RegistryError::InvalidEvent("topic is not 32 bytes".into()))
            })
            .collect::<RegistryResult<Vec<_>>>()?;
        let data = codec::decode_hex_prefixed(&log.data)
            .map_err(|e| RegistryError::InvalidEvent(format!("data: {e}")))?;
        let decoded = abi::decode_registered_log(&topics, &data)?;

        let cid = Cid::new(decoded.cid).map_err(|e| RegistryError::InvalidEvent(e.to_string()))?;
        let registered_at = DateTime::<Utc>::from_timestamp(decoded.timestamp as i64, 0)
            .ok_or_else(|| RegistryError::InvalidEvent("timestamp out of range".into()))?;
        let position = EventPosition::new(
            Self::parse_u64("blockNumber", log.block_number.as_deref())?,
            Self::parse_u64("logIndex", log.log_index.as_deref())?,
        );
        let tx_hash = log
            .transaction_hash
            .as_deref()
            .map(TxHash::from_hex)
            .transpose()
            .map_err(|e| RegistryError::InvalidEvent(format!("transactionHash: {e}")))?;

        Ok(RegisteredEvent {
            owner: decoded.owner,
            cid,
            registered_at,
            position,
            tx_hash,
        })
    }

    async fn wait_for_depth(&self, block_number: u64) -> RegistryResult<()> {
        let target = block_number.saturating_add(self.options.confirmations.saturating_sub(1));
        loop {
            let head: String = self.client.call("eth_blockNumber", json!([])).await?;
            let head = parse_quantity(&head)?;
            if head >= target {
                return Ok(());
            }
            debug!(head, target, "waiting for confirmations");
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    async fn submit_registration(&self, owner: &Account, cid: &Cid) -> RegistryResult<TxHash> {
        let data = abi::encode_register_document(cid.as_str());
        let tx = json!({
            "from": owner.to_hex(),
            "to": self.contract.to_hex(),
            "data": codec::encode_hex_prefixed(&data),
        });
        info!(%owner, %cid, contract = %self.contract, "submitting registration");
        let hash: String = self
            .client
            .call("eth_sendTransaction", json!([tx]))
            .await
            .map_err(RegistryError::from_submit)?;
        TxHash::from_hex(&hash).map_err(|e| RegistryError::Ledger(format!("bad tx hash: {e}")))
    }

    async fn await_finality(&self, tx_hash: &TxHash) -> RegistryResult<TransactionReceipt> {
        let receipt = loop {
            let receipt: Option<RpcReceipt> = self
                .client
                .call_optional("eth_getTransactionReceipt", json!([tx_hash.to_hex()]))
                .await?;
            match receipt {
                Some(r) if r.block_number.is_some() => break r,
                _ => {
                    debug!(%tx_hash, "transaction pending");
                    tokio::time::sleep(self.options.poll_interval).await;
                }
            }
        };

        if receipt.status.as_deref().map(parse_quantity).transpose()? == Some(0) {
            warn!(%tx_hash, "registration reverted");
            return Err(RegistryError::RegistrationReverted {
                tx_hash: *tx_hash,
                reason: "execution reverted".into(),
            });
        }

        let block_number = Self::parse_u64("blockNumber", receipt.block_number.as_deref())?;
        self.wait_for_depth(block_number).await?;

        let registered_at = receipt
            .logs
            .iter()
            .find_map(|log| self.decode_log(log).ok())
            .map(|event| event.registered_at)
            .ok_or_else(|| {
                RegistryError::InvalidEvent("receipt carries no DocumentRegistered log".into())
            })?;

        info!(%tx_hash, block_number, "registration final");
        Ok(TransactionReceipt {
            tx_hash: *tx_hash,
            block_number,
            registered_at,
        })
    }

    async fn registered_events(&self, owner: &Account) -> RegistryResult<Vec<RegisteredEvent>> {
        let filter = json!({
            "address": self.contract.to_hex(),
            "fromBlock": to_quantity(self.options.from_block),
            "toBlock": "latest",
            "topics": [
                codec::encode_hex_prefixed(&abi::registered_topic()),
                codec::encode_hex_prefixed(&owner.to_word()),
            ],
        });
        let logs: Vec<RpcLog> = self.client.call("eth_getLogs", json!([filter])).await?;
        debug!(%owner, count = logs.len(), "fetched registry logs");
        // A log that fails to decode is skipped so the rest of the history still lists.
        Ok(logs
            .iter()
            .filter_map(|log| match self.decode_log(log) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(
                        %owner,
                        tx = ?log.transaction_hash,
                        error = %e,
                        "skipping undecodable registry log"
                    );
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use cidvault_rpc::{codes, RpcRequest, RpcResponse};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    const BLOCK_TIME: u64 = 1_700_000_000;

    /// Minimal node: mines one block per transaction and serves its logs.
    struct FakeNode {
        contract: Account,
        reject: bool,
        revert: bool,
        state: Mutex<NodeState>,
    }

    #[derive(Default)]
    struct NodeState {
        head: u64,
        /// (tx hash, block, owner, cid)
        mined: Vec<(String, u64, Account, String)>,
        receipt_polls: usize,
    }

    impl FakeNode {
        fn log_json(&self, tx: &str, block: u64, owner: &Account, cid: &str) -> Value {
            json!({
                "address": self.contract.to_hex(),
                "topics": [
                    codec::encode_hex_prefixed(&abi::registered_topic()),
                    codec::encode_hex_prefixed(&owner.to_word()),
                ],
                "data": codec::encode_hex_prefixed(
                    &abi::encode_registered_data(cid, BLOCK_TIME + block)
                ),
                "blockNumber": to_quantity(block),
                "logIndex": "0x0",
                "transactionHash": tx,
            })
        }
    }

    async fn handle(
        State(node): State<Arc<FakeNode>>,
        Json(req): Json<RpcRequest>,
    ) -> Json<RpcResponse> {
        let id = req.id;
        let mut state = node.state.lock().unwrap();
        let resp = match req.method.as_str() {
            "eth_sendTransaction" if node.reject => {
                RpcResponse::failure(id, codes::USER_REJECTED, "User denied transaction signature")
            }
            "eth_sendTransaction" => {
                let tx = &req.params[0];
                let from = Account::from_hex(tx["from"].as_str().unwrap()).unwrap();
                let data = codec::decode_hex_prefixed(tx["data"].as_str().unwrap()).unwrap();
                let cid = abi::decode_register_document(&data).unwrap();
                state.head += 1;
                let hash = format!("0x{:064x}", state.head);
                let block = state.head;
                state.mined.push((hash.clone(), block, from, cid));
                RpcResponse::success(id, json!(hash))
            }
            "eth_getTransactionReceipt" => {
                state.receipt_polls += 1;
                // First poll reports the transaction as pending.
                if state.receipt_polls == 1 {
                    RpcResponse::success(id, Value::Null)
                } else {
                    let wanted = req.params[0].as_str().unwrap_or_default();
                    match state.mined.iter().find(|(h, ..)| h == wanted) {
                        Some((hash, block, owner, cid)) => {
                            let (status, logs) = if node.revert {
                                ("0x0", json!([]))
                            } else {
                                ("0x1", json!([node.log_json(hash, *block, owner, cid)]))
                            };
                            RpcResponse::success(
                                id,
                                json!({
                                    "status": status,
                                    "blockNumber": to_quantity(*block),
                                    "transactionHash": hash,
                                    "logs": logs,
                                }),
                            )
                        }
                        None => RpcResponse::success(id, Value::Null),
                    }
                }
            }
            "eth_blockNumber" => RpcResponse::success(id, json!(to_quantity(state.head))),
            "eth_getLogs" => {
                let filter = &req.params[0];
                let owner_topic = filter["topics"][1].as_str().unwrap_or_default().to_string();
                let logs: Vec<Value> = state
                    .mined
                    .iter()
                    .filter(|_| !node.revert)
                    .filter(|(_, _, owner, _)| {
                        codec::encode_hex_prefixed(&owner.to_word()) == owner_topic
                    })
                    .map(|(hash, block, owner, cid)| node.log_json(hash, *block, owner, cid))
                    .collect();
                RpcResponse::success(id, json!(logs))
            }
            _ => RpcResponse::failure(id, codes::UNSUPPORTED_METHOD, "unsupported"),
        };
        Json(resp)
    }

    async fn spawn(reject: bool, revert: bool) -> (Arc<FakeNode>, RpcLedger) {
        let contract = Account::from_label("registry-contract");
        let node = Arc::new(FakeNode {
            contract,
            reject,
            revert,
            state: Mutex::new(NodeState::default()),
        });
        let router = Router::new().route("/", post(handle)).with_state(node.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let ledger = RpcLedger::new(
            RpcClient::new(format!("http://{addr}/")),
            contract,
            RpcLedgerOptions {
                poll_interval: Duration::from_millis(10),
                ..RpcLedgerOptions::default()
            },
        );
        (node, ledger)
    }

    #[tokio::test]
    async fn register_waits_for_receipt_and_reads_block_time() {
        let (node, ledger) = spawn(false, false).await;
        let alice = Account::from_label("alice");
        let cid = Cid::new("bafy123").unwrap();

        let tx = ledger.submit_registration(&alice, &cid).await.unwrap();
        let receipt = ledger.await_finality(&tx).await.unwrap();
        assert_eq!(receipt.tx_hash, tx);
        assert_eq!(receipt.block_number, 1);
        assert_eq!(receipt.registered_at.timestamp() as u64, BLOCK_TIME + 1);
        assert!(node.state.lock().unwrap().receipt_polls >= 2);
    }

    #[tokio::test]
    async fn events_are_filtered_by_owner_topic() {
        let (_node, ledger) = spawn(false, false).await;
        let alice = Account::from_label("alice");
        let bob = Account::from_label("bob");
        for (who, cid) in [(alice, "bafyA1"), (bob, "bafyB1"), (alice, "bafyA2")] {
            let tx = ledger
                .submit_registration(&who, &Cid::new(cid).unwrap())
                .await
                .unwrap();
            ledger.await_finality(&tx).await.unwrap();
        }

        let events = ledger.registered_events(&alice).await.unwrap();
        let cids: Vec<_> = events.iter().map(|e| e.cid.as_str().to_string()).collect();
        assert_eq!(cids, vec!["bafyA1", "bafyA2"]);
        assert!(events.iter().all(|e| e.owner == alice));
        assert!(events.iter().all(|e| e.tx_hash.is_some()));
    }

    #[tokio::test]
    async fn undecodable_log_does_not_hide_the_rest() {
        let (node, ledger) = spawn(false, false).await;
        let alice = Account::from_label("alice");
        let tx = ledger
            .submit_registration(&alice, &Cid::new("bafyGood").unwrap())
            .await
            .unwrap();
        ledger.await_finality(&tx).await.unwrap();
        {
            let mut state = node.state.lock().unwrap();
            state.head += 1;
            let block = state.head;
            state
                .mined
                .push((format!("0x{block:064x}"), block, alice, "QmDir/report.pdf".to_string()));
        }

        let events = ledger.registered_events(&alice).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].cid.as_str(), "bafyGood");
    }

    #[tokio::test]
    async fn signer_rejection() {
        let (_node, ledger) = spawn(true, false).await;
        assert!(matches!(
            ledger
                .submit_registration(&Account::from_label("alice"), &Cid::new("bafy1").unwrap())
                .await,
            Err(RegistryError::RegistrationRejected(_))
        ));
    }

    #[tokio::test]
    async fn failed_status_is_reverted() {
        let (_node, ledger) = spawn(false, true).await;
        let alice = Account::from_label("alice");
        let tx = ledger
            .submit_registration(&alice, &Cid::new("bafy1").unwrap())
            .await
            .unwrap();
        assert!(matches!(
            ledger.await_finality(&tx).await,
            Err(RegistryError::RegistrationReverted { .. })
        ));
        assert!(ledger.registered_events(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_owner_history_is_empty_list() {
        let (_node, ledger) = spawn(false, false).await;
        assert!(ledger
            .registered_events(&Account::from_label("nobody"))
            .await
            .unwrap()
            .is_empty());
    }
}
