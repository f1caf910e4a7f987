use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{RpcError, RpcResult};
use crate::message::{RpcRequest, RpcResponse};

/// JSON-RPC 2.0 client bound to one HTTP endpoint.
///
/// Cloning is cheap; clones share the connection pool but keep independent
/// request-id counters.
#[derive(Debug)]
pub struct RpcClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_client(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue a call and decode a non-null result.
    pub async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> RpcResult<R> {
        match self.call_optional(method, params).await? {
            Some(result) => Ok(result),
            None => Err(RpcError::Decode(format!("{method} returned null"))),
        }
    }

    /// Issue a call whose result may legitimately be `null`
    /// (e.g. `eth_getTransactionReceipt` for a pending transaction).
    pub async fn call_optional<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> RpcResult<Option<R>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        debug!(method, id, url = %self.url, "rpc call");

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(e.to_string()))?;

        if let Some(error) = envelope.error {
            debug!(method, code = error.code, "rpc error");
            return Err(RpcError::Provider {
                code: error.code,
                message: error.message,
            });
        }

        match envelope.result {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| RpcError::Decode(format!("{method}: {e}"))),
        }
    }
}

impl Clone for RpcClient {
    fn clone(&self) -> Self {
        Self::with_client(self.url.clone(), self.http.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::codes;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn handle(Json(req): Json<RpcRequest>) -> Json<RpcResponse> {
        let resp = match req.method.as_str() {
            "eth_chainId" => RpcResponse::success(req.id, json!("0xaa36a7")),
            "eth_getTransactionReceipt" => RpcResponse::success(req.id, Value::Null),
            "eth_sendTransaction" => {
                RpcResponse::failure(req.id, codes::USER_REJECTED, "User denied transaction")
            }
            _ => RpcResponse::failure(req.id, codes::UNSUPPORTED_METHOD, "unsupported"),
        };
        Json(resp)
    }

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn decodes_result() {
        let url = spawn(Router::new().route("/", post(handle))).await;
        let client = RpcClient::new(url);
        let chain: String = client.call("eth_chainId", json!([])).await.unwrap();
        assert_eq!(chain, "0xaa36a7");
    }

    #[tokio::test]
    async fn null_result_is_none() {
        let url = spawn(Router::new().route("/", post(handle))).await;
        let client = RpcClient::new(url);
        let receipt: Option<Value> = client
            .call_optional("eth_getTransactionReceipt", json!(["0x00"]))
            .await
            .unwrap();
        assert!(receipt.is_none());
    }

    #[tokio::test]
    async fn null_result_is_error_for_required_call() {
        let url = spawn(Router::new().route("/", post(handle))).await;
        let client = RpcClient::new(url);
        let err = client
            .call::<Value>("eth_getTransactionReceipt", json!(["0x00"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Decode(_)));
    }

    #[tokio::test]
    async fn surfaces_provider_error_codes() {
        let url = spawn(Router::new().route("/", post(handle))).await;
        let client = RpcClient::new(url);
        let err = client
            .call::<String>("eth_sendTransaction", json!([{}]))
            .await
            .unwrap_err();
        assert!(err.is_user_rejected());
    }

    #[tokio::test]
    async fn surfaces_http_status() {
        let router = Router::new().route(
            "/",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let url = spawn(router).await;
        let client = RpcClient::new(url);
        let err = client.call::<String>("eth_chainId", json!([])).await.unwrap_err();
        assert_eq!(
            err,
            RpcError::Http {
                status: 502,
                body: "upstream down".into()
            }
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let client = RpcClient::new("http://127.0.0.1:9/");
        let err = client.call::<String>("eth_chainId", json!([])).await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
