use async_trait::async_trait;
use bytes::Bytes;
use cidvault_types::Cid;
use tracing::debug;

use crate::error::GatewayError;
use crate::traits::Gateway;

/// Path-style HTTP gateway: `GET {base}{cid}`.
#[derive(Clone, Debug)]
pub struct HttpGateway {
    base: String,
    http: reqwest::Client,
}

impl HttpGateway {
    /// `base` is the URL prefix the CID is appended to, e.g.
    /// `https://ipfs.io/ipfs/`. A missing trailing slash is added.
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_client(base, reqwest::Client::new())
    }

    pub fn with_client(base: impl Into<String>, http: reqwest::Client) -> Self {
        let mut base = base.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self { base, http }
    }

    pub fn url_for(&self, cid: &Cid) -> String {
        format!("{}{}", self.base, cid)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    fn endpoint(&self) -> &str {
        &self.base
    }

    async fn get(&self, cid: &Cid) -> Result<Bytes, GatewayError> {
        let url = self.url_for(cid);
        debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
            });
        }
        response
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/ipfs")
    }

    #[tokio::test]
    async fn fetches_by_cid() {
        let router = Router::new().route(
            "/ipfs/:cid",
            get(|Path(cid): Path<String>| async move {
                if cid == "bafy123" {
                    (StatusCode::OK, b"blob bytes".to_vec())
                } else {
                    (StatusCode::NOT_FOUND, Vec::new())
                }
            }),
        );
        let gw = HttpGateway::new(serve(router).await);
        let cid = Cid::new("bafy123").unwrap();
        assert_eq!(gw.get(&cid).await.unwrap(), Bytes::from_static(b"blob bytes"));

        let missing = Cid::new("bafyother").unwrap();
        assert_eq!(
            gw.get(&missing).await.unwrap_err(),
            GatewayError::Status { status: 404 }
        );
    }

    #[tokio::test]
    async fn server_error_is_status() {
        let router = Router::new().route(
            "/ipfs/:cid",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let gw = HttpGateway::new(serve(router).await);
        assert_eq!(
            gw.get(&Cid::new("bafy123").unwrap()).await.unwrap_err(),
            GatewayError::Status { status: 503 }
        );
    }

    #[tokio::test]
    async fn unreachable_is_transport() {
        let gw = HttpGateway::new("http://127.0.0.1:9/ipfs/");
        assert!(matches!(
            gw.get(&Cid::new("bafy123").unwrap()).await,
            Err(GatewayError::Transport(_))
        ));
    }

    #[test]
    fn base_gets_trailing_slash() {
        let gw = HttpGateway::new("https://ipfs.io/ipfs");
        assert_eq!(gw.endpoint(), "https://ipfs.io/ipfs/");
        assert_eq!(
            gw.url_for(&Cid::new("bafy123").unwrap()),
            "https://ipfs.io/ipfs/bafy123"
        );
    }
}
