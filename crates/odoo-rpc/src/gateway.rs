use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::errors::RpcError;
use crate::xmlrpc;

pub const DEFAULT_ODOO_URL: &str = "http://localhost:8069";

/// Logical XML-RPC service a call is routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Unauthenticated service: `authenticate`, `version`.
    Common,
    /// Model operations dispatched through `execute_kw`.
    Object,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Common => "/xmlrpc/2/common",
            Self::Object => "/xmlrpc/2/object",
        }
    }
}

#[async_trait]
pub trait RpcGateway: Send + Sync {
    async fn call(
        &self,
        endpoint: Endpoint,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, RpcError>;
}

#[async_trait]
impl<T> RpcGateway for Arc<T>
where
    T: RpcGateway + ?Sized,
{
    async fn call(
        &self,
        endpoint: Endpoint,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, RpcError> {
        (**self).call(endpoint, method, params).await
    }
}

/// XML-RPC over HTTP(S) using a shared reqwest client.
#[derive(Clone, Debug)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, endpoint: Endpoint) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.path().trim_start_matches('/')
        )
    }
}

#[async_trait]
impl RpcGateway for HttpGateway {
    async fn call(
        &self,
        endpoint: Endpoint,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let url = self.endpoint(endpoint);
        tracing::trace!(%url, method, params = params.len(), "xml-rpc request");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(xmlrpc::encode_call(method, &params))
            .send()
            .await
            .map_err(|err| RpcError::Transport(format!("http post failed: {err}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| RpcError::Transport(format!("http read body failed: {err}")))?;
        if !status.is_success() {
            return Err(RpcError::Transport(format!(
                "http request failed with status {status}: {}",
                text.trim()
            )));
        }

        xmlrpc::decode_response(&text)
    }
}
