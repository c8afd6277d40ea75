use std::{future::Future, sync::Arc, time::Duration};

use alloy::{
    providers::{Provider, ProviderBuilder},
    transports::{http::reqwest::Url, ws::WsConnect, TransportError},
};
use common::config::RpcConfig;
use tokio::time::timeout;
use tracing::{info, warn};

type DynProvider = Arc<dyn Provider + Send + Sync>;

#[derive(Clone)]
struct Transport {
    kind: &'static str,
    provider: DynProvider,
}

/// RPC transports tried in order, WebSocket first. Every call is bounded by
/// the request timeout; a failed or timed out call moves on to the next
/// transport before the error is returned.
#[derive(Clone)]
pub struct FallbackProvider {
    transports: Vec<Transport>,
    ws: Option<DynProvider>,
    request_timeout: Duration,
}

impl FallbackProvider {
    pub async fn connect(config: &RpcConfig) -> eyre::Result<Self> {
        let request_timeout = config.request_timeout();
        let mut transports = Vec::new();
        let mut ws = None;

        if let Some(ws_url) = &config.ws_url {
            let connect = ProviderBuilder::new().on_ws(WsConnect::new(ws_url.clone()));
            match timeout(request_timeout, connect).await {
                Ok(Ok(provider)) => {
                    let provider: DynProvider = Arc::new(provider);
                    info!(url = %ws_url, "Connected WebSocket RPC");
                    ws = Some(provider.clone());
                    transports.push(Transport {
                        kind: "ws",
                        provider,
                    });
                }
                Ok(Err(e)) => warn!(url = %ws_url, error = %e, "WebSocket RPC unavailable"),
                Err(_) => warn!(url = %ws_url, "WebSocket RPC connect timed out"),
            }
        }

        if let Some(http_url) = &config.http_url {
            let url = http_url
                .parse::<Url>()
                .map_err(|e| eyre::eyre!("Invalid HTTP URL: {}", e))?;
            let provider: DynProvider = Arc::new(ProviderBuilder::new().on_http(url));
            transports.push(Transport {
                kind: "http",
                provider,
            });
        }

        Self::from_parts(transports, ws, request_timeout)
    }

    fn from_parts(
        transports: Vec<Transport>,
        ws: Option<DynProvider>,
        request_timeout: Duration,
    ) -> eyre::Result<Self> {
        if transports.is_empty() {
            return Err(eyre::eyre!("No reachable RPC transport configured"));
        }
        Ok(Self {
            transports,
            ws,
            request_timeout,
        })
    }

    pub fn transport_kinds(&self) -> Vec<&'static str> {
        self.transports.iter().map(|t| t.kind).collect()
    }

    /// The WebSocket provider, when one connected. Needed for subscriptions.
    pub fn pubsub(&self) -> Option<&DynProvider> {
        self.ws.as_ref()
    }

    pub async fn request<T, F, Fut>(&self, method: &'static str, operation: F) -> eyre::Result<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut last_error = None;

        for transport in &self.transports {
            match timeout(self.request_timeout, operation(transport.provider.clone())).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    warn!(method, transport = transport.kind, error = %e, "RPC call failed");
                    last_error = Some(eyre::Report::from(e));
                }
                Err(_) => {
                    warn!(
                        method,
                        transport = transport.kind,
                        timeout_ms = self.request_timeout.as_millis() as u64,
                        "RPC call timed out"
                    );
                    last_error = Some(eyre::eyre!(
                        "{} timed out after {:?}",
                        method,
                        self.request_timeout
                    ));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| eyre::eyre!("{} failed: no transport", method)))
    }
}
