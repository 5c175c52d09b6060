//! HTTP trigger
//!
//! Serves the Azure Functions custom-handler protocol: every request to
//! `/scrapper` performs exactly one run and answers with an invoke envelope.

use crate::azure::auth::{default_credential, TokenCredential};
use crate::azure::http::ArmHttpClient;
use crate::config::Config;
use crate::scrape::{Scrapper, ScrapperOptions};
use crate::sink::{CollectingSink, Record};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Produces the credential used by every request
pub type CredentialSource = Arc<dyn Fn(&Config) -> Result<Arc<dyn TokenCredential>> + Send + Sync>;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub options: ScrapperOptions,
    pub node_pools: bool,
    /// Resolved once, then shared so its token cache survives across requests
    credential: OnceCell<Arc<dyn TokenCredential>>,
    source: CredentialSource,
}

impl AppState {
    pub fn new(config: Config, options: ScrapperOptions) -> Self {
        Self {
            config,
            options,
            node_pools: false,
            credential: OnceCell::new(),
            source: Arc::new(|config: &Config| -> Result<Arc<dyn TokenCredential>> {
                let http = ArmHttpClient::new(config.effective_timeout())?;
                default_credential(&http)
            }),
        }
    }

    pub fn with_credential(mut self, credential: Arc<dyn TokenCredential>) -> Self {
        self.credential = OnceCell::from(credential);
        self
    }

    /// Resolve the credential lazily through `source`; failures are retried
    /// on the next request
    pub fn with_credential_source(mut self, source: CredentialSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_node_pools(mut self, node_pools: bool) -> Self {
        self.node_pools = node_pools;
        self
    }

    async fn credential(&self) -> Result<Arc<dyn TokenCredential>> {
        self.credential
            .get_or_try_init(|| async { (self.source)(&self.config) })
            .await
            .cloned()
    }
}

/// HTTP response carried inside the envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseData {
    pub statuscode: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Functions custom-handler invoke response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct InvokeResponse {
    pub outputs: HashMap<String, ResponseData>,
    pub logs: Vec<String>,
    pub return_value: serde_json::Value,
}

impl InvokeResponse {
    fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            logs: Vec::new(),
            return_value: serde_json::Value::String(String::new()),
        }
    }

    fn log(mut self, line: String) -> Self {
        tracing::warn!("{}", line);
        self.logs.push(line);
        self
    }

    /// Fill the `res` output and pair the envelope with the HTTP status
    fn finish(mut self, status: StatusCode) -> (StatusCode, Json<Self>) {
        let headers = HashMap::from([("Content-Type".to_string(), "application/json".to_string())]);
        self.outputs.insert(
            "res".to_string(),
            ResponseData {
                statuscode: status.as_u16(),
                headers,
                body: format!("{{\"status\":\"{}\"}}", status.as_u16()),
            },
        );
        (status, Json(self))
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scrapper", get(scrapper).post(scrapper))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "azscrape",
    }))
}

async fn scrapper(State(state): State<Arc<AppState>>) -> (StatusCode, Json<InvokeResponse>) {
    let mut resp = InvokeResponse::new();

    let credential = match state.credential().await {
        Ok(credential) => credential,
        Err(e) => {
            return resp
                .log(format!("failed to obtain a credential: {:#}", e))
                .finish(StatusCode::INTERNAL_SERVER_ERROR)
        },
    };

    let subscription = state.config.effective_subscription();
    let options = state
        .options
        .clone()
        .with_client_options(state.config.client_options())
        .with_timeout(state.config.effective_timeout());

    let scrapper = match Scrapper::new(credential, &subscription, options) {
        Ok(scrapper) => scrapper,
        Err(e) => {
            return resp
                .log(format!("unable to initialize scrapper: {}", e))
                .finish(StatusCode::INTERNAL_SERVER_ERROR)
        },
    };

    let sink = Arc::new(CollectingSink::new());
    let outcome = if state.node_pools {
        scrapper.run_with_node_pools(sink.clone()).await
    } else {
        scrapper.run(sink.clone()).await
    };

    if let Err(e) = outcome {
        return resp
            .log(format!("scrapper failed: {}", e))
            .finish(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let records: Vec<Record> = sink.records();
    tracing::info!("Scrape of {} returned {} records", subscription, records.len());
    resp.return_value = serde_json::to_value(&records).unwrap_or_default();
    resp.finish(StatusCode::OK)
}

/// Bind `port` on all interfaces and serve until the process is stopped
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on {}", addr);
    eprintln!("azscrape listening on http://{}/scrapper", addr);

    axum::serve(listener, build_router(Arc::new(state)))
        .await
        .context("HTTP server failed")
}
