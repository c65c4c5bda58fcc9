//! HTTP implementations of the collaborator traits.
//!
//! The circuits, transaction builder, prover and chain client run in a proving
//! sidecar process next to the worker. Each trait method maps to one
//! `POST {base}/<endpoint>` with a JSON body.

use crate::backend::{
    AccountInfo, BuildRequest, BuiltTransaction, ChainClient, CircuitCompiler, InclusionResponse,
    MetadataSink, MethodStats, ProvedTransaction, Prover, SendResponse, TransactionBuilder,
};
use crate::error::{Error, Result};
use crate::types::{Address, CircuitName, TransactionMetadata, VerificationKey};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SidecarClient {
    http: reqwest::Client,
    base: Url,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompileRequest<'a> {
    circuit: CircuitName,
    cache_dir: &'a Path,
}

#[derive(Serialize)]
struct AnalyzeRequest {
    circuit: CircuitName,
}

#[derive(Serialize)]
struct WaitRequest<'a> {
    hash: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountRequest<'a> {
    address: &'a Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_address: Option<&'a Address>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetadataRequest<'a> {
    tx_id: &'a str,
    metadata: &'a TransactionMetadata,
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?)
}

async fn send_json<Req>(http: &reqwest::Client, url: Url, body: &Req) -> Result<reqwest::Response>
where
    Req: Serialize + ?Sized,
{
    debug!(%url, "Sidecar request");
    let response = http.post(url).json(body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(Error::Sidecar {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

impl SidecarClient {
    pub fn new(base: Url) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base: with_trailing_slash(base),
        })
    }

    async fn post<Req, Resp>(&self, endpoint: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.base.join(endpoint)?;
        Ok(send_json(&self.http, url, body).await?.json().await?)
    }
}

#[async_trait]
impl CircuitCompiler for SidecarClient {
    async fn compile(&self, circuit: CircuitName, cache_dir: &Path) -> Result<VerificationKey> {
        self.post("compile", &CompileRequest { circuit, cache_dir })
            .await
            .map_err(|e| Error::Compilation {
                circuit,
                message: e.to_string(),
            })
    }

    async fn analyze_methods(&self, circuit: CircuitName) -> Result<BTreeMap<String, MethodStats>> {
        self.post("analyze", &AnalyzeRequest { circuit }).await
    }
}

#[async_trait]
impl TransactionBuilder for SidecarClient {
    async fn build(&self, request: &BuildRequest) -> Result<BuiltTransaction> {
        self.post("build", request)
            .await
            .map_err(|e| Error::Build(e.to_string()))
    }
}

#[async_trait]
impl Prover for SidecarClient {
    async fn prove(&self, tx: &BuiltTransaction) -> Result<ProvedTransaction> {
        self.post("prove", tx)
            .await
            .map_err(|e| Error::Prove(e.to_string()))
    }
}

#[async_trait]
impl ChainClient for SidecarClient {
    async fn send(&self, tx: &ProvedTransaction) -> Result<SendResponse> {
        self.post("send", tx).await
    }

    async fn wait(&self, hash: &str) -> Result<InclusionResponse> {
        self.post("wait", &WaitRequest { hash }).await
    }

    async fn fetch_account(
        &self,
        address: &Address,
        token: Option<&Address>,
    ) -> Result<Option<AccountInfo>> {
        self.post(
            "account",
            &AccountRequest {
                address,
                token_address: token,
            },
        )
        .await
    }
}

/// Posts `{ txId, metadata }` to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpMetadataSink {
    http: reqwest::Client,
    url: Url,
}

impl HttpMetadataSink {
    pub fn new(url: Url) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            url,
        })
    }
}

#[async_trait]
impl MetadataSink for HttpMetadataSink {
    async fn publish(&self, tx_id: &str, metadata: &TransactionMetadata) -> Result<()> {
        send_json(
            &self.http,
            self.url.clone(),
            &MetadataRequest { tx_id, metadata },
        )
        .await?;
        Ok(())
    }
}
