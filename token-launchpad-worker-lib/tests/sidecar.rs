use httpmock::prelude::*;
use serde_json::json;
use std::path::Path;
use token_launchpad_worker_lib::backend::{
    ChainClient, CircuitCompiler, MetadataSink, ProvedTransaction, TransactionBuilder,
};
use token_launchpad_worker_lib::jobs::TaskRequest;
use token_launchpad_worker_lib::sidecar::{HttpMetadataSink, SidecarClient};
use token_launchpad_worker_lib::types::TransactionMetadata;
use token_launchpad_worker_lib::{Address, CircuitName, Error, Network, TaskName, WorkerConfig};
use url::Url;

const SENDER: &str = "B62qmKggMTU6TyrEXdCGEakBbsc3EBeypXTWQmpqRA3y88xepXeQm3a";
const WALLET: &str = "B62qqhvKVk2KEia7awrhNM1nPLUEXDM8WiPut7xXKrNDYDae1JU5GzN";

fn client(server: &MockServer) -> SidecarClient {
    SidecarClient::new(Url::parse(&server.base_url()).unwrap()).unwrap()
}

#[tokio::test]
async fn compile_posts_circuit_and_cache_dir() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/compile")
                .json_body(json!({ "circuit": "FungibleToken", "cacheDir": "/var/cache/worker" }));
            then.status(200)
                .json_body(json!({ "hash": "2681", "data": "AAAx" }));
        })
        .await;

    let key = client(&server)
        .compile(CircuitName::FungibleToken, Path::new("/var/cache/worker"))
        .await
        .unwrap();
    mock.assert_async().await;
    assert_eq!(key.hash, "2681");
    assert_eq!(key.data, "AAAx");
}

#[tokio::test]
async fn compile_failures_name_the_circuit() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/compile");
            then.status(500).body("wasm out of memory");
        })
        .await;

    let err = client(&server)
        .compile(CircuitName::FungibleTokenBidContract, Path::new("/tmp"))
        .await
        .unwrap_err();
    match err {
        Error::Compilation { circuit, message } => {
            assert_eq!(circuit, CircuitName::FungibleTokenBidContract);
            assert!(message.contains("wasm out of memory"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn build_sends_the_validated_request() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/build").json_body_partial(
                json!({
                    "txType": "transfer",
                    "network": "devnet",
                    "sender": SENDER,
                    "params": { "kind": "token", "amount": "10" }
                })
                .to_string(),
            );
            then.status(200).json_body(json!({
                "tx": "{\"feePayer\":{}}",
                "isAdvanced": false,
                "verificationKeyHashes": ["2681"]
            }));
        })
        .await;

    let payload = json!({
        "tokenAddress": "B62qrnnYQfFt9tPRp44fsWHds8LF7ojJKhknYZKNYU3X4xVCdSnnRJc",
        "from": SENDER,
        "to": "B62qmWwo7jjmUp6yEWw1e1zYV5D2mGX6auumiqfn3ZkkoJbTgvwifKs",
        "amount": 10,
        "sendTransaction": true
    });
    let request = TaskRequest::parse(TaskName::Transfer, &payload.to_string(), Network::Devnet).unwrap();
    let config = WorkerConfig::new(
        Network::Devnet,
        WALLET.parse().unwrap(),
        Url::parse(&server.base_url()).unwrap(),
    );

    let built = client(&server)
        .build(&request.build_request(&config))
        .await
        .unwrap();
    mock.assert_async().await;
    assert_eq!(built.verification_key_hashes, vec!["2681".to_string()]);
    assert!(built.symbol.is_none());
}

#[tokio::test]
async fn send_errors_carry_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/send");
            then.status(502).body("bad gateway");
        })
        .await;

    let err = client(&server)
        .send(&ProvedTransaction { tx: "{}".to_string() })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Sidecar { status: 502, .. }));
}

#[tokio::test]
async fn send_parses_pending_response() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/send");
            then.status(200)
                .json_body(json!({ "status": "pending", "hash": "5JuA" }));
        })
        .await;

    let response = client(&server)
        .send(&ProvedTransaction { tx: "{}".to_string() })
        .await
        .unwrap();
    assert!(response.is_pending());
    assert_eq!(response.hash.as_deref(), Some("5JuA"));
    assert!(response.errors.is_empty());
}

#[tokio::test]
async fn missing_account_is_none() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/account")
                .json_body(json!({ "address": SENDER }));
            then.status(200).json_body(json!(null));
        })
        .await;

    let address: Address = SENDER.parse().unwrap();
    let account = client(&server).fetch_account(&address, None).await.unwrap();
    assert!(account.is_none());
}

#[tokio::test]
async fn token_account_request_names_the_token_contract() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/account").json_body(json!({
                "address": SENDER,
                "tokenAddress": "B62qrnnYQfFt9tPRp44fsWHds8LF7ojJKhknYZKNYU3X4xVCdSnnRJc"
            }));
            then.status(200).json_body(json!({
                "publicKey": SENDER,
                "tokenId": "wfG3GivPMttpt6nQnPuX9eDPnoyA5RJZY23LTc4kkNkCRH2gUd",
                "balance": "5000"
            }));
        })
        .await;

    let address: Address = SENDER.parse().unwrap();
    let token: Address = "B62qrnnYQfFt9tPRp44fsWHds8LF7ojJKhknYZKNYU3X4xVCdSnnRJc"
        .parse()
        .unwrap();
    let account = client(&server)
        .fetch_account(&address, Some(&token))
        .await
        .unwrap()
        .unwrap();
    mock.assert_async().await;
    assert_eq!(account.balance, Some(token_launchpad_worker_lib::Amount(5000)));
    assert!(account.token_id.is_some());
}

#[tokio::test]
async fn metadata_sink_posts_tx_id_and_metadata() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/metadata").json_body(json!({
                "txId": "5JuA",
                "metadata": {
                    "type": "transfer",
                    "sender": SENDER,
                    "contractAddress": "B62qrnnYQfFt9tPRp44fsWHds8LF7ojJKhknYZKNYU3X4xVCdSnnRJc",
                    "amount": "10"
                }
            }));
            then.status(204);
        })
        .await;

    let sink = HttpMetadataSink::new(Url::parse(&server.url("/metadata")).unwrap()).unwrap();
    let metadata = TransactionMetadata {
        tx_type: "transfer".to_string(),
        sender: SENDER.to_string(),
        contract_address: "B62qrnnYQfFt9tPRp44fsWHds8LF7ojJKhknYZKNYU3X4xVCdSnnRJc".to_string(),
        amount: Some(token_launchpad_worker_lib::Amount(10)),
        ..Default::default()
    };
    sink.publish("5JuA", &metadata).await.unwrap();
    mock.assert_async().await;
}
