use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use vault_api::app::services::{AppServices, build_services_with};
use vault_core::{AccountId, Amount};
use vault_infra::config::VaultConfig;
use vault_infra::ledger::{LoggingPayout, Payout, PayoutError};
use vault_infra::prices::{PriceError, PriceSource, PriceTable, StaticPriceSource};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(VaultConfig::default(), Arc::new(StaticPriceSource::fallback()), LoggingPayout).await
    }

    async fn spawn_with(
        config: VaultConfig,
        prices: Arc<dyn PriceSource>,
        payout: impl Payout + 'static,
    ) -> Self {
        // Same router as prod, but with injected collaborators on an ephemeral port.
        let services: AppServices = build_services_with(&config, prices, payout);
        let app = vault_api::app::build_router(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct DownPriceSource;

#[async_trait]
impl PriceSource for DownPriceSource {
    async fn fetch(&self, _ids: &[String], _currency: &str) -> Result<PriceTable, PriceError> {
        Err(PriceError::Unavailable("connection refused".into()))
    }
}

async fn post_amount(
    client: &reqwest::Client,
    srv: &TestServer,
    account: AccountId,
    op: &str,
    amount: &str,
) -> reqwest::Response {
    client
        .post(srv.url(&format!("/accounts/{account}/{op}")))
        .json(&json!({ "amount": amount }))
        .send()
        .await
        .unwrap()
}

async fn balance(client: &reqwest::Client, srv: &TestServer, account: AccountId) -> serde_json::Value {
    let res = client
        .get(srv.url(&format!("/accounts/{account}/balance")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(srv.url("/health")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn deposit_then_withdraw_updates_balance() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let account = AccountId::new();

    let res = post_amount(&client, &srv, account, "deposit", "2.5").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["entry"]["sequence"], 1);
    assert_eq!(body["entry"]["kind"], "deposit");
    assert_eq!(body["balance"]["balance"], "2.5");

    let res = post_amount(&client, &srv, account, "withdraw", "1").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["entry"]["sequence"], 2);
    assert_eq!(body["entry"]["kind"], "withdraw");

    let body = balance(&client, &srv, account).await;
    assert_eq!(body["balance"], "1.5");
    assert_eq!(body["balance_wei"], "1500000000000000000");
}

#[tokio::test]
async fn unknown_account_has_zero_balance() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let body = balance(&client, &srv, AccountId::new()).await;

    assert_eq!(body["balance"], "0.0");
}

#[tokio::test]
async fn overdraft_is_rejected_and_leaves_no_trace() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let account = AccountId::new();

    post_amount(&client, &srv, account, "deposit", "1").await;
    let res = post_amount(&client, &srv, account, "withdraw", "1.000000000000000001").await;

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_balance");

    assert_eq!(balance(&client, &srv, account).await["balance"], "1.0");
    let events: serde_json::Value = client
        .get(srv.url("/events"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(events["head"], 1);
}

#[tokio::test]
async fn malformed_input_is_a_bad_request() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let account = AccountId::new();

    for amount in ["", "-1", "abc", "1.0000000000000000001"] {
        let res = post_amount(&client, &srv, account, "deposit", amount).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "amount {amount:?}");
    }

    let res = post_amount(&client, &srv, account, "deposit", "0").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/accounts/not-a-uuid/deposit"))
        .json(&json!({ "amount": "1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");

    let res = client
        .post(srv.url(&format!("/accounts/{account}/deposit")))
        .header("content-type", "application/json")
        .body("{\"amount\":")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn history_defaults_to_newest_first_and_honours_order() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let account = AccountId::new();

    post_amount(&client, &srv, account, "deposit", "3").await;
    post_amount(&client, &srv, account, "withdraw", "1").await;
    post_amount(&client, &srv, account, "deposit", "0.5").await;

    let body: serde_json::Value = client
        .get(srv.url(&format!("/accounts/{account}/history")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["order"], "desc");
    assert_eq!(body["complete"], true);
    let sequences: Vec<u64> = body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["sequence"].as_u64().unwrap())
        .collect();
    assert_eq!(sequences, vec![3, 2, 1]);

    let body: serde_json::Value = client
        .get(srv.url(&format!("/accounts/{account}/history?order=asc")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["entries"][0]["kind"], "deposit");
    assert_eq!(body["entries"][1]["kind"], "withdraw");
    assert_eq!(body["entries"][2]["amount"], "0.5");

    let res = client
        .get(srv.url(&format!("/accounts/{account}/history?order=sideways")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn events_can_be_filtered_and_paged() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let alice = AccountId::new();
    let bob = AccountId::new();

    post_amount(&client, &srv, alice, "deposit", "1").await;
    post_amount(&client, &srv, bob, "deposit", "2").await;
    post_amount(&client, &srv, alice, "withdraw", "0.5").await;
    post_amount(&client, &srv, alice, "deposit", "4").await;

    let body: serde_json::Value = client
        .get(srv.url(&format!("/events?account={alice}&kind=deposit")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let sequences: Vec<u64> = body["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["sequence"].as_u64().unwrap())
        .collect();
    assert_eq!(sequences, vec![1, 4]);
    assert_eq!(body["head"], 4);

    let first: serde_json::Value = client
        .get(srv.url("/events?limit=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["events"].as_array().unwrap().len(), 2);
    assert_eq!(first["next_after"], 2);

    let second: serde_json::Value = client
        .get(srv.url("/events?limit=2&after=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["events"][0]["sequence"], 3);
    assert_eq!(second["events"][1]["sequence"], 4);

    let res = client.get(srv.url("/events?from=3&to=1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client.get(srv.url("/events?kind=transfer")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn conservation_holds_after_mixed_traffic() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let accounts: Vec<AccountId> = (0..4).map(|_| AccountId::new()).collect();

    for (i, account) in accounts.iter().enumerate() {
        post_amount(&client, &srv, *account, "deposit", &format!("{}", i + 1)).await;
        post_amount(&client, &srv, *account, "withdraw", "0.25").await;
    }

    let body: serde_json::Value = client
        .get(srv.url("/audit/conservation"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["holds"], true);
    assert_eq!(body["accounts_checked"], 4);
    assert_eq!(body["total_deposited"], "10.0");
    assert_eq!(body["total_withdrawn"], "1.0");
    assert_eq!(body["total_held"], "9.0");
    assert!(body["mismatches"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn failed_payout_restores_balance() {
    let refuse = |_: AccountId, _: Amount| Err::<(), _>(PayoutError::rejected("bank offline"));
    let srv = TestServer::spawn_with(
        VaultConfig::default(),
        Arc::new(StaticPriceSource::fallback()),
        refuse,
    )
    .await;
    let client = reqwest::Client::new();
    let account = AccountId::new();

    post_amount(&client, &srv, account, "deposit", "2").await;
    let res = post_amount(&client, &srv, account, "withdraw", "1").await;

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "payout_failed");
    assert_eq!(balance(&client, &srv, account).await["balance"], "2.0");
}

#[tokio::test]
async fn prices_serve_live_values() {
    let srv = TestServer::spawn().await;

    let body: serde_json::Value = reqwest::get(srv.url("/prices?ids=bitcoin,ethereum"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["degraded"], false);
    assert_eq!(body["currency"], "usd");
    assert_eq!(body["prices"]["bitcoin"], 65000.0);
    assert_eq!(body["prices"]["ethereum"], 3500.0);
}

#[tokio::test]
async fn prices_degrade_to_fallback_when_source_is_down() {
    let config = VaultConfig {
        price_failure_threshold: 1,
        ..VaultConfig::default()
    };
    let srv = TestServer::spawn_with(config, Arc::new(DownPriceSource), LoggingPayout).await;
    let client = reqwest::Client::new();

    let body: serde_json::Value = client
        .get(srv.url("/prices?ids=bitcoin,dogecoin"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["degraded"], true);
    assert_eq!(body["prices"]["bitcoin"], 65000.0);
    assert!(body["prices"]["dogecoin"].is_null());
    assert!(body["last_error"].as_str().unwrap().contains("connection refused"));

    let body: serde_json::Value = client
        .get(srv.url("/prices?ids=bitcoin&vs_currency=eur"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["prices"]["bitcoin"].is_null());

    let body: serde_json::Value = client
        .post(srv.url("/prices/reset"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["consecutive_failures"], 1);
    assert_eq!(body["degraded"], true);
}
