use std::sync::Arc;
use std::time::Duration;

use procura_ai::TemplateTextGenerator;
use procura_api::app::{self, AppServices};
use procura_core::{Money, VendorId};
use procura_events::{EventEnvelope, InMemoryEventBus};
use procura_infra::pipeline::CycleEvent;
use procura_infra::{
    InMemoryProcurementStore, PipelineContext, PipelineSettings, ProcurementStore,
    RecordingTransport, RetryPolicy,
};
use procura_purchasing::VendorOffer;
use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    store: Arc<InMemoryProcurementStore>,
    transport: Arc<RecordingTransport>,
    /// The pricier, faster vendor.
    v1: VendorId,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// One low-stock item offered by two approved vendors, served from an ephemeral port.
    async fn spawn() -> Self {
        let store = Arc::new(InMemoryProcurementStore::new());
        store.add_analyst_report(20.0, "demand rising").unwrap();
        let usd = |units| Money::from_major(units).unwrap();
        let item = store.add_item("Item A", 5, 20, usd(9)).unwrap();
        let mut vendors = Vec::new();
        for (name, email, lead, price, rating) in [
            ("V1", "v1@vendors.test", 5, 10, 4.0),
            ("V2", "v2@vendors.test", 7, 8, 3.0),
        ] {
            let vendor = store.add_vendor(name, email, true, lead).unwrap();
            store
                .add_offer(VendorOffer {
                    item_id: item,
                    vendor_id: vendor,
                    unit_price: usd(price),
                    rating,
                })
                .unwrap();
            vendors.push(vendor);
        }

        let transport = Arc::new(RecordingTransport::new());
        let settings = PipelineSettings {
            quote_cooldown: Duration::ZERO,
            store_retry: RetryPolicy::no_retry(),
            text_retry: RetryPolicy::no_retry(),
            ..PipelineSettings::default()
        };
        let ctx = PipelineContext::new(
            store.clone(),
            Arc::new(TemplateTextGenerator::new()),
            transport.clone(),
            Arc::new(InMemoryEventBus::<EventEnvelope<CycleEvent>>::new()),
            settings,
        );

        // Same router as prod, bound to an ephemeral port.
        let app = app::build_app(Arc::new(AppServices::new(ctx)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            transport,
            v1: vendors[0],
            handle,
        }
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

async fn run_cycle(client: &reqwest::Client, server: &TestServer) -> Value {
    let res = client.post(server.url("/cycles")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let res = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn purchase_flows_through_the_api() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let first = run_cycle(&client, &server).await;
    assert_eq!(first["status"], "AWAITING_QUOTES");
    assert_eq!(first["rfqs_sent"], 2);

    for rfq in server.store.rfqs().unwrap() {
        let (price, days) = if rfq.vendor_id == server.v1 { (10.0, 5) } else { (8.0, 7) };
        let res = client
            .post(server.url("/quotes"))
            .json(&json!({
                "rfq_id": rfq.id,
                "price": price,
                "delivery_days": days,
                "validity_days": 30,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let quote: Value = res.json().await.unwrap();
        assert_eq!(quote["status"], "RECEIVED");
    }

    let second = run_cycle(&client, &server).await;
    assert_eq!(second["status"], "PARTIAL");
    assert_eq!(second["quotes_received"], 2);
    assert_eq!(second["items"][0]["status"], "awaiting_approval");

    let res = client.get(server.url("/approvals")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let pending: Value = res.json().await.unwrap();
    let items = pending["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["status"], "PENDING");
    let approval_id = items[0]["id"].as_i64().unwrap();

    let res = client
        .post(server.url(&format!("/approvals/{approval_id}/decision")))
        .json(&json!({ "decision": "approve", "decided_by": "dana" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let decided: Value = res.json().await.unwrap();
    assert_eq!(decided["status"], "APPROVED");
    assert_eq!(decided["decided_by"], "dana");

    let done = run_cycle(&client, &server).await;
    assert_eq!(done["status"], "COMPLETED");
    assert_eq!(done["steps_completed"], 7);
    assert_eq!(done["amount"], 152.0);
    assert_eq!(done["logistics_status"], "IN_TRANSIT");
    assert!(done["po_number"].as_str().unwrap().starts_with("PO-"));
    assert_eq!(server.transport.sent_to("logistics@company.com").len(), 1);

    // A decided approval cannot be decided again.
    let res = client
        .post(server.url(&format!("/approvals/{approval_id}/decision")))
        .json(&json!({ "decision": "reject", "decided_by": "dana" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "illegal_transition");

    let res = client
        .get(server.url("/decisions?limit=2"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ledger: Value = res.json().await.unwrap();
    let entries = ledger["items"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["agent_name"], "Procurement Agent - Logistics Handoff");

    // The carrier reports delivery; the round closes and the item is sourced again.
    let shipment = server
        .store
        .shipment_for_po(done["po_number"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    let res = client
        .post(server.url(&format!("/shipments/{}/status", shipment.id)))
        .json(&json!({ "status": "DELIVERED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let delivered: Value = res.json().await.unwrap();
    assert_eq!(delivered["status"], "DELIVERED");
    assert_eq!(delivered["quantity"], 19);

    let res = client
        .get(server.url(&format!("/shipments/{}", shipment.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: Value = res.json().await.unwrap();
    assert_eq!(fetched["status"], "DELIVERED");

    let res = client
        .post(server.url(&format!("/shipments/{}/status", shipment.id)))
        .json(&json!({ "status": "IN_TRANSIT" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "illegal_transition");

    let next = run_cycle(&client, &server).await;
    assert_eq!(next["status"], "AWAITING_QUOTES");
    assert_eq!(next["rfqs_sent"], 2);
}

#[tokio::test]
async fn bad_requests_are_reported_as_json_errors() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/quotes"))
        .json(&json!({ "rfq_id": 999, "price": 8.0, "delivery_days": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");

    let res = client
        .post(server.url("/approvals/abc/decision"))
        .json(&json!({ "decision": "approve", "decided_by": "dana" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(server.url("/approvals/1/decision"))
        .json(&json!({ "decision": "approve", "decided_by": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .post(server.url("/approvals/42/decision"))
        .json(&json!({ "decision": "approve", "decided_by": "dana" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(server.url("/shipments/42/status"))
        .json(&json!({ "status": "DELIVERED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(server.url("/shipments/1/status"))
        .json(&json!({ "status": "LOST" }))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_client_error());
}

#[tokio::test]
async fn reconcile_with_nothing_stuck_flags_nothing() {
    let server = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .post(server.url("/intents/reconcile"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["flagged"], json!([]));
}

#[tokio::test]
async fn store_outage_is_service_unavailable() {
    let server = TestServer::spawn().await;
    server.store.set_unavailable(true);
    let res = reqwest::get(server.url("/approvals")).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "store_unavailable");
}
