//! Integration tests for the coupon board backend.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, DEFAULT_EXPIRY_PROBE_URL, DEFAULT_VERIFY_URL};
use crate::db::{init_database, Repository};
use crate::models::Verification;
use crate::service::{CouponService, ServiceSettings};
use crate::verifier::{Verifier, GIFT_SENT_MESSAGE};
use crate::{create_router, AppState};

/// Vendor stand-in: accepts every code unless told otherwise.
struct StubVerifier {
    rejected: HashSet<String>,
    expired: HashSet<String>,
    calls: AtomicUsize,
}

impl StubVerifier {
    fn accepting() -> Self {
        Self {
            rejected: HashSet::new(),
            expired: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Verifier for StubVerifier {
    async fn verify(&self, code: &str) -> Verification {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rejected.contains(code) {
            Verification::rejected("This coupon has expired.")
        } else {
            Verification::accepted(GIFT_SENT_MESSAGE)
        }
    }

    async fn is_expired(&self, code: &str) -> bool {
        self.expired.contains(code)
    }
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    verifier: Arc<StubVerifier>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with(StubVerifier::accepting(), None).await
    }

    async fn with(verifier: StubVerifier, admin_psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Repository::new(pool);

        let config = Config {
            admin_psk,
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            hive_id: "test_hive_id".to_string(),
            verify_url: DEFAULT_VERIFY_URL.to_string(),
            expiry_probe_url: DEFAULT_EXPIRY_PROBE_URL.to_string(),
            require_verification: true,
            max_reward_amount: 1_000_000.0,
            expiry_sweep_interval: None,
            expiry_probe_delay: Duration::ZERO,
        };

        let verifier = Arc::new(verifier);
        let service = CouponService::new(repo, verifier.clone(), ServiceSettings::from(&config));

        let state = AppState {
            service: Arc::new(service),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            verifier,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn add(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/add-coupon"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn vote(&self, body: Value) -> reqwest::Response {
        self.client
            .put(self.url("/vote-coupon"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

fn swq_submission() -> Value {
    json!({
        "code": "SWQFREE2024",
        "rewards": [{"type": "energy", "amount": 50}],
        "userHash": "user_k3j2h1g9f"
    })
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_add_coupon_then_duplicate() {
    let fixture = TestFixture::new().await;

    let create_resp = fixture.add(swq_submission()).await;
    assert_eq!(create_resp.status(), 201);
    let create_body: Value = create_resp.json().await.unwrap();
    assert_eq!(create_body["success"], true);
    assert_eq!(create_body["coupon"]["code"], "SWQFREE2024");
    assert_eq!(create_body["coupon"]["status"], "valid");
    assert_eq!(create_body["coupon"]["votes"], json!({"up": 0, "down": 0}));
    assert_eq!(create_body["coupon"]["rewards"], json!([{"type": "energy", "amount": 50}]));
    assert_eq!(create_body["coupon"]["submittedBy"], "user_k3j2h1g9f");
    assert_eq!(create_body["verification"]["isValid"], true);
    let coupon_id = create_body["coupon"]["id"].as_str().unwrap().to_string();

    // Same code in a different case and with padding
    let dup_resp = fixture
        .add(json!({
            "code": "  swqfree2024 ",
            "rewards": [{"type": "crystals", "amount": 100}]
        }))
        .await;
    assert_eq!(dup_resp.status(), 409);
    let dup_body: Value = dup_resp.json().await.unwrap();
    assert_eq!(dup_body["success"], false);
    assert_eq!(dup_body["error"]["code"], "DUPLICATE_CODE");
    assert_eq!(dup_body["existingCoupon"]["id"], coupon_id.as_str());
}

#[tokio::test]
async fn test_concurrent_submissions_store_one_record() {
    let fixture = TestFixture::new().await;

    let (left, right) = tokio::join!(fixture.add(swq_submission()), fixture.add(swq_submission()));
    let mut statuses = vec![left.status().as_u16(), right.status().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, vec![201, 409]);

    let (winner, loser) = if left.status() == 201 {
        (left, right)
    } else {
        (right, left)
    };
    let winner_body: Value = winner.json().await.unwrap();
    let loser_body: Value = loser.json().await.unwrap();
    assert_eq!(loser_body["existingCoupon"]["id"], winner_body["coupon"]["id"]);

    let list_body: Value = fixture
        .client
        .get(fixture.url("/get-coupons"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list_body["coupons"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rejected_code_returns_verification() {
    let mut verifier = StubVerifier::accepting();
    verifier.rejected.insert("EXPIRED2023".to_string());
    let fixture = TestFixture::with(verifier, None).await;

    let resp = fixture
        .add(json!({
            "code": "expired2023",
            "rewards": [{"type": "crystals", "amount": 200}]
        }))
        .await;

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VERIFICATION_FAILED");
    assert_eq!(body["verification"]["isValid"], false);
    assert_eq!(body["verification"]["message"], "This coupon has expired.");

    let list_body: Value = fixture
        .client
        .get(fixture.url("/get-coupons"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list_body["coupons"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_validation_errors() {
    let fixture = TestFixture::new().await;

    let bad_bodies = [
        json!({"rewards": [{"type": "energy", "amount": 50}]}),
        json!({"code": "ABC", "rewards": []}),
        json!({"code": 42, "rewards": [{"type": "energy", "amount": 50}]}),
        json!({"code": "A".repeat(51), "rewards": [{"type": "energy", "amount": 50}]}),
        json!({"code": "ABC", "rewards": [{"type": "energy", "amount": 0}]}),
        json!({"code": "ABC", "rewards": [{"type": "energy", "amount": "lots"}]}),
        json!({"code": "ABC", "rewards": [{"type": "energy", "amount": 2_000_000}]}),
    ];

    for body in bad_bodies {
        let resp = fixture.add(body.clone()).await;
        assert_eq!(resp.status(), 400, "{body}");
        let resp_body: Value = resp.json().await.unwrap();
        assert_eq!(resp_body["success"], false);
        assert_eq!(resp_body["error"]["code"], "VALIDATION_ERROR");
    }

    // Malformed JSON is a validation error too
    let resp = fixture
        .client
        .post(fixture.url("/add-coupon"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // The vendor is never asked about malformed submissions
    assert_eq!(fixture.verifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_list_newest_first() {
    let fixture = TestFixture::new().await;

    for code in ["FIRST", "SECOND", "THIRD"] {
        let resp = fixture
            .add(json!({"code": code, "rewards": [{"type": "energy", "amount": 10}]}))
            .await;
        assert_eq!(resp.status(), 201);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let resp = fixture
        .client
        .get(fixture.url("/get-coupons"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);

    let codes: Vec<&str> = body["coupons"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["THIRD", "SECOND", "FIRST"]);
}

#[tokio::test]
async fn test_vote_flow() {
    let fixture = TestFixture::new().await;

    let create_body: Value = fixture.add(swq_submission()).await.json().await.unwrap();
    let coupon_id = create_body["coupon"]["id"].as_str().unwrap().to_string();

    let up_resp = fixture
        .vote(json!({"couponId": coupon_id, "voteType": "up", "userHash": "user_1"}))
        .await;
    assert_eq!(up_resp.status(), 200);
    let up_body: Value = up_resp.json().await.unwrap();
    assert_eq!(up_body["success"], true);
    assert_eq!(up_body["coupon"]["votes"], json!({"up": 1, "down": 0}));

    let switch_resp = fixture
        .vote(json!({
            "couponId": coupon_id,
            "voteType": "down",
            "userHash": "user_1",
            "previousVote": "up"
        }))
        .await;
    assert_eq!(switch_resp.status(), 200);
    let switch_body: Value = switch_resp.json().await.unwrap();
    assert_eq!(switch_body["coupon"]["votes"], json!({"up": 0, "down": 1}));

    let retract_resp = fixture
        .vote(json!({
            "couponId": coupon_id,
            "voteType": "down",
            "previousVote": "down"
        }))
        .await;
    let retract_body: Value = retract_resp.json().await.unwrap();
    assert_eq!(retract_body["coupon"]["votes"], json!({"up": 0, "down": 0}));
}

#[tokio::test]
async fn test_vote_errors() {
    let fixture = TestFixture::new().await;

    let unknown = fixture
        .vote(json!({"couponId": "non-existent-id", "voteType": "up"}))
        .await;
    assert_eq!(unknown.status(), 404);
    let body: Value = unknown.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let bad_type = fixture
        .vote(json!({"couponId": "some-id", "voteType": "sideways"}))
        .await;
    assert_eq!(bad_type.status(), 400);

    let missing_id = fixture.vote(json!({"voteType": "up"})).await;
    assert_eq!(missing_id.status(), 400);
}

#[tokio::test]
async fn test_method_gating_and_preflight() {
    let fixture = TestFixture::new().await;

    let wrong_method = fixture
        .client
        .get(fixture.url("/add-coupon"))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_method.status(), 405);
    let body: Value = wrong_method.json().await.unwrap();
    assert_eq!(body["error"]["code"], "METHOD_NOT_ALLOWED");

    let wrong_vote_method = fixture
        .client
        .post(fixture.url("/vote-coupon"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_vote_method.status(), 405);

    let options = fixture
        .client
        .request(Method::OPTIONS, fixture.url("/get-coupons"))
        .header("origin", "https://coupons.example")
        .send()
        .await
        .unwrap();
    assert_eq!(options.status(), 200);
    assert_eq!(
        options.headers()["access-control-allow-origin"],
        "*"
    );
    assert!(options.text().await.unwrap().is_empty());

    let preflight = fixture
        .client
        .request(Method::OPTIONS, fixture.url("/vote-coupon"))
        .header("origin", "https://coupons.example")
        .header("access-control-request-method", "PUT")
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), 200);
    assert!(preflight
        .headers()
        .contains_key("access-control-allow-methods"));
}

#[tokio::test]
async fn test_function_style_routes() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/.netlify/functions/add-coupon"))
        .json(&swq_submission())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let list_body: Value = fixture
        .client
        .get(fixture.url("/.netlify/functions/get-coupons"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list_body["coupons"][0]["code"], "SWQFREE2024");
}

#[tokio::test]
async fn test_admin_expiry_requires_key() {
    let mut verifier = StubVerifier::accepting();
    verifier.expired.insert("OLDCODE".to_string());
    let fixture = TestFixture::with(verifier, Some("admin-secret".to_string())).await;

    for code in ["OLDCODE", "FRESHCODE"] {
        let resp = fixture
            .add(json!({"code": code, "rewards": [{"type": "energy", "amount": 30}]}))
            .await;
        assert_eq!(resp.status(), 201);
    }

    let no_key = fixture
        .client
        .post(fixture.url("/admin/expire-coupons"))
        .send()
        .await
        .unwrap();
    assert_eq!(no_key.status(), 401);
    let body: Value = no_key.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let wrong_key = fixture
        .client
        .post(fixture.url("/admin/expire-coupons"))
        .header("x-api-key", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_key.status(), 401);

    let dry_run = fixture
        .client
        .post(fixture.url("/admin/expire-coupons?dryRun=true"))
        .header("x-api-key", "admin-secret")
        .send()
        .await
        .unwrap();
    assert_eq!(dry_run.status(), 200);
    let dry_body: Value = dry_run.json().await.unwrap();
    assert_eq!(dry_body["dryRun"], true);
    assert_eq!(dry_body["expiredCount"], 1);

    let sweep = fixture
        .client
        .post(fixture.url("/admin/expire-coupons"))
        .bearer_auth("admin-secret")
        .send()
        .await
        .unwrap();
    assert_eq!(sweep.status(), 200);
    let sweep_body: Value = sweep.json().await.unwrap();
    assert_eq!(sweep_body["success"], true);
    assert_eq!(sweep_body["totalProcessed"], 2);
    assert_eq!(sweep_body["expiredCoupons"][0]["code"], "OLDCODE");

    let list_body: Value = fixture
        .client
        .get(fixture.url("/get-coupons"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let old = list_body["coupons"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["code"] == "OLDCODE")
        .unwrap();
    assert_eq!(old["status"], "expired");
    assert!(old["expiredOn"].is_string());
}

#[tokio::test]
async fn test_admin_expiry_rejects_bad_query() {
    let fixture =
        TestFixture::with(StubVerifier::accepting(), Some("admin-secret".to_string())).await;

    let resp = fixture
        .client
        .post(fixture.url("/admin/expire-coupons?dryRun=maybe"))
        .header("x-api-key", "admin-secret")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}
