//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use gotek_core::messaging::sign_body;
use gotek_core::models::{NewUser, TransactionFilter, User};
use gotek_core::RecordingSender;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const PHONE: &str = "6281234567890";

struct TestApp {
    app: Router,
    db: Database,
    config: ServerConfig,
    sender: RecordingSender,
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn test_config() -> ServerConfig {
    ServerConfig {
        webhook_verify_token: Some("verify-me".into()),
        ..ServerConfig::new("test-secret")
    }
}

fn setup_with(config: ServerConfig, ai: Option<AIClient>, sender: RecordingSender) -> TestApp {
    let db = Database::in_memory().unwrap();
    let options = RouterOptions {
        ai,
        messenger: Some(Messenger::Recording(sender.clone())),
        today: Some(today()),
    };
    TestApp {
        app: create_router_with_options(db.clone(), None, config.clone(), options),
        db,
        config,
        sender,
    }
}

fn setup_test_app() -> TestApp {
    setup_with(test_config(), None, RecordingSender::new())
}

fn register(db: &Database) -> User {
    db.create_user(&NewUser {
        name: "Sinta".into(),
        email: "sinta@example.com".into(),
        phone: "0812-3456-7890".into(),
        password: "nasi-uduk-123".into(),
    })
    .unwrap()
}

fn cookie_for(t: &TestApp, user: &User) -> String {
    let token = session::issue_token(&t.config, user).unwrap();
    format!("{}={}", session::SESSION_COOKIE, token)
}

async fn get_body_json(response: axum::response::Response) -> Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get_body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn send(t: &TestApp, method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    t.app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

fn text_delivery(id: &str, from: &str, text: &str) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA-1",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "messages": [{
                        "id": id,
                        "from": from,
                        "timestamp": "1791000000",
                        "type": "text",
                        "text": { "body": text }
                    }]
                }
            }]
        }]
    })
}

// ========== Health & Auth ==========

#[tokio::test]
async fn test_health_is_public() {
    let t = setup_with(test_config(), Some(AIClient::mock()), RecordingSender::new());

    let response = send(&t, "GET", "/api/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["ai"]["backend"], "mock");
    assert_eq!(json["whatsapp"], true);
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let t = setup_test_app();

    let response = send(&t, "GET", "/api/transactions", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Authentication required");

    let response = send(&t, "GET", "/api/summary", Some("gotek_session=not-a-jwt"), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A token signed with another secret is rejected
    let user = register(&t.db);
    let foreign = session::issue_token(&ServerConfig::new("other-secret"), &user).unwrap();
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header("authorization", format!("Bearer {}", foreign))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_sets_session_cookie() {
    let t = setup_test_app();
    let body = json!({
        "name": "Budi",
        "email": "Budi@Example.com",
        "phone": "+62 811-2222-3333",
        "password": "rahasia-budi"
    });

    let response = send(&t, "POST", "/api/auth/register", None, Some(body.clone())).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let cookie = response
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("gotek_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    let json = get_body_json(response).await;
    assert_eq!(json["email"], "budi@example.com");
    assert_eq!(json["phone"], "6281122223333");
    assert!(json.get("password_hash").is_none());

    // The cookie authenticates
    let session_pair = cookie.split(';').next().unwrap();
    let response = send(&t, "GET", "/api/auth/me", Some(session_pair), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["name"], "Budi");

    // Registering twice conflicts
    let response = send(&t, "POST", "/api/auth/register", None, Some(body)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let weak = json!({"name": "X", "email": "x@example.com", "phone": "081300000000", "password": "short"});
    let response = send(&t, "POST", "/api/auth/register", None, Some(weak)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_and_logout() {
    let t = setup_test_app();
    register(&t.db);

    let bad = json!({"identifier": "sinta@example.com", "password": "wrong-password"});
    let response = send(&t, "POST", "/api/auth/login", None, Some(bad)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Phone in local notation works as identifier
    let good = json!({"identifier": "081234567890", "password": "nasi-uduk-123"});
    let response = send(&t, "POST", "/api/auth/login", None, Some(good)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("set-cookie").is_some());
    assert_eq!(get_body_json(response).await["phone"], PHONE);

    let response = send(&t, "POST", "/api/auth/logout", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

// ========== Transactions & Budgets ==========

#[tokio::test]
async fn test_create_transaction_from_message_with_budget_alert() {
    let t = setup_test_app();
    let user = register(&t.db);
    let cookie = cookie_for(&t, &user);

    let response = send(
        &t,
        "POST",
        "/api/budgets",
        Some(&cookie),
        Some(json!({"category": "makanan & minuman", "amount": "100rb"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["amount"], 100_000);

    let response = send(
        &t,
        "POST",
        "/api/transactions",
        Some(&cookie),
        Some(json!({"message": "-85rb makan siang tim @Makanan & Minuman #OVO"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = get_body_json(response).await;
    assert_eq!(json["transaction"]["amount"], 85_000);
    assert_eq!(json["transaction"]["kind"], "expense");
    assert_eq!(json["transaction"]["payment_method"], "OVO");
    assert_eq!(json["transaction"]["source"], "dashboard");
    assert_eq!(json["transaction"]["date"], "2026-10-16");
    assert_eq!(json["budget"]["level"], "warning");
    assert!(json["budget_alert"].as_str().unwrap().contains("⚠️"));

    let response = send(&t, "GET", "/api/budgets/status?month=2026-10", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let reports = get_body_json(response).await;
    assert_eq!(reports[0]["status"]["spent"], 85_000);
    assert_eq!(reports[0]["month"], "2026-10");

    // Previous month has no spending
    let response = send(&t, "GET", "/api/budgets/status?month=2026-09", Some(&cookie), None).await;
    assert_eq!(get_body_json(response).await[0]["status"]["spent"], 0);

    let response = send(&t, "GET", "/api/budgets/status?month=oktober", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_budget() {
    let t = setup_test_app();
    let user = register(&t.db);
    let other = t
        .db
        .create_user(&NewUser {
            name: "Tono".into(),
            email: "tono@example.com".into(),
            phone: "081355556666".into(),
            password: "password-tono".into(),
        })
        .unwrap();
    let cookie = cookie_for(&t, &user);
    let other_cookie = cookie_for(&t, &other);

    let response = send(
        &t,
        "POST",
        "/api/budgets",
        Some(&cookie),
        Some(json!({"category": "Transportasi", "amount": "500rb"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let id = get_body_json(response).await["id"].as_i64().unwrap();
    let uri = format!("/api/budgets/{}", id);

    // Another user's budget looks missing
    let response = send(&t, "DELETE", &uri, Some(&other_cookie), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(t.db.list_budgets(user.id).unwrap().len(), 1);

    let response = send(&t, "DELETE", &uri, Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["success"], true);
    assert_eq!(t.db.list_audit_log(1).unwrap()[0].action, "delete");

    let response = send(&t, "GET", "/api/budgets", Some(&cookie), None).await;
    assert!(get_body_json(response).await.as_array().unwrap().is_empty());

    let response = send(&t, "DELETE", &uri, Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_transaction_structured() {
    let t = setup_test_app();
    let user = register(&t.db);
    let cookie = cookie_for(&t, &user);
    let gaji = t
        .db
        .find_category(user.id, "Gaji", gotek_core::models::TransactionType::Income)
        .unwrap()
        .unwrap();

    let response = send(
        &t,
        "POST",
        "/api/transactions",
        Some(&cookie),
        Some(json!({
            "kind": "income",
            "amount": 8_000_000,
            "category_id": gaji.id,
            "date": "2026-10-01"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = get_body_json(response).await;
    assert_eq!(json["transaction"]["category_name"], "Gaji");
    assert_eq!(json["transaction"]["description"], "Gaji");
    assert!(json["budget"].is_null());

    // Income category on an expense
    let response = send(
        &t,
        "POST",
        "/api/transactions",
        Some(&cookie),
        Some(json!({"kind": "expense", "amount": 10_000, "category_id": gaji.id})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown tag creates the category
    let response = send(
        &t,
        "POST",
        "/api/transactions",
        Some(&cookie),
        Some(json!({"kind": "expense", "amount": "45k", "category": "Hewan Peliharaan", "description": "pakan kucing"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        get_body_json(response).await["transaction"]["category_name"],
        "Hewan Peliharaan"
    );

    let response = send(
        &t,
        "POST",
        "/api/transactions",
        Some(&cookie),
        Some(json!({"message": "tadi jajan banyak banget"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_transactions_clamps_and_isolates() {
    let t = setup_test_app();
    let user = register(&t.db);
    let other = t
        .db
        .create_user(&NewUser {
            name: "Tono".into(),
            email: "tono@example.com".into(),
            phone: "081355556666".into(),
            password: "password-tono".into(),
        })
        .unwrap();
    let cookie = cookie_for(&t, &user);
    let other_cookie = cookie_for(&t, &other);

    for message in ["-20rb parkir @Transportasi", "-15rb kopi", "+1jt bonus @Bonus"] {
        let response = send(&t, "POST", "/api/transactions", Some(&cookie), Some(json!({"message": message}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = send(&t, "GET", "/api/transactions?limit=100000", Some(&cookie), None).await;
    let json = get_body_json(response).await;
    assert_eq!(json["limit"], MAX_PAGE_LIMIT);
    assert_eq!(json["total"], 3);

    let response = send(&t, "GET", "/api/transactions?kind=expense&limit=1", Some(&cookie), None).await;
    let json = get_body_json(response).await;
    assert_eq!(json["total"], 2);
    assert_eq!(json["transactions"].as_array().unwrap().len(), 1);

    // Another user sees nothing and cannot fetch or delete
    let response = send(&t, "GET", "/api/transactions", Some(&other_cookie), None).await;
    assert_eq!(get_body_json(response).await["total"], 0);

    let first_id = t
        .db
        .list_transactions(user.id, &TransactionFilter::default())
        .unwrap()[0]
        .id;
    let uri = format!("/api/transactions/{}", first_id);
    let response = send(&t, "GET", &uri, Some(&other_cookie), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = send(&t, "DELETE", &uri, Some(&other_cookie), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&t, "DELETE", &uri, Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&t, "GET", &uri, Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_summary_and_export() {
    let t = setup_test_app();
    let user = register(&t.db);
    let cookie = cookie_for(&t, &user);

    for message in ["+5jt gaji @Gaji", "-1,2jt kos @Tagihan", "-300rb belanja @Belanja"] {
        send(&t, "POST", "/api/transactions", Some(&cookie), Some(json!({"message": message}))).await;
    }

    let response = send(&t, "GET", "/api/summary", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["month"], "2026-10");
    assert_eq!(json["income"], 5_000_000);
    assert_eq!(json["expense"], 1_500_000);
    assert_eq!(json["balance"], 3_500_000);

    let response = send(&t, "GET", "/api/export/transactions?month=2026-10", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/csv; charset=utf-8"
    );
    let csv = get_body_text(response).await;
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.contains("Tagihan"));
}

// ========== Categories & Debts ==========

#[tokio::test]
async fn test_category_lifecycle() {
    let t = setup_test_app();
    let user = register(&t.db);
    let cookie = cookie_for(&t, &user);

    let response = send(&t, "GET", "/api/categories?kind=income", Some(&cookie), None).await;
    let income = get_body_json(response).await;
    assert_eq!(income.as_array().unwrap().len(), 4);

    let body = json!({"name": "Sedekah", "kind": "expense"});
    let response = send(&t, "POST", "/api/categories", Some(&cookie), Some(body.clone())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = get_body_json(response).await["id"].as_i64().unwrap();

    let response = send(&t, "POST", "/api/categories", Some(&cookie), Some(body)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // In use: refused
    send(&t, "POST", "/api/transactions", Some(&cookie), Some(json!({"message": "-50rb jumat berkah @Sedekah"}))).await;
    let uri = format!("/api/categories/{}", id);
    let response = send(&t, "DELETE", &uri, Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_debt_lifecycle() {
    let t = setup_test_app();
    let user = register(&t.db);
    let cookie = cookie_for(&t, &user);

    let response = send(
        &t,
        "POST",
        "/api/debts",
        Some(&cookie),
        Some(json!({"message": "hutang 200rb ke Andi beli tiket !2026-10-20"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let debt = get_body_json(response).await;
    assert_eq!(debt["kind"], "payable");
    assert_eq!(debt["counterparty"], "Andi");
    assert_eq!(debt["due_date"], "2026-10-20");
    let id = debt["id"].as_i64().unwrap();

    let response = send(
        &t,
        "POST",
        "/api/debts",
        Some(&cookie),
        Some(json!({"kind": "receivable", "counterparty": "Rudi", "amount": "750rb"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let pay_uri = format!("/api/debts/{}/pay", id);
    let response = send(&t, "POST", &pay_uri, Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["status"], "paid");

    let response = send(&t, "POST", &pay_uri, Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(&t, "GET", "/api/debts?status=unpaid", Some(&cookie), None).await;
    let unpaid = get_body_json(response).await;
    assert_eq!(unpaid.as_array().unwrap().len(), 1);
    assert_eq!(unpaid[0]["counterparty"], "Rudi");

    let response = send(&t, "GET", "/api/debts?status=lunas", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== WhatsApp Webhook ==========

#[tokio::test]
async fn test_webhook_verification() {
    let t = setup_test_app();

    let uri = "/api/webhook/whatsapp?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444";
    let response = send(&t, "GET", uri, None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_text(response).await, "1158201444");

    let uri = "/api/webhook/whatsapp?hub.mode=subscribe&hub.verify_token=guess&hub.challenge=1";
    let response = send(&t, "GET", uri, None, None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_webhook_records_and_replies_once() {
    let t = setup_test_app();
    let user = register(&t.db);

    let delivery = text_delivery("wamid.AAA1", PHONE, "-25rb kopi susu @Makanan & Minuman");
    let response = send(&t, "POST", "/api/webhook/whatsapp", None, Some(delivery.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let ack = get_body_json(response).await;
    assert_eq!(ack["processed"], 1);

    let sent = t.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, PHONE);
    assert!(sent[0].body.contains("Rp25.000"));

    // Meta redelivers the same message id
    let response = send(&t, "POST", "/api/webhook/whatsapp", None, Some(delivery)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["duplicates"], 1);
    assert_eq!(t.sender.sent().len(), 1);
    assert_eq!(
        t.db
            .count_transactions(user.id, &TransactionFilter::default())
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_webhook_unknown_number_and_unsupported_type() {
    let t = setup_test_app();

    let delivery = text_delivery("wamid.BBB1", "6289900001111", "-10rb parkir");
    send(&t, "POST", "/api/webhook/whatsapp", None, Some(delivery)).await;

    let mut sticker = text_delivery("wamid.BBB2", "6289900001111", "");
    sticker["entry"][0]["changes"][0]["value"]["messages"][0]["type"] = json!("sticker");
    let response = send(&t, "POST", "/api/webhook/whatsapp", None, Some(sticker)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let sent = t.sender.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].body.contains("belum terdaftar"));
    assert!(sent[1].body.contains("teks dan foto"));
}

#[tokio::test]
async fn test_webhook_signature_required_when_configured() {
    let config = ServerConfig {
        webhook_app_secret: Some("app-secret".into()),
        ..test_config()
    };
    let t = setup_with(config, None, RecordingSender::new());
    register(&t.db);

    let body = text_delivery("wamid.CCC1", PHONE, "-12rb roti").to_string();

    let response = send(&t, "POST", "/api/webhook/whatsapp", None, Some(serde_json::from_str(&body).unwrap())).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/webhook/whatsapp")
                .header("content-type", "application/json")
                .header("x-hub-signature-256", sign_body("app-secret", body.as_bytes()))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["processed"], 1);
}

#[tokio::test]
async fn test_webhook_receipt_photo() {
    let t = setup_with(
        test_config(),
        Some(AIClient::mock()),
        RecordingSender::with_media(b"\xff\xd8\xff\xe0receipt"),
    );
    let user = register(&t.db);

    let delivery = json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA-1",
            "changes": [{
                "field": "messages",
                "value": {
                    "messages": [{
                        "id": "wamid.DDD1",
                        "from": PHONE,
                        "type": "image",
                        "image": { "id": "media-77", "mime_type": "image/jpeg", "caption": "indomaret" }
                    }]
                }
            }]
        }]
    });
    let response = send(&t, "POST", "/api/webhook/whatsapp", None, Some(delivery)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let transactions = t
        .db
        .list_transactions(user.id, &TransactionFilter::default())
        .unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].amount, 50_000);
    assert_eq!(transactions[0].description, "indomaret");
    assert_eq!(transactions[0].source, gotek_core::models::TransactionSource::Ai);
    assert!(t.sender.sent()[0].body.contains("🤖"));
}
