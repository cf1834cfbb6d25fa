use chrono::{Duration as ChronoDuration, Utc};
use defter_auth::{JwtClaims, PrincipalId, Role};
use defter_core::TenantId;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = defter_api::app::build_app(jwt_secret.to_string());
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
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, tenant_id: TenantId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        tenant_id,
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

struct Client {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl Client {
    fn new(srv: &TestServer, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: srv.base_url.clone(),
            token,
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn patch(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.http
            .patch(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .send()
            .await
            .unwrap()
    }

    async fn create_product(&self, sku: &str, quantity: i64, critical: i64) -> String {
        let res = self
            .post(
                "/products",
                json!({
                    "sku": sku,
                    "name": format!("Product {sku}"),
                    "quantity": quantity,
                    "critical_stock_level": critical,
                }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: serde_json::Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_customer(&self, name: &str) -> String {
        let res = self
            .post("/parties", json!({ "kind": "customer", "name": name }))
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: serde_json::Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_cash_account(&self, name: &str, opening: i64) -> String {
        let res = self
            .post(
                "/accounts",
                json!({ "name": name, "kind": "cash", "opening_balance": opening }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: serde_json::Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_sale_invoice(
        &self,
        number: &str,
        customer_id: &str,
        product_id: &str,
        quantity: i64,
        unit_price: i64,
    ) -> serde_json::Value {
        let due = (Utc::now() + ChronoDuration::days(30)).to_rfc3339();
        let res = self
            .post(
                "/invoices",
                json!({
                    "invoice_number": number,
                    "partner": { "kind": "customer", "id": customer_id },
                    "kind": "sale",
                    "line_items": [{
                        "product_id": product_id,
                        "quantity": quantity,
                        "unit_price": unit_price,
                    }],
                    "due_date": due,
                }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        res.json().await.unwrap()
    }
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);
    let client = Client::new(&srv, token);

    let res = client.get("/whoami").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn invoice_lifecycle_end_to_end() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let admin = Client::new(&srv, mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]));

    let product_id = admin.create_product("SKU-1", 10, 0).await;
    let customer_id = admin.create_customer("Acme").await;
    let account_id = admin.create_cash_account("Till", 0).await;

    let invoice = admin
        .create_sale_invoice("INV-1", &customer_id, &product_id, 2, 100)
        .await;
    let invoice_id = invoice["id"].as_str().unwrap();
    assert_eq!(invoice["status"], "draft");
    assert_eq!(invoice["total_amount"], 200);

    // Approve: stock 10 -> 8, one outbound movement.
    let res = admin.post(&format!("/invoices/{invoice_id}/approve"), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let approved: serde_json::Value = res.json().await.unwrap();
    assert_eq!(approved["status"], "approved");

    let res = admin.get(&format!("/products/{product_id}")).await;
    let product: serde_json::Value = res.json().await.unwrap();
    assert_eq!(product["quantity"], 8);

    let res = admin
        .get(&format!("/reports/stock-movements?product_id={product_id}"))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let movements: serde_json::Value = res.json().await.unwrap();
    assert_eq!(movements["items"].as_array().unwrap().len(), 1);
    assert_eq!(movements["items"][0]["direction"], "out");
    assert_eq!(movements["items"][0]["quantity"], 2);

    // Double approval is a business-rule violation.
    let res = admin.post(&format!("/invoices/{invoice_id}/approve"), json!({})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Collect the full amount: invoice paid, account credited.
    let res = admin
        .post(
            &format!("/invoices/{invoice_id}/collect"),
            json!({ "account_id": account_id, "amount": 200 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let settled: serde_json::Value = res.json().await.unwrap();
    assert_eq!(settled["invoice"]["status"], "paid");
    assert_eq!(settled["account"]["balance"], 200);
    assert_eq!(settled["transaction"]["kind"], "income");

    // The transaction shows up in the ledger listing.
    let res = admin.get("/transactions").await;
    let transactions: serde_json::Value = res.json().await.unwrap();
    assert_eq!(transactions["items"].as_array().unwrap().len(), 1);

    // Dashboard aggregates without side effects.
    let res = admin.get("/dashboard/summary").await;
    assert_eq!(res.status(), StatusCode::OK);
    let summary: serde_json::Value = res.json().await.unwrap();
    assert_eq!(summary["monthly"]["current"]["income"], 200);
}

#[tokio::test]
async fn non_admin_cannot_run_admin_transitions() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let admin = Client::new(&srv, mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]));
    let staff = Client::new(&srv, mint_jwt(jwt_secret, tenant_id, vec![Role::new("staff")]));

    let product_id = admin.create_product("SKU-1", 10, 0).await;
    let customer_id = admin.create_customer("Acme").await;
    let invoice = staff
        .create_sale_invoice("INV-1", &customer_id, &product_id, 1, 100)
        .await;
    let invoice_id = invoice["id"].as_str().unwrap();

    let res = staff.post(&format!("/invoices/{invoice_id}/approve"), json!({})).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = staff
        .patch(
            &format!("/invoices/{invoice_id}/status"),
            json!({ "status": "canceled" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = admin.post(&format!("/invoices/{invoice_id}/approve"), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn insufficient_stock_rejects_approval_without_mutation() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let admin = Client::new(&srv, mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]));

    let product_id = admin.create_product("SKU-1", 1, 0).await;
    let customer_id = admin.create_customer("Acme").await;
    let invoice = admin
        .create_sale_invoice("INV-1", &customer_id, &product_id, 5, 100)
        .await;
    let invoice_id = invoice["id"].as_str().unwrap();

    let res = admin.post(&format!("/invoices/{invoice_id}/approve"), json!({})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "business_rule");

    let res = admin.get(&format!("/products/{product_id}")).await;
    let product: serde_json::Value = res.json().await.unwrap();
    assert_eq!(product["quantity"], 1);
}

#[tokio::test]
async fn critical_stock_notification_appears_after_approval() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let admin = Client::new(&srv, mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]));

    let product_id = admin.create_product("SKU-1", 10, 9).await;
    let customer_id = admin.create_customer("Acme").await;
    let invoice = admin
        .create_sale_invoice("INV-1", &customer_id, &product_id, 2, 100)
        .await;
    let invoice_id = invoice["id"].as_str().unwrap();

    admin.post(&format!("/invoices/{invoice_id}/approve"), json!({})).await;

    let res = admin.get("/notifications").await;
    let notifications: serde_json::Value = res.json().await.unwrap();
    let items = notifications["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["kind"], "critical_stock");
    assert_eq!(items[0]["read"], false);
}

#[tokio::test]
async fn tenants_are_isolated_from_each_other() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_a = Client::new(&srv, mint_jwt(jwt_secret, TenantId::new(), vec![Role::new("admin")]));
    let tenant_b = Client::new(&srv, mint_jwt(jwt_secret, TenantId::new(), vec![Role::new("admin")]));

    let product_id = tenant_a.create_product("SKU-1", 10, 0).await;

    let res = tenant_b.get(&format!("/products/{product_id}")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = tenant_b.get("/products").await;
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn transfer_endpoint_moves_balances() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let admin = Client::new(&srv, mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]));

    let source = admin.create_cash_account("Source", 500).await;
    let target = admin.create_cash_account("Target", 0).await;

    let res = admin
        .post(
            "/accounts/transfer",
            json!({
                "source_account_id": source,
                "target_account_id": target,
                "amount": 200,
                "description": "float",
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["source"]["balance"], 300);
    assert_eq!(body["target"]["balance"], 300);
    assert_eq!(body["transaction"]["kind"], "transfer");

    // Same-account and insufficient-balance transfers are rejected.
    let res = admin
        .post(
            "/accounts/transfer",
            json!({
                "source_account_id": source,
                "target_account_id": source,
                "amount": 10,
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = admin
        .post(
            "/accounts/transfer",
            json!({
                "source_account_id": source,
                "target_account_id": target,
                "amount": 10_000,
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
