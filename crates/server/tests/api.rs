use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use db::{DBService, models::role::CreateRole, models::user::CreateUser};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use server::{AppState, app};
use services::services::{
    bootstrap,
    config::{AdminSeed, AppConfig},
    roles::RoleService,
    users::UserService,
};
use tower::ServiceExt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    layer::{Context, Layer, SubscriberExt},
    registry::Registry,
};

const ADMIN_EMAIL: &str = "admin@constructora.pe";
const ADMIN_PASSWORD: &str = "admin-obra-2025";
const VIEWER_EMAIL: &str = "residente@constructora.pe";
const VIEWER_PASSWORD: &str = "residente-2025";

struct TestApp {
    router: Router,
    admin: String,
    viewer: String,
}

impl TestApp {
    async fn new() -> Self {
        let db = DBService::new_in_memory().await.unwrap();
        let seed = AdminSeed {
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
        };
        bootstrap::run(&db.pool, Some(&seed)).await.unwrap().unwrap();

        let role = RoleService::new(db.pool.clone())
            .create(&CreateRole {
                name: "Residente".to_string(),
                description: None,
                permissions: vec!["obras.view".to_string(), "categorias.view".to_string()],
            })
            .await
            .unwrap();
        UserService::new(db.pool.clone())
            .create(&CreateUser {
                name: "Residente de obra".to_string(),
                email: VIEWER_EMAIL.to_string(),
                password: VIEWER_PASSWORD.to_string(),
                role_id: role.role.id,
                active: None,
            })
            .await
            .unwrap();

        let router = app(AppState::new(db, AppConfig::for_tests()));
        let mut test_app = Self {
            router,
            admin: String::new(),
            viewer: String::new(),
        };
        test_app.admin = test_app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        test_app.viewer = test_app.login(VIEWER_EMAIL, VIEWER_PASSWORD).await;
        test_app
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(&self.admin), None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(&self.admin), Some(body)).await
    }

    /// POST that must succeed; returns the new record's id
    async fn create(&self, uri: &str, body: Value) -> String {
        let (status, body) = self.post(uri, body).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(&self.admin), None).await
    }
}

fn obra(code: &str) -> Value {
    json!({
        "code": code,
        "name": "Edificio multifamiliar Los Olivos",
        "client": "Inmobiliaria Norte",
        "location": "Lima",
        "start_date": "2025-03-01",
        "end_date": "2025-12-15",
        "budget": 850000.0
    })
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert!(body["data"]["database"]["migrations_applied"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn login_with_wrong_password_is_401() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "nope-nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn me_reports_permissions() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(Method::GET, "/api/auth/me", Some(&app.viewer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], VIEWER_EMAIL);
    assert_eq!(body["data"]["is_admin"], false);
    let permissions = body["data"]["permissions"].as_array().unwrap();
    assert!(permissions.contains(&json!("obras.view")));
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn missing_or_bad_token_is_401() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/api/obras", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, _) = app
        .send(Method::GET, "/api/obras", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_permission_is_403() {
    let app = TestApp::new().await;
    let (status, _) = app
        .send(Method::GET, "/api/obras", Some(&app.viewer), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::POST, "/api/obras", Some(&app.viewer), Some(obra("OB-403")))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = app
        .send(Method::GET, "/api/users", Some(&app.viewer), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn token_in_query_string_only_for_get() {
    let app = TestApp::new().await;
    let uri = format!("/api/obras?token={}", app.admin);
    let (status, _) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(Method::POST, &uri, None, Some(obra("OB-Q1"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn created_obra_matches_input() {
    let app = TestApp::new().await;
    let (status, body) = app.post("/api/obras", obra("OB-2025-01")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert_eq!(data["code"], "OB-2025-01");
    assert_eq!(data["name"], "Edificio multifamiliar Los Olivos");
    assert_eq!(data["client"], "Inmobiliaria Norte");
    assert_eq!(data["start_date"], "2025-03-01");
    assert_eq!(data["budget"], 850000.0);
    assert_eq!(data["status"], "planned");

    let id = data["id"].as_str().unwrap();
    let (status, body) = app.get(&format!("/api/obras/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["code"], "OB-2025-01");
}

#[tokio::test]
async fn duplicate_obra_code_is_422() {
    let app = TestApp::new().await;
    app.post("/api/obras", obra("OB-DUP")).await;
    let (status, body) = app.post("/api/obras", obra("ob-dup")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_failed");
    assert_eq!(body["errors"]["code"][0], "The code has already been taken.");
}

#[tokio::test]
async fn duplicate_category_name_is_422() {
    let app = TestApp::new().await;
    let category = json!({ "name": "Agregados", "description": "Arena, piedra chancada" });
    let (status, _) = app.post("/api/categories", category.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.post("/api/categories", category).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["name"][0], "The name has already been taken.");
}

#[tokio::test]
async fn list_reports_unfiltered_total_and_respects_window() {
    let app = TestApp::new().await;
    for name in ["Cemento", "Acero", "Agregados"] {
        let (status, _) = app.post("/api/categories", json!({ "name": name })).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app.get("/api/categories?lower_bound=0&upper_bound=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = app.get("/api/categories?lower_bound=2&upper_bound=10").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = app.get("/api/categories?search=acer").await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["name"], "Acero");
}

#[tokio::test]
async fn inverted_window_is_422() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/categories?lower_bound=5&upper_bound=5").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["upper_bound"].is_array());
}

#[tokio::test]
async fn deleting_a_referenced_obra_is_409_and_keeps_it() {
    let app = TestApp::new().await;
    let (_, body) = app.post("/api/obras", obra("OB-REF")).await;
    let obra_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .post("/api/positions", json!({ "name": "Operario", "daily_rate": 95.0 }))
        .await;
    let position_id = body["data"]["id"].as_str().unwrap().to_string();
    let (status, body) = app
        .post(
            "/api/workers",
            json!({
                "document_number": "45871236",
                "first_name": "Juan",
                "last_name": "Quispe",
                "position_id": position_id,
                "obra_id": obra_id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app.delete(&format!("/api/obras/{obra_id}")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("trabajadores"));

    let (status, _) = app.get(&format!("/api/obras/{obra_id}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unreferenced_obra_is_deleted() {
    let app = TestApp::new().await;
    let (_, body) = app.post("/api/obras", obra("OB-DEL")).await;
    let obra_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app.delete(&format!("/api/obras/{obra_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = app.delete(&format!("/api/obras/{obra_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn malformed_body_and_path_are_enveloped() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/categories")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.admin))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let (status, body) = app.dispatch(request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["body"].is_array());

    let (status, body) = app.get("/api/categories/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn antamina_quotation_totals() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post(
            "/api/quotations",
            json!({
                "client_name": "Compañía Minera Antamina S.A.",
                "variant": "antamina",
                "contract_number": "CT-2025-044",
                "area": "Chancado primario",
                "issue_date": "2025-08-01",
                "items": [
                    { "description": "Encofrado", "unit": "m2", "quantity": 40.0, "unit_price": 50.0 },
                    { "description": "Concreto", "unit": "m3", "quantity": 5.0, "unit_price": 400.0 }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert_eq!(data["number"], "COT-000001");
    assert_eq!(data["direct_cost"], 4000.0);
    assert_eq!(data["overhead"], 400.0);
    assert_eq!(data["utility"], 200.0);
    assert_eq!(data["total"], 5428.0);
    assert_eq!(data["items"].as_array().unwrap().len(), 2);

    let id = data["id"].as_str().unwrap();
    let (status, _) = app
        .post(&format!("/api/quotations/{id}/status"), json!({ "status": "approved" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .post(&format!("/api/quotations/{id}/status"), json!({ "status": "archived" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["body"].is_array());
}

fn worker(document_number: &str, position_id: &str) -> Value {
    json!({
        "document_number": document_number,
        "first_name": "Luis",
        "last_name": "Condori",
        "position_id": position_id,
    })
}

async fn assert_delete_conflict(app: &TestApp, uri: &str) {
    let (status, body) = app.delete(uri).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"], "conflict");
    let (status, _) = app.get(uri).await;
    assert_eq!(status, StatusCode::OK, "{uri} must survive the failed delete");
}

#[tokio::test]
async fn category_with_products_is_not_deleted() {
    let app = TestApp::new().await;
    let category_id = app.create("/api/categories", json!({ "name": "Cemento" })).await;
    let product_id = app
        .create(
            "/api/products",
            json!({
                "category_id": category_id,
                "code": "CEM-SOL-42",
                "name": "Cemento Sol tipo I 42.5 kg",
                "unit": "bls",
                "unit_price": 28.5,
            }),
        )
        .await;

    assert_delete_conflict(&app, &format!("/api/categories/{category_id}")).await;

    let (status, _) = app.delete(&format!("/api/products/{product_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&format!("/api/categories/{category_id}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn product_used_by_requirement_is_not_deleted() {
    let app = TestApp::new().await;
    let obra_id = app.create("/api/obras", obra("OB-PRD")).await;
    let category_id = app.create("/api/categories", json!({ "name": "Acero" })).await;
    let product_id = app
        .create(
            "/api/products",
            json!({
                "category_id": category_id,
                "code": "FIE-1/2",
                "name": "Fierro corrugado 1/2\"",
                "unit": "und",
                "unit_price": 41.9,
            }),
        )
        .await;
    app.create(
        "/api/requirements",
        json!({
            "obra_id": obra_id,
            "requested_by": "Ing. Residente",
            "items": [{ "product_id": product_id, "quantity": 60.0 }],
        }),
    )
    .await;

    assert_delete_conflict(&app, &format!("/api/products/{product_id}")).await;
}

#[tokio::test]
async fn position_with_workers_is_not_deleted() {
    let app = TestApp::new().await;
    let position_id = app
        .create("/api/positions", json!({ "name": "Oficial", "daily_rate": 82.0 }))
        .await;
    let worker_id = app.create("/api/workers", worker("41236598", &position_id)).await;

    assert_delete_conflict(&app, &format!("/api/positions/{position_id}")).await;

    let (status, _) = app.delete(&format!("/api/workers/{worker_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&format!("/api/positions/{position_id}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn worker_with_attendance_or_training_is_not_deleted() {
    let app = TestApp::new().await;
    let obra_id = app.create("/api/obras", obra("OB-WRK")).await;
    let position_id = app
        .create("/api/positions", json!({ "name": "Peón", "daily_rate": 70.0 }))
        .await;

    let attended = app.create("/api/workers", worker("45678912", &position_id)).await;
    app.create(
        "/api/attendance",
        json!({
            "worker_id": attended,
            "obra_id": obra_id,
            "date": "2025-07-14",
            "check_in": "07:30:00",
            "check_out": "17:00:00",
            "status": "present",
        }),
    )
    .await;
    assert_delete_conflict(&app, &format!("/api/workers/{attended}")).await;

    let trained = app.create("/api/workers", worker("45678913", &position_id)).await;
    app.create(
        "/api/trainings",
        json!({
            "topic": "Inducción de seguridad",
            "training_type": "induction",
            "obra_id": obra_id,
            "date": "2025-07-01",
            "duration_hours": 2.0,
            "attendee_ids": [trained],
        }),
    )
    .await;
    assert_delete_conflict(&app, &format!("/api/workers/{trained}")).await;
}

/// Collects the targets of INFO events emitted by this workspace's crates
#[derive(Clone, Default)]
struct InfoTargets(Arc<Mutex<Vec<String>>>);

impl<S: Subscriber> Layer<S> for InfoTargets {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let ours = meta.target().starts_with("server") || meta.target().starts_with("services");
        if *meta.level() == Level::INFO && ours {
            self.0.lock().unwrap().push(meta.target().to_string());
        }
    }
}

#[tokio::test]
async fn each_mutation_logs_one_audit_line() {
    let app = TestApp::new().await;
    let targets = InfoTargets::default();
    let _guard = tracing::subscriber::set_default(Registry::default().with(targets.clone()));

    let obra_id = app.create("/api/obras", obra("OB-LOG")).await;
    let (status, _) = app.delete(&format!("/api/obras/{obra_id}")).await;
    assert_eq!(status, StatusCode::OK);

    let recorded = targets.0.lock().unwrap().clone();
    assert_eq!(recorded, vec!["server::routes::obras", "server::routes::obras"]);
}
