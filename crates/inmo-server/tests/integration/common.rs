use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use inmo_core::models::{Currency, NewAgency, PropertyStub};
use inmo_db::{Database, DatabaseConfig};
use inmo_server::routes;
use inmo_server::state::AppState;

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    _dir: TempDir,
}

impl TestApp {
    /// Send one request through a fresh clone of the router.
    pub async fn send(&self, request: Request<Body>) -> (axum::http::StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }
}

/// Router over a fresh, migrated SQLite database in a temporary directory.
pub async fn setup_test_app() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("api.db").display());

    let db = Database::connect(&DatabaseConfig::new(url))
        .await
        .expect("Failed to open database");
    db.migrate().await.expect("Failed to run migrations");

    let state = Arc::new(AppState { db: db.clone() });
    TestApp {
        router: routes::router(state),
        db,
        _dir: dir,
    }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn seed_property(db: &Database, code: &str, price: &str) -> i64 {
    let agency_id = match db.agency_repo().find_by_name("Alfa").await.unwrap().first() {
        Some(agency) => agency.id,
        None => {
            db.agency_repo()
                .create(&NewAgency {
                    name: "Alfa Propiedades".into(),
                    url: "https://alfa.example".into(),
                    ..Default::default()
                })
                .await
                .unwrap()
                .id
        }
    };

    db.property_repo()
        .upsert_stub(
            agency_id,
            &PropertyStub {
                code: code.to_string(),
                title: format!("Departamento {}", code),
                price: price.to_string(),
                currency: Currency::from_price_text(price),
                address: Some("Lanús Oeste".into()),
                url: format!("https://alfa.example/p/{}", code),
                image_url: None,
            },
        )
        .await
        .unwrap()
}
