use std::collections::BTreeSet;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use inmo_core::models::{EnrichmentUpdate, PropertyDetails};
use inmo_core::traits::EnrichmentStore;

use crate::integration::common::{json_request, seed_property, setup_test_app};

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn codes(json: &serde_json::Value) -> Vec<String> {
    json["properties"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["code"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let (status, json) = app.send(get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn unrated_view_with_query_filter() {
    let app = setup_test_app().await;
    seed_property(&app.db, "USD-1", "USD 85.000").await;
    seed_property(&app.db, "ARS-1", "$ 85.000").await;

    let (status, json) = app.send(get("/api/properties/unrated")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);

    let (status, json) = app
        .send(get("/api/properties/unrated?currency=USD&price_max=90000"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(codes(&json), vec!["USD-1"]);
    assert_eq!(json["properties"][0]["has_notes"], false);
    assert_eq!(json["properties"][0]["is_favorite"], false);
}

#[tokio::test]
async fn unrated_view_with_json_body() {
    let app = setup_test_app().await;
    seed_property(&app.db, "USD-1", "USD 85.000").await;
    seed_property(&app.db, "ARS-1", "$ 85.000").await;

    let (status, json) = app
        .send(json_request(
            "POST",
            "/api/properties/unrated",
            json!({"price_max": 100000}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(codes(&json), vec!["ARS-1"]);
}

#[tokio::test]
async fn invalid_filter_returns_400() {
    let app = setup_test_app().await;

    let (status, json) = app
        .send(get("/api/properties/unrated?features=1,abc"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");

    let (status, json) = app
        .send(json_request(
            "POST",
            "/api/properties/unrated",
            json!({"price_min": -5}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn rating_moves_property_between_views() {
    let app = setup_test_app().await;
    let id = seed_property(&app.db, "TKO-1", "USD 100").await;
    seed_property(&app.db, "TKO-2", "USD 100").await;

    let (status, json) = app
        .send(json_request(
            "PUT",
            &format!("/api/properties/{id}/rate"),
            json!({"rating": "like"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rating"], "like");

    let (_, unrated) = app.send(get("/api/properties/unrated")).await;
    assert_eq!(codes(&unrated), vec!["TKO-2"]);
    let (_, liked) = app.send(get("/api/properties/liked")).await;
    assert_eq!(codes(&liked), vec!["TKO-1"]);

    let (status, json) = app
        .send(json_request(
            "PUT",
            &format!("/api/properties/{id}/favorite"),
            json!({"is_favorite": true}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_favorite"], true);

    let (_, favorites) = app.send(get("/api/properties/favorites")).await;
    assert_eq!(codes(&favorites), vec!["TKO-1"]);
    assert_eq!(favorites["properties"][0]["is_favorite"], true);
}

#[tokio::test]
async fn invalid_rating_and_missing_property() {
    let app = setup_test_app().await;
    let id = seed_property(&app.db, "TKO-1", "USD 100").await;

    let (status, _) = app
        .send(json_request(
            "PUT",
            &format!("/api/properties/{id}/rate"),
            json!({"rating": "meh"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .send(json_request(
            "PUT",
            "/api/properties/9999/rate",
            json!({"rating": "like"}),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn notes_crud() {
    let app = setup_test_app().await;
    let id = seed_property(&app.db, "TKO-1", "USD 100").await;

    let (status, note) = app
        .send(json_request(
            "POST",
            &format!("/api/properties/{id}/notes"),
            json!({"text": "  Llamar al dueño  "}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(note["text"], "Llamar al dueño");

    let (status, list) = app.send(get(&format!("/api/properties/{id}/notes"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);

    let (_, unrated) = app.send(get("/api/properties/unrated")).await;
    assert_eq!(unrated["properties"][0]["has_notes"], true);

    let (status, _) = app
        .send(json_request(
            "POST",
            &format!("/api/properties/{id}/notes"),
            json!({"text": "   "}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let note_id = note["id"].as_i64().unwrap();
    let (status, _) = app
        .send(
            Request::delete(format!("/api/properties/notes/{note_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            Request::delete(format!("/api/properties/notes/{note_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send(get("/api/properties/9999/notes")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn features_grouped_by_category() {
    let app = setup_test_app().await;
    let id = seed_property(&app.db, "TKO-1", "USD 100").await;

    let mut details = PropertyDetails::default();
    details.features.insert(
        "servicio".into(),
        BTreeSet::from(["Agua Corriente".to_string(), "Gas Natural".to_string()]),
    );
    details
        .features
        .insert("ambiente".into(), BTreeSet::from(["Cocina".to_string()]));
    app.db
        .apply_enrichment(
            id,
            &EnrichmentUpdate {
                property_type: None,
                details,
            },
        )
        .await
        .unwrap();

    let (status, json) = app.send(get("/api/features")).await;
    assert_eq!(status, StatusCode::OK);

    let categories = json["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0]["id"], "ambiente");
    assert_eq!(categories[0]["name"], "AMBIENTE");
    assert_eq!(categories[1]["id"], "servicio");
    assert_eq!(categories[1]["features"].as_array().unwrap().len(), 2);

    let (_, unrated) = app.send(get("/api/properties/unrated")).await;
    assert_eq!(unrated["properties"][0]["features"]["ambiente"][0], "Cocina");
}

#[tokio::test]
async fn catalog_endpoints() {
    let app = setup_test_app().await;
    seed_property(&app.db, "TKO-1", "USD 100").await;

    let (status, types) = app.send(get("/api/property-types")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(types.as_array().unwrap().len(), 7);

    let (status, values) = app.send(get("/api/lists/orientation")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!values.as_array().unwrap().is_empty());

    let (status, agencies) = app.send(get("/api/agencies")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agencies[0]["name"], "Alfa Propiedades");
}
