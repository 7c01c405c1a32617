use std::collections::BTreeSet;

use inmo_core::models::{Currency, EnrichmentUpdate, PropertyDetails};
use inmo_core::traits::EnrichmentStore;
use inmo_core::{AppError, PropertyFilter, PropertyView, normalize_property_type};
use inmo_db::Database;

use crate::integration::common::{insert_agency, insert_property, setup_test_db};

async fn unrated_codes(db: &Database, filter: &PropertyFilter) -> BTreeSet<String> {
    db.property_repo()
        .list(PropertyView::Unrated, filter, None)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.code)
        .collect()
}

fn codes(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|c| c.to_string()).collect()
}

async fn enrich(db: &Database, id: i64, details: PropertyDetails) {
    let update = EnrichmentUpdate {
        property_type: details.property_type.as_deref().and_then(normalize_property_type),
        details,
    };
    db.apply_enrichment(id, &update).await.unwrap();
}

#[tokio::test]
async fn price_filter_respects_currency_bucket() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    insert_property(&db, agency_id, "USD-IN", "USD 85.000").await;
    insert_property(&db, agency_id, "ARS-SAME-DIGITS", "$ 85.000").await;
    insert_property(&db, agency_id, "USD-HIGH", "U$S 120.000").await;

    let filter = PropertyFilter {
        currency: Some(Currency::Usd),
        price_min: Some(50_000.0),
        price_max: Some(90_000.0),
        ..Default::default()
    };
    assert_eq!(unrated_codes(&db, &filter).await, codes(&["USD-IN"]));
}

#[tokio::test]
async fn price_bounds_default_to_ars() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    insert_property(&db, agency_id, "USD-1", "USD 85.000").await;
    insert_property(&db, agency_id, "ARS-1", "$ 85.000").await;

    let filter = PropertyFilter {
        price_max: Some(100_000.0),
        ..Default::default()
    };
    assert_eq!(unrated_codes(&db, &filter).await, codes(&["ARS-1"]));
}

#[tokio::test]
async fn antiquity_buckets() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    for (code, age) in [("NEW", 0), ("SEVEN", 7), ("OLD", 45)] {
        let id = insert_property(&db, agency_id, code, "USD 1").await;
        enrich(
            &db,
            id,
            PropertyDetails {
                age: Some(age),
                ..Default::default()
            },
        )
        .await;
    }

    let by_bucket = |bucket| PropertyFilter {
        antiquity: Some(bucket),
        ..Default::default()
    };
    assert_eq!(unrated_codes(&db, &by_bucket(0)).await, codes(&["NEW"]));
    assert_eq!(unrated_codes(&db, &by_bucket(5)).await, codes(&[]));
    assert_eq!(unrated_codes(&db, &by_bucket(10)).await, codes(&["SEVEN"]));
    assert_eq!(unrated_codes(&db, &by_bucket(30)).await, codes(&["SEVEN"]));
    assert_eq!(unrated_codes(&db, &by_bucket(100)).await, codes(&["OLD"]));
}

#[tokio::test]
async fn type_location_and_feature_filters() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;

    let house = insert_property(&db, agency_id, "HOUSE", "USD 1").await;
    let mut details = PropertyDetails {
        property_type: Some("Casa".into()),
        location: Some("Remedios de Escalada".into()),
        ..Default::default()
    };
    details
        .features
        .insert("servicio".into(), BTreeSet::from(["Gas Natural".to_string()]));
    enrich(&db, house, details).await;

    let flat = insert_property(&db, agency_id, "FLAT", "USD 1").await;
    enrich(
        &db,
        flat,
        PropertyDetails {
            property_type: Some("Depto.".into()),
            location: Some("Lanús Oeste".into()),
            ..Default::default()
        },
    )
    .await;

    let by_code = PropertyFilter {
        property_type: Some("house".into()),
        ..Default::default()
    };
    assert_eq!(unrated_codes(&db, &by_code).await, codes(&["HOUSE"]));

    let all_types = PropertyFilter {
        property_type: Some("all".into()),
        ..Default::default()
    };
    assert_eq!(unrated_codes(&db, &all_types).await, codes(&["HOUSE", "FLAT"]));

    let by_location = PropertyFilter {
        locations: vec!["lanús".into(), "escalada".into()],
        ..Default::default()
    };
    assert_eq!(unrated_codes(&db, &by_location).await, codes(&["HOUSE", "FLAT"]));

    let gas = db
        .feature_repo()
        .all()
        .await
        .unwrap()
        .into_iter()
        .find(|f| f.name == "Gas Natural")
        .unwrap();
    let by_feature = PropertyFilter {
        features: vec![gas.id],
        ..Default::default()
    };
    assert_eq!(unrated_codes(&db, &by_feature).await, codes(&["HOUSE"]));
}

#[tokio::test]
async fn area_filters() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    for (code, covered, total) in [("SMALL", 40.0, 45.0), ("BIG", 150.0, 300.0)] {
        let id = insert_property(&db, agency_id, code, "USD 1").await;
        enrich(
            &db,
            id,
            PropertyDetails {
                covered_area: Some(covered),
                total_area: Some(total),
                ..Default::default()
            },
        )
        .await;
    }

    let filter = PropertyFilter {
        size_min: Some(100.0),
        ..Default::default()
    };
    assert_eq!(unrated_codes(&db, &filter).await, codes(&["BIG"]));

    let filter = PropertyFilter {
        covered_area_max: Some(50.0),
        ..Default::default()
    };
    assert_eq!(unrated_codes(&db, &filter).await, codes(&["SMALL"]));
}

#[tokio::test]
async fn invalid_filter_is_rejected() {
    let (db, _dir) = setup_test_db().await;
    let filter = PropertyFilter {
        price_min: Some(-1.0),
        ..Default::default()
    };
    let err = db
        .property_repo()
        .list(PropertyView::Unrated, &filter, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}
