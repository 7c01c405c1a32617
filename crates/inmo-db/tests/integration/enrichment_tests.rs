use std::sync::Arc;
use std::time::Duration;

use inmo_core::models::{EnrichmentUpdate, PropertyDetails, PropertyStatus};
use inmo_core::testutil::{MockAdapter, MockAdapterFactory, MockReply, RecordingReporter, sample_details};
use inmo_core::traits::{EnrichmentStore, PendingScope};
use inmo_core::{CanonicalType, EnrichmentPipeline, PipelineConfig, normalize_property_type};
use tokio_util::sync::CancellationToken;

use crate::integration::common::{insert_agency, insert_property, requeue, setup_test_db};

fn fast_config(workers: usize) -> PipelineConfig {
    PipelineConfig {
        workers,
        request_delay: Duration::from_millis(5),
        ..PipelineConfig::default()
    }
}

fn url(code: &str) -> String {
    format!("https://agency.example/p/{}", code)
}

#[tokio::test]
async fn pipeline_isolates_single_failure() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    let mut ids = vec![];
    for i in 1..=5 {
        ids.push(insert_property(&db, agency_id, &format!("TKO-{}", i), "USD 85.000").await);
    }

    let adapter = MockAdapter::new().with_reply(&url("TKO-3"), MockReply::Error("connection reset".into()));
    let pipeline = EnrichmentPipeline::new(
        MockAdapterFactory::new(adapter.clone()),
        db.clone(),
        fast_config(2),
    );
    let reporter = Arc::new(RecordingReporter::new());

    let summary = pipeline
        .run_pending(&PendingScope::default(), CancellationToken::new(), reporter.clone())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);
    assert!(adapter.max_in_flight() <= 2);
    assert_eq!(reporter.count("written"), 5);

    let repo = db.property_repo();
    for (i, id) in ids.iter().enumerate() {
        let property = repo.get(*id).await.unwrap().unwrap();
        if i == 2 {
            assert_eq!(property.status, PropertyStatus::Pending);
            assert!(property.property_type_id.is_none());
        } else {
            assert_eq!(property.status, PropertyStatus::Completed);
            assert_eq!(property.property_type.as_deref(), Some("Departamento"));
            assert_eq!(property.age, Some(7));
            assert_eq!(property.images, vec!["https://cdn.example/1.jpg".to_string()]);
        }
    }
    assert_eq!(repo.count_by_status(PropertyStatus::Pending).await.unwrap(), 1);
}

#[tokio::test]
async fn pipeline_marks_gone_listing_not_available() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    let gone = insert_property(&db, agency_id, "GONE", "USD 1").await;

    let adapter = MockAdapter::new().with_default(MockReply::NotFound);
    let pipeline = EnrichmentPipeline::new(MockAdapterFactory::new(adapter), db.clone(), fast_config(1));
    let summary = pipeline
        .run_pending(
            &PendingScope::default(),
            CancellationToken::new(),
            Arc::new(RecordingReporter::new()),
        )
        .await
        .unwrap();

    assert_eq!(summary.not_available, 1);
    let property = db.property_repo().get(gone).await.unwrap().unwrap();
    assert_eq!(property.status, PropertyStatus::NotAvailable);

    // Terminal rows are not picked up again.
    assert!(db.pending_properties(&PendingScope::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn pending_scope_filters_agency_and_limit() {
    let (db, _dir) = setup_test_db().await;
    let alfa = insert_agency(&db, "Alfa", Some("tokko")).await;
    let beta = insert_agency(&db, "Beta", Some("tokko")).await;
    for i in 1..=3 {
        insert_property(&db, alfa, &format!("A-{}", i), "USD 1").await;
    }
    insert_property(&db, beta, "B-1", "USD 1").await;

    let only_beta = PendingScope {
        agency_ids: vec![beta],
        limit: None,
    };
    let pending = db.pending_properties(&only_beta).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].code, "B-1");

    let limited = PendingScope {
        agency_ids: vec![],
        limit: Some(2),
    };
    assert_eq!(db.pending_properties(&limited).await.unwrap().len(), 2);
}

#[tokio::test]
async fn failed_retry_never_erases_saved_details() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    let id = insert_property(&db, agency_id, "TKO-1", "USD 85.000").await;

    let details = PropertyDetails {
        latitude: Some(-34.70),
        longitude: Some(-58.39),
        ..sample_details()
    };
    db.apply_enrichment(
        id,
        &EnrichmentUpdate {
            property_type: normalize_property_type("Depto."),
            details,
        },
    )
    .await
    .unwrap();

    // Re-queue the property and make the next extraction fail.
    requeue(&db, id).await;
    let adapter = MockAdapter::new().with_default(MockReply::Error("503".into()));
    let pipeline = EnrichmentPipeline::new(MockAdapterFactory::new(adapter), db.clone(), fast_config(1));
    let summary = pipeline
        .run_pending(
            &PendingScope::default(),
            CancellationToken::new(),
            Arc::new(RecordingReporter::new()),
        )
        .await
        .unwrap();
    assert_eq!(summary.failed, 1);

    let property = db.property_repo().get(id).await.unwrap().unwrap();
    assert_eq!(property.status, PropertyStatus::Pending);
    assert_eq!(property.age, Some(7));
    assert_eq!(property.location.as_deref(), Some("Lanús Oeste"));
    assert_eq!(property.latitude, Some(-34.70));
    assert_eq!(db.feature_repo().for_property(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_images_and_zero_coordinates_keep_stored_values() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    let id = insert_property(&db, agency_id, "TKO-1", "USD 85.000").await;

    let first = PropertyDetails {
        latitude: Some(-34.70),
        longitude: Some(-58.39),
        ..sample_details()
    };
    db.apply_enrichment(
        id,
        &EnrichmentUpdate {
            property_type: None,
            details: first,
        },
    )
    .await
    .unwrap();
    requeue(&db, id).await;

    let second = PropertyDetails {
        bedrooms: Some(3),
        latitude: Some(0.0),
        longitude: Some(-58.0),
        ..Default::default()
    };
    db.apply_enrichment(
        id,
        &EnrichmentUpdate {
            property_type: None,
            details: second,
        },
    )
    .await
    .unwrap();

    let property = db.property_repo().get(id).await.unwrap().unwrap();
    assert_eq!(property.bedrooms, Some(3));
    assert_eq!(property.images, vec!["https://cdn.example/1.jpg".to_string()]);
    assert_eq!(property.latitude, Some(-34.70));
    assert_eq!(property.longitude, Some(-58.39));
    // The feature set mirrors the latest enrichment, which had none.
    assert!(db.feature_repo().for_property(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_type_is_created_once() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    let a = insert_property(&db, agency_id, "C-1", "USD 1").await;
    let b = insert_property(&db, agency_id, "C-2", "USD 1").await;

    let cochera = CanonicalType {
        code: "cochera".into(),
        name: "Cochera".into(),
    };
    for id in [a, b] {
        db.apply_enrichment(
            id,
            &EnrichmentUpdate {
                property_type: Some(cochera.clone()),
                details: PropertyDetails::default(),
            },
        )
        .await
        .unwrap();
    }

    let types = db.property_type_repo().list().await.unwrap();
    assert_eq!(types.len(), 8);
    assert_eq!(types.iter().filter(|t| t.code == "cochera").count(), 1);

    let first = db.property_repo().get(a).await.unwrap().unwrap();
    let second = db.property_repo().get(b).await.unwrap().unwrap();
    assert_eq!(first.property_type_id, second.property_type_id);
    assert_eq!(first.property_type.as_deref(), Some("Cochera"));
}

#[tokio::test]
async fn enrichment_of_missing_property_rolls_back() {
    let (db, _dir) = setup_test_db().await;

    let err = db
        .apply_enrichment(
            9999,
            &EnrichmentUpdate {
                property_type: normalize_property_type("Quinta con pileta"),
                details: sample_details(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, inmo_core::AppError::NotFound(_)));

    // Nothing from the failed transaction survives.
    assert_eq!(db.property_type_repo().list().await.unwrap().len(), 7);
    assert!(db.feature_repo().all().await.unwrap().is_empty());
}

#[tokio::test]
async fn completed_property_is_not_reopened_by_stale_run() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    let id = insert_property(&db, agency_id, "TKO-1", "USD 85.000").await;

    // A batch loaded while the property was still pending.
    let stale = db.pending_properties(&PendingScope::default()).await.unwrap();
    assert!(db
        .apply_enrichment(
            id,
            &EnrichmentUpdate {
                property_type: normalize_property_type("Depto."),
                details: sample_details(),
            },
        )
        .await
        .unwrap());

    let adapter = MockAdapter::new().with_default(MockReply::NotFound);
    let pipeline = EnrichmentPipeline::new(MockAdapterFactory::new(adapter), db.clone(), fast_config(1));
    let summary = pipeline
        .run(stale, CancellationToken::new(), Arc::new(RecordingReporter::new()), None)
        .await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.not_available, 0);
    let property = db.property_repo().get(id).await.unwrap().unwrap();
    assert_eq!(property.status, PropertyStatus::Completed);
    assert_eq!(property.age, Some(7));
}

#[tokio::test]
async fn not_available_property_is_not_completed() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    let id = insert_property(&db, agency_id, "TKO-1", "USD 85.000").await;
    assert!(db.mark_not_available(id).await.unwrap());

    let written = db
        .apply_enrichment(
            id,
            &EnrichmentUpdate {
                property_type: normalize_property_type("Quinta con pileta"),
                details: sample_details(),
            },
        )
        .await
        .unwrap();

    assert!(!written);
    let property = db.property_repo().get(id).await.unwrap().unwrap();
    assert_eq!(property.status, PropertyStatus::NotAvailable);
    assert!(property.age.is_none());
    // The discarded write leaves no new type or feature behind.
    assert_eq!(db.property_type_repo().list().await.unwrap().len(), 7);
    assert!(db.feature_repo().all().await.unwrap().is_empty());

    // A second not-available mark is a no-op, a missing row is still an error.
    assert!(!db.mark_not_available(id).await.unwrap());
    assert!(matches!(
        db.property_repo().mark_not_available(9999).await,
        Err(inmo_core::AppError::NotFound(_))
    ));
}
