use std::collections::BTreeSet;

use inmo_core::AppError;
use inmo_core::filter::{PropertyFilter, PropertyView};
use inmo_core::models::{FeatureMap, NewAgency, PropertyStatus, RatingValue};

use crate::integration::common::{insert_agency, insert_property, setup_test_db, stub};

fn features(entries: &[(&str, &[&str])]) -> FeatureMap {
    entries
        .iter()
        .map(|(category, names)| {
            (
                category.to_string(),
                names.iter().map(|n| n.to_string()).collect::<BTreeSet<_>>(),
            )
        })
        .collect()
}

async fn relation_count(db: &inmo_db::Database, property_id: i64) -> i64 {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM property_feature_relations WHERE property_id = ?")
            .bind(property_id)
            .fetch_one(db.pool())
            .await
            .unwrap();
    count
}

#[tokio::test]
async fn upsert_same_code_updates_existing_row() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Lanús Propiedades", Some("tokko")).await;
    let repo = db.property_repo();

    let first = repo.upsert_stub(agency_id, &stub("TKO-1", "USD 85.000")).await.unwrap();
    let mut changed = stub("TKO-1", "USD 80.000");
    changed.title = "Departamento rebajado".into();
    let second = repo.upsert_stub(agency_id, &changed).await.unwrap();

    assert_eq!(first, second);
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM properties WHERE code = 'TKO-1'")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);

    let stored = repo.get(first).await.unwrap().unwrap();
    assert_eq!(stored.price, "USD 80.000");
    assert_eq!(stored.title, "Departamento rebajado");
    assert_eq!(stored.currency.as_deref(), Some("USD"));
    assert_eq!(stored.status, PropertyStatus::Pending);
}

#[tokio::test]
async fn upsert_keeps_status_of_enriched_property() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Sur Inmuebles", Some("tokko")).await;
    let id = insert_property(&db, agency_id, "TKO-2", "$ 120.000").await;
    db.property_repo().mark_not_available(id).await.unwrap();

    insert_property(&db, agency_id, "TKO-2", "$ 125.000").await;

    let stored = db.property_repo().get(id).await.unwrap().unwrap();
    assert_eq!(stored.status, PropertyStatus::NotAvailable);
    assert_eq!(stored.price, "$ 125.000");
}

#[tokio::test]
async fn upsert_rejects_blank_code() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Sur Inmuebles", None).await;

    let err = db
        .property_repo()
        .upsert_stub(agency_id, &stub("  ", "$ 1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[tokio::test]
async fn agency_dedup_matches_punctuation_variants() {
    let (db, _dir) = setup_test_db().await;
    insert_agency(&db, "Ruiz & Asociados", None).await;
    let repo = db.agency_repo();

    assert!(repo.exists("ruiz asociados", "").await.unwrap());
    assert!(!repo.exists("Gómez Propiedades", "").await.unwrap());

    let created = repo
        .create_if_new(&NewAgency {
            name: "RUIZ ASOCIADOS".into(),
            url: "https://ruiz.example".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(created.is_none());
    assert_eq!(repo.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn agencies_split_by_system() {
    let (db, _dir) = setup_test_db().await;
    let tokko = insert_agency(&db, "Alfa", Some("tokko")).await;
    insert_agency(&db, "Beta", None).await;
    insert_agency(&db, "Gamma", Some(inmo_core::models::UNIDENTIFIED_SYSTEM)).await;
    let repo = db.agency_repo();

    let with_system = repo.list_with_system().await.unwrap();
    assert_eq!(with_system.len(), 1);
    assert_eq!(with_system[0].id, tokko);
    assert_eq!(repo.list_without_system().await.unwrap().len(), 2);

    let found = repo.find_by_name("alf").await.unwrap();
    assert_eq!(found.len(), 1);

    let err = repo.update_system(9999, "tokko").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn save_features_is_idempotent_and_replaces() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    let id = insert_property(&db, agency_id, "TKO-3", "USD 50.000").await;
    let repo = db.feature_repo();

    let first = features(&[("servicio", &["Gas Natural", "Agua Corriente"])]);
    repo.save_property_features(id, &first).await.unwrap();
    repo.save_property_features(id, &first).await.unwrap();
    assert_eq!(relation_count(&db, id).await, 2);
    assert_eq!(repo.for_property(id).await.unwrap(), first);

    let second = features(&[("ambiente", &["Balcón"]), ("servicio", &["Gas Natural"])]);
    repo.save_property_features(id, &second).await.unwrap();
    assert_eq!(relation_count(&db, id).await, 2);
    assert_eq!(repo.for_property(id).await.unwrap(), second);

    // The catalog keeps every feature ever seen, each once.
    assert_eq!(repo.all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn same_feature_name_in_two_categories_is_two_rows() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    let id = insert_property(&db, agency_id, "TKO-4", "USD 50.000").await;

    let map = features(&[("ambiente", &["Patio"]), ("adicional", &["Patio", "  "])]);
    db.feature_repo().save_property_features(id, &map).await.unwrap();

    assert_eq!(db.feature_repo().all().await.unwrap().len(), 2);
    assert_eq!(relation_count(&db, id).await, 2);
}

#[tokio::test]
async fn rating_lifecycle() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    let id = insert_property(&db, agency_id, "TKO-5", "USD 50.000").await;
    let ratings = db.rating_repo();

    let err = ratings.set_favorite(id, true).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let rating = ratings.rate(id, RatingValue::Like).await.unwrap();
    assert_eq!(rating.rating, RatingValue::Like);
    assert!(!rating.is_favorite);

    let rating = ratings.set_favorite(id, true).await.unwrap();
    assert!(rating.is_favorite);

    // Dislike clears the favorite flag.
    let rating = ratings.rate(id, RatingValue::Dislike).await.unwrap();
    assert!(!rating.is_favorite);

    let err = ratings.set_favorite(id, true).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let err = ratings.rate(9999, RatingValue::Like).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn views_follow_ratings() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    let liked = insert_property(&db, agency_id, "TKO-6", "USD 50.000").await;
    let favorite = insert_property(&db, agency_id, "TKO-7", "USD 60.000").await;
    let disliked = insert_property(&db, agency_id, "TKO-8", "USD 70.000").await;
    let unrated = insert_property(&db, agency_id, "TKO-9", "USD 80.000").await;

    let ratings = db.rating_repo();
    ratings.rate(liked, RatingValue::Like).await.unwrap();
    ratings.rate(favorite, RatingValue::Like).await.unwrap();
    ratings.set_favorite(favorite, true).await.unwrap();
    ratings.rate(disliked, RatingValue::Dislike).await.unwrap();

    let repo = db.property_repo();
    let filter = PropertyFilter::default();
    let ids = |props: Vec<inmo_core::Property>| props.into_iter().map(|p| p.id).collect::<BTreeSet<_>>();

    let unrated_ids = ids(repo.list(PropertyView::Unrated, &filter, None).await.unwrap());
    assert_eq!(unrated_ids, BTreeSet::from([unrated]));

    let liked_ids = ids(repo.list(PropertyView::Liked, &filter, None).await.unwrap());
    assert_eq!(liked_ids, BTreeSet::from([liked, favorite]));

    let favorite_ids = ids(repo.list(PropertyView::Favorites, &filter, None).await.unwrap());
    assert_eq!(favorite_ids, BTreeSet::from([favorite]));

    let limited = repo.list(PropertyView::Liked, &filter, Some(1)).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn notes_crud() {
    let (db, _dir) = setup_test_db().await;
    let agency_id = insert_agency(&db, "Alfa", Some("tokko")).await;
    let id = insert_property(&db, agency_id, "TKO-10", "USD 50.000").await;
    let notes = db.note_repo();

    let note = notes.add(id, "  Llamar el lunes  ").await.unwrap();
    assert_eq!(note.text, "Llamar el lunes");
    notes.add(id, "Pedir planos").await.unwrap();
    assert_eq!(notes.list(id).await.unwrap().len(), 2);

    let err = notes.add(id, "   ").await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
    let err = notes.add(9999, "x").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // with_notes narrows the unrated view to annotated properties.
    insert_property(&db, agency_id, "TKO-11", "USD 50.000").await;
    let filter = PropertyFilter {
        with_notes: true,
        ..Default::default()
    };
    let listed = db
        .property_repo()
        .list(PropertyView::Unrated, &filter, None)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);

    notes.delete(note.id).await.unwrap();
    assert_eq!(notes.list(id).await.unwrap().len(), 1);
    let err = notes.delete(note.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn list_values_fall_back_to_defaults() {
    let (db, _dir) = setup_test_db().await;
    let lists = db.list_repo();

    let orientation = lists.values("orientation").await.unwrap();
    assert_eq!(orientation.len(), 8);
    assert_eq!(orientation[0].display_name, "Norte");

    let (list_id,): (i64,) = sqlx::query_as("INSERT INTO lists (name) VALUES ('orientation') RETURNING id")
        .fetch_one(db.pool())
        .await
        .unwrap();
    sqlx::query("INSERT INTO list_values (list_id, value, display_name, sort_order) VALUES (?, 'norte', 'Al Norte', 1)")
        .bind(list_id)
        .execute(db.pool())
        .await
        .unwrap();

    let stored = lists.values("orientation").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].display_name, "Al Norte");
}

#[tokio::test]
async fn property_types_are_seeded() {
    let (db, _dir) = setup_test_db().await;
    let types = db.property_type_repo();

    assert_eq!(types.list().await.unwrap().len(), 7);
    let apartment = types.by_code("apartment").await.unwrap().unwrap();
    assert_eq!(apartment.name, "Departamento");
    assert!(types.by_code("castle").await.unwrap().is_none());
}

#[tokio::test]
async fn health_check_succeeds() {
    let (db, _dir) = setup_test_db().await;
    db.health_check().await.unwrap();
}
