use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{MethodRouter, delete, get, put};
use axum::{Json, Router};

use inmo_core::error::AppError;
use inmo_core::models::RatingValue;
use inmo_core::{PropertyFilter, PropertyView};

use crate::dto::{
    CreateNoteRequest, FavoriteRequest, FeatureCatalogResponse, FeatureCategory, FeatureItem,
    FilterQuery, HealthResponse, LimitQuery, NoteListResponse, PropertyListResponse,
    PropertyResponse, RateRequest,
};
use crate::error::ApiError;
use crate::state::AppState;

/// Build the full router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/properties/unrated", view_route(PropertyView::Unrated))
        .route("/properties/liked", view_route(PropertyView::Liked))
        .route("/properties/favorites", view_route(PropertyView::Favorites))
        .route("/properties/{id}/rate", put(rate_property))
        .route("/properties/{id}/favorite", put(set_favorite))
        .route("/properties/{id}/notes", get(list_notes).post(add_note))
        .route("/properties/notes/{note_id}", delete(delete_note))
        .route("/features", get(list_features))
        .route("/property-types", get(list_property_types))
        .route("/lists/{name}", get(list_values))
        .route("/agencies", get(list_agencies));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Property views
// ---------------------------------------------------------------------------

/// GET takes the filter from the query string, POST from a JSON body.
fn view_route(view: PropertyView) -> MethodRouter<Arc<AppState>> {
    get(
        move |state: State<Arc<AppState>>, query: Query<FilterQuery>| async move {
            list_from_query(state, query, view).await
        },
    )
    .post(
        move |state: State<Arc<AppState>>,
              query: Query<LimitQuery>,
              body: Json<PropertyFilter>| async move {
            list_from_body(state, query, body, view).await
        },
    )
}

async fn list_from_query(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilterQuery>,
    view: PropertyView,
) -> Result<Json<PropertyListResponse>, ApiError> {
    let limit = query.limit;
    let filter = PropertyFilter::try_from(query)?;
    list_view(&state, view, &filter, limit).await
}

async fn list_from_body(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
    Json(filter): Json<PropertyFilter>,
    view: PropertyView,
) -> Result<Json<PropertyListResponse>, ApiError> {
    list_view(&state, view, &filter, query.limit).await
}

async fn list_view(
    state: &AppState,
    view: PropertyView,
    filter: &PropertyFilter,
    limit: Option<u32>,
) -> Result<Json<PropertyListResponse>, ApiError> {
    let db = &state.db;
    let properties = db.property_repo().list(view, filter, limit).await?;

    let (notes, ratings, features) = (db.note_repo(), db.rating_repo(), db.feature_repo());
    let mut items = Vec::with_capacity(properties.len());
    for property in properties {
        let has_notes = !notes.list(property.id).await?.is_empty();
        let is_favorite = ratings
            .get(property.id)
            .await?
            .is_some_and(|r| r.is_favorite);
        let features = features.for_property(property.id).await?;
        items.push(PropertyResponse {
            property,
            has_notes,
            is_favorite,
            features,
        });
    }

    tracing::debug!(%view, total = items.len(), "Listed properties");
    Ok(Json(PropertyListResponse {
        total: items.len(),
        properties: items,
    }))
}

// ---------------------------------------------------------------------------
// Ratings
// ---------------------------------------------------------------------------

async fn rate_property(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<RateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rating: RatingValue = body.rating.parse().map_err(AppError::ValidationError)?;
    let saved = state.db.rating_repo().rate(id, rating).await?;
    Ok(Json(saved))
}

async fn set_favorite(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<FavoriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = state
        .db
        .rating_repo()
        .set_favorite(id, body.is_favorite)
        .await?;
    Ok(Json(saved))
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

async fn list_notes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.property_repo().exists(id).await? {
        return Err(AppError::NotFound(format!("Property {id}")).into());
    }
    let notes = state.db.note_repo().list(id).await?;
    Ok(Json(NoteListResponse {
        total: notes.len(),
        notes,
    }))
}

async fn add_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<CreateNoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state.db.note_repo().add(id, &body.text).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn delete_note(
    State(state): State<Arc<AppState>>,
    Path(note_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.note_repo().delete(note_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Catalogs
// ---------------------------------------------------------------------------

async fn list_features(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let mut grouped: BTreeMap<String, Vec<FeatureItem>> = BTreeMap::new();
    for feature in state.db.feature_repo().all().await? {
        grouped
            .entry(feature.category.to_lowercase())
            .or_default()
            .push(FeatureItem {
                id: feature.id,
                name: feature.name,
            });
    }

    let categories = grouped
        .into_iter()
        .map(|(category, features)| FeatureCategory {
            name: category.to_uppercase(),
            id: category,
            features,
        })
        .collect();

    Ok(Json(FeatureCatalogResponse { categories }))
}

async fn list_property_types(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.property_type_repo().list().await?))
}

async fn list_values(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.list_repo().values(&name).await?))
}

async fn list_agencies(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.agency_repo().list().await?))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_status = match state.db.health_check().await {
        Ok(()) => "ok",
        Err(_) => "error",
    };

    let status = if db_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if db_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        },
        database: db_status,
    };

    (status, Json(response))
}
