//! TraceFuse API Server
//!
//! REST surface for the lineage engine: edge CRUD, bounded-depth traversal,
//! impact analysis, stateless SQL extraction, and OpenLineage event intake.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use tracefuse_lineage_core::{
    ColumnLineageEdge, ColumnLineageEdgeUpdate, LineageEdge, LineageEdgeUpdate, LineageError,
    NewColumnLineageEdge, NewLineageEdge,
};
use tracefuse_lineage_graph::{ImpactAnalyzer, TraversalEngine};
use tracefuse_lineage_ingest::EventIngestor;
use tracefuse_lineage_store::{EdgeFilter, EdgeStore, SqliteLineageStore};

mod health;
mod lineage;

/// Application state shared across handlers.
///
/// Every collaborator is constructed once here and handed out by `Arc`;
/// handlers never reach for globals.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteLineageStore>,
    pub engine: Arc<TraversalEngine<SqliteLineageStore>>,
    pub impact: Arc<ImpactAnalyzer<SqliteLineageStore>>,
    pub ingestor: Arc<EventIngestor<SqliteLineageStore>>,
}

impl AppState {
    pub fn new(store: Arc<SqliteLineageStore>) -> Self {
        Self {
            engine: Arc::new(TraversalEngine::new(Arc::clone(&store))),
            impact: Arc::new(ImpactAnalyzer::new(Arc::clone(&store))),
            ingestor: Arc::new(EventIngestor::new(Arc::clone(&store))),
            store,
        }
    }
}

/// Error response envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Get database path from environment or use default
    let db_path = std::env::var("TRACEFUSE_DB_PATH")
        .unwrap_or_else(|_| "tracefuse_lineage.db".to_string());

    tracing::info!("Using lineage database at: {}", db_path);

    let store = match SqliteLineageStore::open(&db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open lineage store: {}", e);
            std::process::exit(1);
        }
    };

    let app = router(AppState::new(store));

    // Get port from environment or use default
    let port = std::env::var("TRACEFUSE_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .expect("PORT must be a valid number");

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("TraceFuse API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
        .route("/ready", get(health::readiness_check))
        .route("/api/v1/lineage/edges", post(create_edge).get(list_edges))
        .route(
            "/api/v1/lineage/edges/:id",
            get(get_edge).patch(update_edge).delete(delete_edge),
        )
        .route("/api/v1/lineage/column-edges", post(create_column_edge))
        .route(
            "/api/v1/lineage/column-edges/:id",
            get(get_column_edge)
                .patch(update_column_edge)
                .delete(delete_column_edge),
        )
        .route("/api/v1/lineage/extract", post(lineage::extract_lineage))
        .route("/api/v1/lineage/events", post(lineage::ingest_event))
        .route(
            "/api/v1/lineage/:asset_id/upstream",
            get(lineage::upstream_lineage),
        )
        .route(
            "/api/v1/lineage/:asset_id/downstream",
            get(lineage::downstream_lineage),
        )
        .route(
            "/api/v1/lineage/:asset_id/columns/:column/upstream",
            get(lineage::upstream_column_lineage),
        )
        .route(
            "/api/v1/lineage/:asset_id/columns/:column/downstream",
            get(lineage::downstream_column_lineage),
        )
        .route("/api/v1/impact/:asset_id", get(lineage::asset_impact))
        .route(
            "/api/v1/impact/:asset_id/columns/:column",
            get(lineage::column_impact),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Asset-level edge handlers
// ============================================================================

/// Filters accepted by the edge list endpoint
#[derive(Debug, Deserialize)]
struct EdgeListQuery {
    source_asset_id: Option<String>,
    target_asset_id: Option<String>,
}

/// Outcome of a delete; `deleted` is false when no such row existed
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub id: i64,
    pub deleted: bool,
}

/// Create an asset-level lineage edge
async fn create_edge(
    State(state): State<AppState>,
    Json(new_edge): Json<NewLineageEdge>,
) -> Result<(StatusCode, Json<LineageEdge>), (StatusCode, Json<ErrorResponse>)> {
    let edge = state.store.create_edge(&new_edge).map_err(lineage_error)?;
    Ok((StatusCode::CREATED, Json(edge)))
}

/// Fetch a single edge by id
async fn get_edge(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LineageEdge>, (StatusCode, Json<ErrorResponse>)> {
    let edge = state.store.get_edge(id).map_err(lineage_error)?;
    Ok(Json(edge))
}

/// List edges, optionally filtered by endpoint
async fn list_edges(
    State(state): State<AppState>,
    Query(query): Query<EdgeListQuery>,
) -> Result<Json<Vec<LineageEdge>>, (StatusCode, Json<ErrorResponse>)> {
    let filter = EdgeFilter {
        source_asset_id: query.source_asset_id,
        target_asset_id: query.target_asset_id,
    };
    let edges = state.store.list_edges(&filter).map_err(lineage_error)?;
    Ok(Json(edges))
}

/// Merge mutable fields into an existing edge
async fn update_edge(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<LineageEdgeUpdate>,
) -> Result<Json<LineageEdge>, (StatusCode, Json<ErrorResponse>)> {
    let edge = state
        .store
        .update_edge(id, &update)
        .map_err(lineage_error)?;
    Ok(Json(edge))
}

/// Delete an edge; idempotent on missing ids
async fn delete_edge(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, (StatusCode, Json<ErrorResponse>)> {
    let deleted = state.store.delete_edge(id).map_err(lineage_error)?;
    Ok(Json(DeleteResponse { id, deleted }))
}

// ============================================================================
// Column-level edge handlers
// ============================================================================

/// Create a column-level lineage edge
async fn create_column_edge(
    State(state): State<AppState>,
    Json(new_edge): Json<NewColumnLineageEdge>,
) -> Result<(StatusCode, Json<ColumnLineageEdge>), (StatusCode, Json<ErrorResponse>)> {
    let edge = state
        .store
        .create_column_edge(&new_edge)
        .map_err(lineage_error)?;
    Ok((StatusCode::CREATED, Json(edge)))
}

/// Fetch a single column edge by id
async fn get_column_edge(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ColumnLineageEdge>, (StatusCode, Json<ErrorResponse>)> {
    let edge = state.store.get_column_edge(id).map_err(lineage_error)?;
    Ok(Json(edge))
}

/// Merge mutable fields into an existing column edge
async fn update_column_edge(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<ColumnLineageEdgeUpdate>,
) -> Result<Json<ColumnLineageEdge>, (StatusCode, Json<ErrorResponse>)> {
    let edge = state
        .store
        .update_column_edge(id, &update)
        .map_err(lineage_error)?;
    Ok(Json(edge))
}

/// Delete a column edge; idempotent on missing ids
async fn delete_column_edge(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, (StatusCode, Json<ErrorResponse>)> {
    let deleted = state
        .store
        .delete_column_edge(id)
        .map_err(lineage_error)?;
    Ok(Json(DeleteResponse { id, deleted }))
}

// ============================================================================
// Error mapping
// ============================================================================

/// Map the core error taxonomy onto HTTP statuses
pub(crate) fn lineage_error(err: LineageError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        LineageError::ValidationError(_) => StatusCode::BAD_REQUEST,
        LineageError::EdgeNotFound(_) | LineageError::AssetNotFound(_) => StatusCode::NOT_FOUND,
        LineageError::ConflictError(_) => StatusCode::CONFLICT,
        LineageError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Helper function to create bad request error response
pub(crate) fn bad_request(message: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: message }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn test_state() -> AppState {
        AppState::new(Arc::new(SqliteLineageStore::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_create_and_get_edge() {
        let state = test_state();

        let (status, Json(created)) = create_edge(
            State(state.clone()),
            Json(NewLineageEdge::new("orders", "order_stats").with_transformation_type("DIRECT")),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let Json(fetched) = get_edge(State(state), Path(created.id)).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_edge_rejects_self_loop() {
        let state = test_state();

        let (status, Json(body)) = create_edge(
            State(state),
            Json(NewLineageEdge::new("orders", "orders")),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("itself"));
    }

    #[tokio::test]
    async fn test_get_missing_edge_is_404() {
        let state = test_state();

        let (status, _) = get_edge(State(state), Path(999)).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_edges_with_filter() {
        let state = test_state();
        state
            .store
            .create_edge(&NewLineageEdge::new("a", "b"))
            .unwrap();
        state
            .store
            .create_edge(&NewLineageEdge::new("a", "c"))
            .unwrap();
        state
            .store
            .create_edge(&NewLineageEdge::new("x", "b"))
            .unwrap();

        let Json(edges) = list_edges(
            State(state),
            Query(EdgeListQuery {
                source_asset_id: Some("a".to_string()),
                target_asset_id: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.source_asset_id == "a"));
    }

    #[tokio::test]
    async fn test_update_edge_merges_fields() {
        let state = test_state();
        let edge = state
            .store
            .create_edge(&NewLineageEdge::new("a", "b").with_transformation_logic("SELECT 1"))
            .unwrap();

        let Json(updated) = update_edge(
            State(state),
            Path(edge.id),
            Json(LineageEdgeUpdate {
                transformation_type: Some("DERIVED".to_string()),
                transformation_logic: None,
                metadata: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.transformation_type.as_deref(), Some("DERIVED"));
        assert_eq!(updated.transformation_logic.as_deref(), Some("SELECT 1"));
    }

    #[tokio::test]
    async fn test_delete_edge_reports_existence() {
        let state = test_state();
        let edge = state
            .store
            .create_edge(&NewLineageEdge::new("a", "b"))
            .unwrap();

        let Json(first) = delete_edge(State(state.clone()), Path(edge.id))
            .await
            .unwrap();
        assert!(first.deleted);

        let Json(second) = delete_edge(State(state), Path(edge.id)).await.unwrap();
        assert!(!second.deleted);
    }

    #[tokio::test]
    async fn test_column_edge_lifecycle() {
        let state = test_state();

        let (status, Json(created)) = create_column_edge(
            State(state.clone()),
            Json(NewColumnLineageEdge::direct("orders", "id", "stats", "order_id")),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let Json(updated) = update_column_edge(
            State(state.clone()),
            Path(created.id),
            Json(ColumnLineageEdgeUpdate {
                transformation_expression: Some("CAST(id AS TEXT)".to_string()),
                confidence: Some(0.9),
                metadata: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.confidence, 0.9);

        let Json(deleted) = delete_column_edge(State(state), Path(created.id))
            .await
            .unwrap();
        assert!(deleted.deleted);
    }

    #[tokio::test]
    async fn test_column_edge_confidence_bounds_rejected() {
        let state = test_state();

        let (status, _) = create_column_edge(
            State(state),
            Json(
                NewColumnLineageEdge::direct("orders", "id", "stats", "order_id")
                    .with_confidence(1.5),
            ),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_mapping_covers_taxonomy() {
        let (status, _) = lineage_error(LineageError::ValidationError("bad".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = lineage_error(LineageError::EdgeNotFound(7));
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = lineage_error(LineageError::AssetNotFound("a".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = lineage_error(LineageError::ConflictError("dup".into()));
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = lineage_error(LineageError::StorageUnavailable("busy".into()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = lineage_error(LineageError::Other("boom".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
