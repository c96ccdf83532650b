//! Lineage Query Module
//!
//! Handlers for bounded-depth traversal, downstream impact analysis,
//! stateless SQL extraction, and OpenLineage event intake. Depth ceilings
//! are enforced here at the route boundary (1-50 for traversal, 1-100 for
//! impact); the engine itself only rejects depth 0.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use tracefuse_lineage_core::validation::{
    validate_depth, DEFAULT_TRAVERSAL_DEPTH, MAX_IMPACT_DEPTH, MAX_TRAVERSAL_DEPTH,
};
use tracefuse_lineage_graph::{
    ColumnImpactAnalysisResult, ColumnLineageGraph, Direction, ImpactAnalysisResult, LineageGraph,
    TraversalOptions,
};
use tracefuse_lineage_ingest::{IngestReport, RunEvent};
use tracefuse_lineage_sql::{LineageExtractor, SqlDialect, SqlExtraction};

use crate::{bad_request, lineage_error, AppState, ErrorResponse};

/// Traversal depth, bounded to 1-50
#[derive(Debug, Deserialize)]
pub struct DepthQuery {
    #[serde(default = "default_depth")]
    pub depth: u32,
}

/// Impact depth, bounded to 1-100
#[derive(Debug, Deserialize)]
pub struct ImpactQuery {
    #[serde(default = "default_depth")]
    pub max_depth: u32,
}

fn default_depth() -> u32 {
    DEFAULT_TRAVERSAL_DEPTH
}

/// Extraction request body; the SQL is parsed, never persisted
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub sql: String,
    #[serde(default)]
    pub dialect: SqlDialect,
}

// ============================================================================
// Traversal handlers
// ============================================================================

/// What the asset is derived from
pub async fn upstream_lineage(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<LineageGraph>, (StatusCode, Json<ErrorResponse>)> {
    traverse(&state, &asset_id, Direction::Upstream, query.depth)
}

/// What derives from the asset
pub async fn downstream_lineage(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<LineageGraph>, (StatusCode, Json<ErrorResponse>)> {
    traverse(&state, &asset_id, Direction::Downstream, query.depth)
}

fn traverse(
    state: &AppState,
    asset_id: &str,
    direction: Direction,
    depth: u32,
) -> Result<Json<LineageGraph>, (StatusCode, Json<ErrorResponse>)> {
    validate_depth(depth, MAX_TRAVERSAL_DEPTH).map_err(lineage_error)?;
    let graph = state
        .engine
        .traverse(asset_id, direction, &TraversalOptions::depth(depth))
        .map_err(lineage_error)?;
    Ok(Json(graph))
}

/// What the column is derived from
pub async fn upstream_column_lineage(
    State(state): State<AppState>,
    Path((asset_id, column)): Path<(String, String)>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<ColumnLineageGraph>, (StatusCode, Json<ErrorResponse>)> {
    traverse_column(&state, &asset_id, &column, Direction::Upstream, query.depth)
}

/// What derives from the column
pub async fn downstream_column_lineage(
    State(state): State<AppState>,
    Path((asset_id, column)): Path<(String, String)>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<ColumnLineageGraph>, (StatusCode, Json<ErrorResponse>)> {
    traverse_column(
        &state,
        &asset_id,
        &column,
        Direction::Downstream,
        query.depth,
    )
}

fn traverse_column(
    state: &AppState,
    asset_id: &str,
    column: &str,
    direction: Direction,
    depth: u32,
) -> Result<Json<ColumnLineageGraph>, (StatusCode, Json<ErrorResponse>)> {
    validate_depth(depth, MAX_TRAVERSAL_DEPTH).map_err(lineage_error)?;
    let graph = state
        .engine
        .traverse_column(asset_id, column, direction, &TraversalOptions::depth(depth))
        .map_err(lineage_error)?;
    Ok(Json(graph))
}

// ============================================================================
// Impact handlers
// ============================================================================

/// Downstream blast radius of a change to the asset
pub async fn asset_impact(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
    Query(query): Query<ImpactQuery>,
) -> Result<Json<ImpactAnalysisResult>, (StatusCode, Json<ErrorResponse>)> {
    validate_depth(query.max_depth, MAX_IMPACT_DEPTH).map_err(lineage_error)?;
    let result = state
        .impact
        .analyze(&asset_id, &TraversalOptions::depth(query.max_depth))
        .map_err(lineage_error)?;
    Ok(Json(result))
}

/// Downstream blast radius of a change to the column
pub async fn column_impact(
    State(state): State<AppState>,
    Path((asset_id, column)): Path<(String, String)>,
    Query(query): Query<ImpactQuery>,
) -> Result<Json<ColumnImpactAnalysisResult>, (StatusCode, Json<ErrorResponse>)> {
    validate_depth(query.max_depth, MAX_IMPACT_DEPTH).map_err(lineage_error)?;
    let result = state
        .impact
        .analyze_column(&asset_id, &column, &TraversalOptions::depth(query.max_depth))
        .map_err(lineage_error)?;
    Ok(Json(result))
}

// ============================================================================
// Extraction and ingestion handlers
// ============================================================================

/// Extract candidate lineage edges from a SQL statement.
///
/// Purely analytical: the extraction is returned to the caller and nothing
/// is written to the store.
pub async fn extract_lineage(
    Json(request): Json<ExtractRequest>,
) -> Result<Json<SqlExtraction>, (StatusCode, Json<ErrorResponse>)> {
    let extraction = LineageExtractor::new(request.dialect)
        .extract(&request.sql)
        .map_err(|e| bad_request(e.to_string()))?;
    Ok(Json(extraction))
}

/// Accept an OpenLineage run event for audit and edge creation
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(event): Json<RunEvent>,
) -> Result<(StatusCode, Json<IngestReport>), (StatusCode, Json<ErrorResponse>)> {
    let report = state.ingestor.ingest(&event).map_err(lineage_error)?;
    Ok((StatusCode::ACCEPTED, Json(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_state;
    use tracefuse_lineage_core::{NewColumnLineageEdge, NewLineageEdge};
    use tracefuse_lineage_store::{EdgeFilter, EdgeStore};

    fn seed_chain(state: &AppState, assets: &[&str]) {
        for pair in assets.windows(2) {
            state
                .store
                .create_edge(&NewLineageEdge::new(pair[0], pair[1]))
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_upstream_and_downstream_routes() {
        let state = test_state();
        seed_chain(&state, &["raw", "staged", "mart"]);

        let Json(down) = downstream_lineage(
            State(state.clone()),
            Path("raw".to_string()),
            Query(DepthQuery { depth: 10 }),
        )
        .await
        .unwrap();
        assert_eq!(down.nodes.len(), 3);
        assert_eq!(down.node("mart").unwrap().depth, 2);

        let Json(up) = upstream_lineage(
            State(state),
            Path("mart".to_string()),
            Query(DepthQuery { depth: 1 }),
        )
        .await
        .unwrap();
        assert_eq!(up.nodes.len(), 2);
        assert_eq!(up.node("staged").unwrap().depth, 1);
    }

    #[tokio::test]
    async fn test_depth_ceiling_enforced_at_route() {
        let state = test_state();

        let (status, _) = downstream_lineage(
            State(state.clone()),
            Path("a".to_string()),
            Query(DepthQuery { depth: 0 }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, Json(body)) = downstream_lineage(
            State(state.clone()),
            Path("a".to_string()),
            Query(DepthQuery { depth: 51 }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("50"));

        // 50 is the last admissible traversal depth.
        assert!(downstream_lineage(
            State(state),
            Path("a".to_string()),
            Query(DepthQuery { depth: 50 }),
        )
        .await
        .is_ok());
    }

    #[tokio::test]
    async fn test_impact_route_reports_blast_radius() {
        let state = test_state();
        seed_chain(&state, &["a", "b", "c"]);

        let Json(result) = asset_impact(
            State(state),
            Path("a".to_string()),
            Query(ImpactQuery { max_depth: 10 }),
        )
        .await
        .unwrap();
        assert_eq!(result.total_impacted, 2);
        assert_eq!(
            result.impacted.last().unwrap().path,
            vec!["a", "b", "c"]
        );
    }

    #[tokio::test]
    async fn test_impact_ceiling_is_one_hundred() {
        let state = test_state();

        let (status, _) = asset_impact(
            State(state.clone()),
            Path("a".to_string()),
            Query(ImpactQuery { max_depth: 101 }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(asset_impact(
            State(state),
            Path("a".to_string()),
            Query(ImpactQuery { max_depth: 100 }),
        )
        .await
        .is_ok());
    }

    #[tokio::test]
    async fn test_column_routes() {
        let state = test_state();
        state
            .store
            .create_column_edge(&NewColumnLineageEdge::direct(
                "orders", "amount", "daily", "revenue",
            ))
            .unwrap();

        let Json(graph) = upstream_column_lineage(
            State(state.clone()),
            Path(("daily".to_string(), "revenue".to_string())),
            Query(DepthQuery { depth: 10 }),
        )
        .await
        .unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.node("orders", "amount").is_some());

        let Json(impact) = column_impact(
            State(state),
            Path(("orders".to_string(), "amount".to_string())),
            Query(ImpactQuery { max_depth: 10 }),
        )
        .await
        .unwrap();
        assert_eq!(impact.total_impacted, 1);
    }

    #[tokio::test]
    async fn test_extract_returns_edges_without_persisting() {
        let state = test_state();

        let Json(extraction) = extract_lineage(Json(ExtractRequest {
            sql: "INSERT INTO sales_summary SELECT customer_id, SUM(amount) \
                  FROM orders GROUP BY customer_id"
                .to_string(),
            dialect: SqlDialect::Postgres,
        }))
        .await
        .unwrap();

        assert_eq!(extraction.target_table, "sales_summary");
        assert_eq!(extraction.source_tables, vec!["orders"]);
        assert_eq!(extraction.asset_edges.len(), 1);

        // The endpoint is analytical only; the store must stay untouched.
        assert!(state
            .store
            .list_edges(&EdgeFilter::default())
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_extract_parse_failure_is_bad_request() {
        let (status, Json(body)) = extract_lineage(Json(ExtractRequest {
            sql: "INSERT INTO broken SELEC".to_string(),
            dialect: SqlDialect::Generic,
        }))
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.error.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_route_returns_accepted() {
        let state = test_state();
        let event: RunEvent = serde_json::from_str(
            r#"{
                "eventType": "COMPLETE",
                "eventTime": "2024-03-01T12:00:00Z",
                "run": {"runId": "run-1"},
                "job": {"namespace": "etl", "name": "nightly"},
                "inputs": [{"namespace": "wh", "name": "orders"}],
                "outputs": [{"namespace": "wh", "name": "daily"}]
            }"#,
        )
        .unwrap();

        let (status, Json(report)) = ingest_event(State(state.clone()), Json(event.clone()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(report.edges_created, 1);

        // Replay is deduplicated, not duplicated.
        let (_, Json(replay)) = ingest_event(State(state), Json(event)).await.unwrap();
        assert_eq!(replay.edges_created, 0);
        assert_eq!(replay.edges_deduplicated, 1);
    }
}
