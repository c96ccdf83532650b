//! TraceFuse Lineage Store
//!
//! SQLite-backed persistence for asset-level and column-level lineage edges,
//! plus the run-event audit log. The traversal engine and the ingestor reach
//! this crate only through the `EdgeStore`, `AssetLookup`, and `RunEventLog`
//! traits, so alternative stores can be swapped in at construction time.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use tracefuse_lineage_core::{
    init_lineage_schema, AssetSummary, AssetType, ColumnLineageEdge, ColumnLineageEdgeUpdate,
    LineageEdge, LineageEdgeUpdate, LineageError, Metadata, NewColumnLineageEdge, NewLineageEdge,
    Result, TransformationType,
};

/// Optional filters for listing asset-level edges.
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub source_asset_id: Option<String>,
    pub target_asset_id: Option<String>,
}

/// A lineage event accepted for audit logging.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRunEvent {
    pub run_id: String,
    pub event_type: String,
    pub job_namespace: String,
    pub job_name: String,
    pub event_time: Option<String>,
    /// Raw event JSON, stored verbatim
    pub payload: String,
}

/// An audited lineage event, as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RunEventRecord {
    pub id: i64,
    pub run_id: String,
    pub event_type: String,
    pub job_namespace: String,
    pub job_name: String,
    pub event_time: Option<String>,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

/// Persistence contract for lineage edges.
///
/// Adjacency queries (`edges_by_source` / `edges_by_target` and the column
/// variants) return rows ordered by `created_at` ascending with id as the
/// tiebreak, so traversal output is deterministic.
pub trait EdgeStore: Send + Sync {
    // Asset-level edges
    fn create_edge(&self, new: &NewLineageEdge) -> Result<LineageEdge>;
    fn get_edge(&self, id: i64) -> Result<LineageEdge>;
    fn list_edges(&self, filter: &EdgeFilter) -> Result<Vec<LineageEdge>>;
    fn update_edge(&self, id: i64, update: &LineageEdgeUpdate) -> Result<LineageEdge>;
    /// Idempotent delete: returns whether a row existed.
    fn delete_edge(&self, id: i64) -> Result<bool>;
    fn edges_by_source(&self, asset_id: &str) -> Result<Vec<LineageEdge>>;
    fn edges_by_target(&self, asset_id: &str) -> Result<Vec<LineageEdge>>;
    /// Dedupe probe: the earliest edge matching the exact
    /// (source, target, transformation label) triple, if any.
    fn find_asset_edge(
        &self,
        source_asset_id: &str,
        target_asset_id: &str,
        transformation_type: Option<&str>,
    ) -> Result<Option<LineageEdge>>;

    // Column-level edges
    fn create_column_edge(&self, new: &NewColumnLineageEdge) -> Result<ColumnLineageEdge>;
    fn get_column_edge(&self, id: i64) -> Result<ColumnLineageEdge>;
    fn update_column_edge(
        &self,
        id: i64,
        update: &ColumnLineageEdgeUpdate,
    ) -> Result<ColumnLineageEdge>;
    /// Idempotent delete: returns whether a row existed.
    fn delete_column_edge(&self, id: i64) -> Result<bool>;
    fn column_edges_by_source(&self, asset_id: &str, column: &str)
        -> Result<Vec<ColumnLineageEdge>>;
    fn column_edges_by_target(&self, asset_id: &str, column: &str)
        -> Result<Vec<ColumnLineageEdge>>;
}

/// Read-only collaborator contract for decorating graph nodes.
///
/// Assets are owned by the surrounding catalog; `None` means the catalog does
/// not know the id, which traversal treats as an `OTHER`-typed placeholder
/// rather than an error.
pub trait AssetLookup: Send + Sync {
    fn asset_summary(&self, asset_id: &str) -> Result<Option<AssetSummary>>;
}

/// Audit log contract for ingested lineage events.
pub trait RunEventLog: Send + Sync {
    fn record_run_event(&self, event: &NewRunEvent) -> Result<i64>;
    fn run_events_for_run(&self, run_id: &str) -> Result<Vec<RunEventRecord>>;
}

/// SQLite implementation of the store traits.
///
/// A single connection guarded by a mutex serializes writes; handlers and
/// traversal hold the lock only for the duration of one statement, never
/// across await points.
#[derive(Clone)]
pub struct SqliteLineageStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLineageStore {
    /// Open (creating if missing) a file-backed store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).map_err(map_sqlite_err)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory store. Used by tests and ephemeral tooling.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(map_sqlite_err)?;
        init_lineage_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| {
            LineageError::StorageUnavailable("connection mutex poisoned".to_string())
        })
    }

    /// Register an asset summary for node decoration.
    ///
    /// This is a catalog-side write: the lineage engine itself never calls
    /// it. It exists for the embedding catalog and for test fixtures.
    pub fn upsert_asset(&self, asset: &AssetSummary) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO assets (id, name, asset_type, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, asset_type = excluded.asset_type",
            params![
                asset.id,
                asset.name,
                asset.asset_type.as_str(),
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    /// Quick connectivity probe for health checks.
    pub fn ping(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(map_sqlite_err)?;
        Ok(())
    }
}

/// Map transient SQLite failures to the retryable error class.
fn map_sqlite_err(err: rusqlite::Error) -> LineageError {
    match &err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::DatabaseBusy
                || code.code == rusqlite::ErrorCode::DatabaseLocked =>
        {
            LineageError::StorageUnavailable(err.to_string())
        }
        _ => LineageError::Sqlite(err),
    }
}

fn serialize_metadata(metadata: &Metadata) -> Result<String> {
    serde_json::to_string(metadata)
        .map_err(|e| LineageError::SerializationError(format!("Invalid metadata: {}", e)))
}

fn parse_metadata(raw: &str) -> Result<Metadata> {
    serde_json::from_str(raw)
        .map_err(|e| LineageError::SerializationError(format!("Invalid stored metadata: {}", e)))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            LineageError::SerializationError(format!("Invalid stored timestamp {:?}: {}", raw, e))
        })
}

// Raw row images: rusqlite's row closures can only fail with rusqlite
// errors, so JSON/timestamp parsing happens after the fetch.

struct EdgeRow {
    id: i64,
    source_asset_id: String,
    target_asset_id: String,
    transformation_type: Option<String>,
    transformation_logic: Option<String>,
    metadata: String,
    created_at: String,
}

const EDGE_COLUMNS: &str = "id, source_asset_id, target_asset_id, transformation_type, \
                            transformation_logic, metadata, created_at";

fn edge_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EdgeRow> {
    Ok(EdgeRow {
        id: row.get(0)?,
        source_asset_id: row.get(1)?,
        target_asset_id: row.get(2)?,
        transformation_type: row.get(3)?,
        transformation_logic: row.get(4)?,
        metadata: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl EdgeRow {
    fn into_edge(self) -> Result<LineageEdge> {
        Ok(LineageEdge {
            id: self.id,
            source_asset_id: self.source_asset_id,
            target_asset_id: self.target_asset_id,
            transformation_type: self.transformation_type,
            transformation_logic: self.transformation_logic,
            metadata: parse_metadata(&self.metadata)?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

struct ColumnEdgeRow {
    id: i64,
    source_asset_id: String,
    source_column: String,
    target_asset_id: String,
    target_column: String,
    transformation_type: String,
    transformation_expression: Option<String>,
    lineage_edge_id: Option<i64>,
    confidence: f64,
    metadata: String,
    created_at: String,
}

const COLUMN_EDGE_COLUMNS: &str =
    "id, source_asset_id, source_column, target_asset_id, target_column, transformation_type, \
     transformation_expression, lineage_edge_id, confidence, metadata, created_at";

fn column_edge_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ColumnEdgeRow> {
    Ok(ColumnEdgeRow {
        id: row.get(0)?,
        source_asset_id: row.get(1)?,
        source_column: row.get(2)?,
        target_asset_id: row.get(3)?,
        target_column: row.get(4)?,
        transformation_type: row.get(5)?,
        transformation_expression: row.get(6)?,
        lineage_edge_id: row.get(7)?,
        confidence: row.get(8)?,
        metadata: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl ColumnEdgeRow {
    fn into_edge(self) -> Result<ColumnLineageEdge> {
        let transformation =
            TransformationType::from_str(&self.transformation_type).map_err(|_| {
                LineageError::SerializationError(format!(
                    "Invalid stored transformation type: {}",
                    self.transformation_type
                ))
            })?;
        Ok(ColumnLineageEdge {
            id: self.id,
            source_asset_id: self.source_asset_id,
            source_column: self.source_column,
            target_asset_id: self.target_asset_id,
            target_column: self.target_column,
            transformation,
            transformation_expression: self.transformation_expression,
            lineage_edge_id: self.lineage_edge_id,
            confidence: self.confidence,
            metadata: parse_metadata(&self.metadata)?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl EdgeStore for SqliteLineageStore {
    fn create_edge(&self, new: &NewLineageEdge) -> Result<LineageEdge> {
        new.validate()?;
        let metadata = serialize_metadata(&new.metadata)?;
        let created_at = Utc::now();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO lineage_edges (source_asset_id, target_asset_id, transformation_type, \
             transformation_logic, metadata, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.source_asset_id,
                new.target_asset_id,
                new.transformation_type,
                new.transformation_logic,
                metadata,
                created_at.to_rfc3339()
            ],
        )
        .map_err(map_sqlite_err)?;
        let id = conn.last_insert_rowid();

        tracing::debug!(
            edge_id = id,
            source = %new.source_asset_id,
            target = %new.target_asset_id,
            "created lineage edge"
        );

        Ok(LineageEdge {
            id,
            source_asset_id: new.source_asset_id.clone(),
            target_asset_id: new.target_asset_id.clone(),
            transformation_type: new.transformation_type.clone(),
            transformation_logic: new.transformation_logic.clone(),
            metadata: new.metadata.clone(),
            created_at,
        })
    }

    fn get_edge(&self, id: i64) -> Result<LineageEdge> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM lineage_edges WHERE id = ?1", EDGE_COLUMNS),
                [id],
                edge_row,
            )
            .optional()
            .map_err(map_sqlite_err)?;
        drop(conn);

        row.ok_or(LineageError::EdgeNotFound(id))?.into_edge()
    }

    fn list_edges(&self, filter: &EdgeFilter) -> Result<Vec<LineageEdge>> {
        let mut query = format!("SELECT {} FROM lineage_edges WHERE 1=1", EDGE_COLUMNS);
        let mut bindings: Vec<String> = Vec::new();

        if let Some(source) = &filter.source_asset_id {
            query.push_str(" AND source_asset_id = ?");
            bindings.push(source.clone());
        }

        if let Some(target) = &filter.target_asset_id {
            query.push_str(" AND target_asset_id = ?");
            bindings.push(target.clone());
        }

        query.push_str(" ORDER BY created_at ASC, id ASC");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&query).map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(params_from_iter(bindings.iter()), edge_row)
            .map_err(map_sqlite_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_sqlite_err)?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(EdgeRow::into_edge).collect()
    }

    fn update_edge(&self, id: i64, update: &LineageEdgeUpdate) -> Result<LineageEdge> {
        update.validate()?;
        if update.is_empty() {
            return self.get_edge(id);
        }

        let metadata = update.metadata.as_ref().map(serialize_metadata).transpose()?;

        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE lineage_edges SET \
                   transformation_type = COALESCE(?2, transformation_type), \
                   transformation_logic = COALESCE(?3, transformation_logic), \
                   metadata = COALESCE(?4, metadata) \
                 WHERE id = ?1",
                params![
                    id,
                    update.transformation_type,
                    update.transformation_logic,
                    metadata
                ],
            )
            .map_err(map_sqlite_err)?;
        drop(conn);

        if changed == 0 {
            return Err(LineageError::EdgeNotFound(id));
        }
        self.get_edge(id)
    }

    fn delete_edge(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM lineage_edges WHERE id = ?1", [id])
            .map_err(map_sqlite_err)?;
        Ok(deleted > 0)
    }

    fn edges_by_source(&self, asset_id: &str) -> Result<Vec<LineageEdge>> {
        self.list_edges(&EdgeFilter {
            source_asset_id: Some(asset_id.to_string()),
            target_asset_id: None,
        })
    }

    fn edges_by_target(&self, asset_id: &str) -> Result<Vec<LineageEdge>> {
        self.list_edges(&EdgeFilter {
            source_asset_id: None,
            target_asset_id: Some(asset_id.to_string()),
        })
    }

    fn find_asset_edge(
        &self,
        source_asset_id: &str,
        target_asset_id: &str,
        transformation_type: Option<&str>,
    ) -> Result<Option<LineageEdge>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM lineage_edges \
                     WHERE source_asset_id = ?1 AND target_asset_id = ?2 \
                       AND transformation_type IS ?3 \
                     ORDER BY created_at ASC, id ASC LIMIT 1",
                    EDGE_COLUMNS
                ),
                params![source_asset_id, target_asset_id, transformation_type],
                edge_row,
            )
            .optional()
            .map_err(map_sqlite_err)?;
        drop(conn);

        row.map(EdgeRow::into_edge).transpose()
    }

    fn create_column_edge(&self, new: &NewColumnLineageEdge) -> Result<ColumnLineageEdge> {
        new.validate()?;
        let metadata = serialize_metadata(&new.metadata)?;
        let created_at = Utc::now();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO column_lineage_edges (source_asset_id, source_column, target_asset_id, \
             target_column, transformation_type, transformation_expression, lineage_edge_id, \
             confidence, metadata, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                new.source_asset_id,
                new.source_column,
                new.target_asset_id,
                new.target_column,
                new.transformation.as_str(),
                new.transformation_expression,
                new.lineage_edge_id,
                new.confidence,
                metadata,
                created_at.to_rfc3339()
            ],
        )
        .map_err(map_sqlite_err)?;
        let id = conn.last_insert_rowid();

        tracing::debug!(
            edge_id = id,
            source = %new.source_asset_id,
            source_column = %new.source_column,
            target = %new.target_asset_id,
            target_column = %new.target_column,
            "created column lineage edge"
        );

        Ok(ColumnLineageEdge {
            id,
            source_asset_id: new.source_asset_id.clone(),
            source_column: new.source_column.clone(),
            target_asset_id: new.target_asset_id.clone(),
            target_column: new.target_column.clone(),
            transformation: new.transformation,
            transformation_expression: new.transformation_expression.clone(),
            lineage_edge_id: new.lineage_edge_id,
            confidence: new.confidence,
            metadata: new.metadata.clone(),
            created_at,
        })
    }

    fn get_column_edge(&self, id: i64) -> Result<ColumnLineageEdge> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM column_lineage_edges WHERE id = ?1",
                    COLUMN_EDGE_COLUMNS
                ),
                [id],
                column_edge_row,
            )
            .optional()
            .map_err(map_sqlite_err)?;
        drop(conn);

        row.ok_or(LineageError::EdgeNotFound(id))?.into_edge()
    }

    fn update_column_edge(
        &self,
        id: i64,
        update: &ColumnLineageEdgeUpdate,
    ) -> Result<ColumnLineageEdge> {
        update.validate()?;
        if update.is_empty() {
            return self.get_column_edge(id);
        }

        let metadata = update.metadata.as_ref().map(serialize_metadata).transpose()?;

        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE column_lineage_edges SET \
                   transformation_expression = COALESCE(?2, transformation_expression), \
                   confidence = COALESCE(?3, confidence), \
                   metadata = COALESCE(?4, metadata) \
                 WHERE id = ?1",
                params![id, update.transformation_expression, update.confidence, metadata],
            )
            .map_err(map_sqlite_err)?;
        drop(conn);

        if changed == 0 {
            return Err(LineageError::EdgeNotFound(id));
        }
        self.get_column_edge(id)
    }

    fn delete_column_edge(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM column_lineage_edges WHERE id = ?1", [id])
            .map_err(map_sqlite_err)?;
        Ok(deleted > 0)
    }

    fn column_edges_by_source(
        &self,
        asset_id: &str,
        column: &str,
    ) -> Result<Vec<ColumnLineageEdge>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM column_lineage_edges \
                 WHERE source_asset_id = ?1 AND source_column = ?2 \
                 ORDER BY created_at ASC, id ASC",
                COLUMN_EDGE_COLUMNS
            ))
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(params![asset_id, column], column_edge_row)
            .map_err(map_sqlite_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_sqlite_err)?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(ColumnEdgeRow::into_edge).collect()
    }

    fn column_edges_by_target(
        &self,
        asset_id: &str,
        column: &str,
    ) -> Result<Vec<ColumnLineageEdge>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM column_lineage_edges \
                 WHERE target_asset_id = ?1 AND target_column = ?2 \
                 ORDER BY created_at ASC, id ASC",
                COLUMN_EDGE_COLUMNS
            ))
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(params![asset_id, column], column_edge_row)
            .map_err(map_sqlite_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_sqlite_err)?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(ColumnEdgeRow::into_edge).collect()
    }
}

impl AssetLookup for SqliteLineageStore {
    fn asset_summary(&self, asset_id: &str) -> Result<Option<AssetSummary>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, name, asset_type FROM assets WHERE id = ?1",
                [asset_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(map_sqlite_err)?;

        Ok(row.map(|(id, name, asset_type)| AssetSummary {
            id,
            name,
            // Tolerate foreign type tags written by other catalog versions
            asset_type: AssetType::from_str(&asset_type).unwrap_or(AssetType::Other),
        }))
    }
}

impl RunEventLog for SqliteLineageStore {
    fn record_run_event(&self, event: &NewRunEvent) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO run_events (run_id, event_type, job_namespace, job_name, event_time, \
             payload, received_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.run_id,
                event.event_type,
                event.job_namespace,
                event.job_name,
                event.event_time,
                event.payload,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn run_events_for_run(&self, run_id: &str) -> Result<Vec<RunEventRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, run_id, event_type, job_namespace, job_name, event_time, payload, \
                 received_at FROM run_events WHERE run_id = ?1 ORDER BY received_at ASC, id ASC",
            )
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map([run_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .map_err(map_sqlite_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_sqlite_err)?;
        drop(stmt);
        drop(conn);

        rows.into_iter()
            .map(
                |(id, run_id, event_type, job_namespace, job_name, event_time, payload, received)| {
                    Ok(RunEventRecord {
                        id,
                        run_id,
                        event_type,
                        job_namespace,
                        job_name,
                        event_time,
                        payload,
                        received_at: parse_timestamp(&received)?,
                    })
                },
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracefuse_lineage_core::TransformationType;

    fn test_store() -> SqliteLineageStore {
        SqliteLineageStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_and_get_edge_round_trip() {
        let store = test_store();
        let created = store
            .create_edge(
                &NewLineageEdge::new("orders", "sales_summary")
                    .with_transformation_type("SQL_TRANSFORM")
                    .with_transformation_logic("INSERT INTO sales_summary SELECT * FROM orders"),
            )
            .unwrap();

        let fetched = store.get_edge(created.id).unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.source_asset_id, "orders");
        assert_eq!(fetched.target_asset_id, "sales_summary");
    }

    #[test]
    fn test_self_loop_rejected_and_nothing_persisted() {
        let store = test_store();
        let err = store
            .create_edge(&NewLineageEdge::new("orders", "orders"))
            .unwrap_err();
        assert!(matches!(err, LineageError::ValidationError(_)));

        let all = store.list_edges(&EdgeFilter::default()).unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn test_get_missing_edge() {
        let store = test_store();
        let err = store.get_edge(404).unwrap_err();
        assert!(matches!(err, LineageError::EdgeNotFound(404)));
    }

    #[test]
    fn test_update_edge_merges_only_provided_fields() {
        let store = test_store();
        let created = store
            .create_edge(
                &NewLineageEdge::new("orders", "sales_summary")
                    .with_transformation_type("SQL_TRANSFORM")
                    .with_transformation_logic("SELECT 1"),
            )
            .unwrap();

        let updated = store
            .update_edge(
                created.id,
                &LineageEdgeUpdate {
                    transformation_type: Some("AGGREGATED".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.transformation_type.as_deref(), Some("AGGREGATED"));
        // Untouched fields survive
        assert_eq!(updated.transformation_logic.as_deref(), Some("SELECT 1"));
        assert_eq!(updated.source_asset_id, "orders");
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn test_update_missing_edge() {
        let store = test_store();
        let err = store
            .update_edge(
                7,
                &LineageEdgeUpdate {
                    transformation_type: Some("X".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, LineageError::EdgeNotFound(7)));
    }

    #[test]
    fn test_empty_update_is_noop() {
        let store = test_store();
        let created = store
            .create_edge(&NewLineageEdge::new("a", "b"))
            .unwrap();
        let updated = store
            .update_edge(created.id, &LineageEdgeUpdate::default())
            .unwrap();
        assert_eq!(created, updated);
    }

    #[test]
    fn test_delete_edge_is_idempotent() {
        let store = test_store();
        let created = store
            .create_edge(&NewLineageEdge::new("a", "b"))
            .unwrap();

        assert!(store.delete_edge(created.id).unwrap());
        assert!(!store.delete_edge(created.id).unwrap());
        assert!(matches!(
            store.get_edge(created.id).unwrap_err(),
            LineageError::EdgeNotFound(_)
        ));
    }

    #[test]
    fn test_adjacency_ordered_by_creation() {
        let store = test_store();
        store.create_edge(&NewLineageEdge::new("a", "b")).unwrap();
        store.create_edge(&NewLineageEdge::new("a", "c")).unwrap();
        store.create_edge(&NewLineageEdge::new("a", "d")).unwrap();

        let out = store.edges_by_source("a").unwrap();
        let targets: Vec<&str> = out.iter().map(|e| e.target_asset_id.as_str()).collect();
        assert_eq!(targets, vec!["b", "c", "d"]);

        let inbound = store.edges_by_target("b").unwrap();
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].source_asset_id, "a");
    }

    #[test]
    fn test_list_edges_filters() {
        let store = test_store();
        store.create_edge(&NewLineageEdge::new("a", "b")).unwrap();
        store.create_edge(&NewLineageEdge::new("a", "c")).unwrap();
        store.create_edge(&NewLineageEdge::new("x", "b")).unwrap();

        let by_source = store
            .list_edges(&EdgeFilter {
                source_asset_id: Some("a".to_string()),
                target_asset_id: None,
            })
            .unwrap();
        assert_eq!(by_source.len(), 2);

        let both = store
            .list_edges(&EdgeFilter {
                source_asset_id: Some("a".to_string()),
                target_asset_id: Some("b".to_string()),
            })
            .unwrap();
        assert_eq!(both.len(), 1);

        let all = store.list_edges(&EdgeFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_find_asset_edge_matches_exact_triple() {
        let store = test_store();
        store
            .create_edge(&NewLineageEdge::new("a", "b").with_transformation_type("JOB_RUN"))
            .unwrap();

        assert!(store
            .find_asset_edge("a", "b", Some("JOB_RUN"))
            .unwrap()
            .is_some());
        assert!(store
            .find_asset_edge("a", "b", Some("SQL_TRANSFORM"))
            .unwrap()
            .is_none());
        assert!(store.find_asset_edge("a", "b", None).unwrap().is_none());

        store.create_edge(&NewLineageEdge::new("a", "b")).unwrap();
        assert!(store.find_asset_edge("a", "b", None).unwrap().is_some());
    }

    #[test]
    fn test_column_edge_round_trip() {
        let store = test_store();
        let created = store
            .create_column_edge(
                &NewColumnLineageEdge::with_expression(
                    "orders",
                    "amount",
                    "sales_summary",
                    "total_amount",
                    TransformationType::Aggregated,
                    "SUM(amount)",
                )
                .with_confidence(0.9),
            )
            .unwrap();

        let fetched = store.get_column_edge(created.id).unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.transformation, TransformationType::Aggregated);
        assert!((fetched.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_column_edge_confidence_validated() {
        let store = test_store();
        let err = store
            .create_column_edge(
                &NewColumnLineageEdge::direct("orders", "amount", "summary", "total")
                    .with_confidence(2.0),
            )
            .unwrap_err();
        assert!(matches!(err, LineageError::ValidationError(_)));
    }

    #[test]
    fn test_column_edge_update_keeps_identity() {
        let store = test_store();
        let created = store
            .create_column_edge(&NewColumnLineageEdge::direct(
                "orders",
                "amount",
                "summary",
                "total",
            ))
            .unwrap();

        let updated = store
            .update_column_edge(
                created.id,
                &ColumnLineageEdgeUpdate {
                    confidence: Some(0.4),
                    transformation_expression: Some("amount".to_string()),
                    metadata: None,
                },
            )
            .unwrap();

        assert!((updated.confidence - 0.4).abs() < f64::EPSILON);
        assert_eq!(updated.source_column, "amount");
        assert_eq!(updated.target_column, "total");
        assert_eq!(updated.transformation, created.transformation);
    }

    #[test]
    fn test_column_adjacency() {
        let store = test_store();
        store
            .create_column_edge(&NewColumnLineageEdge::direct("a", "x", "b", "y"))
            .unwrap();
        store
            .create_column_edge(&NewColumnLineageEdge::direct("a", "x", "c", "z"))
            .unwrap();

        let downstream = store.column_edges_by_source("a", "x").unwrap();
        assert_eq!(downstream.len(), 2);

        let upstream = store.column_edges_by_target("b", "y").unwrap();
        assert_eq!(upstream.len(), 1);
        assert_eq!(upstream[0].source_column, "x");
    }

    #[test]
    fn test_column_edge_backref_cleared_on_parent_delete() {
        let store = test_store();
        let parent = store
            .create_edge(&NewLineageEdge::new("orders", "summary"))
            .unwrap();
        let child = store
            .create_column_edge(
                &NewColumnLineageEdge::direct("orders", "amount", "summary", "total")
                    .with_lineage_edge_id(parent.id),
            )
            .unwrap();
        assert_eq!(child.lineage_edge_id, Some(parent.id));

        store.delete_edge(parent.id).unwrap();
        let orphan = store.get_column_edge(child.id).unwrap();
        assert_eq!(orphan.lineage_edge_id, None);
    }

    #[test]
    fn test_metadata_round_trips_verbatim() {
        let store = test_store();
        let mut metadata = Metadata::new();
        metadata.insert("zeta".to_string(), serde_json::json!(1));
        metadata.insert("alpha".to_string(), serde_json::json!({"deep": [1, 2]}));

        let created = store
            .create_edge(&NewLineageEdge::new("a", "b").with_metadata(metadata.clone()))
            .unwrap();
        let fetched = store.get_edge(created.id).unwrap();
        assert_eq!(fetched.metadata, metadata);

        let keys: Vec<&String> = fetched.metadata.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_asset_lookup() {
        let store = test_store();
        assert!(store.asset_summary("orders").unwrap().is_none());

        store
            .upsert_asset(&AssetSummary {
                id: "orders".to_string(),
                name: "Orders".to_string(),
                asset_type: AssetType::Table,
            })
            .unwrap();

        let summary = store.asset_summary("orders").unwrap().unwrap();
        assert_eq!(summary.name, "Orders");
        assert_eq!(summary.asset_type, AssetType::Table);
    }

    #[test]
    fn test_run_event_log() {
        let store = test_store();
        let id = store
            .record_run_event(&NewRunEvent {
                run_id: "run-1".to_string(),
                event_type: "COMPLETE".to_string(),
                job_namespace: "etl".to_string(),
                job_name: "daily_sales".to_string(),
                event_time: Some("2024-01-01T00:00:00Z".to_string()),
                payload: "{}".to_string(),
            })
            .unwrap();
        assert!(id > 0);

        let events = store.run_events_for_run("run-1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "COMPLETE");
        assert_eq!(events[0].job_name, "daily_sales");

        assert!(store.run_events_for_run("run-2").unwrap().is_empty());
    }

    #[test]
    fn test_ping() {
        let store = test_store();
        assert!(store.ping().is_ok());
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lineage.db");

        let store = SqliteLineageStore::open(&path).unwrap();
        let created = store.create_edge(&NewLineageEdge::new("a", "b")).unwrap();
        drop(store);

        let reopened = SqliteLineageStore::open(&path).unwrap();
        let fetched = reopened.get_edge(created.id).unwrap();
        assert_eq!(fetched.source_asset_id, "a");
    }
}
