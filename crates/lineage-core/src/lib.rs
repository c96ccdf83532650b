//! TraceFuse Lineage Core
//!
//! Core types, error taxonomy, validation rules, and SQLite schema for the
//! TraceFuse lineage and impact-analysis engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod validation;

/// Opaque metadata bag attached to lineage edges.
///
/// Stored and returned verbatim; the engine never interprets its contents.
/// Key order is preserved end to end (`serde_json` with `preserve_order`).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Asset Types
// ============================================================================

/// Classification of a cataloged data asset.
///
/// Assets themselves are owned by the surrounding catalog; the lineage engine
/// only reads the identifier and type to decorate graph nodes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Table,
    Column,
    Database,
    Schema,
    Dataset,
    Pipeline,
    Dashboard,
    Report,
    File,
    Api,
    #[default]
    Other,
}

impl AssetType {
    /// Returns the wire representation of this asset type.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Table => "TABLE",
            AssetType::Column => "COLUMN",
            AssetType::Database => "DATABASE",
            AssetType::Schema => "SCHEMA",
            AssetType::Dataset => "DATASET",
            AssetType::Pipeline => "PIPELINE",
            AssetType::Dashboard => "DASHBOARD",
            AssetType::Report => "REPORT",
            AssetType::File => "FILE",
            AssetType::Api => "API",
            AssetType::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AssetType {
    type Err = LineageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TABLE" => Ok(AssetType::Table),
            "COLUMN" => Ok(AssetType::Column),
            "DATABASE" => Ok(AssetType::Database),
            "SCHEMA" => Ok(AssetType::Schema),
            "DATASET" => Ok(AssetType::Dataset),
            "PIPELINE" => Ok(AssetType::Pipeline),
            "DASHBOARD" => Ok(AssetType::Dashboard),
            "REPORT" => Ok(AssetType::Report),
            "FILE" => Ok(AssetType::File),
            "API" => Ok(AssetType::Api),
            "OTHER" => Ok(AssetType::Other),
            _ => Err(LineageError::ValidationError(format!(
                "Unknown asset type: {}",
                s
            ))),
        }
    }
}

/// Summary of an asset as provided by the catalog's asset lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub id: String,
    pub name: String,
    pub asset_type: AssetType,
}

impl AssetSummary {
    /// Fallback summary for an asset id the catalog no longer knows.
    pub fn unknown(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            asset_type: AssetType::Other,
        }
    }
}

// ============================================================================
// Transformation Types
// ============================================================================

/// Classification of a column-level derivation.
///
/// Shared by the data model, validation, the SQL extractor, and the API;
/// this enum is the single definition, there is no parallel list anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformationType {
    /// Direct column copy: `SELECT a FROM t`
    #[default]
    Direct,
    /// Any other computed expression: casts, arithmetic, scalar and window functions
    Derived,
    /// Aggregate function: `SELECT SUM(a) AS total`
    Aggregated,
    /// Direct copy through a row filter (statement carries a WHERE clause)
    Filtered,
    /// Column produced across a join boundary
    Joined,
    /// CASE expression: `SELECT CASE WHEN a > 0 THEN 'yes' END`
    Case,
    /// COALESCE-family call: `SELECT COALESCE(a, b)`
    Coalesced,
}

impl TransformationType {
    /// Returns the wire representation of this transformation type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationType::Direct => "DIRECT",
            TransformationType::Derived => "DERIVED",
            TransformationType::Aggregated => "AGGREGATED",
            TransformationType::Filtered => "FILTERED",
            TransformationType::Joined => "JOINED",
            TransformationType::Case => "CASE",
            TransformationType::Coalesced => "COALESCED",
        }
    }
}

impl std::fmt::Display for TransformationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransformationType {
    type Err = LineageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DIRECT" => Ok(TransformationType::Direct),
            "DERIVED" => Ok(TransformationType::Derived),
            "AGGREGATED" => Ok(TransformationType::Aggregated),
            "FILTERED" => Ok(TransformationType::Filtered),
            "JOINED" => Ok(TransformationType::Joined),
            "CASE" => Ok(TransformationType::Case),
            "COALESCED" => Ok(TransformationType::Coalesced),
            _ => Err(LineageError::ValidationError(format!(
                "Unknown transformation type: {}",
                s
            ))),
        }
    }
}

// ============================================================================
// Asset-Level Lineage Edges
// ============================================================================

/// A directed asset-level "derives-from" relationship, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEdge {
    /// Store-assigned identifier
    pub id: i64,
    /// Asset the data flows from
    pub source_asset_id: String,
    /// Asset the data flows to
    pub target_asset_id: String,
    /// Free-form transformation label (e.g. "SQL_TRANSFORM", "AGGREGATED", "JOB_RUN")
    pub transformation_type: Option<String>,
    /// Raw transformation text, typically the originating SQL
    pub transformation_logic: Option<String>,
    /// Opaque metadata, returned verbatim
    pub metadata: Metadata,
    /// Store-assigned creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the caller when creating an asset-level edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLineageEdge {
    pub source_asset_id: String,
    pub target_asset_id: String,
    #[serde(default)]
    pub transformation_type: Option<String>,
    #[serde(default)]
    pub transformation_logic: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewLineageEdge {
    /// Create an edge between two assets with no transformation details.
    pub fn new(source_asset_id: impl Into<String>, target_asset_id: impl Into<String>) -> Self {
        Self {
            source_asset_id: source_asset_id.into(),
            target_asset_id: target_asset_id.into(),
            transformation_type: None,
            transformation_logic: None,
            metadata: Metadata::new(),
        }
    }

    /// Set the transformation label.
    pub fn with_transformation_type(mut self, transformation_type: impl Into<String>) -> Self {
        self.transformation_type = Some(transformation_type.into());
        self
    }

    /// Set the raw transformation text.
    pub fn with_transformation_logic(mut self, transformation_logic: impl Into<String>) -> Self {
        self.transformation_logic = Some(transformation_logic.into());
        self
    }

    /// Attach a metadata bag.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validate the invariants the store enforces at creation time.
    pub fn validate(&self) -> Result<()> {
        validation::validate_asset_id(&self.source_asset_id)?;
        validation::validate_asset_id(&self.target_asset_id)?;
        validation::validate_no_self_loop(&self.source_asset_id, &self.target_asset_id)?;
        validation::validate_transformation_label(self.transformation_type.as_deref())?;
        validation::validate_transformation_logic(self.transformation_logic.as_deref())?;
        Ok(())
    }
}

/// Mutable fields of an asset-level edge. Fields left as `None` are unchanged;
/// the source/target pair is immutable once created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineageEdgeUpdate {
    #[serde(default)]
    pub transformation_type: Option<String>,
    #[serde(default)]
    pub transformation_logic: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl LineageEdgeUpdate {
    /// True when the update carries no changes.
    pub fn is_empty(&self) -> bool {
        self.transformation_type.is_none()
            && self.transformation_logic.is_none()
            && self.metadata.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_transformation_label(self.transformation_type.as_deref())?;
        validation::validate_transformation_logic(self.transformation_logic.as_deref())?;
        Ok(())
    }
}

// ============================================================================
// Column-Level Lineage Edges
// ============================================================================

/// A directed column-level derivation relationship, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnLineageEdge {
    /// Store-assigned identifier
    pub id: i64,
    pub source_asset_id: String,
    pub source_column: String,
    pub target_asset_id: String,
    pub target_column: String,
    /// Transformation classification
    pub transformation: TransformationType,
    /// Expression producing the target column, when known
    pub transformation_expression: Option<String>,
    /// Backreference to the asset-level edge this was derived alongside
    pub lineage_edge_id: Option<i64>,
    /// Certainty of an inferred derivation, 0.0–1.0 (1.0 = exact)
    pub confidence: f64,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the caller when creating a column-level edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewColumnLineageEdge {
    pub source_asset_id: String,
    pub source_column: String,
    pub target_asset_id: String,
    pub target_column: String,
    #[serde(default)]
    pub transformation: TransformationType,
    #[serde(default)]
    pub transformation_expression: Option<String>,
    #[serde(default)]
    pub lineage_edge_id: Option<i64>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

fn default_confidence() -> f64 {
    1.0
}

impl NewColumnLineageEdge {
    /// Create a direct (1:1) column mapping at full confidence.
    pub fn direct(
        source_asset_id: impl Into<String>,
        source_column: impl Into<String>,
        target_asset_id: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            source_asset_id: source_asset_id.into(),
            source_column: source_column.into(),
            target_asset_id: target_asset_id.into(),
            target_column: target_column.into(),
            transformation: TransformationType::Direct,
            transformation_expression: None,
            lineage_edge_id: None,
            confidence: 1.0,
            metadata: Metadata::new(),
        }
    }

    /// Create a transformed column mapping carrying its expression.
    pub fn with_expression(
        source_asset_id: impl Into<String>,
        source_column: impl Into<String>,
        target_asset_id: impl Into<String>,
        target_column: impl Into<String>,
        transformation: TransformationType,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            source_asset_id: source_asset_id.into(),
            source_column: source_column.into(),
            target_asset_id: target_asset_id.into(),
            target_column: target_column.into(),
            transformation,
            transformation_expression: Some(expression.into()),
            lineage_edge_id: None,
            confidence: 1.0,
            metadata: Metadata::new(),
        }
    }

    /// Set the confidence score for an inferred derivation.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Link to the asset-level edge this was derived alongside.
    pub fn with_lineage_edge_id(mut self, lineage_edge_id: i64) -> Self {
        self.lineage_edge_id = Some(lineage_edge_id);
        self
    }

    /// Attach a metadata bag.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validate the invariants the store enforces at creation time.
    pub fn validate(&self) -> Result<()> {
        validation::validate_asset_id(&self.source_asset_id)?;
        validation::validate_asset_id(&self.target_asset_id)?;
        validation::validate_column_name(&self.source_column)?;
        validation::validate_column_name(&self.target_column)?;
        validation::validate_no_column_self_loop(
            &self.source_asset_id,
            &self.source_column,
            &self.target_asset_id,
            &self.target_column,
        )?;
        validation::validate_confidence(self.confidence)?;
        validation::validate_transformation_logic(self.transformation_expression.as_deref())?;
        Ok(())
    }
}

/// Mutable fields of a column-level edge. The column-pair identity and the
/// transformation classification are immutable; only the expression,
/// confidence, and metadata may be revised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnLineageEdgeUpdate {
    #[serde(default)]
    pub transformation_expression: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl ColumnLineageEdgeUpdate {
    /// True when the update carries no changes.
    pub fn is_empty(&self) -> bool {
        self.transformation_expression.is_none()
            && self.confidence.is_none()
            && self.metadata.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(confidence) = self.confidence {
            validation::validate_confidence(confidence)?;
        }
        validation::validate_transformation_logic(self.transformation_expression.as_deref())?;
        Ok(())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur in lineage operations
#[derive(Debug, thiserror::Error)]
pub enum LineageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Edge not found: {0}")]
    EdgeNotFound(i64),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict detected: {0}")]
    ConflictError(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl LineageError {
    /// True for transient storage failures the caller may retry.
    ///
    /// The engine itself never retries; that responsibility belongs to the
    /// storage collaborator or the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LineageError::StorageUnavailable(_))
    }
}

/// Result type for lineage operations
pub type Result<T> = std::result::Result<T, LineageError>;

// ============================================================================
// SQLite Schema
// ============================================================================

/// Initialize the SQLite schema for the lineage engine.
///
/// Creates all necessary tables if they don't exist:
/// - `lineage_meta`: schema version bookkeeping
/// - `assets`: asset summaries (owned by the catalog; read-only here)
/// - `lineage_edges`: asset-level lineage
/// - `column_lineage_edges`: column-level lineage
/// - `run_events`: audit log of ingested lineage events
pub fn init_lineage_schema(conn: &rusqlite::Connection) -> Result<()> {
    let ddl = r#"
    -- Schema version bookkeeping
    CREATE TABLE IF NOT EXISTS lineage_meta (
      id INTEGER PRIMARY KEY CHECK (id = 1),
      version INTEGER NOT NULL DEFAULT 1,
      last_modified TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    INSERT OR IGNORE INTO lineage_meta (id, version, last_modified)
    VALUES (1, 1, datetime('now'));

    -- Asset summaries, owned by the surrounding catalog. The engine reads
    -- them to decorate graph nodes and never writes them.
    CREATE TABLE IF NOT EXISTS assets (
      id TEXT PRIMARY KEY,
      name TEXT NOT NULL,
      asset_type TEXT NOT NULL DEFAULT 'OTHER',
      created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_assets_name ON assets(name);

    -- Asset-level lineage edges
    CREATE TABLE IF NOT EXISTS lineage_edges (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      source_asset_id TEXT NOT NULL,
      target_asset_id TEXT NOT NULL,
      transformation_type TEXT,
      transformation_logic TEXT,
      metadata TEXT NOT NULL DEFAULT '{}',
      created_at TEXT NOT NULL,
      CHECK (source_asset_id <> target_asset_id)
    );

    CREATE INDEX IF NOT EXISTS idx_lineage_edges_source ON lineage_edges(source_asset_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_lineage_edges_target ON lineage_edges(target_asset_id, created_at);

    -- Column-level lineage edges
    CREATE TABLE IF NOT EXISTS column_lineage_edges (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      source_asset_id TEXT NOT NULL,
      source_column TEXT NOT NULL,
      target_asset_id TEXT NOT NULL,
      target_column TEXT NOT NULL,
      transformation_type TEXT NOT NULL DEFAULT 'DIRECT',
      transformation_expression TEXT,
      lineage_edge_id INTEGER,
      confidence REAL NOT NULL DEFAULT 1.0 CHECK (confidence >= 0.0 AND confidence <= 1.0),
      metadata TEXT NOT NULL DEFAULT '{}',
      created_at TEXT NOT NULL,
      FOREIGN KEY (lineage_edge_id) REFERENCES lineage_edges(id) ON DELETE SET NULL,
      CHECK (source_asset_id <> target_asset_id OR source_column <> target_column)
    );

    CREATE INDEX IF NOT EXISTS idx_column_edges_source ON column_lineage_edges(source_asset_id, source_column, created_at);
    CREATE INDEX IF NOT EXISTS idx_column_edges_target ON column_lineage_edges(target_asset_id, target_column, created_at);

    -- Audit log of ingested lineage events. Every event is recorded,
    -- including FAIL events that produce no edges.
    CREATE TABLE IF NOT EXISTS run_events (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      run_id TEXT NOT NULL,
      event_type TEXT NOT NULL,
      job_namespace TEXT NOT NULL,
      job_name TEXT NOT NULL,
      event_time TEXT,
      payload TEXT NOT NULL,
      received_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_run_events_run ON run_events(run_id);
    CREATE INDEX IF NOT EXISTS idx_run_events_job ON run_events(job_namespace, job_name);
    "#;

    conn.execute_batch(ddl)?;
    Ok(())
}

/// Get the current schema version.
pub fn get_schema_version(conn: &rusqlite::Connection) -> Result<i64> {
    let version: i64 =
        conn.query_row("SELECT version FROM lineage_meta WHERE id = 1", [], |row| {
            row.get(0)
        })?;
    Ok(version)
}

/// Bump the schema version (call after a schema-affecting change).
pub fn increment_schema_version(conn: &rusqlite::Connection) -> Result<i64> {
    conn.execute(
        "UPDATE lineage_meta SET version = version + 1, last_modified = datetime('now') WHERE id = 1",
        [],
    )?;
    get_schema_version(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_init_schema() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        init_lineage_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"assets".to_string()));
        assert!(tables.contains(&"lineage_edges".to_string()));
        assert!(tables.contains(&"column_lineage_edges".to_string()));
        assert!(tables.contains(&"run_events".to_string()));
    }

    #[test]
    fn test_init_schema_idempotent() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        init_lineage_schema(&conn).unwrap();
        init_lineage_schema(&conn).unwrap();
    }

    #[test]
    fn test_schema_version() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        init_lineage_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), 1);
        assert_eq!(increment_schema_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_asset_type_round_trip() {
        for ty in [
            AssetType::Table,
            AssetType::Column,
            AssetType::Database,
            AssetType::Schema,
            AssetType::Dataset,
            AssetType::Pipeline,
            AssetType::Dashboard,
            AssetType::Report,
            AssetType::File,
            AssetType::Api,
            AssetType::Other,
        ] {
            assert_eq!(AssetType::from_str(ty.as_str()).unwrap(), ty);
        }
        assert_eq!(AssetType::from_str("table").unwrap(), AssetType::Table);
        assert!(AssetType::from_str("WIDGET").is_err());
    }

    #[test]
    fn test_asset_type_serde_wire_format() {
        let json = serde_json::to_string(&AssetType::Pipeline).unwrap();
        assert_eq!(json, "\"PIPELINE\"");
        let parsed: AssetType = serde_json::from_str("\"DASHBOARD\"").unwrap();
        assert_eq!(parsed, AssetType::Dashboard);
    }

    #[test]
    fn test_transformation_type_round_trip() {
        for ty in [
            TransformationType::Direct,
            TransformationType::Derived,
            TransformationType::Aggregated,
            TransformationType::Filtered,
            TransformationType::Joined,
            TransformationType::Case,
            TransformationType::Coalesced,
        ] {
            assert_eq!(TransformationType::from_str(ty.as_str()).unwrap(), ty);
        }
        assert_eq!(
            TransformationType::from_str("aggregated").unwrap(),
            TransformationType::Aggregated
        );
        assert!(TransformationType::from_str("REVERSED").is_err());
    }

    #[test]
    fn test_new_edge_rejects_self_loop() {
        let edge = NewLineageEdge::new("orders", "orders");
        let err = edge.validate().unwrap_err();
        assert!(matches!(err, LineageError::ValidationError(_)));
        assert!(err.to_string().contains("itself"));
    }

    #[test]
    fn test_new_edge_valid() {
        let edge = NewLineageEdge::new("orders", "sales_summary")
            .with_transformation_type("SQL_TRANSFORM")
            .with_transformation_logic("INSERT INTO sales_summary SELECT * FROM orders");
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_column_edge_rejects_same_column_pair() {
        let edge = NewColumnLineageEdge::direct("orders", "amount", "orders", "amount");
        assert!(edge.validate().is_err());

        // Same asset is fine as long as the column differs
        let edge = NewColumnLineageEdge::direct("orders", "amount", "orders", "amount_usd");
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_column_edge_confidence_range() {
        let edge = NewColumnLineageEdge::direct("orders", "amount", "summary", "total")
            .with_confidence(1.5);
        assert!(edge.validate().is_err());

        let edge = NewColumnLineageEdge::direct("orders", "amount", "summary", "total")
            .with_confidence(-0.1);
        assert!(edge.validate().is_err());

        let edge = NewColumnLineageEdge::direct("orders", "amount", "summary", "total")
            .with_confidence(0.5);
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_update_is_empty() {
        assert!(LineageEdgeUpdate::default().is_empty());
        let update = LineageEdgeUpdate {
            transformation_type: Some("JOB_RUN".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_metadata_preserves_key_order() {
        let mut metadata = Metadata::new();
        metadata.insert("zeta".to_string(), serde_json::json!(1));
        metadata.insert("alpha".to_string(), serde_json::json!({"nested": true}));
        metadata.insert("mid".to_string(), serde_json::json!("v"));

        let json = serde_json::to_string(&metadata).unwrap();
        let zeta = json.find("zeta").unwrap();
        let alpha = json.find("alpha").unwrap();
        let mid = json.find("mid").unwrap();
        assert!(zeta < alpha && alpha < mid);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LineageError::StorageUnavailable("busy".into()).is_retryable());
        assert!(!LineageError::ValidationError("bad".into()).is_retryable());
        assert!(!LineageError::EdgeNotFound(7).is_retryable());
    }

    #[test]
    fn test_edge_serialization_round_trip() {
        let edge = NewColumnLineageEdge::with_expression(
            "orders",
            "amount",
            "sales_summary",
            "total_amount",
            TransformationType::Aggregated,
            "SUM(amount)",
        );
        let json = serde_json::to_string(&edge).unwrap();
        assert!(json.contains("\"AGGREGATED\""));
        let parsed: NewColumnLineageEdge = serde_json::from_str(&json).unwrap();
        assert_eq!(edge, parsed);
    }
}
