//! TraceFuse: a data lineage and impact-analysis engine.
//!
//! This facade re-exports the workspace crates so callers can depend on a
//! single package:
//!
//! - [`core`]: shared models, validation rules, error taxonomy, schema bootstrap
//! - [`store`]: `EdgeStore`/`AssetLookup`/`RunEventLog` traits and the SQLite store
//! - [`sql`]: dialect-aware SQL lineage extraction
//! - [`graph`]: bounded-depth traversal and downstream impact analysis
//! - [`ingest`]: OpenLineage run-event ingestion

pub use tracefuse_lineage_core as core;
pub use tracefuse_lineage_graph as graph;
pub use tracefuse_lineage_ingest as ingest;
pub use tracefuse_lineage_sql as sql;
pub use tracefuse_lineage_store as store;
