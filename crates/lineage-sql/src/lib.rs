//! # TraceFuse SQL Lineage Extraction
//!
//! Parses SQL statements and extracts candidate lineage edges without
//! persisting anything:
//!
//! - **Asset-level edges**: one per (source table, target table) pair,
//!   labeled by statement shape (AGGREGATED, JOINED, CASE, COALESCED,
//!   MERGE, or SQL_TRANSFORM)
//! - **Column-level edges**: one per resolved column reference, classified
//!   per projected expression and scored for confidence
//! - **Dialect-aware parsing**: generic ANSI, PostgreSQL, BigQuery, and
//!   Snowflake, with per-dialect COALESCE-family detection
//! - **Ambiguity is scored, never dropped**: unqualified columns with
//!   several candidate tables yield one edge per candidate at split
//!   confidence, wildcards yield a `*` edge per source table
//!
//! ## Example
//!
//! ```
//! use tracefuse_lineage_sql::{LineageExtractor, SqlDialect};
//!
//! let extractor = LineageExtractor::new(SqlDialect::Postgres);
//! let extraction = extractor
//!     .extract(
//!         "INSERT INTO sales_summary \
//!          SELECT customer_id, SUM(amount) FROM orders GROUP BY customer_id",
//!     )
//!     .unwrap();
//!
//! assert_eq!(extraction.target_table, "sales_summary");
//! assert_eq!(extraction.source_tables, vec!["orders"]);
//! assert_eq!(extraction.asset_edges.len(), 1);
//! ```
//!
//! ## SQL Support
//!
//! | Construct | Asset edges | Column edges |
//! |-----------|-------------|--------------|
//! | INSERT INTO ... SELECT | ✅ | ✅ |
//! | CREATE TABLE ... AS SELECT | ✅ | ✅ |
//! | CREATE VIEW | ✅ | ✅ |
//! | SELECT ... INTO | ✅ | ✅ |
//! | MERGE | ✅ | ❌ warning |
//! | CTEs, derived tables | ✅ resolved one level to base tables | ✅ |
//! | UNION / INTERSECT / EXCEPT | ✅ both branches | ✅ |
//! | SELECT `*` | ✅ | ⚠️ `*`→`*` per source at 0.5 confidence |
//! | UPDATE, DELETE, plain DDL | ❌ `UnsupportedStatement` | ❌ |

mod dialect;
mod error;
mod extract;
mod types;

pub use dialect::SqlDialect;
pub use error::{ExtractError, Result};
pub use extract::{LineageExtractor, LABEL_MERGE, LABEL_SQL_TRANSFORM, WILDCARD_CONFIDENCE};
pub use types::SqlExtraction;
