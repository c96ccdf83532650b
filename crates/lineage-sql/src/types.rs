//! Extraction result types.

use serde::{Deserialize, Serialize};
use tracefuse_lineage_core::{NewColumnLineageEdge, NewLineageEdge};

/// Candidate lineage edges extracted from one SQL statement.
///
/// Nothing here is persisted. The caller decides whether to commit the
/// candidates through the edge store; the REST extraction endpoint returns
/// this structure verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlExtraction {
    /// Destination relation of the statement
    pub target_table: String,
    /// Distinct source relations, in discovery order
    pub source_tables: Vec<String>,
    /// Asset-level edge candidates, one per (source, target) pair
    pub asset_edges: Vec<NewLineageEdge>,
    /// Column-level edge candidates; confidence < 1.0 marks inferred matches
    pub column_edges: Vec<NewColumnLineageEdge>,
    /// Constructs the extractor recognized but could not fully resolve
    pub warnings: Vec<String>,
}

impl SqlExtraction {
    pub fn new(target_table: impl Into<String>) -> Self {
        Self {
            target_table: target_table.into(),
            source_tables: Vec::new(),
            asset_edges: Vec::new(),
            column_edges: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// True when the statement yielded no edges at all.
    pub fn is_empty(&self) -> bool {
        self.asset_edges.is_empty() && self.column_edges.is_empty()
    }
}
