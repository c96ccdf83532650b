//! TraceFuse Graph Traversal
//!
//! Bounded-depth breadth-first traversal over the lineage relation, plus
//! downstream impact analysis with derivation-path tracking. The engine is
//! read-only: every walk re-reads adjacency from the `EdgeStore`, holds no
//! lock between steps, and terminates in bounded time on cyclic graphs via
//! a visited set. Cancellation and the node budget are checked between BFS
//! levels only, so a returned graph never contains a half-expanded level.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tracefuse_lineage_core::validation::{
    validate_asset_id, validate_column_name, DEFAULT_TRAVERSAL_DEPTH,
};
use tracefuse_lineage_core::{
    AssetSummary, AssetType, ColumnLineageEdge, LineageEdge, LineageError, Result,
};
use tracefuse_lineage_store::{AssetLookup, EdgeStore};

// ============================================================================
// Traversal inputs
// ============================================================================

/// Which way to walk the derives-from relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Follow edges target-to-source: what the root is derived from.
    Upstream,
    /// Follow edges source-to-target: what derives from the root.
    Downstream,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upstream => "UPSTREAM",
            Direction::Downstream => "DOWNSTREAM",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounds for a single traversal or impact run.
///
/// `max_depth` bounds how far from the root the walk expands (the root is
/// depth 0; nodes discovered exactly at `max_depth` are included). The
/// optional `node_limit` is a deterministic fan-out budget and `cancel` a
/// cooperative cancellation flag; both are consulted at level boundaries
/// only, and tripping either marks the result `truncated`.
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    pub max_depth: u32,
    pub node_limit: Option<usize>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_TRAVERSAL_DEPTH,
            node_limit: None,
            cancel: None,
        }
    }
}

impl TraversalOptions {
    /// Options bounded to the given depth, with no budget or cancellation.
    pub fn depth(max_depth: u32) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    /// Cap the total number of discovered nodes (root included).
    pub fn with_node_limit(mut self, node_limit: usize) -> Self {
        self.node_limit = Some(node_limit);
        self
    }

    /// Attach a cooperative cancellation flag.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(LineageError::ValidationError(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Level-boundary check: true when the walk should stop early.
    fn stop_requested(&self, discovered: usize) -> bool {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return true;
            }
        }
        matches!(self.node_limit, Some(limit) if discovered >= limit)
    }
}

// ============================================================================
// Traversal results
// ============================================================================

/// A node in an asset-level lineage graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub asset_id: String,
    pub name: String,
    pub asset_type: AssetType,
    /// Distance from the traversal root (root = 0).
    pub depth: u32,
}

/// An asset-level lineage graph rooted at one asset.
///
/// Nodes are in breadth-first discovery order, so the root is first and
/// depths are non-decreasing. Every edge has both endpoints in `nodes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageGraph {
    pub root_asset_id: String,
    pub direction: Direction,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<LineageEdge>,
    /// True when the node budget or cancellation stopped expansion early.
    pub truncated: bool,
}

impl LineageGraph {
    /// Look up a discovered node by asset id.
    pub fn node(&self, asset_id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.asset_id == asset_id)
    }
}

/// A node in a column-level lineage graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnGraphNode {
    pub asset_id: String,
    pub column: String,
    pub depth: u32,
}

/// A column-level lineage graph rooted at one (asset, column) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnLineageGraph {
    pub root_asset_id: String,
    pub root_column: String,
    pub direction: Direction,
    pub nodes: Vec<ColumnGraphNode>,
    pub edges: Vec<ColumnLineageEdge>,
    pub truncated: bool,
}

impl ColumnLineageGraph {
    pub fn node(&self, asset_id: &str, column: &str) -> Option<&ColumnGraphNode> {
        self.nodes
            .iter()
            .find(|n| n.asset_id == asset_id && n.column == column)
    }
}

// ============================================================================
// Traversal engine
// ============================================================================

/// Breadth-first lineage traversal over an edge store.
///
/// Stateless between calls: each traversal is a sequence of independent
/// point-in-time adjacency reads. Concurrent walks need no coordination,
/// and a walk racing a writer may observe the graph mid-change, which is
/// an accepted read-consistency tradeoff.
pub struct TraversalEngine<S> {
    store: Arc<S>,
}

impl<S> TraversalEngine<S>
where
    S: EdgeStore + AssetLookup,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Walk the asset-level relation from `root_asset_id`.
    ///
    /// Depth 0 is the root alone. A node already visited is never
    /// re-expanded, so cyclic graphs terminate with each asset reported
    /// once at its first (smallest) depth.
    pub fn traverse(
        &self,
        root_asset_id: &str,
        direction: Direction,
        options: &TraversalOptions,
    ) -> Result<LineageGraph> {
        validate_asset_id(root_asset_id)?;
        options.validate()?;

        let mut visited: HashSet<String> = HashSet::new();
        let mut nodes: Vec<GraphNode> = Vec::new();
        let mut edges: Vec<LineageEdge> = Vec::new();
        let mut seen_edges: HashSet<i64> = HashSet::new();
        let mut truncated = false;

        visited.insert(root_asset_id.to_string());
        nodes.push(self.decorate(root_asset_id, 0)?);

        let mut frontier: Vec<String> = vec![root_asset_id.to_string()];
        let mut depth = 0u32;

        while !frontier.is_empty() && depth < options.max_depth {
            if options.stop_requested(visited.len()) {
                truncated = true;
                break;
            }
            let mut next: Vec<String> = Vec::new();
            for asset_id in &frontier {
                let adjacent = match direction {
                    Direction::Upstream => self.store.edges_by_target(asset_id)?,
                    Direction::Downstream => self.store.edges_by_source(asset_id)?,
                };
                for edge in adjacent {
                    let neighbor = match direction {
                        Direction::Upstream => edge.source_asset_id.clone(),
                        Direction::Downstream => edge.target_asset_id.clone(),
                    };
                    if seen_edges.insert(edge.id) {
                        edges.push(edge);
                    }
                    if visited.insert(neighbor.clone()) {
                        nodes.push(self.decorate(&neighbor, depth + 1)?);
                        next.push(neighbor);
                    }
                }
            }
            depth += 1;
            frontier = next;
        }

        tracing::debug!(
            root = %root_asset_id,
            direction = %direction,
            nodes = nodes.len(),
            edges = edges.len(),
            truncated,
            "traversal complete"
        );

        Ok(LineageGraph {
            root_asset_id: root_asset_id.to_string(),
            direction,
            nodes,
            edges,
            truncated,
        })
    }

    /// Walk the column-level relation from `(root_asset_id, root_column)`.
    ///
    /// Same algorithm as [`traverse`](Self::traverse) with the visited set
    /// keyed by (asset id, column). Column nodes carry no asset-type
    /// decoration.
    pub fn traverse_column(
        &self,
        root_asset_id: &str,
        root_column: &str,
        direction: Direction,
        options: &TraversalOptions,
    ) -> Result<ColumnLineageGraph> {
        validate_asset_id(root_asset_id)?;
        validate_column_name(root_column)?;
        options.validate()?;

        let root = (root_asset_id.to_string(), root_column.to_string());
        let mut visited: HashSet<(String, String)> = HashSet::new();
        let mut nodes: Vec<ColumnGraphNode> = Vec::new();
        let mut edges: Vec<ColumnLineageEdge> = Vec::new();
        let mut seen_edges: HashSet<i64> = HashSet::new();
        let mut truncated = false;

        visited.insert(root.clone());
        nodes.push(ColumnGraphNode {
            asset_id: root.0.clone(),
            column: root.1.clone(),
            depth: 0,
        });

        let mut frontier: Vec<(String, String)> = vec![root];
        let mut depth = 0u32;

        while !frontier.is_empty() && depth < options.max_depth {
            if options.stop_requested(visited.len()) {
                truncated = true;
                break;
            }
            let mut next: Vec<(String, String)> = Vec::new();
            for (asset_id, column) in &frontier {
                let adjacent = match direction {
                    Direction::Upstream => {
                        self.store.column_edges_by_target(asset_id, column)?
                    }
                    Direction::Downstream => {
                        self.store.column_edges_by_source(asset_id, column)?
                    }
                };
                for edge in adjacent {
                    let neighbor = match direction {
                        Direction::Upstream => {
                            (edge.source_asset_id.clone(), edge.source_column.clone())
                        }
                        Direction::Downstream => {
                            (edge.target_asset_id.clone(), edge.target_column.clone())
                        }
                    };
                    if seen_edges.insert(edge.id) {
                        edges.push(edge);
                    }
                    if visited.insert(neighbor.clone()) {
                        nodes.push(ColumnGraphNode {
                            asset_id: neighbor.0.clone(),
                            column: neighbor.1.clone(),
                            depth: depth + 1,
                        });
                        next.push(neighbor);
                    }
                }
            }
            depth += 1;
            frontier = next;
        }

        tracing::debug!(
            root = %root_asset_id,
            column = %root_column,
            direction = %direction,
            nodes = nodes.len(),
            truncated,
            "column traversal complete"
        );

        Ok(ColumnLineageGraph {
            root_asset_id: root_asset_id.to_string(),
            root_column: root_column.to_string(),
            direction,
            nodes,
            edges,
            truncated,
        })
    }

    fn decorate(&self, asset_id: &str, depth: u32) -> Result<GraphNode> {
        let summary = self
            .store
            .asset_summary(asset_id)?
            .unwrap_or_else(|| AssetSummary::unknown(asset_id));
        Ok(GraphNode {
            asset_id: summary.id,
            name: summary.name,
            asset_type: summary.asset_type,
            depth,
        })
    }
}

// ============================================================================
// Impact analysis
// ============================================================================

/// One impacted asset with its derivation chain from the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactedAsset {
    pub asset_id: String,
    pub name: String,
    pub asset_type: AssetType,
    pub depth: u32,
    /// Asset ids from the root to this asset, both inclusive.
    pub path: Vec<String>,
}

/// Downstream blast radius of a change to one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAnalysisResult {
    pub root_asset_id: String,
    /// Number of distinct impacted assets, root excluded.
    pub total_impacted: usize,
    /// Impacted-asset counts keyed by asset type label.
    pub impacted_by_type: BTreeMap<String, usize>,
    pub impacted: Vec<ImpactedAsset>,
    pub truncated: bool,
}

/// One impacted column with its derivation chain from the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactedColumn {
    pub asset_id: String,
    pub column: String,
    pub depth: u32,
    /// `asset_id.column` steps from the root to this column, both inclusive.
    pub path: Vec<String>,
}

/// Downstream blast radius of a change to one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnImpactAnalysisResult {
    pub root_asset_id: String,
    pub root_column: String,
    pub total_impacted: usize,
    pub impacted: Vec<ImpactedColumn>,
    pub truncated: bool,
}

/// Downstream impact analysis with derivation-path tracking.
///
/// Built on the same breadth-first walk as [`TraversalEngine`], with each
/// queue entry carrying the full node-id path from the root. A node
/// reachable over several routes keeps its first-discovered path, which
/// under BFS ordering is a shortest one.
pub struct ImpactAnalyzer<S> {
    store: Arc<S>,
}

impl<S> ImpactAnalyzer<S>
where
    S: EdgeStore + AssetLookup,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Report every asset transitively derived from `root_asset_id`.
    pub fn analyze(
        &self,
        root_asset_id: &str,
        options: &TraversalOptions,
    ) -> Result<ImpactAnalysisResult> {
        validate_asset_id(root_asset_id)?;
        options.validate()?;

        let mut visited: HashSet<String> = HashSet::new();
        let mut impacted: Vec<ImpactedAsset> = Vec::new();
        let mut truncated = false;

        visited.insert(root_asset_id.to_string());

        let mut frontier: Vec<(String, Vec<String>)> = vec![(
            root_asset_id.to_string(),
            vec![root_asset_id.to_string()],
        )];
        let mut depth = 0u32;

        while !frontier.is_empty() && depth < options.max_depth {
            if options.stop_requested(visited.len()) {
                truncated = true;
                break;
            }
            let mut next: Vec<(String, Vec<String>)> = Vec::new();
            for (asset_id, path) in &frontier {
                for edge in self.store.edges_by_source(asset_id)? {
                    let target = edge.target_asset_id;
                    if !visited.insert(target.clone()) {
                        continue;
                    }
                    let mut target_path = path.clone();
                    target_path.push(target.clone());
                    let summary = self
                        .store
                        .asset_summary(&target)?
                        .unwrap_or_else(|| AssetSummary::unknown(&target));
                    impacted.push(ImpactedAsset {
                        asset_id: summary.id,
                        name: summary.name,
                        asset_type: summary.asset_type,
                        depth: depth + 1,
                        path: target_path.clone(),
                    });
                    next.push((target, target_path));
                }
            }
            depth += 1;
            frontier = next;
        }

        let mut impacted_by_type: BTreeMap<String, usize> = BTreeMap::new();
        for asset in &impacted {
            *impacted_by_type
                .entry(asset.asset_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        tracing::debug!(
            root = %root_asset_id,
            total = impacted.len(),
            truncated,
            "impact analysis complete"
        );

        Ok(ImpactAnalysisResult {
            root_asset_id: root_asset_id.to_string(),
            total_impacted: impacted.len(),
            impacted_by_type,
            impacted,
            truncated,
        })
    }

    /// Report every column transitively derived from the root column.
    pub fn analyze_column(
        &self,
        root_asset_id: &str,
        root_column: &str,
        options: &TraversalOptions,
    ) -> Result<ColumnImpactAnalysisResult> {
        validate_asset_id(root_asset_id)?;
        validate_column_name(root_column)?;
        options.validate()?;

        let root = (root_asset_id.to_string(), root_column.to_string());
        let mut visited: HashSet<(String, String)> = HashSet::new();
        let mut impacted: Vec<ImpactedColumn> = Vec::new();
        let mut truncated = false;

        visited.insert(root.clone());

        let root_step = column_step(&root.0, &root.1);
        let mut frontier: Vec<((String, String), Vec<String>)> =
            vec![(root, vec![root_step])];
        let mut depth = 0u32;

        while !frontier.is_empty() && depth < options.max_depth {
            if options.stop_requested(visited.len()) {
                truncated = true;
                break;
            }
            let mut next: Vec<((String, String), Vec<String>)> = Vec::new();
            for ((asset_id, column), path) in &frontier {
                for edge in self.store.column_edges_by_source(asset_id, column)? {
                    let target = (edge.target_asset_id, edge.target_column);
                    if !visited.insert(target.clone()) {
                        continue;
                    }
                    let mut target_path = path.clone();
                    target_path.push(column_step(&target.0, &target.1));
                    impacted.push(ImpactedColumn {
                        asset_id: target.0.clone(),
                        column: target.1.clone(),
                        depth: depth + 1,
                        path: target_path.clone(),
                    });
                    next.push((target, target_path));
                }
            }
            depth += 1;
            frontier = next;
        }

        tracing::debug!(
            root = %root_asset_id,
            column = %root_column,
            total = impacted.len(),
            truncated,
            "column impact analysis complete"
        );

        Ok(ColumnImpactAnalysisResult {
            root_asset_id: root_asset_id.to_string(),
            root_column: root_column.to_string(),
            total_impacted: impacted.len(),
            impacted,
            truncated,
        })
    }
}

fn column_step(asset_id: &str, column: &str) -> String {
    format!("{asset_id}.{column}")
}
