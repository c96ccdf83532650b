//! TraceFuse CLI
//!
//! Command-line interface for recording, exploring, and ingesting lineage.

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::sync::Arc;

use tracefuse_lineage_core::validation::{MAX_IMPACT_DEPTH, MAX_TRAVERSAL_DEPTH};
use tracefuse_lineage_core::{validation, NewLineageEdge};
use tracefuse_lineage_graph::{Direction, ImpactAnalyzer, TraversalEngine, TraversalOptions};
use tracefuse_lineage_ingest::{EventIngestor, RunEvent};
use tracefuse_lineage_sql::{LineageExtractor, SqlDialect};
use tracefuse_lineage_store::{EdgeStore, SqliteLineageStore};

#[derive(Parser)]
#[command(name = "tracefuse")]
#[command(version, about = "TraceFuse lineage CLI", long_about = None)]
struct Cli {
    /// Path to the lineage database
    #[arg(long, default_value = "tracefuse_lineage.db", global = true)]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new lineage database
    Init {
        /// Overwrite existing database if it exists
        #[arg(short, long)]
        force: bool,
    },

    /// Record an asset-level lineage edge
    AddEdge {
        /// Asset the data flows from
        source: String,

        /// Asset the data flows to
        target: String,

        /// Transformation label, e.g. SQL_TRANSFORM or JOB_RUN
        #[arg(short, long)]
        transformation_type: Option<String>,

        /// Transformation logic, typically the originating SQL
        #[arg(short, long)]
        logic: Option<String>,
    },

    /// Show what an asset is derived from
    Upstream {
        /// Asset id to start from
        asset: String,

        /// Maximum traversal depth
        #[arg(short, long, default_value_t = 10)]
        depth: u32,
    },

    /// Show what derives from an asset
    Downstream {
        /// Asset id to start from
        asset: String,

        /// Maximum traversal depth
        #[arg(short, long, default_value_t = 10)]
        depth: u32,
    },

    /// Report the downstream blast radius of a change to an asset
    Impact {
        /// Asset id to analyze
        asset: String,

        /// Maximum analysis depth
        #[arg(short, long, default_value_t = 10)]
        max_depth: u32,
    },

    /// Extract candidate lineage edges from a SQL statement
    Extract {
        /// SQL text to analyze
        #[arg(short, long, conflicts_with = "file")]
        sql: Option<String>,

        /// Read the SQL from a file instead
        #[arg(short, long)]
        file: Option<String>,

        /// SQL dialect: generic, postgres, bigquery, snowflake
        #[arg(short, long, default_value = "generic")]
        dialect: String,

        /// Persist the extracted edges instead of only printing them
        #[arg(short, long)]
        commit: bool,
    },

    /// Ingest OpenLineage run events from a JSON file
    Ingest {
        /// File holding one event object or an array of events
        file: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { force } => init_database(&cli.db, force),
        Commands::AddEdge {
            source,
            target,
            transformation_type,
            logic,
        } => add_edge(&cli.db, &source, &target, transformation_type, logic),
        Commands::Upstream { asset, depth } => {
            show_lineage(&cli.db, &asset, Direction::Upstream, depth)
        }
        Commands::Downstream { asset, depth } => {
            show_lineage(&cli.db, &asset, Direction::Downstream, depth)
        }
        Commands::Impact { asset, max_depth } => show_impact(&cli.db, &asset, max_depth),
        Commands::Extract {
            sql,
            file,
            dialect,
            commit,
        } => extract_sql(&cli.db, sql, file, &dialect, commit),
        Commands::Ingest { file } => ingest_events(&cli.db, &file),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn open_store(path: &str) -> Result<Arc<SqliteLineageStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(SqliteLineageStore::open(path)?))
}

fn init_database(path: &str, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if std::path::Path::new(path).exists() {
        if !force {
            return Err(format!(
                "Database already exists at '{}'. Use --force to overwrite.",
                path
            )
            .into());
        }
        println!("Removing existing database at '{}'", path);
        std::fs::remove_file(path)?;
    }

    open_store(path)?;
    println!("Initialized lineage database at '{}'", path);

    Ok(())
}

fn add_edge(
    path: &str,
    source: &str,
    target: &str,
    transformation_type: Option<String>,
    logic: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;

    let mut new_edge = NewLineageEdge::new(source, target);
    if let Some(label) = transformation_type {
        new_edge = new_edge.with_transformation_type(label);
    }
    if let Some(logic) = logic {
        new_edge = new_edge.with_transformation_logic(logic);
    }

    let edge = store.create_edge(&new_edge)?;
    println!(
        "Created edge #{}: {} -> {}",
        edge.id, edge.source_asset_id, edge.target_asset_id
    );

    Ok(())
}

fn show_lineage(
    path: &str,
    asset: &str,
    direction: Direction,
    depth: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    validation::validate_depth(depth, MAX_TRAVERSAL_DEPTH)?;

    let store = open_store(path)?;
    let engine = TraversalEngine::new(store);
    let graph = engine.traverse(asset, direction, &TraversalOptions::depth(depth))?;

    println!("{} lineage of '{}':", direction, asset);
    println!();
    for node in &graph.nodes {
        let indent = "  ".repeat(node.depth as usize + 1);
        println!(
            "{}[{}] {} ({})",
            indent, node.depth, node.asset_id, node.asset_type
        );
    }
    println!();
    println!("{} nodes, {} edges", graph.nodes.len(), graph.edges.len());
    if graph.truncated {
        println!("(results truncated)");
    }

    Ok(())
}

fn show_impact(path: &str, asset: &str, max_depth: u32) -> Result<(), Box<dyn std::error::Error>> {
    validation::validate_depth(max_depth, MAX_IMPACT_DEPTH)?;

    let store = open_store(path)?;
    let analyzer = ImpactAnalyzer::new(store);
    let result = analyzer.analyze(asset, &TraversalOptions::depth(max_depth))?;

    println!("Impact of a change to '{}':", asset);
    println!();
    if result.impacted.is_empty() {
        println!("  nothing downstream");
    }
    for item in &result.impacted {
        println!(
            "  [{}] {} via {}",
            item.depth,
            item.asset_id,
            item.path.join(" -> ")
        );
    }
    println!();
    println!("Total impacted: {}", result.total_impacted);
    for (asset_type, count) in &result.impacted_by_type {
        println!("  {}: {}", asset_type, count);
    }
    if result.truncated {
        println!("(results truncated)");
    }

    Ok(())
}

fn extract_sql(
    path: &str,
    sql: Option<String>,
    file: Option<String>,
    dialect: &str,
    commit: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let sql = if let Some(sql) = sql {
        sql
    } else if let Some(file) = file {
        std::fs::read_to_string(file)?
    } else {
        return Err("Provide the SQL via --sql or --file.".into());
    };

    let dialect: SqlDialect = dialect.parse()?;
    let extraction = LineageExtractor::new(dialect).extract(&sql)?;

    println!("Target: {}", extraction.target_table);
    println!("Sources: {}", extraction.source_tables.join(", "));
    println!();
    println!("Asset edges:");
    for edge in &extraction.asset_edges {
        println!(
            "  {} -> {} [{}]",
            edge.source_asset_id,
            edge.target_asset_id,
            edge.transformation_type.as_deref().unwrap_or("-")
        );
    }
    if !extraction.column_edges.is_empty() {
        println!();
        println!("Column edges:");
        for edge in &extraction.column_edges {
            println!(
                "  {}.{} -> {}.{} [{}] confidence {:.2}",
                edge.source_asset_id,
                edge.source_column,
                edge.target_asset_id,
                edge.target_column,
                edge.transformation.as_str(),
                edge.confidence
            );
        }
    }
    for warning in &extraction.warnings {
        println!("Warning: {}", warning);
    }

    if commit {
        let store = open_store(path)?;

        // Asset edges land first so column edges can point back at them.
        let mut edge_ids: HashMap<(String, String), i64> = HashMap::new();
        for new_edge in &extraction.asset_edges {
            let edge = store.create_edge(new_edge)?;
            edge_ids.insert(
                (edge.source_asset_id.clone(), edge.target_asset_id.clone()),
                edge.id,
            );
        }
        for new_edge in &extraction.column_edges {
            let mut new_edge = new_edge.clone();
            let pair = (
                new_edge.source_asset_id.clone(),
                new_edge.target_asset_id.clone(),
            );
            if let Some(&id) = edge_ids.get(&pair) {
                new_edge = new_edge.with_lineage_edge_id(id);
            }
            store.create_column_edge(&new_edge)?;
        }

        println!();
        println!(
            "Committed {} asset edges and {} column edges",
            extraction.asset_edges.len(),
            extraction.column_edges.len()
        );
    }

    Ok(())
}

fn ingest_events(path: &str, file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(file)?;
    let events: Vec<RunEvent> = if raw.trim_start().starts_with('[') {
        serde_json::from_str(&raw)?
    } else {
        vec![serde_json::from_str(&raw)?]
    };

    let store = open_store(path)?;
    let ingestor = EventIngestor::new(store);

    for event in &events {
        let report = ingestor.ingest(event)?;
        println!(
            "run {} [{}]: {} edges created, {} deduplicated",
            report.run_id, report.event_type, report.edges_created, report.edges_deduplicated
        );
        for note in &report.skipped {
            println!("  note: {}", note);
        }
    }

    println!();
    println!("Ingested {} events", events.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn db_path(dir: &TempDir) -> String {
        dir.path()
            .join("lineage.db")
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_init_refuses_to_clobber_without_force() {
        let dir = TempDir::new().unwrap();
        let path = db_path(&dir);

        init_database(&path, false).unwrap();
        assert!(std::path::Path::new(&path).exists());

        let err = init_database(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));

        init_database(&path, true).unwrap();
    }

    #[test]
    fn test_add_edge_then_walk() {
        let dir = TempDir::new().unwrap();
        let path = db_path(&dir);

        add_edge(&path, "raw", "staged", Some("DIRECT".to_string()), None).unwrap();
        add_edge(&path, "staged", "mart", None, None).unwrap();

        show_lineage(&path, "mart", Direction::Upstream, 10).unwrap();
        show_impact(&path, "raw", 10).unwrap();
    }

    #[test]
    fn test_extract_commit_persists() {
        let dir = TempDir::new().unwrap();
        let path = db_path(&dir);

        extract_sql(
            &path,
            Some("INSERT INTO daily SELECT id, amount FROM orders".to_string()),
            None,
            "postgres",
            true,
        )
        .unwrap();

        let store = open_store(&path).unwrap();
        let edges = store
            .list_edges(&tracefuse_lineage_store::EdgeFilter::default())
            .unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source_asset_id, "orders");
        assert_eq!(edges[0].target_asset_id, "daily");
    }

    #[test]
    fn test_ingest_reads_single_event_and_arrays() {
        let dir = TempDir::new().unwrap();
        let path = db_path(&dir);

        let event_file = dir.path().join("event.json");
        std::fs::write(
            &event_file,
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
        ingest_events(&path, &event_file.to_string_lossy()).unwrap();

        let batch_file = dir.path().join("batch.json");
        std::fs::write(
            &batch_file,
            r#"[{
                "eventType": "START",
                "run": {"runId": "run-2"},
                "job": {"namespace": "etl", "name": "hourly"},
                "inputs": [{"namespace": "wh", "name": "daily"}],
                "outputs": [{"namespace": "wh", "name": "hourly_rollup"}]
            }]"#,
        )
        .unwrap();
        ingest_events(&path, &batch_file.to_string_lossy()).unwrap();

        let store = open_store(&path).unwrap();
        let edges = store
            .list_edges(&tracefuse_lineage_store::EdgeFilter::default())
            .unwrap();
        assert_eq!(edges.len(), 2);
    }
}
