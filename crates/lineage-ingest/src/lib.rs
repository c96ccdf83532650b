//! TraceFuse Event Ingestion
//!
//! Turns OpenLineage run events into asset-level lineage edges. Every event
//! is recorded in the run-event audit log whatever its type; START and
//! COMPLETE events additionally link each input dataset to each output
//! dataset, while FAIL events are audit-only. Ingestion is at-least-once
//! safe: an edge that already exists for the same (source, target, label)
//! triple is skipped and counted rather than duplicated.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use tracefuse_lineage_core::{LineageError, Metadata, NewLineageEdge, Result};
use tracefuse_lineage_store::{EdgeStore, NewRunEvent, RunEventLog};

/// Transformation label carried by every ingested edge.
pub const JOB_RUN_LABEL: &str = "JOB_RUN";

// ============================================================================
// OpenLineage wire types (camelCase)
// ============================================================================

/// Run states understood by the ingestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Start,
    Complete,
    Fail,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Start => "START",
            EventType::Complete => "COMPLETE",
            EventType::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An OpenLineage run event.
///
/// Producers attach assorted extras (`producer`, `schemaURL`, facets); the
/// flattened `extra` bag keeps them through the audit log without the
/// ingestor having to know their shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    pub event_type: EventType,
    #[serde(default)]
    pub event_time: Option<String>,
    pub run: Run,
    pub job: Job,
    #[serde(default)]
    pub inputs: Vec<Dataset>,
    #[serde(default)]
    pub outputs: Vec<Dataset>,
    #[serde(flatten, default)]
    pub extra: Metadata,
}

/// The run being reported on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: String,
}

/// The job the run belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub namespace: String,
    pub name: String,
}

/// A dataset consumed or produced by the run.
///
/// Facet content is carried opaquely and never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facets: Option<serde_json::Value>,
}

impl Dataset {
    /// Deterministic asset id for this dataset reference.
    pub fn asset_id(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }
}

/// What one [`EventIngestor::ingest`] call did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub run_id: String,
    pub event_type: EventType,
    pub edges_created: usize,
    pub edges_deduplicated: usize,
    /// Notes for input/output pairs that were skipped rather than linked.
    pub skipped: Vec<String>,
    /// Whether the event landed in the run-event audit log.
    pub audited: bool,
}

// ============================================================================
// Ingestor
// ============================================================================

/// Applies OpenLineage run events to an edge store.
pub struct EventIngestor<S> {
    store: Arc<S>,
}

impl<S> EventIngestor<S>
where
    S: EdgeStore + RunEventLog,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Audit the event, then link inputs to outputs for START/COMPLETE.
    ///
    /// Re-ingesting an identical event never duplicates an edge: each
    /// (input, output) pair is resolved against the store by
    /// (source, target, `JOB_RUN`) before insert, and existing matches are
    /// counted as deduplicated. Degenerate pairs where a dataset feeds
    /// itself are skipped with a note, not treated as failures.
    pub fn ingest(&self, event: &RunEvent) -> Result<IngestReport> {
        let payload = serde_json::to_string(event)
            .map_err(|e| LineageError::SerializationError(e.to_string()))?;
        self.store.record_run_event(&NewRunEvent {
            run_id: event.run.run_id.clone(),
            event_type: event.event_type.as_str().to_string(),
            job_namespace: event.job.namespace.clone(),
            job_name: event.job.name.clone(),
            event_time: event.event_time.clone(),
            payload,
        })?;

        let mut report = IngestReport {
            run_id: event.run.run_id.clone(),
            event_type: event.event_type,
            edges_created: 0,
            edges_deduplicated: 0,
            skipped: Vec::new(),
            audited: true,
        };

        if event.event_type == EventType::Fail {
            tracing::debug!(
                run_id = %event.run.run_id,
                job = %event.job.name,
                "FAIL event audited, no edges created"
            );
            return Ok(report);
        }

        for input in &event.inputs {
            for output in &event.outputs {
                let source = input.asset_id();
                let target = output.asset_id();
                if source == target {
                    report
                        .skipped
                        .push(format!("self-referential pair skipped: {source}"));
                    continue;
                }
                if self
                    .store
                    .find_asset_edge(&source, &target, Some(JOB_RUN_LABEL))?
                    .is_some()
                {
                    report.edges_deduplicated += 1;
                    continue;
                }
                let new_edge = NewLineageEdge::new(&source, &target)
                    .with_transformation_type(JOB_RUN_LABEL)
                    .with_metadata(run_metadata(event));
                self.store.create_edge(&new_edge)?;
                report.edges_created += 1;
            }
        }

        tracing::info!(
            run_id = %event.run.run_id,
            event_type = %event.event_type,
            job_namespace = %event.job.namespace,
            job = %event.job.name,
            created = report.edges_created,
            deduplicated = report.edges_deduplicated,
            skipped = report.skipped.len(),
            "run event ingested"
        );

        Ok(report)
    }
}

/// Provenance metadata attached to every edge an event creates.
fn run_metadata(event: &RunEvent) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(
        "run_id".to_string(),
        serde_json::Value::String(event.run.run_id.clone()),
    );
    metadata.insert(
        "job_namespace".to_string(),
        serde_json::Value::String(event.job.namespace.clone()),
    );
    metadata.insert(
        "job_name".to_string(),
        serde_json::Value::String(event.job.name.clone()),
    );
    if let Some(event_time) = &event.event_time {
        metadata.insert(
            "event_time".to_string(),
            serde_json::Value::String(event_time.clone()),
        );
    }
    metadata
}
