//! Deploy report (deploy-report.json v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};

use crate::environment::DeployTarget;
use crate::graph::PipelineGraph;

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// What the backend did with a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployOutcome {
    /// No graph with this name existed
    Created,

    /// An existing graph was overwritten
    Replaced,

    /// The graph existed and was left alone (`IfNotExists`)
    Skipped,

    /// Dry run, nothing was submitted
    Planned,
}

impl std::fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Replaced => write!(f, "replaced"),
            Self::Skipped => write!(f, "skipped"),
            Self::Planned => write!(f, "planned"),
        }
    }
}

/// Result of one deploy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Graph name
    pub graph: String,

    /// Normalized environment
    pub environment: String,

    pub database: String,
    pub schema: String,
    pub warehouse: String,

    /// Schedule clause
    pub schedule: String,

    /// Backend that received the graph
    pub backend: String,

    pub outcome: DeployOutcome,

    /// Task names in dependency order
    pub tasks: Vec<String>,

    pub edge_count: usize,

    /// SHA-256 of the deployed definition
    pub fingerprint: String,
}

impl DeployReport {
    /// Describe a graph deployed (or planned) against a target
    pub fn new(
        target: &DeployTarget,
        graph: &PipelineGraph,
        backend: impl Into<String>,
        outcome: DeployOutcome,
    ) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            graph: graph.name().to_string(),
            environment: target.environment.clone(),
            database: target.database.clone(),
            schema: target.schema.clone(),
            warehouse: graph.warehouse().to_string(),
            schedule: graph.schedule().to_sql(),
            backend: backend.into(),
            outcome,
            tasks: graph
                .topological_order()
                .into_iter()
                .map(|n| n.name.clone())
                .collect(),
            edge_count: graph.edge_count(),
            fingerprint: graph.fingerprint(),
        }
    }

    /// `database.schema.graph`
    pub fn fqn(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.graph)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}
