//! pipedeploy Core
//!
//! Domain model for deploying scheduled task graphs: environment
//! configuration, the graph description and its builder, schedules and
//! the deploy report.

pub mod config;
pub mod environment;
pub mod schedule;
pub mod task;
pub mod graph;
pub mod report;

pub use config::{ProjectConfig, ConfigError};
pub use environment::{
    EnvironmentConfig, DeployTarget, Credentials, Secret,
    DEFAULT_ENVIRONMENT, DEFAULT_WAREHOUSE, DEFAULT_ROLE, INTEGRATIONS_SCHEMA,
};
pub use schedule::Schedule;
pub use task::{TaskNode, TaskDefinition};
pub use graph::{PipelineGraph, PipelineGraphBuilder, GraphError};
pub use report::{DeployReport, DeployOutcome};
