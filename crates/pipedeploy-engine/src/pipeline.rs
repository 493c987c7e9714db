//! The daily dbt pipeline
//!
//! Ingest raw files with the bronze notebook, then build the dbt silver and
//! gold layers:
//!
//! ```text
//! INGEST_FILES -> DBT_SILVER -> DBT_GOLD
//! ```

use pipedeploy_core::{
    DeployTarget, GraphError, PipelineGraph, Schedule, TaskDefinition, TaskNode,
};

pub const INGEST_TASK: &str = "INGEST_FILES";
pub const SILVER_TASK: &str = "DBT_SILVER";
pub const GOLD_TASK: &str = "DBT_GOLD";

/// Schema holding the ingestion notebook
pub const BRONZE_SCHEMA: &str = "BRONZELAYER";
pub const INGEST_NOTEBOOK: &str = "bronze_ingest";

/// Procedure running one dbt layer: `RUN_DBT_LAYER(layer, environment)`
pub const DBT_LAYER_PROCEDURE: &str = "RUN_DBT_LAYER";

/// Hour (UTC) the pipeline runs every day
pub const DAILY_RUN_HOUR_UTC: u8 = 2;

/// `<ENV>_DAILY_DBT_PIPELINE_DAG`
pub fn graph_name(environment: &str) -> String {
    format!("{}_DAILY_DBT_PIPELINE_DAG", environment)
}

fn dbt_layer(target: &DeployTarget, layer: &str) -> TaskDefinition {
    TaskDefinition::procedure(
        &target.database,
        &target.schema,
        DBT_LAYER_PROCEDURE,
        [layer.to_string(), target.environment_param()],
    )
}

/// Build the pipeline graph for a resolved target
pub fn daily_dbt_pipeline(target: &DeployTarget) -> Result<PipelineGraph, GraphError> {
    let mut builder = PipelineGraph::builder(
        graph_name(&target.environment),
        Schedule::daily_utc(DAILY_RUN_HOUR_UTC)?,
        &target.warehouse,
    );

    builder
        .add_node(TaskNode::new(
            INGEST_TASK,
            TaskDefinition::notebook(&target.database, BRONZE_SCHEMA, INGEST_NOTEBOOK),
        ))?
        .add_node(TaskNode::new(SILVER_TASK, dbt_layer(target, "silver")))?
        .add_node(TaskNode::new(GOLD_TASK, dbt_layer(target, "gold")))?
        .chain(&[INGEST_TASK, SILVER_TASK, GOLD_TASK])?;

    builder.finalize()
}
