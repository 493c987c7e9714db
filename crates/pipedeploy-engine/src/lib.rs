//! pipedeploy engine - Deploy orchestration
//!
//! This crate implements:
//! - The daily dbt pipeline definition
//! - The deployer (config -> connect -> build -> submit -> report)

pub mod pipeline;
pub mod deployer;

pub use pipeline::{daily_dbt_pipeline, graph_name};
pub use deployer::{Deployer, DeployError, DeploymentPlan};
