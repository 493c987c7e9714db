//! Deploys the daily pipeline for one environment
//!
//! A deploy runs strictly in order: resolve config, connect, build the
//! graph, submit it in create-or-replace mode, report. Configuration
//! problems (bad environment, missing credentials) surface before any
//! connection is attempted. Nothing is retried.

use pipedeploy_backend::{sql, BackendConnector, BackendError, CreateMode, GraphScope};
use pipedeploy_core::{
    ConfigError, DeployOutcome, DeployReport, DeployTarget, EnvironmentConfig, GraphError,
    PipelineGraph, ProjectConfig,
};

use crate::pipeline::daily_dbt_pipeline;

/// Deploy failures, by stage
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// A graph resolved for a target, not yet submitted
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    pub target: DeployTarget,
    pub graph: PipelineGraph,
}

impl DeploymentPlan {
    pub fn scope(&self) -> GraphScope {
        GraphScope::from_target(&self.target)
    }

    /// Statements a create-or-replace deploy executes on Snowflake
    pub fn statements(&self) -> Vec<String> {
        sql::compile(&self.scope(), &self.graph, CreateMode::OrReplace)
    }

    /// Report for a dry run
    pub fn report(&self) -> DeployReport {
        DeployReport::new(&self.target, &self.graph, "dry-run", DeployOutcome::Planned)
    }
}

/// Builds and registers the daily pipeline through a [`BackendConnector`]
pub struct Deployer {
    connector: Box<dyn BackendConnector>,
    project: ProjectConfig,
}

impl Deployer {
    pub fn new(connector: impl BackendConnector + 'static, project: ProjectConfig) -> Self {
        Self {
            connector: Box::new(connector),
            project,
        }
    }

    /// Resolve the target and build the graph without credentials or a
    /// connection
    pub fn plan_with<F>(&self, environment: &str, lookup: F) -> Result<DeploymentPlan, DeployError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let target = DeployTarget::resolve(environment, &self.project, lookup)?;
        let graph = daily_dbt_pipeline(&target)?;
        Ok(DeploymentPlan { target, graph })
    }

    /// [`Self::plan_with`] reading overrides from the process environment
    pub fn plan(&self, environment: &str) -> Result<DeploymentPlan, DeployError> {
        self.plan_with(environment, pipedeploy_core::environment::process_env)
    }

    /// Deploy with configuration read through `lookup`
    pub async fn deploy_with<F>(&self, environment: &str, lookup: F) -> Result<DeployReport, DeployError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = EnvironmentConfig::resolve(environment, &self.project, lookup)?;
        let target = &config.target;

        tracing::info!(
            environment = %target.environment,
            database = %target.database,
            role = %target.role,
            backend = self.connector.name(),
            "Deploying DAG for {} environment",
            target.environment
        );

        let session = self.connector.connect(&config).await?;
        session.test_connection().await?;

        let graph = daily_dbt_pipeline(target)?;
        let scope = GraphScope::from_target(target);

        let outcome = session
            .deploy_graph(&scope, &graph, CreateMode::OrReplace)
            .await?;

        let report = DeployReport::new(target, &graph, session.name(), outcome);

        tracing::info!(
            graph = %report.graph,
            scope = %scope,
            outcome = %report.outcome,
            fingerprint = %report.fingerprint,
            "DAG deployed"
        );

        Ok(report)
    }

    /// Deploy with configuration read from the process environment
    pub async fn deploy(&self, environment: &str) -> Result<DeployReport, DeployError> {
        self.deploy_with(environment, pipedeploy_core::environment::process_env).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipedeploy_backend::{MockBackend, MockConnector};

    #[test]
    fn plan_needs_no_credentials() {
        let deployer = Deployer::new(MockConnector::new(MockBackend::new()), ProjectConfig::default());

        let plan = deployer.plan_with("dev", |_| None).unwrap();

        assert_eq!(plan.graph.name(), "DEV_DAILY_DBT_PIPELINE_DAG");
        assert_eq!(plan.scope().fqn(), "DBT_DEV_DB.INTEGRATIONS");
        assert_eq!(plan.report().outcome, DeployOutcome::Planned);
    }

    #[test]
    fn plan_statements() {
        let deployer = Deployer::new(MockConnector::new(MockBackend::new()), ProjectConfig::default());
        let statements = deployer.plan_with("PROD", |_| None).unwrap().statements();

        assert_eq!(statements.len(), 6);
        assert_eq!(
            statements[0],
            "ALTER TASK IF EXISTS DBT_PROD_DB.INTEGRATIONS.PROD_DAILY_DBT_PIPELINE_DAG SUSPEND"
        );
        assert!(statements[4].contains("PROD_DAILY_DBT_PIPELINE_DAG$DBT_GOLD"));
        assert!(statements[4].contains("RUN_DBT_LAYER('gold', 'prod')"));
    }

    #[test]
    fn plan_rejects_unknown_environment() {
        let deployer = Deployer::new(MockConnector::new(MockBackend::new()), ProjectConfig::default());
        let err = deployer.plan_with("sandbox", |_| None).unwrap_err();
        assert!(matches!(err, DeployError::Config(ConfigError::UnknownEnvironment { .. })));
    }
}
