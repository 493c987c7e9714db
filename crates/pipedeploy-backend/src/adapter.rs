//! Backend traits for registering task graphs

use pipedeploy_core::{DeployOutcome, DeployTarget, EnvironmentConfig, PipelineGraph};
use std::fmt;

/// Database and schema a graph is registered under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphScope {
    pub database: String,
    pub schema: String,
}

impl GraphScope {
    pub fn new(database: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
        }
    }

    /// Scope of a resolved deploy target
    pub fn from_target(target: &DeployTarget) -> Self {
        Self::new(&target.database, &target.schema)
    }

    /// `database.schema`
    pub fn fqn(&self) -> String {
        format!("{}.{}", self.database, self.schema)
    }

    /// `database.schema.object`
    pub fn object_fqn(&self, object: &str) -> String {
        format!("{}.{}.{}", self.database, self.schema, object)
    }
}

impl fmt::Display for GraphScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fqn())
    }
}

/// How to treat a graph that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateMode {
    /// Fail with [`BackendError::AlreadyExists`]
    #[default]
    ErrorIfExists,

    /// Overwrite the existing definition
    OrReplace,

    /// Leave the existing definition in place
    IfNotExists,
}

/// Errors raised by a backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Definition rejected: {0}")]
    DefinitionRejected(String),

    #[error("Graph already exists: {0}")]
    AlreadyExists(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// A task-orchestration service that stores graph definitions
#[async_trait::async_trait]
pub trait TaskBackend: Send + Sync {
    /// Get the backend name (e.g., "Snowflake")
    fn name(&self) -> &'static str;

    /// Check that the session works before submitting anything
    async fn test_connection(&self) -> Result<(), BackendError>;

    /// Register `graph` under `scope`.
    ///
    /// With [`CreateMode::OrReplace`] an existing graph of the same name is
    /// overwritten and re-running is idempotent.
    async fn deploy_graph(
        &self,
        scope: &GraphScope,
        graph: &PipelineGraph,
        mode: CreateMode,
    ) -> Result<DeployOutcome, BackendError>;
}

/// Opens backend sessions from resolved configuration
#[async_trait::async_trait]
pub trait BackendConnector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Authenticate with the config's credentials and role, scoped to its
    /// database and schema
    async fn connect(&self, config: &EnvironmentConfig) -> Result<Box<dyn TaskBackend>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_scope() {
        let scope = GraphScope::new("DBT_DEV_DB", "INTEGRATIONS");
        assert_eq!(scope.fqn(), "DBT_DEV_DB.INTEGRATIONS");
        assert_eq!(scope.object_fqn("MY_DAG"), "DBT_DEV_DB.INTEGRATIONS.MY_DAG");
        assert_eq!(scope.to_string(), "DBT_DEV_DB.INTEGRATIONS");
    }

    #[test]
    fn default_mode_is_strict() {
        assert_eq!(CreateMode::default(), CreateMode::ErrorIfExists);
    }
}
