//! Snowflake task backend
//!
//! Registers a graph as Snowflake tasks (see [`crate::sql`]). The session
//! needs:
//! - USAGE on the database and schema
//! - CREATE TASK on the schema and EXECUTE TASK on the account
//! - USAGE on the warehouse, and on the notebooks/procedures the tasks call
//!
//! ## Authentication Methods
//!
//! 1. Password authentication (username/password)
//! 2. Key-pair authentication (private key PEM)
//!
//! ## Usage
//!
//! ```rust,ignore
//! let backend = SnowflakeBackend::new(
//!     "xy12345.us-east-1",
//!     "username",
//!     "password"
//! )
//! .with_warehouse("DBT_WH")
//! .with_role("DBT_ROLE")
//! .with_database("DBT_DEV_DB")
//! .with_schema("INTEGRATIONS")
//! .build()?;
//! ```
//!
//! Reference: https://docs.snowflake.com/en/user-guide/tasks-graphs

use crate::adapter::{BackendConnector, BackendError, CreateMode, GraphScope, TaskBackend};
use pipedeploy_core::{DeployOutcome, EnvironmentConfig, PipelineGraph, Secret};

#[cfg(feature = "snowflake")]
use snowflake_api::SnowflakeApi;

/// Builder for SnowflakeBackend
pub struct SnowflakeBackendBuilder {
    account: String,
    username: String,
    secret: Secret,
    warehouse: Option<String>,
    role: Option<String>,
    database: Option<String>,
    schema: Option<String>,
}

impl SnowflakeBackendBuilder {
    /// Create new builder with password authentication
    pub fn with_password(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::with_secret(account, username, Secret::Password(password.into()))
    }

    fn with_secret(account: impl Into<String>, username: impl Into<String>, secret: Secret) -> Self {
        Self {
            account: account.into(),
            username: username.into(),
            secret,
            warehouse: None,
            role: None,
            database: None,
            schema: None,
        }
    }

    /// Builder preloaded with everything a deploy config carries
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        let credentials = &config.credentials;
        Self::with_secret(&credentials.account, &credentials.user, credentials.secret.clone())
            .with_warehouse(&config.target.warehouse)
            .with_role(&config.target.role)
            .with_database(&config.target.database)
            .with_schema(&config.target.schema)
    }

    /// Set the warehouse to use
    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    /// Set the role to use
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the default database
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the default schema
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Build the backend
    #[cfg(feature = "snowflake")]
    pub fn build(self) -> Result<SnowflakeBackend, BackendError> {
        let api = match &self.secret {
            Secret::Password(password) => {
                SnowflakeApi::with_password_auth(
                    &self.account,
                    self.warehouse.as_deref(),
                    self.database.as_deref(),
                    self.schema.as_deref(),
                    &self.username,
                    self.role.as_deref(),
                    password,
                )
                .map_err(|e| BackendError::AuthenticationError(format!(
                    "Failed to authenticate with Snowflake: {}",
                    e
                )))?
            }
            Secret::PrivateKey(private_key_pem) => {
                SnowflakeApi::with_certificate_auth(
                    &self.account,
                    self.warehouse.as_deref(),
                    self.database.as_deref(),
                    self.schema.as_deref(),
                    &self.username,
                    self.role.as_deref(),
                    private_key_pem,
                )
                .map_err(|e| BackendError::AuthenticationError(format!(
                    "Failed to authenticate with key-pair: {}",
                    e
                )))?
            }
        };

        tracing::debug!(
            account = %self.account,
            user = %self.username,
            auth = self.secret.method(),
            "Snowflake session configured"
        );

        Ok(SnowflakeBackend { api })
    }

    /// Build without snowflake feature
    #[cfg(not(feature = "snowflake"))]
    pub fn build(self) -> Result<SnowflakeBackend, BackendError> {
        Err(BackendError::ConfigError(
            "Snowflake support not compiled. Rebuild with: cargo build --features snowflake".to_string()
        ))
    }
}

/// Snowflake task backend
pub struct SnowflakeBackend {
    #[cfg(feature = "snowflake")]
    api: SnowflakeApi,

    #[cfg(not(feature = "snowflake"))]
    _phantom: std::marker::PhantomData<()>,
}

impl SnowflakeBackend {
    /// Create a new Snowflake backend with password authentication (returns builder)
    pub fn new(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> SnowflakeBackendBuilder {
        SnowflakeBackendBuilder::with_password(account, username, password)
    }

    /// Map a Snowflake error message onto a [`BackendError`]
    pub fn classify_error(message: &str) -> BackendError {
        let lower = message.to_lowercase();

        if lower.contains("incorrect username or password")
            || lower.contains("authentication")
            || lower.contains("jwt token is invalid")
        {
            BackendError::AuthenticationError(message.to_string())
        } else if lower.contains("does not exist") || lower.contains("not found") {
            BackendError::NotFound(message.to_string())
        } else if lower.contains("insufficient privileges") || lower.contains("not authorized") {
            BackendError::PermissionDenied(message.to_string())
        } else if lower.contains("already exists") {
            BackendError::AlreadyExists(message.to_string())
        } else if lower.contains("syntax error") || lower.contains("invalid") {
            BackendError::DefinitionRejected(message.to_string())
        } else if lower.contains("connection") || lower.contains("timed out") || lower.contains("dns") {
            BackendError::ConnectionError(message.to_string())
        } else {
            BackendError::QueryError(message.to_string())
        }
    }
}

#[cfg(feature = "snowflake")]
impl SnowflakeBackend {
    async fn exec(&self, sql: &str) -> Result<snowflake_api::QueryResult, BackendError> {
        tracing::debug!(sql = %sql, "executing");
        self.api
            .exec(sql)
            .await
            .map_err(|e| Self::classify_error(&e.to_string()))
    }

    async fn root_task_exists(&self, scope: &GraphScope, graph: &PipelineGraph) -> Result<bool, BackendError> {
        use snowflake_api::QueryResult;

        self.exec(&crate::sql::show_root_task(scope, graph)).await?;
        let result = self.exec(&crate::sql::match_root_task(graph)).await?;
        Ok(match result {
            QueryResult::Arrow(batches) => batches.iter().any(|batch| batch.num_rows() > 0),
            QueryResult::Json(json) => json.value.as_array().is_some_and(|rows| !rows.is_empty()),
            QueryResult::Empty => false,
        })
    }
}

#[async_trait::async_trait]
impl TaskBackend for SnowflakeBackend {
    fn name(&self) -> &'static str {
        "Snowflake"
    }

    #[cfg(feature = "snowflake")]
    async fn test_connection(&self) -> Result<(), BackendError> {
        self.exec("SELECT 1").await.map_err(|e| match e {
            BackendError::QueryError(msg) => {
                BackendError::ConnectionError(format!("Connection test failed: {}", msg))
            }
            other => other,
        })?;
        Ok(())
    }

    #[cfg(not(feature = "snowflake"))]
    async fn test_connection(&self) -> Result<(), BackendError> {
        Err(BackendError::ConfigError(
            "Snowflake support not compiled. Rebuild with: cargo build --features snowflake".to_string()
        ))
    }

    #[cfg(feature = "snowflake")]
    async fn deploy_graph(
        &self,
        scope: &GraphScope,
        graph: &PipelineGraph,
        mode: CreateMode,
    ) -> Result<DeployOutcome, BackendError> {
        let existed = self.root_task_exists(scope, graph).await?;

        match (mode, existed) {
            (CreateMode::ErrorIfExists, true) => {
                return Err(BackendError::AlreadyExists(crate::sql::root_task_fqn(scope, graph)));
            }
            (CreateMode::IfNotExists, true) => return Ok(DeployOutcome::Skipped),
            _ => {}
        }

        for statement in crate::sql::compile(scope, graph, mode) {
            self.exec(&statement).await?;
        }

        tracing::info!(graph = graph.name(), scope = %scope, existed, "task graph registered");

        Ok(if existed { DeployOutcome::Replaced } else { DeployOutcome::Created })
    }

    #[cfg(not(feature = "snowflake"))]
    async fn deploy_graph(
        &self,
        _scope: &GraphScope,
        _graph: &PipelineGraph,
        _mode: CreateMode,
    ) -> Result<DeployOutcome, BackendError> {
        Err(BackendError::ConfigError(
            "Snowflake support not compiled. Rebuild with: cargo build --features snowflake".to_string()
        ))
    }
}

/// Opens Snowflake sessions from a resolved [`EnvironmentConfig`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SnowflakeConnector;

#[async_trait::async_trait]
impl BackendConnector for SnowflakeConnector {
    fn name(&self) -> &'static str {
        "Snowflake"
    }

    async fn connect(&self, config: &EnvironmentConfig) -> Result<Box<dyn TaskBackend>, BackendError> {
        let backend = SnowflakeBackendBuilder::from_config(config).build()?;
        Ok(Box::new(backend))
    }
}
