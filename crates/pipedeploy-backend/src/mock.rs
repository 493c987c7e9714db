//! Mock task backend for testing
//!
//! Keeps registered graphs in memory instead of talking to a warehouse.
//! It's useful for:
//! - Unit testing the deployer without credentials
//! - Checking create-or-replace idempotence
//! - Simulating connection failures and rejected definitions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pipedeploy_backend::{MockBackend, MockConnector, CreateMode, GraphScope, TaskBackend};
//!
//! let backend = MockBackend::new();
//! let connector = MockConnector::new(backend.clone());
//!
//! // ... run a deploy through the connector ...
//!
//! assert_eq!(backend.connection_count(), 1);
//! assert_eq!(backend.graph_count().await, 1);
//! ```

use crate::adapter::{BackendConnector, BackendError, CreateMode, GraphScope, TaskBackend};
use pipedeploy_core::{DeployOutcome, EnvironmentConfig, PipelineGraph};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct MockState {
    /// Registered graphs by `db.schema.graph`
    graphs: RwLock<HashMap<String, PipelineGraph>>,

    /// Every statement a deploy would have executed
    statements: RwLock<Vec<String>>,

    /// Objects (notebooks, procedures) that "don't exist"
    missing_objects: RwLock<HashSet<String>>,

    /// Databases that "don't exist"
    missing_databases: RwLock<HashSet<String>>,

    connections: AtomicUsize,
    deploys: AtomicUsize,
}

/// Mock task backend for testing
///
/// Clones share state, so a test can keep one handle for assertions
/// while the deployer owns another.
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<MockState>,

    /// Reject logins
    fail_auth: bool,

    /// Fail connection tests
    fail_connection: bool,

    /// Simulate query latency (milliseconds)
    latency_ms: u64,
}

impl MockBackend {
    /// Create an empty mock backend
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            fail_auth: false,
            fail_connection: false,
            latency_ms: 0,
        }
    }

    /// Reject every login with an authentication error
    pub fn with_auth_failure(mut self) -> Self {
        self.fail_auth = true;
        self
    }

    /// Fail all connection tests
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Add a delay before every operation
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Treat `object` as missing: any task definition mentioning it is
    /// rejected
    pub async fn add_missing_object(&self, object: impl Into<String>) {
        self.state.missing_objects.write().await.insert(object.into());
    }

    /// Treat `database` as missing: sessions scoped to it fail to connect
    pub async fn add_missing_database(&self, database: impl Into<String>) {
        self.state.missing_databases.write().await.insert(database.into());
    }

    /// Pre-register a graph, as if deployed earlier
    pub async fn insert_graph(&self, scope: &GraphScope, graph: PipelineGraph) {
        let key = scope.object_fqn(graph.name());
        self.state.graphs.write().await.insert(key, graph);
    }

    /// Look up a registered graph
    pub async fn graph(&self, scope: &GraphScope, name: &str) -> Option<PipelineGraph> {
        self.state.graphs.read().await.get(&scope.object_fqn(name)).cloned()
    }

    /// Number of registered graphs
    pub async fn graph_count(&self) -> usize {
        self.state.graphs.read().await.len()
    }

    /// Fully qualified names of registered graphs, sorted
    pub async fn graph_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.graphs.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Statements executed so far, in order
    pub async fn statements(&self) -> Vec<String> {
        self.state.statements.read().await.clone()
    }

    /// Sessions opened through a [`MockConnector`]
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Successful `deploy_graph` calls
    pub fn deploy_count(&self) -> usize {
        self.state.deploys.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }

    async fn check_definitions(&self, graph: &PipelineGraph) -> Result<(), BackendError> {
        let missing = self.state.missing_objects.read().await;

        for node in graph.nodes() {
            let sql = node.definition.to_sql();
            if let Some(object) = missing.iter().find(|object| sql.contains(object.as_str())) {
                return Err(BackendError::DefinitionRejected(format!(
                    "Task '{}': object '{}' does not exist or not authorized",
                    node.name, object
                )));
            }
        }

        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TaskBackend for MockBackend {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn test_connection(&self) -> Result<(), BackendError> {
        self.simulate_latency().await;

        if self.fail_connection {
            Err(BackendError::ConnectionError(
                "Simulated connection failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    async fn deploy_graph(
        &self,
        scope: &GraphScope,
        graph: &PipelineGraph,
        mode: CreateMode,
    ) -> Result<DeployOutcome, BackendError> {
        self.simulate_latency().await;

        let key = scope.object_fqn(graph.name());
        let existed = self.state.graphs.read().await.contains_key(&key);

        match (mode, existed) {
            (CreateMode::ErrorIfExists, true) => return Err(BackendError::AlreadyExists(key)),
            (CreateMode::IfNotExists, true) => return Ok(DeployOutcome::Skipped),
            _ => {}
        }

        // Validate everything before touching the registry
        self.check_definitions(graph).await?;

        self.state
            .statements
            .write()
            .await
            .extend(crate::sql::compile(scope, graph, mode));
        self.state.graphs.write().await.insert(key, graph.clone());
        self.state.deploys.fetch_add(1, Ordering::SeqCst);

        Ok(if existed { DeployOutcome::Replaced } else { DeployOutcome::Created })
    }
}

/// Connector handing out sessions on a shared [`MockBackend`]
#[derive(Clone)]
pub struct MockConnector {
    backend: MockBackend,
}

impl MockConnector {
    pub fn new(backend: MockBackend) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl BackendConnector for MockConnector {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn connect(&self, config: &EnvironmentConfig) -> Result<Box<dyn TaskBackend>, BackendError> {
        self.backend.simulate_latency().await;
        self.backend.state.connections.fetch_add(1, Ordering::SeqCst);

        if self.backend.fail_auth {
            return Err(BackendError::AuthenticationError(format!(
                "Incorrect username or password was specified for user '{}'",
                config.credentials.user
            )));
        }

        let database = &config.target.database;
        if self.backend.state.missing_databases.read().await.contains(database) {
            return Err(BackendError::NotFound(format!(
                "Database '{}' does not exist or not authorized",
                database
            )));
        }

        Ok(Box::new(self.backend.clone()))
    }
}
