//! Task-orchestration backends
//!
//! A backend registers a validated [`PipelineGraph`](pipedeploy_core::PipelineGraph)
//! under a database/schema scope. The deployer only talks to the
//! [`TaskBackend`] and [`BackendConnector`] traits.
//!
//! ## Features
//!
//! Enable warehouse support via Cargo features:
//! - `snowflake` - Snowflake tasks via the SQL API
//!
//! Without a warehouse feature the Snowflake backend still compiles its SQL
//! (useful for dry runs) but refuses to connect.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pipedeploy_backend::{SnowflakeConnector, BackendConnector, CreateMode, GraphScope};
//!
//! let backend = SnowflakeConnector.connect(&config).await?;
//! let scope = GraphScope::from_target(&config.target);
//! backend.deploy_graph(&scope, &graph, CreateMode::OrReplace).await?;
//! ```

pub mod adapter;
pub mod sql;
pub mod snowflake;
pub mod mock;

pub use adapter::{TaskBackend, BackendConnector, BackendError, CreateMode, GraphScope};
pub use snowflake::{SnowflakeBackend, SnowflakeBackendBuilder, SnowflakeConnector};
pub use mock::{MockBackend, MockConnector};
