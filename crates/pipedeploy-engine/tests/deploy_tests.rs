//! End-to-end deploy tests against the mock backend

use pipedeploy_backend::{BackendError, GraphScope, MockBackend, MockConnector};
use pipedeploy_core::environment::vars;
use pipedeploy_core::{ConfigError, DeployOutcome, ProjectConfig, TaskDefinition};
use pipedeploy_engine::pipeline::{GOLD_TASK, INGEST_TASK, SILVER_TASK};
use pipedeploy_engine::{DeployError, Deployer};
use pretty_assertions::assert_eq;
use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

fn credentials() -> impl Fn(&str) -> Option<String> {
    env(&[
        (vars::ACCOUNT, "xy12345"),
        (vars::USER, "deployer"),
        (vars::PASSWORD, "hunter2"),
    ])
}

fn deployer(backend: &MockBackend) -> Deployer {
    Deployer::new(MockConnector::new(backend.clone()), ProjectConfig::default())
}

#[tokio::test]
async fn deploys_dev_pipeline() {
    let backend = MockBackend::new();

    let report = deployer(&backend).deploy_with("DEV", credentials()).await.unwrap();

    assert_eq!(report.graph, "DEV_DAILY_DBT_PIPELINE_DAG");
    assert_eq!(report.database, "DBT_DEV_DB");
    assert_eq!(report.schema, "INTEGRATIONS");
    assert_eq!(report.warehouse, "DBT_WH");
    assert_eq!(report.backend, "Mock");
    assert_eq!(report.outcome, DeployOutcome::Created);
    assert_eq!(report.tasks, vec![INGEST_TASK, SILVER_TASK, GOLD_TASK]);
    assert_eq!(report.edge_count, 2);

    let stored = backend
        .graph(&GraphScope::new("DBT_DEV_DB", "INTEGRATIONS"), "DEV_DAILY_DBT_PIPELINE_DAG")
        .await
        .unwrap();
    assert_eq!(stored.node_count(), 3);
    assert_eq!(stored.parents(GOLD_TASK), vec![SILVER_TASK]);
    assert_eq!(stored.parents(SILVER_TASK), vec![INGEST_TASK]);
    assert_eq!(stored.fingerprint(), report.fingerprint);
}

#[tokio::test]
async fn blank_environment_is_dev() {
    let backend = MockBackend::new();

    let blank = deployer(&backend).deploy_with("", credentials()).await.unwrap();
    let dev = deployer(&backend).deploy_with("DEV", credentials()).await.unwrap();

    assert_eq!(blank.graph, dev.graph);
    assert_eq!(blank.database, "DBT_DEV_DB");
    assert_eq!(backend.graph_count().await, 1);
}

#[tokio::test]
async fn lower_case_prod_matches_upper_case() {
    let backend = MockBackend::new();

    let report = deployer(&backend).deploy_with("prod", credentials()).await.unwrap();

    assert_eq!(report.environment, "PROD");
    assert_eq!(report.graph, "PROD_DAILY_DBT_PIPELINE_DAG");
    assert_eq!(report.database, "DBT_PROD_DB");

    let stored = backend
        .graph(&GraphScope::new("DBT_PROD_DB", "INTEGRATIONS"), "PROD_DAILY_DBT_PIPELINE_DAG")
        .await
        .unwrap();

    for layer in [SILVER_TASK, GOLD_TASK] {
        match &stored.node(layer).unwrap().definition {
            TaskDefinition::Procedure { args, .. } => assert_eq!(args[1], "prod"),
            other => panic!("Expected procedure call, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn redeploy_replaces_instead_of_duplicating() {
    let backend = MockBackend::new();
    let deployer = deployer(&backend);

    let first = deployer.deploy_with("DEV", credentials()).await.unwrap();
    let second = deployer.deploy_with("DEV", credentials()).await.unwrap();

    assert_eq!(first.outcome, DeployOutcome::Created);
    assert_eq!(second.outcome, DeployOutcome::Replaced);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(backend.graph_count().await, 1);
    assert_eq!(backend.deploy_count(), 2);
}

#[tokio::test]
async fn missing_credentials_fail_before_connecting() {
    let backend = MockBackend::new();

    let err = deployer(&backend)
        .deploy_with("DEV", env(&[(vars::ACCOUNT, "xy12345"), (vars::USER, "deployer")]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::Config(ConfigError::MissingVariable(ref name)) if name == "SNOWFLAKE_PASSWORD"
    ));
    assert_eq!(backend.connection_count(), 0);
    assert_eq!(backend.graph_count().await, 0);
}

#[tokio::test]
async fn missing_account_is_named() {
    let backend = MockBackend::new();

    let err = deployer(&backend)
        .deploy_with("DEV", env(&[]))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Missing required environment variable: SNOWFLAKE_ACCOUNT"
    );
    assert_eq!(backend.connection_count(), 0);
}

#[tokio::test]
async fn unknown_environment_fails_before_connecting() {
    let backend = MockBackend::new();

    let err = deployer(&backend).deploy_with("qa", credentials()).await.unwrap_err();

    assert!(matches!(err, DeployError::Config(ConfigError::UnknownEnvironment { .. })));
    assert_eq!(backend.connection_count(), 0);
}

#[tokio::test]
async fn configured_environment_is_accepted() {
    let backend = MockBackend::new();
    let project = ProjectConfig {
        allowed_environments: vec!["DEV".into(), "QA".into(), "PROD".into()],
        ..ProjectConfig::default()
    };
    let deployer = Deployer::new(MockConnector::new(backend.clone()), project);

    let report = deployer.deploy_with("qa", credentials()).await.unwrap();
    assert_eq!(report.database, "DBT_QA_DB");
}

#[tokio::test]
async fn overrides_flow_into_the_graph() {
    let backend = MockBackend::new();
    let lookup = env(&[
        (vars::ACCOUNT, "xy12345"),
        (vars::USER, "deployer"),
        (vars::PASSWORD, "hunter2"),
        (vars::WAREHOUSE, "TRANSFORM_WH"),
        (vars::ROLE, "DEPLOY_ROLE"),
    ]);

    let report = deployer(&backend).deploy_with("DEV", lookup).await.unwrap();
    assert_eq!(report.warehouse, "TRANSFORM_WH");

    let statements = backend.statements().await;
    assert!(statements[1].contains("WAREHOUSE = TRANSFORM_WH"));
}

#[tokio::test]
async fn malformed_warehouse_override_fails_before_connecting() {
    let backend = MockBackend::new();
    let lookup = env(&[
        (vars::ACCOUNT, "xy12345"),
        (vars::USER, "deployer"),
        (vars::PASSWORD, "hunter2"),
        (vars::WAREHOUSE, "my-wh; DROP DATABASE DBT_DEV_DB"),
    ]);

    let err = deployer(&backend).deploy_with("DEV", lookup).await.unwrap_err();

    assert!(matches!(
        err,
        DeployError::Config(ConfigError::InvalidOverride { ref origin, .. }) if origin == vars::WAREHOUSE
    ));
    assert_eq!(backend.connection_count(), 0);
    assert!(backend.statements().await.is_empty());
}

#[tokio::test]
async fn authentication_failure_propagates() {
    let backend = MockBackend::new().with_auth_failure();

    let err = deployer(&backend).deploy_with("DEV", credentials()).await.unwrap_err();

    assert!(matches!(err, DeployError::Backend(BackendError::AuthenticationError(_))));
    assert_eq!(backend.graph_count().await, 0);
}

#[tokio::test]
async fn connection_test_failure_propagates() {
    let backend = MockBackend::new().with_connection_failure();

    let err = deployer(&backend).deploy_with("DEV", credentials()).await.unwrap_err();

    assert!(matches!(err, DeployError::Backend(BackendError::ConnectionError(_))));
    assert_eq!(backend.deploy_count(), 0);
}

#[tokio::test]
async fn missing_database_surfaces_as_not_found() {
    let backend = MockBackend::new();
    backend.add_missing_database("DBT_PROD_DB").await;

    let err = deployer(&backend).deploy_with("PROD", credentials()).await.unwrap_err();

    assert!(err.to_string().contains("DBT_PROD_DB"));
    assert!(matches!(err, DeployError::Backend(BackendError::NotFound(_))));
}

#[tokio::test]
async fn rejected_definition_propagates() {
    let backend = MockBackend::new();
    backend.add_missing_object("RUN_DBT_LAYER").await;

    let err = deployer(&backend).deploy_with("DEV", credentials()).await.unwrap_err();

    match err {
        DeployError::Backend(BackendError::DefinitionRejected(msg)) => {
            assert!(msg.contains("DBT_SILVER"));
        }
        other => panic!("Expected DefinitionRejected, got {:?}", other),
    }
    assert_eq!(backend.graph_count().await, 0);
}
