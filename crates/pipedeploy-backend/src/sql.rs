//! Task graph to SQL compilation
//!
//! A graph becomes one scheduled root task named after the graph plus one
//! task per node, named `<graph>$<node>`, chained with `AFTER` clauses:
//!
//! ```text
//! ALTER TASK IF EXISTS DB.SCHEMA.GRAPH SUSPEND
//! CREATE OR REPLACE TASK DB.SCHEMA.GRAPH WAREHOUSE = WH SCHEDULE = '...' AS SELECT 'GRAPH'
//! CREATE OR REPLACE TASK DB.SCHEMA.GRAPH$INGEST WAREHOUSE = WH AFTER DB.SCHEMA.GRAPH AS ...
//! CREATE OR REPLACE TASK DB.SCHEMA.GRAPH$LOAD WAREHOUSE = WH AFTER DB.SCHEMA.GRAPH$INGEST AS ...
//! SELECT SYSTEM$TASK_DEPENDENTS_ENABLE('DB.SCHEMA.GRAPH')
//! ```
//!
//! Tasks are created suspended; the last statement resumes the whole graph.

use pipedeploy_core::task::quote_literal;
use pipedeploy_core::{PipelineGraph, TaskNode};

use crate::adapter::{CreateMode, GraphScope};

/// Fully qualified name of the graph's scheduled root task
pub fn root_task_fqn(scope: &GraphScope, graph: &PipelineGraph) -> String {
    scope.object_fqn(graph.name())
}

/// Fully qualified name of the task backing `node`
pub fn node_task_fqn(scope: &GraphScope, graph: &PipelineGraph, node: &str) -> String {
    scope.object_fqn(&format!("{}${}", graph.name(), node))
}

fn create_clause(mode: CreateMode, fqn: &str) -> String {
    match mode {
        CreateMode::ErrorIfExists => format!("CREATE TASK {}", fqn),
        CreateMode::OrReplace => format!("CREATE OR REPLACE TASK {}", fqn),
        CreateMode::IfNotExists => format!("CREATE TASK IF NOT EXISTS {}", fqn),
    }
}

fn node_statement(scope: &GraphScope, graph: &PipelineGraph, node: &TaskNode, mode: CreateMode) -> String {
    let predecessors: Vec<String> = match graph.parents(&node.name).as_slice() {
        [] => vec![root_task_fqn(scope, graph)],
        parents => parents
            .iter()
            .map(|parent| node_task_fqn(scope, graph, parent))
            .collect(),
    };

    format!(
        "{}\n  WAREHOUSE = {}\n  AFTER {}\nAS\n  {}",
        create_clause(mode, &node_task_fqn(scope, graph, &node.name)),
        graph.effective_warehouse(node),
        predecessors.join(", "),
        node.definition.to_sql()
    )
}

/// Statements that register `graph` under `scope`, in execution order
pub fn compile(scope: &GraphScope, graph: &PipelineGraph, mode: CreateMode) -> Vec<String> {
    let root = root_task_fqn(scope, graph);
    let mut statements = Vec::with_capacity(graph.node_count() + 3);

    // A running graph can't be modified, so stop it first
    if mode == CreateMode::OrReplace {
        statements.push(format!("ALTER TASK IF EXISTS {} SUSPEND", root));
    }

    statements.push(format!(
        "{}\n  WAREHOUSE = {}\n  SCHEDULE = {}\nAS\n  SELECT {}",
        create_clause(mode, &root),
        graph.warehouse(),
        quote_literal(&graph.schedule().to_sql()),
        quote_literal(graph.name())
    ));

    for node in graph.topological_order() {
        statements.push(node_statement(scope, graph, node, mode));
    }

    statements.push(format!(
        "SELECT SYSTEM$TASK_DEPENDENTS_ENABLE({})",
        quote_literal(&root)
    ));

    statements
}

/// Query listing tasks named like the graph root in `scope`
///
/// `LIKE` treats `_` as a wildcard, so the result must be narrowed with
/// [`match_root_task`] before counting rows.
pub fn show_root_task(scope: &GraphScope, graph: &PipelineGraph) -> String {
    format!(
        "SHOW TASKS LIKE {} IN SCHEMA {}",
        quote_literal(graph.name()),
        scope.fqn()
    )
}

/// Rows of the preceding [`show_root_task`] whose name is exactly the root
/// task's (unquoted identifiers are stored upper case)
pub fn match_root_task(graph: &PipelineGraph) -> String {
    format!(
        "SELECT \"name\" FROM TABLE(RESULT_SCAN(LAST_QUERY_ID())) WHERE \"name\" = {}",
        quote_literal(&graph.name().to_uppercase())
    )
}
