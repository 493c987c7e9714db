//! Task nodes and their executable definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a task runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskDefinition {
    /// Run a notebook: `EXECUTE NOTEBOOK "db"."schema"."name"()`
    Notebook {
        database: String,
        schema: String,
        name: String,
    },

    /// Call a stored procedure with string arguments
    Procedure {
        database: String,
        schema: String,
        name: String,
        args: Vec<String>,
    },

    /// Raw SQL body
    Sql(String),
}

impl TaskDefinition {
    /// Notebook invocation
    pub fn notebook(
        database: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::Notebook {
            database: database.into(),
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Stored procedure call
    pub fn procedure<I, S>(
        database: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
        args: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Procedure {
            database: database.into(),
            schema: schema.into(),
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Render the definition as a SQL statement
    pub fn to_sql(&self) -> String {
        match self {
            Self::Notebook { database, schema, name } => format!(
                "EXECUTE NOTEBOOK {}.{}.{}()",
                quote_ident(database),
                quote_ident(schema),
                quote_ident(name)
            ),
            Self::Procedure { database, schema, name, args } => {
                let args: Vec<String> = args.iter().map(|a| quote_literal(a)).collect();
                format!("CALL {}.{}.{}({})", database, schema, name, args.join(", "))
            }
            Self::Sql(sql) => sql.trim().to_string(),
        }
    }
}

impl fmt::Display for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

/// Double-quoted identifier, embedded quotes doubled
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Single-quoted string literal, embedded quotes doubled
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// One node of a task graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    /// Unique name within the graph
    pub name: String,

    /// What the task runs
    pub definition: TaskDefinition,

    /// Warehouse override; `None` inherits the graph warehouse
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
}

impl TaskNode {
    pub fn new(name: impl Into<String>, definition: TaskDefinition) -> Self {
        Self {
            name: name.into(),
            definition,
            warehouse: None,
        }
    }

    /// Run this task on a different warehouse than the graph's
    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }
}
