//! Task graph schedules
//!
//! The daily pipeline uses a cron schedule. Minute intervals are part of the
//! library API for graphs built directly with [`crate::PipelineGraphBuilder`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::graph::GraphError;

fn cron_field_regex() -> &'static Regex {
    static FIELD: OnceLock<Regex> = OnceLock::new();
    FIELD.get_or_init(|| {
        Regex::new(r"^[0-9A-Za-z*?/,#-]+$").expect("cron field pattern is valid")
    })
}

/// When the graph root task fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
    /// Five-field cron expression evaluated in `timezone`
    Cron { expression: String, timezone: String },

    /// Fixed interval in minutes
    Interval { minutes: u32 },
}

impl Schedule {
    /// Validated cron schedule
    pub fn cron(expression: &str, timezone: &str) -> Result<Self, GraphError> {
        let expression = expression.split_whitespace().collect::<Vec<_>>().join(" ");
        let fields: Vec<&str> = expression.split(' ').collect();

        if fields.len() != 5 {
            return Err(GraphError::InvalidSchedule(format!(
                "cron expression '{}' has {} fields, expected 5",
                expression,
                fields.len()
            )));
        }

        if let Some(bad) = fields.iter().find(|f| !cron_field_regex().is_match(f)) {
            return Err(GraphError::InvalidSchedule(format!(
                "invalid cron field '{}' in '{}'",
                bad, expression
            )));
        }

        let timezone = timezone.trim();
        let tz_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '+' | '-');
        if timezone.is_empty() || !timezone.chars().all(tz_char) {
            return Err(GraphError::InvalidSchedule(format!(
                "invalid timezone '{}'",
                timezone
            )));
        }

        Ok(Self::Cron {
            expression,
            timezone: timezone.to_string(),
        })
    }

    /// Daily run at `hour`:00 UTC
    pub fn daily_utc(hour: u8) -> Result<Self, GraphError> {
        if hour > 23 {
            return Err(GraphError::InvalidSchedule(format!("hour {} out of range", hour)));
        }
        Self::cron(&format!("0 {} * * *", hour), "UTC")
    }

    /// Validated interval schedule
    pub fn every_minutes(minutes: u32) -> Result<Self, GraphError> {
        if minutes == 0 {
            return Err(GraphError::InvalidSchedule("interval must be at least 1 minute".to_string()));
        }
        Ok(Self::Interval { minutes })
    }

    /// Schedule clause as the warehouse expects it
    pub fn to_sql(&self) -> String {
        match self {
            Self::Cron { expression, timezone } => format!("USING CRON {} {}", expression, timezone),
            Self::Interval { minutes } => format!("{} MINUTE", minutes),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}
