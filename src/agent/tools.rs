//! Database tools the SQL agent exposes to the model.
//!
//! Every tool returns plain text. Failures are reported as text too, so the
//! model can read them and correct itself instead of aborting the question.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::checker;
use crate::db::{sample_rows_query, DatabaseClient, ResultSet, Schema};
use crate::llm::{ToolCall, ToolDefinition};

pub const LIST_TABLES: &str = "sql_db_list_tables";
pub const SCHEMA: &str = "sql_db_schema";
pub const QUERY_CHECKER: &str = "sql_db_query_checker";
pub const QUERY: &str = "sql_db_query";

/// Sample rows shown under each table by `sql_db_schema`.
const SAMPLE_ROWS: usize = 3;

/// Row limit for query output handed back to the model.
const MAX_RESULT_ROWS: usize = 50;

/// Character limit for query output handed back to the model.
const MAX_RESULT_CHARS: usize = 4000;

/// Returns the tool definitions available to the model.
pub fn definitions() -> Vec<ToolDefinition> {
    let query_param = |description: &str| {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": description }
            },
            "required": ["query"]
        })
    };

    vec![
        ToolDefinition {
            name: LIST_TABLES.to_string(),
            description: "Returns a comma-separated list of the tables in the database. \
                          Call this first to see what can be queried."
                .to_string(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
        },
        ToolDefinition {
            name: SCHEMA.to_string(),
            description: "Returns the schema and sample rows for the given tables. \
                          Make sure the tables exist by calling sql_db_list_tables first."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "table_names": {
                        "type": "string",
                        "description": "Comma-separated list of tables, e.g. \"users, todos\""
                    }
                },
                "required": ["table_names"]
            }),
        },
        ToolDefinition {
            name: QUERY_CHECKER.to_string(),
            description: "Checks a SQL query for syntax errors without running it. \
                          Always use this before executing a query with sql_db_query."
                .to_string(),
            parameters: query_param("The SQL query to check"),
        },
        ToolDefinition {
            name: QUERY.to_string(),
            description: "Executes a read-only SQL query and returns the rows. If the query \
                          is wrong an error message is returned; rewrite the query and try again."
                .to_string(),
            parameters: query_param("A detailed and correct SQL query"),
        },
    ]
}

/// Runs tool calls against one database.
pub struct SqlToolkit {
    db: Arc<dyn DatabaseClient>,
}

impl SqlToolkit {
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    /// The database the tools run against.
    pub fn db(&self) -> &Arc<dyn DatabaseClient> {
        &self.db
    }

    /// Executes one tool call and returns the text for the model.
    pub async fn run(&self, call: &ToolCall) -> String {
        let start = Instant::now();
        let output = match self.dispatch(call).await {
            Ok(output) => output,
            Err(message) => format!("Error: {message}"),
        };
        debug!(
            tool = %call.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            output_chars = output.len(),
            "Tool call finished"
        );
        output
    }

    async fn dispatch(&self, call: &ToolCall) -> Result<String, String> {
        let args = parse_arguments(&call.arguments)?;

        match call.name.as_str() {
            LIST_TABLES => self.list_tables().await,
            SCHEMA => {
                let names = string_argument(&args, "table_names")?;
                self.describe_tables(&names).await
            }
            QUERY_CHECKER => {
                let query = strip_code_fences(&string_argument(&args, "query")?);
                Ok(checker::check_query(self.db.backend(), &query))
            }
            QUERY => {
                let query = strip_code_fences(&string_argument(&args, "query")?);
                Ok(self.run_query(&query).await)
            }
            other => Err(format!(
                "{other} is not a valid tool, try one of [{LIST_TABLES}, {SCHEMA}, \
                 {QUERY_CHECKER}, {QUERY}]."
            )),
        }
    }

    async fn schema(&self) -> Result<Schema, String> {
        self.db.introspect_schema().await.map_err(|e| e.to_string())
    }

    async fn list_tables(&self) -> Result<String, String> {
        let tables = self.schema().await?.table_names();
        if tables.is_empty() {
            return Ok("The database has no tables.".to_string());
        }
        Ok(tables.join(", "))
    }

    async fn describe_tables(&self, names: &str) -> Result<String, String> {
        let schema = self.schema().await?;
        let requested: Vec<&str> = names
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect();
        if requested.is_empty() {
            return Err("table_names must name at least one table.".to_string());
        }

        let missing: Vec<&str> = requested
            .iter()
            .copied()
            .filter(|n| schema.table(n).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(format!(
                "table_names {{{}}} not found in database",
                missing.join(", ")
            ));
        }

        let mut sections = Vec::with_capacity(requested.len());
        for name in requested {
            let Some(table) = schema.table(name) else {
                continue;
            };
            let sql = sample_rows_query(self.db.backend(), &table.name, SAMPLE_ROWS);
            let samples = match self.db.execute_query(&sql).await {
                Ok(result) => format_sample_rows(&result),
                Err(e) => format!("(sample rows unavailable: {e})"),
            };
            sections.push(format!(
                "{}\n\n/*\n{} rows from {} table:\n{}\n*/",
                schema.table_ddl(table),
                SAMPLE_ROWS,
                table.name,
                samples
            ));
        }
        Ok(sections.join("\n\n"))
    }

    async fn run_query(&self, query: &str) -> String {
        if query.is_empty() {
            return "Error: the query is empty.".to_string();
        }
        if let Some(refusal) = checker::refuse_if_writing(self.db.backend(), query) {
            return refusal;
        }

        match self.db.execute_query(query).await {
            Ok(result) => result.format_for_llm(MAX_RESULT_ROWS, MAX_RESULT_CHARS),
            Err(e) => format!("Error: {e}"),
        }
    }
}

fn parse_arguments(raw: &str) -> Result<JsonValue, String> {
    if raw.trim().is_empty() {
        return Ok(JsonValue::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| format!("tool arguments are not valid JSON: {e}"))
}

// Models occasionally send a list where a comma-separated string is expected.
fn string_argument(args: &JsonValue, name: &str) -> Result<String, String> {
    match args.get(name) {
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(JsonValue::Array(items)) => Ok(items
            .iter()
            .filter_map(JsonValue::as_str)
            .collect::<Vec<_>>()
            .join(", ")),
        _ => Err(format!("missing required argument '{name}'.")),
    }
}

/// Removes a surrounding markdown code fence, if any.
pub fn strip_code_fences(sql: &str) -> String {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").ok());

    match fence.as_ref().and_then(|re| re.captures(sql)) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        None => sql.trim().to_string(),
    }
}

fn format_sample_rows(result: &ResultSet) -> String {
    let header = result
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join("\t");
    let rows = result.rows.iter().map(|row| {
        row.iter()
            .map(|v| v.to_display_string())
            .collect::<Vec<_>>()
            .join("\t")
    });

    std::iter::once(header)
        .chain(rows)
        .collect::<Vec<_>>()
        .join("\n")
}
