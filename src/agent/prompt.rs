//! System prompt for the SQL agent.

use crate::connection::BackendKind;

/// Rows a query should return unless the user asks for a different amount.
pub const TOP_K: usize = 10;

const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are an agent designed to interact with a {dialect} database.
Given an input question, create a syntactically correct {dialect} query to run, then look at the results of the query and return the answer.

TABLES:
{tables}

INSTRUCTIONS:
- Unless the user specifies how many results they want, limit your query to at most {top_k} results{limit_hint}
- Order the results by a relevant column to return the most interesting examples
- Never query for all columns of a table, only the columns relevant to the question
- Look at the schema of the relevant tables with sql_db_schema before writing a query
- Check every query with sql_db_query_checker before running it with sql_db_query
- If a query fails, rewrite it and try again
- Only use information returned by the tools to build your final answer
- DO NOT make any DML or DDL statements (INSERT, UPDATE, DELETE, DROP, ALTER, CREATE etc.)
- If the question does not seem related to the database, answer "I don't know"

OUTPUT FORMAT:
Answer the question in plain language. Do not wrap the answer in code blocks."#;

/// Name of the SQL dialect the agent should write.
pub fn dialect_name(backend: BackendKind) -> &'static str {
    match backend {
        BackendKind::Sqlite => "SQLite",
        BackendKind::Postgres => "PostgreSQL",
        BackendKind::SqlServer => "T-SQL (Microsoft SQL Server)",
    }
}

fn limit_hint(backend: BackendKind) -> &'static str {
    match backend {
        BackendKind::SqlServer => " using SELECT TOP n (T-SQL has no LIMIT clause)",
        BackendKind::Sqlite | BackendKind::Postgres => " using LIMIT",
    }
}

/// Builds the system prompt for a database with the given tables.
pub fn build_system_prompt(backend: BackendKind, tables: &[String]) -> String {
    let tables = if tables.is_empty() {
        "(the database has no tables)".to_string()
    } else {
        tables.join(", ")
    };

    SYSTEM_PROMPT_TEMPLATE
        .replace("{dialect}", dialect_name(backend))
        .replace("{tables}", &tables)
        .replace("{top_k}", &TOP_K.to_string())
        .replace("{limit_hint}", limit_hint(backend))
}
