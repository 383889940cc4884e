//! SQL Server database client implementation.
//!
//! Talks TDS directly through tiberius over a tokio TCP stream. The client
//! needs exclusive access for every request, so it sits behind a mutex.

use crate::connection::{BackendKind, ConnectionDescriptor};
use crate::db::{
    Column, ColumnInfo, DatabaseClient, ForeignKey, ResultSet, Row, Schema, Table, Value,
    MAX_ROWS, QUERY_TIMEOUT_SECS,
};
use crate::error::{DbAskError, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::time::{Duration, Instant};
use tiberius::{AuthMethod, Client, ColumnData, Config, FromSql};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

type TdsClient = Client<Compat<TcpStream>>;

/// SQL Server database client.
pub struct MssqlClient {
    client: Mutex<Option<TdsClient>>,
}

impl std::fmt::Debug for MssqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlClient").finish_non_exhaustive()
    }
}

/// Splits `host`, `host,port`, `host:port` or `[addr]:port` into its parts.
///
/// A bare IPv6 address is all host; its port can only follow a comma.
fn split_host(host: &str) -> (String, u16) {
    let default_port = BackendKind::SqlServer.default_port().unwrap_or(1433);
    let host = host.trim();
    if host.parse::<Ipv6Addr>().is_ok() {
        return (host.to_string(), default_port);
    }
    if let Some((addr, rest)) = host.strip_prefix('[').and_then(|h| h.split_once(']')) {
        let port = rest
            .strip_prefix([',', ':'])
            .and_then(|p| p.trim().parse::<u16>().ok());
        return (addr.to_string(), port.unwrap_or(default_port));
    }
    match host.rsplit_once([',', ':']) {
        Some((name, port)) => match port.trim().parse::<u16>() {
            Ok(port) => (name.trim().to_string(), port),
            Err(_) => (host.to_string(), default_port),
        },
        None => (host.to_string(), default_port),
    }
}

impl MssqlClient {
    /// Connects to the server a SQL Server descriptor names.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let ConnectionDescriptor::SqlServer {
            host,
            database,
            username,
            secret,
        } = descriptor
        else {
            return Err(DbAskError::internal(
                "MssqlClient needs a SQL Server descriptor",
            ));
        };

        let (host_name, port) = split_host(host);
        let mut config = Config::new();
        config.host(&host_name);
        config.port(port);
        config.database(database);
        config.authentication(AuthMethod::sql_server(username, secret.expose()));
        config.trust_cert();

        let tcp = tokio::time::timeout(
            Duration::from_secs(10),
            TcpStream::connect((host_name.as_str(), port)),
        )
        .await
        .map_err(|_| {
            DbAskError::connection(format!(
                "Connection to {host_name}:{port} timed out. The server may be overloaded or unreachable."
            ))
        })?
        .map_err(|e| {
            DbAskError::connection(format!(
                "Cannot connect to {host_name}:{port}. Check that the server is running. ({e})"
            ))
        })?;
        tcp.set_nodelay(true)
            .map_err(|e| DbAskError::connection(e.to_string()))?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| map_connection_error(e, username, database))?;

        debug!(database = %descriptor.label(), "Connected to SQL Server");
        Ok(Self {
            client: Mutex::new(Some(client)),
        })
    }

    /// Runs a statement and returns every row of its first result set.
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<tiberius::Row>> {
        let mut guard = self.client.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| DbAskError::connection("SQL Server connection is closed"))?;

        let stream = client
            .simple_query(sql)
            .await
            .map_err(|e| DbAskError::query(format_query_error(e)))?;
        stream
            .into_first_result()
            .await
            .map_err(|e| DbAskError::query(format_query_error(e)))
    }

    async fn fetch_string_rows(&self, sql: &str, width: usize) -> Result<Vec<Vec<Option<String>>>> {
        let rows = self.fetch_rows(sql).await?;
        Ok(rows
            .iter()
            .map(|row| {
                (0..width)
                    .map(|i| {
                        row.try_get::<&str, usize>(i)
                            .ok()
                            .flatten()
                            .map(str::to_string)
                    })
                    .collect()
            })
            .collect())
    }
}

#[async_trait]
impl DatabaseClient for MssqlClient {
    fn backend(&self) -> BackendKind {
        BackendKind::SqlServer
    }

    async fn introspect_schema(&self) -> Result<Schema> {
        let table_rows = self
            .fetch_string_rows(
                "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME",
                1,
            )
            .await?;

        let mut tables: Vec<Table> = table_rows
            .into_iter()
            .filter_map(|mut row| row.remove(0))
            .map(Table::new)
            .collect();
        let index: HashMap<String, usize> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();

        let column_rows = self
            .fetch_string_rows(
                "SELECT TABLE_NAME, COLUMN_NAME, DATA_TYPE, IS_NULLABLE, COLUMN_DEFAULT \
                 FROM INFORMATION_SCHEMA.COLUMNS ORDER BY TABLE_NAME, ORDINAL_POSITION",
                5,
            )
            .await?;
        for row in column_rows {
            let [Some(table), Some(name), Some(data_type), nullable, default] =
                <[Option<String>; 5]>::try_from(row).unwrap_or_default()
            else {
                continue;
            };
            if let Some(&i) = index.get(&table) {
                tables[i].columns.push(Column {
                    name,
                    data_type,
                    is_nullable: nullable.as_deref() == Some("YES"),
                    default,
                });
            }
        }

        let pk_rows = self
            .fetch_string_rows(
                "SELECT kcu.TABLE_NAME, kcu.COLUMN_NAME \
                 FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
                 JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
                   ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
                 WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY' \
                 ORDER BY kcu.TABLE_NAME, kcu.ORDINAL_POSITION",
                2,
            )
            .await?;
        for row in pk_rows {
            if let [Some(table), Some(column)] = row.as_slice() {
                if let Some(&i) = index.get(table) {
                    tables[i].primary_key.push(column.clone());
                }
            }
        }

        let fk_rows = self
            .fetch_string_rows(
                "SELECT rc.CONSTRAINT_NAME, fk.TABLE_NAME, fk.COLUMN_NAME, pk.TABLE_NAME, pk.COLUMN_NAME \
                 FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc \
                 JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE fk \
                   ON rc.CONSTRAINT_NAME = fk.CONSTRAINT_NAME \
                 JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE pk \
                   ON rc.UNIQUE_CONSTRAINT_NAME = pk.CONSTRAINT_NAME \
                  AND fk.ORDINAL_POSITION = pk.ORDINAL_POSITION \
                 ORDER BY fk.TABLE_NAME, rc.CONSTRAINT_NAME, fk.ORDINAL_POSITION",
                5,
            )
            .await?;
        let mut foreign_keys: Vec<(String, ForeignKey)> = Vec::new();
        for row in fk_rows {
            let [Some(constraint), Some(from_table), Some(from_column), Some(to_table), Some(to_column)] =
                <[Option<String>; 5]>::try_from(row).unwrap_or_default()
            else {
                continue;
            };
            match foreign_keys.last_mut() {
                Some((name, fk)) if *name == constraint => {
                    fk.from_columns.push(from_column);
                    fk.to_columns.push(to_column);
                }
                _ => foreign_keys.push((
                    constraint,
                    ForeignKey::new(from_table, vec![from_column], to_table, vec![to_column]),
                )),
            }
        }

        Ok(Schema {
            tables,
            foreign_keys: foreign_keys.into_iter().map(|(_, fk)| fk).collect(),
        })
    }

    async fn execute_query(&self, sql: &str) -> Result<ResultSet> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_secs(QUERY_TIMEOUT_SECS),
            self.fetch_rows(sql),
        )
        .await
        .map_err(|_| {
            DbAskError::query(format!(
                "Query timed out after {QUERY_TIMEOUT_SECS} seconds"
            ))
        })??;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = result
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), format!("{:?}", col.column_type())))
                    .collect()
            })
            .unwrap_or_default();

        let total_rows = result.len();
        let was_truncated = total_rows > MAX_ROWS;
        if was_truncated {
            warn!(total_rows, max_rows = MAX_ROWS, "Truncating SQL Server result set");
        }

        let rows: Vec<Row> = result
            .into_iter()
            .take(MAX_ROWS)
            .map(|row| row.into_iter().map(convert_value).collect())
            .collect();
        let row_count = rows.len();

        Ok(ResultSet {
            columns,
            rows,
            execution_time,
            row_count,
            total_rows: Some(total_rows),
            was_truncated,
        })
    }

    async fn close(&self) -> Result<()> {
        if let Some(client) = self.client.lock().await.take() {
            client
                .close()
                .await
                .map_err(|e| DbAskError::connection(e.to_string()))?;
        }
        Ok(())
    }
}

/// Renders a temporal column through chrono.
fn temporal<T>(data: &ColumnData<'static>, render: impl FnOnce(T) -> String) -> Value
where
    T: for<'a> FromSql<'a>,
{
    T::from_sql(data)
        .ok()
        .flatten()
        .map(|v| Value::String(render(v)))
        .unwrap_or(Value::Null)
}

/// Converts a single TDS value to our Value type.
fn convert_value(data: ColumnData<'static>) -> Value {
    match data {
        ColumnData::Bit(v) => v.map(Value::Bool).into(),
        ColumnData::U8(v) => v.map(|n| Value::Int(n as i64)).into(),
        ColumnData::I16(v) => v.map(|n| Value::Int(n as i64)).into(),
        ColumnData::I32(v) => v.map(|n| Value::Int(n as i64)).into(),
        ColumnData::I64(v) => v.map(Value::Int).into(),
        ColumnData::F32(v) => v.map(|n| Value::Float(n as f64)).into(),
        ColumnData::F64(v) => v.map(Value::Float).into(),
        ColumnData::String(v) => v.map(|s| Value::String(s.into_owned())).into(),
        ColumnData::Guid(v) => v.map(|g| Value::String(g.to_string())).into(),
        ColumnData::Numeric(v) => v.map(|n| Value::String(n.to_string())).into(),
        ColumnData::Binary(v) => v.map(|b| Value::Bytes(b.into_owned())).into(),
        ColumnData::Xml(v) => v.map(|x| Value::String(x.into_owned().into_string())).into(),
        ref data @ (ColumnData::DateTime(_)
        | ColumnData::SmallDateTime(_)
        | ColumnData::DateTime2(_)) => temporal::<NaiveDateTime>(data, |v| v.to_string()),
        ref data @ ColumnData::Date(_) => temporal::<NaiveDate>(data, |v| v.to_string()),
        ref data @ ColumnData::Time(_) => temporal::<NaiveTime>(data, |v| v.to_string()),
        ref data @ ColumnData::DateTimeOffset(_) => {
            temporal::<DateTime<FixedOffset>>(data, |v| v.to_rfc3339())
        }
    }
}

fn map_connection_error(error: tiberius::error::Error, user: &str, database: &str) -> DbAskError {
    let message = error.to_string();
    let lower = message.to_lowercase();
    if lower.contains("login failed") {
        DbAskError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if lower.contains("cannot open database") {
        DbAskError::connection(format!("Database '{database}' does not exist."))
    } else {
        DbAskError::connection(message)
    }
}

fn format_query_error(error: tiberius::error::Error) -> String {
    match error {
        tiberius::error::Error::Server(token) => format!("ERROR: {}", token.message()),
        other => other.to_string(),
    }
}
