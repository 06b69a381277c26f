//! Inspection interface.
//!
//! Read-only pass-through to the content store's SQL engine. Queries see
//! committed rows only; open handles and their buffers are invisible here.

use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Connection, Params};
use serde_json::{Map, Number, Value as Json};
use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::store::ContentStore;

/// Query access to a [`ContentStore`].
#[derive(Debug, Clone)]
pub struct Inspector {
    store: Arc<ContentStore>,
}

/// Result set of an inspection query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Inspector {
    pub fn new(store: Arc<ContentStore>) -> Self {
        Self { store }
    }

    /// Run one read-only statement and collect its rows.
    ///
    /// Statements that could modify the database fail with `ReadOnlyQuery`
    /// before they execute.
    pub fn query<P: Params>(&self, sql: &str, params: P) -> FsResult<QueryRows> {
        let conn = self.store.connection();
        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(FsError::ReadOnlyQuery(sql.trim().to_string()));
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut rows = Vec::new();
        let mut cursor = stmt.query(params)?;
        while let Some(row) = cursor.next()? {
            let values = (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.push(values);
        }
        debug!(rows = rows.len(), "inspection query");
        Ok(QueryRows { columns, rows })
    }

    /// Hand the native connection to `f`.
    ///
    /// Nothing stops `f` from writing; such writes bypass every handle and
    /// are not seen by buffers that are already open.
    ///
    /// The store stays locked while `f` runs, so `f` must only use the
    /// connection it is given; calling back into this store or any `RowFs`
    /// sharing it deadlocks.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> FsResult<T> {
        let conn = self.store.connection();
        Ok(f(&conn)?)
    }
}

impl QueryRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as JSON objects keyed by column name. Blobs become byte arrays.
    pub fn to_json(&self) -> Vec<Json> {
        self.rows
            .iter()
            .map(|row| {
                let object: Map<String, Json> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(value_to_json))
                    .collect();
                Json::Object(object)
            })
            .collect()
    }
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Integer(i) => Json::from(*i),
        Value::Real(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Text(s) => Json::String(s.clone()),
        Value::Blob(bytes) => Json::Array(bytes.iter().map(|&b| Json::from(b)).collect()),
    }
}
