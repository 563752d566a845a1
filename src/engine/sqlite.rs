// SQLite engine backed by rusqlite.

use rusqlite::{params, Connection, OpenFlags, Row, Transaction, TransactionBehavior};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use super::{
    Access, Connector, InsertBatch, InsertOutcome, QueryExecutor, Record, COUNT_LINKS,
    INSERT_LINK, SELECT_LINKS,
};
use crate::error::CopyError;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// An open connection; closed when dropped.
pub struct SqliteHandle {
    conn: Connection,
    path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SqliteConnector {
    busy_timeout: Duration,
}

impl Default for SqliteConnector {
    fn default() -> Self {
        SqliteConnector::new(DEFAULT_BUSY_TIMEOUT)
    }
}

impl SqliteConnector {
    pub fn new(busy_timeout: Duration) -> Self {
        SqliteConnector { busy_timeout }
    }
}

impl Connector for SqliteConnector {
    type Handle = SqliteHandle;

    fn connect(&self, path: &Path, access: Access) -> Result<SqliteHandle, CopyError> {
        let flags = match access {
            Access::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            Access::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
        } | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection_err = |source: rusqlite::Error| CopyError::Connection {
            path: path.to_owned(),
            source: source.into(),
        };

        let conn = Connection::open_with_flags(path, flags).map_err(connection_err)?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(connection_err)?;
        tracing::debug!("Opened {} ({:?})", path.display(), access);

        Ok(SqliteHandle {
            conn,
            path: path.to_owned(),
        })
    }
}

fn decode_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        url: row.get(0)?,
        title: row.get(1)?,
        created_at: row.get(2)?,
    })
}

#[derive(Debug, Default, Clone)]
pub struct SqliteExecutor;

impl QueryExecutor for SqliteExecutor {
    type Handle = SqliteHandle;
    type Batch<'h> = SqliteBatch<'h>;

    fn count(&self, handle: &SqliteHandle) -> Result<u64, CopyError> {
        let count: i64 = handle
            .conn
            .query_row(COUNT_LINKS, [], |row| row.get(0))
            .map_err(|source| CopyError::Measurement {
                metric: "row count",
                path: handle.path.clone(),
                source: source.into(),
            })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn file_size(&self, handle: &SqliteHandle) -> Result<u64, CopyError> {
        let metadata =
            std::fs::metadata(&handle.path).map_err(|source| CopyError::Measurement {
                metric: "file size",
                path: handle.path.clone(),
                source: source.into(),
            })?;
        Ok(metadata.len())
    }

    fn query(
        &self,
        handle: &SqliteHandle,
        visit: &mut dyn FnMut(Record) -> Result<(), CopyError>,
    ) -> Result<(), CopyError> {
        let query_err = |source: rusqlite::Error| CopyError::Query {
            path: handle.path.clone(),
            source: source.into(),
        };

        let mut stmt = handle.conn.prepare(SELECT_LINKS).map_err(query_err)?;
        let mut rows = stmt.query([]).map_err(query_err)?;
        let mut index = 0;
        while let Some(row) = rows.next().map_err(query_err)? {
            let record = decode_row(row).map_err(|source| CopyError::Scan {
                path: handle.path.clone(),
                row: index,
                source: source.into(),
            })?;
            visit(record)?;
            index += 1;
        }
        tracing::debug!("Read {} rows from {}", index, handle.path.display());
        Ok(())
    }

    fn begin<'h>(&self, handle: &'h mut SqliteHandle) -> Result<SqliteBatch<'h>, CopyError> {
        let path = handle.path.as_path();
        let tx = handle
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|source| CopyError::Transaction {
                action: "begin",
                path: path.to_owned(),
                source: source.into(),
            })?;
        // Prepared once here; later inserts reuse it from the statement cache.
        tx.prepare_cached(INSERT_LINK)
            .map_err(|source| CopyError::Transaction {
                action: "prepare insert for",
                path: path.to_owned(),
                source: source.into(),
            })?;
        tracing::debug!("Began transaction on {}", path.display());

        Ok(SqliteBatch { tx: Some(tx), path })
    }
}

pub struct SqliteBatch<'h> {
    // Only `None` once `commit` has consumed the transaction
    tx: Option<Transaction<'h>>,
    path: &'h Path,
}

impl SqliteBatch<'_> {
    fn transaction(&self) -> Result<&Transaction<'_>, CopyError> {
        self.tx.as_ref().ok_or_else(|| CopyError::Transaction {
            action: "use",
            path: self.path.to_owned(),
            source: "transaction already finished".into(),
        })
    }
}

impl InsertBatch for SqliteBatch<'_> {
    fn insert(&mut self, record: &Record) -> Result<InsertOutcome, CopyError> {
        let insert_err = |source: rusqlite::Error| CopyError::Insert {
            path: self.path.to_owned(),
            url: record.url.clone(),
            source: source.into(),
        };

        let tx = self.transaction()?;
        let mut stmt = tx.prepare_cached(INSERT_LINK).map_err(insert_err)?;
        let changed = stmt
            .execute(params![record.url, record.title, record.created_at])
            .map_err(insert_err)?;
        Ok(if changed == 0 {
            InsertOutcome::Ignored
        } else {
            InsertOutcome::Added
        })
    }

    fn commit(mut self) -> Result<(), CopyError> {
        let Some(tx) = self.tx.take() else {
            return Ok(());
        };
        tx.commit().map_err(|source| CopyError::Transaction {
            action: "commit",
            path: self.path.to_owned(),
            source: source.into(),
        })?;
        tracing::debug!("Committed transaction on {}", self.path.display());
        Ok(())
    }
}

impl Drop for SqliteBatch<'_> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            match tx.rollback() {
                Ok(()) => tracing::debug!("Rolled back transaction on {}", self.path.display()),
                Err(e) => tracing::warn!(
                    "Failed to roll back transaction on {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }
    }
}
