//! In-memory engine for exercising the copier without database files.
//!
//! Databases are registered on a [`MemoryConnector`] by path; handles opened
//! from it share the same rows, so a test can inspect the destination after a
//! copy. Inserts go to a staging area and only reach the shared rows on commit.

use std::{
    cell::RefCell,
    collections::HashMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use super::{Access, Connector, InsertBatch, InsertOutcome, QueryExecutor, Record};
use crate::error::CopyError;

#[derive(Debug, Default)]
pub struct MemoryDb {
    /// `None` means the database has no `links` table
    links: Option<Vec<Record>>,
    /// Fail every insert after this many have succeeded in one batch
    fail_after: Option<u64>,
    fail_commit: bool,
}

impl MemoryDb {
    pub fn with_links(links: Vec<Record>) -> Self {
        MemoryDb {
            links: Some(links),
            ..MemoryDb::default()
        }
    }

    pub fn without_schema() -> Self {
        MemoryDb::default()
    }

    pub fn fail_inserts_after(mut self, n: u64) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn fail_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn links(&self) -> &[Record] {
        self.links.as_deref().unwrap_or_default()
    }

    fn contains(&self, url: &str) -> bool {
        self.links().iter().any(|r| r.url == url)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryConnector {
    dbs: HashMap<PathBuf, Rc<RefCell<MemoryDb>>>,
}

impl MemoryConnector {
    pub fn insert_db(&mut self, path: impl Into<PathBuf>, db: MemoryDb) -> Rc<RefCell<MemoryDb>> {
        let db = Rc::new(RefCell::new(db));
        self.dbs.insert(path.into(), db.clone());
        db
    }
}

#[derive(Debug)]
pub struct MemoryHandle {
    db: Rc<RefCell<MemoryDb>>,
    path: PathBuf,
}

impl Connector for MemoryConnector {
    type Handle = MemoryHandle;

    fn connect(&self, path: &Path, _access: Access) -> Result<MemoryHandle, CopyError> {
        let db = self
            .dbs
            .get(path)
            .ok_or_else(|| CopyError::Connection {
                path: path.to_owned(),
                source: "no such database".into(),
            })?
            .clone();
        Ok(MemoryHandle {
            db,
            path: path.to_owned(),
        })
    }
}

fn no_such_table(path: &Path, metric: &'static str) -> CopyError {
    CopyError::Measurement {
        metric,
        path: path.to_owned(),
        source: "no such table: links".into(),
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryExecutor;

impl QueryExecutor for MemoryExecutor {
    type Handle = MemoryHandle;
    type Batch<'h> = MemoryBatch<'h>;

    fn count(&self, handle: &MemoryHandle) -> Result<u64, CopyError> {
        let db = handle.db.borrow();
        let links = db
            .links
            .as_ref()
            .ok_or_else(|| no_such_table(&handle.path, "row count"))?;
        Ok(links.len() as u64)
    }

    // Stand-in for a file size: bytes of text stored
    fn file_size(&self, handle: &MemoryHandle) -> Result<u64, CopyError> {
        let db = handle.db.borrow();
        Ok(db
            .links()
            .iter()
            .map(|r| (r.url.len() + r.title.len() + r.created_at.len()) as u64)
            .sum())
    }

    fn query(
        &self,
        handle: &MemoryHandle,
        visit: &mut dyn FnMut(Record) -> Result<(), CopyError>,
    ) -> Result<(), CopyError> {
        // Snapshot first so `visit` may touch the same database.
        let rows = handle
            .db
            .borrow()
            .links
            .clone()
            .ok_or_else(|| CopyError::Query {
                path: handle.path.clone(),
                source: "no such table: links".into(),
            })?;
        for record in rows {
            visit(record)?;
        }
        Ok(())
    }

    fn begin<'h>(&self, handle: &'h mut MemoryHandle) -> Result<MemoryBatch<'h>, CopyError> {
        if handle.db.borrow().links.is_none() {
            return Err(CopyError::Transaction {
                action: "prepare insert for",
                path: handle.path.clone(),
                source: "no such table: links".into(),
            });
        }
        Ok(MemoryBatch {
            handle,
            staged: Vec::new(),
        })
    }
}

pub struct MemoryBatch<'h> {
    handle: &'h MemoryHandle,
    staged: Vec<Record>,
}

impl InsertBatch for MemoryBatch<'_> {
    fn insert(&mut self, record: &Record) -> Result<InsertOutcome, CopyError> {
        let db = self.handle.db.borrow();
        if let Some(n) = db.fail_after {
            if self.staged.len() as u64 >= n {
                return Err(CopyError::Insert {
                    path: self.handle.path.clone(),
                    url: record.url.clone(),
                    source: "simulated engine failure".into(),
                });
            }
        }
        if db.contains(&record.url) || self.staged.iter().any(|r| r.url == record.url) {
            return Ok(InsertOutcome::Ignored);
        }
        self.staged.push(record.clone());
        Ok(InsertOutcome::Added)
    }

    fn commit(mut self) -> Result<(), CopyError> {
        if self.handle.db.borrow().fail_commit {
            return Err(CopyError::Transaction {
                action: "commit",
                path: self.handle.path.clone(),
                source: "simulated commit failure".into(),
            });
        }
        let staged = std::mem::take(&mut self.staged);
        self.handle
            .db
            .borrow_mut()
            .links
            .get_or_insert_with(Vec::new)
            .extend(staged);
        Ok(())
    }
}

impl Drop for MemoryBatch<'_> {
    fn drop(&mut self) {
        if !self.staged.is_empty() {
            tracing::debug!(
                "Discarding {} staged rows for {}",
                self.staged.len(),
                self.handle.path.display()
            );
        }
    }
}
