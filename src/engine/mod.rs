use std::path::Path;

use crate::error::CopyError;

#[cfg(test)]
pub mod memory;
pub mod sqlite;

pub const COUNT_LINKS: &str = "SELECT COUNT(*) FROM links";
pub const SELECT_LINKS: &str = "SELECT url, title, created_at FROM links";
pub const INSERT_LINK: &str =
    "INSERT OR IGNORE INTO links (url, title, created_at) VALUES (?1, ?2, ?3)";

/// One row of the `links` table. Identity is `url` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub url: String,
    pub title: String,
    pub created_at: String,
}

#[cfg(test)]
impl Record {
    pub fn new(url: &str, title: &str, created_at: &str) -> Self {
        Record {
            url: url.to_owned(),
            title: title.to_owned(),
            created_at: created_at.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Never creates the file
    ReadOnly,
    /// Existing file only, also never creates it
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Added,
    /// Zero rows affected: `url` already present
    Ignored,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub added: u64,
    pub ignored: u64,
}

impl Tally {
    pub fn record(&mut self, outcome: InsertOutcome) {
        match outcome {
            InsertOutcome::Added => self.added += 1,
            InsertOutcome::Ignored => self.ignored += 1,
        }
    }

    pub fn processed(&self) -> u64 {
        self.added + self.ignored
    }
}

pub trait Connector {
    type Handle;

    fn connect(&self, path: &Path, access: Access) -> Result<Self::Handle, CopyError>;
}

/// A destination transaction with its prepared insert-or-ignore statement.
///
/// Dropping a batch without calling `commit` rolls it back.
pub trait InsertBatch {
    fn insert(&mut self, record: &Record) -> Result<InsertOutcome, CopyError>;
    fn commit(self) -> Result<(), CopyError>;
}

pub trait QueryExecutor {
    type Handle;
    type Batch<'h>: InsertBatch
    where
        Self::Handle: 'h;

    /// Row count of the `links` table
    fn count(&self, handle: &Self::Handle) -> Result<u64, CopyError>;

    /// Size in bytes of the database behind `handle`
    fn file_size(&self, handle: &Self::Handle) -> Result<u64, CopyError>;

    /// Streams every source row, in order, through `visit`.
    ///
    /// The pass is forward-only; an error returned by `visit` stops it and is
    /// returned unchanged.
    fn query(
        &self,
        handle: &Self::Handle,
        visit: &mut dyn FnMut(Record) -> Result<(), CopyError>,
    ) -> Result<(), CopyError>;

    fn begin<'h>(&self, handle: &'h mut Self::Handle) -> Result<Self::Batch<'h>, CopyError>;

    /// Drains the source query into `batch`, counting each row as added or
    /// ignored by the number of rows its insert affected.
    fn drain_insert<B: InsertBatch>(
        &self,
        source: &Self::Handle,
        batch: &mut B,
    ) -> Result<Tally, CopyError> {
        let mut tally = Tally::default();
        self.query(source, &mut |record| {
            let outcome = batch.insert(&record)?;
            tracing::trace!("{} {:?}", record.url, outcome);
            tally.record(outcome);
            Ok(())
        })?;
        Ok(tally)
    }
}
