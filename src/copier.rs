use std::{path::Path, time::Instant};

use crate::{
    engine::{
        sqlite::{SqliteConnector, SqliteExecutor},
        Access, Connector, InsertBatch, QueryExecutor,
    },
    error::CopyError,
    report::{Report, Snapshot},
};

/// Copies `links` rows from one database into another, skipping URLs the
/// destination already has, and measures both sides before and after.
pub struct Copier<C, Q> {
    connector: C,
    executor: Q,
}

impl Copier<SqliteConnector, SqliteExecutor> {
    pub fn sqlite(connector: SqliteConnector) -> Self {
        Copier::new(connector, SqliteExecutor)
    }
}

impl<C, Q> Copier<C, Q>
where
    C: Connector,
    Q: QueryExecutor<Handle = C::Handle>,
{
    pub fn new(connector: C, executor: Q) -> Self {
        Copier {
            connector,
            executor,
        }
    }

    fn snapshot(&self, handle: &C::Handle) -> Result<Snapshot, CopyError> {
        Ok(Snapshot {
            count: self.executor.count(handle)?,
            size: self.executor.file_size(handle)?,
        })
    }

    /// Runs one copy in a single destination transaction.
    ///
    /// Nothing is written unless every row is processed; both handles are
    /// closed on return either way.
    pub fn copy(&self, source_path: &Path, dest_path: &Path) -> Result<Report, CopyError> {
        tracing::info!(
            "Copying links from {} to {}",
            source_path.display(),
            dest_path.display()
        );
        let start = Instant::now();

        let source = self.connector.connect(source_path, Access::ReadOnly)?;
        let mut dest = self.connector.connect(dest_path, Access::ReadWrite)?;

        let source_snapshot = self.snapshot(&source)?;
        let dest_before = self.snapshot(&dest)?;
        tracing::debug!("Source: {:?}, destination: {:?}", source_snapshot, dest_before);

        let tally = {
            let mut batch = self.executor.begin(&mut dest)?;
            let tally = self.executor.drain_insert(&source, &mut batch)?;
            batch.commit()?;
            tally
        };

        let dest_after = self.snapshot(&dest)?;
        let report = Report {
            source: source_snapshot,
            dest_before,
            dest_after,
            tally,
        };
        if report.dest_count_change() != i64::try_from(tally.added).unwrap_or(i64::MAX) {
            tracing::warn!(
                "Destination grew by {} rows but {} were added; was it written concurrently?",
                report.dest_count_change(),
                tally.added
            );
        }

        tracing::info!(
            "Processed {} rows ({} added, {} ignored) in {:.2}s",
            tally.processed(),
            tally.added,
            tally.ignored,
            start.elapsed().as_secs_f64()
        );
        Ok(report)
    }
}
