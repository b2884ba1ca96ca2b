use std::io::Write;

use lexseg_core::records::{BulkWriteResult, FootnoteRecord, MetadataRecord, OpinionRecord};
use lexseg_core::run::BoxError;
use lexseg_core::RecordSink;
use log::warn;

use super::repository::{PendingWrite, Repository};

/// Buffers upserts and hands them to the repository `batch_size` at a time.
pub struct BatchWriter {
    repository: Repository,
    batch_size: usize,
    pending: Vec<PendingWrite>,
    totals: BulkWriteResult,
}

impl BatchWriter {
    pub fn new(repository: Repository, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            repository,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            totals: BulkWriteResult::default(),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn push(&mut self, write: PendingWrite) -> Result<(), BoxError> {
        self.pending.push(write);
        if self.pending.len() >= self.batch_size {
            self.write_pending()?;
        }
        Ok(())
    }

    fn write_pending(&mut self) -> Result<(), BoxError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        let result = self.repository.bulk_upsert(&batch)?;
        if result.has_failures() {
            warn!("{} of {} writes failed", result.failed, batch.len());
        }
        self.totals += result;
        Ok(())
    }
}

impl RecordSink for BatchWriter {
    fn put_footnote(&mut self, record: FootnoteRecord) -> Result<(), BoxError> {
        self.push(PendingWrite::Footnote(record))
    }

    fn put_opinion(&mut self, record: OpinionRecord) -> Result<(), BoxError> {
        self.push(PendingWrite::Opinion(record))
    }

    fn put_metadata(&mut self, record: MetadataRecord) -> Result<(), BoxError> {
        self.push(PendingWrite::Metadata(record))
    }

    fn flush(&mut self) -> Result<BulkWriteResult, BoxError> {
        self.write_pending()?;
        Ok(std::mem::take(&mut self.totals))
    }
}

/// Writes each record as one JSON line instead of storing it.
pub struct JsonSink<W> {
    out: W,
    written: usize,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit<T: serde::Serialize>(&mut self, record: &T) -> Result<(), BoxError> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }
}

impl<W: Write> RecordSink for JsonSink<W> {
    fn put_footnote(&mut self, record: FootnoteRecord) -> Result<(), BoxError> {
        self.emit(&record)
    }

    fn put_opinion(&mut self, record: OpinionRecord) -> Result<(), BoxError> {
        self.emit(&record)
    }

    fn put_metadata(&mut self, record: MetadataRecord) -> Result<(), BoxError> {
        self.emit(&record)
    }

    /// Nothing is stored, so every emitted record counts as inserted.
    fn flush(&mut self) -> Result<BulkWriteResult, BoxError> {
        self.out.flush()?;
        Ok(BulkWriteResult {
            inserted: std::mem::take(&mut self.written),
            ..Default::default()
        })
    }
}
