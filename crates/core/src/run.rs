//! Per-run context.
//!
//! A run ties the engine to a document reader and a record sink, both
//! injected as traits so the core never touches files or databases. All
//! state lives on the run value or inside one document's accumulators;
//! nothing is shared between documents.

use std::ops::RangeInclusive;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fields::FieldError;
use crate::metadata::{MetadataConfig, MetadataExtractor, MetadataWindows};
use crate::ranges::PageRangeIndex;
use crate::records::{BulkWriteResult, FootnoteRecord, MetadataRecord, OpinionRecord};
use crate::segment::{Footnote, FootnoteAccumulator, Hyperlink, OpinionAccumulator};
use crate::signature::{FootnoteSignatures, OpinionSignatures};
use crate::span::{flatten_page, PageLayout};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{document}: start page {page} is outside 1..={page_count}")]
    PageOutOfRange {
        document: String,
        page: u32,
        page_count: u32,
    },

    #[error("{document}: failed to read document: {source}")]
    Source {
        document: String,
        #[source]
        source: BoxError,
    },

    #[error("record sink failed: {0}")]
    Sink(#[source] BoxError),

    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Read access to one open document. Pages are 1-based.
pub trait DocumentSource {
    fn page_count(&self) -> u32;

    fn page_layout(&self, page: u32) -> Result<PageLayout, BoxError>;

    /// URI annotations of a page with the text found inside each rectangle.
    fn links(&self, page: u32) -> Result<Vec<Hyperlink>, BoxError>;

    /// Plain text of an inclusive page range, pages joined with `\n`.
    fn plain_text(&self, pages: RangeInclusive<u32>) -> Result<String, BoxError>;
}

/// Destination for produced records.
///
/// Implementations may buffer; `flush` writes whatever is pending and
/// returns the counts of every write since the previous flush.
pub trait RecordSink {
    fn put_footnote(&mut self, record: FootnoteRecord) -> Result<(), BoxError>;

    fn put_opinion(&mut self, record: OpinionRecord) -> Result<(), BoxError>;

    fn put_metadata(&mut self, record: MetadataRecord) -> Result<(), BoxError>;

    fn flush(&mut self) -> Result<BulkWriteResult, BoxError>;
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn put_footnote(&mut self, record: FootnoteRecord) -> Result<(), BoxError> {
        (**self).put_footnote(record)
    }

    fn put_opinion(&mut self, record: OpinionRecord) -> Result<(), BoxError> {
        (**self).put_opinion(record)
    }

    fn put_metadata(&mut self, record: MetadataRecord) -> Result<(), BoxError> {
        (**self).put_metadata(record)
    }

    fn flush(&mut self) -> Result<BulkWriteResult, BoxError> {
        (**self).flush()
    }
}

/// Engine settings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub footnote: FootnoteSignatures,
    pub opinion: OpinionSignatures,
    pub metadata: MetadataConfig,
}

/// What one document produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub document: String,
    pub pages: u32,
    pub records: usize,
    /// Footnotes whose page matched no page range.
    pub unresolved: usize,
}

impl DocumentSummary {
    fn new(document: &str, pages: u32) -> Self {
        Self {
            document: document.to_string(),
            pages,
            ..Default::default()
        }
    }
}

pub struct SegmentationRun<'a, S> {
    config: &'a RunConfig,
    ranges: &'a PageRangeIndex,
    extractor: MetadataExtractor,
    sink: S,
}

impl<'a, S: RecordSink> SegmentationRun<'a, S> {
    pub fn new(config: &'a RunConfig, ranges: &'a PageRangeIndex, sink: S) -> Result<Self, RunError> {
        Ok(Self {
            config,
            ranges,
            extractor: MetadataExtractor::new(&config.metadata)?,
            sink,
        })
    }

    pub fn ranges(&self) -> &PageRangeIndex {
        self.ranges
    }

    /// Segment every footnote of a document and resolve its case number.
    pub fn footnotes(
        &mut self,
        document: &str,
        source: &dyn DocumentSource,
    ) -> Result<DocumentSummary, RunError> {
        let pages = source.page_count();
        let mut summary = DocumentSummary::new(document, pages);
        let mut acc = FootnoteAccumulator::new(self.config.footnote.clone());

        for page in 1..=pages {
            let layout = source
                .page_layout(page)
                .map_err(|e| read_error(document, e))?;
            let spans = flatten_page(&layout);
            for footnote in acc.feed_page(page, &spans) {
                self.put_footnote(document, footnote, &mut summary)?;
            }
        }
        if let Some(footnote) = acc.finish() {
            self.put_footnote(document, footnote, &mut summary)?;
        }

        if summary.unresolved > 0 {
            warn!(
                "{}: {} footnote(s) fall outside every page range",
                document, summary.unresolved
            );
        }
        info!("{}: {} footnote(s) over {} page(s)", document, summary.records, pages);
        Ok(summary)
    }

    fn put_footnote(
        &mut self,
        document: &str,
        footnote: Footnote,
        summary: &mut DocumentSummary,
    ) -> Result<(), RunError> {
        let unit_no = self.ranges.resolve(document, footnote.page).map(str::to_string);
        if unit_no.is_none() {
            summary.unresolved += 1;
        }
        summary.records += 1;
        self.sink
            .put_footnote(FootnoteRecord::new(document, footnote, unit_no))
            .map_err(RunError::Sink)
    }

    /// Segment every opinion section of a document.
    pub fn opinions(
        &mut self,
        document: &str,
        source: &dyn DocumentSource,
    ) -> Result<DocumentSummary, RunError> {
        let pages = source.page_count();
        let mut summary = DocumentSummary::new(document, pages);
        let mut acc = OpinionAccumulator::new(self.config.opinion.clone());

        let mut emitted = Vec::new();
        for page in 1..=pages {
            let links = source
                .links(page)
                .map_err(|e| read_error(document, e))?;
            let layout = source
                .page_layout(page)
                .map_err(|e| read_error(document, e))?;
            let spans = flatten_page(&layout);
            emitted.extend(acc.feed_page(page, links, &spans));
        }
        emitted.extend(acc.finish(pages));

        for opinion in emitted {
            debug!(
                "{}: opinion {} spans pages {}-{}",
                document, opinion.unit_id, opinion.start_page, opinion.end_page
            );
            summary.records += 1;
            self.sink
                .put_opinion(OpinionRecord::new(document, opinion))
                .map_err(RunError::Sink)?;
        }

        info!("{}: {} opinion(s) over {} page(s)", document, summary.records, pages);
        Ok(summary)
    }

    /// Extract the metadata of the case starting on `start_page` (1-based).
    pub fn metadata(
        &mut self,
        document: &str,
        source: &dyn DocumentSource,
        start_page: u32,
    ) -> Result<MetadataRecord, RunError> {
        let page_count = source.page_count();
        if start_page == 0 || start_page > page_count {
            return Err(RunError::PageOutOfRange {
                document: document.to_string(),
                page: start_page,
                page_count,
            });
        }

        let settings = &self.config.metadata;
        let windows = MetadataWindows {
            local_text: window_text(source, start_page, settings.local_scan_pages)
                .map_err(|e| read_error(document, e))?,
            extended_text: window_text(source, start_page, settings.extended_scan_pages)
                .map_err(|e| read_error(document, e))?,
            start_page_spans: source
                .page_layout(start_page)
                .map(|layout| flatten_page(&layout))
                .map_err(|e| read_error(document, e))?,
        };

        let record = MetadataRecord {
            document: document.to_string(),
            page: start_page,
            fields: self.extractor.extract(&windows),
        };
        debug!("{}: metadata for page {}: {:?}", document, start_page, record.fields);

        self.sink
            .put_metadata(record.clone())
            .map_err(RunError::Sink)?;
        Ok(record)
    }

    /// Write everything the sink still buffers.
    pub fn flush(&mut self) -> Result<BulkWriteResult, RunError> {
        self.sink.flush().map_err(RunError::Sink)
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

fn read_error(document: &str, source: BoxError) -> RunError {
    RunError::Source {
        document: document.to_string(),
        source,
    }
}

/// Text of `count` pages from `start`, clipped to the document.
fn window_text(source: &dyn DocumentSource, start: u32, count: u32) -> Result<String, BoxError> {
    if count == 0 {
        return Ok(String::new());
    }
    let end = start.saturating_add(count - 1).min(source.page_count());
    source.plain_text(start..=end)
}
