use std::path::{Path, PathBuf};

use lexseg_core::run::DocumentSummary;
use lexseg_core::{DocumentSource, RecordSink, RunError, SegmentationRun};
use log::warn;

use crate::prelude::*;
use crate::session::{self, Session};

#[derive(Debug, clap::Args)]
#[command(group(clap::ArgGroup::new("start").required(true).args(["page", "from_ranges"])))]
pub struct Options {
    /// A PDF file, or a folder of them
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// 1-based page on which the case starts
    #[arg(long)]
    pub page: Option<u32>,

    /// Use every start page of the document's page-range rows
    #[arg(long)]
    pub from_ranges: bool,
}

/// Where a case starts in each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Start {
    Page(u32),
    FromRanges,
}

impl Options {
    pub fn start(&self) -> Start {
        match self.page {
            Some(page) => Start::Page(page),
            None => Start::FromRanges,
        }
    }
}

/// Outcome of a metadata pass over a folder.
#[derive(Debug, Default)]
pub struct Extraction {
    pub summaries: Vec<DocumentSummary>,
    /// Documents that could not be read.
    pub failures: usize,
    /// Start pages outside their document.
    pub rejected: usize,
}

pub fn run(options: Options, global: crate::Global) -> Result<()> {
    let session = Session::load(global)?;
    let ranges = session.page_ranges()?;
    let engine = session.config.engine();
    let mut run = SegmentationRun::new(&engine, &ranges, session.sink()?)?;

    let extraction = extract(&mut run, &options.path, options.start())?;
    let written = run.flush()?;

    session::report(
        &extraction.summaries,
        written,
        extraction.failures + extraction.rejected,
        &session.global,
    )
}

/// Extract the metadata of every PDF under `path`.
pub fn extract<S: RecordSink>(
    run: &mut SegmentationRun<'_, S>,
    path: &Path,
    start: Start,
) -> Result<Extraction> {
    let mut rejected = 0;
    let (summaries, failures) = session::for_each_pdf(path, |document, source| {
        let (summary, out_of_range) = extract_document(run, document, source, start)?;
        rejected += out_of_range;
        Ok(summary)
    })?;

    Ok(Extraction {
        summaries,
        failures,
        rejected,
    })
}

/// One document. Start pages outside the document are logged and counted,
/// every other error ends the document.
pub fn extract_document<S: RecordSink>(
    run: &mut SegmentationRun<'_, S>,
    document: &str,
    source: &dyn DocumentSource,
    start: Start,
) -> Result<(DocumentSummary, usize)> {
    let start_pages: Vec<u32> = match start {
        Start::Page(page) => vec![page],
        Start::FromRanges => run
            .ranges()
            .ranges_for(document)
            .iter()
            .map(|range| range.start_page)
            .collect(),
    };
    if start_pages.is_empty() {
        warn!("{}: no page ranges", document);
    }

    let mut summary = DocumentSummary {
        document: document.to_string(),
        pages: source.page_count(),
        ..Default::default()
    };
    let mut rejected = 0;
    for page in start_pages {
        match run.metadata(document, source, page) {
            Ok(_) => summary.records += 1,
            Err(e @ RunError::PageOutOfRange { .. }) => {
                warn!("{}", e);
                rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok((summary, rejected))
}
