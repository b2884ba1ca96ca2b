use std::path::{Path, PathBuf};

use lexseg_core::run::DocumentSummary;
use lexseg_core::{RecordSink, SegmentationRun};

use crate::prelude::*;
use crate::session::{self, Session};

#[derive(Debug, clap::Args)]
pub struct Options {
    /// Folder of PDF files, or a single PDF
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

pub fn run(options: Options, global: crate::Global) -> Result<()> {
    let session = Session::load(global)?;
    let ranges = session.page_ranges()?;
    if ranges.is_empty() {
        log::warn!("Page-range table is empty; footnotes will have no case number");
    }

    let engine = session.config.engine();
    let mut run = SegmentationRun::new(&engine, &ranges, session.sink()?)?;

    let (summaries, failures) = segment(&mut run, &options.path)?;
    let written = run.flush()?;

    session::report(&summaries, written, failures, &session.global)
}

/// Footnotes of every PDF under `path`, with the count of skipped documents.
pub fn segment<S: RecordSink>(
    run: &mut SegmentationRun<'_, S>,
    path: &Path,
) -> Result<(Vec<DocumentSummary>, usize)> {
    session::for_each_pdf(path, |document, source| {
        Ok(run.footnotes(document, source)?)
    })
}
