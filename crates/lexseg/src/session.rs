use std::path::{Path, PathBuf};

use lexseg_core::records::BulkWriteResult;
use lexseg_core::run::DocumentSummary;
use lexseg_core::ranges::PageRangeIndex;
use lexseg_core::RecordSink;
use log::{debug, error};

use crate::config::Config;
use crate::prelude::{eprintln, println, *};
use crate::source::{document_id, list_pdfs, PdfSource};
use crate::store::{BatchWriter, DatabaseConnection, JsonSink, Repository};

/// Settings resolved once per invocation.
pub struct Session {
    pub config: Config,
    pub global: crate::Global,
    database: PathBuf,
}

impl Session {
    pub fn load(global: crate::Global) -> Result<Self> {
        let config = Config::load(global.config.as_deref())?;
        let database = config.database_path(global.database.as_deref())?;
        debug!("Using database {}", database.display());
        Ok(Self {
            config,
            global,
            database,
        })
    }

    pub fn database(&self) -> &Path {
        &self.database
    }

    pub fn repository(&self) -> Result<Repository> {
        Ok(Repository::new(DatabaseConnection::new(&self.database)?))
    }

    /// The page-range table. A dry run without a database resolves nothing.
    pub fn page_ranges(&self) -> Result<PageRangeIndex> {
        if self.global.dry_run && !self.database.exists() {
            return Ok(PageRangeIndex::default());
        }
        let ranges = self.repository()?.page_ranges(None)?;
        let index = PageRangeIndex::from_ranges(ranges);
        debug!("Loaded page ranges for {} document(s)", index.document_count());
        Ok(index)
    }

    /// JSON lines on stdout for a dry run, the database otherwise.
    pub fn sink(&self) -> Result<Box<dyn RecordSink>> {
        if self.global.dry_run {
            return Ok(Box::new(JsonSink::new(std::io::stdout())));
        }
        Ok(Box::new(BatchWriter::new(
            self.repository()?,
            self.config.store.batch_size,
        )))
    }
}

/// Run `step` over every PDF under `path`.
///
/// A document that fails is reported and skipped; the error count is
/// returned with the summaries of the documents that succeeded.
pub fn for_each_pdf<F>(path: &Path, mut step: F) -> Result<(Vec<DocumentSummary>, usize)>
where
    F: FnMut(&str, &PdfSource) -> Result<DocumentSummary>,
{
    let files = list_pdfs(path)?;
    if files.is_empty() {
        return Err(eyre!("No PDF files found in {}", path.display()));
    }

    let progress = new_progress(files.len());
    let mut summaries = Vec::with_capacity(files.len());
    let mut failures = 0;

    for file in &files {
        let document = document_id(file);
        progress.set_message(document.clone());

        match PdfSource::open(file).and_then(|source| step(&document, &source)) {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                error!("{}: {:#}", document, e);
                progress.suspend(|| eprintln!("Skipping {}: {:#}", document, e));
                failures += 1;
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    Ok((summaries, failures))
}

/// Print per-document counts and the store totals.
pub fn report(
    summaries: &[DocumentSummary],
    written: BulkWriteResult,
    failures: usize,
    global: &crate::Global,
) -> Result<()> {
    if global.verbose && !global.dry_run {
        let mut table = new_table();
        table.add_row(prettytable::row!["Document", "Pages", "Records", "Unresolved"]);
        for summary in summaries {
            table.add_row(prettytable::row![
                summary.document,
                summary.pages,
                summary.records,
                summary.unresolved
            ]);
        }
        table.printstd();
    }

    let records: usize = summaries.iter().map(|s| s.records).sum();
    let message = f!(
        "{} document(s), {} record(s): {} inserted, {} updated, {} failed",
        summaries.len(),
        records,
        written.inserted,
        written.updated,
        written.failed
    );
    if global.dry_run {
        eprintln!("{}", message);
    } else {
        println!("{}", message);
    }

    if failures > 0 {
        return Err(eyre!("{} document(s) or page(s) failed; see the log", failures));
    }
    if written.has_failures() {
        return Err(eyre!("{} record(s) failed to store", written.failed));
    }
    Ok(())
}
