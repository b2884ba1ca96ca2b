use std::path::PathBuf;

use lexseg_core::ranges::PageRange;
use lexseg_core::records::BulkWriteResult;

use crate::prelude::{println, *};
use crate::session::Session;
use crate::store::Repository;

#[derive(Debug, clap::Parser)]
#[command(name = "ranges")]
#[command(about = "Manage the page-range table")]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Load page ranges from a JSON array of
    /// `{document, unit_no, start_page, end_page}` objects
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Print the stored page ranges
    List {
        /// Only show ranges of this document
        #[arg(long)]
        document: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(app: App, global: crate::Global) -> Result<()> {
    let session = Session::load(global)?;
    match app.command {
        Commands::Import { file } => import(&session, &file),
        Commands::List { document, json } => list(&session, document.as_deref(), json),
    }
}

/// Parse and validate a page-range file.
pub fn parse_ranges(raw: &str) -> Result<Vec<PageRange>> {
    let ranges: Vec<PageRange> =
        serde_json::from_str(raw).context("Page-range file must be a JSON array of ranges")?;

    for range in &ranges {
        if range.start_page == 0 {
            return Err(eyre!(
                "{} {}: start_page is 1-based",
                range.document,
                range.unit_no
            ));
        }
        if range.end_page.is_some_and(|end| end < range.start_page) {
            return Err(eyre!(
                "{} {}: end_page precedes start_page",
                range.document,
                range.unit_no
            ));
        }
    }
    Ok(ranges)
}

/// Validate a page-range file and upsert every row. Nothing is written
/// when any row is invalid.
pub fn import_into(repository: &Repository, raw: &str) -> Result<BulkWriteResult> {
    let ranges = parse_ranges(raw)?;
    repository.upsert_page_ranges(&ranges)
}

fn import(session: &Session, file: &std::path::Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    if session.global.dry_run {
        let ranges = parse_ranges(&raw)?;
        println!("{}", serde_json::to_string_pretty(&ranges)?);
        return Ok(());
    }

    let result = import_into(&session.repository()?, &raw)?;
    println!(
        "{} range(s): {} inserted, {} updated",
        result.total(),
        result.inserted,
        result.updated
    );
    Ok(())
}

fn list(session: &Session, document: Option<&str>, json: bool) -> Result<()> {
    if !session.database().exists() {
        return Err(eyre!("No database at {}", session.database().display()));
    }
    let ranges = session.repository()?.page_ranges(document)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ranges)?);
        return Ok(());
    }

    let mut table = new_table();
    table.add_row(prettytable::row!["Document", "Case", "Start", "End"]);
    for range in &ranges {
        let end = range
            .end_page
            .map(|end| end.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(prettytable::row![
            range.document,
            range.unit_no,
            range.start_page,
            end
        ]);
    }
    table.printstd();
    Ok(())
}
