#![allow(unused)]

use std::path::PathBuf;

use crate::prelude::*;
use clap::Parser;

mod config;
mod error;
mod footnotes;
mod metadata;
mod opinions;
mod prelude;
mod ranges;
mod session;
mod source;
mod store;
#[cfg(test)]
mod testing;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Segment footnotes, opinion sections and case metadata out of court-opinion PDFs"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// SQLite database file
    #[clap(long, env = "LEXSEG_DATABASE", global = true)]
    pub database: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[clap(long, env = "LEXSEG_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Whether to display additional information.
    #[clap(long, env = "LEXSEG_VERBOSE", global = true, default_value = "false")]
    pub verbose: bool,

    /// Print records as JSON lines instead of storing them
    #[clap(long, global = true, default_value = "false")]
    pub dry_run: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Extract footnotes and attach case numbers from the page-range table
    Footnotes(crate::footnotes::Options),

    /// Extract opinion sections with their hyperlinks
    Opinions(crate::opinions::Options),

    /// Extract case metadata starting at a page
    Metadata(crate::metadata::Options),

    /// Page-range table operations
    Ranges(crate::ranges::App),
}

fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Footnotes(options) => crate::footnotes::run(options, app.global),
        SubCommands::Opinions(options) => crate::opinions::run(options, app.global),
        SubCommands::Metadata(options) => crate::metadata::run(options, app.global),
        SubCommands::Ranges(sub_app) => crate::ranges::run(sub_app, app.global),
    }
}
