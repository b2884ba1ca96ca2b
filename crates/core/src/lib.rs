//! Core library for lexseg
//!
//! This crate implements the **Functional Core** of the lexseg application,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! - **`lexseg_core`** (this crate): typographic segmentation with zero I/O
//! - **`pdf`**: the document reader
//! - **`lexseg`**: configuration, storage and orchestration (the Imperative Shell)
//!
//! Court-opinion exports are typeset documents without structure tags. The
//! engine recovers structure from typography alone: a span's font name and
//! size, its neighbour on the same line and its position in the block.
//!
//! ## Functional Core Principles
//!
//! - **Pure functions**: classification and field extraction depend only on
//!   their inputs and the configured signature tables
//! - **Explicit state**: the segment accumulators are two-state machines
//!   owned by the caller, one per document and kind
//! - **Injected I/O**: [`run::DocumentSource`] and [`run::RecordSink`] are the
//!   only seams to the outside world
//!
//! # Module Organization
//!
//! - [`span`]: flattens reader layouts into positioned spans
//! - [`signature`]: font/size signature rules and role classification
//! - [`segment`]: footnote and opinion accumulators
//! - [`fields`]: label-anchored plain-text field extraction
//! - [`metadata`]: per-case metadata built on [`fields`]
//! - [`ranges`]: page range to case number resolution
//! - [`records`]: persisted record shapes
//! - [`run`]: per-run context wiring the above to a source and a sink
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use lexseg_core::segment::FootnoteAccumulator;
//! use lexseg_core::span::flatten_page;
//!
//! let mut acc = FootnoteAccumulator::default();
//! let mut notes = Vec::new();
//! for layout in pages {
//!     notes.extend(acc.feed_page(layout.page, &flatten_page(&layout)));
//! }
//! notes.extend(acc.finish());
//! ```

pub mod fields;
pub mod metadata;
pub mod ranges;
pub mod records;
pub mod run;
pub mod segment;
pub mod signature;
pub mod span;

pub use run::{DocumentSource, RecordSink, RunConfig, RunError, SegmentationRun};
