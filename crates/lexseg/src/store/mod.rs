//! SQLite persistence for page ranges and extracted records.
//!
//! Every record table carries a natural unique key so rerunning a document
//! updates rows in place.

pub mod batch;
pub mod connection;
pub mod repository;
pub mod schema;

pub use batch::{BatchWriter, JsonSink};
pub use connection::DatabaseConnection;
pub use repository::{PendingWrite, Repository};
