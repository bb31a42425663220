//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database and catalog operations, and own the
//! transactions that keep mutations and their feed activities together.

mod ingest;
mod library;
mod review;

pub use ingest::IngestService;
pub use library::LibraryService;
pub use review::ReviewService;
