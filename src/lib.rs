// IsItOpen - Core Library
// Crowd-sourced "is it open now?" status for places.
// Exposes the resolver, the query interpreter and the store for the CLI,
// the API server, and tests.

pub mod policy;     // Thresholds, separators, paging
pub mod error;
pub mod models;
pub mod status;     // Status Resolver
pub mod query;      // Query Interpreter
pub mod db;         // SQLite place/report store
pub mod assembly;   // Search + detail glue
pub mod config;
pub mod logging;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use policy::{
    Pagination, StatusPolicy,
    DEFAULT_CONFLICT_MINUTES, DEFAULT_EXPIRY_MINUTES, QUERY_SEPARATORS, REPORT_HISTORY_LIMIT,
};
pub use error::IsItOpenError;
pub use models::{
    Coordinates, NewPlace, NewStatusReport, Place, PlaceCategory, ReportStatus, Reporter,
    StatusReport,
};
pub use status::{resolve_status, CurrentStatus, ResolvedStatus};
pub use query::{interpret_query, split_query, Clause, Field, FilterSpec, QueryIntent};
pub use db::{load_places_csv, setup_database, ImportSummary, PlaceStore, SqliteStore};
pub use assembly::{place_detail, resolve_places, search, PlaceWithStatus, SearchPage};
pub use config::Config;
pub use logging::init_tracing;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
