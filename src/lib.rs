//! Rekt Charts - DeFi incident history fetcher and chart renderer
//!
//! Pulls every record from the paginated `rekts` GraphQL listing and draws
//! cumulative loss and occurrence charts per issue type.

pub mod chart;
pub mod config;
pub mod fetcher;
pub mod model;
pub mod query;
pub mod report;
pub mod transport;

pub use config::{Config, ConfigError, DEFAULT_API_URL};
pub use fetcher::{AttemptFailure, Checkpoint, FetchError, Fetcher, RetryPolicy};
pub use model::Incident;
pub use query::{build_query, GraphQlRequest, PAGE_SIZE};
pub use report::{file_stem, group_by_issue_type, IssueHistory, ReportSummary, Reporter};
pub use transport::{HttpTransport, RawResponse, Transport, TransportError};
