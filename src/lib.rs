//! hireflow-core - the client-side data layer for a recruiting pipeline
//!
//! This library provides a cache-backed view of jobs and candidates with:
//! - Optimistic updates with snapshot/rollback on failure
//! - Mandatory post-settle invalidation and background revalidation
//! - A seven-stage candidate board with paginated columns
//! - Drag-reorder of jobs lists with stale-index guards
//! - Normalization of the backend's four list envelope shapes
//!
//! # Example
//!
//! ```ignore
//! use hireflow_core::{
//!     CacheConfig, CacheStore, FaultProfile, MockBackend, QueryClient,
//!     SearchParams, Stage, StageBoardController,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = Arc::new(MockBackend::new(FaultProfile::default()));
//!     let cache = Arc::new(CacheStore::new(CacheConfig::default()));
//!     let client = QueryClient::new(cache, backend);
//!
//!     // Read-through queries: fresh entries never touch the backend.
//!     let jobs = client.jobs(&SearchParams::default()).await.unwrap();
//!     println!("{} jobs", jobs.pagination.total);
//!
//!     // The board moves candidates optimistically and reconciles after.
//!     let mut board = StageBoardController::new(client, None);
//!     board.refresh().await.unwrap();
//!     board
//!         .move_candidate("candidate-1", Stage::Applied, Stage::Interview, 0)
//!         .await
//!         .ok();
//! }
//! ```

mod backend;
mod board;
mod cache;
mod envelope;
mod error;
mod key;
mod mock;
mod model;
mod mutation;
mod queries;
mod reorder;
mod utils;

// Re-export public API
pub use backend::{
    ApiResponse, Backend, CandidateDraft, CandidatePatch, JobDraft, JobPatch, RetryBackend,
};
pub use board::StageBoardController;
pub use cache::{CacheConfig, CacheEntry, CacheStore, Refetcher, Snapshot};
pub use envelope::{normalize_list, ListEnvelope};
pub use error::ApiError;
pub use key::{QueryKey, NS_CANDIDATES, NS_CANDIDATES_BY_STAGE, NS_JOBS};
pub use mock::{CallCounts, EnvelopeStyle, FaultProfile, MockBackend};
pub use model::{
    Candidate, Job, JobStatus, Paginated, Pagination, SearchParams, SortDirection, Stage,
    TimelineEntry,
};
pub use mutation::{MutationEngine, MutationHooks};
pub use queries::QueryClient;
pub use reorder::ReorderController;
