//! Jobs domain - the ingestion-and-scoring pipeline.
//!
//! ```text
//! Scheduler / HTTP trigger
//!     │
//!     └─► JobService::fetch_and_process_jobs
//!             ├─► sources (parallel fan-out, adaptive pagination)
//!             ├─► dedup + merge
//!             ├─► JobStore::upsert_jobs
//!             └─► scorer::score_new_rows
//!                     └─► Embedder (parallel, per posting)
//!                             └─► JobStore::update_vector_and_fit
//! ```

pub mod error;
pub mod models;
pub mod readiness;
pub mod scheduler;
pub mod scorer;
pub mod service;
pub mod skills;
pub mod sources;

pub use error::JobError;
pub use models::{JobRow, JobStore};
pub use readiness::{JobService, JobServiceHandle, WarmingUpJobService};
pub use scheduler::Scheduler;
pub use service::JobServiceImpl;
pub use skills::SkillsService;
