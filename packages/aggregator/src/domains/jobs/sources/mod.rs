//! Per-source fetch adapters.
//!
//! Each adapter issues outbound calls to one job board, decodes the payload
//! and maps it into `JobRow`s with HTML stripped from descriptions and a
//! source-prefixed stable id. Adapters return an error only when nothing
//! could be decoded; pagination, limits and partial-result policy live in the
//! orchestrator (`service.rs`).

pub mod adzuna;
pub mod jooble;
pub mod remoteok;
pub mod remotive;
pub mod salary;
pub mod wwr;

/// Results per page delivered by the paginated boards (adzuna, jooble).
pub const PAGE_SIZE: usize = 50;

/// Boards deliver ids as either strings or numbers.
pub(crate) fn id_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
