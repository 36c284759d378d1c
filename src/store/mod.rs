//! libSQL-backed storage for financial periods and LLM usage.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{
    Database, LlmCallRecord, LlmUsageSummary, PeriodFilter, UpsertOutcome,
};
