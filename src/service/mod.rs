//! Application services shared by the HTTP API and the CLI loader.

pub mod ai;
pub mod data;

pub use ai::{AiService, DataSummary, Insights, InsightsRange, QueryAnswer};
pub use data::DataService;
