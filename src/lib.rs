//! fin-assist: unified financial data API with LLM-backed analysis.

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod periods;
pub mod prompts;
pub mod service;
pub mod sources;
pub mod store;
pub mod telemetry;
