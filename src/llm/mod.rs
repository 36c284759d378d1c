//! LLM integration for fin-assist.
//!
//! A single OpenAI-compatible backend talks to `/chat/completions` over
//! `reqwest`. The service layer only sees the `LlmProvider` trait.

mod costs;
pub mod openai;
pub mod provider;

pub use costs::{call_cost, model_cost};
pub use openai::OpenAiProvider;
pub use provider::*;

use std::sync::Arc;
use std::time::Duration;

use crate::error::LlmError;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiProvider::new(
        &config.base_url,
        &config.model,
        config.api_key.clone(),
        config.timeout,
    )?;
    tracing::info!(model = %config.model, base_url = %config.base_url, "Using OpenAI-compatible provider");
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_constructs_without_network() {
        let config = LlmConfig {
            api_key: secrecy::SecretString::from("sk-test"),
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(30),
        };
        let provider = create_provider(&config);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().model_name(), "gpt-4o");
    }
}
