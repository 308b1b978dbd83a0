use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::{LlmClient, ModelEndpoint};
use crate::screening::scorer::ScorerSettings;

/// Builds a model endpoint for the credential supplied with a request.
pub type EndpointFactory = Arc<dyn Fn(&str) -> Arc<dyn ModelEndpoint> + Send + Sync>;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub scorer_settings: ScorerSettings,
    /// Each `/analyze-cv` request carries its own API key.
    pub endpoints: EndpointFactory,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let base_url = config.openai_base_url.clone();
        let model = config.model.clone();
        let endpoints: EndpointFactory = Arc::new(move |api_key: &str| {
            Arc::new(LlmClient::new(api_key.to_string(), &base_url, &model))
                as Arc<dyn ModelEndpoint>
        });

        Self {
            scorer_settings: ScorerSettings {
                retry_delay: config.retry_delay,
                ..ScorerSettings::default()
            },
            endpoints,
        }
    }
}
