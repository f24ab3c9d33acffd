use crate::error::{Error, Result};

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const MODEL_ENV: &str = "PIPELINE_KB_MODEL";
pub const ENDPOINT_ENV: &str = "PIPELINE_KB_ENDPOINT";
pub const RUN_ENV: &str = "PIPELINE_KB_ENV";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta";

/// Settings for the answer generation service.
#[derive(Clone)]
pub struct GenerationConfig {
    pub api_key: String,
    pub model: String,
    /// Base URL; `/models/{model}:generateContent` is appended.
    pub endpoint: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl GenerationConfig {
    /// Resolve settings from the environment.
    ///
    /// The model comes from the explicit override (--model), then
    /// PIPELINE_KB_MODEL, then the default. A missing GEMINI_API_KEY is an
    /// error: answering questions without a generator is not supported.
    pub fn resolve(model: Option<&str>) -> Result<Self> {
        Self::resolve_with(model, |key| std::env::var(key).ok())
    }

    fn resolve_with(
        model: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let api_key = env(API_KEY_ENV)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{API_KEY_ENV} is not set; it is required to answer questions"
                ))
            })?;

        let model = model
            .map(str::to_string)
            .or_else(|| env(MODEL_ENV))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let endpoint = env(ENDPOINT_ENV)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            api_key,
            model,
            endpoint,
            temperature: 0.3,
            max_output_tokens: 1500,
        })
    }
}

/// Whether internal error detail may be shown to callers.
///
/// Only when PIPELINE_KB_ENV is `development`.
pub fn expose_error_detail() -> bool {
    std::env::var(RUN_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("development"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(
        pairs: &[(&str, &str)],
    ) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let err = GenerationConfig::resolve_with(None, env_from(&[]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let result = GenerationConfig::resolve_with(
            None,
            env_from(&[(API_KEY_ENV, "  ")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn defaults_apply() {
        let config = GenerationConfig::resolve_with(
            None,
            env_from(&[(API_KEY_ENV, "secret")]),
        )
        .unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.max_output_tokens, 1500);
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn explicit_model_wins_over_env() {
        let env = env_from(&[
            (API_KEY_ENV, "secret"),
            (MODEL_ENV, "env-model"),
            (ENDPOINT_ENV, "http://localhost:9000/v1/"),
        ]);
        let config =
            GenerationConfig::resolve_with(Some("flag-model"), &env).unwrap();
        assert_eq!(config.model, "flag-model");
        assert_eq!(config.endpoint, "http://localhost:9000/v1");

        let config = GenerationConfig::resolve_with(None, &env).unwrap();
        assert_eq!(config.model, "env-model");
    }
}
