//! Process configuration, loaded once at startup.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `house-ai.toml` in the working directory, or the file named by `HOUSE_AI_CONFIG`
//! 3. Provider and JWT variables shared with the backend (`QWEN_API_KEY`, `SECRET_KEY`, ...)
//! 4. `HOUSE_AI_*` variables for the server and assistant sections

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ProviderId;
use crate::providers::{ChatMessage, ChatRequest};
use crate::server::auth::JwtAlgorithm;

pub const APP_NAME: &str = "house-ai";
pub const CONFIG_FILE: &str = "house-ai.toml";
pub const CONFIG_PATH_ENV: &str = "HOUSE_AI_CONFIG";

/// Variables read without a prefix, kept identical to the backend's names.
const SHARED_ENV_KEYS: &[&str] = &[
    "kimi_base_url",
    "kimi_api_key",
    "kimi_model",
    "qwen_base_url",
    "qwen_api_key",
    "qwen_model",
    "deepseek_base_url",
    "deepseek_api_key",
    "deepseek_model",
    "secret_key",
    "algorithm",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[source] Box<figment::Error>),

    #[error("missing required setting {key}")]
    Missing { key: String },

    #[error("invalid URL in {key}: {reason}")]
    InvalidUrl { key: String, reason: String },

    #[error("invalid CORS origin {origin:?}: {reason}")]
    InvalidCorsOrigin { origin: String, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthSettings,
    pub assistant: AssistantConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

/// JWT verification settings. Must match the backend that issues the tokens.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub secret_key: String,
    pub algorithm: JwtAlgorithm,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret_key", &"[redacted]")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub classifier_provider: ProviderId,
    pub chat_provider: ProviderId,
    pub chat_temperature: f32,
    /// Upper bound on chat completion length. Unset leaves it to the provider.
    pub chat_max_tokens: Option<u32>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            classifier_provider: ProviderId::Qwen,
            chat_provider: ProviderId::Qwen,
            chat_temperature: 0.7,
            chat_max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub kimi: ProviderConfig,
    pub qwen: ProviderConfig,
    pub deepseek: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            kimi: ProviderConfig::new("https://api.moonshot.cn/v1", "moonshot-v1-8k"),
            qwen: ProviderConfig::new(
                "https://dashscope.aliyuncs.com/compatible-mode/v1",
                "qwen-plus",
            ),
            deepseek: ProviderConfig::new("https://api.deepseek.com/v1", "deepseek-chat"),
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, id: ProviderId) -> &ProviderConfig {
        match id {
            ProviderId::Kimi => &self.kimi,
            ProviderId::Qwen => &self.qwen,
            ProviderId::Deepseek => &self.deepseek,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("model", &self.model)
            .finish()
    }
}

impl ProviderConfig {
    fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: String::new(),
            model: model.to_string(),
        }
    }

    /// Build a request against this provider's endpoint, key and model.
    pub fn request(&self, messages: Vec<ChatMessage>, temperature: Option<f32>) -> ChatRequest {
        ChatRequest {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            messages,
            base_url: self.base_url.clone(),
            temperature,
            max_tokens: None,
        }
    }

    fn validate(&self, id: ProviderId) -> Result<(), ConfigError> {
        let env_key = |field: &str| format!("{}_{}", id.as_str().to_uppercase(), field);

        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: env_key("API_KEY"),
            });
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: env_key("MODEL"),
            });
        }

        let url = url::Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidUrl {
            key: env_key("BASE_URL"),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl {
                key: env_key("BASE_URL"),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load, merge and validate. Any error here should abort startup.
    pub fn load() -> Result<Self, ConfigError> {
        let config: AppConfig = figment()
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for id in ProviderId::ALL {
            self.providers.get(id).validate(id)?;
        }
        if self.auth.secret_key.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "SECRET_KEY".to_string(),
            });
        }
        self.server.validate()
    }
}

impl ServerConfig {
    /// Credentialed CORS needs explicit origins, so `*` is rejected.
    fn validate(&self) -> Result<(), ConfigError> {
        for origin in &self.cors_origins {
            if origin.trim() == "*" {
                return Err(ConfigError::InvalidCorsOrigin {
                    origin: origin.clone(),
                    reason: "wildcard is not allowed with credentials".to_string(),
                });
            }
            if let Err(e) = axum::http::HeaderValue::from_str(origin) {
                return Err(ConfigError::InvalidCorsOrigin {
                    origin: origin.clone(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

pub fn figment() -> Figment {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| CONFIG_FILE.to_string());

    Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(path))
        .merge(shared_env())
        .merge(prefixed_env())
}

fn shared_env() -> Env {
    Env::raw().only(SHARED_ENV_KEYS).map(|key| {
        let key = key.as_str().to_ascii_lowercase();
        let mapped = match key.as_str() {
            "secret_key" => "auth.secret_key".to_string(),
            "algorithm" => "auth.algorithm".to_string(),
            other => other
                .replacen("kimi_", "providers.kimi.", 1)
                .replacen("qwen_", "providers.qwen.", 1)
                .replacen("deepseek_", "providers.deepseek.", 1),
        };
        mapped.into()
    })
}

fn prefixed_env() -> Env {
    Env::prefixed("HOUSE_AI_").map(|key| {
        let key = key.as_str().to_ascii_lowercase();
        let mapped = match key.as_str() {
            "host" | "port" | "cors_origins" => format!("server.{key}"),
            "classifier_provider" | "chat_provider" | "chat_temperature" | "chat_max_tokens" => {
                format!("assistant.{key}")
            }
            other => other.to_string(),
        };
        mapped.into()
    })
}
