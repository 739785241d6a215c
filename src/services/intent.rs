use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::models::ProviderId;
use crate::providers::{ChatMessage, ProviderError, ProviderRouter};
use crate::services::prompt::build_classifier_prompt;

/// What the user is asking for. Unrecognised classifier output is `GeneralChat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    #[serde(rename = "who_am_i")]
    IdentityQuery,
    #[serde(rename = "system_help")]
    CapabilityQuery,
    #[serde(rename = "price_analysis")]
    PriceQuery,
    #[serde(rename = "chat")]
    GeneralChat,
}

impl Intent {
    pub const ALL: [Intent; 4] = [
        Intent::IdentityQuery,
        Intent::CapabilityQuery,
        Intent::PriceQuery,
        Intent::GeneralChat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::IdentityQuery => "who_am_i",
            Intent::CapabilityQuery => "system_help",
            Intent::PriceQuery => "price_analysis",
            Intent::GeneralChat => "chat",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Intent::IdentityQuery => "询问用户身份",
            Intent::CapabilityQuery => "询问系统功能",
            Intent::PriceQuery => "询问房价、价格、贵不贵",
            Intent::GeneralChat => "普通聊天",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "who_am_i" => Some(Intent::IdentityQuery),
            "system_help" => Some(Intent::CapabilityQuery),
            "price_analysis" => Some(Intent::PriceQuery),
            "chat" => Some(Intent::GeneralChat),
            _ => None,
        }
    }

    /// Outer whitespace is ignored; anything else must match a tag exactly.
    pub fn parse_or_default(raw: &str) -> Self {
        Self::from_str(raw.trim()).unwrap_or(Intent::GeneralChat)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct IntentClassifier {
    router: Arc<ProviderRouter>,
    provider: ProviderId,
    config: ProviderConfig,
}

impl IntentClassifier {
    pub fn new(router: Arc<ProviderRouter>, provider: ProviderId, config: ProviderConfig) -> Self {
        Self {
            router,
            provider,
            config,
        }
    }

    /// One provider call, no retry. Transport and upstream errors propagate.
    pub async fn classify(&self, question: &str) -> Result<Intent, ProviderError> {
        let request = self.config.request(
            vec![ChatMessage::user(build_classifier_prompt(question))],
            Some(0.0),
        );
        let response = self.router.send_message(&self.provider, request).await?;

        let intent = Intent::parse_or_default(&response.content);
        if intent.as_str() != response.content.trim() {
            tracing::debug!(raw = %response.content, "unrecognised classifier output, using chat");
        }
        Ok(intent)
    }
}
