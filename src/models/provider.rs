use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ProviderId {
    Kimi,
    Qwen,
    Deepseek,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Kimi, ProviderId::Qwen, ProviderId::Deepseek];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Kimi => "kimi",
            ProviderId::Qwen => "qwen",
            ProviderId::Deepseek => "deepseek",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Kimi => "Moonshot Kimi",
            ProviderId::Qwen => "Alibaba Qwen",
            ProviderId::Deepseek => "DeepSeek",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "kimi" => Some(ProviderId::Kimi),
            "qwen" => Some(ProviderId::Qwen),
            "deepseek" => Some(ProviderId::Deepseek),
            _ => None,
        }
    }
}

/// Accepts any casing and surrounding whitespace, so `HOUSE_AI_CHAT_PROVIDER=Qwen` works.
impl TryFrom<String> for ProviderId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ProviderId::from_str(&value.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown provider {value:?}, expected one of kimi, qwen, deepseek"))
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
