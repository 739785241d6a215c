use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::openai::OpenAiCompatProvider;
use super::traits::AiProvider;
use super::types::{ChatRequest, ChatResponse, ProviderError, StreamEvent};
use crate::models::ProviderId;

#[derive(Default)]
pub struct ProviderRouter {
    providers: HashMap<ProviderId, Arc<dyn AiProvider>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// One OpenAI-compatible adapter per known provider, sharing a client.
    pub fn with_openai_compat(client: reqwest::Client) -> Self {
        let mut router = Self::new();
        for id in ProviderId::ALL {
            router.register(Arc::new(OpenAiCompatProvider::new(id, client.clone())));
        }
        router
    }

    pub fn register(&mut self, provider: Arc<dyn AiProvider>) {
        self.providers.insert(provider.provider_id(), provider);
    }

    fn get(&self, provider_id: &ProviderId) -> Result<&Arc<dyn AiProvider>, ProviderError> {
        self.providers.get(provider_id).ok_or_else(|| {
            ProviderError::RequestFailed(format!("Unknown provider: {}", provider_id))
        })
    }

    pub async fn send_message(
        &self,
        provider_id: &ProviderId,
        request: ChatRequest,
    ) -> Result<ChatResponse, ProviderError> {
        tracing::debug!(provider = %provider_id, model = %request.model, "sending completion");
        self.get(provider_id)?.send_message(request).await
    }

    pub async fn stream_message(
        &self,
        provider_id: &ProviderId,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        tracing::debug!(provider = %provider_id, model = %request.model, "opening stream");
        self.get(provider_id)?.stream_message(request, tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::{request, ScriptedProvider};

    #[tokio::test]
    async fn test_dispatches_to_registered_provider() {
        let kimi = ScriptedProvider::new(ProviderId::Kimi).reply("from kimi");
        let qwen = ScriptedProvider::new(ProviderId::Qwen).reply("from qwen");
        let mut router = ProviderRouter::new();
        router.register(kimi.clone());
        router.register(qwen.clone());

        let response = router
            .send_message(&ProviderId::Qwen, request("hi"))
            .await
            .unwrap();

        assert_eq!(response.content, "from qwen");
        assert_eq!(qwen.calls(), 1);
        assert_eq!(kimi.calls(), 0);
    }

    #[test]
    fn test_openai_compat_registers_every_provider() {
        let router = ProviderRouter::with_openai_compat(reqwest::Client::new());
        assert_eq!(router.providers.len(), 3);
        for id in ProviderId::ALL {
            assert!(router.providers.contains_key(&id), "{id} not registered");
        }
    }

    #[tokio::test]
    async fn test_unknown_provider_is_request_failure() {
        let router = ProviderRouter::new();
        let err = router
            .send_message(&ProviderId::Deepseek, request("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RequestFailed(msg) if msg.contains("deepseek")));
    }
}
