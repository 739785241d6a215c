use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{ChatRequest, ChatResponse, ProviderError, StreamEvent};
use crate::models::ProviderId;

#[async_trait]
pub trait AiProvider: Send + Sync {
    fn provider_id(&self) -> ProviderId;

    /// Single non-streaming completion.
    async fn send_message(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Writes fragments to `tx` as they arrive, then `Done` or `Error`.
    ///
    /// An `Err` return means the request never started streaming; once the
    /// upstream has accepted the request, failures are reported through `tx`.
    async fn stream_message(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError>;
}
