//! Scripted in-memory provider for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traits::AiProvider;
use super::types::{ChatMessage, ChatRequest, ChatResponse, ProviderError, StreamEvent};
use crate::models::ProviderId;

pub fn request(prompt: &str) -> ChatRequest {
    ChatRequest {
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        messages: vec![ChatMessage::user(prompt)],
        base_url: "http://provider.test/v1".to_string(),
        temperature: None,
        max_tokens: None,
    }
}

#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    Fail(String),
}

pub struct ScriptedProvider {
    id: ProviderId,
    replies: Mutex<VecDeque<Scripted>>,
    stream: Mutex<Option<Vec<StreamEvent>>>,
    stream_refused: Mutex<Option<String>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(id: ProviderId) -> Arc<Self> {
        Arc::new(Self {
            id,
            replies: Mutex::new(VecDeque::new()),
            stream: Mutex::new(None),
            stream_refused: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn reply(self: Arc<Self>, content: &str) -> Arc<Self> {
        self.replies
            .lock()
            .unwrap()
            .push_back(Scripted::Reply(content.to_string()));
        self
    }

    pub fn fail(self: Arc<Self>, message: &str) -> Arc<Self> {
        self.replies
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(message.to_string()));
        self
    }

    pub fn stream(self: Arc<Self>, events: Vec<StreamEvent>) -> Arc<Self> {
        *self.stream.lock().unwrap() = Some(events);
        self
    }

    pub fn refuse_stream(self: Arc<Self>, message: &str) -> Arc<Self> {
        *self.stream_refused.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    fn provider_id(&self) -> ProviderId {
        self.id
    }

    async fn send_message(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(content)) => Ok(ChatResponse {
                content,
                model,
                tokens_in: None,
                tokens_out: None,
            }),
            Some(Scripted::Fail(message)) => Err(ProviderError::NetworkError(message)),
            None => Err(ProviderError::InvalidResponse("no scripted reply".to_string())),
        }
    }

    async fn stream_message(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        self.requests.lock().unwrap().push(request);
        let refused = self.stream_refused.lock().unwrap().clone();
        if let Some(message) = refused {
            return Err(ProviderError::NetworkError(message));
        }
        let events = self.stream.lock().unwrap().clone().unwrap_or_default();
        for event in events {
            if tx.send(event).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}
