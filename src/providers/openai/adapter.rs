use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tokio::sync::mpsc;

use super::models::*;
use crate::models::ProviderId;
use crate::providers::traits::AiProvider;
use crate::providers::types::{ChatMessage, ChatRequest, ChatResponse, ProviderError, StreamEvent};

/// Adapter for any backend that speaks the OpenAI chat-completions format.
///
/// Kimi, Qwen (DashScope compatible mode) and DeepSeek all expose this API,
/// so one adapter is registered per [`ProviderId`].
pub struct OpenAiCompatProvider {
    id: ProviderId,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(id: ProviderId, client: Client) -> Self {
        Self { id, client }
    }

    fn endpoint(base_url: &str) -> String {
        format!("{}/chat/completions", base_url.trim_end_matches('/'))
    }

    fn build_messages(messages: &[ChatMessage]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|msg| OpenAiMessage {
                role: msg.role.as_str().to_string(),
                content: Some(msg.content.clone()),
            })
            .collect()
    }

    fn build_body(request: &ChatRequest, stream: bool) -> OpenAiRequest {
        OpenAiRequest {
            model: request.model.clone(),
            messages: Self::build_messages(&request.messages),
            stream,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    fn parse_error_message(status: StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            return format!("HTTP {}: {}", status.as_u16(), parsed.error.message);
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }

    fn retry_after(response: &Response) -> Option<u64> {
        response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    async fn post(&self, request: &ChatRequest, stream: bool) -> Result<Response, ProviderError> {
        let url = Self::endpoint(&request.base_url);
        let body = Self::build_body(request, stream);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&request.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        Self::check_status(response).await
    }

    async fn check_status(response: Response) -> Result<Response, ProviderError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthError("Invalid API key".to_string()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after_secs: Self::retry_after(&response),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        Ok(response)
    }

    fn into_chat_response(
        response: OpenAiResponse,
        requested_model: String,
    ) -> Result<ChatResponse, ProviderError> {
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("No content in response".to_string()))?;

        let (tokens_in, tokens_out) = response
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((None, None));

        Ok(ChatResponse {
            content,
            model: response.model.unwrap_or(requested_model),
            tokens_in,
            tokens_out,
        })
    }
}

#[async_trait]
impl AiProvider for OpenAiCompatProvider {
    fn provider_id(&self) -> ProviderId {
        self.id
    }

    async fn send_message(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let response = self.post(&request, false).await?;

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let reply = Self::into_chat_response(parsed, request.model)?;
        tracing::debug!(
            provider = %self.id,
            model = %reply.model,
            tokens_in = ?reply.tokens_in,
            tokens_out = ?reply.tokens_out,
            "completion received"
        );
        Ok(reply)
    }

    async fn stream_message(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        use super::stream::parse_sse_stream;

        let response = self.post(&request, true).await?;
        parse_sse_stream(response.bytes_stream(), tx).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        assert_eq!(
            OpenAiCompatProvider::endpoint("https://dashscope.aliyuncs.com/compatible-mode/v1/"),
            "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions"
        );
        assert_eq!(
            OpenAiCompatProvider::endpoint("https://api.deepseek.com/v1"),
            "https://api.deepseek.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_body_serializes_roles_and_omits_unset_options() {
        let request = ChatRequest {
            api_key: "k".to_string(),
            model: "qwen-plus".to_string(),
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
            base_url: "http://x/v1".to_string(),
            temperature: None,
            max_tokens: None,
        };

        let body = serde_json::to_value(OpenAiCompatProvider::build_body(&request, true)).unwrap();

        assert_eq!(body["model"], "qwen-plus");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_body_carries_max_tokens_when_set() {
        let request = ChatRequest {
            api_key: "k".to_string(),
            model: "deepseek-chat".to_string(),
            messages: vec![ChatMessage::user("hi")],
            base_url: "http://x/v1".to_string(),
            temperature: Some(0.7),
            max_tokens: Some(512),
        };

        let body = serde_json::to_value(OpenAiCompatProvider::build_body(&request, false)).unwrap();

        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_error_message_prefers_upstream_detail() {
        let msg = OpenAiCompatProvider::parse_error_message(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"model not found"}}"#,
        );
        assert_eq!(msg, "HTTP 400: model not found");

        let msg = OpenAiCompatProvider::parse_error_message(StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(msg, "HTTP 502: Request failed");
    }

    #[test]
    fn test_response_without_choices_is_invalid() {
        let parsed: OpenAiResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        let err = OpenAiCompatProvider::into_chat_response(parsed, "m".to_string()).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_response_content_and_usage() {
        let parsed: OpenAiResponse = serde_json::from_str(
            r#"{"model":"qwen-plus-latest","choices":[{"message":{"role":"assistant","content":"chat"}}],"usage":{"prompt_tokens":12,"completion_tokens":1}}"#,
        )
        .unwrap();
        let reply = OpenAiCompatProvider::into_chat_response(parsed, "qwen-plus".to_string()).unwrap();
        assert_eq!(reply.content, "chat");
        assert_eq!(reply.model, "qwen-plus-latest");
        assert_eq!(reply.tokens_in, Some(12));
        assert_eq!(reply.tokens_out, Some(1));
    }
}
