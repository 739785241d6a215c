//! Routes a classified question to exactly one answer handler.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::{AppConfig, ProviderConfig};
use crate::models::ProviderId;
use crate::providers::{ChatMessage, ChatRequest, ProviderError, ProviderRouter, StreamEvent};
use crate::services::intent::{Intent, IntentClassifier};

pub const LOGIN_REQUIRED_ANSWER: &str = "我暂时不知道你的身份，请先登录。";

pub const PRICE_ANALYSIS_PENDING_ANSWER: &str = "这里将接入房价预测与分析逻辑（下一步实现）。";

pub const CAPABILITY_ANSWER: &str = "\
这是一个完整的全栈房价预测与分析系统，技术栈包括：

React + FastAPI + MySQL + SQLAlchemy + Alembic + Machine Learning + AI Agent。

系统主要包含以下模块：
- 后端 RESTful API：房源信息的增删改查（CRUD）、用户系统、传统机器学习房价预测
- 独立 AI 服务：使用 Kimi / Qwen / DeepSeek 对房价结果进行智能分析与问答
- 前端多页面应用：房价预测、房源管理、个人信息、数据可视化大屏
- 数据层：MySQL 持久化存储，Alembic 管理数据库迁移

你可以直接向我提问，例如：
- 这个系统能做什么？
- 房价预测是怎么计算的？
- AI 分析和传统预测有什么区别？";

/// Per-request pipeline state. Never shared between requests.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterState {
    pub question: String,
    pub identity: Option<String>,
    pub intent: Intent,
    pub answer: String,
}

/// Provider used for unconstrained chat answers.
#[derive(Debug, Clone)]
pub struct ChatTarget {
    pub provider: ProviderId,
    pub config: ProviderConfig,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ChatTarget {
    fn request(&self, question: &str) -> ChatRequest {
        let mut request = self
            .config
            .request(vec![ChatMessage::user(question)], self.temperature);
        request.max_tokens = self.max_tokens;
        request
    }
}

pub struct Assistant {
    router: Arc<ProviderRouter>,
    classifier: IntentClassifier,
    chat: ChatTarget,
}

impl Assistant {
    pub fn new(router: Arc<ProviderRouter>, classifier: IntentClassifier, chat: ChatTarget) -> Self {
        Self {
            router,
            classifier,
            chat,
        }
    }

    pub fn from_config(router: Arc<ProviderRouter>, config: &AppConfig) -> Self {
        let classifier_provider = config.assistant.classifier_provider;
        let chat_provider = config.assistant.chat_provider;

        let classifier = IntentClassifier::new(
            router.clone(),
            classifier_provider,
            config.providers.get(classifier_provider).clone(),
        );
        let chat = ChatTarget {
            provider: chat_provider,
            config: config.providers.get(chat_provider).clone(),
            temperature: Some(config.assistant.chat_temperature),
            max_tokens: config.assistant.chat_max_tokens,
        };
        Self::new(router, classifier, chat)
    }

    /// Classify the question into a fresh state with an empty answer.
    pub async fn classify(
        &self,
        question: &str,
        identity: Option<String>,
    ) -> Result<RouterState, ProviderError> {
        let intent = self.classifier.classify(question).await?;
        tracing::info!(intent = %intent, "question classified");
        Ok(RouterState {
            question: question.to_string(),
            identity,
            intent,
            answer: String::new(),
        })
    }

    /// Run the single handler for `state.intent`.
    pub async fn respond(&self, mut state: RouterState) -> Result<RouterState, ProviderError> {
        state.answer = match state.intent {
            Intent::IdentityQuery => identity_answer(state.identity.as_deref()),
            Intent::CapabilityQuery => CAPABILITY_ANSWER.to_string(),
            Intent::PriceQuery => PRICE_ANALYSIS_PENDING_ANSWER.to_string(),
            Intent::GeneralChat => self.chat_answer(&state.question).await?,
        };
        Ok(state)
    }

    /// Entry point for the synchronous path: classify, then answer.
    pub async fn answer(
        &self,
        question: &str,
        identity: Option<String>,
    ) -> Result<RouterState, ProviderError> {
        let state = self.classify(question, identity).await?;
        self.respond(state).await
    }

    async fn chat_answer(&self, question: &str) -> Result<String, ProviderError> {
        let response = self
            .router
            .send_message(&self.chat.provider, self.chat.request(question))
            .await?;
        Ok(response.content)
    }

    /// Open a streaming chat completion for `question` on the chat provider.
    pub async fn stream_chat(
        &self,
        question: &str,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        self.router
            .stream_message(&self.chat.provider, self.chat.request(question), tx)
            .await
    }
}

fn identity_answer(identity: Option<&str>) -> String {
    match identity {
        Some(name) if !name.is_empty() => format!("你当前登录的账户名是：{name}"),
        _ => LOGIN_REQUIRED_ANSWER.to_string(),
    }
}
