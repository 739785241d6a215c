//! Turns a routed answer into a sequence of SSE frames.
//!
//! Non-chat intents are answered locally and sent as one `Delta` plus `Done`
//! so clients see the same wire shape for every intent. Chat answers are
//! forwarded fragment by fragment as the provider produces them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::Instrument;

use crate::providers::StreamEvent;
use crate::services::assistant::Assistant;
use crate::services::intent::Intent;

pub const DONE_SENTINEL: &str = "[DONE]";

const FRAME_BUFFER: usize = 32;
const UPSTREAM_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Delta(String),
    /// Terminal. Nothing follows an error frame.
    Error(String),
    Done,
}

impl Frame {
    /// The `data:` value of the SSE event.
    pub fn payload(&self) -> String {
        match self {
            Frame::Delta(text) => serde_json::json!({ "delta": text }).to_string(),
            Frame::Error(message) => serde_json::json!({ "error": message }).to_string(),
            Frame::Done => DONE_SENTINEL.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Frame::Delta(_))
    }
}

/// Spawns the pipeline for one request and returns its frames in order.
///
/// Classification always finishes before a chat stream is opened. Dropping
/// the receiver stops forwarding. The spawned tasks inherit the caller's span.
pub fn stream_answer(
    assistant: Arc<Assistant>,
    question: String,
    identity: Option<String>,
) -> mpsc::Receiver<Frame> {
    let (tx, rx) = mpsc::channel(FRAME_BUFFER);
    tokio::spawn(run_pipeline(assistant, question, identity, tx).in_current_span());
    rx
}

async fn run_pipeline(
    assistant: Arc<Assistant>,
    question: String,
    identity: Option<String>,
    tx: mpsc::Sender<Frame>,
) {
    let state = match assistant.classify(&question, identity).await {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(error = %e, "classification failed during stream");
            let _ = tx.send(Frame::Error(e.to_string())).await;
            return;
        }
    };

    if state.intent == Intent::GeneralChat {
        forward_chat(assistant, question, tx).await;
        return;
    }

    match assistant.respond(state).await {
        Ok(state) => {
            if tx.send(Frame::Delta(state.answer)).await.is_ok() {
                let _ = tx.send(Frame::Done).await;
            }
        }
        Err(e) => {
            let _ = tx.send(Frame::Error(e.to_string())).await;
        }
    }
}

async fn forward_chat(assistant: Arc<Assistant>, question: String, tx: mpsc::Sender<Frame>) {
    let (events_tx, mut events_rx) = mpsc::channel::<StreamEvent>(UPSTREAM_BUFFER);

    tokio::spawn(
        async move {
            if let Err(e) = assistant.stream_chat(&question, events_tx.clone()).await {
                let _ = events_tx.send(StreamEvent::Error(e.to_string())).await;
            }
        }
        .in_current_span(),
    );

    let mut forwarded = 0usize;
    loop {
        let frame = match events_rx.recv().await {
            Some(StreamEvent::Token(text)) => {
                if text.is_empty() {
                    continue;
                }
                forwarded += 1;
                Frame::Delta(text)
            }
            Some(StreamEvent::Done {
                tokens_in,
                tokens_out,
            }) => {
                tracing::debug!(fragments = forwarded, ?tokens_in, ?tokens_out, "chat stream complete");
                Frame::Done
            }
            Some(StreamEvent::Error(message)) => {
                tracing::warn!(fragments = forwarded, error = %message, "chat stream failed");
                Frame::Error(message)
            }
            None if forwarded > 0 => Frame::Done,
            None => Frame::Error("Stream ended unexpectedly".to_string()),
        };

        let terminal = frame.is_terminal();
        if tx.send(frame).await.is_err() || terminal {
            // Dropping events_rx stops the upstream reader
            return;
        }
    }
}
