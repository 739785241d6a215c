use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use super::models::{OpenAiStreamChunk, OpenAiUsage};
use crate::providers::types::StreamEvent;

/// Forwards an OpenAI-style SSE body to `tx` as `StreamEvent`s.
///
/// Returns once the upstream sends `[DONE]`, the body ends, a transport
/// error occurs, or the receiver is dropped.
pub async fn parse_sse_stream<S, E>(stream: S, tx: mpsc::Sender<StreamEvent>)
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut byte_buf: Vec<u8> = Vec::new();
    let mut buffer = String::new();
    let mut usage: Option<OpenAiUsage> = None;

    while let Some(chunk_result) = stream.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error(format!("Stream error: {}", e)))
                    .await;
                return;
            }
        };

        byte_buf.extend_from_slice(&bytes);

        // Keep an incomplete trailing UTF-8 sequence for the next chunk
        let valid_up_to = match std::str::from_utf8(&byte_buf) {
            Ok(_) => byte_buf.len(),
            Err(e) if e.error_len().is_some() => {
                tracing::warn!(offset = e.valid_up_to(), "invalid UTF-8 in provider stream");
                let _ = tx
                    .send(StreamEvent::Error("invalid UTF-8 in stream".to_string()))
                    .await;
                return;
            }
            Err(e) => e.valid_up_to(),
        };
        if valid_up_to == 0 {
            continue;
        }
        let decoded = String::from_utf8_lossy(&byte_buf[..valid_up_to]).into_owned();
        byte_buf.drain(..valid_up_to);

        buffer.push_str(&decoded.replace("\r\n", "\n"));

        while let Some(event_end) = buffer.find("\n\n") {
            let event_text = buffer[..event_end].to_string();
            buffer.drain(..event_end + 2);

            for line in event_text.lines() {
                let payload = if let Some(p) = line.strip_prefix("data: ") {
                    p
                } else if let Some(p) = line.strip_prefix("data:") {
                    p
                } else {
                    continue;
                };

                if payload.trim() == "[DONE]" {
                    send_done(&tx, usage).await;
                    return;
                }

                match serde_json::from_str::<OpenAiStreamChunk>(payload) {
                    Ok(chunk) => {
                        if chunk.usage.is_some() {
                            usage = chunk.usage;
                        }
                        let content = chunk
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.delta.content);
                        if let Some(content) = content {
                            if !content.is_empty()
                                && tx.send(StreamEvent::Token(content)).await.is_err()
                            {
                                return; // receiver dropped
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse OpenAI SSE data: {}", e);
                    }
                }
            }
        }
    }

    // Upstream closed without [DONE]
    send_done(&tx, usage).await;
}

async fn send_done(tx: &mpsc::Sender<StreamEvent>, usage: Option<OpenAiUsage>) {
    let (tokens_in, tokens_out) = usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((None, None));
    let _ = tx
        .send(StreamEvent::Done {
            tokens_in,
            tokens_out,
        })
        .await;
}
