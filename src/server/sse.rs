//! Adapts the frame channel to an axum SSE response.
//!
//! Each frame becomes one event with only a `data` field:
//! ```text
//! data: {"delta":"partial text"}
//!
//! data: [DONE]
//!
//! ```

use std::convert::Infallible;

use axum::response::sse::{Event, Sse};
use futures::stream::{self, Stream};
use tokio::sync::mpsc;

use crate::services::Frame;

pub fn frames_to_sse(
    rx: mpsc::Receiver<Frame>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = stream::unfold(rx, |mut rx| async move {
        let frame = rx.recv().await?;
        Some((Ok(Event::default().data(frame.payload())), rx))
    });
    Sse::new(events)
}
