pub mod openai;
pub mod router;
#[cfg(test)]
pub mod testing;
pub mod traits;
pub mod types;

pub use router::ProviderRouter;
pub use types::{ChatMessage, ChatRequest, ProviderError, StreamEvent};
