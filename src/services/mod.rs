pub mod assistant;
pub mod intent;
pub mod price_analysis;
pub mod prompt;
pub mod stream;

pub use assistant::Assistant;
pub use intent::Intent;
pub use stream::{stream_answer, Frame};
