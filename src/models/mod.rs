pub mod house;
pub mod message;
pub mod provider;

pub use house::{HouseFeatures, PriceAnalysisRequest, PriceAnalysisResponse};
pub use message::Role;
pub use provider::ProviderId;
