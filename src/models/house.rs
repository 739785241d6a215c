use serde::{Deserialize, Serialize};

use super::ProviderId;

/// Structured listing features fed into the price commentary prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseFeatures {
    pub area_sqm: f64,
    pub bedrooms: u32,
    pub age_years: u32,
    pub distance_to_metro_km: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceAnalysisRequest {
    pub provider: ProviderId,
    pub features: HouseFeatures,
    /// Computed by the regression backend and passed through by the frontend.
    pub predicted_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceAnalysisResponse {
    pub provider: ProviderId,
    pub predicted_price: f64,
    pub analysis_markdown: String,
}
