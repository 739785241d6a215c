use crate::config::ProvidersConfig;
use crate::models::{PriceAnalysisRequest, PriceAnalysisResponse};
use crate::providers::{ChatMessage, ProviderError, ProviderRouter};
use crate::services::prompt::{build_price_analysis_prompt, PRICE_ANALYSIS_SYSTEM_PROMPT};

/// Ask the requested provider for Markdown commentary on a predicted price.
pub async fn analyze_price(
    router: &ProviderRouter,
    providers: &ProvidersConfig,
    request: &PriceAnalysisRequest,
) -> Result<PriceAnalysisResponse, ProviderError> {
    let messages = vec![
        ChatMessage::system(PRICE_ANALYSIS_SYSTEM_PROMPT),
        ChatMessage::user(build_price_analysis_prompt(
            &request.features,
            request.predicted_price,
        )),
    ];
    let chat_request = providers.get(request.provider).request(messages, None);

    let response = router.send_message(&request.provider, chat_request).await?;
    tracing::info!(
        provider = %request.provider,
        tokens_out = ?response.tokens_out,
        "price analysis generated"
    );

    Ok(PriceAnalysisResponse {
        provider: request.provider,
        predicted_price: request.predicted_price,
        analysis_markdown: response.content.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HouseFeatures, ProviderId, Role};
    use crate::providers::testing::ScriptedProvider;

    fn request(provider: ProviderId) -> PriceAnalysisRequest {
        PriceAnalysisRequest {
            provider,
            features: HouseFeatures {
                area_sqm: 120.0,
                bedrooms: 3,
                age_years: 5,
                distance_to_metro_km: 1.2,
            },
            predicted_price: 4_200_000.0,
        }
    }

    #[tokio::test]
    async fn test_uses_requested_provider_with_system_prompt() {
        let kimi = ScriptedProvider::new(ProviderId::Kimi).reply("\n## 1. 价格总体评价\n大致合理\n\n");
        let deepseek = ScriptedProvider::new(ProviderId::Deepseek);
        let mut router = ProviderRouter::new();
        router.register(kimi.clone());
        router.register(deepseek.clone());

        let response = analyze_price(&router, &ProvidersConfig::default(), &request(ProviderId::Kimi))
            .await
            .unwrap();

        assert_eq!(response.provider, ProviderId::Kimi);
        assert_eq!(response.predicted_price, 4_200_000.0);
        assert_eq!(response.analysis_markdown, "## 1. 价格总体评价\n大致合理");
        assert_eq!(deepseek.calls(), 0);

        let sent = &kimi.requests()[0];
        assert_eq!(sent.model, "moonshot-v1-8k");
        assert_eq!(sent.messages[0].role, Role::System);
        assert_eq!(sent.messages[1].role, Role::User);
        assert!(sent.messages[1].content.contains("4,200,000 元"));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let qwen = ScriptedProvider::new(ProviderId::Qwen).fail("502 upstream");
        let mut router = ProviderRouter::new();
        router.register(qwen);

        let err = analyze_price(&router, &ProvidersConfig::default(), &request(ProviderId::Qwen))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NetworkError(_)));
    }
}
