use crate::model::NetworkError;

/// Seam between the pagination controller and the network. The production
/// implementation is [`crate::scraper::RateLimitedClient`]; tests substitute
/// a scripted fetcher.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<String, NetworkError>;
}
