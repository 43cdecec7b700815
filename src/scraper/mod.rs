// Request layer: rate limiting, retry/backoff, proxy rotation.

pub mod client;
pub mod traits;

pub use client::{Backoff, RateLimitedClient, RateLimiter};
pub use traits::PageFetcher;
