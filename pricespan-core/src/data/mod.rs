//! Market data: provider traits, HTTP providers, fetch policy

pub mod circuit_breaker;
pub mod directory;
pub mod eastmoney;
pub mod fetcher;
pub mod http;
pub mod provider;
pub mod sina;

pub use circuit_breaker::CircuitBreaker;
pub use directory::FallbackDirectory;
pub use eastmoney::EastmoneyClient;
pub use fetcher::{FetchFailure, FetchOutcome, RetryPolicy, SeriesFetcher};
pub use http::HttpSettings;
pub use provider::{DataError, DirectorySource, HistoryProvider};
pub use sina::SinaDirectory;
