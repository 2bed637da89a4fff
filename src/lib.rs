pub mod aggregator;
pub mod config;
pub mod delay_manager;
pub mod document;
pub mod extractor;
pub mod fetcher;
pub mod input_loader;
pub mod listing;
pub mod logger;
pub mod pricing;
pub mod relevance;
pub mod source;

// Exporting types for convenience
pub use aggregator::{MarketAggregator, MarketAnalysis, SourceReport, SourceStatus};
pub use config::AppConfig;
pub use document::{Document, Node, Selector};
pub use extractor::ListingExtractor;
pub use fetcher::{DocumentFetcher, HttpFetcher};
pub use listing::{Condition, ListingCandidate};
pub use pricing::{PriceRecommendation, PriceRecommendationEngine};
pub use relevance::RelevanceFilter;
pub use source::{DataSourceBackend, MarketplaceSource};
