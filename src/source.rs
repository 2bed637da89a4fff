use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;
use crate::document::Document;
use crate::extractor::{ExtractionRules, ListingExtractor};
use crate::fetcher::{DocumentFetcher, FetchError, HttpFetcher};
use crate::listing::{Condition, ListingCandidate};
use crate::relevance::RelevanceFilter;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{source_name}: {error}")]
    Fetch {
        source_name: String,
        #[source]
        error: FetchError,
    },
}

/// One marketplace the aggregator can ask for listings.
pub trait DataSourceBackend {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    fn search(&self, query: &str, condition: Condition) -> Result<Vec<ListingCandidate>, SourceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub name: String,
    pub base_url: String,
    pub search_path: String,
    pub default_location: String,
    /// Keep only listings whose inferred condition equals the requested one.
    pub filter_by_condition: bool,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        MarketplaceConfig {
            name: "Vinted".to_string(),
            base_url: "https://www.vinted.pt".to_string(),
            search_path: "/catalog?search_text=".to_string(),
            default_location: "Portugal".to_string(),
            filter_by_condition: false,
        }
    }
}

/// Backend for a catalog-style marketplace: fetch result pages, pull
/// listings out of each, then rank them against the query.
pub struct MarketplaceSource<F: DocumentFetcher> {
    name: String,
    fetcher: F,
    extractor: ListingExtractor,
    filter: RelevanceFilter,
    pages: usize,
    filter_by_condition: bool,
}

impl MarketplaceSource<HttpFetcher> {
    pub fn vinted(config: &AppConfig) -> Result<Self, SourceError> {
        let market = &config.marketplace;
        let fetcher = HttpFetcher::new(&market.base_url, &market.search_path, config.fetch.clone()).map_err(
            |error| SourceError::Fetch {
                source_name: market.name.clone(),
                error,
            },
        )?;
        Ok(MarketplaceSource::with_fetcher(config, fetcher))
    }
}

impl<F: DocumentFetcher> MarketplaceSource<F> {
    pub fn with_fetcher(config: &AppConfig, fetcher: F) -> Self {
        let market = &config.marketplace;
        MarketplaceSource {
            name: market.name.clone(),
            fetcher,
            extractor: ListingExtractor::new(
                ExtractionRules::marketplace(&market.base_url, &market.default_location),
                config.condition_keywords.clone(),
            ),
            filter: RelevanceFilter::new(config.relevance.clone()),
            pages: config.fetch.pages_per_query.max(1),
            filter_by_condition: market.filter_by_condition,
        }
    }
}

impl<F: DocumentFetcher> DataSourceBackend for MarketplaceSource<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.fetcher.probe()
    }

    fn search(&self, query: &str, condition: Condition) -> Result<Vec<ListingCandidate>, SourceError> {
        info!("Searching {} for '{}'", self.name, query);
        let mut candidates = Vec::new();

        for page in 1..=self.pages {
            let html = match self.fetcher.fetch_page(query, page) {
                Ok(html) => html,
                Err(error) if page == 1 => {
                    return Err(SourceError::Fetch {
                        source_name: self.name.clone(),
                        error,
                    })
                }
                Err(e) => {
                    // Keep what earlier pages gave us.
                    warn!("{}: page {} failed, stopping: {}", self.name, page, e);
                    break;
                }
            };

            let document = Document::parse_html(&html);
            let found = self.extractor.extract(&document);
            if found.is_empty() {
                info!("{}: page {} had no listings", self.name, page);
                break;
            }
            candidates.extend(found);
        }

        if self.filter_by_condition {
            let before = candidates.len();
            candidates.retain(|c| c.condition() == condition);
            info!("{}: {} of {} listings match condition '{}'", self.name, candidates.len(), before, condition);
        }

        let total = candidates.len();
        let relevant = self.filter.filter(query, candidates);
        info!("{}: {} relevant listings out of {}", self.name, relevant.len(), total);
        Ok(relevant)
    }
}
