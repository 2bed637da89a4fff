use log::{error, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::listing::{Condition, ListingCandidate};
use crate::pricing::{PriceRecommendation, PriceRecommendationEngine, PricingError};
use crate::source::DataSourceBackend;

/// Prices gathered for one analysis. Only grows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceSamplePool {
    samples: Vec<Decimal>,
}

impl PriceSamplePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend_from_listings(&mut self, listings: &[ListingCandidate]) -> Vec<Decimal> {
        let prices: Vec<Decimal> = listings.iter().map(ListingCandidate::price).collect();
        self.samples.extend_from_slice(&prices);
        prices
    }

    pub fn as_slice(&self) -> &[Decimal] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn into_inner(self) -> Vec<Decimal> {
        self.samples
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SourceStatus {
    Contributed,
    Unavailable,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub status: SourceStatus,
    pub prices: Vec<Decimal>,
    pub listings: Vec<ListingCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketAnalysis {
    pub query: String,
    pub condition: Condition,
    pub recommendation: PriceRecommendation,
    pub samples: Vec<Decimal>,
    pub sources: Vec<SourceReport>,
}

/// Asks each backend in turn, pools their prices and prices the pool once.
pub struct MarketAggregator {
    sources: Vec<Box<dyn DataSourceBackend>>,
    engine: PriceRecommendationEngine,
}

impl MarketAggregator {
    pub fn new(sources: Vec<Box<dyn DataSourceBackend>>, engine: PriceRecommendationEngine) -> Self {
        MarketAggregator { sources, engine }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn analyze(&self, query: &str, condition: Condition) -> Result<MarketAnalysis, PricingError> {
        info!("Analyzing: {} ({})", query, condition);
        let mut pool = PriceSamplePool::new();
        let mut reports = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let name = source.name().to_string();

            if !source.is_available() {
                warn!("{}: unavailable, skipping", name);
                reports.push(SourceReport {
                    name,
                    status: SourceStatus::Unavailable,
                    prices: Vec::new(),
                    listings: Vec::new(),
                });
                continue;
            }

            match source.search(query, condition) {
                Ok(listings) => {
                    let prices = pool.extend_from_listings(&listings);
                    info!("{}: {} prices", name, prices.len());
                    reports.push(SourceReport {
                        name,
                        status: SourceStatus::Contributed,
                        prices,
                        listings,
                    });
                }
                Err(e) => {
                    error!("{}: search failed: {}", name, e);
                    reports.push(SourceReport {
                        name,
                        status: SourceStatus::Failed(e.to_string()),
                        prices: Vec::new(),
                        listings: Vec::new(),
                    });
                }
            }
        }

        info!("Pooled {} prices from {} sources", pool.len(), reports.len());
        let recommendation = self.engine.calculate_price(condition, pool.as_slice())?;

        Ok(MarketAnalysis {
            query: query.to_string(),
            condition,
            recommendation,
            samples: pool.into_inner(),
            sources: reports,
        })
    }
}
