use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extractor::ConditionKeywords;
use crate::fetcher::FetchConfig;
use crate::pricing::PricingTables;
use crate::relevance::RelevanceConfig;
use crate::source::MarketplaceConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Every knob of the pipeline. Missing sections and fields take their
/// defaults, so `{}` is a complete config.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub marketplace: MarketplaceConfig,
    pub relevance: RelevanceConfig,
    pub condition_keywords: ConditionKeywords,
    pub pricing: PricingTables,
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`AppConfig::from_path`] but never fails: problems are logged and
    /// the defaults are used instead.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("No config file given. Using defaults.");
            return AppConfig::default();
        };

        match Self::from_path(path) {
            Ok(config) => {
                info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                error!("{}. Using defaults.", e);
                AppConfig::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::Condition;
    use rust_decimal::Decimal;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(AppConfig::from_json_str("{}").unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_json_str(
            r#"{
                "relevance": { "admission_threshold": 0.5, "synonyms": { "saia": ["skirt"] } },
                "pricing": { "multipliers": { "new": "1.5", "very_good": "1.2", "good": "1", "satisfactory": "0.5" } },
                "marketplace": { "filter_by_condition": true }
            }"#,
        )
        .unwrap();

        assert_eq!(config.relevance.admission_threshold, 0.5);
        assert_eq!(config.relevance.max_results, 10);
        assert_eq!(config.relevance.synonyms.equivalents("saia"), ["skirt".to_string()]);
        assert_eq!(config.pricing.multipliers.get(Condition::New), Decimal::new(15, 1));
        assert_eq!(config.pricing.base_prices.get(Condition::New), Decimal::new(25, 0));
        assert!(config.marketplace.filter_by_condition);
        assert_eq!(config.marketplace.base_url, "https://www.vinted.pt");
        assert_eq!(config.fetch, FetchConfig::default());
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("pricing-config-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(AppConfig::from_path(&path), Err(ConfigError::Parse { .. })));
        assert_eq!(AppConfig::load(Some(&path)), AppConfig::default());

        fs::remove_file(&path).unwrap();
        assert!(matches!(AppConfig::from_path(&path), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn missing_path_uses_defaults() {
        assert_eq!(AppConfig::load(None), AppConfig::default());
    }
}
