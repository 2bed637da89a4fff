use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log::{info, warn};
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::delay_manager;

const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/118.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("blocked at {url} (status {status})")]
    Blocked { url: String, status: u16 },
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
}

/// Supplies raw pages for a search query. Everything about transport,
/// retries and pacing lives behind this trait.
pub trait DocumentFetcher {
    /// `page` is 1-based.
    fn fetch_page(&self, query: &str, page: usize) -> Result<String, FetchError>;

    fn probe(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Extra attempts after the first failed request.
    pub max_retries: u32,
    pub delay_between_requests_secs: u64,
    pub pages_per_query: usize,
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            timeout_secs: 15,
            max_retries: 3,
            delay_between_requests_secs: 1,
            pages_per_query: 2,
            accept_language: "pt-PT,pt;q=0.8,en;q=0.5,en-US;q=0.3".to_string(),
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    base_url: String,
    search_path: String,
    config: FetchConfig,
    requests_made: AtomicUsize,
}

impl HttpFetcher {
    pub fn new(base_url: &str, search_path: &str, config: FetchConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        let language = HeaderValue::from_str(&config.accept_language)
            .unwrap_or_else(|_| HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(ACCEPT_LANGUAGE, language);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(HttpFetcher {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            search_path: search_path.to_string(),
            config,
            requests_made: AtomicUsize::new(0),
        })
    }

    pub fn search_url(&self, query: &str, page: usize) -> String {
        let mut url = format!(
            "{}{}{}",
            self.base_url,
            self.search_path,
            urlencoding::encode(query.trim())
        );
        if page > 1 {
            url.push_str(&format!("&page={}", page));
        }
        url
    }

    fn total_attempts(&self) -> u32 {
        self.config.max_retries.saturating_add(1)
    }

    fn random_user_agent(&self) -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
    }

    fn get(&self, url: &str) -> Result<String, FetchError> {
        if self.requests_made.fetch_add(1, Ordering::SeqCst) > 0 {
            delay_manager::pause_between_requests(self.config.delay_between_requests_secs);
        }

        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, self.random_user_agent())
            .send()
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::Blocked {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })
    }
}

impl DocumentFetcher for HttpFetcher {
    fn fetch_page(&self, query: &str, page: usize) -> Result<String, FetchError> {
        let url = self.search_url(query, page);
        let attempts = self.total_attempts();
        let mut attempt = 1;

        loop {
            info!("Visiting: {}", url);
            match self.get(&url) {
                Ok(body) => return Ok(body),
                // Retrying a block only makes it worse.
                Err(e @ FetchError::Blocked { .. }) => {
                    warn!("{}", e);
                    return Err(e);
                }
                Err(e) if attempt < attempts => {
                    warn!("Attempt {}/{} failed: {}", attempt, attempts, e);
                    delay_manager::retry_backoff(self.config.delay_between_requests_secs, attempt);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn probe(&self) -> bool {
        match self.client.head(&self.base_url).header(USER_AGENT, self.random_user_agent()).send() {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(e) => {
                warn!("Availability check for {} failed: {}", self.base_url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_search_urls() {
        let fetcher = HttpFetcher::new("https://www.vinted.pt/", "/catalog?search_text=", FetchConfig::default()).unwrap();
        assert_eq!(
            fetcher.search_url(" teclado apex pro ", 1),
            "https://www.vinted.pt/catalog?search_text=teclado%20apex%20pro"
        );
        assert_eq!(
            fetcher.search_url("botas", 2),
            "https://www.vinted.pt/catalog?search_text=botas&page=2"
        );
    }

    #[test]
    fn fetch_config_fills_missing_fields() {
        let config: FetchConfig = serde_json::from_str(r#"{"max_retries": 5}"#).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.pages_per_query, 2);
    }

    #[test]
    fn retries_come_on_top_of_the_first_attempt() {
        let fetcher = HttpFetcher::new("https://www.vinted.pt", "/catalog?search_text=", FetchConfig::default()).unwrap();
        assert_eq!(fetcher.total_attempts(), 4);

        let no_retries = FetchConfig {
            max_retries: 0,
            ..FetchConfig::default()
        };
        let fetcher = HttpFetcher::new("https://www.vinted.pt", "/catalog?search_text=", no_retries).unwrap();
        assert_eq!(fetcher.total_attempts(), 1);
    }
}
