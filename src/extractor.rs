use std::str::FromStr;

use log::{debug, info};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::document::{Document, Node, Selector};
use crate::listing::{is_realistic_price, Condition, ListingCandidate, ListingError, MIN_TITLE_CHARS};

/// Ordered keyword buckets for condition inference. Checked New, VeryGood,
/// Good; anything else is Satisfactory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConditionKeywords {
    pub new: Vec<String>,
    pub very_good: Vec<String>,
    pub good: Vec<String>,
}

impl Default for ConditionKeywords {
    fn default() -> Self {
        let words = |list: &[&str]| -> Vec<String> { list.iter().map(|w| w.to_string()).collect() };
        ConditionKeywords {
            new: words(&["novo", "nova", "com etiqueta", "new", "selado"]),
            very_good: words(&["muito bom", "excelente", "como novo", "pouco usado"]),
            good: words(&["bom", "usado", "utilizado", "em bom estado"]),
        }
    }
}

impl ConditionKeywords {
    pub fn classify(&self, text: &str) -> Condition {
        let lower = text.to_lowercase();
        let hit = |bucket: &[String]| bucket.iter().any(|w| lower.contains(&w.to_lowercase()));

        if hit(self.new.as_slice()) {
            Condition::New
        } else if hit(self.very_good.as_slice()) {
            Condition::VeryGood
        } else if hit(self.good.as_slice()) {
            Condition::Good
        } else {
            Condition::Satisfactory
        }
    }
}

/// Where to look for each field inside a page.
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    pub card: Selector,
    pub title: Vec<Selector>,
    pub price: Vec<Selector>,
    pub location: Vec<Selector>,
    pub link: Selector,
    pub base_url: String,
    pub default_location: String,
}

impl ExtractionRules {
    pub fn marketplace(base_url: &str, default_location: &str) -> Self {
        ExtractionRules {
            card: Selector::tags(&["div", "article"])
                .and(Selector::class_contains_any(&["item", "card", "product", "new-item", "feed-grid"])),
            title: vec![
                Selector::tag("h3"),
                Selector::tag("h4"),
                Selector::tag("h5"),
                Selector::attr_contains("data-testid", "title"),
                Selector::class_contains_any(&["title", "name", "description"]),
            ],
            price: vec![
                Selector::attr_contains("data-testid", "price"),
                Selector::class_contains_any(&["price", "amount", "value"]),
                Selector::tag("span").and(Selector::attr_contains("class", "€")),
            ],
            location: vec![
                Selector::attr_contains("data-testid", "location"),
                Selector::class_contains_any(&["location"]),
            ],
            link: Selector::tag("a").and(Selector::has_attr("href")),
            base_url: base_url.trim_end_matches('/').to_string(),
            default_location: default_location.to_string(),
        }
    }
}

/// Why a single card did not become a listing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("no title text")]
    MissingTitle,
    #[error("title '{0}' too short")]
    ShortTitle(String),
    #[error("no price found")]
    MissingPrice,
    #[error("price {0} outside the realistic range")]
    UnrealisticPrice(Decimal),
    #[error("rejected by validation: {0}")]
    Invalid(#[from] ListingError),
}

pub struct ListingExtractor {
    rules: ExtractionRules,
    keywords: ConditionKeywords,
    price_patterns: Vec<Regex>,
    first_amount: Regex,
    non_numeric: Regex,
}

impl ListingExtractor {
    pub fn new(rules: ExtractionRules, keywords: ConditionKeywords) -> Self {
        // Captured amounts allow thousands groups: 1.234,56 / 1,234.56 / 19,99
        let amount = r"(\d+(?:[.,]\d{3})*[.,]\d{2})";
        ListingExtractor {
            rules,
            keywords,
            price_patterns: vec![
                // 19,99 €
                Regex::new(&format!(r"{amount}\s*[€$£]")).unwrap(),
                // €19.99
                Regex::new(&format!(r"[€$£]\s*{amount}")).unwrap(),
                // Price: 19.99
                Regex::new(&format!(r"(?i)(?:price|preço|prix|preis)\s*:\s*[€$£]?\s*{amount}")).unwrap(),
            ],
            // 1 234,56 before the plain form, so space-grouped thousands stay whole
            first_amount: Regex::new(r"\d{1,3}(?:[ \u{a0}]\d{3})+(?:[.,]\d{1,2})?|\d[\d.,]*").unwrap(),
            non_numeric: Regex::new(r"[^\d.]").unwrap(),
        }
    }

    /// Extracts every card that yields a valid listing. Broken cards are
    /// skipped without affecting their siblings.
    pub fn extract(&self, document: &Document) -> Vec<ListingCandidate> {
        let cards = document.find_all(&self.rules.card);
        let mut listings = Vec::new();

        for (idx, card) in cards.iter().enumerate() {
            match self.extract_card(card) {
                Ok(listing) => listings.push(listing),
                Err(reason) => debug!("Skipping card #{}: {}", idx, reason),
            }
        }

        info!("Extracted {} listings from {} product cards", listings.len(), cards.len());
        listings
    }

    pub fn extract_card(&self, card: &Node) -> Result<ListingCandidate, SkipReason> {
        let title = self.extract_title(card)?;
        let price = self.extract_price(card).ok_or(SkipReason::MissingPrice)?;
        if !is_realistic_price(price) {
            return Err(SkipReason::UnrealisticPrice(price));
        }

        let condition = self.keywords.classify(&format!("{} {}", title, card.inline_text()));
        let location = self.extract_location(card);
        let link = self.extract_link(card);

        Ok(ListingCandidate::new(&title, price, condition, location, link)?)
    }

    fn extract_title(&self, card: &Node) -> Result<String, SkipReason> {
        for selector in &self.rules.title {
            if let Some(node) = card.find(selector) {
                let text = node.inline_text();
                if text.chars().count() >= MIN_TITLE_CHARS {
                    return Ok(text);
                }
            }
        }

        // Fallback: first line of the whole card
        let text = card.text();
        let first_line = text.lines().map(str::trim).find(|l| !l.is_empty());
        match first_line {
            Some(line) if line.chars().count() >= MIN_TITLE_CHARS => Ok(line.to_string()),
            Some(line) => Err(SkipReason::ShortTitle(line.to_string())),
            None => Err(SkipReason::MissingTitle),
        }
    }

    fn extract_price(&self, card: &Node) -> Option<Decimal> {
        for selector in &self.rules.price {
            if let Some(node) = card.find(selector) {
                // Only the first amount: a node may also carry the fee-inclusive price.
                let text = node.inline_text();
                let amount = self.first_amount.find(&text).map(|m| m.as_str());
                if let Some(price) = amount.and_then(|a| self.normalize_price(a)) {
                    if price > Decimal::ZERO {
                        return Some(price);
                    }
                }
            }
        }

        let text = card.inline_text();
        for pattern in &self.price_patterns {
            if let Some(cap) = pattern.captures(&text).and_then(|c| c.get(1)) {
                if let Some(price) = self.normalize_price(cap.as_str()) {
                    if price > Decimal::ZERO {
                        return Some(price);
                    }
                }
            }
        }
        None
    }

    /// Turns a loosely formatted amount into a number. Commas become points
    /// and only the last point is kept as the decimal separator.
    pub fn normalize_price(&self, raw: &str) -> Option<Decimal> {
        let unified = raw.replace(',', ".");
        let digits = self.non_numeric.replace_all(&unified, "");

        let parts: Vec<&str> = digits.split('.').collect();
        let clean = if parts.len() > 2 {
            let (fraction, whole) = parts.split_last()?;
            format!("{}.{}", whole.concat(), fraction)
        } else {
            digits.to_string()
        };

        let clean = clean.trim_matches('.');
        if clean.is_empty() {
            return None;
        }
        Decimal::from_str(clean).ok()
    }

    fn extract_location(&self, card: &Node) -> String {
        card.select_first(&self.rules.location)
            .map(|node| node.inline_text())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| self.rules.default_location.clone())
    }

    fn extract_link(&self, card: &Node) -> String {
        let root = format!("{}/", self.rules.base_url);
        let href = match card.find(&self.rules.link).and_then(|a| a.attr("href")) {
            Some(href) if !href.trim().is_empty() => href.trim(),
            _ => return root,
        };

        if href.starts_with('/') {
            match Url::parse(&root).and_then(|base| base.join(href)) {
                Ok(joined) => joined.to_string(),
                Err(_) => format!("{}{}", self.rules.base_url, href),
            }
        } else {
            href.to_string()
        }
    }
}
