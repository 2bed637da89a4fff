use std::fmt;

use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Titles are cut to this many characters before validation.
pub const MAX_TITLE_CHARS: usize = 100;
pub const MIN_TITLE_CHARS: usize = 3;

/// Prices at or below one currency unit are placeholders, not offers.
pub const MIN_REALISTIC_PRICE: Decimal = Decimal::ONE;
/// Anything above this is a typo or a troll listing.
pub const MAX_REALISTIC_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

pub fn is_realistic_price(price: Decimal) -> bool {
    price > MIN_REALISTIC_PRICE && price <= MAX_REALISTIC_PRICE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    New,
    VeryGood,
    #[default]
    Good,
    Satisfactory,
}

impl Condition {
    pub const ALL: [Condition; 4] = [
        Condition::New,
        Condition::VeryGood,
        Condition::Good,
        Condition::Satisfactory,
    ];

    /// Accepts the canonical labels plus the Portuguese ones used by the
    /// marketplace listings.
    pub fn from_label(label: &str) -> Option<Condition> {
        let normalized = label.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "new" | "novo" | "1" => Some(Condition::New),
            "very good" | "verygood" | "muito bom" | "2" => Some(Condition::VeryGood),
            "good" | "bom" | "3" => Some(Condition::Good),
            "satisfactory" | "fair" | "razoável" | "razoavel" | "4" => Some(Condition::Satisfactory),
            _ => None,
        }
    }

    /// Unknown labels resolve to `Good`, whose base price and multiplier are
    /// the neutral defaults.
    pub fn from_label_or_default(label: &str) -> Condition {
        Condition::from_label(label).unwrap_or_else(|| {
            warn!("Unrecognized condition '{}', using '{}'", label, Condition::default());
            Condition::default()
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::VeryGood => "very good",
            Condition::Good => "good",
            Condition::Satisfactory => "satisfactory",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ListingError {
    #[error("listing title is empty")]
    EmptyTitle,
    #[error("listing title '{0}' is shorter than 3 characters")]
    TitleTooShort(String),
    #[error("listing price {0} is outside 1.00 - 1000000")]
    UnrealisticPrice(Decimal),
}

/// One validated marketplace offer. Only obtainable through [`ListingCandidate::new`],
/// so every instance has a usable title and a realistic price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingCandidate {
    title: String,
    price: Decimal,
    condition: Condition,
    location: String,
    source_link: String,
    relevance_score: f64,
}

impl ListingCandidate {
    pub fn new(
        title: &str,
        price: Decimal,
        condition: Condition,
        location: impl Into<String>,
        source_link: impl Into<String>,
    ) -> Result<Self, ListingError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(ListingError::EmptyTitle);
        }
        let title: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
        let title = title.trim_end().to_string();
        if title.chars().count() < MIN_TITLE_CHARS {
            return Err(ListingError::TitleTooShort(title));
        }
        if !is_realistic_price(price) {
            return Err(ListingError::UnrealisticPrice(price));
        }

        Ok(ListingCandidate {
            title,
            price,
            condition,
            location: location.into(),
            source_link: source_link.into(),
            relevance_score: 0.0,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn source_link(&self) -> &str {
        &self.source_link
    }

    pub fn relevance_score(&self) -> f64 {
        self.relevance_score
    }

    pub(crate) fn set_relevance(&mut self, score: f64) {
        self.relevance_score = score.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_english_and_portuguese_labels() {
        assert_eq!(Condition::from_label("very_good"), Some(Condition::VeryGood));
        assert_eq!(Condition::from_label("Muito Bom"), Some(Condition::VeryGood));
        assert_eq!(Condition::from_label("novo"), Some(Condition::New));
        assert_eq!(Condition::from_label("razoável"), Some(Condition::Satisfactory));
        assert_eq!(Condition::from_label("mint"), None);
    }

    #[test]
    fn unknown_label_defaults_to_good() {
        assert_eq!(Condition::from_label_or_default("whatever"), Condition::Good);
    }

    #[test]
    fn rejects_placeholder_prices() {
        let err = ListingCandidate::new("Keyboard", Decimal::ONE, Condition::Good, "", "").unwrap_err();
        assert_eq!(err, ListingError::UnrealisticPrice(Decimal::ONE));
        assert!(ListingCandidate::new("Keyboard", Decimal::new(101, 2), Condition::Good, "", "").is_ok());
    }

    #[test]
    fn rejects_absurdly_high_prices() {
        let huge = Decimal::from_i128_with_scale(60_000_000_000_000_000_000_000_000_000, 0);
        assert_eq!(
            ListingCandidate::new("Keyboard", huge, Condition::Good, "", "").unwrap_err(),
            ListingError::UnrealisticPrice(huge)
        );
        assert!(ListingCandidate::new("Keyboard", MAX_REALISTIC_PRICE, Condition::Good, "", "").is_ok());
    }

    #[test]
    fn rejects_short_or_empty_titles() {
        assert_eq!(
            ListingCandidate::new("   ", Decimal::TEN, Condition::Good, "", "").unwrap_err(),
            ListingError::EmptyTitle
        );
        assert!(matches!(
            ListingCandidate::new(" ab ", Decimal::TEN, Condition::Good, "", ""),
            Err(ListingError::TitleTooShort(_))
        ));
    }

    #[test]
    fn trims_and_truncates_title() {
        let long = format!("  {}  ", "x".repeat(150));
        let listing = ListingCandidate::new(&long, Decimal::TEN, Condition::New, "Lisboa", "https://a/b").unwrap();
        assert_eq!(listing.title().chars().count(), MAX_TITLE_CHARS);
        assert_eq!(listing.relevance_score(), 0.0);
        assert_eq!(listing.location(), "Lisboa");
    }
}
