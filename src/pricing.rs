use log::{info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::listing::Condition;

const FALLBACK_LOW: Decimal = Decimal::from_parts(7, 0, 0, false, 1);
const FALLBACK_HIGH: Decimal = Decimal::from_parts(13, 0, 0, false, 1);
const FALLBACK_CONFIDENCE: f64 = 0.3;

const MARKET_LOW: Decimal = Decimal::from_parts(7, 0, 0, false, 1);
const MARKET_HIGH: Decimal = Decimal::from_parts(14, 0, 0, false, 1);

const IQR_FENCE: Decimal = Decimal::from_parts(15, 0, 0, false, 1);
const MIN_SAMPLES_FOR_OUTLIERS: usize = 4;

const CONFIDENCE_CAP: f64 = 0.95;
const FULL_CONFIDENCE_SAMPLES: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionTable<T> {
    pub new: T,
    pub very_good: T,
    pub good: T,
    pub satisfactory: T,
}

impl<T: Copy> ConditionTable<T> {
    pub fn get(&self, condition: Condition) -> T {
        match condition {
            Condition::New => self.new,
            Condition::VeryGood => self.very_good,
            Condition::Good => self.good,
            Condition::Satisfactory => self.satisfactory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingTables {
    /// Used when there is no market data at all.
    pub base_prices: ConditionTable<Decimal>,
    /// Applied to the market median.
    pub multipliers: ConditionTable<Decimal>,
}

impl Default for PricingTables {
    fn default() -> Self {
        PricingTables {
            base_prices: ConditionTable {
                new: Decimal::new(25, 0),
                very_good: Decimal::new(20, 0),
                good: Decimal::new(15, 0),
                satisfactory: Decimal::new(10, 0),
            },
            multipliers: ConditionTable {
                new: Decimal::new(130, 2),
                very_good: Decimal::new(110, 2),
                good: Decimal::ONE,
                satisfactory: Decimal::new(70, 2),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRecommendation {
    pub suggested: Decimal,
    pub minimum: Decimal,
    pub maximum: Decimal,
    pub confidence: f64,
    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    #[error("price sample {0} is negative")]
    NegativeSample(Decimal),
    #[error("{condition} adjustment of median {median} overflows")]
    Overflow { median: Decimal, condition: Condition },
}

#[derive(Debug, Clone, Default)]
pub struct PriceRecommendationEngine {
    tables: PricingTables,
}

impl PriceRecommendationEngine {
    pub fn new(tables: PricingTables) -> Self {
        PriceRecommendationEngine { tables }
    }

    pub fn calculate_price(
        &self,
        condition: Condition,
        samples: &[Decimal],
    ) -> Result<PriceRecommendation, PricingError> {
        if let Some(bad) = samples.iter().find(|p| **p < Decimal::ZERO) {
            return Err(PricingError::NegativeSample(*bad));
        }

        if samples.is_empty() {
            info!("No market prices, using base price for '{}'", condition);
            return Ok(self.fallback(condition));
        }

        let clean = remove_outliers(samples);
        info!("Outlier removal kept {} of {} prices", clean.len(), samples.len());
        if clean.is_empty() {
            warn!("Every price was an outlier, using base price for '{}'", condition);
            return Ok(self.fallback(condition));
        }

        let median_price = median(&clean);
        let suggested = median_price
            .checked_mul(self.tables.multipliers.get(condition))
            .ok_or(PricingError::Overflow {
                median: median_price,
                condition,
            })?;

        let observed_min = clean.iter().copied().min().unwrap_or(median_price);
        let observed_max = clean.iter().copied().max().unwrap_or(median_price);

        // Market bounds win unless they would cross the suggestion. A ceiling
        // past Decimal::MAX leaves the observed maximum in charge.
        let floor = suggested.checked_mul(MARKET_LOW).unwrap_or(suggested);
        let ceiling = suggested.checked_mul(MARKET_HIGH).unwrap_or(Decimal::MAX);
        let minimum = observed_min.max(floor).min(suggested);
        let maximum = observed_max.min(ceiling).max(suggested);

        let confidence = (clean.len() as f64 / FULL_CONFIDENCE_SAMPLES).min(CONFIDENCE_CAP);

        Ok(PriceRecommendation {
            suggested: suggested.round_dp(2),
            minimum: minimum.round_dp(2),
            maximum: maximum.round_dp(2),
            confidence,
            reasoning: vec![
                format!("Based on {} market prices", clean.len()),
                format!("Market median: {:.2}", median_price),
                format!("Observed range: {:.2} - {:.2}", observed_min, observed_max),
                format!("Adjusted for condition: {}", condition),
                "Suggested margin: -30% to +40% for negotiation".to_string(),
            ],
        })
    }

    fn fallback(&self, condition: Condition) -> PriceRecommendation {
        let base = self.tables.base_prices.get(condition);
        PriceRecommendation {
            suggested: base.round_dp(2),
            minimum: base.checked_mul(FALLBACK_LOW).unwrap_or(base).round_dp(2),
            maximum: base.checked_mul(FALLBACK_HIGH).unwrap_or(Decimal::MAX).round_dp(2),
            confidence: FALLBACK_CONFIDENCE,
            reasoning: vec![
                "Market data unavailable".to_string(),
                format!("Base price for condition: {}", condition),
            ],
        }
    }
}

/// Interquartile-range filter using index quartiles on the sorted prices
/// (`n/4` and `3n/4`). Fewer than four prices pass through untouched.
/// Output keeps the input order.
pub fn remove_outliers(prices: &[Decimal]) -> Vec<Decimal> {
    if prices.len() < MIN_SAMPLES_FOR_OUTLIERS {
        return prices.to_vec();
    }

    let mut sorted = prices.to_vec();
    sorted.sort();
    let n = sorted.len();
    let q1 = sorted[n / 4];
    let q3 = sorted[3 * n / 4];
    // Fences that fall outside the Decimal range admit everything on that side.
    let reach = q3.checked_sub(q1).and_then(|iqr| iqr.checked_mul(IQR_FENCE));
    let lower = reach.and_then(|r| q1.checked_sub(r)).unwrap_or(Decimal::MIN);
    let upper = reach.and_then(|r| q3.checked_add(r)).unwrap_or(Decimal::MAX);

    prices.iter().copied().filter(|p| *p >= lower && *p <= upper).collect()
}

pub fn median(prices: &[Decimal]) -> Decimal {
    let mut sorted = prices.to_vec();
    sorted.sort();
    let n = sorted.len();
    match n {
        0 => Decimal::ZERO,
        _ if n % 2 == 1 => sorted[n / 2],
        _ => {
            let (low, high) = (sorted[n / 2 - 1], sorted[n / 2]);
            match low.checked_add(high) {
                Some(sum) => sum / Decimal::TWO,
                // Same-sign extremes: the gap cannot overflow when the sum does.
                None => low + (high - low) / Decimal::TWO,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(values: &[i64]) -> Vec<Decimal> {
        values.iter().map(|v| Decimal::new(*v, 0)).collect()
    }

    fn engine() -> PriceRecommendationEngine {
        PriceRecommendationEngine::default()
    }

    #[test]
    fn good_condition_with_one_outlier() {
        let rec = engine()
            .calculate_price(Condition::Good, &prices(&[10, 12, 11, 13, 100]))
            .unwrap();
        assert_eq!(rec.suggested, Decimal::new(1150, 2));
        assert_eq!(rec.minimum, Decimal::new(10, 0));
        assert_eq!(rec.maximum, Decimal::new(13, 0));
        assert!((rec.confidence - 4.0 / 15.0).abs() < 1e-9);
        assert_eq!(rec.reasoning.len(), 5);
        assert_eq!(rec.reasoning[0], "Based on 4 market prices");
        assert_eq!(rec.reasoning[1], "Market median: 11.50");
        assert_eq!(rec.reasoning[2], "Observed range: 10.00 - 13.00");
        assert_eq!(rec.reasoning[3], "Adjusted for condition: good");
    }

    #[test]
    fn empty_pool_uses_base_price() {
        let rec = engine().calculate_price(Condition::New, &[]).unwrap();
        assert_eq!(rec.suggested, Decimal::new(25, 0));
        assert_eq!(rec.minimum, Decimal::new(175, 1));
        assert_eq!(rec.maximum, Decimal::new(325, 1));
        assert_eq!(rec.confidence, 0.3);
        assert!(rec.reasoning[0].contains("unavailable"));
    }

    #[test]
    fn unknown_condition_label_prices_like_good() {
        let condition = Condition::from_label_or_default("pristine");
        let fallback = engine().calculate_price(condition, &[]).unwrap();
        assert_eq!(fallback.suggested, Decimal::new(15, 0));

        let market = engine().calculate_price(condition, &prices(&[20, 22])).unwrap();
        assert_eq!(market.suggested, Decimal::new(21, 0));
    }

    #[test]
    fn negative_sample_is_a_contract_violation() {
        let err = engine()
            .calculate_price(Condition::Good, &[Decimal::new(10, 0), Decimal::new(-5, 0)])
            .unwrap_err();
        assert_eq!(err, PricingError::NegativeSample(Decimal::new(-5, 0)));
    }

    #[test]
    fn small_pools_skip_outlier_removal() {
        let pool = prices(&[1, 50, 1000]);
        assert_eq!(remove_outliers(&pool), pool);
        assert_eq!(remove_outliers(&remove_outliers(&pool)), pool);
    }

    #[test]
    fn identical_prices_survive_cleaning() {
        let pool = prices(&[20, 20, 20, 20, 20]);
        assert_eq!(remove_outliers(&pool), pool);
    }

    #[test]
    fn outlier_removal_keeps_input_order() {
        let pool = prices(&[13, 500, 10, 12, 11]);
        assert_eq!(remove_outliers(&pool), prices(&[13, 10, 12, 11]));
    }

    #[test]
    fn median_of_even_and_odd_pools() {
        assert_eq!(median(&prices(&[3, 1, 2])), Decimal::new(2, 0));
        assert_eq!(median(&prices(&[4, 1, 3, 2])), Decimal::new(25, 1));
    }

    #[test]
    fn bounds_never_cross_suggestion() {
        let pools: [&[i64]; 5] = [
            &[10, 10, 10, 10],
            &[5],
            &[40, 42, 41, 300, 39, 38],
            &[2, 3, 50, 51, 52, 90],
            &[100, 101],
        ];
        for pool in pools {
            for condition in Condition::ALL {
                let rec = engine().calculate_price(condition, &prices(pool)).unwrap();
                assert!(rec.minimum <= rec.suggested, "{:?} {:?} {:?}", pool, condition, rec);
                assert!(rec.suggested <= rec.maximum, "{:?} {:?} {:?}", pool, condition, rec);
            }
        }
    }

    #[test]
    fn tight_market_is_clamped_to_suggestion() {
        // New lifts the suggestion above every observed price.
        let rec = engine().calculate_price(Condition::New, &prices(&[10, 10, 10, 10])).unwrap();
        assert_eq!(rec.suggested, Decimal::new(13, 0));
        assert_eq!(rec.maximum, Decimal::new(13, 0));
        assert_eq!(rec.minimum, Decimal::new(10, 0));
    }

    #[test]
    fn huge_sample_widens_fences_instead_of_panicking() {
        let huge = Decimal::from_i128_with_scale(60_000_000_000_000_000_000_000_000_000, 0);
        let pool = vec![Decimal::new(10, 0), Decimal::new(10, 0), Decimal::new(11, 0), huge];
        assert_eq!(remove_outliers(&pool), pool);

        for condition in Condition::ALL {
            let rec = engine().calculate_price(condition, &pool).unwrap();
            assert!(rec.minimum <= rec.suggested && rec.suggested <= rec.maximum);
        }
        let good = engine().calculate_price(Condition::Good, &pool).unwrap();
        assert_eq!(good.suggested, Decimal::new(105, 1));
    }

    #[test]
    fn median_of_extremes_does_not_overflow() {
        assert_eq!(median(&[Decimal::MAX, Decimal::MAX]), Decimal::MAX);
    }

    #[test]
    fn overflowing_adjustment_is_an_error() {
        let pool = [Decimal::MAX, Decimal::MAX];
        assert_eq!(
            engine().calculate_price(Condition::New, &pool).unwrap_err(),
            PricingError::Overflow {
                median: Decimal::MAX,
                condition: Condition::New,
            }
        );

        let rec = engine().calculate_price(Condition::Good, &pool).unwrap();
        assert_eq!(rec.suggested, Decimal::MAX);
        assert_eq!(rec.maximum, Decimal::MAX);
    }

    #[test]
    fn confidence_grows_with_samples_and_caps() {
        let mut last = 0.0;
        for n in 1..=30 {
            let pool = vec![Decimal::new(20, 0); n];
            let rec = engine().calculate_price(Condition::Good, &pool).unwrap();
            assert!(rec.confidence >= last);
            assert!(rec.confidence <= 0.95);
            last = rec.confidence;
        }
        assert_eq!(last, 0.95);
    }
}
