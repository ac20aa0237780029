//! Regional price index: per-(district, treatment) statistics over verified,
//! non-outlier price observations, memoized in memory for one hour and
//! backed by stored `RegionalPriceStats` rows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::price::{RegionalPriceStats, TreatmentType};
use crate::store::{PriceStore, StoreError};

/// Statistics need at least this many observations to be usable.
pub const MIN_SAMPLE_COUNT: u32 = 5;

/// Presentation-layer classification of a single price against the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceLevel {
    Low,
    Average,
    High,
}

/// Quartile cutoffs: below q1 is low, above q3 is high.
pub fn classify_price(amount: i64, stats: &RegionalPriceStats) -> PriceLevel {
    let amount = amount as f64;
    if amount < stats.q1_price {
        PriceLevel::Low
    } else if amount > stats.q3_price {
        PriceLevel::High
    } else {
        PriceLevel::Average
    }
}

/// Quantile by standard linear interpolation on a sorted slice.
fn quantile(sorted: &[i64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let position = p * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        return sorted[lower] as f64;
    }
    let fraction = position - lower as f64;
    sorted[lower] as f64 + fraction * (sorted[upper] - sorted[lower]) as f64
}

/// Compute the full statistics row from raw prices. Returns `None` below
/// the sample floor.
pub fn compute_stats(
    district: &str,
    treatment: TreatmentType,
    mut prices: Vec<i64>,
    now: DateTime<Utc>,
) -> Option<RegionalPriceStats> {
    if (prices.len() as u32) < MIN_SAMPLE_COUNT {
        return None;
    }
    prices.sort_unstable();

    let n = prices.len() as f64;
    let mean = prices.iter().map(|&p| p as f64).sum::<f64>() / n;
    let variance = prices.iter().map(|&p| (p as f64 - mean).powi(2)).sum::<f64>() / n;

    Some(RegionalPriceStats {
        district: district.to_owned(),
        treatment_type: treatment,
        min_price: prices[0],
        q1_price: quantile(&prices, 0.25),
        median_price: quantile(&prices, 0.5),
        q3_price: quantile(&prices, 0.75),
        max_price: prices[prices.len() - 1],
        mean_price: mean,
        std_dev: variance.sqrt(),
        sample_count: prices.len() as u32,
        last_updated: now,
    })
}

struct CachedStats {
    computed_at: Instant,
    // None is cached too: insufficient data is an answer, not an error.
    stats: Option<RegionalPriceStats>,
}

/// In-memory read-through index over the price store.
pub struct RegionalPriceIndex {
    prices: Arc<dyn PriceStore>,
    ttl: Duration,
    cache: Mutex<HashMap<(String, TreatmentType), CachedStats>>,
}

impl RegionalPriceIndex {
    pub fn new(prices: Arc<dyn PriceStore>) -> Self {
        Self::with_ttl(prices, Duration::from_secs(3600))
    }

    pub fn with_ttl(prices: Arc<dyn PriceStore>, ttl: Duration) -> Self {
        Self { prices, ttl, cache: Mutex::new(HashMap::new()) }
    }

    /// `Ok(None)` means insufficient data; the caller degrades to a neutral
    /// score rather than failing.
    pub async fn get(
        &self,
        district: &str,
        treatment: TreatmentType,
    ) -> Result<Option<RegionalPriceStats>, StoreError> {
        let key = (district.trim().to_lowercase(), treatment);

        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(&key) {
                if entry.computed_at.elapsed() < self.ttl {
                    return Ok(entry.stats.clone());
                }
            }
        }

        let stats = self.refresh(district, treatment).await?;

        let mut cache = self.cache.lock().await;
        cache.insert(key, CachedStats { computed_at: Instant::now(), stats: stats.clone() });
        Ok(stats)
    }

    async fn refresh(
        &self,
        district: &str,
        treatment: TreatmentType,
    ) -> Result<Option<RegionalPriceStats>, StoreError> {
        // A stored row from another worker's refresh is good for the TTL.
        if let Some(stored) = self.prices.find_regional_stats(district, treatment).await? {
            let age = Utc::now() - stored.last_updated;
            if age < chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::hours(1))
                && stored.sample_count >= MIN_SAMPLE_COUNT
            {
                return Ok(Some(stored));
            }
        }

        let prices = self.prices.indexable_prices_in_district(district, treatment).await?;
        let stats = compute_stats(district, treatment, prices, Utc::now());

        if let Some(ref stats) = stats {
            self.prices.upsert_regional_stats(stats).await?;
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quartiles_use_linear_interpolation() {
        let prices = vec![10, 20, 30, 40, 50];
        let stats =
            compute_stats("강남구", TreatmentType::Scaling, prices, Utc::now()).expect("stats");
        assert_eq!(stats.min_price, 10);
        assert_eq!(stats.max_price, 50);
        assert!((stats.q1_price - 20.0).abs() < 1e-9);
        assert!((stats.median_price - 30.0).abs() < 1e-9);
        assert!((stats.q3_price - 40.0).abs() < 1e-9);
        assert!((stats.mean_price - 30.0).abs() < 1e-9);
        assert_eq!(stats.sample_count, 5);
    }

    #[test]
    fn even_sample_interpolates_between_neighbors() {
        let prices = vec![10, 20, 30, 40, 50, 60];
        let stats =
            compute_stats("강남구", TreatmentType::Implant, prices, Utc::now()).expect("stats");
        // position 0.25 * 5 = 1.25 -> 20 + 0.25 * 10
        assert!((stats.q1_price - 22.5).abs() < 1e-9);
        assert!((stats.median_price - 35.0).abs() < 1e-9);
        assert!((stats.q3_price - 47.5).abs() < 1e-9);
    }

    #[test]
    fn below_sample_floor_is_insufficient_data() {
        assert!(compute_stats("강남구", TreatmentType::Implant, vec![1, 2, 3, 4], Utc::now())
            .is_none());
    }

    #[test]
    fn std_dev_is_population_deviation() {
        let stats =
            compute_stats("강남구", TreatmentType::Scaling, vec![2, 4, 4, 4, 5, 5, 7, 9], Utc::now())
                .expect("stats");
        assert!((stats.std_dev - 2.0).abs() < 1e-9);
    }

    #[test]
    fn classification_uses_quartile_cutoffs() {
        let stats =
            compute_stats("강남구", TreatmentType::Scaling, vec![10, 20, 30, 40, 50], Utc::now())
                .expect("stats");
        assert_eq!(classify_price(15, &stats), PriceLevel::Low);
        assert_eq!(classify_price(20, &stats), PriceLevel::Average);
        assert_eq!(classify_price(30, &stats), PriceLevel::Average);
        assert_eq!(classify_price(40, &stats), PriceLevel::Average);
        assert_eq!(classify_price(45, &stats), PriceLevel::High);
    }
}
