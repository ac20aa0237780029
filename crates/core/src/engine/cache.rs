//! Ranking cache: TTL-bounded memoization of ranked result lists, with
//! per-key single-flight so concurrent misses run the pipeline once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;

use crate::domain::price::TreatmentType;
use crate::domain::recommendation::RankedClinic;

/// Deterministic serialization of everything that shapes a ranking:
/// district, treatment, limit, and the engine config fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(
        district: &str,
        treatment: Option<TreatmentType>,
        limit: u32,
        config_fingerprint: &str,
    ) -> Self {
        let treatment = treatment.map_or("-", |t| t.as_str());
        Self(format!(
            "recommend:{}:{treatment}:{limit}:{config_fingerprint}",
            district.trim().to_lowercase()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct CacheEntry {
    inserted_at: Instant,
    value: Arc<Vec<RankedClinic>>,
}

/// Process-wide ranking cache. Entries are replaced atomically under the
/// map lock; readers see the old list or the new one, never a partial
/// write. The flight registry hands out one per-key mutex, so at most one
/// computation runs per key at a time.
pub struct RankingCache {
    ttl: Duration,
    entries: StdMutex<HashMap<CacheKey, CacheEntry>>,
    flights: AsyncMutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
}

impl RankingCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: StdMutex::new(HashMap::new()), flights: AsyncMutex::new(HashMap::new()) }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<RankedClinic>>> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(Arc::clone(&entry.value)),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: CacheKey, value: Vec<RankedClinic>) {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        entries.insert(key, CacheEntry { inserted_at: Instant::now(), value: Arc::new(value) });
    }

    /// The single-flight slot for a key. Callers lock the returned mutex,
    /// re-check the cache, and only then compute. Drop the returned handle
    /// and call [`finish_flight`](Self::finish_flight) once done.
    pub async fn flight(&self, key: &CacheKey) -> Arc<AsyncMutex<()>> {
        let mut flights = self.flights.lock().await;
        Arc::clone(flights.entry(key.clone()).or_default())
    }

    /// Drop a key's flight slot once no caller holds it any more. Without
    /// this the registry would grow by one mutex per distinct key for the
    /// lifetime of the process.
    pub async fn finish_flight(&self, key: &CacheKey) {
        let mut flights = self.flights.lock().await;
        if let Some(slot) = flights.get(key) {
            // strong_count 1 means the registry holds the only reference.
            if Arc::strong_count(slot) == 1 {
                flights.remove(key);
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    #[cfg(test)]
    pub async fn flight_count(&self) -> usize {
        self.flights.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::domain::clinic::ClinicId;

    use super::*;

    fn ranked(clinic_id: i64) -> RankedClinic {
        RankedClinic {
            clinic_id: ClinicId(clinic_id),
            clinic_name: format!("치과 {clinic_id}"),
            clinic_address: String::new(),
            clinic_phone: String::new(),
            district: "강남구".to_owned(),
            composite_score: 80.0,
            price_competitiveness: 80.0,
            medical_skill: 80.0,
            overtreatment_risk: 20.0,
            patient_satisfaction: 80.0,
            review_count: 12,
            distance_km: None,
            has_parking: false,
            night_service: false,
            weekend_service: false,
            explanation: String::new(),
        }
    }

    #[test]
    fn key_serialization_is_deterministic_and_config_sensitive() {
        let a = CacheKey::new("강남구", Some(TreatmentType::Scaling), 10, "v1.0|min10");
        let b = CacheKey::new(" 강남구 ", Some(TreatmentType::Scaling), 10, "v1.0|min10");
        assert_eq!(a, b);

        let other_config = CacheKey::new("강남구", Some(TreatmentType::Scaling), 10, "v1.1|min10");
        assert_ne!(a, other_config);

        let no_treatment = CacheKey::new("강남구", None, 10, "v1.0|min10");
        assert_ne!(a, no_treatment);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = RankingCache::new(Duration::from_millis(20));
        let key = CacheKey::new("강남구", None, 10, "v1.0");
        cache.put(key.clone(), vec![ranked(1)]);
        assert!(cache.get(&key).is_some());

        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn put_replaces_whole_value() {
        let cache = RankingCache::new(Duration::from_secs(60));
        let key = CacheKey::new("강남구", None, 10, "v1.0");
        cache.put(key.clone(), vec![ranked(1), ranked(2)]);
        cache.put(key.clone(), vec![ranked(3)]);

        let value = cache.get(&key).expect("hit");
        assert_eq!(value.len(), 1);
        assert_eq!(value[0].clinic_id, ClinicId(3));
    }

    #[tokio::test]
    async fn single_flight_collapses_concurrent_misses() {
        let cache = Arc::new(RankingCache::new(Duration::from_secs(60)));
        let computations = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::new("강남구", None, 10, "v1.0");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let computations = Arc::clone(&computations);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                if cache.get(&key).is_some() {
                    return;
                }
                let flight = cache.flight(&key).await;
                let _guard = flight.lock().await;
                if cache.get(&key).is_some() {
                    return;
                }
                computations.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                cache.put(key.clone(), vec![ranked(1)]);
            }));
        }
        for handle in handles {
            handle.await.expect("join");
        }

        assert_eq!(computations.load(Ordering::SeqCst), 1);
        assert!(cache.get(&key).is_some());
    }

    #[tokio::test]
    async fn finished_flights_are_pruned_from_the_registry() {
        let cache = RankingCache::new(Duration::from_secs(60));
        let key = CacheKey::new("강남구", None, 10, "v1.0");

        let flight = cache.flight(&key).await;
        {
            let _guard = flight.lock().await;
        }
        assert_eq!(cache.flight_count().await, 1);

        // Another holder keeps the slot alive.
        let second = cache.flight(&key).await;
        drop(flight);
        cache.finish_flight(&key).await;
        assert_eq!(cache.flight_count().await, 1);

        drop(second);
        cache.finish_flight(&key).await;
        assert_eq!(cache.flight_count().await, 0);
    }
}
