use std::collections::HashSet;

use sqlx::Row;

use denty_core::domain::clinic::ClinicId;
use denty_core::domain::price::{PriceObservation, RegionalPriceStats, TreatmentType};
use denty_core::store::{PriceStore, StoreError};

use super::{db_err, decode_err, in_placeholders, parse_timestamp, parse_treatment};
use crate::DbPool;

pub struct SqlPriceStore {
    pool: DbPool,
}

impl SqlPriceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_observation(row: &sqlx::sqlite::SqliteRow) -> Result<PriceObservation, StoreError> {
    let treatment: String = row.try_get("treatment_type").map_err(decode_err)?;
    Ok(PriceObservation {
        clinic_id: ClinicId(row.try_get("clinic_id").map_err(decode_err)?),
        treatment_type: parse_treatment(&treatment)?,
        amount: row.try_get("amount").map_err(decode_err)?,
        extraction_confidence: row.try_get("extraction_confidence").map_err(decode_err)?,
        is_verified: row.try_get("is_verified").map_err(decode_err)?,
        is_outlier: row.try_get("is_outlier").map_err(decode_err)?,
    })
}

fn row_to_stats(row: &sqlx::sqlite::SqliteRow) -> Result<RegionalPriceStats, StoreError> {
    let treatment: String = row.try_get("treatment_type").map_err(decode_err)?;
    let last_updated: String = row.try_get("last_updated").map_err(decode_err)?;
    let sample_count: i64 = row.try_get("sample_count").map_err(decode_err)?;
    Ok(RegionalPriceStats {
        district: row.try_get("district").map_err(decode_err)?,
        treatment_type: parse_treatment(&treatment)?,
        min_price: row.try_get("min_price").map_err(decode_err)?,
        q1_price: row.try_get("q1_price").map_err(decode_err)?,
        median_price: row.try_get("median_price").map_err(decode_err)?,
        q3_price: row.try_get("q3_price").map_err(decode_err)?,
        max_price: row.try_get("max_price").map_err(decode_err)?,
        mean_price: row.try_get("mean_price").map_err(decode_err)?,
        std_dev: row.try_get("std_dev").map_err(decode_err)?,
        sample_count: sample_count.max(0) as u32,
        last_updated: parse_timestamp(&last_updated)?,
    })
}

#[async_trait::async_trait]
impl PriceStore for SqlPriceStore {
    async fn observations_for_clinic(
        &self,
        clinic_id: ClinicId,
        treatment: Option<TreatmentType>,
    ) -> Result<Vec<PriceObservation>, StoreError> {
        let rows = match treatment {
            Some(treatment) => {
                sqlx::query(
                    "SELECT clinic_id, treatment_type, amount, extraction_confidence,
                            is_verified, is_outlier
                     FROM price_observation
                     WHERE clinic_id = ? AND treatment_type = ?",
                )
                .bind(clinic_id.0)
                .bind(treatment.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT clinic_id, treatment_type, amount, extraction_confidence,
                            is_verified, is_outlier
                     FROM price_observation
                     WHERE clinic_id = ?",
                )
                .bind(clinic_id.0)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db_err)?;

        rows.iter().map(row_to_observation).collect()
    }

    async fn indexable_prices_in_district(
        &self,
        district: &str,
        treatment: TreatmentType,
    ) -> Result<Vec<i64>, StoreError> {
        let rows = sqlx::query(
            "SELECT p.amount
             FROM price_observation p
             JOIN clinic c ON c.id = p.clinic_id
             WHERE LOWER(c.district) LIKE '%' || LOWER(?) || '%'
               AND p.treatment_type = ?
               AND p.is_verified = 1 AND p.is_outlier = 0",
        )
        .bind(district.trim())
        .bind(treatment.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(|row| row.try_get("amount").map_err(decode_err)).collect()
    }

    async fn clinics_with_price_data(
        &self,
        clinic_ids: &[ClinicId],
        treatment: TreatmentType,
    ) -> Result<HashSet<ClinicId>, StoreError> {
        if clinic_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let sql = format!(
            "SELECT DISTINCT clinic_id
             FROM price_observation
             WHERE treatment_type = ? AND clinic_id IN ({})",
            in_placeholders(clinic_ids.len()),
        );
        let mut query = sqlx::query(&sql).bind(treatment.as_str());
        for id in clinic_ids {
            query = query.bind(id.0);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        rows.iter()
            .map(|row| row.try_get("clinic_id").map(ClinicId).map_err(decode_err))
            .collect()
    }

    async fn price_data_points(&self, clinic_id: ClinicId) -> Result<u32, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM price_observation WHERE clinic_id = ?")
            .bind(clinic_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let count: i64 = row.try_get("count").map_err(decode_err)?;
        Ok(count.max(0) as u32)
    }

    async fn find_regional_stats(
        &self,
        district: &str,
        treatment: TreatmentType,
    ) -> Result<Option<RegionalPriceStats>, StoreError> {
        let row = sqlx::query(
            "SELECT district, treatment_type, min_price, q1_price, median_price, q3_price,
                    max_price, mean_price, std_dev, sample_count, last_updated
             FROM regional_price_stats
             WHERE district = ? AND treatment_type = ?",
        )
        .bind(district.trim())
        .bind(treatment.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_stats).transpose()
    }

    async fn upsert_regional_stats(&self, stats: &RegionalPriceStats) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO regional_price_stats
                (district, treatment_type, min_price, q1_price, median_price, q3_price,
                 max_price, mean_price, std_dev, sample_count, last_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(district, treatment_type) DO UPDATE SET
                min_price = excluded.min_price,
                q1_price = excluded.q1_price,
                median_price = excluded.median_price,
                q3_price = excluded.q3_price,
                max_price = excluded.max_price,
                mean_price = excluded.mean_price,
                std_dev = excluded.std_dev,
                sample_count = excluded.sample_count,
                last_updated = excluded.last_updated",
        )
        .bind(&stats.district)
        .bind(stats.treatment_type.as_str())
        .bind(stats.min_price)
        .bind(stats.q1_price)
        .bind(stats.median_price)
        .bind(stats.q3_price)
        .bind(stats.max_price)
        .bind(stats.mean_price)
        .bind(stats.std_dev)
        .bind(stats.sample_count)
        .bind(stats.last_updated.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use denty_core::domain::clinic::ClinicId;
    use denty_core::domain::price::{RegionalPriceStats, TreatmentType};
    use denty_core::store::PriceStore;

    use super::SqlPriceStore;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_clinic(pool: &sqlx::SqlitePool, district: &str) -> i64 {
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO clinic (name, district, created_at, updated_at) VALUES ('A', ?, ?, ?)")
            .bind(district)
            .bind(&now)
            .bind(&now)
            .execute(pool)
            .await
            .expect("insert clinic")
            .last_insert_rowid()
    }

    async fn insert_price(
        pool: &sqlx::SqlitePool,
        clinic_id: i64,
        treatment: TreatmentType,
        amount: i64,
        verified: bool,
        outlier: bool,
    ) {
        sqlx::query(
            "INSERT INTO price_observation
                (clinic_id, treatment_type, amount, is_verified, is_outlier, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(clinic_id)
        .bind(treatment.as_str())
        .bind(amount)
        .bind(verified)
        .bind(outlier)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .expect("insert price");
    }

    #[tokio::test]
    async fn indexable_prices_exclude_unverified_and_outliers() {
        let pool = setup().await;
        let clinic_id = insert_clinic(&pool, "강남구").await;
        insert_price(&pool, clinic_id, TreatmentType::Implant, 1_200_000, true, false).await;
        insert_price(&pool, clinic_id, TreatmentType::Implant, 900_000, false, false).await;
        insert_price(&pool, clinic_id, TreatmentType::Implant, 9_000_000, true, true).await;
        insert_price(&pool, clinic_id, TreatmentType::Scaling, 50_000, true, false).await;
        let store = SqlPriceStore::new(pool);

        let prices =
            store.indexable_prices_in_district("강남구", TreatmentType::Implant).await.expect("prices");
        assert_eq!(prices, vec![1_200_000]);
    }

    #[tokio::test]
    async fn clinics_with_price_data_filters_by_treatment() {
        let pool = setup().await;
        let with_price = insert_clinic(&pool, "강남구").await;
        let without = insert_clinic(&pool, "강남구").await;
        insert_price(&pool, with_price, TreatmentType::Implant, 1_000_000, false, false).await;
        let store = SqlPriceStore::new(pool);

        let ids = store
            .clinics_with_price_data(
                &[ClinicId(with_price), ClinicId(without)],
                TreatmentType::Implant,
            )
            .await
            .expect("ids");
        assert!(ids.contains(&ClinicId(with_price)));
        assert!(!ids.contains(&ClinicId(without)));
    }

    #[tokio::test]
    async fn regional_stats_round_trip_via_upsert() {
        let pool = setup().await;
        let store = SqlPriceStore::new(pool);

        let mut stats = RegionalPriceStats {
            district: "강남구".to_owned(),
            treatment_type: TreatmentType::Implant,
            min_price: 900_000,
            q1_price: 1_000_000.0,
            median_price: 1_200_000.0,
            q3_price: 1_500_000.0,
            max_price: 2_000_000,
            mean_price: 1_300_000.0,
            std_dev: 250_000.0,
            sample_count: 12,
            last_updated: Utc::now(),
        };
        store.upsert_regional_stats(&stats).await.expect("insert");

        stats.sample_count = 14;
        stats.mean_price = 1_280_000.0;
        store.upsert_regional_stats(&stats).await.expect("update");

        let found = store
            .find_regional_stats("강남구", TreatmentType::Implant)
            .await
            .expect("query")
            .expect("stats present");
        assert_eq!(found.sample_count, 14);
        assert!((found.mean_price - 1_280_000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn missing_stats_row_is_none() {
        let pool = setup().await;
        let store = SqlPriceStore::new(pool);
        let found = store.find_regional_stats("마포구", TreatmentType::Scaling).await.expect("query");
        assert!(found.is_none());
    }
}
