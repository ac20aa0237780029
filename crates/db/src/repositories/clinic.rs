use std::collections::HashMap;

use sqlx::Row;

use denty_core::domain::clinic::{Clinic, ClinicId};
use denty_core::store::{ClinicDirectory, StoreError};

use super::{db_err, decode_err, in_placeholders};
use crate::DbPool;

pub struct SqlClinicDirectory {
    pool: DbPool,
}

impl SqlClinicDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_clinic(row: &sqlx::sqlite::SqliteRow) -> Result<Clinic, StoreError> {
    Ok(Clinic {
        id: ClinicId(row.try_get("id").map_err(decode_err)?),
        name: row.try_get("name").map_err(decode_err)?,
        address: row.try_get("address").map_err(decode_err)?,
        phone: row.try_get("phone").map_err(decode_err)?,
        district: row.try_get("district").map_err(decode_err)?,
        latitude: row.try_get("latitude").map_err(decode_err)?,
        longitude: row.try_get("longitude").map_err(decode_err)?,
        has_parking: row.try_get("has_parking").map_err(decode_err)?,
        night_service: row.try_get("night_service").map_err(decode_err)?,
        weekend_service: row.try_get("weekend_service").map_err(decode_err)?,
    })
}

#[async_trait::async_trait]
impl ClinicDirectory for SqlClinicDirectory {
    async fn clinics_in_district(&self, district: &str) -> Result<Vec<Clinic>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, address, phone, district, latitude, longitude,
                    has_parking, night_service, weekend_service
             FROM clinic
             WHERE LOWER(district) LIKE '%' || LOWER(?) || '%'
             ORDER BY id",
        )
        .bind(district.trim())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_clinic).collect()
    }

    async fn review_counts(
        &self,
        clinic_ids: &[ClinicId],
    ) -> Result<HashMap<ClinicId, u32>, StoreError> {
        if clinic_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT clinic_id, COUNT(*) AS review_count
             FROM review
             WHERE clinic_id IN ({})
               AND is_processed = 1 AND is_duplicate = 0 AND is_flagged = 0
             GROUP BY clinic_id",
            in_placeholders(clinic_ids.len()),
        );
        let mut query = sqlx::query(&sql);
        for id in clinic_ids {
            query = query.bind(id.0);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in &rows {
            let clinic_id = ClinicId(row.try_get("clinic_id").map_err(decode_err)?);
            let count: i64 = row.try_get("review_count").map_err(decode_err)?;
            counts.insert(clinic_id, count.max(0) as u32);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use denty_core::domain::clinic::ClinicId;
    use denty_core::store::ClinicDirectory;

    use super::SqlClinicDirectory;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_clinic(pool: &sqlx::SqlitePool, name: &str, district: &str) -> i64 {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO clinic (name, address, phone, district, created_at, updated_at)
             VALUES (?, '', '', ?, ?, ?)",
        )
        .bind(name)
        .bind(district)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .expect("insert clinic")
        .last_insert_rowid()
    }

    async fn insert_review(pool: &sqlx::SqlitePool, clinic_id: i64, processed: bool, flagged: bool) {
        sqlx::query(
            "INSERT INTO review (clinic_id, is_processed, is_duplicate, is_flagged, created_at)
             VALUES (?, ?, 0, ?, ?)",
        )
        .bind(clinic_id)
        .bind(processed)
        .bind(flagged)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .expect("insert review");
    }

    #[tokio::test]
    async fn district_match_is_substring_and_case_insensitive() {
        let pool = setup().await;
        insert_clinic(&pool, "A치과", "서울 강남구").await;
        insert_clinic(&pool, "B치과", "서초구").await;
        let directory = SqlClinicDirectory::new(pool);

        let found = directory.clinics_in_district("강남구").await.expect("query");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "A치과");
    }

    #[tokio::test]
    async fn review_counts_only_count_qualifying_reviews() {
        let pool = setup().await;
        let clinic_id = insert_clinic(&pool, "A치과", "강남구").await;
        insert_review(&pool, clinic_id, true, false).await;
        insert_review(&pool, clinic_id, true, false).await;
        insert_review(&pool, clinic_id, false, false).await;
        insert_review(&pool, clinic_id, true, true).await;
        let directory = SqlClinicDirectory::new(pool);

        let counts = directory.review_counts(&[ClinicId(clinic_id)]).await.expect("counts");
        assert_eq!(counts.get(&ClinicId(clinic_id)), Some(&2));
    }

    #[tokio::test]
    async fn review_counts_for_no_clinics_is_empty() {
        let pool = setup().await;
        let directory = SqlClinicDirectory::new(pool);
        assert!(directory.review_counts(&[]).await.expect("counts").is_empty());
    }
}
