use sqlx::Row;

use denty_core::domain::clinic::ClinicId;
use denty_core::domain::sentiment::SentimentRecord;
use denty_core::store::{SentimentStore, StoreError};

use super::{db_err, decode_err};
use crate::DbPool;

pub struct SqlSentimentStore {
    pool: DbPool,
}

impl SqlSentimentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_sentiment(row: &sqlx::sqlite::SqliteRow) -> Result<SentimentRecord, StoreError> {
    Ok(SentimentRecord {
        review_id: row.try_get("review_id").map_err(decode_err)?,
        price: row.try_get("price").map_err(decode_err)?,
        skill: row.try_get("skill").map_err(decode_err)?,
        kindness: row.try_get("kindness").map_err(decode_err)?,
        waiting_time: row.try_get("waiting_time").map_err(decode_err)?,
        facility: row.try_get("facility").map_err(decode_err)?,
        overtreatment: row.try_get("overtreatment").map_err(decode_err)?,
        confidence: row.try_get("confidence").map_err(decode_err)?,
        model_version: row.try_get("model_version").map_err(decode_err)?,
    })
}

#[async_trait::async_trait]
impl SentimentStore for SqlSentimentStore {
    async fn sentiments_for_clinic(
        &self,
        clinic_id: ClinicId,
    ) -> Result<Vec<SentimentRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT s.review_id, s.price, s.skill, s.kindness, s.waiting_time,
                    s.facility, s.overtreatment, s.confidence, s.model_version
             FROM review_sentiment s
             JOIN review r ON r.id = s.review_id
             WHERE r.clinic_id = ?
               AND r.is_processed = 1 AND r.is_duplicate = 0 AND r.is_flagged = 0",
        )
        .bind(clinic_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_sentiment).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use denty_core::domain::clinic::ClinicId;
    use denty_core::store::SentimentStore;

    use super::SqlSentimentStore;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_clinic(pool: &sqlx::SqlitePool) -> i64 {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO clinic (name, district, created_at, updated_at) VALUES ('A', '강남구', ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .expect("insert clinic")
        .last_insert_rowid()
    }

    async fn insert_reviewed_sentiment(
        pool: &sqlx::SqlitePool,
        clinic_id: i64,
        processed: bool,
        skill: f64,
    ) {
        let now = Utc::now().to_rfc3339();
        let review_id = sqlx::query(
            "INSERT INTO review (clinic_id, is_processed, is_duplicate, is_flagged, created_at)
             VALUES (?, ?, 0, 0, ?)",
        )
        .bind(clinic_id)
        .bind(processed)
        .bind(&now)
        .execute(pool)
        .await
        .expect("insert review")
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO review_sentiment (review_id, skill, confidence, model_version, created_at)
             VALUES (?, ?, 0.9, 'kobert-v2', ?)",
        )
        .bind(review_id)
        .bind(skill)
        .bind(&now)
        .execute(pool)
        .await
        .expect("insert sentiment");
    }

    #[tokio::test]
    async fn only_qualifying_reviews_contribute_sentiments() {
        let pool = setup().await;
        let clinic_id = insert_clinic(&pool).await;
        insert_reviewed_sentiment(&pool, clinic_id, true, 0.8).await;
        insert_reviewed_sentiment(&pool, clinic_id, false, -0.5).await;
        let store = SqlSentimentStore::new(pool);

        let records = store.sentiments_for_clinic(ClinicId(clinic_id)).await.expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].skill, Some(0.8));
        assert_eq!(records[0].price, None);
        assert_eq!(records[0].model_version, "kobert-v2");
    }
}
