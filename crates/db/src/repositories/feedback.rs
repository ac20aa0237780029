use chrono::Utc;
use sqlx::Row;

use denty_core::domain::clinic::ClinicId;
use denty_core::domain::recommendation::{FeedbackType, RecommendationFeedback};
use denty_core::store::{FeedbackStore, StoreError};

use super::{db_err, decode_err};
use crate::DbPool;

pub struct SqlFeedbackStore {
    pool: DbPool,
}

impl SqlFeedbackStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_feedback(row: &sqlx::sqlite::SqliteRow) -> Result<RecommendationFeedback, StoreError> {
    let feedback_type: String = row.try_get("feedback_type").map_err(decode_err)?;
    let visit_rating: Option<i64> = row.try_get("visit_rating").map_err(decode_err)?;
    Ok(RecommendationFeedback {
        log_id: row.try_get("log_id").map_err(decode_err)?,
        clinic_id: ClinicId(row.try_get("clinic_id").map_err(decode_err)?),
        feedback_type: feedback_type.parse::<FeedbackType>().map_err(decode_err)?,
        comment: row.try_get("comment").map_err(decode_err)?,
        did_visit: row.try_get("did_visit").map_err(decode_err)?,
        visit_rating: visit_rating.map(|r| r.clamp(0, u8::MAX as i64) as u8),
    })
}

#[async_trait::async_trait]
impl FeedbackStore for SqlFeedbackStore {
    async fn upsert(&self, feedback: &RecommendationFeedback) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO recommendation_feedback
                (log_id, clinic_id, feedback_type, comment, did_visit, visit_rating,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(log_id, clinic_id) DO UPDATE SET
                feedback_type = excluded.feedback_type,
                comment = excluded.comment,
                did_visit = excluded.did_visit,
                visit_rating = excluded.visit_rating,
                updated_at = excluded.updated_at",
        )
        .bind(feedback.log_id)
        .bind(feedback.clinic_id.0)
        .bind(feedback.feedback_type.as_str())
        .bind(&feedback.comment)
        .bind(feedback.did_visit)
        .bind(feedback.visit_rating)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find(
        &self,
        log_id: i64,
        clinic_id: ClinicId,
    ) -> Result<Option<RecommendationFeedback>, StoreError> {
        let row = sqlx::query(
            "SELECT log_id, clinic_id, feedback_type, comment, did_visit, visit_rating
             FROM recommendation_feedback
             WHERE log_id = ? AND clinic_id = ?",
        )
        .bind(log_id)
        .bind(clinic_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_feedback).transpose()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use denty_core::domain::clinic::ClinicId;
    use denty_core::domain::price::TreatmentType;
    use denty_core::domain::recommendation::{
        FeedbackType, RecommendationFeedback, RecommendationLogEntry, RequestOutcome,
    };
    use denty_core::store::{FeedbackStore, RecommendationLogStore};

    use super::SqlFeedbackStore;
    use crate::repositories::SqlRecommendationLogStore;
    use crate::{connect_with_settings, migrations};

    async fn setup_with_log_and_clinic() -> (sqlx::SqlitePool, i64, i64) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let now = Utc::now().to_rfc3339();
        let clinic_id = sqlx::query(
            "INSERT INTO clinic (name, district, created_at, updated_at) VALUES ('A', '강남구', ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .expect("insert clinic")
        .last_insert_rowid();

        let log = SqlRecommendationLogStore::new(pool.clone());
        let log_id = log
            .append(&RecommendationLogEntry {
                id: None,
                user_id: None,
                district: "강남구".to_owned(),
                treatment_type: Some(TreatmentType::Scaling),
                clinic_ids: vec![ClinicId(clinic_id)],
                algorithm_version: "v1.0".to_owned(),
                response_time_ms: 80,
                outcome: RequestOutcome::Ok,
                error_code: None,
                request_ip: None,
                user_agent: None,
                created_at: Utc::now(),
            })
            .await
            .expect("append log");

        (pool, log_id, clinic_id)
    }

    #[tokio::test]
    async fn repeated_feedback_overwrites_the_previous_row() {
        let (pool, log_id, clinic_id) = setup_with_log_and_clinic().await;
        let store = SqlFeedbackStore::new(pool);

        let mut feedback = RecommendationFeedback {
            log_id,
            clinic_id: ClinicId(clinic_id),
            feedback_type: FeedbackType::Helpful,
            comment: None,
            did_visit: None,
            visit_rating: None,
        };
        store.upsert(&feedback).await.expect("insert");

        feedback.feedback_type = FeedbackType::Inaccurate;
        feedback.comment = Some("가격 정보가 달랐어요".to_owned());
        feedback.did_visit = Some(true);
        feedback.visit_rating = Some(3);
        store.upsert(&feedback).await.expect("update");

        let found =
            store.find(log_id, ClinicId(clinic_id)).await.expect("query").expect("present");
        assert_eq!(found.feedback_type, FeedbackType::Inaccurate);
        assert_eq!(found.visit_rating, Some(3));
        assert_eq!(found.did_visit, Some(true));
    }

    #[tokio::test]
    async fn missing_feedback_is_none() {
        let (pool, log_id, _) = setup_with_log_and_clinic().await;
        let store = SqlFeedbackStore::new(pool);
        assert!(store.find(log_id, ClinicId(404)).await.expect("query").is_none());
    }
}
