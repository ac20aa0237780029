use denty_core::domain::recommendation::RecommendationLogEntry;
use denty_core::store::{RecommendationLogStore, StoreError};

use super::db_err;
use crate::DbPool;

pub struct SqlRecommendationLogStore {
    pool: DbPool,
}

impl SqlRecommendationLogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecommendationLogStore for SqlRecommendationLogStore {
    async fn append(&self, entry: &RecommendationLogEntry) -> Result<i64, StoreError> {
        let clinic_ids = serde_json::to_string(&entry.clinic_ids)
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO recommendation_log
                (user_id, district, treatment_type, clinic_ids, algorithm_version,
                 response_time_ms, outcome, error_code, request_ip, user_agent, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.user_id)
        .bind(&entry.district)
        .bind(entry.treatment_type.map(|t| t.as_str()))
        .bind(&clinic_ids)
        .bind(&entry.algorithm_version)
        .bind(entry.response_time_ms as i64)
        .bind(entry.outcome.as_str())
        .bind(&entry.error_code)
        .bind(&entry.request_ip)
        .bind(&entry.user_agent)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sqlx::Row;

    use denty_core::domain::clinic::ClinicId;
    use denty_core::domain::price::TreatmentType;
    use denty_core::domain::recommendation::{RecommendationLogEntry, RequestOutcome};
    use denty_core::store::RecommendationLogStore;

    use super::SqlRecommendationLogStore;
    use crate::{connect_with_settings, migrations};

    fn sample_entry() -> RecommendationLogEntry {
        RecommendationLogEntry {
            id: None,
            user_id: Some("user-7".to_owned()),
            district: "강남구".to_owned(),
            treatment_type: Some(TreatmentType::Implant),
            clinic_ids: vec![ClinicId(3), ClinicId(1), ClinicId(8)],
            algorithm_version: "v1.0".to_owned(),
            response_time_ms: 120,
            outcome: RequestOutcome::Ok,
            error_code: None,
            request_ip: Some("203.0.113.9".to_owned()),
            user_agent: Some("denty-test".to_owned()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_returns_row_id_and_preserves_clinic_order() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let store = SqlRecommendationLogStore::new(pool.clone());

        let first = store.append(&sample_entry()).await.expect("append");
        let second = store.append(&sample_entry()).await.expect("append");
        assert!(second > first);

        let row = sqlx::query("SELECT clinic_ids, outcome FROM recommendation_log WHERE id = ?")
            .bind(first)
            .fetch_one(&pool)
            .await
            .expect("fetch");
        assert_eq!(row.get::<String, _>("clinic_ids"), "[3,1,8]");
        assert_eq!(row.get::<String, _>("outcome"), "ok");
    }

    #[tokio::test]
    async fn failed_requests_log_their_error_code() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let store = SqlRecommendationLogStore::new(pool.clone());

        let mut entry = sample_entry();
        entry.clinic_ids.clear();
        entry.outcome = RequestOutcome::Timeout;
        entry.error_code = Some("timeout".to_owned());
        let id = store.append(&entry).await.expect("append");

        let row = sqlx::query("SELECT outcome, error_code FROM recommendation_log WHERE id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .expect("fetch");
        assert_eq!(row.get::<String, _>("outcome"), "timeout");
        assert_eq!(row.get::<Option<String>, _>("error_code"), Some("timeout".to_owned()));
    }
}
