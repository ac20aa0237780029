use sqlx::Row;

use denty_core::domain::clinic::ClinicId;
use denty_core::domain::score::{AspectAggregate, ClinicScore};
use denty_core::store::{ScoreStore, StoreError};

use super::{db_err, decode_err, parse_timestamp};
use crate::DbPool;

pub struct SqlScoreStore {
    pool: DbPool,
}

impl SqlScoreStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_score(row: &sqlx::sqlite::SqliteRow) -> Result<ClinicScore, StoreError> {
    let last_calculated: String = row.try_get("last_calculated").map_err(decode_err)?;
    let reviews_analyzed: i64 = row.try_get("reviews_analyzed").map_err(decode_err)?;
    let price_data_points: i64 = row.try_get("price_data_points").map_err(decode_err)?;
    Ok(ClinicScore {
        clinic_id: ClinicId(row.try_get("clinic_id").map_err(decode_err)?),
        price_competitiveness: row.try_get("price_competitiveness").map_err(decode_err)?,
        medical_skill: row.try_get("medical_skill").map_err(decode_err)?,
        overtreatment_risk: row.try_get("overtreatment_risk").map_err(decode_err)?,
        patient_satisfaction: row.try_get("patient_satisfaction").map_err(decode_err)?,
        composite_score: row.try_get("composite_score").map_err(decode_err)?,
        algorithm_version: row.try_get("algorithm_version").map_err(decode_err)?,
        last_calculated: parse_timestamp(&last_calculated)?,
        reviews_analyzed: reviews_analyzed.max(0) as u32,
        price_data_points: price_data_points.max(0) as u32,
    })
}

fn row_to_aggregate(row: &sqlx::sqlite::SqliteRow) -> Result<AspectAggregate, StoreError> {
    let last_calculated: String = row.try_get("last_calculated").map_err(decode_err)?;
    let reviews_analyzed: i64 = row.try_get("reviews_analyzed").map_err(decode_err)?;
    Ok(AspectAggregate {
        clinic_id: ClinicId(row.try_get("clinic_id").map_err(decode_err)?),
        mean_price: row.try_get("mean_price").map_err(decode_err)?,
        mean_skill: row.try_get("mean_skill").map_err(decode_err)?,
        mean_kindness: row.try_get("mean_kindness").map_err(decode_err)?,
        mean_waiting_time: row.try_get("mean_waiting_time").map_err(decode_err)?,
        mean_facility: row.try_get("mean_facility").map_err(decode_err)?,
        mean_overtreatment: row.try_get("mean_overtreatment").map_err(decode_err)?,
        reviews_analyzed: reviews_analyzed.max(0) as u32,
        algorithm_version: row.try_get("algorithm_version").map_err(decode_err)?,
        last_calculated: parse_timestamp(&last_calculated)?,
    })
}

#[async_trait::async_trait]
impl ScoreStore for SqlScoreStore {
    async fn find_score(&self, clinic_id: ClinicId) -> Result<Option<ClinicScore>, StoreError> {
        let row = sqlx::query(
            "SELECT clinic_id, price_competitiveness, medical_skill, overtreatment_risk,
                    patient_satisfaction, composite_score, algorithm_version, last_calculated,
                    reviews_analyzed, price_data_points
             FROM clinic_score
             WHERE clinic_id = ?",
        )
        .bind(clinic_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_score).transpose()
    }

    async fn upsert_score(&self, score: &ClinicScore) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO clinic_score
                (clinic_id, price_competitiveness, medical_skill, overtreatment_risk,
                 patient_satisfaction, composite_score, algorithm_version, last_calculated,
                 reviews_analyzed, price_data_points)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(clinic_id) DO UPDATE SET
                price_competitiveness = excluded.price_competitiveness,
                medical_skill = excluded.medical_skill,
                overtreatment_risk = excluded.overtreatment_risk,
                patient_satisfaction = excluded.patient_satisfaction,
                composite_score = excluded.composite_score,
                algorithm_version = excluded.algorithm_version,
                last_calculated = excluded.last_calculated,
                reviews_analyzed = excluded.reviews_analyzed,
                price_data_points = excluded.price_data_points",
        )
        .bind(score.clinic_id.0)
        .bind(score.price_competitiveness)
        .bind(score.medical_skill)
        .bind(score.overtreatment_risk)
        .bind(score.patient_satisfaction)
        .bind(score.composite_score)
        .bind(&score.algorithm_version)
        .bind(score.last_calculated.to_rfc3339())
        .bind(score.reviews_analyzed)
        .bind(score.price_data_points)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_aggregate(
        &self,
        clinic_id: ClinicId,
    ) -> Result<Option<AspectAggregate>, StoreError> {
        let row = sqlx::query(
            "SELECT clinic_id, mean_price, mean_skill, mean_kindness, mean_waiting_time,
                    mean_facility, mean_overtreatment, reviews_analyzed, algorithm_version,
                    last_calculated
             FROM aspect_aggregate
             WHERE clinic_id = ?",
        )
        .bind(clinic_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_aggregate).transpose()
    }

    async fn upsert_aggregate(&self, aggregate: &AspectAggregate) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO aspect_aggregate
                (clinic_id, mean_price, mean_skill, mean_kindness, mean_waiting_time,
                 mean_facility, mean_overtreatment, reviews_analyzed, algorithm_version,
                 last_calculated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(clinic_id) DO UPDATE SET
                mean_price = excluded.mean_price,
                mean_skill = excluded.mean_skill,
                mean_kindness = excluded.mean_kindness,
                mean_waiting_time = excluded.mean_waiting_time,
                mean_facility = excluded.mean_facility,
                mean_overtreatment = excluded.mean_overtreatment,
                reviews_analyzed = excluded.reviews_analyzed,
                algorithm_version = excluded.algorithm_version,
                last_calculated = excluded.last_calculated",
        )
        .bind(aggregate.clinic_id.0)
        .bind(aggregate.mean_price)
        .bind(aggregate.mean_skill)
        .bind(aggregate.mean_kindness)
        .bind(aggregate.mean_waiting_time)
        .bind(aggregate.mean_facility)
        .bind(aggregate.mean_overtreatment)
        .bind(aggregate.reviews_analyzed)
        .bind(&aggregate.algorithm_version)
        .bind(aggregate.last_calculated.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
