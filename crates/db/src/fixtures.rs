//! Deterministic demo dataset for local development and smoke checks.
//!
//! The seeded district is 강남구: three rankable clinics with distinct
//! profiles, one clinic below the review floor, and one clinic in a
//! different district to exercise isolation. Implant prices across the
//! district clear the regional index sample floor.

use chrono::Utc;

use crate::DbPool;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub clinics: u32,
    pub reviews: u32,
    pub price_observations: u32,
}

struct ClinicSeed {
    name: &'static str,
    address: &'static str,
    district: &'static str,
    latitude: f64,
    longitude: f64,
    has_parking: bool,
    night_service: bool,
    weekend_service: bool,
    // (price, skill, kindness, overtreatment) per-review sentiment profile
    sentiment: (f64, f64, f64, f64),
    review_count: u32,
    // verified implant prices in KRW
    implant_prices: &'static [i64],
}

const CLINIC_SEEDS: &[ClinicSeed] = &[
    ClinicSeed {
        name: "미소치과",
        address: "서울 강남구 테헤란로 110",
        district: "강남구",
        latitude: 37.501,
        longitude: 127.030,
        has_parking: true,
        night_service: true,
        weekend_service: false,
        sentiment: (0.5, 0.8, 0.7, 0.8),
        review_count: 20,
        implant_prices: &[1_000_000, 1_050_000, 980_000],
    },
    ClinicSeed {
        name: "강남바른치과",
        address: "서울 강남구 역삼로 45",
        district: "강남구",
        latitude: 37.498,
        longitude: 127.034,
        has_parking: false,
        night_service: false,
        weekend_service: true,
        sentiment: (0.7, 0.4, 0.5, 0.6),
        review_count: 14,
        implant_prices: &[800_000, 850_000],
    },
    ClinicSeed {
        name: "화이트치과",
        address: "서울 강남구 선릉로 220",
        district: "강남구",
        latitude: 37.504,
        longitude: 127.049,
        has_parking: true,
        night_service: false,
        weekend_service: false,
        sentiment: (-0.2, 0.3, 0.2, 0.1),
        review_count: 16,
        implant_prices: &[1_600_000, 1_550_000],
    },
    // Below the ten-review floor; must never appear in rankings.
    ClinicSeed {
        name: "새봄치과",
        address: "서울 강남구 논현로 12",
        district: "강남구",
        latitude: 37.510,
        longitude: 127.027,
        has_parking: false,
        night_service: false,
        weekend_service: false,
        sentiment: (0.9, 0.9, 0.9, 0.9),
        review_count: 6,
        implant_prices: &[],
    },
    ClinicSeed {
        name: "서초중앙치과",
        address: "서울 서초구 서초대로 310",
        district: "서초구",
        latitude: 37.492,
        longitude: 127.008,
        has_parking: true,
        night_service: false,
        weekend_service: true,
        sentiment: (0.4, 0.6, 0.5, 0.5),
        review_count: 18,
        implant_prices: &[1_100_000],
    },
];

pub async fn seed_demo_dataset(pool: &DbPool) -> Result<SeedSummary, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let mut summary = SeedSummary::default();

    for seed in CLINIC_SEEDS {
        let clinic_id = sqlx::query(
            "INSERT INTO clinic
                (name, address, phone, district, latitude, longitude,
                 has_parking, night_service, weekend_service, created_at, updated_at)
             VALUES (?, ?, '02-000-0000', ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(seed.name)
        .bind(seed.address)
        .bind(seed.district)
        .bind(seed.latitude)
        .bind(seed.longitude)
        .bind(seed.has_parking)
        .bind(seed.night_service)
        .bind(seed.weekend_service)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?
        .last_insert_rowid();
        summary.clinics += 1;

        let (price, skill, kindness, overtreatment) = seed.sentiment;
        for i in 0..seed.review_count {
            let review_id = sqlx::query(
                "INSERT INTO review
                    (clinic_id, source, content, is_processed, is_duplicate, is_flagged, created_at)
                 VALUES (?, 'seed', ?, 1, 0, 0, ?)",
            )
            .bind(clinic_id)
            .bind(format!("{} 방문 후기 {}", seed.name, i + 1))
            .bind(&now)
            .execute(pool)
            .await?
            .last_insert_rowid();
            summary.reviews += 1;

            // Small deterministic jitter keeps reviews distinguishable
            // without moving the clinic's mean off its profile.
            let jitter = match i % 3 {
                0 => -0.05,
                1 => 0.0,
                _ => 0.05,
            };
            sqlx::query(
                "INSERT INTO review_sentiment
                    (review_id, price, skill, kindness, waiting_time, facility,
                     overtreatment, confidence, model_version, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, 0.9, 'kobert-v2', ?)",
            )
            .bind(review_id)
            .bind((price + jitter).clamp(-1.0, 1.0))
            .bind((skill + jitter).clamp(-1.0, 1.0))
            .bind((kindness + jitter).clamp(-1.0, 1.0))
            .bind((kindness - 0.1 + jitter).clamp(-1.0, 1.0))
            .bind((kindness + 0.1 + jitter).clamp(-1.0, 1.0))
            .bind((overtreatment + jitter).clamp(-1.0, 1.0))
            .bind(&now)
            .execute(pool)
            .await?;
        }

        for amount in seed.implant_prices {
            sqlx::query(
                "INSERT INTO price_observation
                    (clinic_id, treatment_type, amount, extraction_confidence,
                     is_verified, is_outlier, source, created_at)
                 VALUES (?, 'implant', ?, 0.95, 1, 0, 'seed', ?)",
            )
            .bind(clinic_id)
            .bind(amount)
            .bind(&now)
            .execute(pool)
            .await?;
            summary.price_observations += 1;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::seed_demo_dataset;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_is_deterministic_and_countable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let summary = seed_demo_dataset(&pool).await.expect("seed");
        assert_eq!(summary.clinics, 5);
        assert_eq!(summary.reviews, 74);
        assert_eq!(summary.price_observations, 8);

        let gangnam: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM clinic WHERE district = '강남구'",
        )
        .fetch_one(&pool)
        .await
        .expect("count")
        .get("count");
        assert_eq!(gangnam, 4);
    }

    #[tokio::test]
    async fn seeded_implant_prices_clear_the_index_floor() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        seed_demo_dataset(&pool).await.expect("seed");

        let indexable: i64 = sqlx::query(
            "SELECT COUNT(*) AS count
             FROM price_observation p JOIN clinic c ON c.id = p.clinic_id
             WHERE c.district = '강남구' AND p.treatment_type = 'implant'
               AND p.is_verified = 1 AND p.is_outlier = 0",
        )
        .fetch_one(&pool)
        .await
        .expect("count")
        .get("count");
        assert!(indexable >= 5, "need at least 5 indexable implant prices, got {indexable}");
    }
}
