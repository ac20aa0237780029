use denty_core::config::{AppConfig, LoadOptions};
use denty_db::{connect, migrations, DbPool};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_scoring_weights(&config));
            checks.extend(database_checks(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["scoring_weights", "database_connectivity", "schema_migrations", "dataset"]
            {
                checks.push(skipped(name, "skipped because configuration did not load"));
            }
        }
    }

    let all_pass = checks
        .iter()
        .all(|check| matches!(check.status, CheckStatus::Pass));
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: reason.to_string() }
}

fn check_scoring_weights(config: &AppConfig) -> DoctorCheck {
    let weights = config.engine.weights;
    let sum = weights.price_competitiveness
        + weights.medical_skill
        + weights.overtreatment_risk
        + weights.patient_satisfaction;
    let details = format!(
        "{} price={} skill={} overtreatment={} satisfaction={} (sum {sum:.2})",
        config.engine.algorithm_version,
        weights.price_competitiveness,
        weights.medical_skill,
        weights.overtreatment_risk,
        weights.patient_satisfaction,
    );
    if (sum - 1.0).abs() > 0.001 {
        return DoctorCheck { name: "scoring_weights", status: CheckStatus::Fail, details };
    }
    DoctorCheck { name: "scoring_weights", status: CheckStatus::Pass, details }
}

/// Connectivity, migration state, and dataset presence share one pool; the
/// later checks are skipped when an earlier one fails.
fn database_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: format!("failed to initialize async runtime: {error}"),
                },
                skipped("schema_migrations", "skipped because the runtime did not start"),
                skipped("dataset", "skipped because the runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let mut checks = Vec::new();

        let pool = match connect(&config.database).await {
            Ok(pool) => {
                checks.push(DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Pass,
                    details: format!("connected using `{}`", config.database.url),
                });
                pool
            }
            Err(error) => {
                checks.push(DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: format!("failed to connect to database: {error}"),
                });
                checks.push(skipped("schema_migrations", "skipped because the database is unreachable"));
                checks.push(skipped("dataset", "skipped because the database is unreachable"));
                return checks;
            }
        };

        let migrations_ok = match check_schema_migrations(&pool).await {
            Ok(check) => {
                let ok = check.status == CheckStatus::Pass;
                checks.push(check);
                ok
            }
            Err(error) => {
                checks.push(DoctorCheck {
                    name: "schema_migrations",
                    status: CheckStatus::Fail,
                    details: format!("could not inspect migration state: {error}"),
                });
                false
            }
        };

        if migrations_ok {
            checks.push(check_dataset(&pool).await);
        } else {
            checks.push(skipped("dataset", "skipped because the schema is not current"));
        }

        pool.close().await;
        checks
    })
}

async fn check_schema_migrations(pool: &DbPool) -> Result<DoctorCheck, sqlx::Error> {
    let available = migrations::MIGRATOR.iter().count() as i64;
    // Table is absent until the first `denty migrate` run.
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    if applied < available {
        return Ok(DoctorCheck {
            name: "schema_migrations",
            status: CheckStatus::Fail,
            details: format!("{applied} of {available} migrations applied; run `denty migrate`"),
        });
    }
    Ok(DoctorCheck {
        name: "schema_migrations",
        status: CheckStatus::Pass,
        details: format!("{applied} of {available} migrations applied"),
    })
}

async fn check_dataset(pool: &DbPool) -> DoctorCheck {
    let clinics: Result<i64, _> =
        sqlx::query_scalar("SELECT COUNT(*) FROM clinic").fetch_one(pool).await;
    let indexable_prices: Result<i64, _> = sqlx::query_scalar(
        "SELECT COUNT(*) FROM price_observation WHERE is_verified = 1 AND is_outlier = 0",
    )
    .fetch_one(pool)
    .await;

    match (clinics, indexable_prices) {
        (Ok(clinics), Ok(prices)) => DoctorCheck {
            name: "dataset",
            status: CheckStatus::Pass,
            details: format!("{clinics} clinics, {prices} indexable price observations"),
        },
        (Err(error), _) | (_, Err(error)) => DoctorCheck {
            name: "dataset",
            status: CheckStatus::Fail,
            details: format!("could not count dataset rows: {error}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
