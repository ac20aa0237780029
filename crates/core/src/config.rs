use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::scoring::ScoreWeights;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Every knob that shapes the ranking function, plus operational limits.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Minimum processed review count for a clinic to be rankable.
    pub min_reviews: u32,
    /// Radius cutoff in km when a user location is supplied.
    pub search_radius_km: f64,
    /// Age after which a stored clinic score must be recomputed on read.
    pub freshness_window_hours: i64,
    /// TTL for ranking cache entries.
    pub cache_ttl_secs: u64,
    /// Soft per-user cap, enforced by the HTTP layer.
    pub rate_limit_per_hour_per_user: u32,
    /// Sub-score weights; must sum to 1.0.
    pub weights: ScoreWeights,
    /// Opaque version tag; bump whenever a scoring rule changes.
    pub algorithm_version: String,
    /// Per-request deadline.
    pub request_deadline_ms: u64,
}

impl EngineConfig {
    /// Deterministic fingerprint of every ranking-affecting knob. Embedded
    /// in cache keys so a config change can never serve stale rankings.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|min{}|w{:.2}-{:.2}-{:.2}-{:.2}",
            self.algorithm_version,
            self.min_reviews,
            self.weights.price_competitiveness,
            self.weights.medical_skill,
            self.weights.overtreatment_risk,
            self.weights.patient_satisfaction,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub algorithm_version: Option<String>,
    pub min_reviews: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://denty.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            engine: EngineConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_reviews: 10,
            search_radius_km: 5.0,
            freshness_window_hours: 24,
            cache_ttl_secs: 3600,
            rate_limit_per_hour_per_user: 100,
            weights: ScoreWeights::default(),
            algorithm_version: "v1.0".to_string(),
            request_deadline_ms: 3000,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    engine: Option<EnginePatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    min_reviews: Option<u32>,
    search_radius_km: Option<f64>,
    freshness_window_hours: Option<i64>,
    cache_ttl_secs: Option<u64>,
    rate_limit_per_hour_per_user: Option<u32>,
    weights: Option<ScoreWeights>,
    algorithm_version: Option<String>,
    request_deadline_ms: Option<u64>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("denty.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(min_reviews) = engine.min_reviews {
                self.engine.min_reviews = min_reviews;
            }
            if let Some(search_radius_km) = engine.search_radius_km {
                self.engine.search_radius_km = search_radius_km;
            }
            if let Some(freshness_window_hours) = engine.freshness_window_hours {
                self.engine.freshness_window_hours = freshness_window_hours;
            }
            if let Some(cache_ttl_secs) = engine.cache_ttl_secs {
                self.engine.cache_ttl_secs = cache_ttl_secs;
            }
            if let Some(rate_limit) = engine.rate_limit_per_hour_per_user {
                self.engine.rate_limit_per_hour_per_user = rate_limit;
            }
            if let Some(weights) = engine.weights {
                self.engine.weights = weights;
            }
            if let Some(algorithm_version) = engine.algorithm_version {
                self.engine.algorithm_version = algorithm_version;
            }
            if let Some(request_deadline_ms) = engine.request_deadline_ms {
                self.engine.request_deadline_ms = request_deadline_ms;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DENTY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("DENTY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("DENTY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("DENTY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("DENTY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DENTY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DENTY_SERVER_PORT") {
            self.server.port = parse_u16("DENTY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("DENTY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("DENTY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("DENTY_LOGGING_LEVEL").or_else(|| read_env("DENTY_LOG_LEVEL"))
        {
            self.logging.level = value;
        }
        if let Some(value) =
            read_env("DENTY_LOGGING_FORMAT").or_else(|| read_env("DENTY_LOG_FORMAT"))
        {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("DENTY_ENGINE_MIN_REVIEWS") {
            self.engine.min_reviews = parse_u32("DENTY_ENGINE_MIN_REVIEWS", &value)?;
        }
        if let Some(value) = read_env("DENTY_ENGINE_SEARCH_RADIUS_KM") {
            self.engine.search_radius_km = parse_f64("DENTY_ENGINE_SEARCH_RADIUS_KM", &value)?;
        }
        if let Some(value) = read_env("DENTY_ENGINE_FRESHNESS_WINDOW_HOURS") {
            self.engine.freshness_window_hours =
                parse_i64("DENTY_ENGINE_FRESHNESS_WINDOW_HOURS", &value)?;
        }
        if let Some(value) = read_env("DENTY_ENGINE_CACHE_TTL_SECS") {
            self.engine.cache_ttl_secs = parse_u64("DENTY_ENGINE_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("DENTY_ENGINE_RATE_LIMIT_PER_HOUR_PER_USER") {
            self.engine.rate_limit_per_hour_per_user =
                parse_u32("DENTY_ENGINE_RATE_LIMIT_PER_HOUR_PER_USER", &value)?;
        }
        if let Some(value) = read_env("DENTY_ENGINE_ALGORITHM_VERSION") {
            self.engine.algorithm_version = value;
        }
        if let Some(value) = read_env("DENTY_ENGINE_REQUEST_DEADLINE_MS") {
            self.engine.request_deadline_ms =
                parse_u64("DENTY_ENGINE_REQUEST_DEADLINE_MS", &value)?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(algorithm_version) = overrides.algorithm_version {
            self.engine.algorithm_version = algorithm_version;
        }
        if let Some(min_reviews) = overrides.min_reviews {
            self.engine.min_reviews = min_reviews;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_engine(&self.engine)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("denty.toml"), PathBuf::from("config/denty.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }
    if server.graceful_shutdown_secs > 120 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be at most 120".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
    let level = logging.level.trim().to_ascii_lowercase();
    if !LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::Validation(format!(
            "logging.level must be one of trace|debug|info|warn|error, got `{}`",
            logging.level
        )));
    }
    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.min_reviews == 0 {
        return Err(ConfigError::Validation(
            "engine.min_reviews must be greater than zero".to_string(),
        ));
    }
    if !engine.search_radius_km.is_finite() || engine.search_radius_km <= 0.0 {
        return Err(ConfigError::Validation(
            "engine.search_radius_km must be a positive number".to_string(),
        ));
    }
    if engine.freshness_window_hours <= 0 {
        return Err(ConfigError::Validation(
            "engine.freshness_window_hours must be greater than zero".to_string(),
        ));
    }
    if engine.cache_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "engine.cache_ttl_secs must be greater than zero".to_string(),
        ));
    }
    if engine.request_deadline_ms == 0 {
        return Err(ConfigError::Validation(
            "engine.request_deadline_ms must be greater than zero".to_string(),
        ));
    }
    if engine.algorithm_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "engine.algorithm_version must not be empty".to_string(),
        ));
    }

    let weights = &engine.weights;
    for (name, value) in [
        ("price_competitiveness", weights.price_competitiveness),
        ("medical_skill", weights.medical_skill),
        ("overtreatment_risk", weights.overtreatment_risk),
        ("patient_satisfaction", weights.patient_satisfaction),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "engine.weights.{name} must be in range 0.0..=1.0"
            )));
        }
    }
    let sum = weights.price_competitiveness
        + weights.medical_skill
        + weights.overtreatment_risk
        + weights.patient_satisfaction;
    if (sum - 1.0).abs() > 1e-6 {
        return Err(ConfigError::Validation(format!(
            "engine.weights must sum to 1.0, got {sum}"
        )));
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn load_applies_toml_patch() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
[database]
url = "sqlite::memory:"

[engine]
min_reviews = 5
algorithm_version = "v1.1"

[engine.weights]
price_competitiveness = 0.4
medical_skill = 0.3
overtreatment_risk = 0.2
patient_satisfaction = 0.1
"#
        )
        .expect("write");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .expect("load");

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.engine.min_reviews, 5);
        assert_eq!(config.engine.algorithm_version, "v1.1");
        assert!((config.engine.weights.price_competitiveness - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/denty.toml")),
            require_file: true,
            overrides: ConfigOverrides::default(),
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut config = AppConfig::default();
        config.engine.weights.price_competitiveness = 0.5;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn fingerprint_tracks_ranking_knobs() {
        let mut config = EngineConfig::default();
        let base = config.fingerprint();
        assert!(base.contains("v1.0"));
        assert!(base.contains("min10"));

        config.min_reviews = 12;
        assert_ne!(config.fingerprint(), base);

        config.min_reviews = 10;
        config.weights.medical_skill = 0.30;
        config.weights.overtreatment_risk = 0.20;
        assert_ne!(config.fingerprint(), base);
    }

    #[test]
    fn interpolation_reports_unterminated_expression() {
        assert!(matches!(
            interpolate_env_vars("url = \"${DENTY_UNTERMINATED"),
            Err(ConfigError::UnterminatedInterpolation)
        ));
    }
}
