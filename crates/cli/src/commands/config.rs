use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use denty_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", "DENTY_DATABASE_URL"),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", "DENTY_DATABASE_MAX_CONNECTIONS"),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", "DENTY_DATABASE_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "DENTY_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", "DENTY_SERVER_PORT"),
    ));
    lines.push(render_line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        source("server.graceful_shutdown_secs", "DENTY_SERVER_GRACEFUL_SHUTDOWN_SECS"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "DENTY_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "DENTY_LOGGING_FORMAT"),
    ));

    lines.push(render_line(
        "engine.algorithm_version",
        &config.engine.algorithm_version,
        source("engine.algorithm_version", "DENTY_ENGINE_ALGORITHM_VERSION"),
    ));
    lines.push(render_line(
        "engine.min_reviews",
        &config.engine.min_reviews.to_string(),
        source("engine.min_reviews", "DENTY_ENGINE_MIN_REVIEWS"),
    ));
    lines.push(render_line(
        "engine.search_radius_km",
        &config.engine.search_radius_km.to_string(),
        source("engine.search_radius_km", "DENTY_ENGINE_SEARCH_RADIUS_KM"),
    ));
    lines.push(render_line(
        "engine.freshness_window_hours",
        &config.engine.freshness_window_hours.to_string(),
        source("engine.freshness_window_hours", "DENTY_ENGINE_FRESHNESS_WINDOW_HOURS"),
    ));
    lines.push(render_line(
        "engine.cache_ttl_secs",
        &config.engine.cache_ttl_secs.to_string(),
        source("engine.cache_ttl_secs", "DENTY_ENGINE_CACHE_TTL_SECS"),
    ));
    lines.push(render_line(
        "engine.request_deadline_ms",
        &config.engine.request_deadline_ms.to_string(),
        source("engine.request_deadline_ms", "DENTY_ENGINE_REQUEST_DEADLINE_MS"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("denty.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/denty.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
