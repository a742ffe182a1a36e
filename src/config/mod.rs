use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::{AppError, AppResult};

pub const ENV_APPLICATION_ID: &str = "PARSE_APPLICATION_ID";
pub const ENV_JAVASCRIPT_KEY: &str = "PARSE_JAVASCRIPT_KEY";
pub const ENV_SERVER_URL: &str = "PARSE_SERVER_URL";

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub parse: ParseConfig,
    pub poster: PosterConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

/// Параметры подключения к Parse Server.
///
/// Три обязательных параметра хранятся как `Option`: их отсутствие не мешает
/// запуску, но любая удалённая операция будет отклонена с ошибкой конфигурации.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParseConfig {
    pub application_id: Option<String>,
    pub javascript_key: Option<String>,
    pub server_url: Option<String>,
    pub session_file: PathBuf,
    pub request_timeout_secs: u64,
}

/// Полностью заданные параметры подключения.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSettings {
    pub application_id: String,
    pub javascript_key: String,
    pub server_url: String,
}

// Настройки подготовки постеров
#[derive(Debug, Clone, Deserialize)]
pub struct PosterConfig {
    pub max_upload_bytes: usize,
    pub compression_threshold_bytes: usize,
    pub max_width: u32,
    pub jpeg_quality: u8,
    pub upload_timeout_secs: u64,
}

impl Default for PosterConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            compression_threshold_bytes: 1024 * 1024,
            max_width: 1200,
            jpeg_quality: 80,
            upload_timeout_secs: 15,
        }
    }
}

impl AppConfig {
    pub fn json_logs(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl PosterConfig {
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

impl ParseConfig {
    pub fn new(
        application_id: Option<String>,
        javascript_key: Option<String>,
        server_url: Option<String>,
    ) -> Self {
        Self {
            application_id,
            javascript_key,
            server_url,
            session_file: PathBuf::from(".parse_session.json"),
            request_timeout_secs: 30,
        }
    }

    /// Имена переменных окружения, которые не заданы (пустая строка считается отсутствием).
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (ENV_APPLICATION_ID, &self.application_id),
            (ENV_JAVASCRIPT_KEY, &self.javascript_key),
            (ENV_SERVER_URL, &self.server_url),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn settings(&self) -> AppResult<ParseSettings> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(AppError::Configuration(missing.join(", ")));
        }

        // missing() пуст, значит все три значения заданы
        Ok(ParseSettings {
            application_id: self.application_id.clone().unwrap_or_default(),
            javascript_key: self.javascript_key.clone().unwrap_or_default(),
            server_url: self
                .server_url
                .clone()
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: parse_env("PORT", 8000),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "event_manager=debug,tower_http=debug".to_string()),
            },
            parse: ParseConfig {
                application_id: env::var(ENV_APPLICATION_ID).ok(),
                javascript_key: env::var(ENV_JAVASCRIPT_KEY).ok(),
                server_url: env::var(ENV_SERVER_URL).ok(),
                session_file: env::var("PARSE_SESSION_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(".parse_session.json")),
                request_timeout_secs: parse_env("PARSE_REQUEST_TIMEOUT_SECS", 30),
            },
            poster: PosterConfig {
                max_upload_bytes: parse_env("POSTER_MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
                compression_threshold_bytes: parse_env("POSTER_COMPRESSION_THRESHOLD_BYTES", 1024 * 1024),
                max_width: parse_env("POSTER_MAX_WIDTH", 1200),
                jpeg_quality: parse_env("POSTER_JPEG_QUALITY", 80),
                upload_timeout_secs: parse_env("POSTER_UPLOAD_TIMEOUT_SECS", 15),
            },
        }
    }
}

// Числовые переменные: при ошибке разбора берём значение по умолчанию
fn parse_env<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_every_missing_parameter() {
        let config = ParseConfig::new(None, Some("  ".into()), None);
        assert_eq!(
            config.missing(),
            vec![ENV_APPLICATION_ID, ENV_JAVASCRIPT_KEY, ENV_SERVER_URL]
        );
        assert!(matches!(config.settings(), Err(AppError::Configuration(_))));
    }

    #[test]
    fn trims_trailing_slash_from_server_url() {
        let config = ParseConfig::new(
            Some("app".into()),
            Some("key".into()),
            Some("https://parse.example.com/parse/".into()),
        );
        let settings = config.settings().unwrap();
        assert_eq!(settings.server_url, "https://parse.example.com/parse");
        assert!(config.is_complete());
    }

    #[test]
    fn production_switches_to_json_logs() {
        let mut app = AppConfig {
            host: "127.0.0.1".into(),
            port: 8000,
            environment: "development".into(),
            rust_log: "info".into(),
        };
        assert!(!app.json_logs());
        app.environment = "Production".into();
        assert!(app.json_logs());
    }
}
