//! parse.rs
//!
//! Клиент REST API Parse Server.
//!
//! Ключевые моменты:
//! 1.  **Проверка конфигурации**: без всех трёх параметров подключения клиент
//!     создаётся, но каждая операция сразу возвращает `AppError::Configuration`
//!     и не делает ни одного сетевого запроса.
//! 2.  **Сессия**: токен сессии хранится в памяти и дублируется в JSON-файл,
//!     чтобы `current_user` восстановил пользователя после перезапуска.
//! 3.  **Ошибки**: тело `{code, error}` разбирается в `NotFound`/`Remote`,
//!     сетевые сбои становятся `Transport`.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ObjectQuery, RemoteBackend, SavedObject, FunctionResult, USER_CLASS};
use crate::config::{ParseConfig, ParseSettings};
use crate::error::{AppError, AppResult};
use crate::models::{RawFile, RawUser};

/// Код Parse "Object not found".
const OBJECT_NOT_FOUND: i64 = 101;
/// Код Parse "Invalid session token".
const INVALID_SESSION_TOKEN: i64 = 209;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<i64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct FunctionResponse {
    result: Option<FunctionResult>,
}

pub struct ParseClient {
    /// `None`, если не хватает параметров подключения.
    settings: Option<ParseSettings>,
    missing: Vec<&'static str>,
    http_client: reqwest::Client,
    session_token: RwLock<Option<String>>,
    session_file: PathBuf,
}

impl ParseClient {
    pub fn from_config(config: &ParseConfig) -> AppResult<Self> {
        let settings = config.settings().ok();
        let missing = config.missing();
        if settings.is_none() {
            warn!(
                "Parse configuration is incomplete ({}); remote operations will be refused",
                missing.join(", ")
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            settings,
            missing,
            http_client,
            session_token: RwLock::new(None),
            session_file: config.session_file.clone(),
        })
    }

    fn settings(&self) -> AppResult<&ParseSettings> {
        self.settings
            .as_ref()
            .ok_or_else(|| AppError::Configuration(self.missing.join(", ")))
    }

    fn token(&self) -> Option<String> {
        match self.session_token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_token(&self, token: Option<String>) {
        match self.session_token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    fn class_path(class_name: &str) -> String {
        if class_name == USER_CLASS {
            "users".to_string()
        } else {
            format!("classes/{}", class_name)
        }
    }

    /// Имена файлов в Parse допускают только `[A-Za-z0-9_.-]`.
    pub fn sanitize_file_name(name: &str) -> String {
        let cleaned: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') { c } else { '_' })
            .collect();
        if cleaned.trim_matches(|c| c == '_' || c == '.').is_empty() {
            "poster.jpg".to_string()
        } else {
            cleaned
        }
    }

    fn request(&self, method: Method, path: &str) -> AppResult<RequestBuilder> {
        let settings = self.settings()?;
        let mut builder = self
            .http_client
            .request(method, format!("{}/{}", settings.server_url, path))
            .header("X-Parse-Application-Id", &settings.application_id)
            .header("X-Parse-JavaScript-Key", &settings.javascript_key);

        if let Some(token) = self.token() {
            builder = builder.header("X-Parse-Session-Token", token);
        }
        Ok(builder)
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> AppResult<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(serde_json::from_slice(&body)?);
        }

        let parsed: Option<ErrorBody> = serde_json::from_slice(&body).ok();
        let (code, message) = match parsed {
            Some(ErrorBody { code, error }) => (
                code,
                error.unwrap_or_else(|| format!("Request failed with status {}", status.as_u16())),
            ),
            None => (None, format!("Request failed with status {}", status.as_u16())),
        };
        debug!("Parse request failed: status={}, code={:?}, message={}", status, code, message);

        match code {
            Some(OBJECT_NOT_FOUND) => Err(AppError::NotFound(message)),
            Some(INVALID_SESSION_TOKEN) => {
                warn!("Session token rejected by server, forgetting saved session");
                self.forget_session().await;
                Err(AppError::Unauthorized(message))
            }
            _ => Err(AppError::Remote(message)),
        }
    }

    async fn persist_session(&self, user: &RawUser) {
        match serde_json::to_vec(user) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&self.session_file, bytes).await {
                    warn!("Failed to persist session to {}: {}", self.session_file.display(), e);
                }
            }
            Err(e) => warn!("Failed to serialize session: {}", e),
        }
    }

    async fn forget_session(&self) {
        self.set_token(None);
        match tokio::fs::remove_file(&self.session_file).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove session file {}: {}", self.session_file.display(), e),
        }
    }
}

#[async_trait]
impl RemoteBackend for ParseClient {
    fn ensure_configured(&self) -> AppResult<()> {
        self.settings().map(|_| ())
    }

    fn has_session(&self) -> bool {
        self.token().is_some()
    }

    async fn get_object(&self, class_name: &str, object_id: &str, query: &ObjectQuery) -> AppResult<Value> {
        let path = format!("{}/{}", Self::class_path(class_name), object_id);
        let builder = self.request(Method::GET, &path)?.query(&query.to_params());
        self.execute(builder).await
    }

    async fn find_objects(&self, class_name: &str, query: &ObjectQuery) -> AppResult<Vec<Value>> {
        let builder = self
            .request(Method::GET, &Self::class_path(class_name))?
            .query(&query.to_params());
        let response: FindResponse = self.execute(builder).await?;
        Ok(response.results)
    }

    async fn save_object(&self, class_name: &str, object_id: Option<&str>, fields: Value) -> AppResult<SavedObject> {
        let builder = match object_id {
            Some(id) => self.request(Method::PUT, &format!("{}/{}", Self::class_path(class_name), id))?,
            None => self.request(Method::POST, &Self::class_path(class_name))?,
        };
        let mut saved: SavedObject = self.execute(builder.json(&fields)).await?;
        if saved.object_id.is_none() {
            saved.object_id = object_id.map(str::to_string);
        }
        Ok(saved)
    }

    async fn upload_file(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> AppResult<RawFile> {
        let file_name = Self::sanitize_file_name(name);
        info!("Uploading file {} ({} bytes, {})", file_name, bytes.len(), content_type);
        let builder = self
            .request(Method::POST, &format!("files/{}", file_name))?
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        self.execute(builder).await
    }

    async fn run_function(&self, name: &str, params: Value) -> AppResult<FunctionResult> {
        debug!("Running cloud function {}", name);
        let builder = self
            .request(Method::POST, &format!("functions/{}", name))?
            .json(&params);
        let response: FunctionResponse = self.execute(builder).await?;
        response
            .result
            .ok_or_else(|| AppError::Remote(format!("Cloud function {} returned no result", name)))
    }

    async fn log_in(&self, username: &str, password: &str) -> AppResult<RawUser> {
        // вход не должен уходить со старым токеном; при неудаче прежняя сессия остаётся
        let previous = self.token();
        self.set_token(None);
        let builder = match self.request(Method::POST, "login") {
            Ok(builder) => builder
                .header("X-Parse-Revocable-Session", "1")
                .json(&json!({ "username": username, "password": password })),
            Err(e) => {
                self.set_token(previous);
                return Err(e);
            }
        };

        let user: RawUser = match self.execute(builder).await {
            Ok(user) => user,
            Err(e) => {
                self.set_token(previous);
                return Err(match e {
                    // Parse отвечает кодом 101 и на неверный пароль
                    AppError::NotFound(message) => AppError::Unauthorized(message),
                    other => other,
                });
            }
        };

        self.set_token(user.session_token.clone());
        self.persist_session(&user).await;
        info!("Logged in as {}", user.username.as_deref().unwrap_or_default());
        Ok(user)
    }

    async fn log_out(&self) -> AppResult<()> {
        let result = match self.token() {
            Some(_) => match self.request(Method::POST, "logout") {
                Ok(builder) => self.execute::<Value>(builder).await.map(|_| ()),
                Err(e) => Err(e),
            },
            None => Ok(()),
        };
        self.forget_session().await;
        result
    }

    async fn current_user(&self) -> AppResult<Option<RawUser>> {
        let bytes = match tokio::fs::read(&self.session_file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Internal(format!("Cannot read session file: {}", e))),
        };

        let user: RawUser = serde_json::from_slice(&bytes)?;
        if user.session_token.is_none() {
            return Ok(None);
        }
        self.set_token(user.session_token.clone());
        Ok(Some(user))
    }
}
