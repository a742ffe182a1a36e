use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, RwLock};
use tracing::{error, info, warn};

use crate::backend::RemoteBackend;
use crate::error::AppResult;
use crate::mapper;
use crate::models::{Identity, Role};

/// Данные регистрации, уже прошедшие проверку формы.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupData {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Текущий пользователь процесса.
///
/// Создаётся один раз при старте и передаётся всем потребителям через `Arc`.
/// Пишет в него только сам `SessionStore`.
pub struct SessionStore {
    backend: Arc<dyn RemoteBackend>,
    current: RwLock<Option<Identity>>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            backend,
            current: RwLock::new(None),
        }
    }

    /// Текущий пользователь. Если бэкенд потерял токен (сервер отклонил сессию),
    /// пользователь тоже сбрасывается.
    pub fn current(&self) -> Option<Identity> {
        let identity = match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if identity.is_some() && !self.backend.has_session() {
            warn!("Session is no longer valid, clearing current user");
            self.replace(None);
            return None;
        }
        identity
    }

    fn replace(&self, identity: Option<Identity>) {
        match self.current.write() {
            Ok(mut guard) => *guard = identity,
            Err(poisoned) => *poisoned.into_inner() = identity,
        }
    }

    /// Восстановление сохранённого пользователя при старте. Ошибки только логируются.
    pub async fn restore(&self) {
        match self.backend.current_user().await {
            Ok(Some(raw)) => {
                let identity = mapper::map_user(&raw, Utc::now());
                info!("Restored session for {}", identity.username);
                self.replace(Some(identity));
            }
            Ok(None) => {
                info!("No saved session found");
                self.replace(None);
            }
            Err(e) => {
                error!("Error checking current user: {}", e);
                self.replace(None);
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> AppResult<Identity> {
        self.backend.ensure_configured()?;
        let raw = self.backend.log_in(username, password).await.map_err(|e| {
            warn!("Login error for {}: {}", username, e);
            e
        })?;
        let identity = mapper::map_user(&raw, Utc::now());
        self.replace(Some(identity.clone()));
        Ok(identity)
    }

    /// Регистрация через облачную функцию `createUser`, затем обычный вход.
    pub async fn signup(&self, data: &SignupData) -> AppResult<Identity> {
        self.backend.ensure_configured()?;

        let result = self
            .backend
            .run_function(
                "createUser",
                json!({
                    "username": data.username,
                    "email": data.email,
                    "password": data.password,
                    "role": data.role.as_str(),
                }),
            )
            .await
            .and_then(|result| result.into_result("Signup failed"));

        if let Err(e) = result {
            warn!("Signup error for {}: {}", data.username, e);
            return Err(e);
        }

        info!("User {} created with role {}", data.username, data.role);
        self.login(&data.username, &data.password).await
    }

    /// Локальная сессия очищается в любом случае; ошибка сервера возвращается вызывающему.
    pub async fn logout(&self) -> AppResult<()> {
        let result = self.backend.log_out().await;
        self.replace(None);
        if let Err(e) = &result {
            warn!("Logout error (local session cleared anyway): {}", e);
        }
        result
    }
}
