//! Граница с удалённым бэкендом (Parse Server).
//!
//! Контроллеры и хранилище сессии работают только через трейт `RemoteBackend`,
//! поэтому в тестах его можно заменить реализацией в памяти.

pub mod parse;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{AppError, AppResult};
use crate::models::{RawFile, RawUser};

pub use parse::ParseClient;

pub const USER_CLASS: &str = "_User";
pub const EVENT_CLASS: &str = "Event";
pub const REGISTRATION_CLASS: &str = "Registration";

/// Параметры запроса к коллекции: фильтр, `include` одной связи, сортировка, лимит.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectQuery {
    pub filter: Map<String, Value>,
    pub include: Option<String>,
    pub order: Option<String>,
    pub limit: Option<u32>,
}

impl ObjectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equal_to(mut self, key: &str, value: Value) -> Self {
        self.filter.insert(key.to_string(), value);
        self
    }

    pub fn include(mut self, relation: &str) -> Self {
        self.include = Some(relation.to_string());
        self
    }

    pub fn descending(mut self, key: &str) -> Self {
        self.order = Some(format!("-{}", key));
        self
    }

    pub fn ascending(mut self, key: &str) -> Self {
        self.order = Some(key.to_string());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Пары для строки запроса REST API.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.filter.is_empty() {
            params.push(("where", Value::Object(self.filter.clone()).to_string()));
        }
        if let Some(include) = &self.include {
            params.push(("include", include.clone()));
        }
        if let Some(order) = &self.order {
            params.push(("order", order.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

/// Указатель на объект для фильтров и связей.
pub fn pointer(class_name: &str, object_id: &str) -> Value {
    json!({ "__type": "Pointer", "className": class_name, "objectId": object_id })
}

/// Результат сохранения объекта.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedObject {
    pub object_id: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Ответ облачной функции: `{ success, message, ...доп. поля }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FunctionResult {
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            extra: Map::new(),
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            extra: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// Неуспешный ответ превращается в `AppError::Remote` с сообщением сервера,
    /// а если сервер его не дал - с `fallback`.
    pub fn into_result(self, fallback: &str) -> AppResult<Self> {
        if self.success {
            Ok(self)
        } else if self.message.trim().is_empty() {
            Err(AppError::Remote(fallback.to_string()))
        } else {
            Err(AppError::Remote(self.message))
        }
    }

    /// Дополнительное поле ответа, разобранное в нужный тип. Нет поля - `None`.
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        match self.extra.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }
}

#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Проверка параметров подключения. Вызывается до любого сетевого запроса.
    fn ensure_configured(&self) -> AppResult<()>;

    /// Есть ли действующий токен сессии.
    fn has_session(&self) -> bool;

    async fn get_object(&self, class_name: &str, object_id: &str, query: &ObjectQuery) -> AppResult<Value>;

    async fn find_objects(&self, class_name: &str, query: &ObjectQuery) -> AppResult<Vec<Value>>;

    /// Создаёт объект (`object_id == None`) или обновляет существующий.
    async fn save_object(&self, class_name: &str, object_id: Option<&str>, fields: Value) -> AppResult<SavedObject>;

    async fn upload_file(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> AppResult<RawFile>;

    async fn run_function(&self, name: &str, params: Value) -> AppResult<FunctionResult>;

    async fn log_in(&self, username: &str, password: &str) -> AppResult<RawUser>;

    async fn log_out(&self) -> AppResult<()>;

    /// Ранее сохранённый пользователь, если он есть.
    async fn current_user(&self) -> AppResult<Option<RawUser>>;
}
