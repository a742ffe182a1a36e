#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use event_manager::backend::{FunctionResult, ObjectQuery, RemoteBackend, SavedObject};
use event_manager::config::{AppConfig, Config, ParseConfig, PosterConfig};
use event_manager::error::{AppError, AppResult};
use event_manager::models::{RawFile, RawUser};
use event_manager::AppState;

/// Бэкенд в памяти, который ведёт себя как облачные функции Parse.
#[derive(Default)]
pub struct FakeBackend {
    pub unconfigured: bool,
    pub calls: Mutex<Vec<String>>,
    pub users: Mutex<Vec<(RawUser, String)>>,
    pub events: Mutex<Vec<Value>>,
    pub registrations: Mutex<Vec<Value>>,
    pub uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
    pub logged_in: Mutex<Option<RawUser>>,
    pub persisted: Mutex<Option<RawUser>>,
    pub persisted_malformed: AtomicBool,
    pub deny_direct_save: AtomicBool,
    pub fail_logout: AtomicBool,
    pub upload_delay_secs: AtomicUsize,
    /// Вырезать организатора из событий (как делает ACL).
    pub redact_organizer: AtomicBool,
    counter: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unconfigured() -> Arc<Self> {
        Arc::new(Self {
            unconfigured: true,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == name).count()
    }

    /// Сервер отклонил токен (код 209).
    pub fn expire_session(&self) {
        *self.logged_in.lock().unwrap() = None;
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Каждый сетевой вызов попадает в журнал, даже если дальше он упадёт.
    fn record(&self, call: String) -> AppResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.unconfigured {
            return Err(configuration_error());
        }
        Ok(())
    }

    pub fn add_user(&self, username: &str, password: &str, role: &str) -> RawUser {
        let user = RawUser {
            object_id: Some(self.next_id("u")),
            username: Some(username.to_string()),
            email: Some(format!("{}@example.com", username)),
            role: Some(role.to_string()),
            created_at: Some(Utc::now().into()),
            ..Default::default()
        };
        self.users.lock().unwrap().push((user.clone(), password.to_string()));
        user
    }

    pub fn add_event(&self, title: &str, organizer: &RawUser, days_from_now: i64) -> String {
        let id = self.next_id("ev");
        let date = (Utc::now() + Duration::days(days_from_now)).to_rfc3339();
        self.events.lock().unwrap().push(json!({
            "objectId": id,
            "title": title,
            "location": "Almaty",
            "date": { "__type": "Date", "iso": date },
            "organizer": serde_json::to_value(organizer).unwrap(),
            "createdAt": Utc::now().to_rfc3339(),
        }));
        id
    }

    pub fn add_registration(&self, event_id: &str, attendee_id: &str) {
        let id = self.next_id("reg");
        self.registrations.lock().unwrap().push(json!({
            "objectId": id,
            "event": { "__type": "Pointer", "className": "Event", "objectId": event_id },
            "attendee": { "__type": "Pointer", "className": "_User", "objectId": attendee_id },
            "status": "registered",
            "registered": true,
        }));
    }

    pub fn active_registrations(&self) -> usize {
        self.registrations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r["status"] == "registered")
            .count()
    }

    fn event_json(&self, event_id: &str) -> Option<Value> {
        let mut event = self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e["objectId"] == event_id)
            .cloned()?;
        if self.redact_organizer.load(Ordering::SeqCst) {
            event["organizer"] = Value::Null;
        }
        Some(event)
    }

    fn current_user_id(&self) -> Option<String> {
        self.logged_in.lock().unwrap().as_ref().and_then(|u| u.object_id.clone())
    }

    fn pointer_id(value: &Value) -> Option<&str> {
        value.get("objectId").and_then(Value::as_str)
    }

    fn matches(filter: &Map<String, Value>, record: &Value) -> bool {
        filter.iter().all(|(key, expected)| match expected.get("objectId") {
            Some(id) => record.get(key).and_then(Self::pointer_id) == id.as_str(),
            None => record.get(key) == Some(expected),
        })
    }

    fn run(&self, name: &str, params: &Value) -> FunctionResult {
        match name {
            "createUser" => {
                let username = params["username"].as_str().unwrap_or_default();
                if self
                    .users
                    .lock()
                    .unwrap()
                    .iter()
                    .any(|(u, _)| u.username.as_deref() == Some(username))
                {
                    return FunctionResult::failed("Account already exists for this username.");
                }
                self.add_user(
                    username,
                    params["password"].as_str().unwrap_or_default(),
                    params["role"].as_str().unwrap_or_default(),
                );
                FunctionResult::ok("User created")
            }
            "createEvent" => {
                let organizer_id = params["organizerId"].as_str().unwrap_or_default();
                let organizer = self
                    .users
                    .lock()
                    .unwrap()
                    .iter()
                    .find(|(u, _)| u.object_id.as_deref() == Some(organizer_id))
                    .map(|(u, _)| serde_json::to_value(u).unwrap())
                    .unwrap_or(Value::Null);
                let id = self.next_id("ev");
                let mut event = json!({
                    "objectId": id,
                    "title": params["title"],
                    "location": params["location"],
                    "date": { "__type": "Date", "iso": params["date"] },
                    "attendees": [],
                    "organizer": organizer,
                    "createdAt": Utc::now().to_rfc3339(),
                });
                if let Some(poster) = params.get("eventPosterImage") {
                    event["eventPosterImage"] = poster.clone();
                }
                self.events.lock().unwrap().push(event);
                FunctionResult::ok("Event created").with("eventId", json!(id))
            }
            "registerForEvent" => {
                let event_id = params["eventId"].as_str().unwrap_or_default();
                let attendee_id = params["attendeeId"].as_str().unwrap_or_default();
                if self.event_json(event_id).is_none() {
                    return FunctionResult::failed("Event not found");
                }
                self.add_registration(event_id, attendee_id);
                FunctionResult::ok("Registered")
            }
            "cancelEventRegistration" => {
                let event_id = params["eventId"].as_str().unwrap_or_default();
                let user_id = self.current_user_id().unwrap_or_default();
                let mut registrations = self.registrations.lock().unwrap();
                match registrations.iter_mut().find(|r| {
                    Self::pointer_id(&r["event"]) == Some(event_id)
                        && Self::pointer_id(&r["attendee"]) == Some(user_id.as_str())
                        && r["status"] == "registered"
                }) {
                    Some(registration) => {
                        registration["status"] = json!("canceled");
                        registration["registered"] = json!(false);
                        FunctionResult::ok("Registration canceled")
                    }
                    None => FunctionResult::failed("No active registration for this event"),
                }
            }
            "listUpcomingEvents" => {
                let user_id = self.current_user_id().unwrap_or_default();
                let registrations = self.registrations.lock().unwrap().clone();
                let upcoming: Vec<Value> = registrations
                    .iter()
                    .filter(|r| {
                        Self::pointer_id(&r["attendee"]) == Some(user_id.as_str())
                            && r["status"] == "registered"
                    })
                    .filter_map(|r| {
                        let event = self.event_json(Self::pointer_id(&r["event"])?)?;
                        Some(json!({
                            "registrationId": r["objectId"],
                            "registrationDate": Utc::now().to_rfc3339(),
                            "event": event,
                            "status": r["status"],
                            "registered": r["registered"],
                        }))
                    })
                    .collect();
                FunctionResult::ok("Upcoming events").with("upcomingEvents", Value::Array(upcoming))
            }
            other => FunctionResult::failed(&format!("Unknown function {}", other)),
        }
    }
}

pub fn configuration_error() -> AppError {
    AppError::Configuration("PARSE_APPLICATION_ID, PARSE_JAVASCRIPT_KEY, PARSE_SERVER_URL".to_string())
}

#[async_trait]
impl RemoteBackend for FakeBackend {
    fn ensure_configured(&self) -> AppResult<()> {
        if self.unconfigured {
            Err(configuration_error())
        } else {
            Ok(())
        }
    }

    fn has_session(&self) -> bool {
        self.logged_in.lock().unwrap().is_some()
    }

    async fn get_object(&self, class_name: &str, object_id: &str, _query: &ObjectQuery) -> AppResult<Value> {
        self.record(format!("get:{}", class_name))?;
        match class_name {
            "Event" => self
                .event_json(object_id)
                .ok_or_else(|| AppError::NotFound("Object not found.".to_string())),
            _ => Err(AppError::NotFound("Object not found.".to_string())),
        }
    }

    async fn find_objects(&self, class_name: &str, query: &ObjectQuery) -> AppResult<Vec<Value>> {
        self.record(format!("find:{}", class_name))?;
        let records: Vec<Value> = match class_name {
            "Event" => {
                let ids: Vec<String> = self
                    .events
                    .lock()
                    .unwrap()
                    .iter()
                    .rev()
                    .filter_map(|e| e["objectId"].as_str().map(str::to_string))
                    .collect();
                ids.iter().filter_map(|id| self.event_json(id)).collect()
            }
            "Registration" => self.registrations.lock().unwrap().clone(),
            "_User" => self
                .users
                .lock()
                .unwrap()
                .iter()
                .map(|(u, _)| serde_json::to_value(u).unwrap())
                .collect(),
            _ => Vec::new(),
        };
        let mut found: Vec<Value> = records
            .into_iter()
            .filter(|r| Self::matches(&query.filter, r))
            .collect();
        if let Some(limit) = query.limit {
            found.truncate(limit as usize);
        }
        Ok(found)
    }

    async fn save_object(&self, class_name: &str, object_id: Option<&str>, fields: Value) -> AppResult<SavedObject> {
        self.record(format!("save:{}", class_name))?;
        if self.deny_direct_save.load(Ordering::SeqCst) {
            return Err(AppError::Remote("Permission denied for action update on class Registration.".into()));
        }
        let id = object_id.ok_or_else(|| AppError::Remote("Creating objects is not supported".into()))?;
        let mut registrations = self.registrations.lock().unwrap();
        let record = registrations
            .iter_mut()
            .find(|r| r["objectId"] == id)
            .ok_or_else(|| AppError::NotFound("Object not found.".into()))?;
        if let (Some(target), Some(update)) = (record.as_object_mut(), fields.as_object()) {
            for (key, value) in update {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(SavedObject {
            object_id: Some(id.to_string()),
            created_at: None,
            updated_at: Some(Utc::now().to_rfc3339()),
        })
    }

    async fn upload_file(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> AppResult<RawFile> {
        self.record("upload".to_string())?;
        let delay = self.upload_delay_secs.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_secs(delay as u64)).await;
        }
        self.uploads
            .lock()
            .unwrap()
            .push((name.to_string(), content_type.to_string(), bytes));
        Ok(RawFile {
            name: format!("abc123_{}", name),
            url: format!("https://files.example.com/abc123_{}", name),
        })
    }

    async fn run_function(&self, name: &str, params: Value) -> AppResult<FunctionResult> {
        self.record(format!("fn:{}", name))?;
        Ok(self.run(name, &params))
    }

    async fn log_in(&self, username: &str, password: &str) -> AppResult<RawUser> {
        self.record("login".to_string())?;
        let user = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|(u, p)| u.username.as_deref() == Some(username) && p == password)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| AppError::Unauthorized("Invalid username/password.".to_string()))?;
        *self.logged_in.lock().unwrap() = Some(user.clone());
        Ok(user)
    }

    async fn log_out(&self) -> AppResult<()> {
        self.record("logout".to_string())?;
        *self.logged_in.lock().unwrap() = None;
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(AppError::Remote("Network request failed".to_string()));
        }
        Ok(())
    }

    async fn current_user(&self) -> AppResult<Option<RawUser>> {
        if self.persisted_malformed.load(Ordering::SeqCst) {
            return Err(AppError::Serialization(
                serde_json::from_str::<Value>("{broken").unwrap_err(),
            ));
        }
        let user = self.persisted.lock().unwrap().clone();
        if user.is_some() {
            *self.logged_in.lock().unwrap() = user.clone();
        }
        Ok(user)
    }
}

pub fn test_config() -> Config {
    Config {
        app: AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            rust_log: "event_manager=debug".to_string(),
        },
        parse: ParseConfig::new(
            Some("app-id".to_string()),
            Some("js-key".to_string()),
            Some("http://localhost:1337/parse".to_string()),
        ),
        poster: PosterConfig::default(),
    }
}

pub fn state_with(backend: Arc<FakeBackend>) -> Arc<AppState> {
    AppState::with_backend(test_config(), backend)
}

/// Войти через хранилище сессии под новым пользователем.
pub async fn logged_in_as(state: &AppState, backend: &FakeBackend, username: &str, role: &str) -> RawUser {
    let user = backend.add_user(username, "secret1", role);
    state.session.login(username, "secret1").await.unwrap();
    user
}
