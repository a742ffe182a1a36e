use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::{BusyFlag, PageCell, PageState};
use crate::backend::{pointer, ObjectQuery, RemoteBackend, EVENT_CLASS, REGISTRATION_CLASS, USER_CLASS};
use crate::error::{AppError, AppResult};
use crate::mapper;
use crate::models::{Event, Identity, RawEvent, RawUpcomingRegistration, UpcomingRegistration};
use crate::session::SessionStore;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(home_page))
        .route("/registrations/cancel", post(cancel_registration))
}

/// Главная страница: все события и, для участника, его предстоящие регистрации.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomePage {
    pub identity: Identity,
    pub events: PageState<Vec<Event>>,
    pub upcoming: PageState<Vec<UpcomingRegistration>>,
}

pub struct HomeController {
    backend: Arc<dyn RemoteBackend>,
    session: Arc<SessionStore>,
    events: PageCell<Vec<Event>>,
    upcoming: PageCell<Vec<UpcomingRegistration>>,
    canceling: BusyFlag,
}

impl HomeController {
    pub fn new(backend: Arc<dyn RemoteBackend>, session: Arc<SessionStore>) -> Self {
        Self {
            backend,
            session,
            events: PageCell::default(),
            upcoming: PageCell::default(),
            canceling: BusyFlag::default(),
        }
    }

    fn identity(&self) -> AppResult<Identity> {
        self.session
            .current()
            .ok_or_else(|| AppError::Unauthorized("Please log in to see events".to_string()))
    }

    fn snapshot(&self, identity: Identity) -> HomePage {
        HomePage {
            identity,
            events: self.events.snapshot(),
            upcoming: self.upcoming.snapshot(),
        }
    }

    async fn fetch_events(&self) -> AppResult<Vec<Event>> {
        self.backend.ensure_configured()?;
        let query = ObjectQuery::new().include("organizer").descending("createdAt");
        let raw = self
            .backend
            .find_objects(EVENT_CLASS, &query)
            .await?
            .into_iter()
            .map(serde_json::from_value::<RawEvent>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(mapper::map_events(&raw, Utc::now()))
    }

    async fn fetch_upcoming(&self) -> AppResult<Vec<UpcomingRegistration>> {
        self.backend.ensure_configured()?;
        let result = self
            .backend
            .run_function("listUpcomingEvents", json!({}))
            .await?
            .into_result("Failed to load upcoming events")?;
        let raw: Vec<RawUpcomingRegistration> = result.field("upcomingEvents")?.unwrap_or_default();
        let now = Utc::now();
        Ok(raw.iter().map(|r| mapper::map_upcoming(r, now)).collect())
    }

    async fn refresh_upcoming(&self) {
        self.upcoming.begin();
        let result = self.fetch_upcoming().await;
        if let Err(e) = &result {
            warn!("Load upcoming registrations error: {}", e);
        }
        self.upcoming.finish(result);
    }

    /// Полная загрузка страницы. Ошибки загрузки сохраняются в состоянии страницы.
    pub async fn load(&self) -> AppResult<HomePage> {
        let identity = self.identity()?;

        if identity.is_attendee() {
            self.reload_with_upcoming().await;
        } else {
            self.events.begin();
            self.upcoming.reset();
            let events = self.fetch_events().await;
            if let Err(e) = &events {
                warn!("Load events error: {}", e);
            }
            self.events.finish(events);
        }

        Ok(self.snapshot(identity))
    }

    /// События и предстоящие регистрации участника загружаются параллельно.
    async fn reload_with_upcoming(&self) {
        self.events.begin();
        let (events, _) = futures::join!(self.fetch_events(), self.refresh_upcoming());
        if let Err(e) = &events {
            warn!("Load events error: {}", e);
        }
        self.events.finish(events);
    }

    pub fn page(&self) -> AppResult<HomePage> {
        Ok(self.snapshot(self.identity()?))
    }

    /// Прямое изменение записи регистрации (дешёвый путь).
    async fn cancel_directly(&self, identity: &Identity, event_id: &str) -> AppResult<()> {
        let query = ObjectQuery::new()
            .equal_to("event", pointer(EVENT_CLASS, event_id))
            .equal_to("attendee", pointer(USER_CLASS, &identity.id))
            .equal_to("status", json!("registered"))
            .limit(1);
        let found = self.backend.find_objects(REGISTRATION_CLASS, &query).await?;
        let registration_id = found
            .first()
            .and_then(|r| r.get("objectId"))
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::NotFound("Active registration not found".to_string()))?;

        self.backend
            .save_object(
                REGISTRATION_CLASS,
                Some(&registration_id),
                json!({ "status": "canceled", "registered": false }),
            )
            .await?;
        Ok(())
    }

    /// Отмена регистрации: сначала прямое изменение записи, при ошибке -
    /// облачная функция `cancelEventRegistration`. Затем страница загружается заново.
    pub async fn cancel_registration(&self, event_id: &str) -> AppResult<HomePage> {
        let _guard = self.canceling.try_acquire("Cancellation")?;
        let identity = self.identity()?;
        if !identity.is_attendee() {
            return Err(AppError::Forbidden("Only attendees can cancel registrations.".to_string()));
        }
        if event_id.trim().is_empty() {
            return Err(AppError::Validation("Event id is required".to_string()));
        }
        self.backend.ensure_configured()?;

        match self.cancel_directly(&identity, event_id).await {
            Ok(()) => info!("Registration for event {} canceled directly", event_id),
            Err(e) => {
                warn!(
                    "Direct cancellation for event {} failed ({}), falling back to cloud function",
                    event_id, e
                );
                self.backend
                    .run_function("cancelEventRegistration", json!({ "eventId": event_id }))
                    .await?
                    .into_result("Failed to cancel registration")?;
                info!("Registration for event {} canceled via cloud function", event_id);
            }
        }

        self.reload_with_upcoming().await;
        Ok(self.snapshot(identity))
    }
}

/* ---------- HTTP ---------- */

// GET /api/events
async fn home_page(State(state): State<Arc<AppState>>) -> AppResult<Json<HomePage>> {
    Ok(Json(state.home.load().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelRequest {
    event_id: String,
}

// POST /api/registrations/cancel
async fn cancel_registration(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CancelRequest>,
) -> AppResult<Json<HomePage>> {
    Ok(Json(state.home.cancel_registration(&req.event_id).await?))
}
