use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::{BusyFlag, PageCell, PageState};
use crate::backend::{ObjectQuery, RemoteBackend, EVENT_CLASS};
use crate::error::{AppError, AppResult};
use crate::mapper;
use crate::models::{Event, Identity, RawEvent};
use crate::session::SessionStore;
use crate::AppState;

pub const REGISTERED_MESSAGE: &str = "Successfully registered for the event!";
pub const PAST_EVENT_MESSAGE: &str = "This event has already passed. Registration is no longer available.";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/{id}", get(event_page))
        .route("/events/{id}/register", post(register_for_event))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    pub event: Event,
    pub is_past: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationOutcome {
    pub message: String,
    pub page: PageState<EventDetails>,
}

/// Страница регистрации на одно событие.
pub struct RegisterController {
    backend: Arc<dyn RemoteBackend>,
    session: Arc<SessionStore>,
    page: PageCell<EventDetails>,
    registering: BusyFlag,
}

impl RegisterController {
    pub fn new(backend: Arc<dyn RemoteBackend>, session: Arc<SessionStore>) -> Self {
        Self {
            backend,
            session,
            page: PageCell::default(),
            registering: BusyFlag::default(),
        }
    }

    fn attendee(&self) -> AppResult<Identity> {
        let identity = self
            .session
            .current()
            .ok_or_else(|| AppError::Unauthorized("Please log in to register for events".to_string()))?;
        if !identity.is_attendee() {
            return Err(AppError::Forbidden("Only attendees can register for events.".to_string()));
        }
        Ok(identity)
    }

    async fn fetch(&self, event_id: &str) -> AppResult<EventDetails> {
        self.backend.ensure_configured()?;
        let query = ObjectQuery::new().include("organizer");
        let value = self
            .backend
            .get_object(EVENT_CLASS, event_id, &query)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound("Event not found".to_string()),
                other => other,
            })?;
        let raw: RawEvent = serde_json::from_value(value)?;
        if raw.organizer.is_none() {
            warn!("Organizer of event {} is not accessible, using fallback", event_id);
        }

        let now = Utc::now();
        let event = mapper::map_event(&raw, now);
        Ok(EventDetails {
            is_past: event.is_past(now),
            event,
        })
    }

    pub async fn load(&self, event_id: &str) -> AppResult<PageState<EventDetails>> {
        self.attendee()?;
        self.page.begin();
        let result = self.fetch(event_id).await;
        if let Err(e) = &result {
            warn!("Load event {} error: {}", event_id, e);
        }
        Ok(self.page.finish(result))
    }

    pub async fn register(&self, event_id: &str) -> AppResult<RegistrationOutcome> {
        let _guard = self.registering.try_acquire("Registration")?;
        let identity = self.attendee()?;
        self.backend.ensure_configured()?;

        // регистрируемся только на то событие, которое сейчас показано
        let details = match self.page.snapshot() {
            PageState::Ready(details) if details.event.id == event_id => details,
            _ => match self.load(event_id).await? {
                PageState::Ready(details) => details,
                PageState::Error(message) => return Err(AppError::Remote(message)),
                _ => return Err(AppError::Internal("Event page did not load".to_string())),
            },
        };
        if details.event.is_past(Utc::now()) {
            return Err(AppError::Validation(PAST_EVENT_MESSAGE.to_string()));
        }

        self.backend
            .run_function(
                "registerForEvent",
                json!({ "attendeeId": identity.id, "eventId": details.event.id }),
            )
            .await?
            .into_result("Registration failed")?;
        info!("{} registered for event {}", identity.username, event_id);

        let page = self.load(event_id).await?;
        Ok(RegistrationOutcome {
            message: REGISTERED_MESSAGE.to_string(),
            page,
        })
    }
}

/* ---------- HTTP ---------- */

// GET /api/events/{id}
async fn event_page(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<Json<PageState<EventDetails>>> {
    Ok(Json(state.registration.load(&event_id).await?))
}

// POST /api/events/{id}/register
async fn register_for_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<Json<RegistrationOutcome>> {
    Ok(Json(state.registration.register(&event_id).await?))
}
