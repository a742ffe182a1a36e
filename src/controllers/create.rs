use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use super::BusyFlag;
use crate::backend::{ObjectQuery, RemoteBackend, USER_CLASS};
use crate::config::PosterConfig;
use crate::error::{AppError, AppResult};
use crate::forms::CreateEventForm;
use crate::models::{Identity, RawFile};
use crate::poster::{self, PosterFile};
use crate::session::SessionStore;
use crate::AppState;

pub const CONNECTION_FAILED_MESSAGE: &str =
    "Unable to connect to Parse Server. Please check your configuration.";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", post(create_event))
        .route("/connection", get(test_connection))
}

/// Куда перейти после успешного действия.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Navigation {
    Listing,
}

impl Navigation {
    pub fn path(&self) -> &'static str {
        match self {
            Navigation::Listing => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub message: String,
}

/// Страница создания события (только для организаторов).
pub struct CreateEventController {
    backend: Arc<dyn RemoteBackend>,
    session: Arc<SessionStore>,
    poster: PosterConfig,
    creating: BusyFlag,
}

impl CreateEventController {
    pub fn new(backend: Arc<dyn RemoteBackend>, session: Arc<SessionStore>, poster: PosterConfig) -> Self {
        Self {
            backend,
            session,
            poster,
            creating: BusyFlag::default(),
        }
    }

    fn organizer(&self) -> AppResult<Identity> {
        let identity = self
            .session
            .current()
            .ok_or_else(|| AppError::Unauthorized("User not authenticated".to_string()))?;
        if !identity.is_organizer() {
            return Err(AppError::Forbidden("Only organizers can create events.".to_string()));
        }
        Ok(identity)
    }

    async fn probe(&self) -> AppResult<()> {
        self.backend.ensure_configured()?;
        self.backend
            .find_objects(USER_CLASS, &ObjectQuery::new().limit(1))
            .await
            .map(|_| ())
    }

    pub async fn test_connection(&self) -> ConnectionStatus {
        match self.probe().await {
            Ok(()) => ConnectionStatus {
                connected: true,
                message: "Connection successful!".to_string(),
            },
            Err(e) => {
                error!("Connection test failed: {}", e);
                ConnectionStatus {
                    connected: false,
                    message: format!("Connection failed: {}", e),
                }
            }
        }
    }

    /// Сжатие (если нужно) и загрузка постера с ограничением по времени.
    async fn upload_poster(&self, file: PosterFile) -> AppResult<RawFile> {
        let prepared = poster::prepare(file, &self.poster).await;
        let compressed = prepared.is_compressed();
        let file = prepared.into_file();
        info!(
            "Uploading poster {} ({} bytes, compressed: {})",
            file.name,
            file.size(),
            compressed
        );

        let upload = self.backend.upload_file(&file.name, &file.content_type, file.bytes);
        tokio::time::timeout(self.poster.upload_timeout(), upload)
            .await
            .map_err(|_| AppError::UploadTimeout(self.poster.upload_timeout_secs))?
    }

    pub async fn submit(&self, form: CreateEventForm, poster: Option<PosterFile>) -> AppResult<Navigation> {
        let _guard = self.creating.try_acquire("Event creation")?;
        let identity = self.organizer()?;

        // локальные проверки до любого сетевого вызова
        let event = form.into_new_event(Utc::now())?;
        if let Some(file) = &poster {
            poster::validate(file, &self.poster)?;
        }
        self.backend.ensure_configured()?;

        self.probe().await.map_err(|e| {
            error!("Parse connection test failed: {}", e);
            match e {
                AppError::Configuration(_) => e,
                _ => AppError::Remote(CONNECTION_FAILED_MESSAGE.to_string()),
            }
        })?;

        let poster_file = match poster {
            Some(file) => Some(self.upload_poster(file).await?),
            None => None,
        };

        let mut params = json!({
            "title": event.title,
            "location": event.location,
            "date": event.date.to_rfc3339_opts(SecondsFormat::Millis, true),
            "organizerId": identity.id,
        });
        if let Some(file) = &poster_file {
            params["eventPosterImage"] = file.to_pointer();
        }

        self.backend
            .run_function("createEvent", params)
            .await?
            .into_result("Failed to create event")?;
        info!("Event '{}' created by {}", event.title, identity.username);

        Ok(Navigation::Listing)
    }
}

/* ---------- HTTP ---------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PosterUpload {
    name: String,
    content_type: String,
    /// Содержимое файла в base64.
    data: String,
}

#[derive(Debug, Deserialize)]
struct CreateEventRequest {
    #[serde(flatten)]
    form: CreateEventForm,
    poster: Option<PosterUpload>,
}

#[derive(Debug, Serialize)]
struct CreateEventResponse {
    success: bool,
    redirect: &'static str,
}

// POST /api/events
async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateEventRequest>,
) -> AppResult<(StatusCode, Json<CreateEventResponse>)> {
    let poster = match req.poster {
        Some(upload) => {
            let bytes = general_purpose::STANDARD
                .decode(upload.data.as_bytes())
                .map_err(|_| AppError::Validation("Poster data is not valid base64".to_string()))?;
            Some(PosterFile::new(upload.name, upload.content_type, bytes))
        }
        None => None,
    };

    let navigation = state.create_event.submit(req.form, poster).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateEventResponse {
            success: true,
            redirect: navigation.path(),
        }),
    ))
}

// GET /api/connection
async fn test_connection(State(state): State<Arc<AppState>>) -> Json<ConnectionStatus> {
    Json(state.create_event.test_connection().await)
}
