pub mod config;
pub mod error;
pub mod models;
pub mod mapper;
pub mod backend;
pub mod poster;
pub mod forms;
pub mod session;
pub mod controllers;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use backend::{ParseClient, RemoteBackend};
use controllers::{CreateEventController, HomeController, RegisterController};
use session::SessionStore;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub backend: Arc<dyn RemoteBackend>,
    pub session: Arc<SessionStore>,
    pub home: Arc<HomeController>,
    pub create_event: Arc<CreateEventController>,
    pub registration: Arc<RegisterController>,
}

impl AppState {
    /// Собирает состояние вокруг готового бэкенда (в тестах - фейкового).
    pub fn with_backend(config: config::Config, backend: Arc<dyn RemoteBackend>) -> Arc<Self> {
        let session = Arc::new(SessionStore::new(backend.clone()));
        let home = Arc::new(HomeController::new(backend.clone(), session.clone()));
        let create_event = Arc::new(CreateEventController::new(
            backend.clone(),
            session.clone(),
            config.poster.clone(),
        ));
        let registration = Arc::new(RegisterController::new(backend.clone(), session.clone()));

        Arc::new(Self {
            config,
            backend,
            session,
            home,
            create_event,
            registration,
        })
    }

    /// Создаёт клиент Parse и восстанавливает сохранённую сессию.
    pub async fn new(config: config::Config) -> error::AppResult<Arc<Self>> {
        let backend: Arc<dyn RemoteBackend> = Arc::new(ParseClient::from_config(&config.parse)?);
        let state = Self::with_backend(config, backend);
        state.session.restore().await;
        Ok(state)
    }
}

/// Полный роутер приложения: служебные маршруты и страницы под `/api`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Event Manager API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
