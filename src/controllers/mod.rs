pub mod auth;
pub mod events;
pub mod create;
pub mod register;

use axum::Router;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{AppError, AppResult};

pub use create::CreateEventController;
pub use events::HomeController;
pub use register::RegisterController;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(auth::routes())
        .merge(events::routes())
        .merge(create::routes())
        .merge(register::routes())
}

/// Состояние страницы со списком: `idle -> loading -> {ready, error}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum PageState<T> {
    Idle,
    Loading,
    Ready(T),
    Error(String),
}

impl<T> PageState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, PageState::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            PageState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PageState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Ячейка с состоянием страницы. Любая загрузка (первая, повтор после ошибки,
/// обновление после изменения) проходит через `loading`.
#[derive(Debug)]
pub struct PageCell<T> {
    state: Mutex<PageState<T>>,
}

impl<T: Clone> Default for PageCell<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(PageState::Idle),
        }
    }
}

impl<T: Clone> PageCell<T> {
    fn set(&self, next: PageState<T>) {
        match self.state.lock() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    pub fn snapshot(&self) -> PageState<T> {
        match self.state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn begin(&self) {
        self.set(PageState::Loading);
    }

    pub fn reset(&self) {
        self.set(PageState::Idle);
    }

    /// Завершает загрузку. Ошибка сохраняется как сообщение страницы.
    pub fn finish(&self, result: AppResult<T>) -> PageState<T> {
        let next = match result {
            Ok(value) => PageState::Ready(value),
            Err(e) => PageState::Error(e.to_string()),
        };
        self.set(next.clone());
        next
    }
}

/// Флаг "действие выполняется". Повторный запуск во время выполнения отклоняется.
#[derive(Debug, Default)]
pub struct BusyFlag {
    busy: AtomicBool,
}

pub struct BusyGuard<'a> {
    flag: &'a BusyFlag,
}

impl BusyFlag {
    pub fn try_acquire(&self, action: &'static str) -> AppResult<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::Busy(action))?;
        Ok(BusyGuard { flag: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_cell_moves_through_states() {
        let cell: PageCell<u32> = PageCell::default();
        assert_eq!(cell.snapshot(), PageState::Idle);

        cell.begin();
        assert!(cell.snapshot().is_loading());

        cell.finish(Err(AppError::Remote("boom".into())));
        assert_eq!(cell.snapshot().error(), Some("boom"));

        // повтор после ошибки
        cell.begin();
        assert_eq!(cell.finish(Ok(7)), PageState::Ready(7));
    }

    #[test]
    fn busy_flag_rejects_second_trigger() {
        let flag = BusyFlag::default();
        let guard = flag.try_acquire("Registration").unwrap();
        assert!(matches!(flag.try_acquire("Registration"), Err(AppError::Busy(_))));
        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_acquire("Registration").is_ok());
    }

    #[test]
    fn page_state_serializes_with_status_tag() {
        let ready = serde_json::to_value(PageState::Ready(vec![1, 2])).unwrap();
        assert_eq!(ready, serde_json::json!({"status": "ready", "data": [1, 2]}));
        let idle = serde_json::to_value(PageState::<u8>::Idle).unwrap();
        assert_eq!(idle, serde_json::json!({"status": "idle"}));
    }
}
