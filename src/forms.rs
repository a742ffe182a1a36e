//! Формы и их локальная проверка. Ошибки проверки не доходят до сети.

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::Role;
use crate::session::SignupData;

pub static RE_USERNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());

fn required(value: &str, message: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        Err(AppError::Validation(message.to_string()))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupForm {
    #[validate(
        length(min = 3, message = "Username must be at least 3 characters"),
        regex(path = *RE_USERNAME, message = "Username can only contain letters, numbers, and underscores")
    )]
    pub username: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
    pub role: Option<String>,
}

impl SignupForm {
    pub fn into_signup_data(self) -> AppResult<SignupData> {
        required(&self.username, "Username is required")?;
        required(&self.email, "Email is required")?;
        self.validate().map_err(|e| {
            AppError::from_validation(e, &["username", "email", "password", "confirm_password"])
        })?;

        let role = self
            .role
            .as_deref()
            .and_then(Role::parse)
            .ok_or_else(|| AppError::Validation("Please select a role".to_string()))?;

        Ok(SignupData {
            username: self.username,
            email: self.email,
            password: self.password,
            role,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn check(&self) -> AppResult<()> {
        required(&self.username, "Username is required")?;
        required(&self.password, "Password is required")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CreateEventForm {
    #[validate(length(min = 3, message = "Title must be at least 3 characters"))]
    pub title: String,
    #[validate(length(min = 3, message = "Location must be at least 3 characters"))]
    pub location: String,
    /// RFC 3339 или значение `datetime-local` (`2025-06-01T18:30`), трактуется как UTC.
    pub date: String,
}

/// Проверенные данные нового события.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub location: String,
    pub date: DateTime<Utc>,
}

pub fn parse_event_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

impl CreateEventForm {
    pub fn into_new_event(self, now: DateTime<Utc>) -> AppResult<NewEvent> {
        required(&self.title, "Event title is required")?;
        required(&self.location, "Location is required")?;
        required(&self.date, "Date is required")?;
        self.validate()
            .map_err(|e| AppError::from_validation(e, &["title", "location"]))?;

        let date = parse_event_date(&self.date)
            .ok_or_else(|| AppError::Validation("Date is not valid".to_string()))?;
        if date <= now {
            return Err(AppError::Validation("Event date must be in the future".to_string()));
        }

        Ok(NewEvent {
            title: self.title.trim().to_string(),
            location: self.location.trim().to_string(),
            date,
        })
    }
}
