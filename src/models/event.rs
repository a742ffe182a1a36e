use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosterImage {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub location: String,
    pub date: DateTime<Utc>,
    pub attendees: Vec<String>,
    pub poster: Option<PosterImage>,
    pub organizer: Identity,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.date <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Registered,
    Canceled,
}

impl RegistrationStatus {
    /// Разбор статуса с сервера; без статуса решает флаг `registered`.
    pub fn resolve(status: Option<&str>, registered: bool) -> Self {
        match status.map(str::trim) {
            Some("registered") => RegistrationStatus::Registered,
            Some("canceled") | Some("cancelled") => RegistrationStatus::Canceled,
            _ if registered => RegistrationStatus::Registered,
            _ => RegistrationStatus::Canceled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "registered",
            RegistrationStatus::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub event: Event,
    pub attendee: Identity,
    pub registered: bool,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingRegistration {
    pub registration_id: String,
    pub registration_date: DateTime<Utc>,
    pub event: Event,
    pub status: RegistrationStatus,
    pub registered: bool,
}
