use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Attendee,
    Organizer,
}

impl Role {
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "Attendee" => Some(Role::Attendee),
            "Organizer" => Some(Role::Organizer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Attendee => "Attendee",
            Role::Organizer => "Organizer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Аутентифицированный пользователь (или организатор события).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn is_organizer(&self) -> bool {
        self.role == Role::Organizer
    }

    pub fn is_attendee(&self) -> bool {
        self.role == Role::Attendee
    }

    /// Имя для отображения: `name`, если задано, иначе логин.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }
}
