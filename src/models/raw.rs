//! Сырые записи в том виде, в каком их отдаёт Parse Server.
//!
//! Все поля необязательные: связи (`organizer`, `attendee`) могут быть вырезаны
//! правилами доступа, а облачные функции возвращают объекты в упрощённом виде.
//! Заполнение значениями по умолчанию происходит только в `mapper`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;

/// Дата Parse: либо `{"__type":"Date","iso":"..."}`, либо обычная ISO-строка
/// (так приходят `createdAt`/`updatedAt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseDate(pub DateTime<Utc>);

impl From<DateTime<Utc>> for ParseDate {
    fn from(value: DateTime<Utc>) -> Self {
        ParseDate(value)
    }
}

impl<'de> Deserialize<'de> for ParseDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Tagged { iso: DateTime<Utc> },
            Plain(DateTime<Utc>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Tagged { iso } => ParseDate(iso),
            Repr::Plain(date) => ParseDate(date),
        })
    }
}

impl Serialize for ParseDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        json!({
            "__type": "Date",
            "iso": self.0.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
        .serialize(serializer)
    }
}

/// Ссылка на загруженный файл (`{"__type":"File","name":..,"url":..}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFile {
    pub name: String,
    pub url: String,
}

impl RawFile {
    /// Представление для передачи в облачную функцию или сохранения в объект.
    pub fn to_pointer(&self) -> serde_json::Value {
        json!({ "__type": "File", "name": self.name, "url": self.url })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<ParseDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<ParseDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub object_id: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub date: Option<ParseDate>,
    pub attendees: Option<Vec<String>>,
    pub event_poster_image: Option<RawFile>,
    /// `None`, когда связь вырезана ACL; объект только с `objectId`, когда
    /// пришёл указатель без `include`.
    pub organizer: Option<RawUser>,
    pub created_at: Option<ParseDate>,
    pub updated_at: Option<ParseDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRegistration {
    pub object_id: Option<String>,
    pub event: Option<RawEvent>,
    pub attendee: Option<RawUser>,
    pub registered: Option<bool>,
    pub status: Option<String>,
    pub created_at: Option<ParseDate>,
    pub updated_at: Option<ParseDate>,
}

/// Элемент ответа облачной функции `listUpcomingEvents`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUpcomingRegistration {
    pub registration_id: Option<String>,
    pub registration_date: Option<ParseDate>,
    pub event: Option<RawEvent>,
    pub status: Option<String>,
    pub registered: Option<bool>,
}
