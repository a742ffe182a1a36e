//! mapper.rs
//!
//! Преобразование сырых записей Parse в модели для отображения.
//!
//! Все функции чистые и тотальные: отсутствующая связь (организатор, участник,
//! событие) заменяется заглушкой, отсутствующий список становится пустым.
//! Время `now` передаётся явно, чтобы результат был воспроизводимым в тестах.
//! Повторное применение к уже преобразованной записи (через `From<&Event>`)
//! даёт тот же результат.

use chrono::{DateTime, Utc};

use crate::models::{
    Event, Identity, ParseDate, PosterImage, RawEvent, RawFile, RawRegistration,
    RawUpcomingRegistration, RawUser, Registration, RegistrationStatus, Role,
    UpcomingRegistration,
};

pub const UNKNOWN_ID: &str = "unknown";
pub const PLACEHOLDER_ORGANIZER_NAME: &str = "Event Organizer";
pub const PLACEHOLDER_ATTENDEE_NAME: &str = "Attendee";
pub const PLACEHOLDER_EVENT_TITLE: &str = "Event unavailable";

/// Значения по умолчанию для связи с пользователем.
#[derive(Debug, Clone, Copy)]
struct RelationDefaults {
    username: &'static str,
    role: Role,
}

const ORGANIZER: RelationDefaults = RelationDefaults {
    username: PLACEHOLDER_ORGANIZER_NAME,
    role: Role::Organizer,
};

const ATTENDEE: RelationDefaults = RelationDefaults {
    username: PLACEHOLDER_ATTENDEE_NAME,
    role: Role::Attendee,
};

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

fn placeholder(defaults: RelationDefaults, now: DateTime<Utc>) -> Identity {
    Identity {
        id: UNKNOWN_ID.to_string(),
        username: defaults.username.to_string(),
        email: String::new(),
        role: defaults.role,
        name: None,
        created_at: now,
        updated_at: Some(now),
    }
}

fn map_relation(raw: Option<&RawUser>, defaults: RelationDefaults, now: DateTime<Utc>) -> Identity {
    let Some(user) = raw else {
        return placeholder(defaults, now);
    };

    Identity {
        id: user.object_id.clone().unwrap_or_default(),
        username: non_empty(user.username.as_ref())
            .unwrap_or(defaults.username)
            .to_string(),
        email: user.email.clone().unwrap_or_default(),
        role: user
            .role
            .as_deref()
            .and_then(Role::parse)
            .unwrap_or(defaults.role),
        name: user.name.clone(),
        created_at: user.created_at.map(|d| d.0).unwrap_or(now),
        updated_at: user.updated_at.map(|d| d.0),
    }
}

/// Заглушка организатора для события, у которого связь недоступна.
pub fn placeholder_organizer(now: DateTime<Utc>) -> Identity {
    placeholder(ORGANIZER, now)
}

pub fn placeholder_attendee(now: DateTime<Utc>) -> Identity {
    placeholder(ATTENDEE, now)
}

pub fn placeholder_event(now: DateTime<Utc>) -> Event {
    Event {
        id: UNKNOWN_ID.to_string(),
        title: PLACEHOLDER_EVENT_TITLE.to_string(),
        location: String::new(),
        date: now,
        attendees: Vec::new(),
        poster: None,
        organizer: placeholder_organizer(now),
        created_at: now,
        updated_at: Some(now),
    }
}

/// Пользователь текущей сессии. Роль по умолчанию - `Attendee`.
pub fn map_user(raw: &RawUser, now: DateTime<Utc>) -> Identity {
    Identity {
        id: raw.object_id.clone().unwrap_or_default(),
        username: raw.username.clone().unwrap_or_default(),
        email: raw.email.clone().unwrap_or_default(),
        role: raw
            .role
            .as_deref()
            .and_then(Role::parse)
            .unwrap_or(Role::Attendee),
        name: raw.name.clone(),
        created_at: raw.created_at.map(|d| d.0).unwrap_or(now),
        updated_at: raw.updated_at.map(|d| d.0),
    }
}

pub fn map_organizer(raw: Option<&RawUser>, now: DateTime<Utc>) -> Identity {
    map_relation(raw, ORGANIZER, now)
}

pub fn map_attendee(raw: Option<&RawUser>, now: DateTime<Utc>) -> Identity {
    map_relation(raw, ATTENDEE, now)
}

pub fn map_event(raw: &RawEvent, now: DateTime<Utc>) -> Event {
    let created_at = raw.created_at.map(|d| d.0).unwrap_or(now);

    Event {
        id: raw.object_id.clone().unwrap_or_default(),
        title: raw.title.clone().unwrap_or_default(),
        location: raw.location.clone().unwrap_or_default(),
        // без даты события берём дату создания
        date: raw.date.map(|d| d.0).unwrap_or(created_at),
        attendees: raw.attendees.clone().unwrap_or_default(),
        poster: raw.event_poster_image.as_ref().map(|file| PosterImage {
            name: file.name.clone(),
            url: file.url.clone(),
        }),
        organizer: map_organizer(raw.organizer.as_ref(), now),
        created_at,
        updated_at: raw.updated_at.map(|d| d.0),
    }
}

pub fn map_events(raw: &[RawEvent], now: DateTime<Utc>) -> Vec<Event> {
    raw.iter().map(|event| map_event(event, now)).collect()
}

fn map_optional_event(raw: Option<&RawEvent>, now: DateTime<Utc>) -> Event {
    raw.map(|event| map_event(event, now))
        .unwrap_or_else(|| placeholder_event(now))
}

pub fn map_registration(raw: &RawRegistration, now: DateTime<Utc>) -> Registration {
    let registered = raw.registered.unwrap_or(false);

    Registration {
        id: raw.object_id.clone().unwrap_or_default(),
        event: map_optional_event(raw.event.as_ref(), now),
        attendee: map_attendee(raw.attendee.as_ref(), now),
        registered,
        status: RegistrationStatus::resolve(raw.status.as_deref(), registered),
        created_at: raw.created_at.map(|d| d.0).unwrap_or(now),
        updated_at: raw.updated_at.map(|d| d.0),
    }
}

pub fn map_upcoming(raw: &RawUpcomingRegistration, now: DateTime<Utc>) -> UpcomingRegistration {
    // запись пришла из списка предстоящих, значит по умолчанию она активна
    let registered = raw.registered.unwrap_or(true);

    UpcomingRegistration {
        registration_id: raw.registration_id.clone().unwrap_or_default(),
        registration_date: raw.registration_date.map(|d| d.0).unwrap_or(now),
        event: map_optional_event(raw.event.as_ref(), now),
        status: RegistrationStatus::resolve(raw.status.as_deref(), registered),
        registered,
    }
}

// === Обратное преобразование (для повторного маппинга) ===

impl From<&Identity> for RawUser {
    fn from(identity: &Identity) -> Self {
        RawUser {
            object_id: Some(identity.id.clone()),
            username: Some(identity.username.clone()),
            email: Some(identity.email.clone()),
            role: Some(identity.role.as_str().to_string()),
            name: identity.name.clone(),
            created_at: Some(ParseDate(identity.created_at)),
            updated_at: identity.updated_at.map(ParseDate),
            session_token: None,
        }
    }
}

impl From<&Event> for RawEvent {
    fn from(event: &Event) -> Self {
        RawEvent {
            object_id: Some(event.id.clone()),
            title: Some(event.title.clone()),
            location: Some(event.location.clone()),
            date: Some(ParseDate(event.date)),
            attendees: Some(event.attendees.clone()),
            event_poster_image: event.poster.as_ref().map(|p| RawFile {
                name: p.name.clone(),
                url: p.url.clone(),
            }),
            organizer: Some(RawUser::from(&event.organizer)),
            created_at: Some(ParseDate(event.created_at)),
            updated_at: event.updated_at.map(ParseDate),
        }
    }
}

impl From<&Registration> for RawRegistration {
    fn from(registration: &Registration) -> Self {
        RawRegistration {
            object_id: Some(registration.id.clone()),
            event: Some(RawEvent::from(&registration.event)),
            attendee: Some(RawUser::from(&registration.attendee)),
            registered: Some(registration.registered),
            status: Some(registration.status.as_str().to_string()),
            created_at: Some(ParseDate(registration.created_at)),
            updated_at: registration.updated_at.map(ParseDate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn raw_event(organizer: Option<RawUser>) -> RawEvent {
        RawEvent {
            object_id: Some("ev1".into()),
            title: Some("Rust meetup".into()),
            location: Some("Almaty".into()),
            date: Some(ParseDate(now() + Duration::days(7))),
            attendees: None,
            event_poster_image: None,
            organizer,
            created_at: Some(ParseDate(now() - Duration::days(1))),
            updated_at: None,
        }
    }

    #[test]
    fn missing_organizer_becomes_placeholder() {
        let event = map_event(&raw_event(None), now());
        assert_eq!(event.organizer.id, UNKNOWN_ID);
        assert_eq!(event.organizer.username, PLACEHOLDER_ORGANIZER_NAME);
        assert_eq!(event.organizer.role, Role::Organizer);
        assert_eq!(event.organizer.email, "");
        assert_eq!(event.organizer.created_at, now());
        assert_eq!(event.organizer.updated_at, Some(now()));
        assert!(event.attendees.is_empty());
    }

    #[test]
    fn unresolved_pointer_keeps_id() {
        let pointer = RawUser {
            object_id: Some("u42".into()),
            ..Default::default()
        };
        let event = map_event(&raw_event(Some(pointer)), now());
        assert_eq!(event.organizer.id, "u42");
        assert_eq!(event.organizer.username, PLACEHOLDER_ORGANIZER_NAME);
        assert_eq!(event.organizer.role, Role::Organizer);
    }

    #[test]
    fn session_user_defaults_to_attendee() {
        let identity = map_user(
            &RawUser {
                object_id: Some("u1".into()),
                username: Some("alice".into()),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(identity.role, Role::Attendee);
        assert_eq!(identity.email, "");
        assert_eq!(identity.created_at, now());
    }

    #[test]
    fn missing_date_falls_back_to_creation_time() {
        let mut raw = raw_event(None);
        raw.date = None;
        let event = map_event(&raw, now());
        assert_eq!(event.date, now() - Duration::days(1));
    }

    #[test]
    fn registration_without_relations_is_total() {
        let registration = map_registration(&RawRegistration::default(), now());
        assert_eq!(registration.event.title, PLACEHOLDER_EVENT_TITLE);
        assert_eq!(registration.attendee.role, Role::Attendee);
        assert_eq!(registration.status, RegistrationStatus::Canceled);
        assert!(!registration.registered);
    }

    #[test]
    fn upcoming_status_string_wins_over_flag() {
        let upcoming = map_upcoming(
            &RawUpcomingRegistration {
                registration_id: Some("r1".into()),
                status: Some("canceled".into()),
                registered: Some(true),
                event: Some(raw_event(None)),
                ..Default::default()
            },
            now(),
        );
        assert_eq!(upcoming.status, RegistrationStatus::Canceled);
        assert_eq!(upcoming.event.id, "ev1");
    }

    fn arb_user() -> impl Strategy<Value = Option<RawUser>> {
        proptest::option::of(
            (
                proptest::option::of("[a-z0-9]{1,10}"),
                proptest::option::of("[a-zA-Z0-9_]{0,12}"),
                proptest::option::of("[a-z]{1,8}@[a-z]{1,8}\\.com"),
                proptest::option::of(prop_oneof![
                    Just("Attendee".to_string()),
                    Just("Organizer".to_string()),
                    "[a-z]{0,6}"
                ]),
                proptest::option::of(0i64..2_000_000_000),
            )
                .prop_map(|(id, username, email, role, created)| RawUser {
                    object_id: id,
                    username,
                    email,
                    role,
                    name: None,
                    created_at: created.map(|s| ParseDate(Utc.timestamp_opt(s, 0).unwrap())),
                    updated_at: None,
                    session_token: None,
                }),
        )
    }

    proptest! {
        #[test]
        fn organizer_is_never_missing(user in arb_user()) {
            let event = map_event(&raw_event(user.clone()), now());
            match user {
                None => {
                    prop_assert_eq!(event.organizer.username.as_str(), PLACEHOLDER_ORGANIZER_NAME);
                    prop_assert_eq!(event.organizer.role, Role::Organizer);
                }
                Some(user) => {
                    prop_assert_eq!(event.organizer.id, user.object_id.unwrap_or_default());
                    prop_assert_eq!(event.organizer.email, user.email.unwrap_or_default());
                    prop_assert!(!event.organizer.username.is_empty());
                }
            }
        }

        #[test]
        fn remapping_is_idempotent(user in arb_user(), shift in 0i64..100_000) {
            let first = map_event(&raw_event(user), now());
            let later = now() + Duration::seconds(shift);
            let second = map_event(&RawEvent::from(&first), later);
            prop_assert_eq!(first, second);
        }
    }
}
