pub mod raw;
pub mod identity;
pub mod event;

pub use raw::{ParseDate, RawEvent, RawFile, RawRegistration, RawUpcomingRegistration, RawUser};
pub use identity::{Identity, Role};
pub use event::{Event, PosterImage, Registration, RegistrationStatus, UpcomingRegistration};
