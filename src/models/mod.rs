//! Domain models for notifyhome.
//!
//! - [`Device`]: a cast speaker found during one discovery pass, with the
//!   result of matching it against a [`DeviceFilter`].
//! - [`Event`]: an upcoming calendar entry.
//! - [`Message`]: text to speak.

mod device;
mod event;
mod message;

pub use device::*;
pub use event::*;
pub use message::*;
