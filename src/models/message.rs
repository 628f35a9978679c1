use super::Event;
use crate::locale::Locale;

/// Text to be spoken. The language is chosen per pass, not per message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Announcement for an upcoming event, phrased for `locale`.
    pub fn for_event(event: &Event, locale: Locale) -> Self {
        Self::new(locale.notify_message(&event.start, &event.title))
    }
}
