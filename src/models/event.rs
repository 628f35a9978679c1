use chrono::{DateTime, FixedOffset};

/// An upcoming calendar entry fetched from one account.
///
/// Events are immutable once fetched and are consumed once to build a
/// spoken [`super::Message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub title: String,
    pub start: DateTime<FixedOffset>,
    /// All-day and open-ended entries may not carry an end.
    pub end: Option<DateTime<FixedOffset>>,
}

impl Event {
    pub fn new(title: impl Into<String>, start: DateTime<FixedOffset>) -> Self {
        Self {
            title: title.into(),
            start,
            end: None,
        }
    }

    pub fn with_end(mut self, end: DateTime<FixedOffset>) -> Self {
        self.end = Some(end);
        self
    }
}
