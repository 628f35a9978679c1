//! Spoken message phrasing per language.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Locale {
    #[default]
    En,
    Ja,
}

impl Locale {
    /// Resolve a locale code, falling back to English for anything unknown.
    pub fn from_code(code: &str) -> Self {
        code.parse().unwrap_or_default()
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ja => "ja",
        }
    }

    /// Announcement for an event starting at `start`, rendered in the
    /// event's own offset.
    pub fn notify_message<Tz>(&self, start: &DateTime<Tz>, title: &str) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        match self {
            Self::En => format!(
                "{} will start from {}",
                title,
                start.format("%Y/%m/%d %H:%M")
            ),
            Self::Ja => format!("{} から {}", start.format("%m月%d日の%H:%M"), title),
        }
    }
}

impl FromStr for Locale {
    type Err = UnknownLocale;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "ja" => Ok(Self::Ja),
            _ => Err(UnknownLocale(s.to_string())),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown locale code: {0}")]
pub struct UnknownLocale(pub String);
