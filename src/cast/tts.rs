//! Speech URL resolution.
//!
//! The translate endpoint is unofficial but returns an mp3 that cast
//! receivers can buffer directly.

use url::Url;

use super::CastError;
use crate::locale::Locale;

const SPEECH_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// Content type of the audio served by [`speech_url`].
pub const SPEECH_CONTENT_TYPE: &str = "audio/mp3";

/// Build the URL a receiver should stream to speak `text` in `locale`.
pub fn speech_url(text: &str, locale: Locale) -> Result<Url, CastError> {
    if text.trim().is_empty() {
        return Err(CastError::Speech("empty text".into()));
    }
    Url::parse_with_params(
        SPEECH_ENDPOINT,
        &[
            ("client", "tw-ob"),
            ("ie", "UTF-8"),
            ("q", text),
            ("tl", locale.code()),
        ],
    )
    .map_err(|e| CastError::Speech(e.to_string()))
}
