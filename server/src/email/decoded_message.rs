use chrono::{DateTime, TimeZone};
use chrono_tz::{Asia::Tokyo, Tz};
use derive_more::derive::Display;
use mail_parser::{Message, MessageParser};
use regex::Regex;

const RE_WHITESPACE_STR: &str = r"[\r\t\n]+";
const RE_LONG_SPACE_STR: &str = r" {2,}";

lazy_static::lazy_static!(
    static ref RE_WHITESPACE: Regex = Regex::new(RE_WHITESPACE_STR).unwrap();
    static ref RE_LONG_SPACE: Regex = Regex::new(RE_LONG_SPACE_STR).unwrap();
);

/// Received timestamps are stored in this civil timezone (UTC+9).
pub const RECEIVED_AT_TZ: Tz = Tokyo;

#[derive(Debug, Display, PartialEq, Eq)]
pub enum DecodeError {
    #[display("malformed message envelope")]
    Malformed,
    #[display("message has no subject")]
    MissingSubject,
}

impl std::error::Error for DecodeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySource {
    Plain,
    Html,
    Placeholder,
}

/// The handful of fields the pipeline needs out of a raw email.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub subject: Option<String>,
    pub body_text: String,
    pub body_source: BodySource,
    pub received_at: Option<DateTime<Tz>>,
}

impl DecodedMessage {
    pub fn parse(raw: &[u8], empty_body_placeholder: &str) -> Result<Self, DecodeError> {
        let message = MessageParser::default()
            .parse(raw)
            .ok_or(DecodeError::Malformed)?;

        if message.headers().is_empty() {
            return Err(DecodeError::Malformed);
        }

        let subject = message.subject().map(|s| s.to_string());
        let received_at = message.date().and_then(normalize_date);
        let (body_text, body_source) = match select_body(&message) {
            Some(selected) => selected,
            None => (empty_body_placeholder.to_string(), BodySource::Placeholder),
        };

        Ok(Self {
            subject,
            body_text,
            body_source,
            received_at,
        })
    }

    /// ISO-8601 rendering of the normalized timestamp, e.g. `2024-01-15T19:00:00+09:00`.
    pub fn received_at_rfc3339(&self) -> Option<String> {
        self.received_at.map(|dt| dt.to_rfc3339())
    }
}

/// Converts a parsed `Date:` header into the storage timezone.
/// Out-of-range values are treated as absent.
pub fn normalize_date(date: &mail_parser::DateTime) -> Option<DateTime<Tz>> {
    let utc = DateTime::from_timestamp(date.to_timestamp(), 0)?;
    Some(RECEIVED_AT_TZ.from_utc_datetime(&utc.naive_utc()))
}

/// Prefer a real text/plain part, then fall back to the first HTML part rendered as text.
fn select_body(message: &Message) -> Option<(String, BodySource)> {
    let plain = message
        .text_body
        .iter()
        .filter_map(|id| message.parts.get(*id as usize))
        .find(|part| part.is_text() && !part.is_text_html())
        .and_then(|part| part.text_contents())
        .map(|text| text.to_string());

    if let Some(text) = plain {
        return Some((text, BodySource::Plain));
    }

    message
        .body_html(0)
        .map(|html| (html_to_text(&html), BodySource::Html))
}

fn html_to_text(html: &str) -> String {
    let text: String = html2text::from_read(html.as_bytes(), 400);
    let text = RE_WHITESPACE.replace_all(&text, " ");
    let text = RE_LONG_SPACE.replace_all(&text, " ");
    text.trim().to_string()
}
