//! # Recorded Transactions
//!
//! A [`Transaction`] is one recorded HTTP request paired with its response,
//! if a response ever arrived. Transactions are built once from the raw
//! message text a proxy captured and are read-only afterwards.

use crate::error::{Error, Result};
use url::Url;

/// Classification of a `Content-Type` header.
///
/// Field extractors hand out these markers rather than header text, so
/// conditions on content type compare marker to marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    None,
    Unknown,
    UrlEncoded,
    Multipart,
    Json,
    Xml,
    Html,
    Text,
    Amf,
}

impl ContentType {
    /// Classify a raw header value such as `application/json; charset=utf-8`.
    pub fn classify(header: &str) -> Self {
        let value = header.trim().to_ascii_lowercase();
        if value.is_empty() {
            Self::None
        } else if value.contains("json") {
            Self::Json
        } else if value.contains("xml") {
            Self::Xml
        } else if value.contains("html") {
            Self::Html
        } else if value.contains("x-www-form-urlencoded") {
            Self::UrlEncoded
        } else if value.contains("multipart") {
            Self::Multipart
        } else if value.contains("amf") {
            Self::Amf
        } else if value.starts_with("text/") {
            Self::Text
        } else {
            Self::Unknown
        }
    }

    /// Canonical token used when a marker is rendered as text.
    pub fn token(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Unknown => "UNKNOWN",
            Self::UrlEncoded => "URL_ENCODED",
            Self::Multipart => "MULTIPART",
            Self::Json => "JSON",
            Self::Xml => "XML",
            Self::Html => "HTML",
            Self::Text => "TEXT",
            Self::Amf => "AMF",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// The response half of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status_code: u16,
    pub content_type: ContentType,
    /// Full response text: status line, headers and body.
    pub raw: String,
    pub body: String,
}

impl Response {
    /// Parse a raw HTTP/1.x response message.
    pub fn from_raw(raw: &str) -> Result<Self> {
        let (head, body) = split_message(raw);
        let status_line = head.lines().next().unwrap_or_default();
        let status_code = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| {
                Error::InvalidTransaction(format!("bad status line '{}'", status_line.trim()))
            })?;

        Ok(Self {
            status_code,
            content_type: content_type_of(head),
            raw: raw.to_string(),
            body: body.to_string(),
        })
    }
}

/// One recorded request/response pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub method: String,
    /// Absolute URL including the query string.
    pub url: String,
    pub host: String,
    pub path: String,
    /// Query string without the leading `?` (empty when there is none).
    pub query: String,
    /// Full request text: request line, headers and body.
    pub request: String,
    pub request_body: String,
    pub request_content_type: ContentType,
    /// `None` when no response was ever received.
    pub response: Option<Response>,
}

impl Transaction {
    /// Build a transaction from the absolute request URL and the raw
    /// message text captured for the request and, optionally, the response.
    pub fn from_raw(url: &str, raw_request: &str, raw_response: Option<&str>) -> Result<Self> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| Error::InvalidTransaction(format!("bad url '{}': {}", url.trim(), e)))?;

        let (head, body) = split_message(raw_request);
        let method = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().next())
            .ok_or_else(|| Error::InvalidTransaction("missing request line".into()))?
            .to_string();

        let response = raw_response.map(Response::from_raw).transpose()?;

        Ok(Self {
            method,
            host: parsed.host_str().unwrap_or_default().to_string(),
            path: parsed.path().to_string(),
            query: parsed.query().unwrap_or_default().to_string(),
            url: parsed.to_string(),
            request: raw_request.to_string(),
            request_body: body.to_string(),
            request_content_type: content_type_of(head),
            response,
        })
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }
}

/// Split a message at the first blank line into `(head, body)`.
fn split_message(raw: &str) -> (&str, &str) {
    if let Some(pos) = raw.find("\r\n\r\n") {
        (&raw[..pos], &raw[pos + 4..])
    } else if let Some(pos) = raw.find("\n\n") {
        (&raw[..pos], &raw[pos + 2..])
    } else {
        (raw, "")
    }
}

fn content_type_of(head: &str) -> ContentType {
    head.lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-type"))
        .map_or(ContentType::None, |(_, value)| ContentType::classify(value))
}
