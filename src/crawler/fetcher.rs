//! HTTP fetcher implementation
//!
//! This module performs the single GET of a crawl attempt and classifies
//! everything that is not a usable HTML page into an [`ErrorSignal`]:
//!
//! | Condition | Signal |
//! |-----------|--------|
//! | Connection refused / DNS failure | ConnectionFailed |
//! | Timeout, other transport failure | ResponseNotOk(-1) |
//! | Status listed in `offline-statuses` | SiteOffline |
//! | Any other non-2xx status | ResponseNotOk(status) |
//! | Content-Type is not HTML | InvalidResponseShape |
//! | Declared charset is unknown | MalformedResponse |
//! | Body does not decode in its charset | ValueError (encoding mismatch) |

use crate::config::HttpConfig;
use crate::crawler::signal::{ErrorSignal, ENCODING_MISMATCH};
use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::Client;
use std::time::Duration;

/// A fetched, decoded HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value (empty when absent)
    pub content_type: String,
    /// Decoded page body
    pub body: String,
}

/// Something that can turn a URL into a page
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Page, ErrorSignal>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP configuration
/// * `timeout` - Whole-request timeout
pub fn build_http_client(config: &HttpConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed [`PageSource`]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    offline_statuses: Vec<u16>,
}

impl HttpFetcher {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            offline_statuses: Vec::new(),
        }
    }

    /// Builds the client from configuration
    pub fn from_config(
        http: &HttpConfig,
        timeout: Duration,
        offline_statuses: Vec<u16>,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(http, timeout)?;
        Ok(Self::new(client, timeout).with_offline_statuses(offline_statuses))
    }

    /// Statuses that mean "site offline" rather than a plain error
    pub fn with_offline_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.offline_statuses = statuses;
        self
    }

    fn transport_signal(&self, error: &reqwest::Error, url: &str) -> ErrorSignal {
        if error.is_timeout() {
            ErrorSignal::not_ok(
                -1,
                format!("timeout ({:?}) elapsed for url: {}", self.timeout, url),
            )
        } else if error.is_connect() {
            ErrorSignal::ConnectionFailed(error.to_string())
        } else {
            ErrorSignal::not_ok(-1, error.to_string())
        }
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, ErrorSignal> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_signal(&e, url))?;

        let status = response.status();
        if self.offline_statuses.contains(&status.as_u16()) {
            return Err(ErrorSignal::SiteOffline(format!(
                "{} answered {}",
                url, status
            )));
        }

        if !status.is_success() {
            return Err(ErrorSignal::not_ok(
                i32::from(status.as_u16()),
                status.canonical_reason().unwrap_or("unknown"),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !is_html(&content_type) {
            return Err(ErrorSignal::InvalidResponseShape(format!(
                "expected html, got '{}'",
                content_type
            )));
        }

        let final_url = response.url().to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_signal(&e, url))?;
        let body = decode_body(&bytes, &content_type)?;

        Ok(Page {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// Whether a Content-Type can be parsed as an HTML document
///
/// A missing header is accepted.
fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml"
}

/// Extracts the `charset` parameter of a Content-Type header
fn charset_of(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Decodes a body in its declared charset (UTF-8 when undeclared)
fn decode_body(bytes: &[u8], content_type: &str) -> Result<String, ErrorSignal> {
    let encoding = match charset_of(content_type) {
        Some(label) => Encoding::for_label(label.as_bytes()).ok_or_else(|| {
            ErrorSignal::MalformedResponse(format!("undecodable charset '{}'", label))
        })?,
        None => UTF_8,
    };

    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ErrorSignal::ValueError(format!(
            "{}: body is not valid {}",
            ENCODING_MISMATCH,
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&HttpConfig::default(), Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_is_html() {
        assert!(is_html("text/html"));
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("TEXT/HTML"));
        assert!(is_html("application/xhtml+xml"));
        assert!(is_html(""));
        assert!(!is_html("application/json"));
        assert!(!is_html("image/png"));
    }

    #[test]
    fn test_charset_of() {
        assert_eq!(charset_of("text/html; charset=utf-8"), Some("utf-8"));
        assert_eq!(charset_of("text/html;Charset=\"ISO-8859-1\""), Some("ISO-8859-1"));
        assert_eq!(charset_of("text/html"), None);
    }

    #[test]
    fn test_decode_body_in_declared_charset() {
        // 0xE9 is 'é' in latin-1
        let body = decode_body(b"caf\xE9", "text/html; charset=iso-8859-1").unwrap();
        assert_eq!(body, "café");
    }

    #[test]
    fn test_unknown_charset_is_malformed() {
        let result = decode_body(b"hello", "text/html; charset=klingon-7");
        assert!(matches!(result, Err(ErrorSignal::MalformedResponse(_))));
    }

    #[test]
    fn test_invalid_bytes_are_encoding_mismatch() {
        let result = decode_body(b"caf\xE9", "text/html; charset=utf-8");
        match result {
            Err(ErrorSignal::ValueError(message)) => {
                assert!(message.starts_with(ENCODING_MISMATCH))
            }
            other => panic!("expected value error, got {:?}", other),
        }
    }
}
