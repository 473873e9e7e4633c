use lazy_static::lazy_static;
use scraper::{Html, Node, Selector};
use thiserror::Error;

lazy_static! {
    static ref BODY: Selector = Selector::parse("body").expect("valid selector");
}

// Elements whose text children are code or markup, not prose.
const NON_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("HTTP response head is not terminated")]
    MalformedHttp,

    #[error("unsupported content type `{0}`")]
    UnsupportedContentType(String),
}

/// Turns a captured payload into searchable body text.
///
/// Implementations hold no mutable state and may be called from any thread.
pub trait TextExtractor: Send + Sync {
    /// Extracted text, or an empty string when the payload has none.
    fn extract_body_text(&self, payload: &[u8]) -> Result<String, ExtractionError>;
}

/// Extracts the visible text of an HTML document's `<body>`.
///
/// Payloads that start with an HTTP status line have their response head
/// stripped first; a declared non-textual `Content-Type` is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self { Self }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn is_textual(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    mime.is_empty() || mime.starts_with("text/") || mime.ends_with("+xml") || mime == "application/xml"
}

/// Split an HTTP response into its declared content type and body.
fn http_body(payload: &[u8]) -> Result<(Option<String>, &[u8]), ExtractionError> {
    if !payload.starts_with(b"HTTP/") {
        return Ok((None, payload));
    }
    // the head ends at the first blank line, whichever line ending it uses
    let crlf = find(payload, b"\r\n\r\n").map(|i| (i, 4));
    let lf = find(payload, b"\n\n").map(|i| (i, 2));
    let (head_len, sep_len) = match (crlf, lf) {
        (Some(a), Some(b)) => a.min(b),
        (a, b) => a.or(b).ok_or(ExtractionError::MalformedHttp)?,
    };
    let head = String::from_utf8_lossy(&payload[..head_len]);
    let content_type = head
        .lines()
        .skip(1)
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value.trim().to_string());
    Ok((content_type, &payload[head_len + sep_len..]))
}

impl TextExtractor for HtmlExtractor {
    fn extract_body_text(&self, payload: &[u8]) -> Result<String, ExtractionError> {
        let (content_type, body) = http_body(payload)?;
        if let Some(ct) = content_type {
            if !is_textual(&ct) {
                return Err(ExtractionError::UnsupportedContentType(ct));
            }
        }

        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);
        let Some(body) = document.select(&BODY).next() else {
            return Ok(String::new());
        };
        let mut words: Vec<&str> = Vec::new();
        for node in body.descendants() {
            if let Node::Text(text) = node.value() {
                let hidden = node
                    .parent()
                    .and_then(|p| p.value().as_element())
                    .is_some_and(|e| NON_TEXT_ELEMENTS.contains(&e.name()));
                if !hidden {
                    words.extend(text.split_whitespace());
                }
            }
        }
        Ok(words.join(" "))
    }
}

/// Treats the whole payload as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_body_text(&self, payload: &[u8]) -> Result<String, ExtractionError> {
        Ok(String::from_utf8_lossy(payload).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(payload: &str) -> Result<String, ExtractionError> {
        HtmlExtractor::new().extract_body_text(payload.as_bytes())
    }

    #[test]
    fn body_text_only() {
        let html = "<html><head><title>Skip me</title></head><body><h1>Cat</h1> <p>and   dog</p></body></html>";
        assert_eq!(extract(html).unwrap(), "Cat and dog");
    }

    #[test]
    fn strips_http_head() {
        let payload = "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n\r\n<body>hello world</body>";
        assert_eq!(extract(payload).unwrap(), "hello world");
    }

    #[test]
    fn skips_script_and_style() {
        let html = "<body><script>var x = 1;</script><style>p{}</style><p>visible</p></body>";
        assert_eq!(extract(html).unwrap(), "visible");
    }

    #[test]
    fn rejects_binary_content() {
        let payload = "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\n\r\n\u{89}PNG";
        assert_eq!(extract(payload), Err(ExtractionError::UnsupportedContentType("image/png".into())));
    }

    #[test]
    fn accepts_xhtml() {
        let payload = "HTTP/1.0 200 OK\nContent-Type: application/xhtml+xml\n\n<html><body>x</body></html>";
        assert_eq!(extract(payload).unwrap(), "x");
    }

    #[test]
    fn lf_head_with_crlf_body() {
        let payload = "HTTP/1.1 200 OK\nContent-Type: text/html\n\n<body>first para\r\n\r\nsecond para</body>";
        assert_eq!(extract(payload).unwrap(), "first para second para");
    }

    #[test]
    fn crlf_head_with_lf_body() {
        let payload = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<body>one\n\ntwo</body>";
        assert_eq!(extract(payload).unwrap(), "one two");
    }

    #[test]
    fn unterminated_http_head() {
        assert_eq!(extract("HTTP/1.1 200 OK\r\nContent-Type: text/html"), Err(ExtractionError::MalformedHttp));
    }

    #[test]
    fn empty_body_gives_empty_text() {
        assert_eq!(extract("HTTP/1.1 204 No Content\r\n\r\n").unwrap(), "");
    }

    #[test]
    fn plain_text_passthrough() {
        assert_eq!(PlainTextExtractor.extract_body_text(b"cat dog").unwrap(), "cat dog");
    }
}
