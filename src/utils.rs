use axum::{
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};

pub const TWIML_CONTENT_TYPE: &str = "text/xml";

/// Parse a Twilio duration parameter.  Anything that is not a whole, non-negative number of
/// seconds is treated as absent.
pub fn parse_seconds(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok().filter(|secs| *secs >= 0)
}

pub fn twiml_response(twiml: String) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(TWIML_CONTENT_TYPE),
    );
    (StatusCode::OK, headers, twiml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_seconds() {
        assert_eq!(parse_seconds("30"), Some(30));
        assert_eq!(parse_seconds(" 85 "), Some(85));
        assert_eq!(parse_seconds("0"), Some(0));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_seconds(""), None);
        assert_eq!(parse_seconds("abc"), None);
        assert_eq!(parse_seconds("-4"), None);
        assert_eq!(parse_seconds("1.5"), None);
    }
}
