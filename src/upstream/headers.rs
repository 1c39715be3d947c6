//! Header utilities for Emohaa requests
//!
//! Emohaa only accepts requests that look like they come from its own web
//! client, so every call carries the same browser fingerprint plus the
//! caller's bearer credential. Inbound client headers are never forwarded.

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, ORIGIN, REFERER,
    USER_AGENT,
};

use super::UpstreamError;

/// Site the browser fingerprint claims to be on
pub const SITE_ORIGIN: &str = "https://echo.turing-world.com";

/// Static browser headers (name, value)
const DISGUISE_HEADERS: &[(&str, &str)] = &[
    ("sec-ch-ua", r#""Chromium";v="122", "Not(A:Brand";v="24", "Google Chrome";v="122""#),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", r#""Windows""#),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-origin"),
];

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Build the headers shared by every Emohaa call.
///
/// `Accept-Encoding` is left to the HTTP client, which negotiates the
/// compression schemes it can actually decode.
pub fn build_disguise_headers(credential: &str) -> Result<HeaderMap, UpstreamError> {
    let mut headers = HeaderMap::new();

    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", credential))
            .map_err(|_| UpstreamError::InvalidCredential)?,
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
    );
    headers.insert(ORIGIN, HeaderValue::from_static(SITE_ORIGIN));
    headers.insert(
        REFERER,
        HeaderValue::from_static("https://echo.turing-world.com/"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

    for &(name, value) in DISGUISE_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    Ok(headers)
}
