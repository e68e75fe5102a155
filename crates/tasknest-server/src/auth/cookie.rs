//! Session cookie and bearer header helpers.

use std::time::Duration;

use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, InvalidHeaderValue},
};

/// Name of the session cookie.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Find a cookie value by name across all `Cookie` headers.
#[must_use]
pub fn extract_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim())
        })
}

/// The raw session cookie, if present and non-empty.
#[must_use]
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    extract_cookie(headers, ACCESS_TOKEN_COOKIE).filter(|v| !v.is_empty() && *v != "\"\"")
}

/// The raw `Authorization` header, if it uses the bearer scheme.
#[must_use]
pub fn bearer_header(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let scheme = value.get(..7)?;
    scheme.eq_ignore_ascii_case("bearer ").then_some(value)
}

/// `Set-Cookie` value storing a freshly issued token.
///
/// The value is quoted because it contains a space.
///
/// # Errors
///
/// Returns error if the token contains characters not allowed in a header.
pub fn set_session_cookie(token: &str, max_age: Duration) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{ACCESS_TOKEN_COOKIE}=\"Bearer {token}\"; HttpOnly; Max-Age={}; Path=/; SameSite=Lax",
        max_age.as_secs()
    ))
}

/// `Set-Cookie` value that removes the session cookie.
#[must_use]
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("access_token=\"\"; HttpOnly; Max-Age=0; Path=/; SameSite=Lax")
}
