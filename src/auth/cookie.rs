//! Session cookie parsing and `Set-Cookie` values.

use crate::http::request::Headers;

/// Read a cookie value from the `Cookie` header (exact, case-sensitive name).
pub fn get_cookie<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .get("cookie")?
        .split(';')
        .filter_map(|part| part.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value carrying a fresh session token.
pub fn session_cookie(name: &str, token: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", name, token)
}

/// `Set-Cookie` value that expires the session cookie immediately.
pub fn clear_cookie(name: &str) -> String {
    format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", name)
}
