//! Session cookie parsing for the cookie-based credential flow.

use axum::http::{header, HeaderMap};
use base64::Engine;
use serde_json::Value;

/// Raw value of cookie `name`, if the request carries it.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(header::COOKIE).iter() {
        let Ok(s) = cookie.to_str() else { continue; };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

/// Extract the access token from a session cookie value.
///
/// Accepted encodings: a bare token, a JSON object with `access_token`, a JSON
/// array whose first element is the token, or any of the JSON forms prefixed
/// with `base64-`. Values may be percent-encoded.
pub fn access_token_from_cookie(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).map(|c| c.into_owned()).unwrap_or_else(|_| raw.to_string());
    let value = decoded.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(b64) = value.strip_prefix("base64-") {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(b64.trim_end_matches('='))
            .or_else(|_| base64::engine::general_purpose::STANDARD.decode(b64))
            .ok()?;
        let text = String::from_utf8(bytes).ok()?;
        return token_from_json(&text);
    }
    if value.starts_with('{') || value.starts_with('[') {
        return token_from_json(value);
    }
    Some(value.to_string())
}

fn token_from_json(text: &str) -> Option<String> {
    let v: Value = serde_json::from_str(text).ok()?;
    let token = match &v {
        Value::Object(map) => map.get("access_token").and_then(|t| t.as_str()),
        Value::Array(items) => items.first().and_then(|t| t.as_str()),
        _ => None,
    }?;
    if token.is_empty() { None } else { Some(token.to_string()) }
}
