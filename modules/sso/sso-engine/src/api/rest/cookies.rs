//! Cookie helpers for the ticket-granting and device cookies.

use axum::http::{HeaderMap, HeaderValue, header};

use crate::config::TgcConfig;
use crate::domain::session::DeviceContext;
use crate::domain::trust::fingerprint;

/// One year; the device cookie only identifies a browser.
const DEVICE_COOKIE_MAX_AGE: i64 = 365 * 24 * 60 * 60;

/// Value of the first cookie named `name`.
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn build(
    name: &str,
    value: &str,
    path: &str,
    secure: bool,
    max_age: Option<i64>,
) -> Option<HeaderValue> {
    let mut cookie = format!("{name}={value}; Path={path}; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={age}"));
    }
    HeaderValue::from_str(&cookie).ok()
}

/// Session cookie carrying the TGT id.
#[must_use]
pub fn tgc_cookie(cfg: &TgcConfig, tgt_id: &str) -> Option<HeaderValue> {
    build(&cfg.name, tgt_id, &cfg.path, cfg.secure, None)
}

#[must_use]
pub fn clear_tgc_cookie(cfg: &TgcConfig) -> Option<HeaderValue> {
    build(&cfg.name, "", &cfg.path, cfg.secure, Some(0))
}

/// Device context of the request. A browser without a device cookie gets a
/// fresh identifier, returned as the `Set-Cookie` value to send back.
#[must_use]
pub fn device_context(
    headers: &HeaderMap,
    cookie_name: &str,
    secure: bool,
) -> (DeviceContext, Option<HeaderValue>) {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);

    let (device_id, set_cookie) = match read_cookie(headers, cookie_name) {
        Some(id) => (id, None),
        None => {
            let id = uuid::Uuid::new_v4().simple().to_string();
            let cookie = build(cookie_name, &id, "/", secure, Some(DEVICE_COOKIE_MAX_AGE));
            (id, cookie)
        }
    };

    let fp = fingerprint(&device_id, user_agent.as_deref().unwrap_or_default());
    (
        DeviceContext {
            fingerprint: Some(fp),
            user_agent,
        },
        set_cookie,
    )
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn reads_named_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("a=1; TGC=TGT-1-abc; b=2"),
        );
        assert_eq!(read_cookie(&headers, "TGC").as_deref(), Some("TGT-1-abc"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn clearing_sets_zero_max_age() {
        let v = clear_tgc_cookie(&TgcConfig::default()).unwrap();
        let s = v.to_str().unwrap();
        assert!(s.starts_with("TGC=;"));
        assert!(s.contains("Max-Age=0"));
        assert!(s.contains("Secure"));
    }

    #[test]
    fn device_fingerprint_is_stable_for_same_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("MFADEVICE=dev-1"));
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("Firefox/126.0"),
        );

        let (first, set) = device_context(&headers, "MFADEVICE", false);
        let (second, _) = device_context(&headers, "MFADEVICE", false);
        assert!(set.is_none());
        assert_eq!(first.fingerprint, second.fingerprint);

        let (_, set) = device_context(&HeaderMap::new(), "MFADEVICE", false);
        assert!(set.is_some());
    }
}
