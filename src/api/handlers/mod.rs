//! Route handlers and shared request helpers.

pub mod auth;
pub mod health;
pub mod me;
pub mod users;

use axum::http::{HeaderMap, header::USER_AGENT};

use crate::auth::ClientMeta;

/// Client IP taken from common proxy headers, if any.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// User agent and client IP recorded alongside refresh sessions.
pub(crate) fn client_meta(headers: &HeaderMap) -> ClientMeta {
    ClientMeta {
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        ip: extract_client_ip(headers),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extract_client_ip_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn extract_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("9.9.9.9".to_string()));
    }

    #[test]
    fn extract_client_ip_none_when_missing() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), None);
    }

    #[test]
    fn client_meta_reads_user_agent_and_ip() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.5.0"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.7"));

        let meta = client_meta(&headers);
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8.5.0"));
        assert_eq!(meta.ip.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn client_meta_tolerates_bare_requests() {
        let meta = client_meta(&HeaderMap::new());
        assert!(meta.user_agent.is_none());
        assert!(meta.ip.is_none());
    }
}
