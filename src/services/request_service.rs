use axum::http::{HeaderMap, Uri, header, uri::Authority};

use crate::session::Session;

/// Session key holding the last page the user looked at.
pub const PREVIOUS_URL_KEY: &str = "previousUrl";

/// RequestService
///
/// Request helpers shared by middleware: where "back" is, and whether a request came from
/// script rather than a page navigation.
pub struct RequestService;

impl RequestService {
    /// get_referer
    ///
    /// The `Referer` header when it points at this host; otherwise the previous URL recorded
    /// in the session; otherwise the site root. Foreign referers are never used as redirect
    /// targets. The host comes from `Host`, or from the URI authority on HTTP/2.
    pub fn get_referer(headers: &HeaderMap, uri: &Uri, session: &Session) -> String {
        let fallback = || {
            session
                .get_as::<String>(PREVIOUS_URL_KEY)
                .unwrap_or_else(|| "/".to_string())
        };

        let Some(referer) = headers
            .get(header::REFERER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
        else {
            return fallback();
        };

        let referer_host = referer
            .parse::<Uri>()
            .ok()
            .and_then(|uri| uri.host().map(str::to_ascii_lowercase));
        let request_host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<Authority>().ok())
            .map(|authority| authority.host().to_ascii_lowercase())
            .or_else(|| uri.host().map(str::to_ascii_lowercase));

        match (referer_host, request_host) {
            (Some(referer_host), Some(request_host)) if referer_host == request_host => {
                referer.to_string()
            }
            _ => fallback(),
        }
    }

    pub fn is_xhr(headers: &HeaderMap) -> bool {
        headers
            .get("x-requested-with")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("XMLHttpRequest"))
    }
}
