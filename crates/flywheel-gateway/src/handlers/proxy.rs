//! Reverse proxy front end.
//!
//! Every request outside the control API pings the authority. The `flywheel`
//! query parameter carries a directive (`flywheel=start` starts a stopped
//! pool); requests carrying it are redirected to the same URL without it.
//! Depending on the state the request is then forwarded to the backend or
//! answered with a page.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use flywheel_control::Ping;
use flywheel_core::State as FlywheelState;

use crate::error::ApiError;
use crate::pages;
use crate::state::GatewayState;

/// Query parameter carrying the flywheel directive.
pub const DIRECTIVE_PARAM: &str = "flywheel";

/// Headers that apply to a single connection and are never forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Keys are compared after percent-decoding.
fn is_directive(pair: &str) -> bool {
    form_urlencoded::parse(pair.as_bytes())
        .next()
        .is_some_and(|(key, _)| key == DIRECTIVE_PARAM)
}

/// Decoded value of the first `flywheel` parameter in a raw query string.
#[must_use]
pub fn directive(query: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == DIRECTIVE_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// The raw query string with every `flywheel` parameter removed. Other
/// parameters are kept byte for byte.
#[must_use]
pub fn strip_directive(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| !pair.is_empty() && !is_directive(pair))
        .collect::<Vec<_>>()
        .join("&")
}

fn with_query(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

/// The request URL without directives, plus `flywheel=start`.
fn start_link(uri: &Uri) -> String {
    let query = strip_directive(uri.query().unwrap_or(""));
    let query = if query.is_empty() {
        format!("{DIRECTIVE_PARAM}=start")
    } else {
        format!("{query}&{DIRECTIVE_PARAM}=start")
    };
    with_query(uri.path(), &query)
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Fallback handler for everything outside the control API.
pub async fn proxy(State(state): State<Arc<GatewayState>>, request: Request) -> Response {
    let uri = request.uri().clone();
    let query = uri.query().unwrap_or("");
    let directive = directive(query);

    let ping = if directive.as_deref() == Some("start") {
        Ping::start()
    } else {
        Ping::traffic()
    };

    let pong = match state.flywheel.ping(ping).await {
        Ok(pong) => pong,
        Err(e) => return ApiError::from(e).into_response(),
    };

    if directive.is_some() {
        let location = with_query(uri.path(), &strip_directive(query));
        return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
    }

    if let Some(error) = &pong.error {
        return pages::error(error);
    }

    match pong.status {
        FlywheelState::Stopped => pages::stopped(&start_link(&uri)),
        FlywheelState::Starting | FlywheelState::Stopping | FlywheelState::Unhealthy => {
            pages::holding(pong.status)
        }
        FlywheelState::Started => forward(&state, request).await,
    }
}

/// Forward `request` to the backend for its host and relay the response.
async fn forward(state: &GatewayState, request: Request) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok());

    let Some(endpoint) = state.config.resolve_endpoint(host) else {
        tracing::error!(host = ?host, "No backend endpoint configured for host");
        return ApiError::InvalidEndpoint.into_response();
    };

    let (parts, body) = request.into_parts();
    let url = format!(
        "http://{endpoint}{}",
        with_query(parts.uri.path(), &strip_directive(parts.uri.query().unwrap_or("")))
    );

    let body = match axum::body::to_bytes(body, state.config.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ApiError::BadRequest(format!("failed to read request body: {e}"))
                .into_response()
        }
    };

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    tracing::debug!(method = %parts.method, url = %url, "Forwarding request");

    let response = match state
        .client
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Backend request failed");
            return ApiError::BadGateway(e.to_string()).into_response();
        }
    };

    let status = response.status();
    let mut headers = response.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut relayed = Response::new(Body::from_stream(response.bytes_stream()));
    *relayed.status_mut() = status;
    *relayed.headers_mut() = headers;
    relayed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_directive() {
        assert_eq!(directive("flywheel=start").as_deref(), Some("start"));
        assert_eq!(directive("a=1&flywheel=start&b=2").as_deref(), Some("start"));
        assert_eq!(directive("a=1&flywheel").as_deref(), Some(""));
        assert_eq!(
            directive("a=1&flywheel=now&flywheel=start").as_deref(),
            Some("now")
        );
        assert_eq!(directive("flywheels=start"), None);
        assert_eq!(directive(""), None);
    }

    #[test]
    fn encoded_directive_is_decoded() {
        assert_eq!(directive("fly%77heel=start").as_deref(), Some("start"));
        assert_eq!(directive("flywheel=st%61rt").as_deref(), Some("start"));
        assert_eq!(strip_directive("a=1&fly%77heel=start"), "a=1");
        assert_eq!(strip_directive("FLYWHEEL=start"), "FLYWHEEL=start");
    }

    #[test]
    fn strips_every_directive() {
        assert_eq!(strip_directive("flywheel=start"), "");
        assert_eq!(strip_directive("a=1&flywheel=start&b=2"), "a=1&b=2");
        assert_eq!(strip_directive("flywheel&a=1&flywheel=x"), "a=1");
        assert_eq!(strip_directive("a=%20b&&c"), "a=%20b&c");
    }

    #[test]
    fn start_link_appends_directive() {
        let uri: Uri = "/docs?page=2".parse().unwrap();
        assert_eq!(start_link(&uri), "/docs?page=2&flywheel=start");

        let uri: Uri = "/".parse().unwrap();
        assert_eq!(start_link(&uri), "/?flywheel=start");

        let uri: Uri = "/x?flywheel=stop".parse().unwrap();
        assert_eq!(start_link(&uri), "/x?flywheel=start");
    }

    #[test]
    fn hop_by_hop_headers_are_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "keep-alive".parse().unwrap());
        headers.insert("keep-alive", "timeout=5".parse().unwrap());
        headers.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());

        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }
}
