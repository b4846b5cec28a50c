use crate::logger::Logger;
use crate::middleware::{classify, instrument, Outcome, RequestStart};
use axum::body::{Body, HttpBody};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum::Router;
use std::net::SocketAddr;

/// Value of the `caller` field on entries emitted by [`request_logger`].
pub const CALLER: &str = "logtee::axum_middleware::request_logger";

/// Largest 4xx/5xx response body copied into the request entry.
///
/// Larger bodies, and bodies of unknown length, are streamed through
/// untouched and logged as the placeholder.
pub const MAX_LOGGED_BODY: usize = 64 * 1024;

/// Error messages a handler attaches to its response for the request log.
///
/// ```ignore
/// let mut resp = StatusCode::SERVICE_UNAVAILABLE.into_response();
/// resp.extensions_mut().insert(RequestErrors::from("db timeout"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestErrors(pub Vec<String>);

impl RequestErrors {
    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }
}

impl From<&str> for RequestErrors {
    fn from(message: &str) -> Self {
        RequestErrors(vec![message.to_string()])
    }
}

struct Reply {
    response: Response,
    body: Option<String>,
}

impl Reply {
    /// Buffer the body of a response whose entry records it.
    ///
    /// The response is rebuilt from the buffered bytes so the client still
    /// receives the same body.
    async fn capture(response: Response) -> Self {
        let wants_body = classify(response.status().as_u16()).1;
        let fits = response
            .body()
            .size_hint()
            .upper()
            .is_some_and(|len| len <= MAX_LOGGED_BODY as u64);
        if !wants_body || !fits {
            return Reply { response, body: None };
        }

        let (parts, body) = response.into_parts();
        match axum::body::to_bytes(body, MAX_LOGGED_BODY).await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                Reply {
                    response: Response::from_parts(parts, Body::from(bytes)),
                    body: Some(text),
                }
            }
            Err(e) => {
                eprintln!("failed to read response body for request log: {}", e);
                Reply {
                    response: Response::from_parts(parts, Body::empty()),
                    body: None,
                }
            }
        }
    }
}

impl Outcome for Reply {
    fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    fn error_message(&self) -> Option<String> {
        self.response
            .extensions()
            .get::<RequestErrors>()
            .filter(|errors| !errors.0.is_empty())
            .map(|errors| errors.0.join("; "))
    }

    fn response_body(&self) -> Option<String> {
        self.body.clone()
    }
}

/// axum middleware logging one entry per request.
///
/// Install with `axum::middleware::from_fn_with_state(logger, request_logger)`
/// or [`with_request_logging`]. Bodies of 4xx and 5xx responses up to
/// [`MAX_LOGGED_BODY`] are logged; other bodies are never buffered.
pub async fn request_logger(State(logger): State<Logger>, req: Request, next: Next) -> Response {
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| *addr);
    let start = RequestStart {
        method: req.method().to_string(),
        path: req.uri().path().to_string(),
        client_ip: client_ip(req.headers(), peer),
        user_agent: header(req.headers(), "user-agent"),
    };

    instrument(&logger, CALLER, start, async move { Reply::capture(next.run(req).await).await })
        .await
        .response
}

/// Wrap every route of `router` with [`request_logger`].
pub fn with_request_logging<S>(router: Router<S>, logger: Logger) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(axum::middleware::from_fn_with_state(logger, request_logger))
}

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = header(headers, "x-forwarded-for");
    if let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
        return first.to_string();
    }
    let real = header(headers, "x-real-ip");
    if !real.is_empty() {
        return real;
    }
    peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_forwarded_header_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer: SocketAddr = "10.0.0.5:4000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_real_ip_then_peer() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.5:4000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.5");
        assert_eq!(client_ip(&headers, None), "");

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, Some(peer)), "198.51.100.2");
    }
}
