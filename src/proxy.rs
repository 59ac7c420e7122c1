//! Basic-auth gating reverse proxy
//!
//! Route services hand us the real destination in a header; the handler
//! gates on HTTP Basic credentials, then replays the request against the
//! forwarded URL with its path and query intact. All other headers pass
//! through untouched, including the route-service signature and metadata
//! headers.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::Router;
use base64::prelude::{Engine, BASE64_STANDARD};

/// Header carrying the URL to forward to.
pub const FORWARDED_URL_HEADER: &str = "X-CF-Forwarded-Url";

/// Credential-checking reverse proxy.
#[derive(Clone)]
pub struct AuthProxy {
    username: String,
    password: String,
    client: reqwest::Client,
}

impl AuthProxy {
    /// Create a proxy requiring `username`/`password`.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_tls_validation(username, password, true)
    }

    /// Create a proxy, optionally accepting invalid upstream certificates.
    pub fn with_tls_validation(
        username: impl Into<String>,
        password: impl Into<String>,
        validate_tls: bool,
    ) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(!validate_tls)
            .build()
            .expect("proxy HTTP client");

        Self {
            username: username.into(),
            password: password.into(),
            client,
        }
    }

    fn check_auth(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }

    async fn forward(&self, req: Request, url: reqwest::Url) -> Result<Response, reqwest::Error> {
        let (parts, body) = req.into_parts();

        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .unwrap_or_default();

        let mut headers = parts.headers;
        // The Host of the forwarded URL replaces ours; everything else is
        // preserved verbatim.
        headers.remove(header::HOST);

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let mut response = Response::builder().status(upstream.status());
        if let Some(headers) = response.headers_mut() {
            for (name, value) in upstream.headers() {
                if name != header::TRANSFER_ENCODING {
                    headers.append(name, value.clone());
                }
            }
        }

        let bytes = upstream.bytes().await?;
        Ok(response
            .body(Body::from(bytes))
            .expect("assemble proxied response"))
    }
}

/// Build the proxy router; every path and method is gated.
pub fn router(proxy: AuthProxy) -> Router {
    Router::new().fallback(handle).with_state(proxy)
}

async fn handle(State(proxy): State<AuthProxy>, req: Request) -> Response {
    match basic_credentials(req.headers()) {
        Some((username, password)) if proxy.check_auth(&username, &password) => {}
        _ => return unauthorized(),
    }

    let forwarded = req
        .headers()
        .get(FORWARDED_URL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let Some(forwarded) = forwarded else {
        return text_response(StatusCode::BAD_REQUEST, "Missing Forwarded URL");
    };

    let url = match reqwest::Url::parse(&forwarded) {
        Ok(url) => url,
        Err(e) => {
            return text_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid forward URL: {e}"),
            );
        }
    };

    match proxy.forward(req, url).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "proxied request failed");
            text_response(StatusCode::BAD_GATEWAY, "Bad Gateway")
        }
    }
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(BASE64_STANDARD.decode(encoded).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn unauthorized() -> Response {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(header::WWW_AUTHENTICATE, r#"Basic realm="auth""#)
        .body(Body::from("Unauthorized.\n"))
        .expect("assemble 401 response")
}

fn text_response(status: StatusCode, body: impl Into<String>) -> Response {
    Response::builder()
        .status(status)
        .body(Body::from(body.into()))
        .expect("assemble error response")
}
