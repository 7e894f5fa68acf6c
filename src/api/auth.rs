// src/api/auth.rs — Cookie-based route protection and bearer extraction

use axum::extract::Request;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

/// Cookie holding the bearer token issued at login.
pub const AUTH_COOKIE: &str = "authToken";

pub const LOGIN_PATH: &str = "/login";

/// Paths that bypass the middleware entirely (static assets).
const UNGUARDED_PREFIXES: [&str; 4] = ["/_next/static", "/_next/image", "/favicon.ico", "/public/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(&'static str),
}

/// Decide what happens to a request for `path`.
///
/// `/login*` and `/api/*` are open, except that a logged-in user hitting
/// `/login` goes back to `/`. Everything else needs the auth cookie.
pub fn route_decision(path: &str, authenticated: bool) -> RouteDecision {
    if UNGUARDED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return RouteDecision::Allow;
    }
    if path.starts_with(LOGIN_PATH) || path.starts_with("/api/") {
        if authenticated && path == LOGIN_PATH {
            return RouteDecision::Redirect("/");
        }
        return RouteDecision::Allow;
    }
    if !authenticated {
        return RouteDecision::Redirect(LOGIN_PATH);
    }
    RouteDecision::Allow
}

/// Value of cookie `name` from the `Cookie` header(s), if non-empty.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Token from an `Authorization: Bearer <token>` header. A header without
/// the scheme is taken as the raw token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// `Set-Cookie` value storing the auth token.
pub fn auth_cookie(token: &str, max_age_secs: i64) -> String {
    format!("{AUTH_COOKIE}={token}; Path=/; Max-Age={max_age_secs}; SameSite=Lax")
}

/// `Set-Cookie` value that removes the auth token.
pub fn clear_auth_cookie() -> String {
    format!("{AUTH_COOKIE}=; Path=/; Max-Age=0; SameSite=Lax")
}

/// axum middleware applying [`route_decision`].
pub async fn require_auth(request: Request, next: Next) -> Response {
    let authenticated = cookie_value(request.headers(), AUTH_COOKIE).is_some();
    match route_decision(request.uri().path(), authenticated) {
        RouteDecision::Allow => next.run(request).await,
        RouteDecision::Redirect(to) => {
            tracing::debug!("Redirecting {} -> {}", request.uri().path(), to);
            Redirect::temporary(to).into_response()
        }
    }
}
