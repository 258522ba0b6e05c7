//! Session cookie helpers — set/clear the httpOnly auth cookie.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Session cookie name.
pub const AUTH_COOKIE: &str = "auth_token";

/// Build the httpOnly cookie carrying a signed session token.
#[must_use]
pub fn auth_cookie(token: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

/// Build an expired cookie that clears the session on logout.
#[must_use]
pub fn clear_auth_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}
