use time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::auth::JwtConfig;

/// Cookie name for the access token
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Cookie name for the refresh token
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

fn session_cookie(
    name: &'static str,
    value: String,
    max_age_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_max_age(Duration::seconds(max_age_secs));
    cookie
}

/// Set both session cookies, each scoped to its token's lifetime.
pub fn set_session_cookies(
    cookies: &Cookies,
    jwt: &JwtConfig,
    secure: bool,
    access_token: &str,
    refresh_token: &str,
) {
    cookies.add(session_cookie(
        ACCESS_TOKEN_COOKIE,
        access_token.to_string(),
        jwt.access_ttl_secs(),
        secure,
    ));
    cookies.add(session_cookie(
        REFRESH_TOKEN_COOKIE,
        refresh_token.to_string(),
        jwt.refresh_ttl_secs(),
        secure,
    ));
}

/// Remove both session cookies by expiring them immediately.
pub fn clear_session_cookies(cookies: &Cookies, secure: bool) {
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        let mut cookie = Cookie::new(name, "");
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_secure(secure);
        cookie.set_max_age(Duration::seconds(-1));
        cookies.remove(cookie);
    }
}
