/**
 * Password hashing and the per-request identity
 */
use argon2::password_hash::{
    self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use log::*;
use serde::Serialize;
use tide::http::cookies::SameSite;
use tide::http::Cookie;
use tide::{Redirect, Request, Response};
use uuid::Uuid;

use crate::models::User;
use crate::AppState;

pub const SESSION_COOKIE: &str = "sessionid";
pub const LOGIN_URL: &str = "/accounts/login/";

/**
 * Hash a password into an argon2id PHC string
 */
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/**
 * Anything which does not parse as a PHC string never verifies
 */
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            warn!("Unreadable password hash: {}", err);
            false
        }
    }
}

/**
 * Everything a handler needs to know about who is making the request
 */
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub user: Option<User>,
    pub session: Option<Uuid>,
    /**
     * Path of the current request, used to come back after logging in
     */
    pub path: String,
}

impl RequestContext {
    pub async fn from_request(req: &Request<AppState>) -> tide::Result<Self> {
        let path = req.url().path().to_string();
        let token = req
            .cookie(SESSION_COOKIE)
            .and_then(|c| Uuid::parse_str(c.value()).ok());

        let user = match token {
            Some(token) => req.state().repo.session_user(token).await?,
            None => None,
        };
        if token.is_some() && user.is_none() {
            debug!("Ignoring stale session for {}", path);
        }

        Ok(Self {
            session: user.as_ref().and(token),
            user,
            path,
        })
    }

    pub fn anonymous(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /**
     * Bounce anonymous visitors to the login page, remembering where they were
     */
    pub fn login_redirect(&self) -> Response {
        #[derive(Serialize)]
        struct Next<'a> {
            next: &'a str,
        }

        match serde_qs::to_string(&Next { next: &self.path }) {
            Ok(query) => Redirect::new(format!("{}?{}", LOGIN_URL, query)).into(),
            Err(_) => Redirect::new(LOGIN_URL).into(),
        }
    }
}

pub fn session_cookie(token: Uuid) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::named(SESSION_COOKIE);
    cookie.set_path("/");
    cookie
}

/**
 * Only follow `next` back into this site
 */
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}
