use std::convert::Infallible;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Multipart, Request, State};
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::{Form, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::directory;
use crate::err::{Error, Success};
use crate::models::{Identity, Role};
use crate::service::Service;
use crate::session::{Session, SessionStore};
use crate::{proceeds, Message, Payload};

pub const SESSION_COOKIE: &str = "session";

/// The session presented with a request, if any.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    token: Option<String>,
    session: Option<Session>,
}

impl Caller {
    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|session| &session.identity)
    }

    /// Any live session will do.
    pub fn authenticated(&self) -> Result<Identity, Error> {
        self.identity()
            .cloned()
            .ok_or_else(|| Error::unauthenticated("Not logged in"))
    }

    /// `denial` is reported both when there is no session and when the
    /// session holds a different role.
    pub fn require(&self, role: Role, denial: &str) -> Result<Identity, Error> {
        let identity = self
            .identity()
            .cloned()
            .ok_or_else(|| Error::unauthenticated(denial))?;
        if identity.role != role {
            return Err(Error::forbidden(denial));
        }
        Ok(identity)
    }
}

pub fn current_identity(headers: &HeaderMap, sessions: &SessionStore) -> Caller {
    let Some(token) = extract_session_token(headers) else {
        return Caller::default();
    };
    let session = sessions.resolve(&token);
    Caller {
        token: Some(token),
        session,
    }
}

#[async_trait]
impl FromRequestParts<Arc<Service>> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        service: &Arc<Service>,
    ) -> Result<Self, Self::Rejection> {
        Ok(current_identity(&parts.headers, &service.sessions))
    }
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            if key.trim() == SESSION_COOKIE && !val.trim().is_empty() {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}

fn session_cookie(token: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .map_err(|err| Error::InternalError {
        kind: "HeaderError",
        message: err.to_string(),
    })
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

/// Login fields from either an urlencoded or a `multipart/form-data` body.
#[async_trait]
impl FromRequest<Arc<Service>> for LoginForm {
    type Rejection = Error;

    async fn from_request(req: Request, service: &Arc<Service>) -> Result<Self, Self::Rejection> {
        let multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));
        if !multipart {
            let Form(form) = Form::<LoginForm>::from_request(req, service).await?;
            return Ok(form);
        }

        let mut multipart = Multipart::from_request(req, service).await?;
        let mut username = None;
        let mut password = None;
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("username") => username = Some(field.text().await?),
                Some("password") => password = Some(field.text().await?),
                _ => {}
            }
        }
        match (username, password) {
            (Some(username), Some(password)) => Ok(LoginForm { username, password }),
            (None, _) => Err(Error::invalid_payload("missing field `username`")),
            (_, None) => Err(Error::invalid_payload("missing field `password`")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedIn {
    message: String,
    username: String,
    name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Me {
    user: Option<Identity>,
}

pub async fn login(
    State(service): State<Arc<Service>>,
    LoginForm { username, password }: LoginForm,
) -> Result<(HeaderMap, Json<Success<LoggedIn>>), Error> {
    let accounts = service.accounts().await?;
    let Some(account) = directory::authenticate(&accounts, &username, &password) else {
        log::info!("Rejected login for `{}`", username);
        return Err(Error::InvalidCredentials {
            message: "Invalid username or password".to_string(),
        });
    };

    let identity = Identity::from(account);
    let token = service.sessions.create(identity.clone());
    log::info!(
        "`{}` logged in, {} active sessions",
        identity.username,
        service.sessions.len()
    );

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, session_cookie(&token)?);
    Ok((
        headers,
        Json(Success::of(LoggedIn {
            message: "Login successful".to_string(),
            username: identity.username,
            name: identity.name,
        })),
    ))
}

pub async fn logout(
    State(service): State<Arc<Service>>,
    caller: Caller,
) -> Result<(HeaderMap, Json<Success<Message>>), Error> {
    let identity = caller.authenticated()?;
    if let Some(token) = &caller.token {
        service.sessions.destroy(token);
    }
    if let Some(session) = &caller.session {
        log::info!(
            "`{}` logged out after {} minutes",
            identity.username,
            (Utc::now() - session.logged_in_at).num_minutes()
        );
    }

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_session_cookie());
    Ok((
        headers,
        Json(Success::of(Message::new("Logged out successfully"))),
    ))
}

pub async fn me(caller: Caller) -> Payload<Me> {
    proceeds(Me {
        user: caller.identity().cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teacher() -> Identity {
        Identity {
            username: "teacher1".to_string(),
            name: "Ms. Smith".to_string(),
            role: Role::Teacher,
        }
    }

    fn cookie_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn token_is_read_from_cookie_list() {
        let headers = cookie_headers("theme=dark; session=abc123; lang=en");
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn empty_or_missing_cookie_has_no_token() {
        assert!(extract_session_token(&HeaderMap::new()).is_none());
        assert!(extract_session_token(&cookie_headers("session=")).is_none());
        assert!(extract_session_token(&cookie_headers("sessionx=abc")).is_none());
    }

    #[test]
    fn unknown_token_is_unauthenticated() {
        let sessions = SessionStore::new();
        let caller = current_identity(&cookie_headers("session=forged"), &sessions);
        assert!(caller.identity().is_none());
        assert_eq!(
            caller.require(Role::Teacher, "Only teachers can register students for activities"),
            Err(Error::unauthenticated(
                "Only teachers can register students for activities"
            ))
        );
        assert!(matches!(
            caller.authenticated(),
            Err(Error::Unauthenticated { .. })
        ));
    }

    #[test]
    fn live_token_resolves_teacher() {
        let sessions = SessionStore::new();
        let token = sessions.create(teacher());
        let caller = current_identity(&cookie_headers(&format!("session={token}")), &sessions);
        assert_eq!(caller.require(Role::Teacher, "denied").unwrap(), teacher());
        assert_eq!(caller.authenticated().unwrap(), teacher());
    }

    #[test]
    fn login_cookie_carries_token() {
        let cookie = session_cookie("abc").unwrap();
        assert!(cookie.to_str().unwrap().starts_with("session=abc;"));
        assert!(clear_session_cookie().to_str().unwrap().contains("Max-Age=0"));
    }
}
