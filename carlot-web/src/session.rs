//! Cookie-backed server-side sessions
//!
//! The cookie carries only the signed session id. Sessions are loaded through
//! the [`SessionStore`] on the way in and written back on the way out when a
//! handler changed them.

use crate::error::ApiError;
use crate::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use carlot_auth::{
    generate_session_id, CookiePolicy, Identity, RequestContext, SessionData, SessionStore,
    StoreError,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug)]
struct SessionState {
    id: String,
    data: SessionData,
    /// Loaded from the store rather than started by this request
    persisted: bool,
    modified: bool,
    destroyed: bool,
}

/// Handle to the current request's session
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    store: Arc<dyn SessionStore>,
}

impl Session {
    fn resumed(id: String, data: SessionData, store: Arc<dyn SessionStore>) -> Self {
        Self::build(id, data, true, store)
    }

    fn started(policy: &CookiePolicy, store: Arc<dyn SessionStore>) -> Self {
        Self::build(
            generate_session_id(),
            policy.new_session(Utc::now()),
            false,
            store,
        )
    }

    fn build(id: String, data: SessionData, persisted: bool, store: Arc<dyn SessionStore>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                id,
                data,
                persisted,
                modified: false,
                destroyed: false,
            })),
            store,
        }
    }

    pub async fn id(&self) -> String {
        self.state.lock().await.id.clone()
    }

    /// Embed a freshly minted credential
    pub async fn set_credential(&self, token: String) {
        let mut state = self.state.lock().await;
        state.data.set_credential(token);
        state.modified = true;
    }

    /// Delete the session now; the response clears the cookie
    pub async fn destroy(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        self.store.destroy(&state.id).await?;
        state.destroyed = true;
        debug!("Session destroyed");
        Ok(())
    }

    /// Record that the session was already removed elsewhere
    pub async fn invalidate(&self) {
        self.state.lock().await.destroyed = true;
    }

    /// Snapshot handed to the access guard
    pub async fn guard_context(&self) -> SessionContext {
        let state = self.state.lock().await;
        // A session started by this request was never presented by the caller
        if state.persisted && !state.destroyed {
            SessionContext {
                session_id: Some(state.id.clone()),
                session: Some(state.data.clone()),
                ..Default::default()
            }
        } else {
            SessionContext::default()
        }
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("session layer is not installed".to_string()))
    }
}

/// [`RequestContext`] over a session snapshot
#[derive(Debug, Default)]
pub struct SessionContext {
    session_id: Option<String>,
    session: Option<SessionData>,
    identity: Option<Identity>,
    invalidated: bool,
}

impl SessionContext {
    pub fn identity(&self) -> Option<Identity> {
        self.identity
    }

    pub fn was_invalidated(&self) -> bool {
        self.invalidated
    }
}

impl RequestContext for SessionContext {
    fn session_id(&self) -> Option<String> {
        self.session_id.clone()
    }

    fn session(&self) -> Option<SessionData> {
        self.session.clone()
    }

    fn attach_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    fn session_invalidated(&mut self) {
        self.invalidated = true;
    }
}

/// Resolve the session for the request and persist it afterwards
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let store: Arc<dyn SessionStore> = state.sessions.clone();
    let policy = state.cookie_policy.as_ref();

    let presented = cookie_value(request.headers(), &policy.name).and_then(|raw| {
        let id = state.signer.decode_cookie(&raw);
        if id.is_none() {
            warn!("Ignoring session cookie with an invalid signature");
        }
        id
    });

    let mut stale_cookie = false;
    let session = match presented {
        Some(id) => match store.get(&id).await? {
            Some(data) => Session::resumed(id, data, store.clone()),
            None => {
                debug!("Presented session is unknown or expired; starting a new one");
                stale_cookie = true;
                destroy_in_background(store.clone(), id);
                Session::started(policy, store.clone())
            }
        },
        None => Session::started(policy, store.clone()),
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    let session_state = session.state.lock().await;
    if session_state.destroyed {
        if session_state.persisted || stale_cookie {
            append_cookie(&mut response, clear_cookie_header(policy))?;
        }
        return Ok(response);
    }

    if session_state.modified {
        store.set(&session_state.id, &session_state.data).await?;
        let value = state.signer.encode_cookie(&session_state.id);
        append_cookie(
            &mut response,
            set_cookie_header(policy, &value, session_state.data.expires_at()),
        )?;
    } else if stale_cookie {
        append_cookie(&mut response, clear_cookie_header(policy))?;
    }

    Ok(response)
}

fn destroy_in_background(store: Arc<dyn SessionStore>, id: String) {
    tokio::spawn(async move {
        if let Err(e) = store.destroy(&id).await {
            warn!("Failed to remove stale session: {}", e);
        }
    });
}

fn append_cookie(response: &mut Response, cookie: String) -> Result<(), ApiError> {
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("invalid Set-Cookie header: {}", e)))?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(())
}

/// Raw value of the cookie called `name`
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

pub fn set_cookie_header(
    policy: &CookiePolicy,
    value: &str,
    expires: Option<DateTime<Utc>>,
) -> String {
    let mut cookie = format!("{}={}; Path={}", policy.name, value, policy.path);
    if let Some(expires) = expires {
        cookie.push_str(&format!("; Expires={}", expires.format(COOKIE_DATE_FORMAT)));
    }
    push_attributes(&mut cookie, policy);
    cookie
}

pub fn clear_cookie_header(policy: &CookiePolicy) -> String {
    let mut cookie = format!(
        "{}=; Path={}; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0",
        policy.name, policy.path
    );
    push_attributes(&mut cookie, policy);
    cookie
}

fn push_attributes(cookie: &mut String, policy: &CookiePolicy) {
    if policy.http_only {
        cookie.push_str("; HttpOnly");
    }
    if policy.secure {
        cookie.push_str("; Secure");
    }
    if let Some(same_site) = &policy.same_site {
        cookie.push_str(&format!("; SameSite={}", same_site));
    }
}
