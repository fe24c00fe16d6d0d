//! Session payload as seen by the HTTP layer

use carlot_core::{SessionConfig, MAX_SESSION_MAX_AGE_SECS};
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

/// Cookie metadata persisted alongside the session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    /// Lifetime in milliseconds the cookie was created with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_max_age: Option<i64>,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn default_path() -> String {
    "/".to_string()
}

/// Arbitrary session state plus the embedded credential.
///
/// Serialized as a flat JSON object: `{"cookie": {..}, "jwt": "..", ..}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub cookie: SessionCookie,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl SessionData {
    pub fn new(cookie: SessionCookie) -> Self {
        Self {
            cookie,
            jwt: None,
            values: Map::new(),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.cookie.expires
    }

    /// Embedded credential, if sign-in completed
    pub fn credential(&self) -> Option<&str> {
        self.jwt.as_deref().filter(|token| !token.is_empty())
    }

    pub fn set_credential(&mut self, token: impl Into<String>) {
        self.jwt = Some(token.into());
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), serde_json::Error> {
        self.values
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }
}

/// Cookie settings applied to every new session
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub name: String,
    pub max_age: Duration,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<String>,
}

impl CookiePolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            max_age: Duration::seconds(config.max_age_secs.min(MAX_SESSION_MAX_AGE_SECS) as i64),
            path: config.path.clone(),
            http_only: config.http_only,
            secure: config.secure,
            same_site: config.same_site.clone(),
        }
    }

    /// Cookie metadata for a session started at `now`.
    ///
    /// Expiry saturates at the latest representable instant.
    pub fn stamp(&self, now: DateTime<Utc>) -> SessionCookie {
        let expires = now
            .checked_add_signed(self.max_age)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        SessionCookie {
            expires: Some(expires),
            original_max_age: Some(self.max_age.num_milliseconds()),
            path: self.path.clone(),
            http_only: self.http_only,
            secure: self.secure,
            same_site: self.same_site.clone(),
        }
    }

    /// Fresh, empty session
    pub fn new_session(&self, now: DateTime<Utc>) -> SessionData {
        SessionData::new(self.stamp(now))
    }
}
