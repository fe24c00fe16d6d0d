//! Carlot Auth - server-side sessions, signed credentials and the access guard
//!
//! A request presents an opaque session id; the session store resolves it to
//! the session payload, which embeds a signed credential. The
//! [`AccessGuard`] combines session expiry, credential verification and the
//! operation's [`AuthorizationRequirement`] into one decision.

pub mod error;
pub mod guard;
pub mod role;
pub mod session;
pub mod token;

pub use error::{AuthError, AuthResult, DenialReason, StoreError, TokenError};
pub use guard::{AccessGuard, CredentialVerifier, RequestContext};
pub use role::{AuthorizationRequirement, Identity, RoleId};
pub use session::{
    generate_session_id, CookiePolicy, MemorySessionRecordStore, PersistentSessionStore,
    SessionCookie, SessionData, SessionRecord, SessionRecordStore, SessionRecordUpdate,
    SessionSigner, SessionStore,
};
#[cfg(feature = "sqlite")]
pub use session::SqliteSessionRecordStore;
pub use token::{Credential, TokenService};
