//! Server-side sessions
//!
//! Records persist opaque payloads keyed by session id; the adapter exposes
//! the get/set/destroy contract the HTTP session layer consumes.

pub mod data;
#[cfg(feature = "sqlite")]
pub mod database;
pub mod record;
pub mod signature;
pub mod store;

pub use data::{CookiePolicy, SessionCookie, SessionData};
#[cfg(feature = "sqlite")]
pub use database::SqliteSessionRecordStore;
pub use record::{MemorySessionRecordStore, SessionRecord, SessionRecordStore, SessionRecordUpdate};
pub use signature::{generate_session_id, SessionSigner};
pub use store::{PersistentSessionStore, SessionStore};
