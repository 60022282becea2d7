//! Core library for the kiosk CMS admin console.
//!
//! The centerpiece is the idle-timeout [`SessionSupervisor`]: it signs an
//! admin out after a configurable period without input, and catches
//! timeouts that elapsed while the console was closed.
//!
//! - `auth`: auth provider seam, hosted-backend and in-memory providers
//! - `store`: persistent key-value storage for the last-activity timestamp
//! - `supervisor`: the idle-timeout state machine
//! - `config`: configuration file and environment overrides

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod store;
pub mod supervisor;

pub use auth::{AuthProvider, Credentials, GoTrueAuth, MemoryAuthProvider, Session};
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use error::{AuthError, StoreError};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use supervisor::{
    ActivityKind, ActivityReporter, AuthState, SessionSupervisor, SupervisorHandle,
    LAST_ACTIVITY_KEY, SESSION_EXPIRED_REASON,
};
