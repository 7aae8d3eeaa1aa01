//! # vantage_api_client
//!
//! HTTP client for the Vantage API that keeps the access-token lifecycle
//! invisible to callers.
//!
//! Every request carries the current access token. A `401` triggers one
//! refresh through `POST /auth/refresh` (the refresh cookie rides along in the
//! client's cookie jar), after which the original request is re-sent exactly
//! once. Concurrent `401`s share a single refresh call. When the refresh
//! fails the session is cleared and a [`SessionEvent::SignedOut`] is
//! published so the application can route back to its sign-in screen.

pub mod client;
pub mod error;
pub mod models;
pub mod session;

pub use client::{ApiClient, DEFAULT_TIMEOUT};
pub use error::ClientError;
pub use models::User;
pub use session::{MemoryTokenStore, Session, SessionEvent, SignOutReason, TokenStore};
