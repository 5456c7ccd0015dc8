//! H-Bank client session layer
//!
//! Talks to the H-Bank REST API over cookie-authenticated HTTP, derives the
//! logged-in user from the `ID-Token` cookie, refreshes tokens at most once
//! per concurrent burst and guards client routes on authentication state.

pub mod client;
pub mod cookies;
pub mod router;
pub mod session;
pub mod types;

pub use client::{ClientError, HbankClient, HbankClientBuilder};
pub use cookies::{CookieJar, ID_TOKEN_COOKIE, StoredCookie};
pub use router::{Navigation, RouteGuard, RouteTable};
pub use session::{LockManager, Session, SessionState};
pub use types::{ServerConfig, StatusResponse};
