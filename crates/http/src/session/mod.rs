//! Session context: who is logged in, derived from the `ID-Token` cookie
//!
//! A [`Session`] owns the authentication state of one client context (one
//! browser tab, one CLI invocation). It reads identity from the cookie jar,
//! falls back to a coordinated token refresh when the cookie is missing, and
//! mirrors the result into a durable key-value store so other components can
//! read the user id without awaiting anything.
//!
//! Sessions built over the same [`HbankClient`] cookie jar, store and
//! [`LockManager`] behave like tabs of one browser: they share cookies and
//! never run overlapping refresh round-trips.
//!
//! None of the public operations fail. Network and storage problems are
//! logged and surface only as "not authenticated" or default configuration.

pub mod coordinator;
pub mod locks;
pub mod token;

pub use coordinator::{RefreshCoordinator, TOKEN_REFRESH_LOCK};
pub use locks::{Flight, LockManager};
pub use token::{AuthToken, TokenError};

use crate::client::HbankClient;
use crate::cookies::ID_TOKEN_COOKIE;
use crate::types::ServerConfig;
use hbank_core::KeyValueStore;
use std::sync::Arc;
use tokio::sync::{OnceCell, watch};
use tracing::{debug, warn};

/// Local storage key holding the authenticated user id
pub const USER_ID_KEY: &str = "userId";
/// Local storage key holding the token expiry (UTC seconds, decimal string)
pub const TOKEN_EXPIRY_KEY: &str = "authTokenExpiredAt";

/// Authentication state of a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub authenticated: bool,
    /// Empty when unauthenticated
    pub user_id: String,
    pub token_expiry: Option<i64>,
}

/// Session context for one client
pub struct Session {
    client: HbankClient,
    store: Arc<dyn KeyValueStore>,
    coordinator: RefreshCoordinator,
    state: watch::Sender<SessionState>,
    config: OnceCell<ServerConfig>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("client", &self.client)
            .field("state", &*self.state.borrow())
            .field("config_loaded", &self.config.initialized())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session; it starts unauthenticated until [`Session::resolve`]
    pub fn new(client: HbankClient, store: Arc<dyn KeyValueStore>, locks: LockManager) -> Self {
        let coordinator = RefreshCoordinator::new(client.clone(), locks);
        Self {
            client,
            store,
            coordinator,
            state: watch::Sender::new(SessionState::default()),
            config: OnceCell::new(),
        }
    }

    /// The client this session talks through
    pub fn client(&self) -> &HbankClient {
        &self.client
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Whether the last resolution found a valid identity
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().authenticated
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolve the current user id, refreshing the token if needed
    ///
    /// Returns the subject of a valid `ID-Token` cookie without touching the
    /// network. Otherwise runs one coordinated refresh and checks the cookie
    /// again. Returns an empty string when still unauthenticated.
    pub async fn resolve(&self) -> String {
        if let Some(token) = self.read_token() {
            return self.accept(token);
        }

        self.coordinator.refresh_once().await;

        if let Some(token) = self.read_token() {
            return self.accept(token);
        }

        debug!("No identity token after refresh, session is unauthenticated");
        self.state.send_replace(SessionState::default());
        String::new()
    }

    /// Log out on the server, then clear local identity unconditionally
    pub async fn logout(&self) {
        self.coordinator.logout_once().await;

        for key in [USER_ID_KEY, TOKEN_EXPIRY_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "Failed to clear local identity");
            }
        }
        self.state.send_replace(SessionState::default());
        self.client.cookies().expire(ID_TOKEN_COOKIE);
        debug!("Local session cleared");
    }

    /// Server configuration, fetched once and cached for the session
    ///
    /// Until a fetch delivers a configuration every call returns
    /// `ServerConfig::default()` and the next call tries again.
    pub async fn config(&self) -> ServerConfig {
        match self
            .config
            .get_or_try_init(|| self.client.fetch_config())
            .await
        {
            Ok(config) => config.clone(),
            Err(e) => {
                warn!(error = %e, "Failed to load server configuration");
                ServerConfig::default()
            }
        }
    }

    fn read_token(&self) -> Option<AuthToken> {
        let raw = self.client.cookies().visible(ID_TOKEN_COOKIE)?;
        match AuthToken::decode(&raw) {
            Ok(token) if token.is_expired() => {
                debug!(exp = token.exp, "Identity token expired");
                None
            }
            Ok(token) => Some(token),
            Err(e) => {
                debug!(error = %e, "Unreadable identity token");
                None
            }
        }
    }

    fn accept(&self, token: AuthToken) -> String {
        if let Err(e) = self.store.set(USER_ID_KEY, &token.sub) {
            warn!(key = USER_ID_KEY, error = %e, "Failed to cache identity");
        }
        if let Err(e) = self.store.set(TOKEN_EXPIRY_KEY, &token.exp.to_string()) {
            warn!(key = TOKEN_EXPIRY_KEY, error = %e, "Failed to cache identity");
        }

        self.state.send_replace(SessionState {
            authenticated: true,
            user_id: token.sub.clone(),
            token_expiry: Some(token.exp),
        });

        token.sub
    }
}
