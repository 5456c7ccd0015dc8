//! Single-flight token refresh and logout

use super::locks::LockManager;
use super::token::AuthToken;
use crate::client::HbankClient;
use crate::cookies::ID_TOKEN_COOKIE;
use tracing::{debug, info, warn};

/// Lock guarding every request that rewrites the identity cookies
pub const TOKEN_REFRESH_LOCK: &str = "token_refresh";

const REFRESH_FLIGHT: &str = "refresh";
const LOGOUT_FLIGHT: &str = "logout";

/// Serialises refresh and logout round-trips across all sessions sharing a
/// [`LockManager`]
///
/// When the cookie jar has a backing file the leader reloads it after taking
/// the lock and saves it before releasing, so a process that waited on
/// another one sees the cookies that process received.
#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    client: HbankClient,
    locks: LockManager,
}

impl RefreshCoordinator {
    pub fn new(client: HbankClient, locks: LockManager) -> Self {
        Self { client, locks }
    }

    /// Make sure a refresh has happened since this call started
    ///
    /// Callers queued behind an in-flight refresh reuse its outcome. The
    /// leader skips the round-trip when a usable token is already present.
    /// Failures are logged, never retried, and leave the cookie jar as it
    /// was.
    pub async fn refresh_once(&self) {
        let flight = self
            .locks
            .single_flight(TOKEN_REFRESH_LOCK, REFRESH_FLIGHT, || async {
                self.reload_cookies();
                if self.has_valid_token() {
                    debug!("Identity token already present, skipping refresh");
                    return;
                }

                match self.client.refresh().await {
                    Ok(status) if status.is_success() => debug!(%status, "Token refreshed"),
                    Ok(status) => info!(%status, "Token refresh rejected"),
                    Err(e) => warn!(error = %e, "Token refresh failed"),
                }
                self.save_cookies();
            })
            .await;

        if flight.is_joined() {
            debug!("Reused concurrent token refresh");
        }
    }

    /// Invalidate the server-side session once for all concurrent callers
    pub async fn logout_once(&self) {
        let flight = self
            .locks
            .single_flight(TOKEN_REFRESH_LOCK, LOGOUT_FLIGHT, || async {
                self.reload_cookies();
                match self.client.logout().await {
                    Ok(status) if status.is_success() => debug!(%status, "Logged out"),
                    Ok(status) => info!(%status, "Logout rejected by server"),
                    Err(e) => warn!(error = %e, "Logout request failed"),
                }
                self.client.cookies().expire(ID_TOKEN_COOKIE);
                self.save_cookies();
            })
            .await;

        if flight.is_joined() {
            debug!("Reused concurrent logout");
        }
    }

    fn reload_cookies(&self) {
        if let Err(e) = self.client.cookies().reload() {
            warn!(error = %e, "Failed to reload cookies, using the ones in memory");
        }
    }

    fn save_cookies(&self) {
        if let Err(e) = self.client.cookies().save() {
            warn!(error = %e, "Failed to save cookies");
        }
    }

    fn has_valid_token(&self) -> bool {
        self.client
            .cookies()
            .visible(ID_TOKEN_COOKIE)
            .and_then(|raw| AuthToken::decode(&raw).ok())
            .is_some_and(|token| !token.is_expired())
    }
}
