//! Client-side navigation guard
//!
//! Decides, before a page is shown, whether the visitor may see it. Routes
//! that need an identity send unauthenticated visitors to the external login
//! page; the landing page sends authenticated visitors to the dashboard.

pub mod routes;

pub use routes::{Route, RouteAccess, RouteMatch, RouteTable};

use crate::session::Session;
use tracing::debug;
use url::Url;

/// Default target for authenticated visitors of anonymous-only routes
pub const DEFAULT_AUTHENTICATED_ROUTE: &str = "/dashboard";

/// Outcome of a navigation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Show the page; the title is an i18n key
    Proceed { page_title: Option<String> },
    /// Navigate to another client route
    Redirect(String),
    /// Leave the client (login page)
    ExternalRedirect(Url),
}

/// Navigation guard over a [`RouteTable`]
#[derive(Debug, Clone)]
pub struct RouteGuard {
    routes: RouteTable,
    default_authenticated_route: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(RouteTable::hbank())
    }
}

impl RouteGuard {
    pub fn new(routes: RouteTable) -> Self {
        Self {
            routes,
            default_authenticated_route: DEFAULT_AUTHENTICATED_ROUTE.to_string(),
        }
    }

    /// Override where authenticated visitors of anonymous routes land
    pub fn with_default_authenticated_route(mut self, path: impl Into<String>) -> Self {
        self.default_authenticated_route = path.into();
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Check a navigation to `full_path` (path plus optional query)
    pub async fn before_each(&self, session: &Session, full_path: &str) -> Navigation {
        let Some(matched) = self.routes.match_path(full_path) else {
            return Navigation::Proceed { page_title: None };
        };
        let route = matched.route;

        match route.access {
            RouteAccess::Public => {}
            RouteAccess::Authenticated => {
                if session.resolve().await.is_empty() {
                    let login = session.client().login_url(full_path);
                    debug!(path = full_path, "Unauthenticated, redirecting to login");
                    return Navigation::ExternalRedirect(login);
                }
            }
            RouteAccess::Anonymous => {
                if !session.resolve().await.is_empty() {
                    debug!(path = full_path, "Already authenticated, redirecting");
                    return Navigation::Redirect(self.default_authenticated_route.clone());
                }
            }
        }

        Navigation::Proceed {
            page_title: route.title_key(),
        }
    }
}
