//! Route table and path matching

use std::collections::HashMap;

/// Who may visit a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Anyone; identity is never checked
    Public,
    /// Requires a resolved identity
    Authenticated,
    /// Only for visitors without an identity (landing page)
    Anonymous,
}

/// A client route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Route name, `None` for the catch-all
    pub name: Option<&'static str>,
    /// Path pattern; `:name` segments bind parameters, `*` matches anything
    pub path: &'static str,
    pub access: RouteAccess,
    /// Page title key below `pageTitles.`
    pub page_title: Option<&'static str>,
}

impl Route {
    const fn new(
        name: &'static str,
        path: &'static str,
        access: RouteAccess,
        page_title: Option<&'static str>,
    ) -> Self {
        Self {
            name: Some(name),
            path,
            access,
            page_title,
        }
    }

    fn is_catch_all(&self) -> bool {
        self.path == "*"
    }

    /// Full i18n key of the page title
    pub fn title_key(&self) -> Option<String> {
        self.page_title.map(|key| format!("pageTitles.{key}"))
    }
}

/// A route matched against a concrete path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: HashMap<String, String>,
}

/// Ordered set of routes
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

use RouteAccess::{Anonymous, Authenticated, Public};

const HBANK_ROUTES: &[Route] = &[
    Route::new("home", "/", Anonymous, None),
    Route::new("privacyPolicy", "/privacy_policy", Public, Some("privacy-policy")),
    Route::new("settings", "/settings", Authenticated, Some("settings")),
    Route::new("dashboard", "/dashboard", Authenticated, Some("dashboard")),
    Route::new("cash", "/cash", Authenticated, Some("cash")),
    Route::new("cashLog", "/cash/log", Authenticated, Some("cash-log")),
    Route::new("cashDetails", "/cash/:entryId", Authenticated, Some("cash-log-entry")),
    Route::new("invitations", "/invitations", Authenticated, Some("invitations")),
    Route::new("group", "/group/:id", Authenticated, None),
    Route::new("groupSettings", "/group/:id/settings", Authenticated, None),
    Route::new("transfer", "/group/:id/transfer", Authenticated, Some("transfer")),
    Route::new("invite", "/group/:id/invite", Authenticated, Some("invite")),
    Route::new("transactions", "/group/:id/transaction", Authenticated, Some("transactions")),
    Route::new(
        "transactionDetails",
        "/group/:id/transaction/:transactionId",
        Authenticated,
        Some("transaction-details"),
    ),
    Route::new(
        "createPaymentPlan",
        "/group/:id/payment-plan/create",
        Authenticated,
        Some("payment-plan"),
    ),
    Route::new("paymentPlans", "/group/:id/payment-plan", Authenticated, Some("payment-plans")),
    Route::new(
        "paymentPlanDetails",
        "/group/:id/payment-plan/:paymentPlanId",
        Authenticated,
        Some("payment-plan-details"),
    ),
    Route::new(
        "updatePaymentPlan",
        "/group/:id/payment-plan/:paymentPlanId/update",
        Authenticated,
        Some("payment-plan"),
    ),
    Route::new("membersList", "/group/:id/user", Authenticated, Some("members")),
    Route::new("createGroup", "/group/create", Authenticated, Some("group-create")),
    Route::new("error", "/error", Public, None),
    Route {
        name: None,
        path: "*",
        access: Public,
        page_title: None,
    },
];

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The H-Bank web client routes
    pub fn hbank() -> Self {
        Self::new(HBANK_ROUTES.to_vec())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Find a route by name
    pub fn by_name(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name == Some(name))
    }

    /// Match a full path (query and fragment are ignored)
    ///
    /// Static segments win over parameters at the first position where two
    /// candidates differ; the catch-all only matches when nothing else does.
    pub fn match_path(&self, full_path: &str) -> Option<RouteMatch<'_>> {
        let path = strip_query(full_path);
        let segments = split_segments(path);

        let mut best: Option<(Vec<bool>, RouteMatch<'_>)> = None;
        for route in self.routes.iter().filter(|r| !r.is_catch_all()) {
            let Some((rank, params)) = match_pattern(route.path, &segments) else {
                continue;
            };
            // Lexicographic compare: `true` (static) beats `false` (param)
            if best.as_ref().is_none_or(|(best_rank, _)| rank > *best_rank) {
                best = Some((rank, RouteMatch { route, params }));
            }
        }

        best.map(|(_, m)| m).or_else(|| {
            self.routes
                .iter()
                .find(|r| r.is_catch_all())
                .map(|route| RouteMatch {
                    route,
                    params: HashMap::new(),
                })
        })
    }
}

fn strip_query(full_path: &str) -> &str {
    let end = full_path.find(['?', '#']).unwrap_or(full_path.len());
    &full_path[..end]
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn match_pattern(pattern: &str, segments: &[&str]) -> Option<(Vec<bool>, HashMap<String, String>)> {
    let pattern = split_segments(pattern);
    if pattern.len() != segments.len() {
        return None;
    }

    let mut rank = Vec::with_capacity(pattern.len());
    let mut params = HashMap::new();
    for (expected, actual) in pattern.iter().zip(segments) {
        if let Some(name) = expected.strip_prefix(':') {
            params.insert(name.to_string(), (*actual).to_string());
            rank.push(false);
        } else if expected == actual {
            rank.push(true);
        } else {
            return None;
        }
    }
    Some((rank, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(path: &str) -> (Option<&'static str>, HashMap<String, String>) {
        let table = RouteTable::hbank();
        let m = table.match_path(path).unwrap();
        (m.route.name, m.params)
    }

    #[test]
    fn test_root_is_home() {
        assert_eq!(matched("/").0, Some("home"));
    }

    #[test]
    fn test_static_segment_beats_parameter() {
        assert_eq!(matched("/group/create").0, Some("createGroup"));
        assert_eq!(matched("/cash/log").0, Some("cashLog"));
        assert_eq!(matched("/group/7/payment-plan/create").0, Some("createPaymentPlan"));
    }

    #[test]
    fn test_parameters_are_bound() {
        let (name, params) = matched("/group/42/transaction/99");
        assert_eq!(name, Some("transactionDetails"));
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert_eq!(params.get("transactionId").map(String::as_str), Some("99"));
    }

    #[test]
    fn test_query_and_fragment_ignored() {
        assert_eq!(matched("/cash?page=2#top").0, Some("cash"));
        assert_eq!(matched("/settings/").0, Some("settings"));
    }

    #[test]
    fn test_unknown_path_hits_catch_all() {
        let table = RouteTable::hbank();
        let m = table.match_path("/does/not/exist").unwrap();
        assert!(m.route.name.is_none());
        assert_eq!(m.route.access, RouteAccess::Public);
    }

    #[test]
    fn test_title_keys() {
        let table = RouteTable::hbank();
        assert_eq!(
            table.by_name("cashLog").and_then(Route::title_key).as_deref(),
            Some("pageTitles.cash-log")
        );
        assert_eq!(table.by_name("group").and_then(Route::title_key), None);
    }

    #[test]
    fn test_table_without_catch_all() {
        let table = RouteTable::new(vec![Route::new("only", "/only", Public, None)]);
        assert!(table.match_path("/other").is_none());
    }
}
