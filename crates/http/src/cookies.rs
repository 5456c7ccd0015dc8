//! Cookie jar for the H-Bank origin
//!
//! The jar plays the role of the browser's cookie store for a single
//! deployment origin. It is installed as the `reqwest` cookie provider so
//! cookies set by the API (the `ID-Token`, its HttpOnly signature and the
//! refresh token) are replayed on later requests, and it exposes the subset
//! page script could read through [`CookieJar::visible`].
//!
//! The jar is bound to one host. Cookies are only accepted from and only
//! sent to that host, whatever URL a request ends up at.
//!
//! A jar may be backed by a JSON file shared between processes. Reads and
//! writes of that file go through [`CookieJar::reload`] and
//! [`CookieJar::save`]; callers that need a consistent view across
//! processes hold the cross-process refresh lock around both.

use cookie::{Cookie, SameSite};
use hbank_core::{CoreResult, write_atomic};
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use time::OffsetDateTime;
use tracing::debug;
use url::Url;

/// Name of the cookie carrying the unsigned part of the identity token
pub const ID_TOKEN_COOKIE: &str = "ID-Token";

/// Max-Age used when deleting a cookie
const DELETE_MAX_AGE_SECS: i64 = -99_999_999;

/// A cookie held by the jar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    /// Host the cookie was set by
    #[serde(default)]
    pub host: String,
    pub name: String,
    pub value: String,
    pub path: String,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    /// Unix timestamp, `None` for session cookies
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl StoredCookie {
    fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// RFC 6265 path-match
    fn matches_path(&self, request_path: &str) -> bool {
        if request_path == self.path {
            return true;
        }
        request_path.starts_with(&self.path)
            && (self.path.ends_with('/') || request_path[self.path.len()..].starts_with('/'))
    }
}

type CookieMap = BTreeMap<(String, String), StoredCookie>;

/// Cookie store scoped to one origin host
#[derive(Debug)]
pub struct CookieJar {
    host: String,
    cookies: RwLock<CookieMap>,
    backing_file: Option<PathBuf>,
}

impl CookieJar {
    /// Empty in-memory jar for `host`
    pub fn for_host(host: &str) -> Self {
        Self {
            host: host.to_ascii_lowercase(),
            cookies: RwLock::new(BTreeMap::new()),
            backing_file: None,
        }
    }

    /// Persist this jar to `path` through [`CookieJar::reload`] and
    /// [`CookieJar::save`]
    #[must_use]
    pub fn with_backing_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.backing_file = Some(path.into());
        self
    }

    /// Host the jar is bound to
    pub fn host(&self) -> &str {
        &self.host
    }

    fn is_origin(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.host))
    }

    /// Apply a raw `Set-Cookie` header received for `request_url`
    ///
    /// Headers from any host but the jar's own are ignored, as are cookies
    /// whose `Domain` attribute does not cover that host.
    pub fn apply_set_cookie(&self, header: &str, request_url: &Url) {
        if !self.is_origin(request_url) {
            debug!(
                host = request_url.host_str().unwrap_or_default(),
                origin = %self.host,
                "Ignoring Set-Cookie from foreign host"
            );
            return;
        }

        let cookie = match Cookie::parse(header.to_owned()) {
            Ok(cookie) => cookie,
            Err(err) => {
                debug!(error = %err, "Ignoring unparsable Set-Cookie header");
                return;
            }
        };

        if let Some(domain) = cookie.domain()
            && !domain_matches(&self.host, domain)
        {
            debug!(name = cookie.name(), domain, host = %self.host, "Ignoring cookie for foreign domain");
            return;
        }

        self.store(&cookie, request_url.path());
    }

    /// Insert, replace or delete a parsed cookie
    ///
    /// A non-positive `Max-Age` or an `Expires` in the past removes any
    /// cookie with the same name and path.
    pub fn store(&self, cookie: &Cookie<'_>, request_path: &str) {
        let now = now();
        let path = cookie
            .path()
            .filter(|path| path.starts_with('/'))
            .map_or_else(|| default_path(request_path), str::to_string);

        let expires_at = match (cookie.max_age(), cookie.expires_datetime()) {
            (Some(max_age), _) => Some(now.saturating_add(max_age.whole_seconds())),
            (None, Some(expires)) => Some(expires.unix_timestamp()),
            (None, None) => None,
        };

        let key = (cookie.name().to_string(), path.clone());
        let mut cookies = self.cookies.write().unwrap_or_else(PoisonError::into_inner);

        if expires_at.is_some_and(|expires_at| expires_at <= now) {
            if cookies.remove(&key).is_some() {
                debug!(name = cookie.name(), path = %path, "Cookie deleted");
            }
            return;
        }

        cookies.insert(
            key,
            StoredCookie {
                host: self.host.clone(),
                name: cookie.name().to_string(),
                value: cookie.value().to_string(),
                path,
                http_only: cookie.http_only().unwrap_or(false),
                secure: cookie.secure().unwrap_or(false),
                expires_at,
            },
        );
    }

    /// Value of a cookie readable by page script: unexpired and not HttpOnly
    pub fn visible(&self, name: &str) -> Option<String> {
        let now = now();
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cookie| cookie.name == name && !cookie.http_only && !cookie.is_expired_at(now))
            .max_by_key(|cookie| cookie.path.len())
            .map(|cookie| cookie.value.clone())
    }

    /// Delete a cookie the way page script does: overwrite it with a
    /// negative `Max-Age`
    pub fn expire(&self, name: &str) {
        let deletion = Cookie::build((name.to_string(), String::new()))
            .max_age(time::Duration::seconds(DELETE_MAX_AGE_SECS))
            .secure(true)
            .same_site(SameSite::Strict)
            .path("/")
            .build();
        self.store(&deletion, "/");
    }

    /// `Cookie` header value for a request to `url`
    pub fn header_for(&self, url: &Url) -> Option<String> {
        if !self.is_origin(url) {
            return None;
        }

        let now = now();
        let secure_channel = is_secure_channel(url);
        let cookies = self.cookies.read().unwrap_or_else(PoisonError::into_inner);

        let mut matching: Vec<&StoredCookie> = cookies
            .values()
            .filter(|cookie| !cookie.is_expired_at(now))
            .filter(|cookie| secure_channel || !cookie.secure)
            .filter(|cookie| cookie.matches_path(url.path()))
            .collect();

        if matching.is_empty() {
            return None;
        }

        // Longer paths first
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        Some(
            matching
                .iter()
                .map(|cookie| format!("{}={}", cookie.name, cookie.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Live cookies, for persistence
    pub fn snapshot(&self) -> Vec<StoredCookie> {
        let now = now();
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cookie| !cookie.is_expired_at(now))
            .cloned()
            .collect()
    }

    /// Load previously persisted cookies, skipping expired ones and those
    /// set by another host
    pub fn restore(&self, snapshot: Vec<StoredCookie>) {
        let mut cookies = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        self.insert_restored(&mut cookies, snapshot);
    }

    /// Replace the jar's contents with those of the backing file
    ///
    /// A missing file reads as an empty jar. Without a backing file this
    /// does nothing.
    pub fn reload(&self) -> CoreResult<()> {
        let Some(path) = &self.backing_file else {
            return Ok(());
        };

        let snapshot: Vec<StoredCookie> = match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let mut cookies = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        cookies.clear();
        self.insert_restored(&mut cookies, snapshot);
        debug!(path = %path.display(), count = cookies.len(), "Loaded cookies");
        Ok(())
    }

    /// Write the live cookies to the backing file, replacing it atomically
    pub fn save(&self) -> CoreResult<()> {
        let Some(path) = &self.backing_file else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(&self.snapshot())?;
        write_atomic(path, content.as_bytes())?;
        debug!(path = %path.display(), "Saved cookies");
        Ok(())
    }

    fn insert_restored(&self, cookies: &mut CookieMap, snapshot: Vec<StoredCookie>) {
        let now = now();
        for cookie in snapshot {
            if cookie.is_expired_at(now) || !cookie.host.eq_ignore_ascii_case(&self.host) {
                continue;
            }
            cookies.insert((cookie.name.clone(), cookie.path.clone()), cookie);
        }
    }
}

impl CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            match header.to_str() {
                Ok(raw) => self.apply_set_cookie(raw, url),
                Err(_) => debug!("Ignoring non-ASCII Set-Cookie header"),
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.header_for(url)
            .and_then(|header| HeaderValue::from_str(&header).ok())
    }
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// RFC 6265 default-path of a request path
fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    let host = host.to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}

fn is_secure_channel(url: &Url) -> bool {
    url.scheme() == "https"
        || matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "hbank.julianh.de";

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://{HOST}{path}")).unwrap()
    }

    fn jar() -> CookieJar {
        CookieJar::for_host(HOST)
    }

    #[test]
    fn test_set_cookie_is_replayed_on_matching_paths() {
        let jar = jar();
        jar.apply_set_cookie("ID-Token=abc.def; Path=/; Max-Age=1800", &url("/api/auth/refresh"));
        jar.apply_set_cookie(
            "Refresh-Token=r1; Path=/api/auth; HttpOnly; Secure",
            &url("/api/auth/refresh"),
        );

        assert_eq!(
            jar.header_for(&url("/api/auth/logout")).as_deref(),
            Some("Refresh-Token=r1; ID-Token=abc.def")
        );
        assert_eq!(
            jar.header_for(&url("/api/status")).as_deref(),
            Some("ID-Token=abc.def")
        );
        // Prefix without a segment boundary does not match
        assert_eq!(
            jar.header_for(&url("/api/authors")).as_deref(),
            Some("ID-Token=abc.def")
        );
    }

    #[test]
    fn test_visible_hides_http_only_cookies() {
        let jar = jar();
        jar.apply_set_cookie("ID-Token=abc.def; Path=/", &url("/"));
        jar.apply_set_cookie("ID-Token-Signature=sig; Path=/; HttpOnly", &url("/"));

        assert_eq!(jar.visible(ID_TOKEN_COOKIE).as_deref(), Some("abc.def"));
        assert_eq!(jar.visible("ID-Token-Signature"), None);
    }

    #[test]
    fn test_negative_max_age_deletes() {
        let jar = jar();
        jar.apply_set_cookie("ID-Token=abc.def; Path=/", &url("/"));
        jar.apply_set_cookie("ID-Token=; Path=/; Max-Age=0", &url("/"));

        assert_eq!(jar.visible(ID_TOKEN_COOKIE), None);
        assert!(jar.snapshot().is_empty());
    }

    #[test]
    fn test_expire_removes_id_token() {
        let jar = jar();
        jar.apply_set_cookie("ID-Token=abc.def; Path=/; Secure; SameSite=Strict", &url("/"));
        assert!(jar.visible(ID_TOKEN_COOKIE).is_some());

        jar.expire(ID_TOKEN_COOKIE);
        assert_eq!(jar.visible(ID_TOKEN_COOKIE), None);
    }

    #[test]
    fn test_past_expires_is_not_stored() {
        let jar = jar();
        jar.apply_set_cookie(
            "ID-Token=abc.def; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            &url("/"),
        );
        assert_eq!(jar.visible(ID_TOKEN_COOKIE), None);
    }

    #[test]
    fn test_foreign_domain_is_rejected() {
        let jar = jar();
        jar.apply_set_cookie("ID-Token=abc.def; Path=/; Domain=example.com", &url("/"));
        assert_eq!(jar.visible(ID_TOKEN_COOKIE), None);

        jar.apply_set_cookie("ID-Token=abc.def; Path=/; Domain=julianh.de", &url("/"));
        assert_eq!(jar.visible(ID_TOKEN_COOKIE).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_secure_cookie_not_sent_over_plain_http() {
        let jar = jar();
        jar.apply_set_cookie("ID-Token=abc.def; Path=/; Secure", &url("/"));

        let plain = Url::parse("http://hbank.julianh.de/api/status").unwrap();
        assert_eq!(jar.header_for(&plain), None);

        let loopback = Url::parse("http://127.0.0.1:8080/api/status").unwrap();
        let local = CookieJar::for_host("127.0.0.1");
        local.apply_set_cookie("ID-Token=abc.def; Path=/; Secure", &loopback);
        assert_eq!(local.header_for(&loopback).as_deref(), Some("ID-Token=abc.def"));
    }

    #[test]
    fn test_cookies_are_not_sent_to_other_hosts() {
        let jar = jar();
        jar.apply_set_cookie("Refresh-Token=r1; Path=/; HttpOnly; Secure", &url("/api/auth/refresh"));
        assert!(jar.header_for(&url("/api/auth/refresh")).is_some());

        let foreign = Url::parse("https://evil.example/api/auth/refresh").unwrap();
        assert_eq!(jar.header_for(&foreign), None);
        let sibling = Url::parse("https://julianh.de/api/auth/refresh").unwrap();
        assert_eq!(jar.header_for(&sibling), None);
    }

    #[test]
    fn test_set_cookie_from_other_host_is_ignored() {
        let jar = jar();
        let foreign = Url::parse("https://evil.example/").unwrap();
        jar.apply_set_cookie("ID-Token=forged.token; Path=/", &foreign);
        jar.apply_set_cookie("ID-Token=forged.token; Path=/; Domain=julianh.de", &foreign);

        assert_eq!(jar.visible(ID_TOKEN_COOKIE), None);
        assert!(jar.snapshot().is_empty());
    }

    #[test]
    fn test_host_comparison_ignores_case() {
        let jar = CookieJar::for_host("HBank.JulianH.de");
        jar.apply_set_cookie("ID-Token=abc.def; Path=/", &url("/"));
        assert_eq!(jar.header_for(&url("/")).as_deref(), Some("ID-Token=abc.def"));
    }

    #[test]
    fn test_restore_skips_cookies_of_other_hosts() {
        let other = CookieJar::for_host("other.example");
        let other_url = Url::parse("https://other.example/").unwrap();
        other.apply_set_cookie("ID-Token=theirs.token; Path=/", &other_url);

        let jar = jar();
        jar.restore(other.snapshot());
        assert_eq!(jar.visible(ID_TOKEN_COOKIE), None);
    }

    #[test]
    fn test_reload_replaces_contents_with_backing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");

        let writer = jar().with_backing_file(&path);
        writer.apply_set_cookie("ID-Token=abc.def; Path=/; Max-Age=1800", &url("/"));
        writer.save().unwrap();

        let reader = jar().with_backing_file(&path);
        reader.apply_set_cookie("Stale=1; Path=/", &url("/"));
        reader.reload().unwrap();
        assert_eq!(reader.visible(ID_TOKEN_COOKIE).as_deref(), Some("abc.def"));
        assert_eq!(reader.visible("Stale"), None);

        writer.expire(ID_TOKEN_COOKIE);
        writer.save().unwrap();
        reader.reload().unwrap();
        assert_eq!(reader.visible(ID_TOKEN_COOKIE), None);
    }

    #[test]
    fn test_reload_of_missing_or_corrupt_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");

        let jar = jar().with_backing_file(&path);
        jar.reload().unwrap();
        assert!(jar.snapshot().is_empty());

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            jar.reload(),
            Err(hbank_core::CoreError::Serialization { .. })
        ));
    }

    #[test]
    fn test_unbacked_jar_ignores_reload_and_save() {
        let jar = jar();
        jar.apply_set_cookie("ID-Token=abc.def; Path=/", &url("/"));
        jar.save().unwrap();
        jar.reload().unwrap();
        assert_eq!(jar.visible(ID_TOKEN_COOKIE).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_default_path_from_request() {
        assert_eq!(default_path("/api/auth/refresh"), "/api/auth");
        assert_eq!(default_path("/status"), "/");
        assert_eq!(default_path(""), "/");
    }

    #[test]
    fn test_snapshot_restore() {
        let jar = jar();
        jar.apply_set_cookie("ID-Token=abc.def; Path=/; Max-Age=1800", &url("/"));
        jar.apply_set_cookie("Refresh-Token=r1; Path=/api/auth; HttpOnly", &url("/"));

        let restored = self::jar();
        restored.restore(jar.snapshot());
        assert_eq!(restored.visible(ID_TOKEN_COOKIE).as_deref(), Some("abc.def"));
        assert_eq!(
            restored.header_for(&url("/api/auth/refresh")).as_deref(),
            Some("Refresh-Token=r1; ID-Token=abc.def")
        );
    }
}
