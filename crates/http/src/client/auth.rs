//! Authentication API client methods

use super::{ClientError, HbankClient};
use reqwest::{Method, StatusCode};
use url::Url;

impl HbankClient {
    /// Ask the server to reissue the identity cookies from the refresh
    /// cookie
    ///
    /// On success the new `ID-Token` lands in the cookie jar; the body is
    /// ignored. 401/403 come back as `Ok` with that status.
    pub async fn refresh(&self) -> Result<StatusCode, ClientError> {
        let request = self.request(Method::GET, "/auth/refresh");
        Ok(self.send(request).await?.status())
    }

    /// Invalidate the server-side session
    pub async fn logout(&self) -> Result<StatusCode, ClientError> {
        let request = self.request(Method::POST, "/auth/logout");
        Ok(self.send(request).await?.status())
    }

    /// External login page that sends the user back to `redirect` afterwards
    pub fn login_url(&self, redirect: &str) -> Url {
        let mut url = self.login_endpoint.clone();
        url.query_pairs_mut().append_pair("redirect", redirect);
        url
    }
}
