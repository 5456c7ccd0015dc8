//! Server configuration client methods

use crate::client::{ClientError, HbankClient};
use crate::types::{ServerConfig, StatusResponse};
use reqwest::Method;

impl HbankClient {
    /// Fetch the raw `/status` response
    pub async fn status(&self) -> Result<StatusResponse, ClientError> {
        let request = self.request(Method::GET, "/status");
        self.execute(request).await
    }

    /// Fetch the server's operational limits
    ///
    /// A response flagged `success: false` is logged with the server's
    /// message; its configuration is still used when present.
    pub async fn fetch_config(&self) -> Result<ServerConfig, ClientError> {
        let status = self.status().await?;
        if !status.base.success {
            tracing::error!("Server status reported failure: {}", status.base.message);
        }

        status
            .config
            .ok_or(ClientError::MissingConfig(status.base.message))
    }
}
