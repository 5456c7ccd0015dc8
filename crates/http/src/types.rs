//! Wire types exchanged with the H-Bank API

use serde::{Deserialize, Serialize};

/// Envelope every H-Bank JSON response carries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseResponse {
    pub success: bool,
    pub message: String,
}

/// Response of `GET /status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub base: BaseResponse,
    /// Absent when the server could not produce its limits
    #[serde(default)]
    pub config: Option<ServerConfig>,
}

/// Operational limits published by the server
///
/// Every field has a default so an empty object deserializes, and
/// `ServerConfig::default()` stands in when no configuration was delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub captcha_enabled: bool,
    pub email_enabled: bool,
    pub min_name_length: u32,
    pub max_name_length: u32,
    pub min_description_length: u32,
    pub max_description_length: u32,
    pub min_password_length: u32,
    pub max_password_length: u32,
    pub min_email_length: u32,
    pub max_email_length: u32,
    /// Bytes
    pub max_profile_picture_file_size: i64,
    /// Seconds
    pub login_token_lifetime: i64,
    /// Seconds
    pub email_code_lifetime: i64,
    /// Seconds
    pub auth_token_lifetime: i64,
    /// Seconds
    pub refresh_token_lifetime: i64,
    /// Seconds
    pub send_email_timeout: i64,
    pub max_page_size: u32,
    pub id_provider: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_response_with_config() {
        let body = json!({
            "success": true,
            "message": "online",
            "config": {
                "captchaEnabled": true,
                "emailEnabled": false,
                "minNameLength": 3,
                "maxNameLength": 30,
                "maxProfilePictureFileSize": 10_000_000,
                "authTokenLifetime": 1800,
                "maxPageSize": 100,
                "idProvider": "https://id.julianh.de"
            }
        });

        let status: StatusResponse = serde_json::from_value(body).unwrap();
        assert!(status.base.success);
        assert_eq!(status.base.message, "online");

        let config = status.config.unwrap();
        assert!(config.captcha_enabled);
        assert_eq!(config.max_name_length, 30);
        assert_eq!(config.max_profile_picture_file_size, 10_000_000);
        assert_eq!(config.auth_token_lifetime, 1800);
        assert_eq!(config.id_provider, "https://id.julianh.de");
        // Fields the server omitted fall back to defaults
        assert_eq!(config.max_password_length, 0);
    }

    #[test]
    fn test_status_response_without_config() {
        let status: StatusResponse =
            serde_json::from_value(json!({ "success": false, "message": "x" })).unwrap();
        assert!(!status.base.success);
        assert_eq!(status.base.message, "x");
        assert!(status.config.is_none());
    }

    #[test]
    fn test_server_config_uses_camel_case() {
        let value = serde_json::to_value(ServerConfig::default()).unwrap();
        assert!(value.get("minPasswordLength").is_some());
        assert!(value.get("refreshTokenLifetime").is_some());
        assert!(value.get("idProvider").is_some());
    }
}
