//! Helpers shared by the integration tests

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// `header.payload` identity token the way the API sets it in `ID-Token`
pub fn encode_unsigned(sub: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "sub": sub, "exp": exp }).to_string());
    format!("{header}.{payload}")
}
