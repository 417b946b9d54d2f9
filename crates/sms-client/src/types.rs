//! Carrier API types.

use serde::{Deserialize, Serialize};

/// Outgoing message request.
#[derive(Debug, Clone, Serialize)]
pub struct SendSmsRequest {
    pub from: String,
    pub to: String,
    pub text: String,
}

/// Send message response.
#[derive(Debug, Clone, Deserialize)]
pub struct SendSmsResponse {
    #[serde(default)]
    pub id: Option<String>,
}
