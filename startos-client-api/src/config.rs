use std::time::Duration;

use crate::error::{ApiError, ApiResult};

/// Where and how to reach a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// e.g. `http://start9.local`; static files and uploads are relative to it
    pub base_url: String,
    /// JSON-RPC over HTTP endpoint
    pub rpc_url: String,
    /// JSON-RPC over websocket endpoint, for subscriptions
    pub ws_url: String,
    /// Session cookie value from an earlier login
    pub session: Option<String>,
    pub request_timeout: Duration,
    /// Upper bound for the timeout of a wifi scan
    pub wifi_scan_timeout_max: Duration,
}

impl ApiConfig {
    /// The standard endpoints of a server at `base_url`.
    pub fn new(base_url: &str) -> ApiResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            return Err(ApiError::validation(format!(
                "server url must start with http:// or https://, got {}",
                base_url
            )));
        };
        Ok(ApiConfig {
            rpc_url: format!("{}/rpc/v1", base_url),
            ws_url: format!("{}/ws/rpc", ws_base),
            base_url,
            session: None,
            request_timeout: Duration::from_secs(60),
            wifi_scan_timeout_max: Duration::from_secs(60),
        })
    }

    pub fn with_session(mut self, session: Option<String>) -> Self {
        self.session = session;
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_owned();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
