//! HTTP implementation of the reporting collaborators.
//!
//! One [`HttpReportClient`] serves as both [`AuthClient`] and [`ReportSink`]
//! against a traffic-collection server:
//!
//! - `POST {base}/api/auth/login` with `{"email", "password"}` returns `{"jwt"}`.
//! - `POST {base}/api/traffic` with a bearer token and `{"apps": [...]}`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;
use traffic_core::AppTrafficData;

use crate::reporter::{AuthClient, AuthError, AuthToken, Credentials, ReportSink, SendError};

const LOGIN_PATH: &str = "/api/auth/login";
const TRAFFIC_PATH: &str = "/api/traffic";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    jwt: String,
}

#[derive(Serialize)]
struct TrafficReport<'a> {
    apps: &'a [AppTrafficData],
}

/// reqwest-backed client for the traffic-collection server.
#[derive(Debug, Clone)]
pub struct HttpReportClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpReportClient {
    /// Build a client with its own connection pool.
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::from_reqwest(base_url, http))
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AuthClient for HttpReportClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthToken, AuthError> {
        let url = self.url(LOGIN_PATH);
        debug!("POST {}", url);

        let body = LoginRequest {
            email: &credentials.email,
            password: credentials.password.expose_secret(),
        };
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::Rejected(format!("HTTP {status}")));
        }

        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Transport(format!("invalid login response: {e}")))?;
        Ok(AuthToken::new(login.jwt))
    }
}

#[async_trait]
impl ReportSink for HttpReportClient {
    async fn submit(&self, token: &AuthToken, apps: &[AppTrafficData]) -> Result<(), SendError> {
        let url = self.url(TRAFFIC_PATH);
        debug!(apps = apps.len(), "POST {}", url);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(token.expose())
            .json(&TrafficReport { apps })
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SendError::Rejected(format!("HTTP {status}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpReportClient::from_reqwest("http://host:8080/", reqwest::Client::new());
        assert_eq!(client.base_url(), "http://host:8080");
        assert_eq!(client.url(TRAFFIC_PATH), "http://host:8080/api/traffic");
    }

    #[test]
    fn test_report_body_shape() {
        let apps = vec![AppTrafficData::from_counters(
            "com.a",
            "A",
            &traffic_core::ByteCounters {
                mobile_bytes: 1,
                wifi_bytes: 2,
                rx_bytes: 3,
                tx_bytes: 0,
            },
        )];
        let value = serde_json::to_value(TrafficReport { apps: &apps }).unwrap();
        assert_eq!(value["apps"][0]["packageName"], "com.a");
        assert_eq!(value["apps"][0]["totalBytes"], 3);
    }
}
