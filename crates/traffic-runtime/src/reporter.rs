//! Top-N traffic reporting.
//!
//! The [`Reporter`] authenticates against a remote service, takes the first
//! `n` rows of the refresh loop's current snapshot and submits them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};
use traffic_core::AppTrafficData;

use crate::refresh_loop::RefreshState;

// ── Credentials ───────────────────────────────────────────────────────────────

/// Login credentials. The password never shows up in `Debug` output.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Bearer token obtained from [`AuthClient::authenticate`].
#[derive(Clone)]
pub struct AuthToken(SecretString);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("credentials rejected: {0}")]
    Rejected(String),

    #[error("authentication transport error: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("report rejected: {0}")]
    Rejected(String),

    #[error("report transport error: {0}")]
    Transport(String),
}

// ── Collaborator traits ───────────────────────────────────────────────────────

/// Exchanges credentials for a bearer token.
#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthToken, AuthError>;
}

/// Accepts a batch of application rows.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn submit(&self, token: &AuthToken, apps: &[AppTrafficData]) -> Result<(), SendError>;
}

// ── Reporter ──────────────────────────────────────────────────────────────────

/// Result of one [`Reporter::send_top`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Number of rows actually submitted.
    Sent(usize),
    AuthFailed,
    SendFailed,
}

impl fmt::Display for ReportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportOutcome::Sent(count) => write!(f, "sent {count} app(s)"),
            ReportOutcome::AuthFailed => f.write_str("authentication failed"),
            ReportOutcome::SendFailed => f.write_str("sending failed"),
        }
    }
}

/// Sends the heaviest applications of the current snapshot.
///
/// Calls are independent of each other; two concurrent calls each
/// authenticate and submit on their own.
#[derive(Clone)]
pub struct Reporter {
    auth: Arc<dyn AuthClient>,
    sink: Arc<dyn ReportSink>,
    snapshots: watch::Receiver<RefreshState>,
}

impl Reporter {
    pub fn new(
        auth: Arc<dyn AuthClient>,
        sink: Arc<dyn ReportSink>,
        snapshots: watch::Receiver<RefreshState>,
    ) -> Self {
        Self {
            auth,
            sink,
            snapshots,
        }
    }

    /// Authenticate, then submit the first `n` rows of the current snapshot.
    ///
    /// The snapshot is read after authentication succeeds, so the rows are
    /// whatever the refresh loop holds at that moment.
    pub async fn send_top(&self, n: usize, credentials: &Credentials) -> ReportOutcome {
        let token = match self.auth.authenticate(credentials).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, email = %credentials.email, "authentication failed");
                return ReportOutcome::AuthFailed;
            }
        };

        let rows: Vec<AppTrafficData> = self.snapshots.borrow().top(n).to_vec();

        match self.sink.submit(&token, &rows).await {
            Ok(()) => {
                info!(requested = n, sent = rows.len(), "traffic report sent");
                ReportOutcome::Sent(rows.len())
            }
            Err(e) => {
                warn!(error = %e, "traffic report failed");
                ReportOutcome::SendFailed
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
