//! HTTP transport for the Mirth Migrator web service

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use super::endpoints::Endpoint;

/// Header carrying the session token in both directions
pub const SESSION_HEADER: &str = "sessionId";

/// Authentication material attached to a call
#[derive(Clone, PartialEq, Eq)]
pub enum SessionToken {
    /// Operator credentials, used until the server issues a session id
    Credentials { username: String, password: String },
    /// Session id issued by the server
    Issued(String),
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credentials { username, .. } => f
                .debug_struct("Credentials")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::Issued(_) => f.write_str("Issued(***)"),
        }
    }
}

/// Raw answer of the server
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    /// Rotated session token, if the server sent one
    pub session_id: Option<String>,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one JSON request to the migrator
///
/// An `Err` means the server could not be reached at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, endpoint: Endpoint, payload: &Value, token: &SessionToken) -> Result<HttpReply>;
}

/// `reqwest` based transport
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration, accept_invalid_certs: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, endpoint: Endpoint, payload: &Value, token: &SessionToken) -> Result<HttpReply> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        debug!("POST {}", url);

        let request = self.client.post(&url).json(payload);
        let request = match token {
            SessionToken::Issued(session_id) => request.header(SESSION_HEADER, session_id),
            SessionToken::Credentials { username, password } => request.basic_auth(username, Some(password)),
        };

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status().as_u16();
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body of {}", url))?;

        debug!("{} answered {} ({} bytes)", endpoint, status, body.len());

        Ok(HttpReply {
            status,
            session_id,
            body,
        })
    }
}
