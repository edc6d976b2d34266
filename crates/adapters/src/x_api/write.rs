//! X API write adapter for publishing posts

use async_trait::async_trait;
use persona_bot_domain::{MAX_POST_CHARS, PublishError, PublishResult, Publisher};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

use super::oauth::OAuth1Credentials;

/// Authenticated session, established once by `connect`
struct Session {
    client: Client,
    username: OnceLock<String>,
}

/// X API publisher for creating posts with OAuth 1.0a user context
pub struct XPublisher {
    credentials: OAuth1Credentials,
    base_url: String,
    max_chars: usize,
    timeout: Duration,
    session: OnceLock<Session>,
}

impl XPublisher {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.twitter.com";

    pub fn new(credentials: OAuth1Credentials) -> Self {
        Self::with_base_url(credentials, Self::DEFAULT_BASE_URL.to_string(), MAX_POST_CHARS)
    }

    pub fn with_base_url(credentials: OAuth1Credentials, base_url: String, max_chars: usize) -> Self {
        Self {
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_chars,
            timeout: Duration::from_secs(30),
            session: OnceLock::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.get().is_some()
    }

    /// Username resolved by a successful `verify_credentials`
    pub fn username(&self) -> Option<&str> {
        self.session
            .get()
            .and_then(|s| s.username.get())
            .map(String::as_str)
    }

    fn post_url(&self, id: &str) -> String {
        match self.username() {
            Some(username) => format!("https://x.com/{}/status/{}", username, id),
            None => format!("https://x.com/i/status/{}", id),
        }
    }

    async fn fetch_me(&self, session: &Session) -> Result<String, PublishError> {
        let url = format!("{}/2/users/me", self.base_url);

        let response = session
            .client
            .get(&url)
            .header(
                "Authorization",
                self.credentials.authorization_header("GET", &url, &[]),
            )
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let response = check_status(response, "Failed to fetch user").await?;

        let me: UserResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        Ok(me.data.username)
    }
}

#[derive(Serialize)]
struct CreateTweetRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct CreateTweetResponse {
    data: TweetData,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

#[derive(Deserialize)]
struct UserResponse {
    data: UserData,
}

#[derive(Deserialize)]
struct UserData {
    username: String,
}

async fn check_status(response: Response, context: &str) -> Result<Response, PublishError> {
    let status = response.status();

    if status == 401 || status == 403 {
        let body = response.text().await.unwrap_or_default();
        return Err(PublishError::Auth(format!("{}: {}", status, body)));
    }

    if status == 429 {
        return Err(PublishError::RateLimited);
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PublishError::Api(format!("{} ({}): {}", context, status, body)));
    }

    Ok(response)
}

#[async_trait]
impl Publisher for XPublisher {
    async fn connect(&self) -> Result<(), PublishError> {
        if self.is_connected() {
            return Ok(());
        }

        let missing = self.credentials.missing();
        if !missing.is_empty() {
            return Err(PublishError::Connect(format!(
                "Missing X credentials: {}",
                missing.join(", ")
            )));
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| PublishError::Connect(format!("Failed to build HTTP client: {}", e)))?;

        let _ = self.session.set(Session {
            client,
            username: OnceLock::new(),
        });

        tracing::info!(base_url = %self.base_url, "Connected to X API");
        Ok(())
    }

    async fn publish(&self, text: &str) -> Result<PublishResult, PublishError> {
        let session = self.session.get().ok_or(PublishError::NotConnected)?;

        let len = text.chars().count();
        if len > self.max_chars {
            return Err(PublishError::ContentTooLong {
                len,
                max: self.max_chars,
            });
        }

        let url = format!("{}/2/tweets", self.base_url);

        let response = session
            .client
            .post(&url)
            .header(
                "Authorization",
                self.credentials.authorization_header("POST", &url, &[]),
            )
            .header("Content-Type", "application/json")
            .json(&CreateTweetRequest { text })
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let response = check_status(response, "Failed to create tweet").await?;

        let tweet_response: CreateTweetResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let url = self.post_url(&tweet_response.data.id);
        Ok(PublishResult {
            id: tweet_response.data.id,
            url: Some(url),
        })
    }

    async fn verify_credentials(&self) -> bool {
        let Some(session) = self.session.get() else {
            return false;
        };

        match self.fetch_me(session).await {
            Ok(username) => {
                tracing::info!(username = %username, "Verified X credentials");
                let _ = session.username.set(username);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "X credential verification failed");
                false
            }
        }
    }

    fn platform(&self) -> &'static str {
        "x"
    }
}
