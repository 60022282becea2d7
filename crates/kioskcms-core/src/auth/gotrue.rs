//! Password auth against the hosted backend's GoTrue endpoints.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{AuthProvider, Credentials, Session, SessionBroadcaster, SessionFile, SessionSubscription};
use crate::config::Config;
use crate::error::AuthError;

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    expires_in: Option<i64>,
    /// Absolute expiry, unix seconds
    expires_at: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| self.expires_in.map(|secs| now + chrono::Duration::seconds(secs)));

        Session {
            user_id: self.user.id,
            email: self.user.email,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// Auth provider for the hosted backend.
/// Clone of the inner reqwest client is cheap; it shares the connection pool.
pub struct GoTrueAuth {
    client: Client,
    base_url: String,
    anon_key: String,
    session_file: SessionFile,
    current: Mutex<Option<Session>>,
    changes: SessionBroadcaster,
}

impl GoTrueAuth {
    pub fn new(base_url: &str, anon_key: &str, cache_dir: &Path) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session_file: SessionFile::new(cache_dir),
            current: Mutex::new(None),
            changes: SessionBroadcaster::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let base_url = config
            .backend_url
            .as_deref()
            .ok_or_else(|| AuthError::NotConfigured("backend URL missing".to_string()))?;
        let anon_key = config
            .anon_key
            .as_deref()
            .ok_or_else(|| AuthError::NotConfigured("anon key missing".to_string()))?;
        let cache_dir = config
            .cache_dir()
            .map_err(|e| AuthError::Session(e.to_string()))?;
        Self::new(base_url, anon_key, &cache_dir)
    }

    fn current(&self) -> MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn token_url(&self) -> String {
        format!("{}/auth/v1/token?grant_type=password", self.base_url)
    }

    fn logout_url(&self) -> String {
        format!("{}/auth/v1/logout", self.base_url)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(AuthError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl AuthProvider for GoTrueAuth {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        debug!(email = %credentials.email, "Signing in");
        let response = self
            .client
            .post(self.token_url())
            .header("apikey", &self.anon_key)
            .header(header::ACCEPT, "application/json")
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("Failed to parse token response: {}", e)))?;
        let session = token.into_session(Utc::now());

        if let Err(e) = self.session_file.save(&session) {
            warn!(error = %e, "Failed to save session");
        }
        *self.current() = Some(session.clone());

        info!(user = %session.user_id, "Signed in");
        self.changes.notify(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // The local session goes away even if the backend call fails
        let session = self.current().take();
        if let Err(e) = self.session_file.clear() {
            warn!(error = %e, "Failed to clear session file");
        }
        self.changes.notify(None);

        let Some(session) = session else {
            return Ok(());
        };

        let response = self
            .client
            .post(self.logout_url())
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        match Self::check_response(response).await {
            Ok(_) => {
                info!(user = %session.user_id, "Signed out");
                Ok(())
            }
            // Token already revoked or expired server-side
            Err(AuthError::Unauthorized) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        if let Some(session) = self.current().as_ref() {
            if !session.is_expired() {
                return Ok(Some(session.clone()));
            }
        }

        let loaded = self
            .session_file
            .load()
            .map_err(|e| AuthError::Session(e.to_string()))?;
        debug!(found = loaded.is_some(), "Session loaded from disk");
        *self.current() = loaded.clone();
        Ok(loaded)
    }

    fn subscribe(&self) -> SessionSubscription {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_token_response_with_expires_at() {
        let json = r#"{"access_token":"jwt","token_type":"bearer","expires_in":3600,"expires_at":1893456000,"refresh_token":"r1","user":{"id":"0b7e","email":"ops@kiosk.local","role":"authenticated"}}"#;
        let token: TokenResponse = serde_json::from_str(json).expect("parse token response");
        let session = token.into_session(Utc::now());

        assert_eq!(session.user_id, "0b7e");
        assert_eq!(session.email.as_deref(), Some("ops@kiosk.local"));
        assert_eq!(session.refresh_token.as_deref(), Some("r1"));
        assert_eq!(session.expires_at.map(|t| t.timestamp()), Some(1_893_456_000));
    }

    #[test]
    fn test_parse_token_response_with_expires_in_only() {
        let json = r#"{"access_token":"jwt","expires_in":60,"user":{"id":"0b7e"}}"#;
        let token: TokenResponse = serde_json::from_str(json).expect("parse token response");
        let now = Utc::now();
        let session = token.into_session(now);

        assert_eq!(session.email, None);
        assert_eq!(session.expires_at, Some(now + chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_urls_strip_trailing_slash() {
        let dir = tempfile::tempdir().unwrap();
        let auth = GoTrueAuth::new("https://abc.backend.example/", "anon", dir.path()).unwrap();
        assert_eq!(
            auth.token_url(),
            "https://abc.backend.example/auth/v1/token?grant_type=password"
        );
        assert_eq!(auth.logout_url(), "https://abc.backend.example/auth/v1/logout");
    }

    #[test]
    fn test_from_config_requires_backend() {
        let config = Config::default();
        assert!(matches!(
            GoTrueAuth::from_config(&config),
            Err(AuthError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_current_session_restores_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let stored = Session::new("0b7e", Some("ops@kiosk.local".to_string()), "jwt");
        SessionFile::new(dir.path()).save(&stored).unwrap();

        let auth = GoTrueAuth::new("https://abc.backend.example", "anon", dir.path()).unwrap();
        assert_eq!(auth.current_session().await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_local_only() {
        let dir = tempfile::tempdir().unwrap();
        let auth = GoTrueAuth::new("https://abc.backend.example", "anon", dir.path()).unwrap();
        let mut changes = auth.subscribe();

        auth.sign_out().await.expect("no network call without a session");
        assert_eq!(changes.recv().await, Some(None));
        assert_eq!(auth.current_session().await.unwrap(), None);
    }

    // -------------------------------------------------------------------------
    // Against a mock backend
    // -------------------------------------------------------------------------

    const TOKEN_BODY: &str = r#"{"access_token":"jwt","token_type":"bearer","expires_in":3600,"expires_at":1893456000,"refresh_token":"r1","user":{"id":"0b7e","email":"ops@kiosk.local"}}"#;

    async fn mock_token_ok(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header_eq("apikey", "anon"))
            .and(body_json(json!({"email": "ops@kiosk.local", "password": "kiosk"})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(TOKEN_BODY, "application/json"))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn signed_in(server: &MockServer, dir: &Path) -> (GoTrueAuth, SessionSubscription) {
        mock_token_ok(server).await;
        let auth = GoTrueAuth::new(&server.uri(), "anon", dir).unwrap();
        let mut changes = auth.subscribe();
        auth.sign_in(&Credentials::new("ops@kiosk.local", "kiosk"))
            .await
            .expect("sign in");
        assert!(matches!(changes.recv().await, Some(Some(_))));
        (auth, changes)
    }

    #[tokio::test]
    async fn test_sign_in_saves_and_announces_session() {
        let server = MockServer::start().await;
        mock_token_ok(&server).await;
        let dir = tempfile::tempdir().unwrap();
        let auth = GoTrueAuth::new(&server.uri(), "anon", dir.path()).unwrap();
        let mut changes = auth.subscribe();

        let session = auth
            .sign_in(&Credentials::new("ops@kiosk.local", "kiosk"))
            .await
            .expect("sign in");

        assert_eq!(session.user_id, "0b7e");
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.email.as_deref(), Some("ops@kiosk.local"));
        assert_eq!(session.expires_at.map(|t| t.timestamp()), Some(1_893_456_000));
        assert_eq!(changes.recv().await, Some(Some(session.clone())));
        assert_eq!(SessionFile::new(dir.path()).load().unwrap(), Some(session.clone()));
        assert_eq!(auth.current_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_rejected_sign_in_returns_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_raw(
                r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
                "application/json",
            ))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let auth = GoTrueAuth::new(&server.uri(), "anon", dir.path()).unwrap();

        let err = auth
            .sign_in(&Credentials::new("ops@kiosk.local", "wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Rejected(_)));
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert_eq!(auth.current_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sign_out_posts_bearer_token() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (auth, mut changes) = signed_in(&server, dir.path()).await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header_eq("apikey", "anon"))
            .and(header_eq("authorization", "Bearer jwt"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        auth.sign_out().await.expect("sign out");

        assert_eq!(changes.recv().await, Some(None));
        assert_eq!(SessionFile::new(dir.path()).load().unwrap(), None);
        assert_eq!(auth.current_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sign_out_treats_unauthorized_as_signed_out() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (auth, mut changes) = signed_in(&server, dir.path()).await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(401).set_body_raw(r#"{"msg":"invalid JWT"}"#, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        auth.sign_out().await.expect("401 counts as signed out");

        assert_eq!(changes.recv().await, Some(None));
        assert_eq!(SessionFile::new(dir.path()).load().unwrap(), None);
        assert_eq!(auth.current_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sign_out_server_error_still_clears_local_session() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let (auth, mut changes) = signed_in(&server, dir.path()).await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = auth.sign_out().await.unwrap_err();

        assert!(matches!(err, AuthError::ServerError(_)));
        assert_eq!(changes.recv().await, Some(None));
        assert_eq!(SessionFile::new(dir.path()).load().unwrap(), None);
        assert_eq!(auth.current_session().await.unwrap(), None);
    }
}
