//! Service account credentials and OAuth2 access tokens for the spreadsheet API.
//!
//! The credential bundle is the JSON key file issued for a service account. An access token
//! is obtained by signing a short-lived JWT assertion with the account's private key and
//! exchanging it at the account's token endpoint.
use std::fmt;
use std::time::Duration;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Cached tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("failed to parse credentials bundle: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("credentials hold an invalid private key: {0}")]
    InvalidKey(jsonwebtoken::errors::Error),
    #[error("failed to sign token assertion: {0}")]
    Signing(jsonwebtoken::errors::Error),
    #[error("token request could not be sent: {0}")]
    Request(#[from] reqwest::Error),
    #[error("token endpoint rejected the assertion with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// The fields of a service account key file we need. Other fields are ignored.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, CredentialsError> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Hands out bearer tokens for a service account, fetching a new one only when the cached
/// token is about to expire.
pub struct TokenProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: String,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(
        key: ServiceAccountKey,
        scope: &str,
        client: reqwest::Client,
    ) -> Result<Self, CredentialsError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(CredentialsError::InvalidKey)?;

        Ok(Self {
            key,
            encoding_key,
            scope: scope.to_owned(),
            client,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Return a valid access token. Concurrent callers wait on a single refresh.
    pub async fn access_token(&self) -> Result<String, CredentialsError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now()
                .checked_add(REFRESH_MARGIN)
                .is_some_and(|deadline| token.expires_at > deadline)
            {
                return Ok(token.token.clone());
            }
        }

        let response = self.request_token().await?;
        debug!(
            client_email = self.client_email(),
            expires_in = response.expires_in,
            "fetched new access token"
        );

        let token = response.access_token;
        // Tokens never outlive the assertion they were issued for.
        let lifetime = response.expires_in.min(ASSERTION_LIFETIME_SECS as u64);
        *cached = Instant::now()
            .checked_add(Duration::from_secs(lifetime))
            .map(|expires_at| CachedToken {
                token: token.clone(),
                expires_at,
            });

        Ok(token)
    }

    fn assertion(&self) -> Result<String, CredentialsError> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(CredentialsError::Signing)
    }

    async fn request_token(&self) -> Result<TokenResponse, CredentialsError> {
        let assertion = self.assertion()?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT_TYPE),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialsError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<TokenResponse>().await?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    pub(crate) const SERVICE_ACCOUNT_JSON: &str =
        include_str!("../tests/fixtures/service_account.json");

    pub(crate) fn test_key(token_uri: &str) -> ServiceAccountKey {
        let mut key = ServiceAccountKey::from_json(SERVICE_ACCOUNT_JSON)
            .expect("failed to parse fixture credentials");
        key.token_uri = token_uri.to_owned();
        key
    }

    #[test]
    fn parses_service_account_bundle() {
        let key = ServiceAccountKey::from_json(SERVICE_ACCOUNT_JSON).unwrap();

        assert_eq!(
            key.client_email,
            "transcripts@transcript-hook-test.iam.gserviceaccount.com"
        );
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
        assert_eq!(key.private_key_id.as_deref(), Some("0123456789abcdef"));
        assert!(!format!("{:?}", key).contains("PRIVATE KEY"));
    }

    #[test]
    fn token_uri_defaults_when_missing() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email": "a@b.c", "private_key": "not a key"}"#,
        )
        .unwrap();

        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn malformed_bundle_is_a_parse_error() {
        let error = ServiceAccountKey::from_json("{not json").unwrap_err();
        assert!(matches!(error, CredentialsError::Parse(_)));

        let error = ServiceAccountKey::from_json(r#"{"client_email": "a@b.c"}"#).unwrap_err();
        assert!(matches!(error, CredentialsError::Parse(_)));
    }

    #[test]
    fn invalid_private_key_is_rejected_up_front() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email": "a@b.c", "private_key": "not a key"}"#,
        )
        .unwrap();

        let result = TokenProvider::new(key, SPREADSHEETS_SCOPE, reqwest::Client::new());

        assert!(matches!(result, Err(CredentialsError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn exchanges_assertion_and_caches_token() {
        let server = MockServer::start_async().await;
        let token_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .body_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer")
                    .body_contains("assertion=");
                then.status(200).json_body(json!({
                    "access_token": "ya29.test-token",
                    "expires_in": 3599,
                    "token_type": "Bearer"
                }));
            })
            .await;

        let provider = TokenProvider::new(
            test_key(&server.url("/token")),
            SPREADSHEETS_SCOPE,
            reqwest::Client::new(),
        )
        .unwrap();

        assert_eq!(provider.access_token().await.unwrap(), "ya29.test-token");
        assert_eq!(provider.access_token().await.unwrap(), "ya29.test-token");

        token_mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn refreshes_tokens_close_to_expiry() {
        let server = MockServer::start_async().await;
        let token_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200).json_body(json!({
                    "access_token": "short-lived",
                    "expires_in": 30
                }));
            })
            .await;

        let provider = TokenProvider::new(
            test_key(&server.url("/token")),
            SPREADSHEETS_SCOPE,
            reqwest::Client::new(),
        )
        .unwrap();

        provider.access_token().await.unwrap();
        provider.access_token().await.unwrap();

        token_mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn oversized_expiry_is_capped() {
        let server = MockServer::start_async().await;
        let token_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200).json_body(json!({
                    "access_token": "long-lived",
                    "expires_in": u64::MAX
                }));
            })
            .await;

        let provider = TokenProvider::new(
            test_key(&server.url("/token")),
            SPREADSHEETS_SCOPE,
            reqwest::Client::new(),
        )
        .unwrap();

        assert_eq!(provider.access_token().await.unwrap(), "long-lived");
        assert_eq!(provider.access_token().await.unwrap(), "long-lived");

        token_mock.assert_hits_async(1).await;
        let cached = provider.cached.lock().await;
        let expires_at = cached.as_ref().unwrap().expires_at;
        assert!(expires_at <= Instant::now() + Duration::from_secs(ASSERTION_LIFETIME_SECS as u64));
    }

    #[tokio::test]
    async fn rejected_assertion_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(400).body(r#"{"error": "invalid_grant"}"#);
            })
            .await;

        let provider = TokenProvider::new(
            test_key(&server.url("/token")),
            SPREADSHEETS_SCOPE,
            reqwest::Client::new(),
        )
        .unwrap();

        match provider.access_token().await {
            Err(CredentialsError::Rejected { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("expected a rejected assertion, got {:?}", other.map(|_| ())),
        }
    }
}
