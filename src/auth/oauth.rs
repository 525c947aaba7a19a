use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;

use super::credentials::ClientCredential;
use super::listener::AuthorizationListener;
use super::token_store::TokenRecord;
use super::{CodeReceiver, IdentityProvider};
use crate::error::{Error, Result};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Full read/write access to the channel's videos.
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

/// Google's OAuth 2.0 endpoints for an installed application.
pub struct GoogleOAuth {
    credential: ClientCredential,
    redirect_uri: String,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(credential: ClientCredential, redirect_uri: impl Into<String>) -> Self {
        Self {
            credential,
            redirect_uri: redirect_uri.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn token_request(&self, form: &[(&str, &str)], what: &str) -> Result<TokenRecord> {
        #[derive(serde::Deserialize)]
        struct TokenResponse {
            access_token: String,
            #[serde(default)]
            refresh_token: Option<String>,
            #[serde(default)]
            expires_in: Option<i64>,
            #[serde(default)]
            scope: Option<String>,
            #[serde(default)]
            token_type: Option<String>,
            #[serde(flatten)]
            extra: serde_json::Map<String, serde_json::Value>,
        }

        let resp = self
            .http
            .post(TOKEN_URL)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Network(format!("failed to contact Google token endpoint: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: format!("{what} failed: {}", token_error_message(&body)),
            });
        }

        let tr: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Error::Network(format!("failed to parse token response: {e}")))?;

        let expiry_date = tr
            .expires_in
            .map(|secs| chrono::Utc::now().timestamp_millis() + secs * 1000);

        Ok(TokenRecord {
            access_token: tr.access_token,
            refresh_token: tr.refresh_token,
            expiry_date,
            scope: tr.scope,
            token_type: tr.token_type,
            extra: tr.extra,
        })
    }
}

impl IdentityProvider for GoogleOAuth {
    fn authorization_url(&self, state: &str) -> Result<Url> {
        Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", self.credential.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", YOUTUBE_SCOPE),
                // Offline access plus forced consent so a refresh token is always issued
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| Error::Configuration(format!("invalid authorization URL: {e}")))
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenRecord> {
        self.token_request(
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.credential.client_id.as_str()),
                ("client_secret", self.credential.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
            "token exchange",
        )
        .await
    }

    async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord> {
        let refresh_token = record.refresh_token.as_deref().ok_or_else(|| {
            Error::AuthorizationDenied(
                "stored token has no refresh token; run `yt-shorts auth` to sign in again".into(),
            )
        })?;

        self.token_request(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.credential.client_id.as_str()),
                ("client_secret", self.credential.client_secret.as_str()),
            ],
            "token refresh",
        )
        .await
        .map_err(|e| match e {
            Error::Api { status, message } => Error::Api {
                status,
                message: format!(
                    "{message}\nYou may need to re-authenticate with `yt-shorts auth`"
                ),
            },
            other => other,
        })
    }
}

/// Pull `error` / `error_description` out of an OAuth error body.
fn token_error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct OAuthError {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    }

    match serde_json::from_str::<OAuthError>(body) {
        Ok(OAuthError {
            error,
            error_description: Some(desc),
        }) => format!("{error} ({desc})"),
        Ok(OAuthError { error, .. }) => error,
        Err(_) => body.to_string(),
    }
}

/// Presents the authorization URL and waits for the browser redirect.
pub struct BrowserCodeReceiver {
    port: u16,
    timeout: Option<Duration>,
}

impl BrowserCodeReceiver {
    pub fn new(port: u16, timeout: Option<Duration>) -> Self {
        Self { port, timeout }
    }
}

impl CodeReceiver for BrowserCodeReceiver {
    async fn receive_code(&self, authorization_url: &Url, state: &str) -> Result<String> {
        // Bind first: a busy port must fail before the user is sent to the browser
        let listener = AuthorizationListener::bind(self.port).await?;
        tracing::debug!(addr = %listener.local_addr()?, "callback listener bound");

        println!("\n=== YouTube Shorts Upload Authentication ===\n");
        println!("Open this URL in your browser to authorize yt-shorts:\n");
        println!("  {authorization_url}\n");

        // Try to open browser (fails silently on headless machines)
        if let Err(e) = open::that(authorization_url.as_str()) {
            tracing::debug!("could not open browser: {e}");
        }

        println!("Waiting for authorization on http://localhost:{} ...", self.port);

        let cancel = CancellationToken::new();
        let ctrl_c = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let result = listener.await_code(Some(state), self.timeout, cancel).await;
        ctrl_c.abort();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn provider() -> GoogleOAuth {
        GoogleOAuth::new(
            ClientCredential {
                client_id: "id.apps.googleusercontent.com".into(),
                client_secret: "secret".into(),
            },
            "http://localhost:3000",
        )
    }

    #[test]
    fn authorization_url_requests_offline_consent() {
        let url = provider().authorization_url("st4te").unwrap();
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["client_id"], "id.apps.googleusercontent.com");
        assert_eq!(params["redirect_uri"], "http://localhost:3000");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], YOUTUBE_SCOPE);
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["prompt"], "consent");
        assert_eq!(params["state"], "st4te");
        assert!(!params.contains_key("client_secret"));
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_fails_locally() {
        let record = TokenRecord {
            access_token: "a".into(),
            refresh_token: None,
            expiry_date: Some(0),
            scope: None,
            token_type: None,
            extra: Default::default(),
        };
        let err = provider().refresh(&record).await.unwrap_err();
        assert!(matches!(err, Error::AuthorizationDenied(_)));
    }

    #[test]
    fn oauth_error_bodies() {
        assert_eq!(
            token_error_message(r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#),
            "invalid_grant (Token has been expired or revoked.)"
        );
        assert_eq!(token_error_message(r#"{"error":"invalid_client"}"#), "invalid_client");
        assert_eq!(token_error_message("Bad Gateway"), "Bad Gateway");
    }
}
