use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};

use crate::auth::Session;
use crate::error::{Error, Result};

use super::types::GoogleApiError;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/youtube/v3";

pub struct YoutubeClient {
    pub(super) http: reqwest::Client,
    pub(super) access_token: String,
}

impl YoutubeClient {
    pub fn new(session: &Session) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            access_token: session.access_token().to_string(),
        })
    }

    /// Build an authenticated request to the Data API.
    pub fn api_request(&self, method: Method, path: &str) -> AuthenticatedRequest<'_> {
        let url = format!("{API_BASE}{path}");
        AuthenticatedRequest {
            client: self,
            builder: self.http.request(method, &url),
        }
    }

    /// Build an authenticated request to the media upload endpoint.
    pub fn upload_request(&self, method: Method, path: &str) -> AuthenticatedRequest<'_> {
        let url = format!("{UPLOAD_BASE}{path}");
        AuthenticatedRequest {
            client: self,
            builder: self.http.request(method, &url),
        }
    }
}

/// Helper that attaches the bearer token and sends with retry logic.
pub struct AuthenticatedRequest<'a> {
    client: &'a YoutubeClient,
    builder: RequestBuilder,
}

impl AuthenticatedRequest<'_> {
    pub fn query<T: serde::Serialize + ?Sized>(mut self, params: &T) -> Self {
        self.builder = self.builder.query(params);
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.builder = self.builder.header(key, value);
        self
    }

    pub fn json<T: serde::Serialize + ?Sized>(mut self, body: &T) -> Self {
        self.builder = self.builder.json(body);
        self
    }

    /// Send the request, retrying on rate-limit (429).
    pub async fn send(self) -> Result<Response> {
        const MAX_RETRIES: u32 = 5;
        let mut builder = self.builder;

        for attempt in 0..=MAX_RETRIES {
            // Clone before consuming; fails only for streamed bodies.
            let retry_builder = builder.try_clone();

            let resp = builder
                .bearer_auth(&self.client.access_token)
                .send()
                .await
                .map_err(|e| Error::Network(format!("HTTP request failed: {e}")))?;

            match resp.status() {
                s if s.is_success() => return Ok(resp),

                StatusCode::TOO_MANY_REQUESTS if attempt < MAX_RETRIES => {
                    let retry_after = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(2);
                    let wait = Duration::from_secs(retry_after) + jitter();
                    tracing::warn!(
                        retry_after,
                        attempt = attempt + 1,
                        "rate limited, waiting {wait:?}"
                    );
                    tokio::time::sleep(wait).await;

                    match retry_builder {
                        Some(b) => builder = b,
                        None => {
                            return Err(Error::Api {
                                status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
                                message: "rate limited, cannot retry request with streamed body"
                                    .into(),
                            });
                        }
                    }
                }

                status => {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(api_error(status, &body));
                }
            }
        }

        Err(Error::Api {
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            message: format!("rate limited, exhausted {MAX_RETRIES} retries"),
        })
    }
}

/// Map an error response to [`Error`], preferring Google's own message.
pub(super) fn api_error(status: StatusCode, body: &str) -> Error {
    let message = match serde_json::from_str::<GoogleApiError>(body) {
        Ok(err) => err.to_string(),
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => body.trim().to_string(),
    };

    if status == StatusCode::NOT_FOUND {
        Error::NotFound(message)
    } else {
        Error::Api {
            status: status.as_u16(),
            message,
        }
    }
}

fn jitter() -> Duration {
    let ms: u64 = rand::random::<u64>() % 1000;
    Duration::from_millis(ms)
}
