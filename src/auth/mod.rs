mod credentials;
mod listener;
mod oauth;
mod token_store;

pub use credentials::CredentialResolver;
pub use oauth::{BrowserCodeReceiver, GoogleOAuth};
pub use token_store::{TokenRecord, TokenStore};

use std::path::Path;

use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};

/// Token endpoint operations of the identity provider.
pub trait IdentityProvider {
    fn authorization_url(&self, state: &str) -> Result<Url>;
    async fn exchange_code(&self, code: &str) -> Result<TokenRecord>;
    async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord>;
}

/// Gets an authorization code back from the user's browser.
pub trait CodeReceiver {
    async fn receive_code(&self, authorization_url: &Url, state: &str) -> Result<String>;
}

/// Where the session's token record is kept between runs.
pub trait TokenStorage {
    fn load(&self) -> Result<Option<TokenRecord>>;
    fn save(&self, record: &TokenRecord) -> Result<()>;
    fn location(&self) -> &Path;
}

/// Authenticated handle handed to API clients.
#[derive(Debug, Clone)]
pub struct Session {
    record: TokenRecord,
}

impl Session {
    pub fn access_token(&self) -> &str {
        &self.record.access_token
    }
}

#[derive(Debug)]
pub enum SessionState {
    NoToken,
    TokenValid(TokenRecord),
    TokenExpired(TokenRecord),
    Authenticating,
    Ready(Session),
    Failed(Error),
}

impl SessionState {
    pub fn from_stored(stored: Option<TokenRecord>, now_millis: i64) -> Self {
        match stored {
            None => Self::NoToken,
            Some(record) if record.is_expired(now_millis) => Self::TokenExpired(record),
            Some(record) => Self::TokenValid(record),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::NoToken => "no_token",
            Self::TokenValid(_) => "token_valid",
            Self::TokenExpired(_) => "token_expired",
            Self::Authenticating => "authenticating",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

/// Drives a stored token (or none) to a ready [`Session`].
///
/// A failed refresh is reported as-is; it never falls back to an interactive
/// login. `yt-shorts auth` is the explicit way back in.
pub struct SessionManager<S, P, R> {
    store: S,
    provider: P,
    receiver: R,
}

impl<S: TokenStorage, P: IdentityProvider, R: CodeReceiver> SessionManager<S, P, R> {
    pub fn new(store: S, provider: P, receiver: R) -> Self {
        Self {
            store,
            provider,
            receiver,
        }
    }

    /// Reuse the stored token, refreshing it when expired, or log in when
    /// there is none.
    pub async fn start(&self) -> Result<Session> {
        let stored = self.store.load()?;
        let now = chrono::Utc::now().timestamp_millis();
        self.drive(SessionState::from_stored(stored, now)).await
    }

    /// Run the interactive login regardless of what is stored.
    pub async fn login(&self) -> Result<Session> {
        self.drive(SessionState::NoToken).await
    }

    async fn drive(&self, mut state: SessionState) -> Result<Session> {
        loop {
            tracing::debug!(state = state.name(), "auth session");
            state = match state {
                SessionState::NoToken => SessionState::Authenticating,
                SessionState::TokenValid(record) => SessionState::Ready(Session { record }),
                SessionState::TokenExpired(record) => match self.refresh(&record).await {
                    Ok(session) => SessionState::Ready(session),
                    Err(e) => SessionState::Failed(e),
                },
                SessionState::Authenticating => match self.authenticate().await {
                    Ok(session) => SessionState::Ready(session),
                    Err(e) => SessionState::Failed(e),
                },
                SessionState::Ready(session) => return Ok(session),
                SessionState::Failed(e) => {
                    tracing::debug!(error = %e, "authentication failed");
                    return Err(e);
                }
            };
        }
    }

    async fn refresh(&self, record: &TokenRecord) -> Result<Session> {
        tracing::info!("access token expired, refreshing");
        let refreshed = self.provider.refresh(record).await?;
        let record = record.merge_refresh(refreshed);
        self.store.save(&record)?;
        tracing::debug!("token refreshed successfully");
        Ok(Session { record })
    }

    async fn authenticate(&self) -> Result<Session> {
        let state = csrf_state();
        let url = self.provider.authorization_url(&state)?;

        let code = self.receiver.receive_code(&url, &state).await?;

        tracing::info!("exchanging authorization code for tokens");
        let record = self.provider.exchange_code(&code).await?;
        self.store.save(&record)?;

        println!(
            "Authentication successful! Token saved to {}",
            self.store.location().display()
        );
        Ok(Session { record })
    }
}

fn csrf_state() -> String {
    let mut state_bytes = [0u8; 16];
    rand::fill(&mut state_bytes);
    state_bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Session manager wired to Google and the local browser flow.
pub fn session_manager(
    config: &Config,
) -> Result<SessionManager<TokenStore, GoogleOAuth, BrowserCodeReceiver>> {
    let credential = CredentialResolver::new(&config.auth.credentials_path).resolve()?;
    let provider = GoogleOAuth::new(credential, config.auth.redirect_uri());
    let receiver = BrowserCodeReceiver::new(config.auth.redirect_port, config.auth.timeout());
    Ok(SessionManager::new(
        TokenStore::new(&config.auth.token_path),
        provider,
        receiver,
    ))
}

/// Authenticate for an API command.
pub async fn connect(config: &Config) -> Result<Session> {
    let manager = session_manager(config)?;
    manager.start().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn now() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn record(access: &str, expiry: Option<i64>) -> TokenRecord {
        TokenRecord {
            access_token: access.into(),
            refresh_token: Some("1//refresh".into()),
            expiry_date: expiry,
            scope: None,
            token_type: Some("Bearer".into()),
            extra: Default::default(),
        }
    }

    #[derive(Default)]
    struct FakeProvider {
        exchanges: AtomicUsize,
        refreshes: AtomicUsize,
        fail_refresh: bool,
        fresh_expiry: i64,
    }

    impl IdentityProvider for FakeProvider {
        fn authorization_url(&self, state: &str) -> Result<Url> {
            Ok(Url::parse_with_params("https://idp.test/auth", &[("state", state)]).unwrap())
        }

        async fn exchange_code(&self, code: &str) -> Result<TokenRecord> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            Ok(record(&format!("from-{code}"), Some(self.fresh_expiry)))
        }

        async fn refresh(&self, _record: &TokenRecord) -> Result<TokenRecord> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail_refresh {
                return Err(Error::Api {
                    status: 400,
                    message: "token refresh failed: invalid_grant".into(),
                });
            }
            Ok(TokenRecord {
                refresh_token: None,
                ..record("refreshed", Some(self.fresh_expiry))
            })
        }
    }

    #[derive(Default)]
    struct FakeReceiver {
        calls: AtomicUsize,
        seen_state: Mutex<Option<String>>,
        deny: bool,
    }

    impl CodeReceiver for FakeReceiver {
        async fn receive_code(&self, url: &Url, state: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(url.as_str().contains(state));
            *self.seen_state.lock().unwrap() = Some(state.to_string());
            if self.deny {
                return Err(Error::AuthorizationDenied("access_denied".into()));
            }
            Ok("the-code".into())
        }
    }

    /// File-backed store that counts the manager's writes.
    struct CountingStore {
        inner: TokenStore,
        saves: AtomicUsize,
    }

    impl CountingStore {
        fn saves(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    impl TokenStorage for CountingStore {
        fn load(&self) -> Result<Option<TokenRecord>> {
            self.inner.load()
        }

        fn save(&self, record: &TokenRecord) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(record)
        }

        fn location(&self) -> &Path {
            self.inner.path()
        }
    }

    fn manager(
        dir: &tempfile::TempDir,
        provider: FakeProvider,
        receiver: FakeReceiver,
    ) -> SessionManager<CountingStore, FakeProvider, FakeReceiver> {
        let store = CountingStore {
            inner: TokenStore::new(dir.path().join("token.json")),
            saves: AtomicUsize::new(0),
        };
        SessionManager::new(store, provider, receiver)
    }

    #[test]
    fn initial_state_from_stored_token() {
        let t = 1_000_000;
        assert!(matches!(SessionState::from_stored(None, t), SessionState::NoToken));
        assert!(matches!(
            SessionState::from_stored(Some(record("a", Some(t - 1))), t),
            SessionState::TokenExpired(_)
        ));
        assert!(matches!(
            SessionState::from_stored(Some(record("a", Some(t + 1))), t),
            SessionState::TokenValid(_)
        ));
        assert!(matches!(
            SessionState::from_stored(Some(record("a", None)), t),
            SessionState::TokenValid(_)
        ));
    }

    #[tokio::test]
    async fn no_token_runs_interactive_flow_once() {
        let dir = tempfile::tempdir().unwrap();
        let expiry = now() + 3_600_000;
        let mgr = manager(
            &dir,
            FakeProvider {
                fresh_expiry: expiry,
                ..Default::default()
            },
            FakeReceiver::default(),
        );

        let session = mgr.start().await.unwrap();

        assert_eq!(session.access_token(), "from-the-code");
        assert_eq!(mgr.receiver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.provider.exchanges.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.provider.refreshes.load(Ordering::SeqCst), 0);

        let state = mgr.receiver.seen_state.lock().unwrap().clone().unwrap();
        assert_eq!(state.len(), 32);

        assert_eq!(mgr.store.saves(), 1);
        let saved = mgr.store.load().unwrap().unwrap();
        assert_eq!(saved.access_token, "from-the-code");
        assert_eq!(saved.expiry_date, Some(expiry));
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let expiry = now() + 3_600_000;
        let mgr = manager(
            &dir,
            FakeProvider {
                fresh_expiry: expiry,
                ..Default::default()
            },
            FakeReceiver::default(),
        );
        mgr.store.inner.save(&record("stale", Some(now() - 1000))).unwrap();

        let session = mgr.start().await.unwrap();

        assert_eq!(session.access_token(), "refreshed");
        assert_eq!(mgr.provider.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.receiver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(mgr.store.saves(), 1);

        let saved = mgr.store.load().unwrap().unwrap();
        assert_eq!(saved.access_token, "refreshed");
        assert_eq!(saved.expiry_date, Some(expiry));
        assert_eq!(saved.refresh_token.as_deref(), Some("1//refresh"));
    }

    #[tokio::test]
    async fn valid_token_needs_no_network() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir, FakeProvider::default(), FakeReceiver::default());
        let stored = record("still-good", Some(now() + 600_000));
        mgr.store.inner.save(&stored).unwrap();

        let session = mgr.start().await.unwrap();

        assert_eq!(session.access_token(), "still-good");
        assert_eq!(mgr.provider.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(mgr.provider.exchanges.load(Ordering::SeqCst), 0);
        assert_eq!(mgr.receiver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(mgr.store.saves(), 0);
        assert_eq!(mgr.store.load().unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn token_without_expiry_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir, FakeProvider::default(), FakeReceiver::default());
        mgr.store.inner.save(&record("forever", None)).unwrap();

        let session = mgr.start().await.unwrap();
        assert_eq!(session.access_token(), "forever");
        assert_eq!(mgr.provider.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_failure_does_not_fall_back_to_login() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(
            &dir,
            FakeProvider {
                fail_refresh: true,
                ..Default::default()
            },
            FakeReceiver::default(),
        );
        let stale = record("stale", Some(now() - 1000));
        mgr.store.inner.save(&stale).unwrap();

        let err = mgr.start().await.unwrap_err();

        assert!(matches!(err, Error::Api { status: 400, .. }));
        assert_eq!(mgr.receiver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(mgr.store.saves(), 0);
        assert_eq!(mgr.store.load().unwrap(), Some(stale));
    }

    #[tokio::test]
    async fn denied_login_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(
            &dir,
            FakeProvider::default(),
            FakeReceiver {
                deny: true,
                ..Default::default()
            },
        );

        let err = mgr.start().await.unwrap_err();

        assert!(matches!(err, Error::AuthorizationDenied(_)));
        assert_eq!(mgr.provider.exchanges.load(Ordering::SeqCst), 0);
        assert_eq!(mgr.store.saves(), 0);
        assert!(mgr.store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn login_overwrites_a_valid_token() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(
            &dir,
            FakeProvider {
                fresh_expiry: now() + 3_600_000,
                ..Default::default()
            },
            FakeReceiver::default(),
        );
        mgr.store.inner.save(&record("old", Some(now() + 600_000))).unwrap();

        let session = mgr.login().await.unwrap();

        assert_eq!(session.access_token(), "from-the-code");
        assert_eq!(mgr.store.load().unwrap().unwrap().access_token, "from-the-code");
    }

    #[tokio::test]
    async fn corrupt_token_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir, FakeProvider::default(), FakeReceiver::default());
        std::fs::write(mgr.store.location(), "garbage").unwrap();

        let err = mgr.start().await.unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert_eq!(mgr.receiver.calls.load(Ordering::SeqCst), 0);
    }
}
