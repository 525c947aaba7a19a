use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Access/refresh token pair as persisted in `token.json`.
///
/// Field names follow the provider's wire format so the file round-trips
/// verbatim; anything we don't model lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenRecord {
    /// A record without an expiry never counts as expired.
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < now_millis)
    }

    /// Fold a refresh response into this record.
    ///
    /// The provider usually omits the refresh token on refresh; the stored one
    /// stays in that case.
    pub fn merge_refresh(&self, refreshed: TokenRecord) -> TokenRecord {
        let mut extra = self.extra.clone();
        extra.extend(refreshed.extra);
        TokenRecord {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token.or_else(|| self.refresh_token.clone()),
            expiry_date: refreshed.expiry_date,
            scope: refreshed.scope.or_else(|| self.scope.clone()),
            token_type: refreshed.token_type.or_else(|| self.token_type.clone()),
            extra,
        }
    }
}

/// Single-account token file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when no token has been saved yet.
    pub fn load(&self) -> Result<Option<TokenRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::persistence(
                    format!("failed to read token file {}", self.path.display()),
                    e,
                ));
            }
        };

        let record = serde_json::from_str(&content).map_err(|e| {
            Error::persistence(
                format!("failed to parse token file {}", self.path.display()),
                e,
            )
        })?;
        Ok(Some(record))
    }

    pub fn save(&self, record: &TokenRecord) -> Result<()> {
        let persist_err = |what: &str, path: &Path, e: std::io::Error| {
            Error::persistence(format!("failed to {what} {}", path.display()), e)
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| persist_err("create directory", parent, e))?;
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| Error::persistence("failed to serialize token record", e))?;

        // Atomic write: tmp file → rename
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| persist_err("write token file", &tmp, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| persist_err("restrict permissions on", &tmp, e))?;
        }

        std::fs::rename(&tmp, &self.path)
            .map_err(|e| persist_err("save token file", &self.path, e))?;

        tracing::debug!(path = %self.path.display(), "token saved");
        Ok(())
    }
}

impl super::TokenStorage for TokenStore {
    fn load(&self) -> Result<Option<TokenRecord>> {
        TokenStore::load(self)
    }

    fn save(&self, record: &TokenRecord) -> Result<()> {
        TokenStore::save(self, record)
    }

    fn location(&self) -> &Path {
        self.path()
    }
}
