use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::{CLIENT_ID_ENV, CLIENT_SECRET_ENV};
use crate::error::{Error, Result};

/// OAuth client identity of this installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredential {
    pub client_id: String,
    pub client_secret: String,
}

/// Layout of the client file downloaded from the Google Cloud console.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecretsEntry>,
    web: Option<ClientSecretsEntry>,
}

/// One client in the file.
///
/// Only the identity is read. Console fields such as `redirect_uris` are
/// ignored.
#[derive(Debug, Deserialize)]
struct ClientSecretsEntry {
    client_id: String,
    client_secret: String,
}

/// Resolves the client credential from the environment or the client file.
pub struct CredentialResolver {
    credentials_path: PathBuf,
}

impl CredentialResolver {
    pub fn new(credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
        }
    }

    pub fn resolve(&self) -> Result<ClientCredential> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` in place of the process environment.
    ///
    /// The client file is only touched when the environment lacks either
    /// variable.
    pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<ClientCredential> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let (Some(client_id), Some(client_secret)) =
            (non_empty(CLIENT_ID_ENV), non_empty(CLIENT_SECRET_ENV))
        {
            tracing::debug!("using client credential from environment");
            return Ok(ClientCredential {
                client_id,
                client_secret,
            });
        }

        match read_client_file(&self.credentials_path)? {
            Some(credential) => {
                tracing::debug!(path = %self.credentials_path.display(), "using client file");
                Ok(credential)
            }
            None => Err(Error::Configuration(format!(
                "no OAuth client credential found.\n\
                 Either set {CLIENT_ID_ENV} and {CLIENT_SECRET_ENV}, or download OAuth 2.0 \
                 credentials from the Google Cloud console and save them as {}",
                self.credentials_path.display()
            ))),
        }
    }
}

fn read_client_file(path: &Path) -> Result<Option<ClientCredential>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::persistence(
                format!("failed to read client file {}", path.display()),
                e,
            ));
        }
    };

    let file: ClientSecretsFile = serde_json::from_str(&content).map_err(|e| {
        Error::persistence(format!("failed to parse client file {}", path.display()), e)
    })?;

    let entry = file.installed.or(file.web).ok_or_else(|| {
        Error::Configuration(format!(
            "{} has neither an \"installed\" nor a \"web\" client",
            path.display()
        ))
    })?;

    Ok(Some(ClientCredential {
        client_id: entry.client_id,
        client_secret: entry.client_secret,
    }))
}
