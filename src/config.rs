use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variable holding the OAuth client id.
pub const CLIENT_ID_ENV: &str = "YOUTUBE_CLIENT_ID";
/// Environment variable holding the OAuth client secret.
pub const CLIENT_SECRET_ENV: &str = "YOUTUBE_CLIENT_SECRET";

/// The resumable upload protocol wants chunks in multiples of 256 KiB.
const UPLOAD_CHUNK_GRANULARITY: usize = 256 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// OAuth client file downloaded from the Google Cloud console
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Where the access/refresh token record is kept
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    /// Port for the local OAuth callback server
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
    /// Seconds to wait for the browser redirect; 0 waits forever
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_path: default_token_path(),
            redirect_port: default_redirect_port(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AuthConfig {
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}", self.redirect_port)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    #[serde(default = "default_category_id")]
    pub category_id: String,
    #[serde(default = "default_chunk_size_mb")]
    pub chunk_size_mb: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            category_id: default_category_id(),
            chunk_size_mb: default_chunk_size_mb(),
        }
    }
}

impl UploadConfig {
    /// Chunk size in bytes, never below one protocol granule.
    pub fn chunk_size(&self) -> usize {
        let bytes = self.chunk_size_mb.saturating_mul(1024 * 1024);
        (bytes / UPLOAD_CHUNK_GRANULARITY).max(1) * UPLOAD_CHUNK_GRANULARITY
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
    #[serde(default = "default_yt_dlp")]
    pub yt_dlp: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffprobe: default_ffprobe(),
            yt_dlp: default_yt_dlp(),
        }
    }
}

fn default_credentials_path() -> PathBuf {
    "client_secrets.json".into()
}
fn default_token_path() -> PathBuf {
    "token.json".into()
}
fn default_redirect_port() -> u16 {
    3000
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_category_id() -> String {
    // People & Blogs
    "22".into()
}
fn default_chunk_size_mb() -> usize {
    8
}
fn default_ffprobe() -> String {
    "ffprobe".into()
}
fn default_yt_dlp() -> String {
    "yt-dlp".into()
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("yt-shorts").join("config.toml"))
}

/// Load the configuration.
///
/// An explicitly given path must exist. Without one, the per-user default
/// location is tried and the built-in defaults are used when it is absent.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => {
                tracing::debug!("no config file, using defaults");
                return Ok(Config::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path).map_err(|e| {
        Error::Configuration(format!(
            "failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    let config = parse_config(&content).map_err(|e| match e {
        Error::Configuration(msg) => {
            Error::Configuration(format!("{}: {msg}", path.display()))
        }
        other => other,
    })?;

    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

fn parse_config(content: &str) -> Result<Config> {
    let config: Config =
        toml::from_str(content).map_err(|e| Error::Configuration(e.to_string()))?;

    if config.auth.redirect_port == 0 {
        return Err(Error::Configuration(
            "auth.redirect_port must be a fixed, registered port".into(),
        ));
    }
    if config.upload.category_id.trim().is_empty() {
        return Err(Error::Configuration(
            "upload.category_id must not be empty".into(),
        ));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.auth.token_path, PathBuf::from("token.json"));
        assert_eq!(cfg.auth.credentials_path, PathBuf::from("client_secrets.json"));
        assert_eq!(cfg.auth.redirect_uri(), "http://localhost:3000");
        assert_eq!(cfg.auth.timeout(), Some(Duration::from_secs(300)));
        assert_eq!(cfg.upload.category_id, "22");
        assert_eq!(cfg.tools.yt_dlp, "yt-dlp");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse_config(
            "[auth]\ntoken_path = \"/tmp/tok.json\"\ntimeout_secs = 0\n\n[tools]\nffprobe = \"/opt/ffprobe\"\n",
        )
        .unwrap();
        assert_eq!(cfg.auth.token_path, PathBuf::from("/tmp/tok.json"));
        assert_eq!(cfg.auth.redirect_port, 3000);
        assert_eq!(cfg.auth.timeout(), None);
        assert_eq!(cfg.tools.ffprobe, "/opt/ffprobe");
        assert_eq!(cfg.tools.yt_dlp, "yt-dlp");
    }

    #[test]
    fn rejects_port_zero() {
        let err = parse_config("[auth]\nredirect_port = 0\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(parse_config("[auth]\nclient_idd = \"x\"\n").is_err());
    }

    #[test]
    fn chunk_size_is_granule_aligned() {
        let mut upload = UploadConfig::default();
        assert_eq!(upload.chunk_size(), 8 * 1024 * 1024);
        upload.chunk_size_mb = 0;
        assert_eq!(upload.chunk_size(), 256 * 1024);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
