//! One module per subcommand. Each handler takes the loaded config plus its
//! parsed arguments and prints user-facing output to stdout.

pub mod clone;
pub mod list;
pub mod update;
pub mod upload;
pub mod validate;

use crate::auth;
use crate::config::Config;
use crate::youtube::YoutubeClient;

/// Authenticate and build an API client.
async fn client(config: &Config) -> anyhow::Result<YoutubeClient> {
    use anyhow::Context;

    let session = auth::connect(config)
        .await
        .context("authentication failed")?;
    Ok(YoutubeClient::new(&session)?)
}
