use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{Error, Result};

/// Download `url` to `dest` as mp4 with yt-dlp.
///
/// yt-dlp's own progress output is passed through to the terminal.
pub async fn download_video(yt_dlp: &str, url: &str, dest: &Path) -> Result<()> {
    tracing::info!(url, dest = %dest.display(), "downloading video");

    let status = Command::new(yt_dlp)
        .args(["--merge-output-format", "mp4", "-o"])
        .arg(dest)
        .arg(url)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| Error::Network(format!("cannot run {yt_dlp}: {e}")))?;

    if !status.success() {
        return Err(Error::Network(format!(
            "failed to download {url} ({yt_dlp} exited with {status}). \
             Make sure the video is accessible and you have permission to download it"
        )));
    }

    if !tokio::fs::try_exists(dest).await.unwrap_or(false) {
        return Err(Error::Network(format!(
            "download failed: {} was not created",
            dest.display()
        )));
    }

    Ok(())
}
