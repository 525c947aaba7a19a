use std::path::Path;

use anyhow::{Context, bail};

use crate::config::Config;
use crate::media::{self, ToolStatus};
use crate::metadata::{MetadataPatch, merge_for_clone};
use crate::youtube::watch_url;

use super::upload::{UploadResult, upload_file};

pub struct CloneArgs {
    pub video_id: String,
    pub overrides: MetadataPatch,
    pub keep_file: bool,
}

/// Download a video and upload it again under new metadata.
pub async fn run(config: &Config, args: CloneArgs) -> anyhow::Result<()> {
    let yt_dlp = &config.tools.yt_dlp;
    match media::check_tool(yt_dlp, "--version").await {
        ToolStatus::Available(version) => tracing::debug!(%version, "using {yt_dlp}"),
        ToolStatus::Missing => bail!(
            "{yt_dlp} is required for cloning videos. \
             Install with: brew install yt-dlp (macOS) or pip install yt-dlp"
        ),
        ToolStatus::Unknown(reason) => bail!("{yt_dlp} is not usable: {reason}"),
    }

    let client = super::client(config).await?;

    println!("Fetching original video {}...", args.video_id);
    let source = client
        .get_video(&args.video_id)
        .await
        .with_context(|| format!("cannot clone video {}", args.video_id))?;

    let mut video = merge_for_clone(&source.metadata(), &args.overrides)?;
    if video.category_id.is_none() {
        video.category_id = Some(config.upload.category_id.clone());
    }

    println!("Original title: {}", source.title());
    println!("New title: {}", video.title);
    println!("Privacy: {}", video.privacy);
    println!();

    let temp_file = std::env::temp_dir().join(format!(
        "yt-clone-{}-{}.mp4",
        args.video_id,
        chrono::Utc::now().timestamp_millis()
    ));

    println!("Downloading video...");
    let result: anyhow::Result<UploadResult> = async {
        media::download_video(yt_dlp, &watch_url(&args.video_id), &temp_file).await?;
        println!();
        println!("Downloaded to: {}", temp_file.display());
        println!("Uploading clone...");
        upload_file(&client, config, &temp_file, video, false).await
    }
    .await;

    if args.keep_file {
        println!("Keeping file: {}", temp_file.display());
    } else {
        remove_temp_file(&temp_file).await;
    }

    let result = result?;
    println!();
    println!("=== Clone Complete ===");
    println!("New Video ID: {}", result.video_id);
    println!("Title: {}", result.title);
    println!("URL: {}", result.url);
    Ok(())
}

async fn remove_temp_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => println!("Temp file deleted."),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to delete temp file"),
    }
}
