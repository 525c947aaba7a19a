use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::error::Error;
use crate::media::{self, ToolStatus};
use crate::metadata::{NewVideo, PrivacyStatus, prepare_for_upload};
use crate::youtube::{YoutubeClient, shorts_url};

use super::validate::{ensure_file, print_report};

pub struct UploadArgs {
    pub files: Vec<PathBuf>,
    pub title: String,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub privacy: Option<PrivacyStatus>,
    pub skip_validation: bool,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub video_id: String,
    pub title: String,
    pub url: String,
}

/// Outcome of one file in a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub path: PathBuf,
    pub outcome: anyhow::Result<UploadResult>,
}

/// Upload each file in turn. A failure is recorded and the next file is tried.
pub async fn upload_batch<F, Fut>(files: &[PathBuf], mut upload_one: F) -> Vec<BatchItem>
where
    F: FnMut(&Path) -> Fut,
    Fut: Future<Output = anyhow::Result<UploadResult>>,
{
    let mut items = Vec::with_capacity(files.len());
    for (i, path) in files.iter().enumerate() {
        if files.len() > 1 {
            println!();
            println!("=== Uploading video {} of {} ===", i + 1, files.len());
        }
        let outcome = upload_one(path).await;
        if let Err(e) = &outcome {
            tracing::warn!(path = %path.display(), error = %format!("{e:#}"), "upload failed");
        }
        items.push(BatchItem {
            path: path.clone(),
            outcome,
        });
    }
    items
}

pub async fn run(config: &Config, args: UploadArgs) -> anyhow::Result<ExitCode> {
    let validate = !args.skip_validation && prober_usable(&config.tools.ffprobe).await;
    let force = args.force;
    let client = OnceCell::new();

    let video = NewVideo {
        title: args.title.clone(),
        description: args.description.clone().unwrap_or_default(),
        tags: args.tags.clone().unwrap_or_default(),
        privacy: args.privacy.unwrap_or_default(),
        category_id: Some(config.upload.category_id.clone()),
    };

    let mut items = upload_batch(&args.files, |path| {
        let path = path.to_path_buf();
        let video = video.clone();
        let client = &client;
        async move {
            ensure_file(&path).await?;
            if validate {
                check_short(config, &path, force).await?;
            }
            let client = client
                .get_or_try_init(|| super::client(config))
                .await?;
            upload_file(client, config, &path, video, true).await
        }
    })
    .await;

    // A single file reports its error like any other command.
    if items.len() == 1
        && let Some(item) = items.pop()
    {
        let result = item.outcome?;
        println!();
        println!("=== Upload Summary ===");
        println!("Title: {}", result.title);
        println!("URL: {}", result.url);
        return Ok(ExitCode::SUCCESS);
    }

    Ok(if print_summary(&items) > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Print per-file results and return how many failed.
fn print_summary(items: &[BatchItem]) -> usize {
    let failed = items.iter().filter(|i| i.outcome.is_err()).count();

    println!();
    println!(
        "=== Upload Summary: {} succeeded, {failed} failed ===",
        items.len() - failed
    );
    for item in items {
        match &item.outcome {
            Ok(r) => println!("  OK    {} -> {} ({})", item.path.display(), r.url, r.title),
            Err(e) => println!("  FAIL  {}: {e:#}", item.path.display()),
        }
    }
    failed
}

async fn prober_usable(ffprobe: &str) -> bool {
    match media::check_tool(ffprobe, "-version").await {
        ToolStatus::Available(version) => {
            tracing::debug!(%version, "validating with {ffprobe}");
            true
        }
        ToolStatus::Missing => {
            tracing::warn!("{ffprobe} not found, skipping validation. Install ffmpeg to enable it");
            false
        }
        ToolStatus::Unknown(reason) => {
            tracing::warn!(%reason, "{ffprobe} is not usable, skipping validation");
            false
        }
    }
}

async fn check_short(config: &Config, path: &Path, force: bool) -> anyhow::Result<()> {
    let info = media::probe_video(&config.tools.ffprobe, path).await?;
    print_report(path, &info);

    if !info.is_valid_short {
        if force {
            tracing::warn!(path = %path.display(), "video is not a valid Short, uploading anyway");
        } else {
            return Err(Error::Validation(info.warnings.join("; ")))
                .context("use --force to upload anyway");
        }
    }
    Ok(())
}

/// Upload one file and print where it ended up.
pub(crate) async fn upload_file(
    client: &YoutubeClient,
    config: &Config,
    path: &Path,
    video: NewVideo,
    add_shorts_hashtag: bool,
) -> anyhow::Result<UploadResult> {
    let video = prepare_for_upload(video, add_shorts_hashtag);
    let size = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("cannot stat {}", path.display()))?
        .len();

    println!();
    println!(
        "Uploading: {}",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy())
    );
    println!("Title: {}", video.title);
    println!("Size: {:.2} MB", size as f64 / (1024.0 * 1024.0));
    println!("Privacy: {}", video.privacy);
    println!();

    let uploaded = client
        .upload_video(path, &video, config.upload.chunk_size())
        .await
        .with_context(|| format!("failed to upload {}", path.display()))?;

    let url = shorts_url(&uploaded.id);
    println!("Upload complete!");
    println!("Video ID: {}", uploaded.id);
    println!("URL: {url}");

    let title = uploaded
        .snippet
        .as_ref()
        .and_then(|s| s.title.clone())
        .unwrap_or(video.title);
    Ok(UploadResult {
        video_id: uploaded.id,
        title,
        url,
    })
}
