use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};

use crate::config::Config;
use crate::media::{self, ToolStatus, VideoInfo};

pub struct ValidateArgs {
    pub file: PathBuf,
}

/// Check a file against the Shorts rules. Exit status reflects the verdict.
pub async fn run(config: &Config, args: ValidateArgs) -> anyhow::Result<ExitCode> {
    let ffprobe = &config.tools.ffprobe;
    match media::check_tool(ffprobe, "-version").await {
        ToolStatus::Available(_) => {}
        ToolStatus::Missing => bail!(
            "{ffprobe} not found. Install ffmpeg first \
             (macOS: brew install ffmpeg, Ubuntu: sudo apt install ffmpeg)"
        ),
        ToolStatus::Unknown(reason) => bail!("{ffprobe} is not usable: {reason}"),
    }

    ensure_file(&args.file).await?;
    let info = media::probe_video(ffprobe, &args.file).await?;
    print_report(&args.file, &info);

    Ok(if info.is_valid_short {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Fail early with a clear message when `path` is not a readable file.
pub(crate) async fn ensure_file(path: &Path) -> anyhow::Result<()> {
    let meta = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("file not found: {}", path.display()))?;
    if !meta.is_file() {
        bail!("{} is not a file", path.display());
    }
    Ok(())
}

pub(crate) fn print_report(path: &Path, info: &VideoInfo) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_else(|| path.to_string_lossy());

    println!();
    println!("Validating: {name}");
    println!(
        "  Resolution: {}x{} ({})",
        info.width, info.height, info.aspect_ratio
    );
    println!("  Duration: {:.1}s", info.duration);
    println!("  Vertical: {}", yes_no(info.is_vertical));
    println!("  Valid Short: {}", yes_no(info.is_valid_short));
    if !info.warnings.is_empty() {
        println!("  Warnings:");
        for w in &info.warnings {
            println!("    - {w}");
        }
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "Yes" } else { "No" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_file_rejects_missing_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.mp4");

        let err = ensure_file(&missing).await.unwrap_err();
        assert!(err.to_string().starts_with("file not found"));

        let err = ensure_file(dir.path()).await.unwrap_err();
        assert!(err.to_string().ends_with("is not a file"));
    }

    #[tokio::test]
    async fn missing_prober_is_an_error() {
        let mut config = Config::default();
        config.tools.ffprobe = "yt-shorts-no-such-ffprobe".into();

        let err = run(
            &config,
            ValidateArgs {
                file: "clip.mp4".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
