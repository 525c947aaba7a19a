use anyhow::Context;

use crate::config::Config;
use crate::error::Error;
use crate::metadata::{MetadataPatch, apply_patch};
use crate::youtube::watch_url;

pub struct UpdateArgs {
    pub video_id: String,
    pub patch: MetadataPatch,
}

/// Change title, description, tags or privacy of an existing video.
pub async fn run(config: &Config, args: UpdateArgs) -> anyhow::Result<()> {
    // Reject before authenticating or touching the network.
    if args.patch.is_empty() {
        return Err(Error::NoChangesSpecified.into());
    }

    let client = super::client(config).await?;

    println!("Fetching video {}...", args.video_id);
    let video = client
        .get_video(&args.video_id)
        .await
        .with_context(|| format!("cannot update video {}", args.video_id))?;

    let outcome = apply_patch(&video.metadata(), &args.patch)?;

    println!();
    println!("Applying changes:");
    for change in &outcome.changes {
        println!("  • {change}");
    }
    println!();

    client
        .update_video(&args.video_id, &outcome.metadata)
        .await
        .with_context(|| format!("failed to update video {}", args.video_id))?;

    println!("Video updated successfully!");
    println!();
    println!("URL: {}", watch_url(&args.video_id));
    Ok(())
}
