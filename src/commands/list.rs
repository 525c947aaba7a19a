use crate::config::Config;
use crate::metadata::PrivacyStatus;
use crate::util::format::{VideoRow, render_json, render_table};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub struct ListArgs {
    pub max: u32,
    pub privacy: Option<PrivacyStatus>,
    pub format: OutputFormat,
}

/// Show the channel's most recent uploads.
pub async fn run(config: &Config, args: ListArgs) -> anyhow::Result<()> {
    let client = super::client(config).await?;

    tracing::info!(max = args.max, "fetching videos");
    let page = client.list_my_videos(args.max).await?;
    let rows = filter_rows(
        page.videos.iter().map(VideoRow::from).collect(),
        args.privacy,
    );

    match args.format {
        OutputFormat::Table => print!("{}", render_table(&rows, page.total_results)),
        OutputFormat::Json => println!("{}", render_json(&rows)?),
    }
    Ok(())
}

fn filter_rows(rows: Vec<VideoRow>, privacy: Option<PrivacyStatus>) -> Vec<VideoRow> {
    match privacy {
        Some(p) => rows
            .into_iter()
            .filter(|r| r.privacy_status == p.as_str())
            .collect(),
        None => rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, privacy: &str) -> VideoRow {
        VideoRow {
            video_id: id.into(),
            title: id.into(),
            url: String::new(),
            published_at: String::new(),
            privacy_status: privacy.into(),
            view_count: "0".into(),
            like_count: "0".into(),
            duration: "0:00".into(),
        }
    }

    #[test]
    fn privacy_filter() {
        let rows = vec![row("a", "public"), row("b", "private"), row("c", "public")];

        let public = filter_rows(rows.clone(), Some(PrivacyStatus::Public));
        let ids: Vec<&str> = public.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);

        assert_eq!(filter_rows(rows.clone(), None), rows);
        assert!(filter_rows(rows, Some(PrivacyStatus::Unlisted)).is_empty());
    }
}
