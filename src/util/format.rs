use serde::Serialize;

use crate::youtube::types::Video;
use crate::youtube::watch_url;

/// Widest the title column gets in the table.
const MAX_TITLE_WIDTH: usize = 40;

/// One row of `list` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRow {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub published_at: String,
    pub privacy_status: String,
    pub view_count: String,
    pub like_count: String,
    /// Already rendered as `M:SS` or `H:MM:SS`.
    pub duration: String,
}

impl From<&Video> for VideoRow {
    fn from(video: &Video) -> Self {
        let snippet = video.snippet.as_ref();
        let stats = video.statistics.as_ref();
        Self {
            video_id: video.id.clone(),
            title: video.title().to_string(),
            url: watch_url(&video.id),
            published_at: snippet
                .and_then(|s| s.published_at.clone())
                .unwrap_or_default(),
            privacy_status: video.privacy_status().to_string(),
            view_count: stats
                .and_then(|s| s.view_count.clone())
                .unwrap_or_else(|| "0".into()),
            like_count: stats
                .and_then(|s| s.like_count.clone())
                .unwrap_or_else(|| "0".into()),
            duration: format_duration(
                video
                    .content_details
                    .as_ref()
                    .and_then(|d| d.duration.as_deref())
                    .unwrap_or("PT0S"),
            ),
        }
    }
}

/// Render an ISO 8601 duration such as `PT1M30S` as `1:30`.
///
/// Anything unparseable renders as `0:00`.
pub fn format_duration(iso: &str) -> String {
    // Only the time part is shown; a day component is dropped.
    let Some((_, rest)) = iso.strip_prefix('P').and_then(|p| p.split_once('T')) else {
        return "0:00".into();
    };

    let (mut hours, mut minutes, mut seconds) = (0u64, 0u64, 0u64);
    let mut digits = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value = digits.parse().unwrap_or(0);
        digits.clear();
        match c {
            'H' => hours = value,
            'M' => minutes = value,
            'S' => seconds = value,
            // fractional seconds: keep the whole part
            '.' => {
                seconds = value;
                break;
            }
            _ => return "0:00".into(),
        }
    }

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// `1234` → `1.2K`, `3400000` → `3.4M`; smaller or non-numeric values pass through.
pub fn format_count(count: &str) -> String {
    match count.parse::<u64>() {
        Ok(n) if n >= 1_000_000 => format!("{:.1}M", n as f64 / 1_000_000.0),
        Ok(n) if n >= 1_000 => format!("{:.1}K", n as f64 / 1_000.0),
        _ => count.to_string(),
    }
}

/// RFC 3339 timestamp → `YYYY-MM-DD` (UTC).
pub fn format_date(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&chrono::Utc).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| timestamp.chars().take(10).collect())
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let head: String = s.chars().take(width.saturating_sub(3)).collect();
    format!("{head}...")
}

fn pad_right(s: &str, width: usize) -> String {
    format!("{s:<width$}")
}

/// The table printed by `list --format table`.
pub fn render_table(rows: &[VideoRow], total_results: u64) -> String {
    if rows.is_empty() {
        return "No videos found.\n".into();
    }

    let title_width = rows
        .iter()
        .map(|r| r.title.chars().count())
        .max()
        .unwrap_or(0)
        .min(MAX_TITLE_WIDTH);

    let mut out = format!(
        "Your Videos (showing {} of {total_results})\n\n",
        rows.len()
    );
    let header = format!(
        "  #  {}  Privacy    Views    Duration  Published",
        pad_right("Title", title_width)
    );
    out.push_str(&header);
    out.push('\n');
    out.push_str(&format!("  {}\n", "-".repeat(header.chars().count() - 2)));

    for (i, row) in rows.iter().enumerate() {
        out.push_str(&format!(
            "  {:>2}  {}  {:<10}{:>8}  {:>8}  {}\n",
            i + 1,
            pad_right(&truncate(&row.title, title_width), title_width),
            row.privacy_status,
            format_count(&row.view_count),
            row.duration,
            format_date(&row.published_at),
        ));
    }

    out
}

/// The pretty JSON array printed by `list --format json`.
pub fn render_json(rows: &[VideoRow]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(title: &str) -> VideoRow {
        VideoRow {
            video_id: "abc".into(),
            title: title.into(),
            url: "https://youtube.com/watch?v=abc".into(),
            published_at: "2024-05-01T10:00:00Z".into(),
            privacy_status: "public".into(),
            view_count: "15342".into(),
            like_count: "12".into(),
            duration: "0:45".into(),
        }
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration("PT45S"), "0:45");
        assert_eq!(format_duration("PT1M30S"), "1:30");
        assert_eq!(format_duration("PT2M"), "2:00");
        assert_eq!(format_duration("PT1H2M3S"), "1:02:03");
        assert_eq!(format_duration("PT0S"), "0:00");
        assert_eq!(format_duration("P1DT2H"), "2:00:00");
        assert_eq!(format_duration("P0DT5M7S"), "5:07");
        assert_eq!(format_duration("P1D"), "0:00");
        assert_eq!(format_duration("garbage"), "0:00");
    }

    #[test]
    fn counts() {
        assert_eq!(format_count("999"), "999");
        assert_eq!(format_count("1234"), "1.2K");
        assert_eq!(format_count("3400000"), "3.4M");
        assert_eq!(format_count("n/a"), "n/a");
    }

    #[test]
    fn dates() {
        assert_eq!(format_date("2024-05-01T10:00:00Z"), "2024-05-01");
        assert_eq!(format_date("2024-05-01T23:30:00-02:00"), "2024-05-02");
        assert_eq!(format_date(""), "");
    }

    #[test]
    fn long_titles_are_truncated() {
        let long = "x".repeat(50);
        let table = render_table(&[row(&long)], 1);
        assert!(table.contains(&format!("{}...", "x".repeat(37))));
        assert!(!table.contains(&"x".repeat(41)));
    }

    #[test]
    fn table_layout() {
        let table = render_table(&[row("Cat jumps")], 7);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Your Videos (showing 1 of 7)");
        assert_eq!(lines[2], "  #  Title      Privacy    Views    Duration  Published");
        assert_eq!(lines[4], "   1  Cat jumps  public       15.3K      0:45  2024-05-01");
    }

    #[test]
    fn empty_table() {
        assert_eq!(render_table(&[], 0), "No videos found.\n");
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let json = render_json(&[row("Cat")]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["videoId"], "abc");
        assert_eq!(value[0]["privacyStatus"], "public");
        assert_eq!(value[0]["viewCount"], "15342");
        assert_eq!(value[0]["duration"], "0:45");
    }

    #[test]
    fn row_from_bare_video() {
        let video: Video = serde_json::from_str(r#"{"id": "v9"}"#).unwrap();
        let row = VideoRow::from(&video);
        assert_eq!(row.title, "Untitled");
        assert_eq!(row.privacy_status, "unknown");
        assert_eq!(row.view_count, "0");
        assert_eq!(row.duration, "0:00");
        assert_eq!(row.url, "https://youtube.com/watch?v=v9");
    }
}
