use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Shorts may not run longer than this many seconds.
const MAX_SHORTS_DURATION: f64 = 60.0;
const MIN_SHORTS_DURATION: f64 = 1.0;
/// 9:16
const IDEAL_ASPECT: f64 = 0.5625;
const ASPECT_TOLERANCE: f64 = 0.1;

/// What the prober found out about a file and how it fares as a Short.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Seconds.
    pub duration: f64,
    /// `width:height` as reported.
    pub aspect_ratio: String,
    pub is_vertical: bool,
    pub is_valid_short: bool,
    pub warnings: Vec<String>,
}

impl VideoInfo {
    /// Apply the Shorts rules to raw stream dimensions and duration.
    pub fn evaluate(width: u32, height: u32, duration: f64) -> Self {
        let mut warnings = Vec::new();
        let mut is_valid_short = true;
        let is_vertical = height > width;
        let aspect_ratio = format!("{width}:{height}");

        if duration > MAX_SHORTS_DURATION {
            warnings.push(format!(
                "Duration ({duration:.1}s) exceeds {MAX_SHORTS_DURATION}s - will NOT be a Short"
            ));
            is_valid_short = false;
        } else if duration < MIN_SHORTS_DURATION {
            warnings.push(format!("Duration too short ({duration:.1}s)"));
            is_valid_short = false;
        }

        if !is_vertical {
            warnings.push(format!(
                "Video is horizontal ({width}x{height}) - Shorts should be vertical (9:16)"
            ));
            is_valid_short = false;
        } else if (f64::from(width) / f64::from(height) - IDEAL_ASPECT).abs() > ASPECT_TOLERANCE {
            warnings.push(format!(
                "Aspect ratio {aspect_ratio} differs from ideal 9:16 - may have black bars"
            ));
        }

        Self {
            width,
            height,
            duration,
            aspect_ratio,
            is_vertical,
            is_valid_short,
            warnings,
        }
    }

    /// Build from the JSON printed by `ffprobe -print_format json -show_streams -show_format`.
    pub fn from_probe_json(json: &str) -> Result<Self> {
        let probe: ProbeOutput = serde_json::from_str(json)
            .map_err(|e| Error::Validation(format!("unreadable prober output: {e}")))?;

        let stream = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| Error::Validation("no video stream found in file".into()))?;

        let (Some(width), Some(height)) = (stream.width, stream.height) else {
            return Err(Error::Validation("video stream has no dimensions".into()));
        };
        if height == 0 {
            return Err(Error::Validation("video stream has zero height".into()));
        }

        let duration = probe
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .or(stream.duration.as_deref())
            .and_then(|d| d.trim().parse::<f64>().ok())
            .unwrap_or(0.0);

        Ok(Self::evaluate(width, height, duration))
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
}

/// Run the prober on `path` and evaluate the result.
pub async fn probe_video(ffprobe: &str, path: &Path) -> Result<VideoInfo> {
    let output = Command::new(ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::Validation(format!("cannot run {ffprobe}: {e}")))?;

    if !output.status.success() {
        return Err(Error::Validation(format!(
            "failed to analyze {} ({ffprobe} exited with {})",
            path.display(),
            output.status
        )));
    }

    let info = VideoInfo::from_probe_json(&String::from_utf8_lossy(&output.stdout))?;
    tracing::debug!(
        path = %path.display(),
        width = info.width,
        height = info.height,
        duration = info.duration,
        valid = info.is_valid_short,
        "probed video"
    );
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORTRAIT_30S: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "h264", "codec_type": "video", "width": 1080, "height": 1920, "duration": "30.000000"},
            {"index": 1, "codec_name": "aac", "codec_type": "audio", "duration": "30.010000"}
        ],
        "format": {"filename": "clip.mp4", "duration": "30.016000", "size": "5242880"}
    }"#;

    #[test]
    fn portrait_clip_is_valid() {
        let info = VideoInfo::from_probe_json(PORTRAIT_30S).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));
        assert_eq!(info.aspect_ratio, "1080:1920");
        assert!((info.duration - 30.016).abs() < 1e-9);
        assert!(info.is_vertical);
        assert!(info.is_valid_short);
        assert!(info.warnings.is_empty());
    }

    #[test]
    fn stream_duration_used_without_format() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 720, "height": 1280, "duration": "12.5"}]}"#;
        let info = VideoInfo::from_probe_json(json).unwrap();
        assert_eq!(info.duration, 12.5);
    }

    #[test]
    fn audio_only_is_rejected() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.0"}}"#;
        assert!(matches!(
            VideoInfo::from_probe_json(json),
            Err(Error::Validation(m)) if m.contains("no video stream")
        ));
    }

    #[test]
    fn too_long_is_invalid() {
        let info = VideoInfo::evaluate(1080, 1920, 61.0);
        assert!(!info.is_valid_short);
        assert_eq!(info.warnings, vec!["Duration (61.0s) exceeds 60s - will NOT be a Short"]);
    }

    #[test]
    fn too_short_is_invalid() {
        let info = VideoInfo::evaluate(1080, 1920, 0.4);
        assert!(!info.is_valid_short);
        assert_eq!(info.warnings, vec!["Duration too short (0.4s)"]);
    }

    #[test]
    fn exactly_sixty_seconds_passes() {
        assert!(VideoInfo::evaluate(1080, 1920, 60.0).is_valid_short);
    }

    #[test]
    fn horizontal_and_square_are_invalid() {
        let wide = VideoInfo::evaluate(1920, 1080, 20.0);
        assert!(!wide.is_vertical);
        assert!(!wide.is_valid_short);
        assert!(wide.warnings[0].starts_with("Video is horizontal (1920x1080)"));

        assert!(!VideoInfo::evaluate(1080, 1080, 20.0).is_valid_short);
    }

    #[test]
    fn off_ratio_vertical_only_warns() {
        // 3:4 = 0.75, more than 0.1 away from 9:16
        let info = VideoInfo::evaluate(960, 1280, 20.0);
        assert!(info.is_vertical);
        assert!(info.is_valid_short);
        assert_eq!(
            info.warnings,
            vec!["Aspect ratio 960:1280 differs from ideal 9:16 - may have black bars"]
        );
    }

    #[tokio::test]
    async fn missing_prober_is_an_error() {
        let err = probe_video("yt-shorts-no-such-ffprobe", Path::new("x.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
