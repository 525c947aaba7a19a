//! Wrappers around the external media tools (ffprobe, yt-dlp).

mod download;
mod probe;
mod tool;

pub use download::download_video;
pub use probe::{VideoInfo, probe_video};
pub use tool::{ToolStatus, check_tool};
