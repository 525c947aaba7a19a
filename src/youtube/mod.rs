//! YouTube Data API v3 client.

mod client;
pub mod types;
mod videos;

pub use client::YoutubeClient;

/// Public Shorts URL of an uploaded video.
pub fn shorts_url(video_id: &str) -> String {
    format!("https://youtube.com/shorts/{video_id}")
}

/// Public watch URL of a video.
pub fn watch_url(video_id: &str) -> String {
    format!("https://youtube.com/watch?v={video_id}")
}
