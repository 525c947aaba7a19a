use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Method, Response, StatusCode};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::client::{YoutubeClient, api_error};
use super::types::{
    ChannelListResponse, PlaylistItemListResponse, SnippetBody, StatusBody, Video,
    VideoListResponse, VideoResource,
};
use crate::error::{Error, Result};
use crate::metadata::{NewVideo, VideoMetadata};

/// The Data API caps `maxResults` at 50.
const MAX_PAGE_SIZE: u32 = 50;

/// Consecutive chunks the server may answer without keeping any new bytes.
const MAX_STALLED_CHUNKS: u32 = 3;

/// One page of the channel's uploads.
#[derive(Debug)]
pub struct VideoPage {
    pub videos: Vec<Video>,
    pub total_results: u64,
}

impl YoutubeClient {
    /// Fetch snippet and status of a single video.
    pub async fn get_video(&self, video_id: &str) -> Result<Video> {
        let resp = self
            .api_request(Method::GET, "/videos")
            .query(&[("id", video_id), ("part", "snippet,status")])
            .send()
            .await?;

        let list: VideoListResponse = parse_json(resp, "video list").await?;
        list.items
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("video {video_id}")))
    }

    /// Playlist id holding the authenticated channel's uploads.
    pub async fn uploads_playlist_id(&self) -> Result<String> {
        let resp = self
            .api_request(Method::GET, "/channels")
            .query(&[("mine", "true"), ("part", "contentDetails")])
            .send()
            .await?;

        let channels: ChannelListResponse = parse_json(resp, "channel list").await?;
        let channel = channels
            .items
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound("no channel found for authenticated user".into()))?;

        channel
            .content_details
            .and_then(|d| d.related_playlists)
            .and_then(|p| p.uploads)
            .ok_or_else(|| Error::NotFound("could not find uploads playlist".into()))
    }

    /// Most recent uploads with snippet, status, statistics and duration.
    pub async fn list_my_videos(&self, max_results: u32) -> Result<VideoPage> {
        let playlist_id = self.uploads_playlist_id().await?;
        let page_size = max_results.clamp(1, MAX_PAGE_SIZE).to_string();

        let resp = self
            .api_request(Method::GET, "/playlistItems")
            .query(&[
                ("playlistId", playlist_id.as_str()),
                ("part", "snippet"),
                ("maxResults", page_size.as_str()),
            ])
            .send()
            .await?;
        let items: PlaylistItemListResponse = parse_json(resp, "playlist items").await?;

        let total_results = items
            .page_info
            .as_ref()
            .and_then(|p| p.total_results)
            .unwrap_or(0);
        let ids: Vec<&str> = items.items.iter().filter_map(|i| i.video_id()).collect();
        if ids.is_empty() {
            return Ok(VideoPage {
                videos: Vec::new(),
                total_results: 0,
            });
        }

        let resp = self
            .api_request(Method::GET, "/videos")
            .query(&[
                ("id", ids.join(",").as_str()),
                ("part", "snippet,status,statistics,contentDetails"),
            ])
            .send()
            .await?;
        let list: VideoListResponse = parse_json(resp, "video list").await?;

        tracing::debug!(count = list.items.len(), total_results, "fetched uploads");
        Ok(VideoPage {
            videos: list.items,
            total_results,
        })
    }

    /// Replace snippet and status of an existing video.
    pub async fn update_video(&self, video_id: &str, metadata: &VideoMetadata) -> Result<Video> {
        let body = VideoResource {
            id: Some(video_id.to_string()),
            snippet: SnippetBody {
                title: metadata.title.clone(),
                description: metadata.description.clone(),
                tags: metadata.tags.clone(),
                category_id: metadata.category_id.clone(),
            },
            status: StatusBody {
                privacy_status: metadata.privacy,
                self_declared_made_for_kids: None,
            },
        };

        let resp = self
            .api_request(Method::PUT, "/videos")
            .query(&[("part", "snippet,status")])
            .json(&body)
            .send()
            .await?;

        let video = parse_json(resp, "update response").await?;
        tracing::info!(video_id, "video updated");
        Ok(video)
    }

    /// Upload a video file with the resumable upload protocol.
    ///
    /// The session is opened with the metadata, then the file is sent in
    /// `chunk_size` pieces. A `308` answer means "continue"; its `Range`
    /// header says how much the server actually kept.
    pub async fn upload_video(
        &self,
        path: &Path,
        video: &NewVideo,
        chunk_size: usize,
    ) -> Result<Video> {
        let file_size = tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::persistence(format!("cannot stat {}", path.display()), e))?
            .len();
        if file_size == 0 {
            return Err(Error::Validation(format!("{} is empty", path.display())));
        }

        let session_url = self.start_upload_session(path, video, file_size).await?;
        tracing::debug!(%session_url, "resumable upload session opened");

        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::persistence(format!("cannot open {}", path.display()), e))?;

        let progress = ProgressBar::new(file_size);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );

        let mut buf = vec![0u8; chunk_size];
        let mut offset = 0u64;
        let mut stalls = 0u32;

        loop {
            let n = read_chunk(&mut file, &mut buf)
                .await
                .map_err(|e| Error::persistence(format!("failed to read {}", path.display()), e))?;
            if n == 0 {
                progress.abandon();
                return Err(Error::Api {
                    status: StatusCode::PERMANENT_REDIRECT.as_u16(),
                    message: "server expects more bytes than the file holds".into(),
                });
            }
            let end = offset + n as u64;

            let resp = self
                .http
                .put(&session_url)
                .bearer_auth(&self.access_token)
                .header(CONTENT_RANGE, format!("bytes {offset}-{}/{file_size}", end - 1))
                .body(buf[..n].to_vec())
                .send()
                .await
                .map_err(|e| Error::Network(format!("upload chunk failed: {e}")))?;

            match resp.status() {
                StatusCode::PERMANENT_REDIRECT => {
                    // No Range header means nothing was persisted yet.
                    let kept = received_upto(&resp).unwrap_or(0);
                    if kept != end {
                        tracing::debug!(sent = end, kept, "server kept a partial chunk");
                        file.seek(std::io::SeekFrom::Start(kept)).await.map_err(|e| {
                            Error::persistence(format!("failed to seek {}", path.display()), e)
                        })?;
                    }
                    offset = match track_progress(offset, kept, &mut stalls) {
                        Ok(next) => next,
                        Err(e) => {
                            progress.abandon();
                            return Err(e);
                        }
                    };
                    progress.set_position(offset);
                }
                s if s.is_success() => {
                    progress.finish_and_clear();
                    let uploaded: Video = parse_json(resp, "upload response").await?;
                    tracing::info!(video_id = %uploaded.id, "upload complete");
                    return Ok(uploaded);
                }
                status => {
                    progress.abandon();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(api_error(status, &body));
                }
            }
        }
    }

    async fn start_upload_session(
        &self,
        path: &Path,
        video: &NewVideo,
        file_size: u64,
    ) -> Result<String> {
        let body = VideoResource {
            id: None,
            snippet: SnippetBody {
                title: video.title.clone(),
                description: Some(video.description.clone()),
                tags: Some(video.tags.clone()),
                category_id: video.category_id.clone(),
            },
            status: StatusBody {
                privacy_status: Some(video.privacy),
                self_declared_made_for_kids: Some(false),
            },
        };

        let resp = self
            .upload_request(Method::POST, "/videos")
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .header("X-Upload-Content-Length", &file_size.to_string())
            .header("X-Upload-Content-Type", content_type(path))
            .json(&body)
            .send()
            .await?;

        resp.headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| Error::Api {
                status: resp.status().as_u16(),
                message: "no Location header in upload-initiation response".into(),
            })
    }
}

/// Accept the server's resume point, failing once it has stopped advancing.
fn track_progress(offset: u64, kept: u64, stalls: &mut u32) -> Result<u64> {
    if kept > offset {
        *stalls = 0;
        return Ok(kept);
    }
    *stalls += 1;
    tracing::warn!(offset, kept, stalls = *stalls, "upload chunk was not kept");
    if *stalls >= MAX_STALLED_CHUNKS {
        return Err(Error::Api {
            status: StatusCode::PERMANENT_REDIRECT.as_u16(),
            message: format!("upload made no progress after {stalls} attempts at byte {kept}"),
        });
    }
    Ok(kept)
}

async fn parse_json<T: serde::de::DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
    resp.json()
        .await
        .map_err(|e| Error::Network(format!("failed to parse {what}: {e}")))
}

/// Fill `buf` as far as the file allows.
async fn read_chunk(file: &mut tokio::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Byte count the server has persisted, from a `Range: bytes=0-N` header.
fn received_upto(resp: &Response) -> Option<u64> {
    let range = resp.headers().get(RANGE)?.to_str().ok()?;
    parse_range_end(range).map(|last| last + 1)
}

fn parse_range_end(range: &str) -> Option<u64> {
    range
        .strip_prefix("bytes=")?
        .split_once('-')?
        .1
        .trim()
        .parse()
        .ok()
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        _ => "video/*",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn range_header_parsing() {
        assert_eq!(parse_range_end("bytes=0-262143"), Some(262_143));
        assert_eq!(parse_range_end("bytes=0-"), None);
        assert_eq!(parse_range_end("0-10"), None);
    }

    #[test]
    fn stalled_upload_gives_up() {
        let mut stalls = 0;
        // Progress resets the count.
        assert_eq!(track_progress(0, 0, &mut stalls).unwrap(), 0);
        assert_eq!(track_progress(0, 262_144, &mut stalls).unwrap(), 262_144);
        assert_eq!(stalls, 0);

        // A server that keeps nothing is retried, then abandoned.
        assert_eq!(track_progress(0, 0, &mut stalls).unwrap(), 0);
        assert_eq!(track_progress(0, 0, &mut stalls).unwrap(), 0);
        let err = track_progress(0, 0, &mut stalls).unwrap_err();
        assert!(matches!(err, Error::Api { status: 308, ref message } if message.contains("no progress")));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type(Path::new("clip.MP4")), "video/mp4");
        assert_eq!(content_type(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(content_type(Path::new("clip")), "video/*");
    }

    #[tokio::test]
    async fn read_chunk_fills_then_drains() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[7u8; 10]).unwrap();
        f.flush().unwrap();

        let mut file = tokio::fs::File::open(f.path()).await.unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(read_chunk(&mut file, &mut buf).await.unwrap(), 4);
        assert_eq!(read_chunk(&mut file, &mut buf).await.unwrap(), 4);
        assert_eq!(read_chunk(&mut file, &mut buf).await.unwrap(), 2);
        assert_eq!(read_chunk(&mut file, &mut buf).await.unwrap(), 0);
    }
}
