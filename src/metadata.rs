use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// YouTube's hard title limit in characters.
const MAX_TITLE_CHARS: usize = 100;
/// How much of a description the change list shows.
const DESCRIPTION_PREVIEW_CHARS: usize = 30;
const SHORTS_TAG: &str = "#shorts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Public,
    #[default]
    Private,
    Unlisted,
}

impl PrivacyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Unlisted => "unlisted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            "unlisted" => Some(Self::Unlisted),
            _ => None,
        }
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata of a video as it currently exists on the platform.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoMetadata {
    pub title: String,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category_id: Option<String>,
    pub privacy: Option<PrivacyStatus>,
}

/// Caller-supplied overrides. `None` means "not specified", which is not the
/// same as an empty value: `Some(vec![])` clears the tags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub privacy: Option<PrivacyStatus>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.tags.is_none()
            && self.privacy.is_none()
    }
}

/// Fully specified metadata for a video about to be uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub privacy: PrivacyStatus,
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    pub metadata: VideoMetadata,
    /// One line per overridden field: title, description, tags, privacy.
    pub changes: Vec<String>,
}

/// Apply `patch` to `current` for an update.
///
/// Every specified field counts as a change, even when it equals the current
/// value. An empty patch is rejected.
pub fn apply_patch(current: &VideoMetadata, patch: &MetadataPatch) -> Result<PatchOutcome> {
    if patch.is_empty() {
        return Err(Error::NoChangesSpecified);
    }

    let mut metadata = current.clone();
    let mut changes = Vec::new();

    if let Some(title) = &patch.title {
        changes.push(format!("Title: \"{}\" → \"{title}\"", current.title));
        metadata.title = title.clone();
    }

    if let Some(description) = &patch.description {
        let old = current
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(|d| preview(d, DESCRIPTION_PREVIEW_CHARS))
            .unwrap_or_else(|| "(empty)".into());
        let new = preview(description, DESCRIPTION_PREVIEW_CHARS);
        changes.push(format!("Description: \"{old}...\" → \"{new}...\""));
        metadata.description = Some(description.clone());
    }

    if let Some(tags) = &patch.tags {
        let old = current
            .tags
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| t.join(", "))
            .unwrap_or_else(|| "(none)".into());
        changes.push(format!("Tags: [{old}] → [{}]", tags.join(", ")));
        metadata.tags = Some(tags.clone());
    }

    if let Some(privacy) = patch.privacy {
        let old = current
            .privacy
            .map(|p| p.as_str())
            .unwrap_or("(unknown)");
        changes.push(format!("Privacy: {old} → {privacy}"));
        metadata.privacy = Some(privacy);
    }

    Ok(PatchOutcome { metadata, changes })
}

/// Build the metadata for a clone of `source`.
///
/// The title always comes from `overrides` and is required; other fields fall
/// back to the source, then to empty / private.
pub fn merge_for_clone(source: &VideoMetadata, overrides: &MetadataPatch) -> Result<NewVideo> {
    let title = overrides
        .title
        .clone()
        .ok_or_else(|| Error::Configuration("a title is required to clone a video".into()))?;

    Ok(NewVideo {
        title,
        description: overrides
            .description
            .clone()
            .or_else(|| source.description.clone())
            .unwrap_or_default(),
        tags: overrides
            .tags
            .clone()
            .or_else(|| source.tags.clone())
            .unwrap_or_default(),
        privacy: overrides.privacy.or(source.privacy).unwrap_or_default(),
        category_id: source.category_id.clone(),
    })
}

/// Tag a fresh upload as a Short and keep the title within limits.
pub fn prepare_for_upload(mut video: NewVideo, add_shorts_hashtag: bool) -> NewVideo {
    if add_shorts_hashtag {
        if !video.title.to_lowercase().contains(SHORTS_TAG) {
            video.title = format!("{} {SHORTS_TAG}", video.title);
        }
        if !video.description.to_lowercase().contains(SHORTS_TAG) {
            video.description = if video.description.is_empty() {
                SHORTS_TAG.to_string()
            } else {
                format!("{}\n\n{SHORTS_TAG}", video.description)
            };
        }
    }

    if video.title.chars().count() > MAX_TITLE_CHARS {
        let head: String = video.title.chars().take(MAX_TITLE_CHARS - 3).collect();
        video.title = format!("{head}...");
    }

    video
}

/// Split a comma-separated tag list, dropping blanks.
pub fn parse_tags(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
