//! Video links and image sources attached to posts.

use serde_json::Value;
use url::Url;

pub const FALLBACK_THUMBNAIL: &str = "/images/bg3_wide.png";
const IMAGE_CDN: &str = "https://cdn.sanity.io/images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoKind {
    YouTube,
    UnWebTv,
    Kaltura,
}

impl VideoKind {
    pub fn label(&self) -> &'static str {
        match self {
            VideoKind::YouTube => "YouTube",
            VideoKind::UnWebTv => "UN Web TV",
            VideoKind::Kaltura => "Kaltura",
        }
    }
}

/// Classify a video URL by host. Unparseable or unknown hosts yield `None`.
pub fn classify_video(input: &str) -> Option<VideoKind> {
    let url = Url::parse(input.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    if host.contains("youtube.com") || host.contains("youtu.be") {
        Some(VideoKind::YouTube)
    } else if host.contains("kaltura.com") {
        Some(VideoKind::Kaltura)
    } else if host.contains("un.org") {
        Some(VideoKind::UnWebTv)
    } else {
        None
    }
}

fn is_bare_youtube_id(s: &str) -> bool {
    s.len() == 11 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Extract the video id from a YouTube URL (or accept a bare 11-char id).
pub fn youtube_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_bare_youtube_id(input) {
        return Some(input.to_string());
    }
    let url = Url::parse(input).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    if host.contains("youtu.be") {
        let id = url.path().trim_start_matches('/');
        return Some(id.to_string()).filter(|s| !s.is_empty());
    }
    if !host.contains("youtube.com") {
        return None;
    }
    if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
        return Some(v.into_owned());
    }
    url.path_segments()
        .and_then(|mut segs| segs.next_back())
        .filter(|last| is_bare_youtube_id(last))
        .map(str::to_string)
}

pub fn youtube_thumbnail(id: &str) -> String {
    format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg")
}

/// Card image choice: uploaded image first, then the video still, then a static fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    Uploaded,
    YouTube(String),
    Fallback,
}

pub fn choose_thumbnail(main_image: Option<&Value>, youtube: Option<&str>) -> Thumbnail {
    if main_image.is_some_and(|v| !v.is_null()) {
        return Thumbnail::Uploaded;
    }
    match youtube.and_then(youtube_id) {
        Some(id) => Thumbnail::YouTube(youtube_thumbnail(&id)),
        None => Thumbnail::Fallback,
    }
}

/// CDN URL for an image field (`{asset: {_ref: "image-<id>-<w>x<h>-<ext>"}}`),
/// cropped to `width` x `height`.
pub fn image_asset_url(project_id: &str, dataset: &str, image: &Value, width: u32, height: u32) -> Option<String> {
    let asset_ref = image.get("asset")?.get("_ref")?.as_str()?;
    let rest = asset_ref.strip_prefix("image-")?;
    let (stem, ext) = rest.rsplit_once('-')?;
    Some(format!(
        "{IMAGE_CDN}/{project_id}/{dataset}/{stem}.{ext}?w={width}&h={height}&fit=crop&auto=format"
    ))
}
