//! Normalization of the scraper's JSON export into [`Post`]s.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::posts::{clean_text, Engagement, MediaKind, MediaRef, Post, PostKind};
use crate::IngestError;

/// An export entry that could not be turned into a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub posts: Vec<Post>,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPost {
    short_code: Option<String>,
    id: Option<Value>,
    #[serde(rename = "type")]
    post_type: Option<String>,
    caption: Option<String>,
    first_comment: Option<String>,
    latest_comments: Vec<Value>,
    likes_count: Option<i64>,
    comments_count: Option<i64>,
    is_video: Option<bool>,
    video_url: Option<String>,
    display_url: Option<String>,
    images: Vec<String>,
    child_posts: Vec<RawChild>,
    timestamp: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawChild {
    #[serde(rename = "type")]
    post_type: Option<String>,
    display_url: Option<String>,
    video_url: Option<String>,
}

/// Read and normalize a scraper export file.
///
/// # Errors
///
/// Returns `IngestError` if the file cannot be read, is not JSON, or the top
/// level is not an array. Individual malformed entries are skipped, not fatal.
pub fn load_posts(path: &Path) -> Result<Ingested, IngestError> {
    let content = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| IngestError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    let Value::Array(entries) = value else {
        return Err(IngestError::NotAnArray {
            path: path.display().to_string(),
        });
    };
    Ok(normalize_posts(entries))
}

/// Normalize raw export entries. Non-object or undecodable entries are
/// reported in [`Ingested::skipped`].
#[must_use]
pub fn normalize_posts(entries: Vec<Value>) -> Ingested {
    let mut out = Ingested::default();

    for (index, entry) in entries.into_iter().enumerate() {
        if !entry.is_object() {
            out.skipped.push(SkippedEntry {
                index,
                reason: "entry is not a JSON object".to_string(),
            });
            continue;
        }
        match serde_json::from_value::<RawPost>(entry) {
            Ok(raw) => out.posts.push(normalize_post(raw, index)),
            Err(e) => out.skipped.push(SkippedEntry {
                index,
                reason: e.to_string(),
            }),
        }
    }

    out
}

fn normalize_post(raw: RawPost, index: usize) -> Post {
    let id = raw
        .short_code
        .filter(|s| !s.trim().is_empty())
        .or_else(|| raw.id.as_ref().and_then(value_to_id))
        .unwrap_or_else(|| format!("unknown-{index}"));

    let comments = collect_comments(raw.first_comment.as_deref(), &raw.latest_comments);
    let is_video = raw.is_video.unwrap_or(false) || raw.video_url.is_some();

    let mut media = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |url: Option<&str>, kind: MediaKind| {
        if let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) {
            if seen.insert(url.to_string()) {
                media.push(MediaRef {
                    url: url.to_string(),
                    kind,
                });
            }
        }
    };

    if raw.child_posts.is_empty() {
        if is_video {
            push(raw.video_url.as_deref(), MediaKind::Video);
        } else {
            push(raw.display_url.as_deref(), MediaKind::Image);
            for url in &raw.images {
                push(Some(url), MediaKind::Image);
            }
        }
    } else {
        for child in &raw.child_posts {
            let child_is_video = child.video_url.is_some()
                || child
                    .post_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case("video"));
            if child_is_video {
                push(child.video_url.as_deref(), MediaKind::Video);
            } else {
                push(child.display_url.as_deref(), MediaKind::Image);
            }
        }
    }

    let kind = match raw.post_type.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("sidecar" | "carousel") => PostKind::Carousel,
        Some("video" | "reel") => PostKind::Video,
        Some("image") => PostKind::Image,
        _ if !raw.child_posts.is_empty() || media.len() > 1 => PostKind::Carousel,
        _ if is_video => PostKind::Video,
        _ => PostKind::Image,
    };

    Post {
        id,
        kind,
        media,
        caption: clean_text(raw.caption.as_deref().unwrap_or_default()),
        comments,
        engagement: Engagement {
            likes: clamp_count(raw.likes_count),
            comments: clamp_count(raw.comments_count),
        },
        posted_at: raw.timestamp.as_ref().and_then(parse_timestamp),
    }
}

fn value_to_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn collect_comments(first: Option<&str>, latest: &[Value]) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(text) = first.map(clean_text).filter(|t| !t.is_empty()) {
        out.push(text);
    }
    for c in latest {
        let text = match c {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map.get("text").and_then(Value::as_str),
            _ => None,
        };
        if let Some(text) = text.map(clean_text).filter(|t| !t.is_empty()) {
            out.push(text);
        }
    }
    out
}

/// Hidden like counts are exported as negative numbers.
fn clamp_count(raw: Option<i64>) -> u64 {
    raw.and_then(|n| u64::try_from(n).ok()).unwrap_or(0)
}

fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn normalizes_single_image_post() {
        let out = normalize_posts(vec![json!({
            "shortCode": "CxYz",
            "type": "Image",
            "caption": "Beach  day #Summer",
            "firstComment": "wow",
            "latestComments": [{"text": "nice"}, "cool", 42],
            "likesCount": 120,
            "commentsCount": 3,
            "displayUrl": "https://cdn.example/1.jpg",
            "timestamp": "2024-05-01T12:00:00.000Z"
        })]);

        assert!(out.skipped.is_empty());
        let post = &out.posts[0];
        assert_eq!(post.id, "CxYz");
        assert_eq!(post.kind, PostKind::Image);
        assert_eq!(post.caption, "Beach day #Summer");
        assert_eq!(post.comments, vec!["wow", "nice", "cool"]);
        assert_eq!(post.engagement.likes, 120);
        assert_eq!(post.media.len(), 1);
        assert_eq!(post.media[0].kind, MediaKind::Image);
        assert!(post.posted_at.is_some());
    }

    #[test]
    fn hidden_likes_normalize_to_zero() {
        let out = normalize_posts(vec![json!({"shortCode": "a", "likesCount": -1})]);
        assert_eq!(out.posts[0].engagement.likes, 0);
    }

    #[test]
    fn video_post_uses_video_url_only() {
        let out = normalize_posts(vec![json!({
            "id": 987654,
            "isVideo": true,
            "videoUrl": "https://cdn.example/v.mp4",
            "displayUrl": "https://cdn.example/thumb.jpg"
        })]);
        let post = &out.posts[0];
        assert_eq!(post.id, "987654");
        assert_eq!(post.kind, PostKind::Video);
        assert_eq!(
            post.media,
            vec![MediaRef {
                url: "https://cdn.example/v.mp4".to_string(),
                kind: MediaKind::Video,
            }]
        );
    }

    #[test]
    fn carousel_children_become_media_refs() {
        let out = normalize_posts(vec![json!({
            "shortCode": "car",
            "type": "Sidecar",
            "childPosts": [
                {"type": "Image", "displayUrl": "https://cdn.example/a.jpg"},
                {"type": "Video", "videoUrl": "https://cdn.example/b.mp4", "displayUrl": "https://cdn.example/b.jpg"},
                {"type": "Image", "displayUrl": "https://cdn.example/a.jpg"}
            ]
        })]);
        let post = &out.posts[0];
        assert_eq!(post.kind, PostKind::Carousel);
        assert_eq!(post.media.len(), 2);
        assert_eq!(post.media_count(MediaKind::Video), 1);
    }

    #[test]
    fn non_object_entries_are_skipped_and_reported() {
        let out = normalize_posts(vec![json!("oops"), json!({"shortCode": "ok"}), json!(null)]);
        assert_eq!(out.posts.len(), 1);
        let indexes: Vec<_> = out.skipped.iter().map(|s| s.index).collect();
        assert_eq!(indexes, vec![0, 2]);
    }

    #[test]
    fn missing_identifier_gets_positional_id() {
        let out = normalize_posts(vec![json!({"caption": "hi"})]);
        assert_eq!(out.posts[0].id, "unknown-0");
        assert!(!out.posts[0].has_media());
    }

    #[test]
    fn load_posts_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.json");
        std::fs::write(&path, r#"{"posts": []}"#).unwrap();
        let err = load_posts(&path).unwrap_err();
        assert!(matches!(err, IngestError::NotAnArray { .. }));
    }

    #[test]
    fn load_posts_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.json");
        std::fs::write(&path, r#"[{"shortCode": "a"}, {"shortCode": "b"}]"#).unwrap();
        let out = load_posts(&path).unwrap();
        assert_eq!(out.posts.len(), 2);
    }
}
