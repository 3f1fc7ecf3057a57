use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\w+)").expect("valid regex"));
static MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@(\w+)").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Image,
    Video,
    Carousel,
}

impl std::fmt::Display for PostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostKind::Image => write!(f, "image"),
            PostKind::Video => write!(f, "video"),
            PostKind::Carousel => write!(f, "carousel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub likes: u64,
    pub comments: u64,
}

/// A single ingested post. Never mutated after ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub kind: PostKind,
    pub media: Vec<MediaRef>,
    pub caption: String,
    pub comments: Vec<String>,
    pub engagement: Engagement,
    pub posted_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Caption and comments, whitespace-normalized and joined with a single space.
    #[must_use]
    pub fn analysis_text(&self) -> String {
        std::iter::once(self.caption.as_str())
            .chain(self.comments.iter().map(String::as_str))
            .map(clean_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Lowercased hashtags of the caption, deduplicated and sorted.
    #[must_use]
    pub fn topics(&self) -> BTreeSet<String> {
        extract_hashtags(&self.caption)
            .into_iter()
            .map(|t| t.to_lowercase())
            .collect()
    }

    #[must_use]
    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }

    /// Number of media refs of the given kind.
    #[must_use]
    pub fn media_count(&self, kind: MediaKind) -> usize {
        self.media.iter().filter(|m| m.kind == kind).count()
    }
}

/// Collapse runs of whitespace and trim.
#[must_use]
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

#[must_use]
pub fn extract_hashtags(text: &str) -> Vec<String> {
    HASHTAG
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

#[must_use]
pub fn extract_mentions(text: &str) -> Vec<String> {
    MENTION
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Generate a filesystem- and URL-safe slug from a display name.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else if c.is_whitespace() || c == '.' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|&c| c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(caption: &str, comments: &[&str]) -> Post {
        Post {
            id: "abc".to_string(),
            kind: PostKind::Image,
            media: vec![],
            caption: caption.to_string(),
            comments: comments.iter().map(|c| (*c).to_string()).collect(),
            engagement: Engagement::default(),
            posted_at: None,
        }
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  hello \n\t world  "), "hello world");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn analysis_text_joins_caption_and_comments() {
        let p = post("Sunny  day", &["love it", "   ", "so\ncool"]);
        assert_eq!(p.analysis_text(), "Sunny day love it so cool");
    }

    #[test]
    fn analysis_text_empty_when_nothing_to_say() {
        assert_eq!(post("", &[]).analysis_text(), "");
    }

    #[test]
    fn topics_are_lowercased_and_deduplicated() {
        let p = post("#Travel and #travel with #Food_Lover @friend", &[]);
        let topics: Vec<_> = p.topics().into_iter().collect();
        assert_eq!(topics, vec!["food_lover".to_string(), "travel".to_string()]);
    }

    #[test]
    fn mentions_are_extracted() {
        assert_eq!(extract_mentions("hi @alice and @bob_2"), vec!["alice", "bob_2"]);
    }

    #[test]
    fn slugify_handles_punctuation() {
        assert_eq!(slugify("Uncle Arnie's"), "uncle-arnies");
        assert_eq!(slugify("  jane.doe  "), "jane-doe");
        assert_eq!(slugify("the_rock"), "the_rock");
    }

    #[test]
    fn media_count_by_kind() {
        let mut p = post("", &[]);
        p.media = vec![
            MediaRef {
                url: "https://cdn/a.jpg".to_string(),
                kind: MediaKind::Image,
            },
            MediaRef {
                url: "https://cdn/b.mp4".to_string(),
                kind: MediaKind::Video,
            },
        ];
        assert!(p.has_media());
        assert_eq!(p.media_count(MediaKind::Image), 1);
        assert_eq!(p.media_count(MediaKind::Video), 1);
    }
}
