//! Engagement-bait and spam pattern detection.

/// Phrases that mark engagement bait.
pub(crate) const SPAM_PHRASES: &[&str] = &[
    "click link",
    "link in bio",
    "dm for",
    "check profile",
    "follow me",
    "follow back",
    "like and comment",
    "tag a friend",
    "giveaway",
    "contest",
    "win free",
    "limited time",
    "act now",
    "don't miss",
];

const NON_ASCII_RATIO: f64 = 0.2;
const CAPS_RATIO: f64 = 0.3;
const SCORE_PER_PATTERN: f64 = 0.25;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpamReport {
    pub score: f64,
    pub patterns: Vec<String>,
}

impl SpamReport {
    #[must_use]
    pub fn is_spam(&self) -> bool {
        self.score > 0.5
    }
}

/// Scan `text` for spam patterns. Each pattern adds 0.25, capped at 1.0.
///
/// Besides the phrase list, a text whose characters are more than 20 %
/// non-ASCII (mostly emoji) or more than 30 % uppercase counts as one pattern each.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn detect_spam_patterns(text: &str) -> SpamReport {
    let total = text.chars().count();
    if total == 0 {
        return SpamReport::default();
    }

    let lower = text.to_lowercase();
    let mut patterns: Vec<String> = SPAM_PHRASES
        .iter()
        .filter(|p| lower.contains(*p))
        .map(|p| (*p).to_string())
        .collect();

    let non_ascii = text.chars().filter(|c| !c.is_ascii()).count();
    if non_ascii as f64 / total as f64 > NON_ASCII_RATIO {
        patterns.push("excessive_emojis".to_string());
    }

    let caps = text.chars().filter(|c| c.is_uppercase()).count();
    if caps as f64 / total as f64 > CAPS_RATIO {
        patterns.push("excessive_caps".to_string());
    }

    SpamReport {
        score: (patterns.len() as f64 * SCORE_PER_PATTERN).min(1.0),
        patterns,
    }
}
