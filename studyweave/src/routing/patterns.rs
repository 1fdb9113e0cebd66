//! Static pattern rules for query routing.
//!
//! Keyword and regex heuristics that decide routes without an LLM round
//! trip. Each predicate is deterministic, so routes chosen here never
//! depend on the classifier.

use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::{Regex, RegexSet};

/// Greeting vocabulary. A query counts as a greeting only when it is also
/// short and carries no question marker.
const GREETINGS: [&str; 8] = [
    "hello", "hi", "hey", "thanks", "thank you", "bye", "good morning", "good evening",
];

/// Bare acknowledgements that continue the previous topic.
const SHORT_FOLLOWUPS: [&str; 12] = [
    "yes", "no", "sure", "ok", "okay", "please", "yep", "nope", "yeah", "nah", "more",
    "tell me more",
];

static RECENCY_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\blatest\b",
        r"(?i)\brecent\b",
        r"(?i)\bcurrent\b",
        r"(?i)\bnews\b",
        r"(?i)\btoday\b",
        r"(?i)\bthis year\b",
        r"(?i)\bbreaking\b",
        r"(?i)\bnew developments?\b",
    ])
    .expect("recency patterns")
});

static TEXTBOOK_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\bchapter\b",
        r"(?i)\bsection\b",
        r"(?i)\bexercise\b",
        r"(?i)\btextbook\b",
        r"(?i)\bsyllabus\b",
        r"(?i)\bncert\b",
        r"\b\d+\.\d+\b",
    ])
    .expect("textbook patterns")
});

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("year pattern"));

static SUBJECT_MATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(math|mathematics|algebra|geometry|trigonometry)\b").expect("math subject")
});

static SUBJECT_ENGLISH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(english|beehive|grammar|poem|prose)\b").expect("english subject")
});

static SUBJECT_SCIENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(science|physics|chemistry|biology)\b").expect("science subject")
});

/// Short, question-free query built around a greeting keyword.
pub fn greeting_like(query: &str) -> bool {
    let lowered = query.trim().to_ascii_lowercase();
    if lowered.contains('?') || lowered.split_whitespace().count() >= 5 {
        return false;
    }
    GREETINGS.iter().any(|greet| lowered.contains(greet))
}

/// Bare acknowledgement or a query of at most two words.
pub fn short_followup(query: &str) -> bool {
    let lowered = query.trim().to_ascii_lowercase();
    SHORT_FOLLOWUPS.contains(&lowered.as_str()) || lowered.split_whitespace().count() <= 2
}

/// The query asks about current events: recency vocabulary, or a year
/// token no older than last year.
pub fn recency_signal(query: &str) -> bool {
    if RECENCY_SET.is_match(query) {
        return true;
    }
    let cutoff = Utc::now().year() - 1;
    YEAR_RE
        .find_iter(query)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .any(|year| year >= cutoff)
}

/// The query points at curriculum structure.
pub fn textbook_signal(query: &str) -> bool {
    TEXTBOOK_SET.is_match(query)
}

/// Best-effort subject inference from the query wording, used to filter
/// the vector search.
pub fn infer_subject(query: &str) -> Option<String> {
    if SUBJECT_MATH_RE.is_match(query) {
        Some("mathematics".to_string())
    } else if SUBJECT_ENGLISH_RE.is_match(query) {
        Some("english".to_string())
    } else if SUBJECT_SCIENCE_RE.is_match(query) {
        Some("science".to_string())
    } else {
        None
    }
}
