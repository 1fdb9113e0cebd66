//! Metadata enrichment for chunks: structural markers, content
//! classification, math detection, and subject inference.

use std::sync::LazyLock;

use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};

/// Keyword-derived classification of what a chunk teaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Explanation,
    Problem,
    Example,
    Introduction,
}

#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub chapter: Option<u32>,
    pub section: Option<String>,
    pub section_title: Option<String>,
    pub content_type: Option<ContentKind>,
    pub has_math: bool,
    pub subject: Option<String>,
}

static CHAPTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bchapter\s+(\d{1,3})\b").expect("chapter regex"));

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(\d{1,2})\.(\d{1,2})\s+([A-Z][^\n]{2,80})").expect("section regex")
});

static PROBLEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(exercise|problem|question)s?\b").expect("problem regex"));

static EXAMPLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bexample\b|\bEx\.\s").expect("example regex"));

static INTRODUCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bintroduction\b|\bchapter\b").expect("introduction regex"));

static MATH_RE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\d+\s*/\s*\d+", // fractions
        r"[a-zA-Z0-9]\^", // exponents
        r"[²³√∞π]",       // unicode math
        r"[=≤≥≠±×÷]",     // operators
        r"\\[a-zA-Z]+\{", // LaTeX commands
    ])
    .expect("math regex set")
});

/// Derive structural and classification metadata for one chunk of text.
pub fn enrich(text: &str, source: &str) -> Enrichment {
    let chapter = CHAPTER_RE
        .captures(text)
        .and_then(|caps| caps[1].parse::<u32>().ok());

    let (section, section_title) = match SECTION_RE.captures(text) {
        Some(caps) => (
            Some(format!("{}.{}", &caps[1], &caps[2])),
            Some(caps[3].trim().to_string()),
        ),
        None => (None, None),
    };

    let content_type = if PROBLEM_RE.is_match(text) {
        Some(ContentKind::Problem)
    } else if EXAMPLE_RE.is_match(text) {
        Some(ContentKind::Example)
    } else if INTRODUCTION_RE.is_match(text) {
        Some(ContentKind::Introduction)
    } else {
        Some(ContentKind::Explanation)
    };

    Enrichment {
        chapter,
        section,
        section_title,
        content_type,
        has_math: MATH_RE.is_match(text),
        subject: infer_subject(source),
    }
}

/// Infer a coarse subject from the source path, when the filename gives one
/// away.
pub fn infer_subject(source: &str) -> Option<String> {
    let lowered = source.to_ascii_lowercase();
    if lowered.contains("math") || lowered.contains("algebra") || lowered.contains("geometry") {
        Some("mathematics".to_string())
    } else if lowered.contains("english") || lowered.contains("beehive") {
        Some("english".to_string())
    } else if lowered.contains("science")
        || lowered.contains("physics")
        || lowered.contains("chemistry")
        || lowered.contains("biology")
    {
        Some("science".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_and_section_are_detected() {
        let text = "CHAPTER 3\n3.2 Operations On Real Numbers\nWe now look at sums.";
        let meta = enrich(text, "class9_maths.pdf");
        assert_eq!(meta.chapter, Some(3));
        assert_eq!(meta.section.as_deref(), Some("3.2"));
        assert_eq!(
            meta.section_title.as_deref(),
            Some("Operations On Real Numbers")
        );
        assert_eq!(meta.subject.as_deref(), Some("mathematics"));
    }

    #[test]
    fn problem_outranks_example() {
        let text = "Exercise 1.1: Solve the following. Example 2 shows the method.";
        let meta = enrich(text, "book.pdf");
        assert_eq!(meta.content_type, Some(ContentKind::Problem));
    }

    #[test]
    fn prose_defaults_to_explanation() {
        let meta = enrich("Rivers carve valleys over geological time.", "beehive.pdf");
        assert_eq!(meta.content_type, Some(ContentKind::Explanation));
        assert_eq!(meta.subject.as_deref(), Some("english"));
        assert!(!meta.has_math);
    }

    #[test]
    fn math_markers_are_detected() {
        assert!(enrich("compute 3/4 of the total", "x.pdf").has_math);
        assert!(enrich("so x^2 = 9", "x.pdf").has_math);
        assert!(enrich("the constant π appears", "x.pdf").has_math);
        assert!(enrich(r"write \frac{a}{b} as a ratio", "x.pdf").has_math);
        assert!(!enrich("no mathematics here at all", "x.pdf").has_math);
    }
}
