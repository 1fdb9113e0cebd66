//! Context fusion: one grounded string from heterogeneous retrieval
//! results.
//!
//! Textbook sources come first to bias the generator toward the curated
//! corpus; entries inside each block are ordered by descending score and
//! labeled `(1)…(n)` / `(W1)…(Wn)` so the generator can cite them. The
//! fused string is capped at a character budget, dropping the
//! lowest-ranked entries first.

use sw_corpus::ScoredChunk;

use crate::sources::WebResult;

/// Fuse retrieval results into the generator's context block.
///
/// Returns `None` when there is nothing to ground on.
pub fn fuse(pdf: &[ScoredChunk], web: &[WebResult], char_budget: usize) -> Option<String> {
    if pdf.is_empty() && web.is_empty() {
        return None;
    }

    let mut pdf_entries: Vec<String> = pdf
        .iter()
        .enumerate()
        .map(|(i, scored)| {
            let meta = &scored.chunk.metadata;
            let mut entry = format!(
                "({}) {}  — source={}, page={}",
                i + 1,
                scored.chunk.text.trim(),
                meta.source,
                meta.page
            );
            if let Some(chapter) = meta.chapter {
                entry.push_str(&format!(", chapter={chapter}"));
            }
            entry
        })
        .collect();

    let mut web_entries: Vec<String> = web
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let mut entry = format!("(W{}) {} — {}", i + 1, result.title, result.url);
            if let Some(date) = &result.published_date {
                entry.push_str(&format!(" — {date}"));
            }
            if !result.snippet.is_empty() {
                entry.push_str("\n     ");
                entry.push_str(result.snippet.trim());
            }
            entry
        })
        .collect();

    // Enforce the budget by dropping whole entries, lowest-ranked first:
    // the tail of the web block, then the tail of the textbook block.
    while rendered_len(&pdf_entries, &web_entries) > char_budget {
        if web_entries.pop().is_none() && pdf_entries.pop().is_none() {
            break;
        }
    }
    if pdf_entries.is_empty() && web_entries.is_empty() {
        // Every entry alone exceeded the budget: keep the best-ranked
        // text, hard-truncated.
        let best = pdf
            .first()
            .map(|s| s.chunk.text.as_str())
            .or_else(|| web.first().map(|r| r.snippet.as_str()))?;
        return Some(best.chars().take(char_budget).collect());
    }

    Some(render(&pdf_entries, &web_entries))
}

fn render(pdf_entries: &[String], web_entries: &[String]) -> String {
    let mut out = String::new();
    if !pdf_entries.is_empty() {
        out.push_str("[TEXTBOOK SOURCES]\n");
        out.push_str(&pdf_entries.join("\n"));
    }
    if !web_entries.is_empty() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str("[WEB SOURCES]\n");
        out.push_str(&web_entries.join("\n"));
    }
    out
}

fn rendered_len(pdf_entries: &[String], web_entries: &[String]) -> usize {
    render(pdf_entries, web_entries).chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sw_corpus::{Chunk, ChunkMetadata};

    fn scored(text: &str, page: usize, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: format!("doc#{page}"),
                text: text.to_string(),
                metadata: ChunkMetadata {
                    source: "class9_maths.pdf".to_string(),
                    page,
                    chunk_index: page,
                    total_chunks: 10,
                    subject: Some("mathematics".to_string()),
                    chapter: Some(1),
                    section: None,
                    section_title: None,
                    content_type: None,
                    has_math: true,
                },
                embedding: None,
            },
            score,
        }
    }

    fn web(title: &str, score: f32) -> WebResult {
        WebResult {
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            published_date: Some("2025-06-01".to_string()),
            snippet: "A web snippet about the topic.".to_string(),
            score,
        }
    }

    #[test]
    fn empty_inputs_fuse_to_none() {
        assert_eq!(fuse(&[], &[], 16_000), None);
    }

    #[test]
    fn textbook_block_precedes_web_block() {
        let fused = fuse(
            &[scored("Rational numbers are ratios.", 3, 0.9)],
            &[web("Numbers today", 0.5)],
            16_000,
        )
        .unwrap();
        let pdf_at = fused.find("[TEXTBOOK SOURCES]").unwrap();
        let web_at = fused.find("[WEB SOURCES]").unwrap();
        assert!(pdf_at < web_at);
        assert!(fused.contains("(1) Rational numbers are ratios."));
        assert!(fused.contains("source=class9_maths.pdf, page=3, chapter=1"));
        assert!(fused.contains("(W1) Numbers today"));
        assert!(fused.contains("2025-06-01"));
    }

    #[test]
    fn labels_count_within_each_block() {
        let fused = fuse(
            &[scored("first", 0, 0.9), scored("second", 1, 0.8)],
            &[web("alpha", 0.7), web("beta", 0.6)],
            16_000,
        )
        .unwrap();
        assert!(fused.contains("(1) first"));
        assert!(fused.contains("(2) second"));
        assert!(fused.contains("(W1) alpha"));
        assert!(fused.contains("(W2) beta"));
    }

    #[test]
    fn budget_drops_lowest_ranked_entries_first() {
        let long_text = "x".repeat(300);
        let pdf: Vec<_> = (0..4).map(|i| scored(&long_text, i, 0.9)).collect();
        let webs: Vec<_> = (0..4).map(|i| web(&format!("w{i}"), 0.5)).collect();

        let fused = fuse(&pdf, &webs, 900).unwrap();
        assert!(fused.chars().count() <= 900);
        // The best textbook chunk survives; the web tail goes first.
        assert!(fused.contains("(1)"));
        assert!(!fused.contains("(W4)"));
    }

    #[test]
    fn oversized_single_entry_is_hard_truncated() {
        let huge = "y".repeat(5_000);
        let fused = fuse(&[scored(&huge, 0, 0.9)], &[], 1_000).unwrap();
        assert!(fused.chars().count() <= 1_000);
    }
}
