//! Sentence-aware truncation and evidence block formatting.

use super::Candidate;

const TRUNCATION_MARKER: &str = "\n\n...(truncated)";

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Truncate `text` to at most `max_chars` characters, cutting after the last
/// complete sentence that fits.
///
/// When no sentence boundary fits, cuts at the last word boundary and
/// appends `...`.
pub fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let prefix = &text[..cut];

    let mut boundary = None;
    let mut chars = prefix.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !is_sentence_end(c) {
            continue;
        }
        let end = i + c.len_utf8();
        let next = match chars.peek() {
            Some(&(_, n)) => Some(n),
            None => text[end..].chars().next(),
        };
        if next.map_or(true, char::is_whitespace) {
            boundary = Some(end);
        }
    }
    if let Some(end) = boundary {
        return prefix[..end].trim_end().to_string();
    }

    // Leave room for the ellipsis.
    let room = prefix
        .char_indices()
        .nth(max_chars.saturating_sub(3))
        .map(|(i, _)| i)
        .unwrap_or(prefix.len());
    let head = &prefix[..room];
    let head = match head.rfind(char::is_whitespace) {
        Some(ws) if ws > 0 => &head[..ws],
        _ => head,
    };
    format!("{}...", head.trim_end())
}

/// Render surviving candidates as `Title:`/`Summary:` blocks separated by a
/// blank line, truncating each summary to `summary_chars_max`.
pub fn format_blocks(candidates: &[Candidate], summary_chars_max: usize) -> String {
    candidates
        .iter()
        .map(|c| {
            format!(
                "Title: {}\nSummary: {}",
                c.title.trim(),
                truncate_at_sentence(&c.summary, summary_chars_max)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Number and bound an evidence list for the arbiter prompt.
///
/// Each item is truncated to `item_chars`, the joined block to `total_chars`.
/// Blank items are skipped but keep their position number.
pub fn format_evidence_list(items: &[String], item_chars: usize, total_chars: usize) -> String {
    let numbered: Vec<String> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.trim().is_empty())
        .map(|(i, item)| format!("[{}] {}", i + 1, truncate_at_sentence(item, item_chars)))
        .collect();

    if numbered.is_empty() {
        return "(none)".to_string();
    }
    let joined = numbered.join("\n\n");
    if joined.chars().count() <= total_chars {
        return joined;
    }
    let budget = total_chars.saturating_sub(TRUNCATION_MARKER.chars().count());
    format!(
        "{}{TRUNCATION_MARKER}",
        truncate_at_sentence(&joined, budget)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_at_sentence("  One. Two.  ", 50), "One. Two.");
    }

    #[test]
    fn test_cuts_at_last_sentence() {
        let text = "First sentence here. Second one is longer. Third never fits.";
        assert_eq!(
            truncate_at_sentence(text, 45),
            "First sentence here. Second one is longer."
        );
    }

    #[test]
    fn test_ignores_inner_periods() {
        // "3.5" is not a sentence boundary.
        let text = "Version 3.5 shipped widely and was praised by everyone";
        assert_eq!(truncate_at_sentence(text, 20), "Version 3.5...");
    }

    #[test]
    fn test_boundary_at_cut_edge() {
        let text = "Exactly here. More text follows.";
        assert_eq!(truncate_at_sentence(text, 13), "Exactly here.");
    }

    #[test]
    fn test_multibyte_safe() {
        let text = "Émile Zola écrivit « J'accuse…! » en 1898 et fut condamné pour diffamation.";
        let out = truncate_at_sentence(text, 30);
        assert!(out.chars().count() <= 30);
    }

    #[test]
    fn test_format_blocks() {
        let out = format_blocks(
            &[
                Candidate::new("A", "Alpha summary."),
                Candidate::new("B", "Beta summary."),
            ],
            100,
        );
        assert_eq!(
            out,
            "Title: A\nSummary: Alpha summary.\n\nTitle: B\nSummary: Beta summary."
        );
    }

    #[test]
    fn test_evidence_list_numbering_and_empty() {
        assert_eq!(format_evidence_list(&[], 100, 100), "(none)");
        let items = vec!["one".to_string(), "  ".to_string(), "three".to_string()];
        assert_eq!(format_evidence_list(&items, 100, 1000), "[1] one\n\n[3] three");
    }

    #[test]
    fn test_evidence_list_total_bound() {
        let items: Vec<String> = (0..20)
            .map(|i| format!("Fact number {i} is stated plainly. It has a second sentence."))
            .collect();
        let out = format_evidence_list(&items, 500, 300);
        assert!(out.chars().count() <= 300);
        assert!(out.ends_with("...(truncated)"));
        assert!(out.starts_with("[1] Fact number 0"));
    }
}
