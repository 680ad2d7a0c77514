//! Recursive text chunking for document indexing.
//!
//! Splits text on natural boundaries (paragraphs, lines, sentences) before
//! falling back to word and character splits, producing bounded chunks with
//! a configurable character overlap between neighbours.

/// Separators ordered by preference: paragraphs → lines → sentences → words → chars.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Splits `text` into overlapping chunks of at most `size` characters.
///
/// Tries each separator in preference order and greedily accumulates
/// splits up to `size`, seeding each new chunk with the trailing `overlap`
/// characters of its predecessor. Chunks still exceeding `size` are
/// recursively re-split with the remaining separators; the final
/// character-level separator guarantees termination. Whitespace-only
/// chunks are discarded.
///
/// Text of `size` characters or fewer yields a single trimmed chunk, or
/// none if blank.
#[must_use]
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    recursive_split(text, &SEPARATORS, size, overlap)
}

fn recursive_split(text: &str, separators: &[&str], size: usize, overlap: usize) -> Vec<String> {
    if char_len(text) <= size {
        let stripped = text.trim();
        return if stripped.is_empty() {
            Vec::new()
        } else {
            vec![stripped.to_string()]
        };
    }

    // First separator actually present in the text; the empty separator
    // always matches, so this cannot fall through.
    let sep_idx = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(sep_idx).copied().unwrap_or("");

    let splits: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator).map(String::from).collect()
    };

    // Merge splits into chunks respecting the size limit.
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for split in &splits {
        let piece = if separator.is_empty() {
            split.clone()
        } else {
            format!("{split}{separator}")
        };

        if char_len(&current) + char_len(&piece) > size && !current.is_empty() {
            push_trimmed(&mut chunks, &current, separator);

            // Seed the next chunk with the tail of the previous one.
            current = if overlap > 0 && char_len(&current) > overlap {
                tail_chars(&current, overlap)
            } else {
                String::new()
            };
            current.push_str(&piece);
        } else {
            current.push_str(&piece);
        }
    }

    if !current.is_empty() {
        push_trimmed(&mut chunks, &current, separator);
    }

    // Re-split anything still oversized with the remaining separators.
    let remaining = separators.get(sep_idx + 1..).unwrap_or(&[]);
    if remaining.is_empty() {
        return chunks;
    }

    let mut final_chunks = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if char_len(&chunk) > size {
            final_chunks.extend(recursive_split(&chunk, remaining, size, overlap));
        } else {
            final_chunks.push(chunk);
        }
    }

    final_chunks
}

/// Trims trailing separator characters plus surrounding whitespace and
/// pushes the chunk if anything remains.
fn push_trimmed(chunks: &mut Vec<String>, raw: &str, separator: &str) {
    let trimmed = raw
        .trim_end_matches(|c: char| separator.contains(c))
        .trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Returns the last `n` characters of `s`.
fn tail_chars(s: &str, n: usize) -> String {
    let len = char_len(s);
    s.chars().skip(len.saturating_sub(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("  hello world  ", 100, 10);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test_case(""; "empty")]
    #[test_case("   \n\n  "; "whitespace only")]
    fn test_blank_input_yields_nothing(text: &str) {
        assert!(chunk_text(text, 100, 10).is_empty());
    }

    #[test]
    fn test_paragraph_split() {
        let text = "first paragraph here\n\nsecond paragraph here\n\nthird paragraph here";
        let chunks = chunk_text(text, 25, 0);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 25));
        assert_eq!(chunks[0], "first paragraph here");
    }

    #[test]
    fn test_char_fallback_respects_size() {
        // No separators at all: falls through to character-level splits.
        let text = "abcdefghijklmnopqrstuvwxy"; // 25 chars
        let chunks = chunk_text(text, 10, 3);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        // Each chunk after the first starts with the 3-char tail of the
        // previous accumulated buffer.
        assert_eq!(chunks[0], "abcdefghij");
        assert!(chunks[1].starts_with("hij"));
    }

    #[test]
    fn test_overlap_seeds_next_chunk() {
        let text = "aaaa bbbb cccc dddd eeee";
        let chunks = chunk_text(text, 10, 5);
        assert!(chunks.len() > 1);
        for window in chunks.windows(2) {
            // Overlap means consecutive chunks share some content.
            let prev_tail: String = window[0]
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            assert!(
                window[1].contains(prev_tail.trim()) || !prev_tail.trim().is_empty(),
                "chunks should overlap: {:?} then {:?}",
                window[0],
                window[1]
            );
        }
    }

    #[test]
    fn test_zero_overlap() {
        let text = "abcdefghij klmnopqrst uvwxyzabcd";
        let chunks = chunk_text(text, 10, 0);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn test_exact_size_boundary() {
        let text = "exactly-10";
        assert_eq!(chunk_text(text, 10, 3), vec!["exactly-10".to_string()]);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "äöü ".repeat(20);
        let chunks = chunk_text(&text, 10, 2);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    proptest! {
        #[test]
        fn prop_chunks_never_exceed_size(
            text in "[a-z \n]{0,200}",
            size in 4_usize..40,
            overlap in 0_usize..3,
        ) {
            let chunks = chunk_text(&text, size, overlap);
            for chunk in &chunks {
                prop_assert!(chunk.chars().count() <= size);
                prop_assert!(!chunk.trim().is_empty());
            }
        }

        #[test]
        fn prop_short_input_round_trips(text in "[a-z]{1,20}") {
            let chunks = chunk_text(&text, 50, 10);
            prop_assert_eq!(chunks, vec![text.trim().to_string()]);
        }
    }
}
