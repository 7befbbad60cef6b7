//! Splitting oversized outbound messages into budget-sized chunks.
//!
//! Sizes are token estimates: every word unit costs `bytes / 4` (rounded up,
//! at least one). A word unit is a run of non-whitespace together with the
//! whitespace that follows it. Units are packed whole; a unit larger than the
//! budget (a long unbroken run such as CJK prose or a base64 blob) is first cut
//! into pieces of at most `budget * 4` bytes on char boundaries. Every chunk
//! therefore stays within budget, and [`count_tokens`] of a chunk is exactly
//! what [`split`] charged for it.

/// Estimated token count of `text`.
pub fn count_tokens(text: &str) -> usize {
    units(text).map(unit_tokens).sum()
}

/// Split `content` into ordered chunks of at most `chunk_tokens` each.
///
/// Concatenating the result reproduces `content` exactly. Empty input yields
/// no chunks.
pub fn split(content: &str, chunk_tokens: usize) -> Vec<&str> {
    let budget = chunk_tokens.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut end = 0;
    let mut used = 0;

    for unit in units(content).flat_map(|unit| pieces(unit, budget)) {
        let cost = unit_tokens(unit);
        if used > 0 && used + cost > budget {
            chunks.push(&content[start..end]);
            start = end;
            used = 0;
        }
        end += unit.len();
        used += cost;
    }

    if end > start {
        chunks.push(&content[start..end]);
    }
    chunks
}

fn unit_tokens(unit: &str) -> usize {
    unit.len().div_ceil(4).max(1)
}

/// Cut `unit` into pieces costing at most `budget` tokens each.
fn pieces(unit: &str, budget: usize) -> impl Iterator<Item = &str> {
    let max_bytes = budget.saturating_mul(4);
    let mut rest = unit;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        // A char is at most 4 bytes, so a boundary exists in (0, max_bytes].
        let mut cut = rest.len().min(max_bytes);
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (piece, tail) = rest.split_at(cut);
        rest = tail;
        Some(piece)
    })
}

fn units(text: &str) -> Units<'_> {
    Units { rest: text }
}

/// Iterator over word units. Leading whitespace at the very start forms its own unit.
struct Units<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Units<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }

        let mut seen_whitespace = false;
        let mut end = self.rest.len();
        for (i, c) in self.rest.char_indices() {
            if c.is_whitespace() {
                seen_whitespace = true;
            } else if seen_whitespace {
                end = i;
                break;
            }
        }

        let (unit, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_round_trip(content: &str, budget: usize) {
        let chunks = split(content, budget);
        assert_eq!(chunks.concat(), content, "budget {budget}");
    }

    #[test]
    fn units_keep_trailing_whitespace() {
        let collected: Vec<_> = units("  hello  big\nworld").collect();
        assert_eq!(collected, vec!["  ", "hello  ", "big\n", "world"]);
    }

    #[test]
    fn count_tokens_estimates_per_unit() {
        assert_eq!(count_tokens(""), 0);
        // "abc " and "defgh" -> 1 + 2
        assert_eq!(count_tokens("abc defgh"), 3);
        // whitespace-only text is one unit
        assert_eq!(count_tokens("   "), 1);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(split("", 16).is_empty());
    }

    #[test]
    fn content_within_budget_is_one_chunk() {
        assert_eq!(split("hello", 2048), vec!["hello"]);
        assert_eq!(split("hello world, how are you?", 2048).len(), 1);
    }

    #[test]
    fn chunks_round_trip() {
        let samples = [
            "the quick brown fox jumps over the lazy dog",
            "  leading and trailing whitespace  ",
            "line one\nline two\n\n\tline three",
            "日本語のテキスト と English mixed together ok",
            "a",
            "     ",
            "supercalifragilisticexpialidocious is a long word",
        ];
        for sample in samples {
            for budget in [1, 2, 3, 5, 8, 64] {
                assert_round_trip(sample, budget);
            }
        }
    }

    #[test]
    fn chunks_respect_budget() {
        let text = "one two three four five six seven eight nine ten ".repeat(20);
        for budget in [1, 2, 3, 7, 10] {
            for chunk in split(&text, budget) {
                assert!(count_tokens(chunk) <= budget, "{chunk:?} over {budget}");
            }
        }
    }

    #[test]
    fn oversized_unit_is_cut_to_budget() {
        let long_word = "x".repeat(40);
        let text = format!("ab {long_word} cd");

        let chunks = split(&text, 2);
        assert_eq!(
            chunks,
            vec!["ab ", "xxxxxxxx", "xxxxxxxx", "xxxxxxxx", "xxxxxxxx", "xxxxxxxx", " cd"]
        );
        assert!(chunks.iter().all(|c| count_tokens(c) <= 2));
    }

    #[test]
    fn long_ascii_run_without_whitespace_is_split() {
        let blob = "A".repeat(200_000);
        let chunks = split(&blob, 2048);

        assert_eq!(chunks.len(), 25);
        assert!(chunks.iter().all(|c| count_tokens(c) <= 2048));
        assert_eq!(chunks.concat(), blob);
    }

    #[test]
    fn long_cjk_run_is_split_on_char_boundaries() {
        let prose = "日本語のテキストです。".repeat(1000);
        let chunks = split(&prose, 2048);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(count_tokens(chunk) <= 2048);
            assert_eq!(chunk.len() % 3, 0, "cut inside a char");
        }
        assert_eq!(chunks.concat(), prose);

        // One three-byte char per chunk at the smallest budget.
        let tiny = split("日本語", 1);
        assert_eq!(tiny, vec!["日", "本", "語"]);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "héllo wörld ñandú çava ".repeat(10);
        for chunk in split(&text, 3) {
            assert!(count_tokens(chunk) <= 3);
        }
        assert_round_trip(&text, 3);
    }

    #[test]
    fn split_is_deterministic() {
        let text = "alpha beta gamma delta epsilon ".repeat(50);
        assert_eq!(split(&text, 7), split(&text, 7));
    }

    #[test]
    fn zero_budget_behaves_like_one() {
        assert_eq!(split("a b c", 0), split("a b c", 1));
    }
}
