//! Character budget for text sent to the translation backend.
//!
//! Long messages cost more and take longer to translate. Text above the budget
//! is cut to its first `max_chars` characters and a marker is appended so the
//! reader can tell the translation covers only part of the original.

/// Cap `text` to at most `max_chars` characters, appending `marker` when cut.
///
/// Counting is by Unicode scalar value, not bytes, so multi-byte sequences are
/// never split. Text within budget is returned unchanged.
pub fn cap_chars(text: &str, max_chars: usize, marker: &str) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_owned(),
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + marker.len());
            out.push_str(&text[..cut]);
            out.push_str(marker);
            out
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_returned_as_is() {
        assert_eq!(cap_chars("hello there", 1500, "…"), "hello there");
    }

    #[test]
    fn exact_boundary_returned_as_is() {
        let s = "x".repeat(1500);
        assert_eq!(cap_chars(&s, 1500, "…"), s);
    }

    #[test]
    fn one_over_boundary_is_cut() {
        let s = "a".repeat(1501);
        let out = cap_chars(&s, 1500, "…");
        assert_eq!(out, format!("{}…", "a".repeat(1500)));
    }

    #[test]
    fn long_input_keeps_head() {
        let s: String = ('a'..='z').cycle().take(2000).collect();
        let out = cap_chars(&s, 1500, "…");
        let expected: String = s.chars().take(1500).collect();
        assert_eq!(out, format!("{expected}…"));
    }

    #[test]
    fn multibyte_counts_characters_not_bytes() {
        // 3 bytes per char, so a byte-based cut would land mid-sequence.
        let s = "€".repeat(10);
        let out = cap_chars(&s, 4, "...");
        assert_eq!(out, "€€€€...");
    }

    #[test]
    fn empty_input_returned_as_is() {
        assert_eq!(cap_chars("", 10, "…"), "");
    }
}
