//! Text normalization shared by indexing and querying.

/// Splits text into lowercase alphanumeric words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Returns every prefix of `word`, shortest first, up to `max_chars` characters.
pub fn prefixes(word: &str, max_chars: usize) -> impl Iterator<Item = &str> + '_ {
    word.char_indices()
        .skip(1)
        .map(|(offset, _)| offset)
        .chain(std::iter::once(word.len()))
        .take(max_chars)
        .map(move |end| &word[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_punctuation_and_lowercases() {
        assert_eq!(
            tokenize("Dominus Empyreus (2011)"),
            vec!["dominus", "empyreus", "2011"]
        );
        assert_eq!(tokenize("Top-Hat_of  DOOM"), vec!["top", "hat", "of", "doom"]);
        assert!(tokenize("  --  ").is_empty());
    }

    #[test]
    fn prefixes_are_char_aligned() {
        let collected: Vec<_> = prefixes("héllo", 32).collect();
        assert_eq!(collected, vec!["h", "hé", "hél", "héll", "héllo"]);
    }

    #[test]
    fn prefixes_respect_limit() {
        let collected: Vec<_> = prefixes("crown", 3).collect();
        assert_eq!(collected, vec!["c", "cr", "cro"]);
    }
}
