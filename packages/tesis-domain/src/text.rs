use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use unicode_segmentation::UnicodeSegmentation;

/// Lowercases and strips diacritics so "Undécima Época" and "UNDECIMA EPOCA" compare equal.
pub fn fold(input: &str) -> String {
	input.nfkd().filter(|ch| !is_combining_mark(*ch)).collect::<String>().to_lowercase()
}

/// Lowercased NFC words, punctuation dropped.
pub fn words(input: &str) -> Vec<String> {
	input.unicode_words().map(|word| word.nfc().collect::<String>().to_lowercase()).collect()
}

/// Whether the whitespace-separated `phrase` occurs as consecutive entries of `words`.
pub fn contains_phrase(words: &[String], phrase: &str) -> bool {
	let phrase: Vec<&str> = phrase.split_whitespace().collect();

	!phrase.is_empty()
		&& words.windows(phrase.len()).any(|window| window.iter().zip(&phrase).all(|(a, b)| a == b))
}

/// Cuts `text` to at most `max_graphemes` user-perceived characters.
///
/// Returns the kept prefix and whether anything was dropped.
pub fn truncate_graphemes(text: &str, max_graphemes: usize) -> (&str, bool) {
	match text.grapheme_indices(true).nth(max_graphemes) {
		Some((byte_idx, _)) => (&text[..byte_idx], true),
		None => (text, false),
	}
}

/// Like [`truncate_graphemes`], appending an ellipsis when the text was cut.
pub fn preview(text: &str, max_graphemes: usize) -> String {
	let (kept, truncated) = truncate_graphemes(text.trim(), max_graphemes);

	if truncated { format!("{}...", kept.trim_end()) } else { kept.to_string() }
}
