//! Cheap first tier of follow-up detection. Undecided cases are left to the caller.

use serde::{Deserialize, Serialize};

use crate::{conversation::Turn, text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
	/// Answer from sources already shown in the conversation.
	Reuse,
	NewSearch,
}
impl Intent {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Reuse => "REUSE",
			Self::NewSearch => "NEW_SEARCH",
		}
	}

	/// Lenient parse of a model label. Anything mentioning REUSE counts as reuse.
	pub fn from_label(label: &str) -> Self {
		if label.to_uppercase().contains("REUSE") { Self::Reuse } else { Self::NewSearch }
	}
}

// Matched word by word against the folded (accent-free, lowercase) question.
const REUSE_CUES: [&str; 15] = [
	"explica",
	"explicame",
	"detalla",
	"que significa",
	"por que",
	"mas detalles",
	"mas informacion",
	"profundiza",
	"sobre eso",
	"sobre esto",
	"lo anterior",
	"esa tesis",
	"ese criterio",
	"esa jurisprudencia",
	"que quiere decir",
];
// Only distinct from everyday words by their accent ("como", "amplia"), so matched unfolded.
const ACCENTED_REUSE_CUES: [&str; 2] = ["cómo", "amplía"];
const SEARCH_CUES: [&str; 12] = [
	"busca",
	"encuentra",
	"otra tesis",
	"otras tesis",
	"dame otras",
	"necesito",
	"quiero",
	"diferente",
	"distinto",
	"nuevo",
	"buscar",
	"encontrar",
];

/// Returns `None` when the cues are inconclusive.
pub fn classify_heuristic(
	query: &str,
	history: &[Turn],
	short_query_chars: usize,
) -> Option<Intent> {
	if history.is_empty() {
		return Some(Intent::NewSearch);
	}

	let words = text::words(query);
	let folded: Vec<String> = words.iter().map(|word| text::fold(word)).collect();

	if ACCENTED_REUSE_CUES.iter().any(|cue| text::contains_phrase(&words, cue))
		|| REUSE_CUES.iter().any(|cue| text::contains_phrase(&folded, cue))
	{
		return Some(Intent::Reuse);
	}
	if SEARCH_CUES.iter().any(|cue| text::contains_phrase(&folded, cue)) {
		return Some(Intent::NewSearch);
	}

	let latest_has_sources = history.last().map(|turn| !turn.sources.is_empty()).unwrap_or(false);

	if query.trim().chars().count() < short_query_chars && latest_has_sources {
		return Some(Intent::Reuse);
	}

	None
}
