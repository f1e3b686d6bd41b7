use serde::{Deserialize, Serialize};

use crate::record::{JurisprudenceRecord, RecordId};

/// Retrieval tools a search capability may call on the agent's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTool {
	/// Embedding similarity search over the corpus.
	Semantic,
	/// Records related to an already known record.
	Related,
	/// Direct fetch by identity.
	Lookup,
	/// Corpus statistics or metadata exploration.
	Stats,
	Other,
}
impl SearchTool {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Semantic => "semantic",
			Self::Related => "related",
			Self::Lookup => "lookup",
			Self::Stats => "stats",
			Self::Other => "other",
		}
	}

	/// Maps the tool names used by the retrieval service onto the canonical set.
	pub fn from_label(label: &str) -> Self {
		let label = label.trim().to_lowercase();

		if label.contains("related") || label.contains("similar_to") {
			Self::Related
		} else if label.contains("semantic") || label.contains("vector") || label == "search" {
			Self::Semantic
		} else if label.contains("lookup") || label.contains("get_tesis") || label.contains("by_id")
		{
			Self::Lookup
		} else if label.contains("stat") || label.contains("explore") || label.contains("metadata")
		{
			Self::Stats
		} else {
			Self::Other
		}
	}

	/// Whether one invocation of this tool embeds the query.
	pub fn embeds_query(self) -> bool {
		matches!(self, Self::Semantic)
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
	pub query: String,
	/// Identities that must not be returned again.
	pub exclude_ids: Vec<RecordId>,
	pub limit: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
	pub records: Vec<JurisprudenceRecord>,
	/// One entry per tool invocation, in call order.
	pub tools_used: Vec<SearchTool>,
	pub embedding_calls: u32,
	pub model_calls: u32,
}
