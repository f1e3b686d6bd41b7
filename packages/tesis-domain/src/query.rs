use std::collections::HashSet;

use serde::{Serialize, Serializer};
use unicode_normalization::UnicodeNormalization;

/// Canonical form used for query history and redundancy checks.
///
/// Trims and lowercases, compared in NFC. Inner whitespace is kept as is, so "amparo  directo"
/// and "amparo directo" are distinct queries. Applying it twice is a no-op.
pub fn normalize_query(query: &str) -> String {
	query.trim().to_lowercase().nfc().collect()
}

pub fn is_blank(query: Option<&str>) -> bool {
	query.map(|value| value.trim().is_empty()).unwrap_or(true)
}

/// Append-only, normalized query history with set-backed membership checks.
#[derive(Debug, Clone, Default)]
pub struct QueryHistory {
	entries: Vec<String>,
	seen: HashSet<String>,
}
impl QueryHistory {
	/// Records `query` unless it is blank or already present. Returns whether it was added.
	pub fn push(&mut self, query: &str) -> bool {
		let normalized = normalize_query(query);

		if normalized.is_empty() || !self.seen.insert(normalized.clone()) {
			return false;
		}

		self.entries.push(normalized);

		true
	}

	pub fn contains(&self, query: &str) -> bool {
		self.seen.contains(&normalize_query(query))
	}

	pub fn entries(&self) -> &[String] {
		&self.entries
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
impl Serialize for QueryHistory {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		self.entries.serialize(serializer)
	}
}
