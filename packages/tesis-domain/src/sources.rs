//! Identity-based deduplication and bounded merging of result sets.

use std::collections::HashSet;

use crate::{
	conversation::{Role, Turn},
	record::{JurisprudenceRecord, RecordId},
};

/// Keeps the first occurrence of every identity, preserving order otherwise.
pub fn deduplicate(records: &[JurisprudenceRecord]) -> Vec<JurisprudenceRecord> {
	let mut seen = HashSet::new();

	records.iter().filter(|record| seen.insert(record.id)).cloned().collect()
}

/// Concatenates new then historical records, deduplicates, and keeps at most `max_count`.
///
/// When over the cap the front is dropped, so the most recently added entries survive.
pub fn merge(
	new_records: &[JurisprudenceRecord],
	historical: &[JurisprudenceRecord],
	max_count: usize,
) -> Vec<JurisprudenceRecord> {
	let combined: Vec<JurisprudenceRecord> =
		new_records.iter().chain(historical.iter()).cloned().collect();

	keep_last(deduplicate(&combined), max_count)
}

/// Sources attached to assistant turns, deduplicated and capped like [`merge`].
pub fn historical_sources(turns: &[Turn], max_count: usize) -> Vec<JurisprudenceRecord> {
	let attached: Vec<JurisprudenceRecord> = turns
		.iter()
		.filter(|turn| turn.role == Role::Assistant)
		.flat_map(|turn| turn.sources.iter().cloned())
		.collect();

	keep_last(deduplicate(&attached), max_count)
}

/// Every identity already shown to the user in `turns`.
pub fn discussed_ids(turns: &[Turn]) -> HashSet<RecordId> {
	turns.iter().flat_map(|turn| turn.sources.iter().map(|source| source.id)).collect()
}

fn keep_last(mut records: Vec<JurisprudenceRecord>, max_count: usize) -> Vec<JurisprudenceRecord> {
	if records.len() > max_count {
		records.drain(..records.len() - max_count);
	}

	records
}
