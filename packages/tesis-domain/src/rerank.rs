use std::collections::BTreeMap;

use serde::Serialize;

use crate::{hierarchy, record::JurisprudenceRecord};

const UNKNOWN_LABEL: &str = "N/A";

/// Aggregate view of a result set, used for logging and evaluator prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distribution {
	pub total: usize,
	pub by_era: BTreeMap<String, usize>,
	pub by_document_type: BTreeMap<String, usize>,
	pub by_court: BTreeMap<String, usize>,
	/// Mean over records that carry a year; zero when none do.
	pub mean_year: f64,
	/// Mean over records that carry a similarity; zero when none do.
	pub mean_similarity: f64,
}

/// Returns the records ordered by descending hierarchy score with `rank_score` filled in.
///
/// The sort is stable, so equal scores keep their input order. The input is left untouched.
pub fn rerank(records: &[JurisprudenceRecord]) -> Vec<JurisprudenceRecord> {
	let mut scored: Vec<(f64, JurisprudenceRecord)> = records
		.iter()
		.map(|record| {
			let total = hierarchy::score(record);
			let mut ranked = record.clone();

			ranked.rank_score = Some(total);

			(total, ranked)
		})
		.collect();

	scored.sort_by(|(a, _), (b, _)| b.total_cmp(a));

	scored.into_iter().map(|(_, record)| record).collect()
}

pub fn distribution(records: &[JurisprudenceRecord]) -> Distribution {
	let mut out = Distribution { total: records.len(), ..Distribution::default() };
	let mut year_sum = 0.0;
	let mut year_count = 0_usize;
	let mut similarity_sum = 0.0;
	let mut similarity_count = 0_usize;

	for record in records {
		*out.by_era.entry(label_or_unknown(&record.era)).or_default() += 1;
		*out.by_document_type.entry(label_or_unknown(&record.document_type)).or_default() += 1;
		let court = record.institution().unwrap_or_default();

		*out.by_court.entry(label_or_unknown(court)).or_default() += 1;

		if let Some(year) = record.year {
			year_sum += f64::from(year);
			year_count += 1;
		}
		if let Some(similarity) = record.similarity.filter(|value| value.is_finite()) {
			similarity_sum += f64::from(similarity);
			similarity_count += 1;
		}
	}

	if year_count > 0 {
		out.mean_year = year_sum / year_count as f64;
	}
	if similarity_count > 0 {
		out.mean_similarity = similarity_sum / similarity_count as f64;
	}

	out
}

fn label_or_unknown(label: &str) -> String {
	let trimmed = label.trim();

	if trimmed.is_empty() { UNKNOWN_LABEL.to_string() } else { trimmed.to_string() }
}
