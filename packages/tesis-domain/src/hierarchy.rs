//! Legal-authority scoring for jurisprudence records.
//!
//! The total is the plain sum of five independent factors so each one can be explained and
//! tested on its own. Era bands are 100 points apart, which is more than the similarity factor
//! can ever contribute.

use serde::Serialize;

use crate::{record::JurisprudenceRecord, text};

pub const JURISPRUDENCIA_SCORE: f64 = 100.0;
pub const TESIS_AISLADA_SCORE: f64 = 50.0;
pub const RECENCY_BASE_YEAR: i32 = 2000;
pub const RECENCY_SPAN_YEARS: f64 = 25.0;
pub const RECENCY_MAX: f64 = 10.0;
pub const SIMILARITY_MAX: f64 = 50.0;

/// Named eras, newest first. Compared through this table only; the labels carry no usable
/// lexical or numeric order.
const ERA_BANDS: [(&str, f64); 8] = [
	("undecima", 1_100.0),
	("decima", 1_000.0),
	("novena", 900.0),
	("octava", 800.0),
	("septima", 700.0),
	("sexta", 600.0),
	("quinta", 500.0),
	("cuarta", 400.0),
];

/// Checked in order; the first matching rule wins.
const COURT_RULES: [(&[&str], f64); 5] = [
	(&["suprema corte"], 30.0),
	(&["scjn"], 30.0),
	(&["sala"], 25.0),
	(&["pleno"], 20.0),
	(&["tribunal", "colegiado"], 15.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HierarchyScore {
	pub era: f64,
	pub document_type: f64,
	pub court: f64,
	pub recency: f64,
	pub similarity: f64,
}
impl HierarchyScore {
	pub fn total(&self) -> f64 {
		self.era + self.document_type + self.court + self.recency + self.similarity
	}
}

pub fn score(record: &JurisprudenceRecord) -> f64 {
	explain(record).total()
}

pub fn explain(record: &JurisprudenceRecord) -> HierarchyScore {
	HierarchyScore {
		era: era_score(&record.era),
		document_type: document_type_score(&record.document_type),
		court: record.institution().map(court_score).unwrap_or(0.0),
		recency: record.year.map(recency_score).unwrap_or(0.0),
		similarity: record.similarity.map(similarity_score).unwrap_or(0.0),
	}
}

/// Band for a named era. Accepts "Undécima Época", "undecima epoca", or just "Undécima".
pub fn era_score(era: &str) -> f64 {
	let folded = text::fold(era);
	let name = folded.trim().trim_end_matches("epoca").trim();

	ERA_BANDS.iter().find(|(label, _)| *label == name).map(|(_, band)| *band).unwrap_or(0.0)
}

pub fn document_type_score(document_type: &str) -> f64 {
	let folded = text::fold(document_type);

	if folded.contains("jurisprudencia") {
		JURISPRUDENCIA_SCORE
	} else if folded.contains("aislada") {
		TESIS_AISLADA_SCORE
	} else {
		0.0
	}
}

pub fn court_score(institution: &str) -> f64 {
	let folded = text::fold(institution);

	COURT_RULES
		.iter()
		.find(|(needles, _)| needles.iter().all(|needle| folded.contains(needle)))
		.map(|(_, bonus)| *bonus)
		.unwrap_or(0.0)
}

pub fn recency_score(year: i32) -> f64 {
	let raw = f64::from(year - RECENCY_BASE_YEAR) / RECENCY_SPAN_YEARS * RECENCY_MAX;

	raw.clamp(0.0, RECENCY_MAX)
}

pub fn similarity_score(similarity: f32) -> f64 {
	if !similarity.is_finite() {
		return 0.0;
	}

	f64::from(similarity.clamp(0.0, 1.0)) * SIMILARITY_MAX
}
