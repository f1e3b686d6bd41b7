use serde::{Deserialize, Serialize};

pub type RecordId = i64;

/// A published thesis or jurisprudence entry.
///
/// Only `id` is stable across sources; text and metadata may differ slightly between tools.
/// `similarity` belongs to the query that produced the record, not to the record itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisprudenceRecord {
	#[serde(alias = "id_tesis")]
	pub id: RecordId,
	/// Rubro.
	#[serde(alias = "rubro", default)]
	pub title: String,
	#[serde(alias = "texto", default)]
	pub text: String,
	#[serde(alias = "epoca", default)]
	pub era: String,
	/// "Jurisprudencia" or "Tesis Aislada".
	#[serde(alias = "tipo_tesis", default)]
	pub document_type: String,
	/// Instancia.
	#[serde(alias = "instancia", default, skip_serializing_if = "Option::is_none")]
	pub court: Option<String>,
	/// Órgano jurisdiccional; older payloads carry the court here instead of `court`.
	#[serde(alias = "organo_juris", default, skip_serializing_if = "Option::is_none")]
	pub issuing_body: Option<String>,
	#[serde(alias = "anio", default, skip_serializing_if = "Option::is_none")]
	pub year: Option<i32>,
	#[serde(alias = "tesis", default, skip_serializing_if = "Option::is_none")]
	pub registry: Option<String>,
	#[serde(alias = "localizacion", default, skip_serializing_if = "Option::is_none")]
	pub location: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub similarity: Option<f32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rank_score: Option<f64>,
}
impl JurisprudenceRecord {
	pub fn new(id: RecordId, title: impl Into<String>) -> Self {
		Self {
			id,
			title: title.into(),
			text: String::new(),
			era: String::new(),
			document_type: String::new(),
			court: None,
			issuing_body: None,
			year: None,
			registry: None,
			location: None,
			similarity: None,
			rank_score: None,
		}
	}

	/// The institution label used for hierarchy scoring and diagnostics.
	pub fn institution(&self) -> Option<&str> {
		[self.court.as_deref(), self.issuing_body.as_deref()]
			.into_iter()
			.flatten()
			.map(str::trim)
			.find(|value| !value.is_empty())
	}

	pub fn similarity_or_zero(&self) -> f32 {
		self.similarity.filter(|value| value.is_finite()).unwrap_or(0.0)
	}
}
