//! Decides whether a reranked result set is good enough to answer with.
//!
//! Programmatic checks run first. The model is consulted only for borderline sets, and any
//! failure on that path falls back to a count-based heuristic.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tesis_config::{Config, SimilarityThreshold};
use tesis_domain::{
	JurisprudenceRecord, SearchTool,
	rerank::{self, Distribution},
	text,
};

use crate::{Error, ModelProvider, Result};

const FULL_TEXT_RESULTS: usize = 3;
const PREVIEW_RESULTS: usize = 2;
const SNIPPET_RESULTS: usize = 5;
const PROMPT_RESULTS: usize = FULL_TEXT_RESULTS + PREVIEW_RESULTS + SNIPPET_RESULTS;
const PREVIEW_CHARS: usize = 500;
const SNIPPET_CHARS: usize = 150;
const QUALITY_BANDS: [f32; 3] = [0.75, 0.65, 0.50];
const DEFAULT_MODEL_CONFIDENCE: f32 = 0.5;
const SYSTEM_PROMPT: &str = "Eres un asistente de investigación jurídica mexicana experto en tesis y \
jurisprudencia. Evalúas si los resultados de una búsqueda bastan para responder al usuario. \
Responde solo con un objeto JSON.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
	/// Stop and answer now.
	Satisfied,
	/// Same topic, narrower keywords.
	Refine,
	/// Same topic, more general or related terms.
	Broaden,
	/// Too many low-relevance hits; add constraining terms.
	Filter,
}
impl Decision {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Satisfied => "SATISFIED",
			Self::Refine => "REFINE",
			Self::Broaden => "BROADEN",
			Self::Filter => "FILTER",
		}
	}

	/// Accepts English and Spanish labels, ignoring case and surrounding whitespace.
	pub fn from_label(label: &str) -> Option<Self> {
		match text::fold(label.trim()).as_str() {
			"satisfied" | "satisfecho" => Some(Self::Satisfied),
			"refine" | "refinar" => Some(Self::Refine),
			"broaden" | "ampliar" => Some(Self::Broaden),
			"filter" | "filtrar" => Some(Self::Filter),
			_ => None,
		}
	}
}

/// Verdict on one iteration's results.
///
/// A satisfied result always carries [`Decision::Satisfied`] and no next query; the
/// constructor enforces it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
	satisfied: bool,
	decision: Decision,
	reasoning: String,
	next_query: Option<String>,
	confidence: f32,
}
impl EvaluationResult {
	pub fn new(
		satisfied: bool,
		decision: Decision,
		reasoning: impl Into<String>,
		next_query: Option<String>,
		confidence: f32,
	) -> Self {
		let (decision, next_query) = if satisfied {
			(Decision::Satisfied, None)
		} else {
			(decision, next_query.filter(|query| !query.trim().is_empty()))
		};

		Self {
			satisfied,
			decision,
			reasoning: reasoning.into(),
			next_query,
			confidence: clamp_confidence(confidence),
		}
	}

	pub fn accept(reasoning: impl Into<String>, confidence: f32) -> Self {
		Self::new(true, Decision::Satisfied, reasoning, None, confidence)
	}

	pub fn satisfied(&self) -> bool {
		self.satisfied
	}

	pub fn decision(&self) -> Decision {
		self.decision
	}

	pub fn reasoning(&self) -> &str {
		&self.reasoning
	}

	pub fn next_query(&self) -> Option<&str> {
		self.next_query.as_deref()
	}

	pub fn confidence(&self) -> f32 {
		self.confidence
	}
}

/// Everything the evaluator looks at for one iteration.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
	pub user_query: &'a str,
	pub current_query: &'a str,
	/// Already reranked, best first.
	pub results: &'a [JurisprudenceRecord],
	/// Zero-based index of the running iteration.
	pub iteration_index: u32,
	pub max_iterations: u32,
	pub query_history: &'a [String],
	pub tools_used: &'a [SearchTool],
}
impl EvaluationRequest<'_> {
	fn is_last_iteration(&self) -> bool {
		self.iteration_index.saturating_add(1) >= self.max_iterations
	}
}

#[derive(Debug, Clone)]
pub struct Evaluation {
	pub result: EvaluationResult,
	/// Whether the model path ran, successfully or not.
	pub model_called: bool,
}

pub struct QualityEvaluator<'a> {
	cfg: &'a Config,
	model: &'a dyn ModelProvider,
}
impl<'a> QualityEvaluator<'a> {
	pub fn new(cfg: &'a Config, model: &'a dyn ModelProvider) -> Self {
		Self { cfg, model }
	}

	pub async fn evaluate(&self, request: &EvaluationRequest<'_>) -> Evaluation {
		if let Some(result) = fast_path(self.cfg, request) {
			return Evaluation { result, model_called: false };
		}

		let result = match self.ask_model(request).await {
			Ok(result) => result,
			Err(err) => {
				tracing::warn!(error = %err, "Evaluator model failed; using heuristic fallback.");

				heuristic_fallback(self.cfg, request.results.len())
			},
		};

		Evaluation { result, model_called: true }
	}

	async fn ask_model(&self, request: &EvaluationRequest<'_>) -> Result<EvaluationResult> {
		let messages = vec![
			serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
			serde_json::json!({ "role": "user", "content": build_prompt(request) }),
		];
		let timeout_ms = self.cfg.agent.model_timeout_ms;
		let reply = tokio::time::timeout(
			Duration::from_millis(timeout_ms),
			self.model.complete(&self.cfg.providers.llm, &messages),
		)
		.await
		.map_err(|_| Error::Timeout { operation: "Evaluator model call", timeout_ms })??;

		parse_verdict(&reply)
	}
}

/// Verdicts that need no model call, or `None` for a borderline result set.
pub fn fast_path(cfg: &Config, request: &EvaluationRequest<'_>) -> Option<EvaluationResult> {
	let evaluator = &cfg.evaluator;

	if request.results.is_empty() {
		return Some(EvaluationResult::new(
			false,
			Decision::Broaden,
			"La búsqueda no devolvió resultados nuevos; se requiere una estrategia más amplia.",
			Some(request.current_query.to_string()),
			evaluator.empty_confidence,
		));
	}
	if let Some((rule, count)) = matching_threshold(&evaluator.thresholds, request.results) {
		return Some(EvaluationResult::accept(
			format!(
				"Umbral cumplido: {count} resultados con similitud >= {:.0}% (mínimo {}).",
				rule.min_similarity * 100.0,
				rule.min_count
			),
			evaluator.threshold_confidence,
		));
	}
	if request.is_last_iteration() {
		return Some(EvaluationResult::accept(
			format!(
				"Última iteración ({} de {}); se aceptan los {} resultados disponibles.",
				request.iteration_index + 1,
				request.max_iterations,
				request.results.len()
			),
			evaluator.last_iteration_confidence,
		));
	}

	None
}

/// Count-based verdict used when the model output is unusable.
pub fn heuristic_fallback(cfg: &Config, result_count: usize) -> EvaluationResult {
	let evaluator = &cfg.evaluator;
	let satisfied = result_count >= evaluator.fallback_min_results as usize;
	let reasoning = format!(
		"Evaluación heurística por falla del modelo: {result_count} resultados (mínimo {}).",
		evaluator.fallback_min_results
	);

	if satisfied {
		EvaluationResult::accept(reasoning, evaluator.fallback_confidence)
	} else {
		let confidence = evaluator.fallback_confidence;

		EvaluationResult::new(false, Decision::Broaden, reasoning, None, confidence)
	}
}

/// First rule that holds, with the number of results that cleared it.
fn matching_threshold(
	thresholds: &[SimilarityThreshold],
	results: &[JurisprudenceRecord],
) -> Option<(SimilarityThreshold, usize)> {
	thresholds.iter().find_map(|rule| {
		let count = results
			.iter()
			.filter(|record| record.similarity_or_zero() >= rule.min_similarity)
			.count();

		(count >= rule.min_count as usize).then_some((*rule, count))
	})
}

fn parse_verdict(reply: &Value) -> Result<EvaluationResult> {
	let satisfied = field(reply, &["satisfied", "satisfecho"]).and_then(Value::as_bool).ok_or_else(
		|| Error::Provider { message: "Evaluator reply has no satisfied flag.".to_string() },
	)?;
	let decision = match field(reply, &["decision", "decisión"]).and_then(Value::as_str) {
		Some(label) => Decision::from_label(label).unwrap_or_else(|| {
			tracing::warn!(label, "Unknown evaluator decision; defaulting to SATISFIED.");

			Decision::Satisfied
		}),
		None => Decision::Satisfied,
	};
	let reasoning =
		field(reply, &["reasoning", "razonamiento"]).and_then(Value::as_str).unwrap_or_default();
	let next_query = field(reply, &["next_query", "siguiente_consulta"])
		.and_then(Value::as_str)
		.map(|query| query.trim().to_string());
	let confidence = field(reply, &["confidence", "confianza"])
		.and_then(Value::as_f64)
		.map(|value| value as f32)
		.unwrap_or(DEFAULT_MODEL_CONFIDENCE);

	Ok(EvaluationResult::new(satisfied, decision, reasoning, next_query, confidence))
}

fn field<'a>(reply: &'a Value, keys: &[&str]) -> Option<&'a Value> {
	keys.iter().filter_map(|key| reply.get(*key)).find(|value| !value.is_null())
}

fn clamp_confidence(value: f32) -> f32 {
	if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn build_prompt(request: &EvaluationRequest<'_>) -> String {
	let history = if request.query_history.is_empty() {
		"(ninguna)".to_string()
	} else {
		let quoted: Vec<String> =
			request.query_history.iter().map(|query| format!("\"{query}\"")).collect();

		quoted.join(", ")
	};
	let tools = if request.tools_used.is_empty() {
		"(ninguna)".to_string()
	} else {
		request.tools_used.iter().map(|tool| tool.as_str()).collect::<Vec<_>>().join(", ")
	};

	format!(
		"CONSULTA ORIGINAL DEL USUARIO: \"{user}\"\n\
CONSULTA DE BÚSQUEDA ACTUAL (iteración {iteration} de {max}): \"{current}\"\n\
CONSULTAS ANTERIORES: {history}\n\
HERRAMIENTAS USADAS: {tools}\n\n\
RESULTADOS ({count}):\n{results}\n\
DISTRIBUCIÓN:\n{distribution}\n\n\
CALIDAD: {quality}\n\n\
JERARQUÍA LEGAL: Undécima Época > Décima Época > épocas anteriores; Jurisprudencia > Tesis \
Aislada; SCJN > Salas > Plenos > Tribunales Colegiados.\n\n\
DECISIONES POSIBLES:\n\
- SATISFIED: los resultados bastan para responder.\n\
- REFINE: mismo tema, palabras clave más específicas.\n\
- BROADEN: mismo tema, términos más generales o relacionados, o aceptar que puede no existir criterio.\n\
- FILTER: demasiados resultados poco relevantes; agrega términos que acoten.\n\n\
Si no estás satisfecho, propone una consulta nueva que no repita las anteriores.\n\
Responde solo con JSON:\n\
{{\"satisfied\": true|false, \"decision\": \"SATISFIED|REFINE|BROADEN|FILTER\", \
\"reasoning\": \"...\", \"next_query\": \"...\" o null, \"confidence\": 0.0-1.0}}",
		user = request.user_query,
		iteration = request.iteration_index + 1,
		max = request.max_iterations,
		current = request.current_query,
		count = request.results.len(),
		results = format_results(request.results),
		distribution = format_distribution(&rerank::distribution(request.results)),
		quality = quality_hint(request.results),
	)
}

/// Full text for the best results, shrinking detail further down the list.
fn format_results(results: &[JurisprudenceRecord]) -> String {
	let mut out = String::new();

	for (idx, record) in results.iter().take(PROMPT_RESULTS).enumerate() {
		let body = if idx < FULL_TEXT_RESULTS {
			record.text.trim().to_string()
		} else if idx < FULL_TEXT_RESULTS + PREVIEW_RESULTS {
			text::preview(&record.text, PREVIEW_CHARS)
		} else {
			text::preview(&record.text, SNIPPET_CHARS)
		};

		out.push_str(&format!(
			"{n}. [{id}] {title}\n   Época: {era} | Tipo: {kind} | Instancia: {court} | Año: {year} | \
Puntuación: {rank:.1} | Similitud: {similarity:.0}%\n   {body}\n",
			n = idx + 1,
			id = record.id,
			title = record.title,
			era = or_na(&record.era),
			kind = or_na(&record.document_type),
			court = record.institution().unwrap_or("N/A"),
			year = record.year.map(|year| year.to_string()).unwrap_or_else(|| "N/A".to_string()),
			rank = record.rank_score.unwrap_or_default(),
			similarity = record.similarity_or_zero() * 100.0,
		));
	}

	out
}

fn format_distribution(dist: &Distribution) -> String {
	let counts = |map: &std::collections::BTreeMap<String, usize>| {
		map.iter().map(|(label, count)| format!("{label}: {count}")).collect::<Vec<_>>().join(", ")
	};

	format!(
		"- Épocas: {}\n- Tipos: {}\n- Instancias: {}\n- Año promedio: {:.0}\n- Similitud promedio: {:.0}%",
		counts(&dist.by_era),
		counts(&dist.by_document_type),
		counts(&dist.by_court),
		dist.mean_year,
		dist.mean_similarity * 100.0
	)
}

fn quality_hint(results: &[JurisprudenceRecord]) -> String {
	let [high, mid, low] = QUALITY_BANDS.map(|band| {
		results.iter().filter(|record| record.similarity_or_zero() >= band).count()
	});
	let verdict = if high > 0 {
		"hay coincidencias fuertes"
	} else if mid > 0 {
		"coincidencias moderadas; podría bastar con precisar la consulta"
	} else if low > 0 {
		"coincidencias débiles; conviene refinar o ampliar"
	} else {
		"ningún resultado supera 50%; amplía o acepta que puede no existir criterio"
	};

	format!("{high} resultados >= 75%, {mid} >= 65%, {low} >= 50% de similitud ({verdict}).")
}

fn or_na(label: &str) -> &str {
	if label.trim().is_empty() { "N/A" } else { label }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn satisfied_flag_overrides_label_and_next_query() {
		let result = EvaluationResult::new(
			true,
			Decision::Refine,
			"listo",
			Some("amparo".to_string()),
			1.7,
		);

		assert_eq!(result.decision(), Decision::Satisfied);
		assert_eq!(result.next_query(), None);
		assert_eq!(result.confidence(), 1.0);
	}

	#[test]
	fn blank_next_query_becomes_none() {
		let result =
			EvaluationResult::new(false, Decision::Refine, "", Some("   ".to_string()), f32::NAN);

		assert_eq!(result.next_query(), None);
		assert_eq!(result.confidence(), 0.0);
	}

	#[test]
	fn labels_parse_in_both_languages() {
		assert_eq!(Decision::from_label(" refinar "), Some(Decision::Refine));
		assert_eq!(Decision::from_label("AMPLIAR"), Some(Decision::Broaden));
		assert_eq!(Decision::from_label("filter"), Some(Decision::Filter));
		assert_eq!(Decision::from_label("Satisfecho"), Some(Decision::Satisfied));
		assert_eq!(Decision::from_label("ESCALATE"), None);
	}

	#[test]
	fn verdict_accepts_spanish_keys() {
		let reply = serde_json::json!({
			"satisfecho": false,
			"decision": "REFINAR",
			"razonamiento": "Faltan criterios de la SCJN.",
			"siguiente_consulta": " suspensión definitiva amparo ",
			"confianza": 0.4
		});
		let result = parse_verdict(&reply).expect("verdict must parse");

		assert!(!result.satisfied());
		assert_eq!(result.decision(), Decision::Refine);
		assert_eq!(result.next_query(), Some("suspensión definitiva amparo"));
		assert!((result.confidence() - 0.4).abs() < 1e-6);
	}

	#[test]
	fn unknown_label_defaults_to_satisfied_decision() {
		let reply = serde_json::json!({
			"satisfied": false,
			"decision": "ESCALATE",
			"next_query": "otra consulta"
		});
		let result = parse_verdict(&reply).expect("verdict must parse");

		assert_eq!(result.decision(), Decision::Satisfied);
		assert_eq!(result.next_query(), Some("otra consulta"));
		assert_eq!(result.confidence(), DEFAULT_MODEL_CONFIDENCE);
	}

	#[test]
	fn verdict_without_flag_is_rejected() {
		assert!(parse_verdict(&serde_json::json!({ "decision": "REFINE" })).is_err());
	}

	#[test]
	fn results_are_tiered_by_position() {
		let long_text = "a".repeat(600);
		let records: Vec<_> = (1..=12)
			.map(|id| {
				let mut record = JurisprudenceRecord::new(id, format!("Rubro {id}"));

				record.text = long_text.clone();

				record
			})
			.collect();
		let formatted = format_results(&records);
		let bodies: Vec<&str> =
			formatted.lines().filter(|line| line.trim_start().starts_with('a')).collect();

		assert_eq!(bodies.len(), 10);
		assert_eq!(bodies[0].trim().len(), 600);
		assert_eq!(bodies[3].trim().len(), PREVIEW_CHARS + 3);
		assert_eq!(bodies[9].trim().len(), SNIPPET_CHARS + 3);
		assert!(!formatted.contains("Rubro 11"));
	}

	#[test]
	fn quality_hint_counts_bands() {
		let records: Vec<_> = [0.8_f32, 0.7, 0.55, 0.3]
			.into_iter()
			.enumerate()
			.map(|(idx, similarity)| {
				let mut record = JurisprudenceRecord::new(idx as i64, "");

				record.similarity = Some(similarity);

				record
			})
			.collect();

		assert!(quality_hint(&records).starts_with("1 resultados >= 75%, 2 >= 65%, 3 >= 50%"));
	}
}
