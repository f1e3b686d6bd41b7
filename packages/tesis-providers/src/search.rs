//! HTTP adapter for the retrieval service.
//!
//! The service fronts several tools whose payloads use different field names. Everything is
//! mapped onto [`JurisprudenceRecord`] here so callers never see tool-specific shapes.

use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};

use tesis_domain::{JurisprudenceRecord, SearchOutcome, SearchRequest, SearchTool};

use crate::{Error, Result};

const ID_KEYS: [&str; 3] = ["id", "id_tesis", "tesis_id"];
const TITLE_KEYS: [&str; 2] = ["title", "rubro"];
const TEXT_KEYS: [&str; 3] = ["text", "texto", "content"];
const ERA_KEYS: [&str; 2] = ["era", "epoca"];
const TYPE_KEYS: [&str; 3] = ["document_type", "tipo_tesis", "tipo"];
const COURT_KEYS: [&str; 2] = ["court", "instancia"];
const ISSUING_BODY_KEYS: [&str; 2] = ["issuing_body", "organo_juris"];
const YEAR_KEYS: [&str; 2] = ["year", "anio"];
const REGISTRY_KEYS: [&str; 2] = ["registry", "tesis"];
const LOCATION_KEYS: [&str; 2] = ["location", "localizacion"];
const SIMILARITY_KEYS: [&str; 2] = ["similarity", "score"];

pub async fn search(
	cfg: &tesis_config::SearchProviderConfig,
	request: &SearchRequest,
) -> Result<SearchOutcome> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(request)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_search_response(json)
}

/// Accepts either a flat `results` list or a `tool_calls` list of per-tool result sets.
fn parse_search_response(json: Value) -> Result<SearchOutcome> {
	let mut outcome = SearchOutcome::default();

	if let Some(calls) = json.get("tool_calls").and_then(Value::as_array) {
		for call in calls {
			let label = call
				.get("tool")
				.or_else(|| call.get("name"))
				.and_then(Value::as_str)
				.unwrap_or_default();

			outcome.tools_used.push(SearchTool::from_label(label));

			if let Some(results) = call.get("results").and_then(Value::as_array) {
				outcome.records.extend(results.iter().filter_map(normalize_record));
			}
		}
	} else {
		let results = json
			.get("results")
			.or_else(|| json.get("data"))
			.and_then(Value::as_array)
			.ok_or_else(|| Error::InvalidResponse {
				message: "Search response is missing results array.".to_string(),
			})?;

		outcome.records.extend(results.iter().filter_map(normalize_record));

		match json.get("tools_used").and_then(Value::as_array) {
			Some(tools) => outcome
				.tools_used
				.extend(tools.iter().filter_map(Value::as_str).map(SearchTool::from_label)),
			None => outcome.tools_used.push(SearchTool::Semantic),
		}
	}

	let embedded = outcome.tools_used.iter().filter(|tool| tool.embeds_query()).count();

	outcome.embedding_calls = reported_calls(&json, "embedding_calls")
		.unwrap_or_else(|| u32::try_from(embedded).unwrap_or(u32::MAX));
	outcome.model_calls = reported_calls(&json, "model_calls").unwrap_or(0);

	Ok(outcome)
}

/// Saturates instead of wrapping so oversized counters never under-report cost.
fn reported_calls(json: &Value, key: &str) -> Option<u32> {
	json.get(key).and_then(Value::as_u64).map(|value| u32::try_from(value).unwrap_or(u32::MAX))
}

/// Maps one tool result onto the canonical record. Entries without an identity are dropped.
pub fn normalize_record(value: &Value) -> Option<JurisprudenceRecord> {
	let Some(obj) = value.as_object() else {
		tracing::warn!("Search result is not an object.");

		return None;
	};
	let Some(id) = first_i64(obj, &ID_KEYS) else {
		tracing::warn!("Search result missing identity.");

		return None;
	};
	let similarity = first_f64(obj, &SIMILARITY_KEYS)
		.or_else(|| first_f64(obj, &["distance"]).map(|distance| 1.0 - distance))
		.filter(|value| value.is_finite())
		.map(|value| value.clamp(0.0, 1.0) as f32);
	let title = first_string(obj, &TITLE_KEYS).unwrap_or_default();
	let mut record = JurisprudenceRecord::new(id, title);

	record.text = first_string(obj, &TEXT_KEYS).unwrap_or_default();
	record.era = first_string(obj, &ERA_KEYS).unwrap_or_default();
	record.document_type = first_string(obj, &TYPE_KEYS).unwrap_or_default();
	record.court = first_string(obj, &COURT_KEYS);
	record.issuing_body = first_string(obj, &ISSUING_BODY_KEYS);
	record.year = first_i64(obj, &YEAR_KEYS).and_then(|year| i32::try_from(year).ok());
	record.registry = first_string(obj, &REGISTRY_KEYS);
	record.location = first_string(obj, &LOCATION_KEYS);
	record.similarity = similarity;

	Some(record)
}

fn first_value<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
	keys.iter().filter_map(|key| obj.get(*key)).find(|value| !value.is_null())
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
	match first_value(obj, keys)? {
		Value::String(text) => Some(text.clone()),
		Value::Number(number) => Some(number.to_string()),
		_ => None,
	}
}

fn first_i64(obj: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
	match first_value(obj, keys)? {
		Value::Number(number) => number.as_i64(),
		Value::String(text) => text.trim().parse().ok(),
		_ => None,
	}
}

fn first_f64(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
	match first_value(obj, keys)? {
		Value::Number(number) => number.as_f64(),
		Value::String(text) => text.trim().parse().ok(),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_original_field_names() {
		let value = serde_json::json!({
			"id_tesis": "2027001",
			"rubro": "AMPARO INDIRECTO. PROCEDENCIA.",
			"texto": "El juicio de amparo indirecto procede...",
			"epoca": "Undécima Época",
			"tipo_tesis": "Jurisprudencia",
			"instancia": "Primera Sala",
			"anio": 2023,
			"distance": 0.25
		});
		let record = normalize_record(&value).expect("record must normalize");

		assert_eq!(record.id, 2_027_001);
		assert_eq!(record.title, "AMPARO INDIRECTO. PROCEDENCIA.");
		assert_eq!(record.era, "Undécima Época");
		assert_eq!(record.court.as_deref(), Some("Primera Sala"));
		assert_eq!(record.year, Some(2023));
		assert_eq!(record.similarity, Some(0.75));
	}

	#[test]
	fn explicit_similarity_wins_over_distance() {
		let value = serde_json::json!({ "id": 7, "similarity": 1.3, "distance": 0.9 });
		let record = normalize_record(&value).expect("record must normalize");

		assert_eq!(record.similarity, Some(1.0));
	}

	#[test]
	fn drops_results_without_identity() {
		assert!(normalize_record(&serde_json::json!({ "rubro": "sin id" })).is_none());
		assert!(normalize_record(&serde_json::json!("texto suelto")).is_none());
	}

	#[test]
	fn parses_per_tool_results() {
		let json = serde_json::json!({
			"tool_calls": [
				{ "tool": "search_tesis_semantic", "results": [{ "id": 1 }, { "id": 2 }] },
				{ "tool": "find_related_tesis", "results": [{ "id_tesis": 3 }] },
				{ "tool": "explore_stats" }
			]
		});
		let outcome = parse_search_response(json).expect("parse failed");

		assert_eq!(outcome.records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
		assert_eq!(
			outcome.tools_used,
			vec![SearchTool::Semantic, SearchTool::Related, SearchTool::Stats]
		);
		assert_eq!(outcome.embedding_calls, 1);
		assert_eq!(outcome.model_calls, 0);
	}

	#[test]
	fn flat_results_default_to_semantic_search() {
		let json = serde_json::json!({
			"results": [{ "id": 10, "score": 0.8 }],
			"model_calls": 2
		});
		let outcome = parse_search_response(json).expect("parse failed");

		assert_eq!(outcome.tools_used, vec![SearchTool::Semantic]);
		assert_eq!(outcome.embedding_calls, 1);
		assert_eq!(outcome.model_calls, 2);
	}

	#[test]
	fn reported_counters_take_precedence() {
		let json = serde_json::json!({
			"results": [],
			"tools_used": ["search_tesis_semantic", "search_tesis_semantic"],
			"embedding_calls": 1
		});
		let outcome = parse_search_response(json).expect("parse failed");

		assert_eq!(outcome.tools_used.len(), 2);
		assert_eq!(outcome.embedding_calls, 1);
	}

	#[test]
	fn oversized_counters_saturate() {
		let json = serde_json::json!({
			"results": [],
			"embedding_calls": u64::from(u32::MAX) + 5,
			"model_calls": u64::MAX
		});
		let outcome = parse_search_response(json).expect("parse failed");

		assert_eq!(outcome.embedding_calls, u32::MAX);
		assert_eq!(outcome.model_calls, u32::MAX);
	}

	#[test]
	fn missing_results_is_an_error() {
		assert!(parse_search_response(serde_json::json!({ "ok": true })).is_err());
	}
}
