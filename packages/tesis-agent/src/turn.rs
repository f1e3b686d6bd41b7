//! Plans one conversational turn: reuse what was already shown, or search again.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use tesis_config::Config;
use tesis_domain::{
	JurisprudenceRecord, Turn, conversation,
	intent::{self, Intent},
	rerank, sources, text,
};

use crate::{
	Collaborators, Error, ModelProvider, Result,
	controller::{AgentController, RunRequest},
	cost::CallUsage,
	state::AgentState,
};

const PLANNING_TURNS: usize = 4;
const PLANNING_TURN_CHARS: usize = 100;
const INTENT_PROMPT: &str = "Clasifica la nueva pregunta del usuario en una conversación sobre \
jurisprudencia mexicana. REUSE: pide explicar, detallar o profundizar lo ya mostrado. NEW_SEARCH: \
pide criterios, tesis o temas distintos. Responde solo con JSON: {\"intent\": \"REUSE\"} o \
{\"intent\": \"NEW_SEARCH\"}.";
const REWRITE_PROMPT: &str = "Reescribe la pregunta del usuario como una consulta de búsqueda \
autónoma sobre jurisprudencia mexicana, resolviendo referencias a la conversación previa. Usa \
términos jurídicos precisos. Responde solo con JSON: {\"query\": \"...\"}.";

#[derive(Debug, Clone, Copy)]
pub struct TurnRequest<'a> {
	pub question: &'a str,
	/// Prior turns, oldest first.
	pub history: &'a [Turn],
	pub max_iterations: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
	pub intent: Intent,
	/// Query the loop started from; `None` when no search ran.
	pub search_query: Option<String>,
	pub state: Option<AgentState>,
	/// Sources to answer from, capped at `history.max_merged_sources`.
	pub sources: Vec<JurisprudenceRecord>,
	pub planning_model_calls: u32,
	pub planning_cost_usd: f64,
}
impl TurnOutcome {
	pub fn total_cost_usd(&self) -> f64 {
		self.planning_cost_usd + self.state.as_ref().map(AgentState::cost_usd).unwrap_or_default()
	}
}

pub async fn run_turn(
	cfg: &Config,
	collaborators: &Collaborators,
	request: TurnRequest<'_>,
) -> Result<TurnOutcome> {
	let question = request.question.trim();

	if question.is_empty() {
		return Err(Error::InvalidRequest { message: "question must be non-empty.".to_string() });
	}

	let history = conversation::recent(request.history, cfg.history.window as usize);
	let discovered_ids = sources::discussed_ids(history);
	let historical =
		sources::historical_sources(history, cfg.history.max_historical_sources as usize);
	let max_merged = cfg.history.max_merged_sources as usize;
	let model = collaborators.model.as_ref();
	let mut planning_model_calls = 0;
	let (mut intent, asked) = classify_intent(cfg, model, question, history).await;

	planning_model_calls += u32::from(asked);

	if intent == Intent::Reuse && historical.is_empty() {
		tracing::info!("No earlier sources to reuse; searching instead.");

		intent = Intent::NewSearch;
	}

	tracing::info!(intent = intent.as_str(), model_called = asked, "Classified turn intent.");

	if intent == Intent::Reuse {
		let sources = sources::merge(&[], &historical, max_merged);

		return Ok(TurnOutcome {
			intent,
			search_query: None,
			state: None,
			sources,
			planning_model_calls,
			planning_cost_usd: planning_cost(cfg, collaborators, planning_model_calls),
		});
	}

	let search_query = if !history.is_empty() && cfg.intent.rewrite_follow_ups {
		let (rewritten, asked) = rewrite_query(cfg, model, question, history).await;

		planning_model_calls += u32::from(asked);

		rewritten
	} else {
		question.to_string()
	};
	let controller = AgentController::new(
		cfg,
		collaborators,
		RunRequest {
			user_query: question.to_string(),
			initial_query: search_query.clone(),
			max_iterations: request.max_iterations,
			discovered_ids,
			historical_results: historical.clone(),
		},
	)?;
	let state = controller.run().await;
	let sources = sources::merge(&rerank::rerank(state.all_results()), &historical, max_merged);

	Ok(TurnOutcome {
		intent,
		search_query: Some(search_query),
		state: Some(state),
		sources,
		planning_model_calls,
		planning_cost_usd: planning_cost(cfg, collaborators, planning_model_calls),
	})
}

/// Returns the intent and whether the model was asked.
pub async fn classify_intent(
	cfg: &Config,
	model: &dyn ModelProvider,
	question: &str,
	history: &[Turn],
) -> (Intent, bool) {
	if let Some(intent) =
		intent::classify_heuristic(question, history, cfg.intent.short_query_chars as usize)
	{
		return (intent, false);
	}
	if !cfg.intent.llm_fallback {
		return (Intent::NewSearch, false);
	}

	let intent = match ask_model(cfg, model, INTENT_PROMPT, question, history).await {
		Ok(reply) => match reply.get("intent").and_then(Value::as_str) {
			Some(label) => Intent::from_label(label),
			None => {
				tracing::warn!("Intent reply is missing the intent label.");

				Intent::NewSearch
			},
		},
		Err(err) => {
			tracing::warn!(error = %err, "Intent classification failed; searching again.");

			Intent::NewSearch
		},
	};

	(intent, true)
}

/// Turns a context-dependent follow-up into a standalone query. Falls back to the question.
pub async fn rewrite_query(
	cfg: &Config,
	model: &dyn ModelProvider,
	question: &str,
	history: &[Turn],
) -> (String, bool) {
	let rewritten = match ask_model(cfg, model, REWRITE_PROMPT, question, history).await {
		Ok(reply) => reply
			.get("query")
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|query| !query.is_empty())
			.map(str::to_string),
		Err(err) => {
			tracing::warn!(error = %err, "Query rewrite failed; using the question as is.");

			None
		},
	};

	match rewritten {
		Some(query) => {
			tracing::debug!(query = %query, "Rewrote follow-up.");

			(query, true)
		},
		None => (question.to_string(), true),
	}
}

async fn ask_model(
	cfg: &Config,
	model: &dyn ModelProvider,
	instructions: &str,
	question: &str,
	history: &[Turn],
) -> Result<Value> {
	let messages = vec![
		serde_json::json!({ "role": "system", "content": instructions }),
		serde_json::json!({
			"role": "user",
			"content": format!(
				"CONVERSACIÓN RECIENTE:\n{}\n\nNUEVA PREGUNTA: \"{question}\"",
				format_recent_turns(history)
			),
		}),
	];
	let timeout_ms = cfg.agent.model_timeout_ms;

	tokio::time::timeout(
		Duration::from_millis(timeout_ms),
		model.complete(&cfg.providers.llm, &messages),
	)
	.await
	.map_err(|_| Error::Timeout { operation: "Planning model call", timeout_ms })?
}

fn format_recent_turns(history: &[Turn]) -> String {
	conversation::recent(history, PLANNING_TURNS)
		.iter()
		.map(|turn| {
			let role = match turn.role {
				conversation::Role::User => "Usuario",
				conversation::Role::Assistant => "Asistente",
			};

			format!("{role}: {}", text::preview(&turn.content, PLANNING_TURN_CHARS))
		})
		.collect::<Vec<_>>()
		.join("\n")
}

fn planning_cost(cfg: &Config, collaborators: &Collaborators, model_calls: u32) -> f64 {
	if model_calls == 0 {
		return 0.0;
	}

	collaborators.cost.estimate(&cfg.cost, CallUsage::model(model_calls))
}
