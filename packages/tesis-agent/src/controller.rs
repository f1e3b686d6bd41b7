//! The search, evaluate, decide loop for one user turn.

use std::{collections::HashSet, time::Duration};

use serde::{Deserialize, Serialize};

use tesis_config::Config;
use tesis_domain::{JurisprudenceRecord, RecordId, SearchOutcome, SearchRequest, query};

use crate::{
	Collaborators, Error, Result,
	cost::CallUsage,
	evaluator::{EvaluationRequest, EvaluationResult, QualityEvaluator},
	state::AgentState,
};

/// Why the loop stopped. Every variant is a normal completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitReason {
	ModelSatisfied,
	MaxIterations,
	NoNextQuery,
	RedundantQuery,
	BudgetExceeded,
}
impl ExitReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::ModelSatisfied => "model-satisfied",
			Self::MaxIterations => "max-iterations",
			Self::NoNextQuery => "no-next-query",
			Self::RedundantQuery => "redundant-query",
			Self::BudgetExceeded => "budget-exceeded",
		}
	}
}

type ExitPredicate = fn(&AgentState, &EvaluationResult, f64) -> bool;

/// Checked top to bottom after every iteration; the first match ends the loop.
pub const EXIT_RULES: [(ExitPredicate, ExitReason); 5] = [
	(|_, evaluation, _| evaluation.satisfied(), ExitReason::ModelSatisfied),
	(|state, _, _| state.iterations() >= state.max_iterations(), ExitReason::MaxIterations),
	(|_, evaluation, _| query::is_blank(evaluation.next_query()), ExitReason::NoNextQuery),
	(
		|state, evaluation, _| {
			evaluation.next_query().is_some_and(|next| state.query_history().contains(next))
		},
		ExitReason::RedundantQuery,
	),
	(|state, _, budget_usd| state.cost_usd() > budget_usd, ExitReason::BudgetExceeded),
];

pub fn check_exit(
	state: &AgentState,
	evaluation: &EvaluationResult,
	budget_usd: f64,
) -> Option<ExitReason> {
	EXIT_RULES
		.iter()
		.find(|(applies, _)| applies(state, evaluation, budget_usd))
		.map(|(_, reason)| *reason)
}

/// Caller-facing inputs for one run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
	pub user_query: String,
	/// Defaults to `user_query` when blank.
	pub initial_query: String,
	/// Falls back to `agent.max_iterations`.
	pub max_iterations: Option<u32>,
	/// Identities already shown to the user; never returned again.
	pub discovered_ids: HashSet<RecordId>,
	pub historical_results: Vec<JurisprudenceRecord>,
}

pub struct AgentController<'a> {
	cfg: &'a Config,
	collaborators: &'a Collaborators,
	state: AgentState,
}
impl<'a> AgentController<'a> {
	pub fn new(
		cfg: &'a Config,
		collaborators: &'a Collaborators,
		request: RunRequest,
	) -> Result<Self> {
		let RunRequest {
			user_query,
			initial_query,
			max_iterations,
			discovered_ids,
			historical_results,
		} = request;

		if user_query.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "user_query must be non-empty.".to_string(),
			});
		}

		let max_iterations = max_iterations.unwrap_or(cfg.agent.max_iterations);

		if max_iterations == 0 {
			return Err(Error::InvalidRequest {
				message: "max_iterations must be greater than zero.".to_string(),
			});
		}
		if max_iterations > tesis_config::MAX_ITERATIONS_CEILING {
			return Err(Error::InvalidRequest {
				message: format!(
					"max_iterations must be {} or less.",
					tesis_config::MAX_ITERATIONS_CEILING
				),
			});
		}

		let initial_query =
			if initial_query.trim().is_empty() { user_query.clone() } else { initial_query };
		let state = AgentState::new(
			user_query,
			initial_query.trim(),
			max_iterations,
			discovered_ids,
			historical_results,
		);

		Ok(Self { cfg, collaborators, state })
	}

	pub fn state(&self) -> &AgentState {
		&self.state
	}

	/// Runs iterations until an exit rule fires and hands back the terminal state.
	pub async fn run(mut self) -> AgentState {
		while !self.state.is_finished() {
			self.step().await;
		}

		tracing::info!(
			exit_reason = self.state.exit_reason().map(ExitReason::as_str).unwrap_or_default(),
			iterations = self.state.iterations(),
			results = self.state.all_results().len(),
			cost_usd = self.state.cost_usd(),
			embedding_calls = self.state.embedding_calls(),
			model_calls = self.state.model_calls(),
			"Agent loop finished."
		);

		self.state
	}

	/// One iteration. Leaves the state either finished or pointed at the next query.
	async fn step(&mut self) {
		let iteration = self.state.iterations();
		let query = self.state.current_query().to_string();

		tracing::info!(iteration, query = %query, "Searching.");

		let SearchOutcome { records, tools_used, embedding_calls, model_calls } =
			self.search(&query).await;

		self.record_usage(CallUsage { embedding_calls, model_calls });

		let raw = records.len();
		let fresh = self.state.update_results(records, tools_used);

		tracing::info!(iteration, raw, fresh, "Filtered search results.");

		let evaluation = {
			let evaluator = QualityEvaluator::new(self.cfg, self.collaborators.model.as_ref());
			let request = EvaluationRequest {
				user_query: self.state.user_query(),
				current_query: &query,
				results: self.state.current_results(),
				iteration_index: iteration,
				max_iterations: self.state.max_iterations(),
				query_history: self.state.query_history().entries(),
				tools_used: self.state.tools_used(),
			};

			evaluator.evaluate(&request).await
		};

		if evaluation.model_called {
			self.record_usage(CallUsage::model(1));
		}

		tracing::info!(
			iteration,
			decision = evaluation.result.decision().as_str(),
			satisfied = evaluation.result.satisfied(),
			confidence = evaluation.result.confidence(),
			model_called = evaluation.model_called,
			cost_usd = self.state.cost_usd(),
			"Evaluated results."
		);

		let next_query = evaluation.result.next_query().map(str::to_string);

		self.state.update_evaluation(evaluation.result);
		self.state.increment_iteration();

		let exit = self
			.state
			.last_evaluation()
			.and_then(|result| check_exit(&self.state, result, self.cfg.agent.budget_usd));

		if let Some(reason) = exit {
			tracing::info!(iteration, exit_reason = reason.as_str(), "Stopping.");

			self.state.set_exit_reason(reason);

			return;
		}

		if let Some(next) = next_query {
			self.state.push_query(&next);
			self.state.set_current_query(next);
		}
	}

	/// Failures and timeouts count as an empty iteration.
	async fn search(&self, query: &str) -> SearchOutcome {
		let request = SearchRequest {
			query: query.to_string(),
			exclude_ids: self.state.discovered_ids().iter().copied().collect(),
			limit: self.cfg.providers.search.result_limit,
		};
		let timeout_ms = self.cfg.agent.search_timeout_ms;
		let result = tokio::time::timeout(
			Duration::from_millis(timeout_ms),
			self.collaborators.search.search(&self.cfg.providers.search, &request),
		)
		.await
		.map_err(|_| Error::Timeout { operation: "Search", timeout_ms })
		.and_then(|inner| inner);

		match result {
			Ok(outcome) => outcome,
			Err(err) => {
				tracing::warn!(error = %err, query, "Search failed; treating iteration as empty.");

				SearchOutcome::default()
			},
		}
	}

	fn record_usage(&mut self, usage: CallUsage) {
		if usage.is_empty() {
			return;
		}

		let cost = self.collaborators.cost.estimate(&self.cfg.cost, usage);

		self.state.record_usage(usage, cost);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::evaluator::Decision;

	fn state_after_iterations(max: u32, done: u32) -> AgentState {
		let mut state = AgentState::new("amparo", "amparo indirecto", max, [], Vec::new());

		for _ in 0..done {
			state.increment_iteration();
		}

		state
	}

	fn refine(next: &str) -> EvaluationResult {
		EvaluationResult::new(false, Decision::Refine, "", Some(next.to_string()), 0.5)
	}

	#[test]
	fn satisfied_outranks_max_iterations() {
		let state = state_after_iterations(1, 1);
		let evaluation = EvaluationResult::accept("", 0.9);

		assert_eq!(check_exit(&state, &evaluation, 0.5), Some(ExitReason::ModelSatisfied));
	}

	#[test]
	fn max_iterations_outranks_missing_query() {
		let state = state_after_iterations(2, 2);
		let evaluation = EvaluationResult::new(false, Decision::Broaden, "", None, 0.3);

		assert_eq!(check_exit(&state, &evaluation, 0.5), Some(ExitReason::MaxIterations));
	}

	#[test]
	fn missing_query_outranks_budget() {
		let mut state = state_after_iterations(3, 1);

		state.record_usage(CallUsage::model(1), 10.0);

		let evaluation = EvaluationResult::new(false, Decision::Broaden, "", None, 0.3);

		assert_eq!(check_exit(&state, &evaluation, 0.5), Some(ExitReason::NoNextQuery));
	}

	#[test]
	fn redundant_query_ignores_case_and_surrounding_whitespace() {
		let state = state_after_iterations(3, 1);

		assert_eq!(
			check_exit(&state, &refine("  Amparo INDIRECTO "), 0.5),
			Some(ExitReason::RedundantQuery)
		);
		assert_eq!(check_exit(&state, &refine("amparo   indirecto"), 0.5), None);
		assert_eq!(check_exit(&state, &refine("amparo directo"), 0.5), None);
	}

	#[test]
	fn budget_must_be_strictly_exceeded() {
		let mut state = state_after_iterations(5, 1);

		state.record_usage(CallUsage::model(1), 0.5);

		assert_eq!(check_exit(&state, &refine("otra"), 0.5), None);

		state.record_usage(CallUsage::model(1), 0.01);

		assert_eq!(check_exit(&state, &refine("otra"), 0.5), Some(ExitReason::BudgetExceeded));
	}

	#[test]
	fn exit_reasons_serialize_kebab_case() {
		for (_, reason) in EXIT_RULES {
			let json = serde_json::to_value(reason).expect("Failed to serialize exit reason.");

			assert_eq!(json, serde_json::Value::String(reason.as_str().to_string()));
		}
	}
}
