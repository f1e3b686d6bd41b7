use std::collections::BTreeSet;

use serde::Serialize;

use tesis_domain::{JurisprudenceRecord, RecordId, SearchTool, query::QueryHistory, rerank};

use crate::{controller::ExitReason, cost::CallUsage, evaluator::EvaluationResult};

/// Bookkeeping for one user turn.
///
/// Only the controller mutates it. Callers get it back by value once the loop ends and can read
/// it, but every field stays private so the discovered set and counters cannot be rewritten.
#[derive(Debug, Clone, Serialize)]
pub struct AgentState {
	user_query: String,
	current_query: String,
	iterations: u32,
	max_iterations: u32,
	query_history: QueryHistory,
	discovered_ids: BTreeSet<RecordId>,
	tools_used: Vec<SearchTool>,
	current_results: Vec<JurisprudenceRecord>,
	all_results: Vec<JurisprudenceRecord>,
	historical_results: Vec<JurisprudenceRecord>,
	cost_usd: f64,
	embedding_calls: u32,
	model_calls: u32,
	last_evaluation: Option<EvaluationResult>,
	exit_reason: Option<ExitReason>,
}
impl AgentState {
	/// Starts a turn with `initial_query` already recorded in the query history.
	pub fn new(
		user_query: impl Into<String>,
		initial_query: impl Into<String>,
		max_iterations: u32,
		discovered_ids: impl IntoIterator<Item = RecordId>,
		historical_results: Vec<JurisprudenceRecord>,
	) -> Self {
		let current_query = initial_query.into();
		let mut query_history = QueryHistory::default();

		query_history.push(&current_query);

		Self {
			user_query: user_query.into(),
			current_query,
			iterations: 0,
			max_iterations,
			query_history,
			discovered_ids: discovered_ids.into_iter().collect(),
			tools_used: Vec::new(),
			current_results: Vec::new(),
			all_results: Vec::new(),
			historical_results,
			cost_usd: 0.0,
			embedding_calls: 0,
			model_calls: 0,
			last_evaluation: None,
			exit_reason: None,
		}
	}

	pub fn user_query(&self) -> &str {
		&self.user_query
	}

	pub fn current_query(&self) -> &str {
		&self.current_query
	}

	/// Completed iterations.
	pub fn iterations(&self) -> u32 {
		self.iterations
	}

	pub fn max_iterations(&self) -> u32 {
		self.max_iterations
	}

	pub fn query_history(&self) -> &QueryHistory {
		&self.query_history
	}

	pub fn discovered_ids(&self) -> &BTreeSet<RecordId> {
		&self.discovered_ids
	}

	/// Tools the search capability reported for the latest iteration.
	pub fn tools_used(&self) -> &[SearchTool] {
		&self.tools_used
	}

	/// Fresh, reranked results of the latest iteration.
	pub fn current_results(&self) -> &[JurisprudenceRecord] {
		&self.current_results
	}

	/// Every fresh result of this run, in discovery order.
	pub fn all_results(&self) -> &[JurisprudenceRecord] {
		&self.all_results
	}

	pub fn historical_results(&self) -> &[JurisprudenceRecord] {
		&self.historical_results
	}

	pub fn cost_usd(&self) -> f64 {
		self.cost_usd
	}

	pub fn embedding_calls(&self) -> u32 {
		self.embedding_calls
	}

	pub fn model_calls(&self) -> u32 {
		self.model_calls
	}

	pub fn last_evaluation(&self) -> Option<&EvaluationResult> {
		self.last_evaluation.as_ref()
	}

	pub fn exit_reason(&self) -> Option<ExitReason> {
		self.exit_reason
	}

	pub fn is_finished(&self) -> bool {
		self.exit_reason.is_some()
	}

	pub(crate) fn push_query(&mut self, query: &str) -> bool {
		self.query_history.push(query)
	}

	pub(crate) fn set_current_query(&mut self, query: impl Into<String>) {
		self.current_query = query.into();
	}

	pub(crate) fn increment_iteration(&mut self) {
		self.iterations += 1;
	}

	pub(crate) fn record_usage(&mut self, usage: CallUsage, cost_usd: f64) {
		self.embedding_calls += usage.embedding_calls;
		self.model_calls += usage.model_calls;

		if cost_usd.is_finite() && cost_usd > 0.0 {
			self.cost_usd += cost_usd;
		}
	}

	/// Drops every record whose identity was already surfaced, including repeats inside
	/// `raw`, and registers the survivors as discovered. Returns how many survived.
	pub(crate) fn update_results(
		&mut self,
		raw: Vec<JurisprudenceRecord>,
		tools_used: Vec<SearchTool>,
	) -> usize {
		let fresh: Vec<JurisprudenceRecord> =
			raw.into_iter().filter(|record| self.discovered_ids.insert(record.id)).collect();

		self.all_results.extend(fresh.iter().cloned());
		self.current_results = rerank::rerank(&fresh);
		self.tools_used = tools_used;

		fresh.len()
	}

	pub(crate) fn update_evaluation(&mut self, evaluation: EvaluationResult) {
		self.last_evaluation = Some(evaluation);
	}

	/// Terminal. The first reason written wins.
	pub(crate) fn set_exit_reason(&mut self, reason: ExitReason) -> bool {
		if let Some(existing) = self.exit_reason {
			tracing::warn!(
				existing = existing.as_str(),
				ignored = reason.as_str(),
				"Exit reason already set."
			);

			return false;
		}

		self.exit_reason = Some(reason);

		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(id: RecordId) -> JurisprudenceRecord {
		JurisprudenceRecord::new(id, format!("Rubro {id}"))
	}

	fn ids(records: &[JurisprudenceRecord]) -> Vec<RecordId> {
		records.iter().map(|record| record.id).collect()
	}

	#[test]
	fn initial_query_is_recorded() {
		let state = AgentState::new("¿Qué es el amparo?", "Amparo Indirecto", 3, [], Vec::new());

		assert_eq!(state.query_history().entries(), ["amparo indirecto"]);
		assert_eq!(state.iterations(), 0);
		assert!(!state.is_finished());
	}

	#[test]
	fn discovered_identities_are_never_surfaced_again() {
		let mut state = AgentState::new("q", "q", 3, [7], Vec::new());

		let fresh = state.update_results(vec![record(1), record(7), record(2), record(1)], vec![]);

		assert_eq!(fresh, 2);
		assert_eq!(ids(state.current_results()).len(), 2);

		let before = state.discovered_ids().clone();

		assert_eq!(state.update_results(vec![record(2), record(3)], vec![SearchTool::Related]), 1);
		assert_eq!(ids(state.current_results()), vec![3]);
		assert!(before.is_subset(state.discovered_ids()));
		assert_eq!(ids(state.all_results()), vec![1, 2, 3]);
		assert_eq!(state.tools_used(), [SearchTool::Related]);
	}

	#[test]
	fn query_history_rejects_normalized_duplicates() {
		let mut state = AgentState::new("q", "amparo indirecto", 3, [], Vec::new());

		assert!(!state.push_query("  AMPARO indirecto"));
		assert!(state.push_query("suspensión del acto reclamado"));
		assert_eq!(state.query_history().len(), 2);
	}

	#[test]
	fn cost_only_grows() {
		let mut state = AgentState::new("q", "q", 3, [], Vec::new());

		state.record_usage(CallUsage { embedding_calls: 1, model_calls: 0 }, 0.1);
		state.record_usage(CallUsage::model(1), -5.0);
		state.record_usage(CallUsage::default(), f64::NAN);

		assert!((state.cost_usd() - 0.1).abs() < 1e-12);
		assert_eq!(state.embedding_calls(), 1);
		assert_eq!(state.model_calls(), 1);
	}

	#[test]
	fn exit_reason_is_written_once() {
		let mut state = AgentState::new("q", "q", 3, [], Vec::new());

		assert!(state.set_exit_reason(ExitReason::NoNextQuery));
		assert!(!state.set_exit_reason(ExitReason::BudgetExceeded));
		assert_eq!(state.exit_reason(), Some(ExitReason::NoNextQuery));
	}
}
