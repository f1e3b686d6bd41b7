pub mod controller;
pub mod cost;
pub mod evaluator;
pub mod state;
pub mod turn;

mod error;

pub use controller::{AgentController, ExitReason, RunRequest};
pub use cost::{AverageTokenCost, CallUsage};
pub use error::{Error, Result};
pub use evaluator::{Decision, Evaluation, EvaluationRequest, EvaluationResult, QualityEvaluator};
pub use state::AgentState;
pub use turn::{TurnOutcome, TurnRequest, run_turn};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use tesis_config::{Cost, LlmProviderConfig, SearchProviderConfig};
use tesis_domain::{SearchOutcome, SearchRequest};
use tesis_providers::{llm, search};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Retrieval backend queried once per iteration.
///
/// One call may fan out into several tool invocations; the controller only sees the combined
/// outcome.
pub trait SearchCapability
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		request: &'a SearchRequest,
	) -> BoxFuture<'a, Result<SearchOutcome>>;
}

/// Chat model that answers with a single JSON object.
pub trait ModelProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<Value>>;
}

/// Prices a batch of calls in USD.
pub trait CostEstimator
where
	Self: Send + Sync,
{
	fn estimate(&self, cfg: &Cost, usage: CallUsage) -> f64;
}

#[derive(Clone)]
pub struct Collaborators {
	pub search: Arc<dyn SearchCapability>,
	pub model: Arc<dyn ModelProvider>,
	pub cost: Arc<dyn CostEstimator>,
}
impl Collaborators {
	pub fn new(
		search: Arc<dyn SearchCapability>,
		model: Arc<dyn ModelProvider>,
		cost: Arc<dyn CostEstimator>,
	) -> Self {
		Self { search, model, cost }
	}
}
impl Default for Collaborators {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { search: provider.clone(), model: provider, cost: Arc::new(AverageTokenCost) }
	}
}

struct DefaultProviders;
impl SearchCapability for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		request: &'a SearchRequest,
	) -> BoxFuture<'a, Result<SearchOutcome>> {
		Box::pin(async move { Ok(search::search(cfg, request).await?) })
	}
}
impl ModelProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move { Ok(llm::complete(cfg, messages).await?) })
	}
}
