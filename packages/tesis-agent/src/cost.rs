//! Synthetic spend estimate built from call counts and average token sizes.
//!
//! The numbers approximate billing; they are never reconciled against real usage.

use serde::Serialize;

use tesis_config::Cost;

use crate::CostEstimator;

/// Calls incurred by one step of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallUsage {
	pub embedding_calls: u32,
	pub model_calls: u32,
}
impl CallUsage {
	pub fn model(calls: u32) -> Self {
		Self { embedding_calls: 0, model_calls: calls }
	}

	pub fn is_empty(&self) -> bool {
		self.embedding_calls == 0 && self.model_calls == 0
	}
}

/// Prices every embedding and model call at the configured average token counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageTokenCost;
impl CostEstimator for AverageTokenCost {
	fn estimate(&self, cfg: &Cost, usage: CallUsage) -> f64 {
		let embedding = per_call(cfg.avg_embedding_tokens, cfg.embedding_per_1k_tokens);
		let model = per_call(cfg.avg_llm_input_tokens, cfg.llm_input_per_1k_tokens)
			+ per_call(cfg.avg_llm_output_tokens, cfg.llm_output_per_1k_tokens);

		f64::from(usage.embedding_calls) * embedding + f64::from(usage.model_calls) * model
	}
}

fn per_call(avg_tokens: u32, price_per_1k: f64) -> f64 {
	f64::from(avg_tokens) / 1_000.0 * price_per_1k
}
