use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	#[serde(default)]
	pub agent: Agent,
	#[serde(default)]
	pub evaluator: Evaluator,
	#[serde(default)]
	pub cost: Cost,
	#[serde(default)]
	pub history: History,
	#[serde(default)]
	pub intent: Intent,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub llm: LlmProviderConfig,
	pub search: SearchProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default = "default_result_limit")]
	pub result_limit: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Loop limits for one user turn.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Agent {
	pub max_iterations: u32,
	/// Hard ceiling on the estimated spend of a single turn, in USD.
	pub budget_usd: f64,
	pub search_timeout_ms: u64,
	pub model_timeout_ms: u64,
}
impl Default for Agent {
	fn default() -> Self {
		Self {
			max_iterations: 3,
			budget_usd: 0.50,
			search_timeout_ms: 30_000,
			model_timeout_ms: 30_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Evaluator {
	/// Any rule that holds marks the result set as sufficient without a model call.
	pub thresholds: Vec<SimilarityThreshold>,
	pub fallback_min_results: u32,
	pub empty_confidence: f32,
	pub threshold_confidence: f32,
	pub last_iteration_confidence: f32,
	pub fallback_confidence: f32,
}
impl Default for Evaluator {
	fn default() -> Self {
		Self {
			thresholds: vec![
				SimilarityThreshold { min_count: 2, min_similarity: 0.70 },
				SimilarityThreshold { min_count: 3, min_similarity: 0.65 },
				SimilarityThreshold { min_count: 5, min_similarity: 0.60 },
			],
			fallback_min_results: 5,
			empty_confidence: 0.2,
			threshold_confidence: 0.9,
			last_iteration_confidence: 0.6,
			fallback_confidence: 0.3,
		}
	}
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SimilarityThreshold {
	pub min_count: u32,
	pub min_similarity: f32,
}

/// Average-token price model. Prices are USD per 1K tokens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cost {
	pub embedding_per_1k_tokens: f64,
	pub llm_input_per_1k_tokens: f64,
	pub llm_output_per_1k_tokens: f64,
	pub avg_embedding_tokens: u32,
	pub avg_llm_input_tokens: u32,
	pub avg_llm_output_tokens: u32,
}
impl Default for Cost {
	fn default() -> Self {
		Self {
			embedding_per_1k_tokens: 0.000_02,
			llm_input_per_1k_tokens: 0.000_15,
			llm_output_per_1k_tokens: 0.000_6,
			avg_embedding_tokens: 20,
			avg_llm_input_tokens: 1_000,
			avg_llm_output_tokens: 500,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct History {
	/// Number of most recent turns considered.
	pub window: u32,
	pub max_historical_sources: u32,
	pub max_merged_sources: u32,
}
impl Default for History {
	fn default() -> Self {
		Self { window: 16, max_historical_sources: 15, max_merged_sources: 10 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Intent {
	pub llm_fallback: bool,
	pub rewrite_follow_ups: bool,
	pub short_query_chars: u32,
}
impl Default for Intent {
	fn default() -> Self {
		Self { llm_fallback: true, rewrite_follow_ups: true, short_query_chars: 40 }
	}
}

fn default_result_limit() -> u32 {
	10
}
