mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agent, Config, Cost, Evaluator, History, Intent, LlmProviderConfig, Providers,
	SearchProviderConfig, Service, SimilarityThreshold,
};

use std::{fs, path::Path};

/// Upper bound for `agent.max_iterations` and per-run overrides.
pub const MAX_ITERATIONS_CEILING: u32 = 10;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::Read { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::Parse { path: path.to_path_buf(), source: Box::new(err) })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(invalid("service.log_level", "must be non-empty."));
	}
	if cfg.agent.max_iterations == 0 {
		return Err(invalid("agent.max_iterations", "must be greater than zero."));
	}
	if cfg.agent.max_iterations > MAX_ITERATIONS_CEILING {
		return Err(invalid(
			"agent.max_iterations",
			format!("must be {MAX_ITERATIONS_CEILING} or less."),
		));
	}
	if !cfg.agent.budget_usd.is_finite() {
		return Err(invalid("agent.budget_usd", "must be a finite number."));
	}
	if cfg.agent.budget_usd <= 0.0 {
		return Err(invalid("agent.budget_usd", "must be greater than zero."));
	}
	if cfg.agent.search_timeout_ms == 0 {
		return Err(invalid("agent.search_timeout_ms", "must be greater than zero."));
	}
	if cfg.agent.model_timeout_ms == 0 {
		return Err(invalid("agent.model_timeout_ms", "must be greater than zero."));
	}
	if cfg.evaluator.thresholds.is_empty() {
		return Err(invalid("evaluator.thresholds", "must be non-empty."));
	}

	for threshold in &cfg.evaluator.thresholds {
		if threshold.min_count == 0 {
			return Err(invalid("evaluator.thresholds.min_count", "must be greater than zero."));
		}
		if !threshold.min_similarity.is_finite() {
			return Err(invalid("evaluator.thresholds.min_similarity", "must be a finite number."));
		}
		if !(0.0..=1.0).contains(&threshold.min_similarity) {
			return Err(invalid(
				"evaluator.thresholds.min_similarity",
				"must be in the range 0.0-1.0.",
			));
		}
	}

	if cfg.evaluator.fallback_min_results == 0 {
		return Err(invalid("evaluator.fallback_min_results", "must be greater than zero."));
	}

	for (label, value) in [
		("evaluator.empty_confidence", cfg.evaluator.empty_confidence),
		("evaluator.threshold_confidence", cfg.evaluator.threshold_confidence),
		("evaluator.last_iteration_confidence", cfg.evaluator.last_iteration_confidence),
		("evaluator.fallback_confidence", cfg.evaluator.fallback_confidence),
	] {
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(invalid(label, "must be in the range 0.0-1.0."));
		}
	}
	for (label, value) in [
		("cost.embedding_per_1k_tokens", cfg.cost.embedding_per_1k_tokens),
		("cost.llm_input_per_1k_tokens", cfg.cost.llm_input_per_1k_tokens),
		("cost.llm_output_per_1k_tokens", cfg.cost.llm_output_per_1k_tokens),
	] {
		if !value.is_finite() {
			return Err(invalid(label, "must be a finite number."));
		}
		if value < 0.0 {
			return Err(invalid(label, "must be zero or greater."));
		}
	}

	if cfg.history.window == 0 {
		return Err(invalid("history.window", "must be greater than zero."));
	}
	if cfg.history.max_historical_sources == 0 {
		return Err(invalid("history.max_historical_sources", "must be greater than zero."));
	}
	if cfg.history.max_merged_sources == 0 {
		return Err(invalid("history.max_merged_sources", "must be greater than zero."));
	}
	if cfg.providers.search.result_limit == 0 {
		return Err(invalid("providers.search.result_limit", "must be greater than zero."));
	}
	if !cfg.providers.llm.temperature.is_finite() || cfg.providers.llm.temperature < 0.0 {
		return Err(invalid("providers.llm.temperature", "must be finite and zero or greater."));
	}

	for (label, value) in [
		("providers.llm.api_key", &cfg.providers.llm.api_key),
		("providers.llm.api_base", &cfg.providers.llm.api_base),
		("providers.search.api_key", &cfg.providers.search.api_key),
		("providers.search.api_base", &cfg.providers.search.api_base),
	] {
		if value.trim().is_empty() {
			return Err(invalid(label, "must be non-empty."));
		}
	}

	Ok(())
}

fn invalid(key: &'static str, reason: impl Into<String>) -> Error {
	Error::Invalid { key, reason: reason.into() }
}

fn normalize(cfg: &mut Config) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();
	cfg.providers.llm.api_base = cfg.providers.llm.api_base.trim_end_matches('/').to_string();
	cfg.providers.search.api_base =
		cfg.providers.search.api_base.trim_end_matches('/').to_string();
}
