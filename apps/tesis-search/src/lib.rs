use std::{
	fs,
	path::{Path, PathBuf},
	time::Instant,
};

use clap::{
	Parser,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};
use color_eyre::eyre;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use tesis_agent::{Collaborators, EvaluationResult, ExitReason, TurnOutcome, TurnRequest};
use tesis_domain::{Intent, JurisprudenceRecord, Turn};

pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

const AFTER_HELP: &str = "The report is printed to stdout as JSON. Logs go to stderr, filtered by \
`service.log_level` in the config file.";

#[derive(Debug, Parser)]
#[command(
	version = VERSION,
	rename_all = "kebab",
	styles = styles(),
	after_help = AFTER_HELP,
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'q', value_name = "TEXT")]
	pub query: String,
	/// JSON array of prior turns (`role`, `content`, `sources`).
	#[arg(long, value_name = "FILE")]
	pub history: Option<PathBuf>,
	#[arg(
		long,
		value_name = "N",
		value_parser = clap::value_parser!(u32)
			.range(1..=i64::from(tesis_config::MAX_ITERATIONS_CEILING)),
	)]
	pub max_iterations: Option<u32>,
}

#[derive(Debug, Serialize)]
struct TurnReport {
	run_id: Uuid,
	question: String,
	intent: Intent,
	search_query: Option<String>,
	exit_reason: Option<ExitReason>,
	iterations: u32,
	cost_usd: f64,
	embedding_calls: u32,
	model_calls: u32,
	elapsed_ms: f64,
	last_evaluation: Option<EvaluationResult>,
	query_history: Vec<String>,
	sources: Vec<SourceReport>,
}

#[derive(Debug, Serialize)]
struct SourceReport {
	id: i64,
	title: String,
	era: String,
	document_type: String,
	institution: Option<String>,
	year: Option<i32>,
	similarity: Option<f32>,
	rank_score: Option<f64>,
}
impl From<&JurisprudenceRecord> for SourceReport {
	fn from(record: &JurisprudenceRecord) -> Self {
		Self {
			id: record.id,
			title: record.title.clone(),
			era: record.era.clone(),
			document_type: record.document_type.clone(),
			institution: record.institution().map(str::to_string),
			year: record.year,
			similarity: record.similarity,
			rank_score: record.rank_score,
		}
	}
}

fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Yellow.on_default() | Effects::BOLD)
		.usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
		.literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
		.error(AnsiColor::Red.on_default() | Effects::BOLD)
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let cfg = tesis_config::load(&args.config)?;
	let filter = EnvFilter::new(cfg.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let history = match &args.history {
		Some(path) => load_history(path)?,
		None => Vec::new(),
	};
	let collaborators = Collaborators::default();
	let run_id = Uuid::new_v4();
	let started = Instant::now();

	tracing::info!(%run_id, history_turns = history.len(), "Starting turn.");

	let outcome = tesis_agent::run_turn(
		&cfg,
		&collaborators,
		TurnRequest {
			question: &args.query,
			history: &history,
			max_iterations: args.max_iterations,
		},
	)
	.await?;
	let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
	let report = build_report(run_id, &args.query, outcome, elapsed_ms);
	let json = serde_json::to_string_pretty(&report)?;

	println!("{json}");

	Ok(())
}

fn load_history(path: &Path) -> color_eyre::Result<Vec<Turn>> {
	let raw = fs::read_to_string(path)
		.map_err(|err| eyre::eyre!("Failed to read history file {}: {err}", path.display()))?;
	let turns: Vec<Turn> = serde_json::from_str(&raw)?;

	Ok(turns)
}

fn build_report(
	run_id: Uuid,
	question: &str,
	outcome: TurnOutcome,
	elapsed_ms: f64,
) -> TurnReport {
	let cost_usd = outcome.total_cost_usd();
	let sources = outcome.sources.iter().map(SourceReport::from).collect();
	let mut report = TurnReport {
		run_id,
		question: question.to_string(),
		intent: outcome.intent,
		search_query: outcome.search_query,
		exit_reason: None,
		iterations: 0,
		cost_usd,
		embedding_calls: 0,
		model_calls: outcome.planning_model_calls,
		elapsed_ms,
		last_evaluation: None,
		query_history: Vec::new(),
		sources,
	};

	if let Some(state) = outcome.state {
		report.exit_reason = state.exit_reason();
		report.iterations = state.iterations();
		report.embedding_calls = state.embedding_calls();
		report.model_calls += state.model_calls();
		report.last_evaluation = state.last_evaluation().cloned();
		report.query_history = state.query_history().entries().to_vec();
	}

	report
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reuse_turn_reports_planning_calls_only() {
		let mut source = JurisprudenceRecord::new(2_027_001, "AMPARO INDIRECTO. PROCEDENCIA.");

		source.court = None;
		source.issuing_body = Some("Segunda Sala".to_string());

		let outcome = TurnOutcome {
			intent: Intent::Reuse,
			search_query: None,
			state: None,
			sources: vec![source],
			planning_model_calls: 1,
			planning_cost_usd: 0.00045,
		};
		let report = build_report(Uuid::new_v4(), "¿Y eso qué implica?", outcome, 12.0);
		let json = serde_json::to_value(&report).expect("Failed to serialize report.");

		assert_eq!(json["intent"], "REUSE");
		assert_eq!(json["exit_reason"], serde_json::Value::Null);
		assert_eq!(json["model_calls"], 1);
		assert_eq!(json["sources"][0]["institution"], "Segunda Sala");
		assert!((report.cost_usd - 0.00045).abs() < 1e-12);
	}

	#[test]
	fn args_use_kebab_case_flags() {
		let args = Args::try_parse_from([
			"tesis-search",
			"--config",
			"tesis.toml",
			"--query",
			"suspensión definitiva",
			"--max-iterations",
			"4",
		])
		.expect("Failed to parse args.");

		assert_eq!(args.max_iterations, Some(4));
		assert!(args.history.is_none());
	}

	#[test]
	fn max_iterations_flag_is_bounded() {
		for value in ["0", "11"] {
			let parsed = Args::try_parse_from([
				"tesis-search",
				"--config",
				"tesis.toml",
				"--query",
				"amparo",
				"--max-iterations",
				value,
			]);

			assert!(parsed.is_err(), "{value} must be rejected");
		}
	}
}
