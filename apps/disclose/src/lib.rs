use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use disclose_config::Config;
use disclose_service::{CompanyOutcome, DisclosureService, FileOutcome, Providers, QdrantCorpus};
use disclose_storage::{guidelines, qdrant::QdrantStore};

#[derive(Debug, Parser)]
#[command(
	version = disclose_cli::VERSION,
	rename_all = "kebab",
	styles = disclose_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Retrieve and rerank candidate chunks for every guideline label.
	Rank {
		#[arg(long, short = 'g', value_name = "FILE")]
		guidelines: PathBuf,
		#[arg(long = "company", value_name = "NAME", required = true)]
		companies: Vec<String>,
	},
	/// Judge every row of ranked tables.
	Judge {
		#[arg(value_name = "FILE", required = true)]
		files: Vec<PathBuf>,
	},
	/// Aggregate judged tables into the summary tables.
	Summarize {
		#[arg(value_name = "FILE", required = true)]
		files: Vec<PathBuf>,
	},
	/// Rank, judge and summarize each company end to end.
	Run {
		#[arg(long, short = 'g', value_name = "FILE")]
		guidelines: PathBuf,
		#[arg(long = "company", value_name = "NAME", required = true)]
		companies: Vec<String>,
	},
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = disclose_config::load(&args.config)?;

	init_tracing(&config);

	let service = build_service(config)?;

	match args.command {
		Command::Rank { guidelines, companies } => {
			let labels = guidelines::load_labels(&guidelines)?;

			tracing::info!(labels = labels.len(), companies = companies.len(), "Ranking started.");

			report_files(&service.rank_companies(&companies, &labels).await);
		},
		Command::Judge { files } => {
			report_files(&service.judge_files(&files).await);
		},
		Command::Summarize { files } => {
			report_companies(&service.summarize_files(&files)?);
		},
		Command::Run { guidelines, companies } => {
			let labels = guidelines::load_labels(&guidelines)?;

			tracing::info!(labels = labels.len(), companies = companies.len(), "Pipeline started.");

			report_companies(&service.run(&companies, &labels).await?);
		},
	}

	Ok(())
}

fn init_tracing(config: &Config) {
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_service(config: Config) -> color_eyre::Result<DisclosureService> {
	let providers = Providers::default();
	let store = QdrantStore::new(&config.storage.qdrant)?;
	let corpus = QdrantCorpus::new(
		store,
		providers.embedding.clone(),
		config.providers.embedding.clone(),
	);

	Ok(DisclosureService::with_providers(config, Arc::new(corpus), providers)?)
}

fn report_files(outcomes: &[FileOutcome]) {
	let failed = outcomes.iter().filter(|outcome| matches!(outcome, FileOutcome::Failed { .. }));

	tracing::info!(total = outcomes.len(), failed = failed.count(), "Stage finished.");
}

fn report_companies(outcomes: &[CompanyOutcome]) {
	for outcome in outcomes {
		if let CompanyOutcome::Failed { company, error } = outcome {
			tracing::warn!(company = %company, error = %error, "Company not committed.");
		}
	}

	let committed =
		outcomes.iter().filter(|outcome| matches!(outcome, CompanyOutcome::Committed { .. }));

	tracing::info!(total = outcomes.len(), committed = committed.count(), "Stage finished.");
}
