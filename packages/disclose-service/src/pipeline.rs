//! Per-company pipeline stages and their CSV artifacts.
//!
//! `rank` writes `<company>_ranked.csv`, `judge` writes `<stem>_judged.csv`, and `summarize`
//! folds judged tables into the summary store. `run` chains all three for one company and
//! commits the summary tables before moving on, so an interrupted batch keeps every company it
//! already finished.

use std::{
	collections::{HashMap, HashSet},
	path::{Path, PathBuf},
	sync::Arc,
};

use time::OffsetDateTime;

use disclose_config::Config;
use disclose_domain::{
	CompanySummary, DecisionPolicy, Disclosure, Judgment, Label, LabelDecision, RankedJudgment,
	decide_label,
};
use disclose_storage::{
	guidelines::{self, COL_POSITIVE_1, COL_POSITIVE_2, PositiveExamples},
	summary::SummaryStore,
	table::Table,
};

use crate::{
	CorpusStore, Error, Providers, Result,
	batch::{JudgeTask, judge_batch},
	judge::{JudgePolicy, LabelJudge},
	prompt::{self, PromptInput},
	rerank, retrieve,
};

pub const COL_COMPANY: &str = "Company";
pub const COL_LABEL: &str = "Label";
pub const COL_DEFINITION: &str = "Definition";
pub const COL_POINT: &str = "Point";
pub const COL_PAGE: &str = "Page";
pub const COL_CHUNK_ID: &str = "Chunk ID";
pub const COL_CHUNK_TEXT: &str = "Chunk Text";
pub const COL_CONTENT: &str = "Content";
pub const COL_RERANK_SCORE: &str = "RerankScore";
pub const COL_DISTANCE: &str = "Distance";
pub const COL_RANK: &str = "Rank";
pub const COL_REASONING: &str = "reasoning";
pub const COL_IS_DISCLOSED: &str = "is_disclosed";
pub const COL_CONFIDENCE: &str = "confidence";

pub const RANKED_HEADERS: [&str; 10] = [
	COL_COMPANY,
	COL_LABEL,
	COL_DEFINITION,
	COL_POINT,
	COL_PAGE,
	COL_CHUNK_ID,
	COL_CHUNK_TEXT,
	COL_RERANK_SCORE,
	COL_DISTANCE,
	COL_RANK,
];

const CHUNK_COLUMNS: [&str; 2] = [COL_CHUNK_TEXT, COL_CONTENT];
const STANDARD_COLUMNS: [&str; 3] = [COL_DEFINITION, COL_POINT, COL_LABEL];

#[derive(Clone, Debug, PartialEq)]
pub enum FileOutcome {
	Written { input: PathBuf, output: PathBuf, judged: usize, skipped: usize },
	Skipped { input: PathBuf, output: PathBuf },
	Failed { input: PathBuf, error: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum CompanyOutcome {
	Committed { summary: CompanySummary },
	Failed { company: String, error: String },
}
impl CompanyOutcome {
	pub fn company(&self) -> &str {
		match self {
			Self::Committed { summary } => &summary.company,
			Self::Failed { company, .. } => company,
		}
	}
}

/// Row counts of one judged table.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct JudgeStats {
	pub judged: usize,
	pub skipped: usize,
	pub fallbacks: usize,
}

pub struct DisclosureService {
	pub cfg: Config,
	pub corpus: Arc<dyn CorpusStore>,
	pub providers: Providers,
	judge: Arc<LabelJudge>,
	positive_examples: HashMap<String, PositiveExamples>,
}
impl DisclosureService {
	pub fn new(cfg: Config, corpus: Arc<dyn CorpusStore>) -> Result<Self> {
		Self::with_providers(cfg, corpus, Providers::default())
	}

	pub fn with_providers(
		cfg: Config,
		corpus: Arc<dyn CorpusStore>,
		providers: Providers,
	) -> Result<Self> {
		let positive_examples = match cfg.judge.positive_examples.as_deref() {
			Some(path) => guidelines::load_positive_examples(path)?,
			None => HashMap::new(),
		};
		let judge = Arc::new(LabelJudge::new(
			providers.judge.clone(),
			cfg.providers.judge.clone(),
			cfg.providers.escalation.clone(),
			JudgePolicy::from_config(&cfg.judge),
		));

		Ok(Self { cfg, corpus, providers, judge, positive_examples })
	}

	pub fn decision_policy(&self) -> DecisionPolicy {
		DecisionPolicy { top_k: self.cfg.decision.top_k, y_threshold: self.cfg.decision.y_threshold }
	}

	pub fn ranked_path(&self, company: &str) -> PathBuf {
		self.cfg.storage.tables.output_dir.join(format!("{company}_ranked.csv"))
	}

	pub fn judged_path(&self, input: &Path) -> PathBuf {
		let stem = input.file_stem().map(|stem| stem.to_string_lossy()).unwrap_or_default();

		self.cfg.storage.tables.output_dir.join(format!("{stem}_judged.csv"))
	}

	/// Retrieves and reranks candidates for every label. Labels without candidates contribute
	/// no rows.
	pub async fn rank_company(&self, company: &str, labels: &[Label]) -> Result<Table> {
		let retrieval = &self.cfg.retrieval;
		let mut table = Table::new(RANKED_HEADERS);

		for label in labels {
			let candidates =
				retrieve::retrieve(self.corpus.as_ref(), company, label, retrieval.candidate_k)
					.await?;

			if candidates.is_empty() {
				continue;
			}

			let ranked = rerank::rerank(
				self.providers.rerank.as_ref(),
				&self.cfg.providers.rerank,
				label.standard_text(),
				candidates,
				retrieval.top_n,
				retrieval.normalize_scores,
			)
			.await?;

			tracing::debug!(company, label = %label.code, kept = ranked.len(), "Label ranked.");

			for candidate in ranked {
				table.push_row(vec![
					company.to_string(),
					label.code.clone(),
					label.definition.clone(),
					label.point.clone().unwrap_or_default(),
					candidate.chunk.page.map(|page| page.to_string()).unwrap_or_default(),
					candidate.chunk.chunk_id,
					candidate.chunk.text,
					format!("{:.6}", candidate.rerank_score),
					format!("{:.6}", candidate.distance),
					candidate.rank.to_string(),
				]);
			}
		}

		Ok(table)
	}

	pub async fn rank_companies(&self, companies: &[String], labels: &[Label]) -> Vec<FileOutcome> {
		let mut outcomes = Vec::with_capacity(companies.len());

		for company in companies {
			let output = self.ranked_path(company);
			let input = PathBuf::from(company);

			if self.cfg.storage.tables.skip_existing && output.exists() {
				tracing::info!(
					company = %company,
					output = %output.display(),
					"Ranked output exists. Skipping."
				);
				outcomes.push(FileOutcome::Skipped { input, output });

				continue;
			}

			let result = async {
				let table = self.rank_company(company, labels).await?;

				table.write(&output)?;

				Ok::<usize, Error>(table.len())
			}
			.await;

			match result {
				Ok(rows) => {
					tracing::info!(
						company = %company,
						rows,
						output = %output.display(),
						"Ranked output written."
					);
					outcomes.push(FileOutcome::Written { input, output, judged: rows, skipped: 0 });
				},
				Err(err) => {
					tracing::error!(company = %company, error = %err, "Ranking failed.");
					outcomes.push(FileOutcome::Failed { input, error: err.to_string() });
				},
			}
		}

		outcomes
	}

	/// Judges every row that has chunk text and standard text, then writes `reasoning`,
	/// `is_disclosed` and `confidence` back by row index. Rows that are not submitted get
	/// those cells cleared, so an earlier verdict is never counted again.
	pub async fn judge_table(
		&self,
		table: &mut Table,
		path: &Path,
		default_company: &str,
	) -> Result<JudgeStats> {
		table.require_column(path, &CHUNK_COLUMNS)?;
		table.require_column(path, &STANDARD_COLUMNS)?;

		self.prepare_columns(table, default_company);

		let mut tasks = Vec::new();

		for row in 0..table.len() {
			let Some(chunk) = table.value(row, &CHUNK_COLUMNS) else {
				continue;
			};
			let Some(standard) = table.value(row, &STANDARD_COLUMNS) else {
				continue;
			};
			let messages = prompt::build_messages(&PromptInput {
				standard,
				point: table.value(row, &[COL_POINT]),
				examples: [COL_POSITIVE_1, COL_POSITIVE_2]
					.into_iter()
					.filter_map(|col| table.value(row, &[col]))
					.collect(),
				chunk,
			});

			tasks.push(JudgeTask {
				index: row,
				label: table.value(row, &[COL_LABEL]).unwrap_or(standard).to_string(),
				messages,
			});
		}

		let submitted: HashSet<usize> = tasks.iter().map(|task| task.index).collect();
		let results = judge_batch(self.judge.clone(), tasks, self.cfg.judge.workers).await;
		let reasoning_col = table.ensure_column(COL_REASONING);
		let disclosed_col = table.ensure_column(COL_IS_DISCLOSED);
		let confidence_col = table.ensure_column(COL_CONFIDENCE);
		let mut stats = JudgeStats {
			judged: submitted.len(),
			skipped: table.len() - submitted.len(),
			fallbacks: 0,
		};

		for row in (0..table.len()).filter(|row| !submitted.contains(row)) {
			for col in [reasoning_col, disclosed_col, confidence_col] {
				table.set(row, col, "");
			}
		}

		for (row, judgment) in results {
			if judgment.is_fallback() {
				stats.fallbacks += 1;
			}

			write_judgment(table, row, [reasoning_col, disclosed_col, confidence_col], &judgment);
		}

		Ok(stats)
	}

	pub async fn judge_file(&self, input: &Path) -> FileOutcome {
		let output = self.judged_path(input);

		if self.cfg.storage.tables.skip_existing && output.exists() {
			tracing::info!(
				input = %input.display(),
				output = %output.display(),
				"Judged output exists. Skipping."
			);

			return FileOutcome::Skipped { input: input.to_path_buf(), output };
		}

		let result = async {
			let mut table = Table::read(input)?;
			let stats = self.judge_table(&mut table, input, &company_from_path(input)).await?;

			table.write(&output)?;

			Ok::<JudgeStats, Error>(stats)
		}
		.await;

		match result {
			Ok(stats) => {
				tracing::info!(
					input = %input.display(),
					output = %output.display(),
					judged = stats.judged,
					skipped = stats.skipped,
					fallbacks = stats.fallbacks,
					"Judged output written."
				);

				FileOutcome::Written {
					input: input.to_path_buf(),
					output,
					judged: stats.judged,
					skipped: stats.skipped,
				}
			},
			Err(err) => {
				tracing::error!(
					input = %input.display(),
					error = %err,
					"Judging failed. Skipping file."
				);

				FileOutcome::Failed { input: input.to_path_buf(), error: err.to_string() }
			},
		}
	}

	pub async fn judge_files(&self, inputs: &[PathBuf]) -> Vec<FileOutcome> {
		let mut outcomes = Vec::with_capacity(inputs.len());

		for input in inputs {
			outcomes.push(self.judge_file(input).await);
		}

		outcomes
	}

	/// Aggregates judged tables and upserts the summary tables, committing after each company.
	pub fn summarize_files(&self, inputs: &[PathBuf]) -> Result<Vec<CompanyOutcome>> {
		let mut store = self.open_summary_store()?;
		let policy = self.decision_policy();
		let mut companies: Vec<String> = Vec::new();
		let mut by_company: HashMap<String, Vec<LabelDecision>> = HashMap::new();

		for input in inputs {
			let decisions = Table::read(input)
				.map_err(Error::from)
				.and_then(|table| aggregate_table(&table, input, &company_from_path(input), policy));

			match decisions {
				Ok(decisions) => {
					for decision in decisions {
						if !by_company.contains_key(&decision.company) {
							companies.push(decision.company.clone());
						}

						by_company.entry(decision.company.clone()).or_default().push(decision);
					}
				},
				Err(err) => {
					tracing::error!(
						input = %input.display(),
						error = %err,
						"Cannot aggregate file. Skipping."
					);
				},
			}
		}

		let mut outcomes = Vec::with_capacity(companies.len());

		for company in companies {
			let decisions = by_company.remove(&company).unwrap_or_default();

			outcomes.push(commit_company(&mut store, &company, &decisions));
		}

		Ok(outcomes)
	}

	/// Runs rank, judge, aggregate and summary commit for one company.
	///
	/// With `skip_existing`, previously written ranked or judged tables are reused instead of
	/// recomputed.
	pub async fn process_company(
		&self,
		store: &mut SummaryStore,
		company: &str,
		labels: &[Label],
	) -> Result<CompanySummary> {
		let skip_existing = self.cfg.storage.tables.skip_existing;
		let ranked_path = self.ranked_path(company);
		let judged_path = self.judged_path(&ranked_path);
		let table = if skip_existing && judged_path.exists() {
			tracing::info!(company, output = %judged_path.display(), "Reusing judged output.");

			Table::read(&judged_path)?
		} else {
			let mut table = if skip_existing && ranked_path.exists() {
				tracing::info!(company, output = %ranked_path.display(), "Reusing ranked output.");

				Table::read(&ranked_path)?
			} else {
				let table = self.rank_company(company, labels).await?;

				table.write(&ranked_path)?;

				table
			};
			let stats = self.judge_table(&mut table, &ranked_path, company).await?;

			table.write(&judged_path)?;

			tracing::info!(
				company,
				judged = stats.judged,
				fallbacks = stats.fallbacks,
				"Company judged."
			);

			table
		};
		let decisions = aggregate_table(&table, &judged_path, company, self.decision_policy())?;
		let summary = store.upsert(company, &decisions, OffsetDateTime::now_utc())?;

		store.commit()?;

		Ok(summary)
	}

	/// Processes companies in order. A failing company is logged and reported; the batch moves
	/// on and earlier commits stay intact.
	pub async fn run(&self, companies: &[String], labels: &[Label]) -> Result<Vec<CompanyOutcome>> {
		let mut store = self.open_summary_store()?;
		let mut outcomes = Vec::with_capacity(companies.len());

		for company in companies {
			match self.process_company(&mut store, company, labels).await {
				Ok(summary) => {
					log_summary(&summary);
					outcomes.push(CompanyOutcome::Committed { summary });
				},
				Err(err) => {
					tracing::error!(company = %company, error = %err, "Company processing failed.");
					outcomes.push(CompanyOutcome::Failed {
						company: company.clone(),
						error: err.to_string(),
					});
				},
			}
		}

		Ok(outcomes)
	}

	fn open_summary_store(&self) -> Result<SummaryStore> {
		let tables = &self.cfg.storage.tables;

		Ok(SummaryStore::open(&tables.summary_path, &tables.detail_path)?)
	}

	/// Fills `Company`, exemplar and `Rank` columns the way downstream aggregation expects.
	fn prepare_columns(&self, table: &mut Table, default_company: &str) {
		let company_col = table.ensure_column(COL_COMPANY);

		for row in 0..table.len() {
			if table.cell(row, company_col).trim().is_empty() {
				table.set(row, company_col, default_company);
			}
		}

		let first_col = table.ensure_column(COL_POSITIVE_1);
		let second_col = table.ensure_column(COL_POSITIVE_2);

		if !self.positive_examples.is_empty()
			&& let Some(label_col) = table.column(COL_LABEL)
		{
			for row in 0..table.len() {
				let Some(examples) = self.positive_examples.get(table.cell(row, label_col).trim())
				else {
					continue;
				};

				if table.cell(row, first_col).trim().is_empty() {
					table.set(row, first_col, examples.first.clone());
				}
				if table.cell(row, second_col).trim().is_empty() {
					table.set(row, second_col, examples.second.clone());
				}
			}
		}

		if table.column(COL_RANK).is_none() {
			let ranks = derive_ranks(table);
			let rank_col = table.ensure_column(COL_RANK);

			for (row, rank) in ranks.into_iter().enumerate() {
				table.set(row, rank_col, rank.to_string());
			}
		}
	}
}

/// Label decisions for every (company, label) group of a judged table, in first-seen order.
///
/// Only rows with an `is_disclosed` value count; rows that were never submitted to the judge
/// are ignored, and a label with no judged rows yields no decision.
pub fn aggregate_table(
	table: &Table,
	path: &Path,
	default_company: &str,
	policy: DecisionPolicy,
) -> Result<Vec<LabelDecision>> {
	let disclosed_col = table.require_column(path, &[COL_IS_DISCLOSED])?;
	let label_col = table.require_column(path, &[COL_LABEL])?;
	let company_col = table.column(COL_COMPANY);
	let rank_col = table.column(COL_RANK);
	let mut keys: Vec<(String, String)> = Vec::new();
	let mut groups: HashMap<(String, String), Vec<RankedJudgment>> = HashMap::new();

	for row in 0..table.len() {
		let flag = table.cell(row, disclosed_col).trim();
		let label = table.cell(row, label_col).trim();

		if flag.is_empty() || label.is_empty() {
			continue;
		}

		let company = company_col
			.map(|col| table.cell(row, col).trim())
			.filter(|company| !company.is_empty())
			.unwrap_or(default_company);
		let key = (company.to_string(), label.to_string());
		let group = groups.entry(key.clone()).or_insert_with(|| {
			keys.push(key);

			Vec::new()
		});
		let rank = rank_col
			.and_then(|col| table.cell(row, col).trim().parse::<u32>().ok())
			.unwrap_or(group.len() as u32 + 1);

		group.push(RankedJudgment { rank, is_disclosed: Disclosure::normalize(flag) });
	}

	Ok(keys
		.into_iter()
		.filter_map(|key| {
			let judgments = groups.remove(&key)?;

			Some(decide_label(&key.0, &key.1, &judgments, policy))
		})
		.collect())
}

/// Company name implied by an input file name: the stem up to `_output_chunks`, without a
/// trailing `_ranked` or `_judged`.
pub fn company_from_path(path: &Path) -> String {
	let stem =
		path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default();
	let base = stem.split("_output_chunks").next().unwrap_or_default();
	let base = base.strip_suffix("_judged").unwrap_or(base);
	let base = base.strip_suffix("_ranked").unwrap_or(base);

	base.to_string()
}

fn derive_ranks(table: &Table) -> Vec<u32> {
	let label_col = table.column(COL_LABEL);
	let mut counters: HashMap<String, u32> = HashMap::new();

	(0..table.len())
		.map(|row| {
			let key =
				label_col.map(|col| table.cell(row, col).trim().to_string()).unwrap_or_default();
			let counter = counters.entry(key).or_insert(0);

			*counter += 1;

			*counter
		})
		.collect()
}

fn write_judgment(table: &mut Table, row: usize, cols: [usize; 3], judgment: &Judgment) {
	let [reasoning_col, disclosed_col, confidence_col] = cols;

	table.set(row, reasoning_col, judgment.audit_reasoning());
	table.set(row, disclosed_col, judgment.is_disclosed.as_str());
	table.set(
		row,
		confidence_col,
		judgment.confidence.map(|confidence| confidence.to_string()).unwrap_or_default(),
	);
}

fn commit_company(
	store: &mut SummaryStore,
	company: &str,
	decisions: &[LabelDecision],
) -> CompanyOutcome {
	let result = store
		.upsert(company, decisions, OffsetDateTime::now_utc())
		.and_then(|summary| store.commit().map(|()| summary));

	match result {
		Ok(summary) => {
			log_summary(&summary);

			CompanyOutcome::Committed { summary }
		},
		Err(err) => {
			tracing::error!(company, error = %err, "Summary commit failed.");

			CompanyOutcome::Failed { company: company.to_string(), error: err.to_string() }
		},
	}
}

fn log_summary(summary: &CompanySummary) {
	tracing::info!(
		company = %summary.company,
		total_labels = summary.total_labels,
		y_labels = summary.y_labels,
		disclosure_ratio = summary.disclosure_ratio,
		"Company summary committed."
	);
}

#[cfg(test)]
mod tests {
	use super::*;

	fn judged_table(rows: &[[&str; 4]]) -> Table {
		let mut table = Table::new([COL_COMPANY, COL_LABEL, COL_RANK, COL_IS_DISCLOSED]);

		for row in rows {
			table.push_row(row.iter().map(|cell| cell.to_string()).collect());
		}

		table
	}

	#[test]
	fn company_is_derived_from_file_stem() {
		assert_eq!(company_from_path(Path::new("/in/A_output_chunks.csv")), "A");
		assert_eq!(company_from_path(Path::new("/out/B_ranked_judged.csv")), "B");
		assert_eq!(company_from_path(Path::new("C.csv")), "C");
	}

	#[test]
	fn aggregation_orders_by_rank_and_ignores_unjudged_rows() {
		let table = judged_table(&[
			["A", "G-1", "3", "Y"],
			["A", "G-1", "1", "N"],
			["A", "G-1", "2", "N"],
			["A", "G-2", "1", ""],
			["B", "G-1", "1", "y"],
		]);
		let policy = DecisionPolicy { top_k: 2, y_threshold: 1 };
		let decisions =
			aggregate_table(&table, Path::new("t.csv"), "X", policy).expect("aggregate failed");

		assert_eq!(decisions.len(), 2);
		assert_eq!((decisions[0].company.as_str(), decisions[0].label.as_str()), ("A", "G-1"));
		assert_eq!(decisions[0].final_yn, Disclosure::No);
		assert_eq!(decisions[0].considered_count, 2);
		assert_eq!(decisions[1].company, "B");
		assert_eq!(decisions[1].final_yn, Disclosure::Yes);
	}

	#[test]
	fn aggregation_requires_judged_column() {
		let table = Table::new([COL_COMPANY, COL_LABEL]);
		let err = aggregate_table(&table, Path::new("t.csv"), "A", DecisionPolicy::default())
			.expect_err("missing column");

		assert!(matches!(err, Error::MissingColumn { .. }));
	}

	#[test]
	fn ranks_are_derived_per_label_in_appearance_order() {
		let mut table = Table::new([COL_LABEL]);

		for label in ["G-1", "G-2", "G-1", "G-1", "G-2"] {
			table.push_row(vec![label.to_string()]);
		}

		assert_eq!(derive_ranks(&table), vec![1, 1, 2, 3, 2]);
	}
}
