use std::{
	fs,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::Value;

use disclose_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use disclose_domain::{Disclosure, JudgmentSource, RetrievalCandidate};
use disclose_providers::judge::JudgeReply;
use disclose_service::{
	BoxFuture, CompanyOutcome, CorpusStore, DisclosureService, EmbeddingProvider, FileOutcome,
	JudgeFailure, JudgePolicy, JudgeProvider, JudgeTask, LabelJudge, Providers, RerankProvider,
	Result, judge_batch, pipeline::aggregate_table,
};
use disclose_storage::table::{Table, UTF8_BOM};
use disclose_testkit::{TestDir, llm_config, test_config};

type Script = dyn Fn(&str, &str) -> std::result::Result<JudgeReply, JudgeFailure> + Send + Sync;

struct DummyEmbedding;
impl EmbeddingProvider for DummyEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let vec = vec![0.0; cfg.dimensions as usize];

		Box::pin(async move { Ok(vec![vec; texts.len()]) })
	}
}

struct DummyRerank;
impl RerankProvider for DummyRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		let scores = vec![0.0; docs.len()];

		Box::pin(async move { Ok(scores) })
	}
}

struct EmptyCorpus;
impl CorpusStore for EmptyCorpus {
	fn query<'a>(
		&'a self,
		_company: &'a str,
		_text: &'a str,
		_k: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievalCandidate>>> {
		Box::pin(async move { Ok(Vec::new()) })
	}
}

/// Replies according to `script(model, passage)` and records every `(model, user prompt)`.
struct ScriptedJudge {
	script: Box<Script>,
	calls: Mutex<Vec<(String, String)>>,
}
impl ScriptedJudge {
	fn new(
		script: impl Fn(&str, &str) -> std::result::Result<JudgeReply, JudgeFailure>
		+ Send
		+ Sync
		+ 'static,
	) -> Arc<Self> {
		Arc::new(Self { script: Box::new(script), calls: Mutex::new(Vec::new()) })
	}

	fn calls(&self) -> Vec<(String, String)> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn count(&self, model: &str) -> usize {
		self.calls().iter().filter(|(called, _)| called == model).count()
	}
}
impl JudgeProvider for ScriptedJudge {
	fn judge<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, std::result::Result<JudgeReply, JudgeFailure>> {
		let user = messages[1]["content"].as_str().unwrap_or_default().to_string();
		let passage = user.split("Report passage:\n").nth(1).unwrap_or_default().trim().to_string();
		let result = (self.script)(&cfg.model, &passage);

		self.calls.lock().unwrap_or_else(|err| err.into_inner()).push((cfg.model.clone(), user));

		Box::pin(async move { result })
	}
}

struct ConcurrencyJudge {
	in_flight: AtomicUsize,
	max_seen: AtomicUsize,
}
impl JudgeProvider for ConcurrencyJudge {
	fn judge<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_messages: &'a [Value],
	) -> BoxFuture<'a, std::result::Result<JudgeReply, JudgeFailure>> {
		Box::pin(async move {
			let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;

			self.max_seen.fetch_max(now, Ordering::SeqCst);
			tokio::time::sleep(Duration::from_millis(10)).await;
			self.in_flight.fetch_sub(1, Ordering::SeqCst);

			Ok(reply("Y", Some(0.9)))
		})
	}
}

fn reply(flag: &str, confidence: Option<f32>) -> JudgeReply {
	JudgeReply { reasoning: format!("answered {flag}"), is_disclosed: flag.to_string(), confidence }
}

fn build_service(cfg: Config, judge: Arc<dyn JudgeProvider>) -> DisclosureService {
	let providers = Providers::new(Arc::new(DummyEmbedding), Arc::new(DummyRerank), judge);

	DisclosureService::with_providers(cfg, Arc::new(EmptyCorpus), providers)
		.expect("Failed to build service.")
}

fn messages_for(passage: &str) -> Vec<Value> {
	vec![
		serde_json::json!({ "role": "system", "content": "system" }),
		serde_json::json!({ "role": "user", "content": format!("Report passage:\n{passage}\n") }),
	]
}

fn policy(max_attempts: u32) -> JudgePolicy {
	JudgePolicy { max_attempts, base_backoff_ms: 0, max_backoff_ms: 0, escalation_threshold: 0.8 }
}

#[tokio::test]
async fn judge_file_fills_company_rank_and_skips_blank_rows() {
	let dir = TestDir::new("disclose_service").expect("Failed to create test dir.");
	let input = dir
		.write(
			"A_output_chunks.csv",
			"Label,Definition,Content\nG-1,Board oversight,text one\nG-1,Board oversight,\nG-2,,text three\n",
		)
		.expect("Failed to write input.");
	let judge = ScriptedJudge::new(|_, passage| {
		Ok(if passage == "text one" { reply("y", Some(0.9)) } else { reply("N", None) })
	});
	let service = build_service(test_config(dir.path()), judge.clone());
	let outcome = service.judge_file(&input).await;
	let output = dir.join("out/A_output_chunks_judged.csv");

	assert_eq!(
		outcome,
		FileOutcome::Written { input: input.clone(), output: output.clone(), judged: 2, skipped: 1 }
	);
	assert!(fs::read(&output).expect("Failed to read output.").starts_with(UTF8_BOM.as_bytes()));

	let table = Table::read(&output).expect("Failed to read judged table.");
	let col = |name: &str| table.column(name).unwrap_or_else(|| panic!("Missing {name}."));

	assert_eq!(table.cell(0, col("Company")), "A");
	assert_eq!(
		(0..3).map(|row| table.cell(row, col("Rank"))).collect::<Vec<_>>(),
		vec!["1", "2", "1"]
	);
	assert_eq!(table.cell(0, col("is_disclosed")), "Y");
	assert_eq!(table.cell(0, col("confidence")), "0.9");
	assert_eq!(table.cell(1, col("is_disclosed")), "");
	assert_eq!(table.cell(2, col("is_disclosed")), "N");
	assert_eq!(table.cell(2, col("confidence")), "");
	assert!(judge.calls()[..].iter().any(|(_, user)| user.contains("Disclosure standard:\nG-2")));
}

#[tokio::test]
async fn rejudging_clears_verdicts_of_unsubmitted_rows() {
	let dir = TestDir::new("disclose_service").expect("Failed to create test dir.");
	let input = dir
		.write(
			"D_judged.csv",
			"Company,Label,Definition,Chunk Text,Rank,reasoning,is_disclosed,confidence\n\
			 D,G-1,Board oversight,text one,1,old,N,0.9\n\
			 D,G-1,Board oversight,,2,stale,Y,0.95\n",
		)
		.expect("Failed to write input.");
	let judge = ScriptedJudge::new(|_, _| Ok(reply("N", Some(0.9))));
	let service = build_service(test_config(dir.path()), judge);
	let outcome = service.judge_file(&input).await;

	assert!(matches!(outcome, FileOutcome::Written { judged: 1, skipped: 1, .. }));

	let output = dir.join("out/D_judged_judged.csv");
	let table = Table::read(&output).expect("Failed to read judged table.");
	let col = |name: &str| table.column(name).unwrap_or_else(|| panic!("Missing {name}."));

	assert_eq!(table.cell(1, col("reasoning")), "");
	assert_eq!(table.cell(1, col("is_disclosed")), "");
	assert_eq!(table.cell(1, col("confidence")), "");

	let decisions = aggregate_table(&table, &output, "D", service.decision_policy())
		.expect("Failed to aggregate.");

	assert_eq!(decisions.len(), 1);
	assert_eq!(decisions[0].final_yn, Disclosure::No);
	assert_eq!(decisions[0].considered_count, 1);
}

#[tokio::test]
async fn file_without_chunk_column_fails_alone() {
	let dir = TestDir::new("disclose_service").expect("Failed to create test dir.");
	let broken = dir.write("broken.csv", "Label,Definition\nG-1,def\n").expect("Failed to write.");
	let good = dir
		.write("B_output_chunks.csv", "Label,Definition,Chunk Text\nG-1,def,text\n")
		.expect("Failed to write.");
	let judge = ScriptedJudge::new(|_, _| Ok(reply("N", Some(0.9))));
	let service = build_service(test_config(dir.path()), judge);
	let outcomes = service.judge_files(&[broken.clone(), good]).await;

	assert!(matches!(&outcomes[0], FileOutcome::Failed { input, .. } if input == &broken));
	assert!(matches!(&outcomes[1], FileOutcome::Written { judged: 1, .. }));
}

#[tokio::test]
async fn existing_output_is_skipped_without_judging() {
	let dir = TestDir::new("disclose_service").expect("Failed to create test dir.");
	let input =
		dir.write("C.csv", "Label,Definition,Chunk Text\nG-1,def,text\n").expect("Failed to write.");
	let mut cfg = test_config(dir.path());

	cfg.storage.tables.skip_existing = true;

	fs::create_dir_all(dir.join("out")).expect("Failed to create out dir.");
	fs::write(dir.join("out/C_judged.csv"), "done").expect("Failed to write marker.");

	let judge = ScriptedJudge::new(|_, _| Ok(reply("Y", Some(0.9))));
	let service = build_service(cfg, judge.clone());
	let outcome = service.judge_file(&input).await;

	assert!(matches!(outcome, FileOutcome::Skipped { .. }));
	assert!(judge.calls().is_empty());
}

#[tokio::test]
async fn positive_examples_fill_empty_cells_only() {
	let dir = TestDir::new("disclose_service").expect("Failed to create test dir.");
	let verified = dir
		.write(
			"verified.csv",
			"Label,Positive Example1,Positive Example2\nG-1,The board reviews climate risk.,\n",
		)
		.expect("Failed to write.");
	let input = dir
		.write(
			"D.csv",
			"Label,Definition,Chunk Text,Positive Example1\nG-1,def,first,\nG-1,def,second,Own example.\n",
		)
		.expect("Failed to write.");
	let mut cfg = test_config(dir.path());

	cfg.judge.positive_examples = Some(verified);

	let judge = ScriptedJudge::new(|_, _| Ok(reply("N", Some(0.9))));
	let service = build_service(cfg, judge.clone());

	service.judge_file(&input).await;

	let calls = judge.calls();
	let first = calls.iter().find(|(_, user)| user.ends_with("first\n")).expect("first call");
	let second = calls.iter().find(|(_, user)| user.ends_with("second\n")).expect("second call");

	assert!(first.1.contains("The board reviews climate risk."));
	assert!(second.1.contains("Own example."));
	assert!(!second.1.contains("The board reviews climate risk."));
}

#[tokio::test]
async fn summarize_commits_each_company_and_skips_unreadable_files() {
	let dir = TestDir::new("disclose_service").expect("Failed to create test dir.");
	let first = dir
		.write(
			"A_judged.csv",
			"Company,Label,Rank,is_disclosed\nA,G-1,1,N\nA,G-1,2,Y\nA,G-2,1,N\n",
		)
		.expect("Failed to write.");
	let second =
		dir.write("B_judged.csv", "Label,Rank,is_disclosed\nG-1,1,Y\n").expect("Failed to write.");
	let broken = dir.write("broken.csv", "Label,Rank\nG-1,1\n").expect("Failed to write.");
	let judge = ScriptedJudge::new(|_, _| Ok(reply("N", None)));
	let service = build_service(test_config(dir.path()), judge);
	let outcomes =
		service.summarize_files(&[first, broken, second]).expect("Failed to summarize files.");

	assert_eq!(outcomes.iter().map(CompanyOutcome::company).collect::<Vec<_>>(), vec!["A", "B"]);

	let summary = Table::read(&dir.join("summary.csv")).expect("Failed to read summary.");

	assert_eq!(summary.rows[0][..5], ["A", "2", "1", "1", "0.5000"]);
	assert_eq!(summary.rows[1][..5], ["B", "1", "1", "0", "1.0000"]);

	let detail = Table::read(&dir.join("detail.csv")).expect("Failed to read detail.");

	assert_eq!(detail.len(), 3);
	assert_eq!(detail.rows[0], vec!["A", "G-1", "Y", "1", "2"]);
}

#[tokio::test]
async fn worker_pool_bounds_in_flight_calls_and_restores_order() {
	let provider =
		Arc::new(ConcurrencyJudge { in_flight: AtomicUsize::new(0), max_seen: AtomicUsize::new(0) });
	let judge =
		Arc::new(LabelJudge::new(provider.clone(), llm_config("primary"), None, policy(1)));
	let tasks = (0..8)
		.rev()
		.map(|index| JudgeTask {
			index,
			label: "G-1".to_string(),
			messages: messages_for("text"),
		})
		.collect();
	let results = judge_batch(judge, tasks, 2).await;

	assert_eq!(
		results.iter().map(|(index, _)| *index).collect::<Vec<_>>(),
		(0..8).collect::<Vec<_>>()
	);
	assert!(results.iter().all(|(_, judgment)| judgment.is_disclosed == Disclosure::Yes));
	assert!(provider.max_seen.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
	let counter = Arc::new(AtomicUsize::new(0));
	let provider = ScriptedJudge::new(move |_, _| {
		if counter.fetch_add(1, Ordering::SeqCst) < 2 {
			Err(JudgeFailure::Provider { message: "rate limited".to_string() })
		} else {
			Ok(reply("Y", Some(0.95)))
		}
	});
	let judge = LabelJudge::new(provider.clone(), llm_config("primary"), None, policy(3));
	let judgment = judge.judge(&messages_for("text")).await;

	assert_eq!(provider.count("primary"), 3);
	assert_eq!(judgment.is_disclosed, Disclosure::Yes);
	assert_eq!(judgment.source, JudgmentSource::Primary);
}

#[tokio::test]
async fn schema_violations_exhaust_into_fallback() {
	let provider = ScriptedJudge::new(|_, _| {
		Err(JudgeFailure::Schema { message: "missing is_disclosed".to_string() })
	});
	let judge = LabelJudge::new(provider.clone(), llm_config("primary"), None, policy(2));
	let judgment = judge.judge(&messages_for("text")).await;

	assert_eq!(provider.count("primary"), 2);
	assert!(judgment.is_fallback());
	assert!(judgment.audit_reasoning().contains("missing is_disclosed"));
}

#[tokio::test]
async fn failed_escalation_resolves_to_fallback() {
	let provider = ScriptedJudge::new(|model, _| {
		if model == "primary" {
			Ok(reply("Y", Some(0.3)))
		} else {
			Err(JudgeFailure::Provider { message: "timeout".to_string() })
		}
	});
	let judge = LabelJudge::new(
		provider.clone(),
		llm_config("primary"),
		Some(llm_config("escalation")),
		policy(3),
	);
	let judgment = judge.judge(&messages_for("text")).await;

	assert_eq!(provider.count("escalation"), 1);
	assert_eq!(judgment.is_disclosed, Disclosure::No);
	assert_eq!(judgment.confidence, Some(0.0));
	assert!(judgment.audit_reasoning().starts_with("Escalation failed"));
}

#[tokio::test]
async fn low_confidence_without_escalation_model_keeps_primary() {
	let provider = ScriptedJudge::new(|_, _| Ok(reply("Y", Some(0.2))));
	let judge = LabelJudge::new(provider.clone(), llm_config("primary"), None, policy(3));
	let judgment = judge.judge(&messages_for("text")).await;

	assert_eq!(provider.calls().len(), 1);
	assert_eq!(judgment.is_disclosed, Disclosure::Yes);
	assert_eq!(judgment.confidence, Some(0.2));
}
