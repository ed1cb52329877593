use std::{collections::HashSet, sync::Arc};

use serde_json::Value;
use tokio::sync::{Semaphore, mpsc};
use tracing::Instrument;

use disclose_domain::Judgment;

use crate::judge::LabelJudge;

/// A submitted (chunk, label) unit, addressed by its originating row.
#[derive(Clone, Debug)]
pub struct JudgeTask {
	pub index: usize,
	pub label: String,
	pub messages: Vec<Value>,
}

/// Runs every task with at most `workers` in flight and returns one judgment per task, sorted
/// by task index.
///
/// Workers only send `(index, judgment)` messages; results are merged here after the channel
/// drains, so completion order never matters. A task that dies without reporting is filled in
/// with the fallback judgment.
pub async fn judge_batch(
	judge: Arc<LabelJudge>,
	tasks: Vec<JudgeTask>,
	workers: u32,
) -> Vec<(usize, Judgment)> {
	if tasks.is_empty() {
		return Vec::new();
	}

	let expected: Vec<usize> = tasks.iter().map(|task| task.index).collect();
	let semaphore = Arc::new(Semaphore::new(workers.max(1) as usize));
	let (tx, mut rx) = mpsc::channel::<(usize, Judgment)>(tasks.len());
	let mut handles = Vec::with_capacity(tasks.len());

	for task in tasks {
		let judge = judge.clone();
		let semaphore = semaphore.clone();
		let tx = tx.clone();
		let span = tracing::info_span!("judge_task", row = task.index, label = %task.label);

		handles.push(tokio::spawn(
			async move {
				let judgment = match semaphore.acquire_owned().await {
					Ok(_permit) => judge.judge(&task.messages).await,
					Err(err) => Judgment::fallback(format!("Worker pool closed: {err}")),
				};

				if tx.send((task.index, judgment)).await.is_err() {
					tracing::warn!("Result channel closed before the judgment was delivered.");
				}
			}
			.instrument(span),
		));
	}

	drop(tx);

	let mut results = Vec::with_capacity(expected.len());

	while let Some(message) = rx.recv().await {
		results.push(message);
	}

	for handle in handles {
		if let Err(err) = handle.await {
			tracing::error!(error = %err, "Judge worker task failed.");
		}
	}

	let reported: HashSet<usize> = results.iter().map(|(index, _)| *index).collect();

	for index in expected {
		if !reported.contains(&index) {
			results.push((index, Judgment::fallback("Judge worker task aborted.")));
		}
	}

	results.sort_by_key(|(index, _)| *index);

	results
}
