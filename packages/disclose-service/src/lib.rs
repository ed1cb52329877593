pub mod batch;
pub mod judge;
pub mod pipeline;
pub mod prompt;
pub mod rerank;
pub mod retrieve;

mod error;

pub use batch::{JudgeTask, judge_batch};
pub use error::{Error, Result};
pub use judge::{JudgeFailure, JudgePolicy, LabelJudge, backoff_for_attempt};
pub use pipeline::{CompanyOutcome, DisclosureService, FileOutcome};
pub use rerank::{cmp_f32_desc, rank_by_scores};
pub use retrieve::{QdrantCorpus, retrieve};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use disclose_config::{EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use disclose_domain::RetrievalCandidate;
use disclose_providers::{embedding, judge::JudgeReply, rerank as rerank_api};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>>;
}

/// One structured classification call. Failures arrive already tagged so retry and escalation
/// can branch on the kind.
pub trait JudgeProvider
where
	Self: Send + Sync,
{
	fn judge<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<JudgeReply, JudgeFailure>>;
}

/// Nearest-neighbour index over report chunks, scoped per company.
pub trait CorpusStore
where
	Self: Send + Sync,
{
	fn query<'a>(
		&'a self,
		company: &'a str,
		text: &'a str,
		k: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievalCandidate>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub judge: Arc<dyn JudgeProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		judge: Arc<dyn JudgeProvider>,
	) -> Self {
		Self { embedding, rerank, judge }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), rerank: provider.clone(), judge: provider }
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(rerank_api::rerank(cfg, query, docs).await?) })
	}
}
impl JudgeProvider for DefaultProviders {
	fn judge<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<JudgeReply, JudgeFailure>> {
		Box::pin(async move { Ok(disclose_providers::judge::judge(cfg, messages).await?) })
	}
}
