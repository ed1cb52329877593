use std::sync::Arc;

use disclose_config::EmbeddingProviderConfig;
use disclose_domain::{Label, RetrievalCandidate};
use disclose_storage::qdrant::QdrantStore;

use crate::{BoxFuture, CorpusStore, EmbeddingProvider, Error, Result};

/// Corpus backed by the Qdrant chunk collection. Queries are embedded with the configured
/// embedding provider before the nearest-neighbour search.
pub struct QdrantCorpus {
	store: QdrantStore,
	embedding: Arc<dyn EmbeddingProvider>,
	cfg: EmbeddingProviderConfig,
}
impl QdrantCorpus {
	pub fn new(
		store: QdrantStore,
		embedding: Arc<dyn EmbeddingProvider>,
		cfg: EmbeddingProviderConfig,
	) -> Self {
		Self { store, embedding, cfg }
	}

	async fn query_inner(
		&self,
		company: &str,
		text: &str,
		k: u32,
	) -> Result<Vec<RetrievalCandidate>> {
		let texts = vec![text.to_string()];
		let vector = self.embedding.embed(&self.cfg, &texts).await?.into_iter().next().ok_or_else(
			|| Error::Provider { message: "Embedding provider returned no vectors.".to_string() },
		)?;

		if vector.len() != self.store.vector_dim as usize {
			return Err(Error::InvalidRequest {
				message: format!(
					"Query vector has {} dimensions; collection expects {}.",
					vector.len(),
					self.store.vector_dim
				),
			});
		}

		Ok(self.store.nearest(company, vector, k).await?)
	}
}
impl CorpusStore for QdrantCorpus {
	fn query<'a>(
		&'a self,
		company: &'a str,
		text: &'a str,
		k: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievalCandidate>>> {
		Box::pin(self.query_inner(company, text, k))
	}
}

/// Fetches up to `k` candidates for `label`, nearest first.
///
/// An empty result is not an error: the caller skips the label for this company. Transport
/// failures propagate.
pub async fn retrieve(
	corpus: &dyn CorpusStore,
	company: &str,
	label: &Label,
	k: u32,
) -> Result<Vec<RetrievalCandidate>> {
	if k == 0 {
		return Err(Error::InvalidRequest { message: "Candidate count must be positive.".to_string() });
	}

	let query = label.standard_text();

	if query.is_empty() {
		tracing::warn!(company, label = %label.code, "Label has no standard text. Skipping.");

		return Ok(Vec::new());
	}

	let mut candidates = corpus.query(company, query, k).await?;

	candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
	candidates.truncate(k as usize);

	if candidates.is_empty() {
		tracing::warn!(company, label = %label.code, "Retrieval returned no candidates.");
	}

	Ok(candidates)
}
