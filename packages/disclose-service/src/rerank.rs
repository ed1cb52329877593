use std::cmp::Ordering;

use disclose_config::ProviderConfig;
use disclose_domain::{RankedCandidate, RetrievalCandidate};

use crate::{Error, RerankProvider, Result};

/// Descending order for scores with NaN sorted last.
pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

/// Scores `(query, chunk)` pairs in candidate order and keeps the best `top_n`.
pub async fn rerank(
	provider: &dyn RerankProvider,
	cfg: &ProviderConfig,
	query: &str,
	candidates: Vec<RetrievalCandidate>,
	top_n: u32,
	normalize: bool,
) -> Result<Vec<RankedCandidate>> {
	if candidates.is_empty() || top_n == 0 {
		return Ok(Vec::new());
	}

	let docs: Vec<String> =
		candidates.iter().map(|candidate| candidate.chunk.text.clone()).collect();
	let scores = provider.rerank(cfg, query, &docs).await?;

	rank_by_scores(candidates, &scores, top_n, normalize)
}

/// Sorts candidates by score, highest first, and assigns ranks `1..=top_n`.
///
/// The sort is stable, so equal scores keep their retrieval order.
pub fn rank_by_scores(
	candidates: Vec<RetrievalCandidate>,
	scores: &[f32],
	top_n: u32,
	normalize: bool,
) -> Result<Vec<RankedCandidate>> {
	if scores.len() != candidates.len() {
		return Err(Error::Provider {
			message: format!(
				"Rerank returned {} scores for {} candidates.",
				scores.len(),
				candidates.len()
			),
		});
	}

	let mut scored: Vec<(RetrievalCandidate, f32)> = candidates
		.into_iter()
		.zip(scores.iter().map(|score| if normalize { sigmoid(*score) } else { *score }))
		.collect();

	scored.sort_by(|a, b| cmp_f32_desc(a.1, b.1));
	scored.truncate(top_n as usize);

	Ok(scored
		.into_iter()
		.enumerate()
		.map(|(idx, (candidate, rerank_score))| RankedCandidate {
			chunk: candidate.chunk,
			distance: candidate.distance,
			rerank_score,
			rank: idx as u32 + 1,
		})
		.collect())
}

fn sigmoid(logit: f32) -> f32 {
	1.0 / (1.0 + (-logit).exp())
}
