use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct RerankResponse {
	#[serde(alias = "data")]
	results: Vec<RerankItem>,
}

#[derive(Debug, Deserialize)]
struct RerankItem {
	index: usize,
	#[serde(alias = "score")]
	relevance_score: f32,
}

/// Scores every `(query, doc)` pair with a cross-encoder endpoint. The returned scores are
/// aligned with `docs`.
pub async fn rerank(
	cfg: &disclose_config::ProviderConfig,
	query: &str,
	docs: &[String],
) -> Result<Vec<f32>> {
	if docs.is_empty() {
		return Ok(Vec::new());
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let body = serde_json::json!({
		"model": cfg.model,
		"query": query,
		"documents": docs,
		"top_n": docs.len(),
	});
	let res = client
		.post(format!("{}{}", cfg.api_base, cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_rerank_response(json, docs.len())
}

/// Every document must be scored exactly once. An unknown index, a repeated index or an
/// unscored document is an invalid response.
fn parse_rerank_response(json: Value, doc_count: usize) -> Result<Vec<f32>> {
	let response: RerankResponse = serde_json::from_value(json).map_err(|err| {
		Error::InvalidResponse { message: format!("Malformed rerank response: {err}.") }
	})?;
	let mut scores: Vec<Option<f32>> = vec![None; doc_count];

	for item in response.results {
		let Some(slot) = scores.get_mut(item.index) else {
			return Err(Error::InvalidResponse {
				message: format!(
					"Rerank index {} is out of range for {doc_count} documents.",
					item.index
				),
			});
		};

		if slot.replace(item.relevance_score).is_some() {
			return Err(Error::InvalidResponse {
				message: format!("Rerank index {} is scored twice.", item.index),
			});
		}
	}

	scores
		.into_iter()
		.enumerate()
		.map(|(idx, score)| {
			score.ok_or_else(|| Error::InvalidResponse {
				message: format!("Rerank response has no score for document {idx}."),
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn aligns_scores_by_index() {
		let json = serde_json::json!({
			"results": [
				{ "index": 1, "relevance_score": 0.2 },
				{ "index": 0, "relevance_score": 0.9 }
			]
		});
		let scores = parse_rerank_response(json, 2).expect("parse failed");

		assert_eq!(scores, vec![0.9, 0.2]);
	}

	#[test]
	fn accepts_data_array_with_plain_scores() {
		let json = serde_json::json!({
			"data": [
				{ "index": 0, "score": -1.5 },
				{ "index": 1, "score": 0.8 }
			]
		});
		let scores = parse_rerank_response(json, 2).expect("parse failed");

		assert_eq!(scores, vec![-1.5, 0.8]);
	}

	#[test]
	fn unscored_document_is_rejected() {
		let json = serde_json::json!({
			"results": [{ "index": 0, "relevance_score": -2.0 }]
		});

		assert!(matches!(parse_rerank_response(json, 2), Err(Error::InvalidResponse { .. })));
	}

	#[test]
	fn out_of_range_index_is_rejected() {
		let json = serde_json::json!({
			"results": [
				{ "index": 0, "relevance_score": -2.0 },
				{ "index": 1, "relevance_score": 0.1 },
				{ "index": 9, "relevance_score": 5.0 }
			]
		});

		assert!(matches!(parse_rerank_response(json, 2), Err(Error::InvalidResponse { .. })));
	}

	#[test]
	fn repeated_index_is_rejected() {
		let json = serde_json::json!({
			"results": [
				{ "index": 0, "relevance_score": 0.3 },
				{ "index": 0, "relevance_score": 0.4 }
			]
		});

		assert!(matches!(parse_rerank_response(json, 2), Err(Error::InvalidResponse { .. })));
	}
}
