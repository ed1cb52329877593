use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
	index: Option<usize>,
	embedding: Vec<f32>,
}

/// Embeds `texts` with an OpenAI-compatible `/embeddings` endpoint. Vectors come back in input
/// order, each with exactly `cfg.dimensions` components.
pub async fn embed(
	cfg: &disclose_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	if texts.is_empty() {
		return Ok(Vec::new());
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(format!("{}{}", cfg.api_base, cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_embedding_response(json, texts.len(), cfg.dimensions as usize)
}

/// Places each vector at its reported `index`, or at its position when the provider omits
/// indices. Every input must receive one vector of width `dimensions`.
fn parse_embedding_response(
	json: Value,
	input_count: usize,
	dimensions: usize,
) -> Result<Vec<Vec<f32>>> {
	let response: EmbeddingResponse = serde_json::from_value(json).map_err(|err| {
		Error::InvalidResponse { message: format!("Malformed embedding response: {err}.") }
	})?;
	let mut slots: Vec<Option<Vec<f32>>> = vec![None; input_count];

	for (position, item) in response.data.into_iter().enumerate() {
		let index = item.index.unwrap_or(position);

		if item.embedding.len() != dimensions {
			return Err(Error::InvalidResponse {
				message: format!(
					"Embedding {index} has {} dimensions, expected {dimensions}.",
					item.embedding.len()
				),
			});
		}

		let Some(slot) = slots.get_mut(index) else {
			return Err(Error::InvalidResponse {
				message: format!(
					"Embedding index {index} is out of range for {input_count} inputs."
				),
			});
		};

		if slot.replace(item.embedding).is_some() {
			return Err(Error::InvalidResponse {
				message: format!("Embedding index {index} appears twice."),
			});
		}
	}

	slots
		.into_iter()
		.enumerate()
		.map(|(idx, slot)| {
			slot.ok_or_else(|| Error::InvalidResponse {
				message: format!("Embedding response has no vector for input {idx}."),
			})
		})
		.collect()
}
