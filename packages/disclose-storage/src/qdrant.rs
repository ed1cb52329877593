use std::collections::HashMap;

use qdrant_client::qdrant::{
	Condition, Filter, Query, QueryPointsBuilder, ScoredPoint, Value, value::Kind,
};

use disclose_domain::{Chunk, RetrievalCandidate};

use crate::Result;

pub const PAYLOAD_COMPANY: &str = "company";
pub const PAYLOAD_PAGE: &str = "page";
pub const PAYLOAD_CHUNK_ID: &str = "chunk_id";
pub const PAYLOAD_TEXT: &str = "text";

/// Handle on the chunk collection. Every point carries its company in the payload, so one
/// collection serves all reports.
pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &disclose_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Nearest chunks of `company` to `vector`, nearest first. A missing collection yields an
	/// empty list.
	pub async fn nearest(
		&self,
		company: &str,
		vector: Vec<f32>,
		limit: u32,
	) -> Result<Vec<RetrievalCandidate>> {
		if !self.client.collection_exists(self.collection.as_str()).await? {
			tracing::warn!(collection = %self.collection, "Chunk collection does not exist.");

			return Ok(Vec::new());
		}

		let filter = Filter::must([Condition::matches(PAYLOAD_COMPANY, company.to_string())]);
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.filter(filter)
			.with_payload(true)
			.limit(u64::from(limit));
		let response = self.client.query(search).await?;

		Ok(candidates_from_points(company, response.result))
	}
}

/// Converts scored points into candidates ordered by ascending distance. Cosine scores become
/// `1 - score`; points without chunk text are dropped.
pub fn candidates_from_points(company: &str, points: Vec<ScoredPoint>) -> Vec<RetrievalCandidate> {
	let mut out: Vec<RetrievalCandidate> = points
		.into_iter()
		.filter_map(|point| {
			let chunk = chunk_from_payload(company, &point.payload)?;

			Some(RetrievalCandidate { chunk, distance: 1.0 - point.score })
		})
		.collect();

	out.sort_by(|a, b| a.distance.total_cmp(&b.distance));

	out
}

pub fn chunk_from_payload(company: &str, payload: &HashMap<String, Value>) -> Option<Chunk> {
	let text = payload_string(payload, PAYLOAD_TEXT)?;

	if text.trim().is_empty() {
		return None;
	}

	Some(Chunk {
		company: payload_string(payload, PAYLOAD_COMPANY).unwrap_or_else(|| company.to_string()),
		page: payload_u32(payload, PAYLOAD_PAGE),
		chunk_id: payload_string(payload, PAYLOAD_CHUNK_ID).unwrap_or_default(),
		text,
	})
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.clone()),
		Some(Kind::IntegerValue(value)) => Some(value.to_string()),
		_ => None,
	}
}

fn payload_u32(payload: &HashMap<String, Value>, key: &str) -> Option<u32> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => u32::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) => {
			if value.fract() == 0.0 {
				u32::try_from(*value as i64).ok()
			} else {
				None
			}
		},
		Some(Kind::StringValue(text)) => text.trim().parse().ok(),
		_ => None,
	}
}
