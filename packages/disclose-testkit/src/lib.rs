mod error;

pub use error::{Error, Result};

use std::{
	env, fs,
	path::{Path, PathBuf},
};

use serde_json::Map;
use tempfile::TempDir;

use disclose_config::{
	Config, Decision, EmbeddingProviderConfig, Judge, LlmProviderConfig, ProviderConfig,
	Providers, Qdrant, Retrieval, Service, Storage, Tables,
};
use disclose_domain::{Chunk, Label};

/// A scratch directory removed when dropped.
pub struct TestDir {
	inner: TempDir,
}
impl TestDir {
	pub fn new(prefix: &str) -> Result<Self> {
		let inner = tempfile::Builder::new().prefix(&format!("{prefix}_")).tempdir()?;

		Ok(Self { inner })
	}

	pub fn path(&self) -> &Path {
		self.inner.path()
	}

	pub fn join(&self, name: &str) -> PathBuf {
		self.inner.path().join(name)
	}

	/// Writes `contents` to `name` inside the directory and returns the full path.
	pub fn write(&self, name: &str, contents: &str) -> Result<PathBuf> {
		let path = self.join(name);

		fs::write(&path, contents)?;

		Ok(path)
	}
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("DISCLOSE_QDRANT_URL").ok()
}

/// A complete configuration rooted at `root` with zero backoff, for tests that replace every
/// provider with a double.
pub fn test_config(root: &Path) -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		storage: Storage {
			qdrant: Qdrant {
				url: env_qdrant_url().unwrap_or_else(|| "http://127.0.0.1:6334".to_string()),
				collection: "disclose_test_chunks".to_string(),
				vector_dim: 4,
			},
			tables: Tables {
				output_dir: root.join("out"),
				summary_path: root.join("summary.csv"),
				detail_path: root.join("detail.csv"),
				skip_existing: false,
			},
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "test-embedding".to_string(),
				dimensions: 4,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			rerank: ProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/rerank".to_string(),
				model: "test-rerank".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			judge: llm_config("judge-primary"),
			escalation: Some(llm_config("judge-escalation")),
		},
		retrieval: Retrieval { candidate_k: 20, top_n: 5, normalize_scores: false },
		judge: Judge {
			workers: 4,
			max_attempts: 5,
			base_backoff_ms: 0,
			max_backoff_ms: 0,
			escalation_threshold: 0.8,
			positive_examples: None,
		},
		decision: Decision { top_k: 5, y_threshold: 1 },
	}
}

pub fn llm_config(model: &str) -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: "test-key".to_string(),
		path: "/chat/completions".to_string(),
		model: model.to_string(),
		temperature: 0.0,
		timeout_ms: 1_000,
		json_mode: true,
		default_headers: Map::new(),
	}
}

pub fn sample_labels() -> Vec<Label> {
	vec![
		Label {
			code: "G-1".to_string(),
			definition: "Describe the board's oversight of climate-related risks and opportunities."
				.to_string(),
			point: Some("Board oversight".to_string()),
		},
		Label {
			code: "S-2".to_string(),
			definition: "Describe the climate-related risks identified over the short, medium and long term."
				.to_string(),
			point: None,
		},
	]
}

pub fn sample_chunk(company: &str, chunk_id: &str, text: &str) -> Chunk {
	Chunk {
		company: company.to_string(),
		page: Some(1),
		chunk_id: chunk_id.to_string(),
		text: text.to_string(),
	}
}

pub fn sample_chunks(company: &str, count: usize) -> Vec<Chunk> {
	(1..=count)
		.map(|idx| {
			sample_chunk(company, &format!("{company}-{idx}"), &format!("Report passage {idx}."))
		})
		.collect()
}
