use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub judge: Judge,
	#[serde(default)]
	pub decision: Decision,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
	pub tables: Tables,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tables {
	/// Directory receiving `<company>_ranked.csv` and `<stem>_judged.csv` files.
	pub output_dir: PathBuf,
	/// Company-level summary, keyed by company.
	pub summary_path: PathBuf,
	/// Company x label detail, replaced per company.
	pub detail_path: PathBuf,
	/// Skip a company or input file whose output file already exists.
	#[serde(default)]
	pub skip_existing: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	pub judge: LlmProviderConfig,
	/// Higher-capability model consulted when the judge reports low confidence.
	pub escalation: Option<LlmProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	#[serde(default)]
	pub temperature: f32,
	pub timeout_ms: u64,
	/// Request `response_format = json_object` from the provider.
	#[serde(default = "default_json_mode")]
	pub json_mode: bool,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retrieval {
	pub candidate_k: u32,
	pub top_n: u32,
	/// Map raw rerank logits through a sigmoid so scores land in 0.0-1.0.
	#[serde(default)]
	pub normalize_scores: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Judge {
	pub workers: u32,
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
	#[serde(default = "default_escalation_threshold")]
	pub escalation_threshold: f32,
	pub positive_examples: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Decision {
	pub top_k: u32,
	pub y_threshold: u32,
}
impl Default for Decision {
	fn default() -> Self {
		Self { top_k: 5, y_threshold: 1 }
	}
}

fn default_json_mode() -> bool {
	true
}

fn default_escalation_threshold() -> f32 {
	0.8
}
