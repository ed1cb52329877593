mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Decision, EmbeddingProviderConfig, Judge, LlmProviderConfig, ProviderConfig,
	Providers, Qdrant, Retrieval, Service, Storage, Tables,
};

use std::{fs, path::Path};

pub const MAX_CANDIDATE_K: u32 = 200;
pub const MAX_WORKERS: u32 = 64;
pub const MAX_ATTEMPTS: u32 = 10;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.vector_dim == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}

	let mut keys = vec![
		("embedding", &cfg.providers.embedding.api_key),
		("rerank", &cfg.providers.rerank.api_key),
		("judge", &cfg.providers.judge.api_key),
	];

	if let Some(escalation) = cfg.providers.escalation.as_ref() {
		keys.push(("escalation", &escalation.api_key));
	}

	for (label, key) in keys {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	let mut llms = vec![("judge", &cfg.providers.judge)];

	if let Some(escalation) = cfg.providers.escalation.as_ref() {
		llms.push(("escalation", escalation));
	}

	for (label, llm) in llms {
		if !llm.temperature.is_finite() || llm.temperature < 0.0 {
			return Err(Error::Validation {
				message: format!(
					"providers.{label}.temperature must be a finite number, zero or greater."
				),
			});
		}
	}

	if cfg.retrieval.top_n == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_n must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.candidate_k < cfg.retrieval.top_n {
		return Err(Error::Validation {
			message: "retrieval.candidate_k must be at least retrieval.top_n.".to_string(),
		});
	}
	if cfg.retrieval.candidate_k > MAX_CANDIDATE_K {
		return Err(Error::Validation {
			message: format!("retrieval.candidate_k must be {MAX_CANDIDATE_K} or less."),
		});
	}
	if !(1..=MAX_WORKERS).contains(&cfg.judge.workers) {
		return Err(Error::Validation {
			message: format!("judge.workers must be in the range 1-{MAX_WORKERS}."),
		});
	}
	if !(1..=MAX_ATTEMPTS).contains(&cfg.judge.max_attempts) {
		return Err(Error::Validation {
			message: format!("judge.max_attempts must be in the range 1-{MAX_ATTEMPTS}."),
		});
	}
	if cfg.judge.base_backoff_ms > cfg.judge.max_backoff_ms {
		return Err(Error::Validation {
			message: "judge.base_backoff_ms must not exceed judge.max_backoff_ms.".to_string(),
		});
	}
	if !cfg.judge.escalation_threshold.is_finite() {
		return Err(Error::Validation {
			message: "judge.escalation_threshold must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.judge.escalation_threshold) {
		return Err(Error::Validation {
			message: "judge.escalation_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.decision.top_k == 0 {
		return Err(Error::Validation {
			message: "decision.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.decision.y_threshold == 0 {
		return Err(Error::Validation {
			message: "decision.y_threshold must be greater than zero.".to_string(),
		});
	}
	if cfg.decision.y_threshold > cfg.decision.top_k {
		return Err(Error::Validation {
			message: "decision.y_threshold must not exceed decision.top_k.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.judge
		.positive_examples
		.as_deref()
		.map(|path| path.as_os_str().is_empty())
		.unwrap_or(false)
	{
		cfg.judge.positive_examples = None;
	}
	if cfg
		.providers
		.escalation
		.as_ref()
		.map(|escalation| escalation.model.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.escalation = None;
	}
}
