use std::{sync::Arc, time::Duration};

use serde_json::Value;

use disclose_config::LlmProviderConfig;
use disclose_domain::{Disclosure, Judgment};
use disclose_providers::judge::JudgeReply;

use crate::JudgeProvider;

/// Why a single judge call produced no usable reply.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum JudgeFailure {
	/// Transport, rate limit, or provider envelope problem.
	#[error("Provider error: {message}")]
	Provider { message: String },
	/// The model answered outside the reply schema.
	#[error("Schema violation: {message}")]
	Schema { message: String },
}
impl From<disclose_providers::Error> for JudgeFailure {
	fn from(err: disclose_providers::Error) -> Self {
		if err.is_schema_violation() {
			Self::Schema { message: err.to_string() }
		} else {
			Self::Provider { message: err.to_string() }
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JudgePolicy {
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
	pub escalation_threshold: f32,
}
impl JudgePolicy {
	pub fn from_config(cfg: &disclose_config::Judge) -> Self {
		Self {
			max_attempts: cfg.max_attempts,
			base_backoff_ms: cfg.base_backoff_ms,
			max_backoff_ms: cfg.max_backoff_ms,
			escalation_threshold: cfg.escalation_threshold,
		}
	}

	/// Escalate only on a reported confidence strictly below the threshold.
	pub fn should_escalate(&self, confidence: Option<f32>) -> bool {
		confidence.is_some_and(|confidence| confidence < self.escalation_threshold)
	}
}

/// Delay before retrying after the `attempt`-th failure (1-based): doubling from the base,
/// capped at the maximum.
pub fn backoff_for_attempt(policy: &JudgePolicy, attempt: u32) -> Duration {
	let exp = attempt.max(1).saturating_sub(1).min(6);
	let base = policy.base_backoff_ms.saturating_mul(1 << exp);

	Duration::from_millis(base.min(policy.max_backoff_ms))
}

/// Classifies one (chunk, label) prompt. Never fails: exhaustion and escalation errors resolve
/// to the fallback judgment carrying the error text.
#[derive(Clone)]
pub struct LabelJudge {
	provider: Arc<dyn JudgeProvider>,
	primary: LlmProviderConfig,
	escalation: Option<LlmProviderConfig>,
	policy: JudgePolicy,
}
impl LabelJudge {
	pub fn new(
		provider: Arc<dyn JudgeProvider>,
		primary: LlmProviderConfig,
		escalation: Option<LlmProviderConfig>,
		policy: JudgePolicy,
	) -> Self {
		Self { provider, primary, escalation, policy }
	}

	pub async fn judge(&self, messages: &[Value]) -> Judgment {
		let reply = match self.call_with_retry(messages).await {
			Ok(reply) => reply,
			Err(failure) => {
				tracing::error!(
					attempts = self.policy.max_attempts,
					error = %failure,
					"Judge attempts exhausted. Using fallback judgment."
				);

				return Judgment::fallback(format!(
					"Judge failed after {} attempts: {failure}",
					self.policy.max_attempts
				));
			},
		};
		let primary = to_judgment(reply);

		if !self.policy.should_escalate(primary.confidence) {
			return primary;
		}

		let Some(escalation) = self.escalation.as_ref() else {
			tracing::debug!(
				confidence = ?primary.confidence,
				"Low confidence but no escalation model is configured."
			);

			return primary;
		};

		tracing::info!(
			confidence = ?primary.confidence,
			model = %escalation.model,
			"Escalating low-confidence judgment."
		);

		match self.provider.judge(escalation, messages).await {
			Ok(reply) => to_judgment(reply).escalated(),
			Err(failure) => {
				tracing::error!(error = %failure, "Escalation call failed. Using fallback judgment.");

				Judgment::fallback(format!("Escalation failed: {failure}"))
			},
		}
	}

	async fn call_with_retry(&self, messages: &[Value]) -> Result<JudgeReply, JudgeFailure> {
		let max_attempts = self.policy.max_attempts.max(1);
		let mut last_failure = None;

		for attempt in 1..=max_attempts {
			match self.provider.judge(&self.primary, messages).await {
				Ok(reply) => return Ok(reply),
				Err(failure) => {
					tracing::warn!(attempt, max_attempts, error = %failure, "Judge attempt failed.");

					last_failure = Some(failure);
				},
			}

			if attempt < max_attempts {
				tokio::time::sleep(backoff_for_attempt(&self.policy, attempt)).await;
			}
		}

		Err(last_failure.unwrap_or_else(|| JudgeFailure::Provider {
			message: "No judge attempt was made.".to_string(),
		}))
	}
}

fn to_judgment(reply: JudgeReply) -> Judgment {
	Judgment::new(reply.reasoning, Disclosure::normalize(&reply.is_disclosed), reply.confidence)
}
