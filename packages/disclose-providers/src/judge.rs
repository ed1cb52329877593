use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

const JSON_OBJECT_PATTERN: &str = r"(?s)\{.*\}";

/// A typed classification reply. `is_disclosed` is kept verbatim; normalisation to Y/N happens
/// in the domain layer.
#[derive(Clone, Debug, PartialEq)]
pub struct JudgeReply {
	pub reasoning: String,
	pub is_disclosed: String,
	pub confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RawReply {
	#[serde(default)]
	reasoning: Option<String>,
	#[serde(default)]
	is_disclosed: Option<String>,
	#[serde(default)]
	confidence: Option<f64>,
}

pub async fn judge(
	cfg: &disclose_config::LlmProviderConfig,
	messages: &[Value],
) -> Result<JudgeReply> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});

	if cfg.json_mode {
		body["response_format"] = serde_json::json!({ "type": "json_object" });
	}

	let res = client
		.post(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_judge_response(json)
}

pub fn parse_judge_response(json: Value) -> Result<JudgeReply> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Judge response is missing message content.".to_string(),
		})?;

	parse_judge_content(content)
}

/// Parses model output that is either `{"result": [{...}]}` or a bare reply object, possibly
/// wrapped in prose or code fences.
pub fn parse_judge_content(content: &str) -> Result<JudgeReply> {
	let span = Regex::new(JSON_OBJECT_PATTERN)
		.ok()
		.and_then(|re| re.find(content).map(|found| found.as_str()))
		.ok_or_else(|| Error::Schema {
			message: "Judge content contains no JSON object.".to_string(),
		})?;
	let value: Value = serde_json::from_str(span).map_err(|err| Error::Schema {
		message: format!("Judge content is not valid JSON: {err}."),
	})?;
	let item = match value.get("result") {
		Some(Value::Array(items)) => items.first().cloned().ok_or_else(|| Error::Schema {
			message: "Judge result list is empty.".to_string(),
		})?,
		Some(_) => {
			return Err(Error::Schema { message: "Judge result must be an array.".to_string() });
		},
		None => value,
	};
	let raw: RawReply = serde_json::from_value(item).map_err(|err| Error::Schema {
		message: format!("Judge reply does not match schema: {err}."),
	})?;

	into_reply(raw)
}

fn into_reply(raw: RawReply) -> Result<JudgeReply> {
	let Some(is_disclosed) = raw.is_disclosed else {
		return Err(Error::Schema { message: "Judge reply is missing is_disclosed.".to_string() });
	};
	let confidence = match raw.confidence {
		Some(value) if !value.is_finite() || !(0.0..=1.0).contains(&value) => {
			return Err(Error::Schema {
				message: format!("Judge confidence {value} is outside 0.0-1.0."),
			});
		},
		Some(value) => Some(value as f32),
		None => None,
	};

	Ok(JudgeReply {
		reasoning: raw.reasoning.unwrap_or_default().trim().to_string(),
		is_disclosed,
		confidence,
	})
}
