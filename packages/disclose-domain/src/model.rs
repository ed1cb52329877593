use std::fmt;

use serde::{Deserialize, Serialize};

/// A span of report text produced by the upstream chunking stage.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Chunk {
	pub company: String,
	pub page: Option<u32>,
	pub chunk_id: String,
	pub text: String,
}

/// A coded disclosure requirement from the guideline table.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Label {
	pub code: String,
	pub definition: String,
	pub point: Option<String>,
}
impl Label {
	/// Text used both as the retrieval query and as the standard shown to the judge.
	///
	/// Falls back from the definition to the point text and finally to the label code.
	pub fn standard_text(&self) -> &str {
		let definition = self.definition.trim();

		if !definition.is_empty() {
			return definition;
		}
		if let Some(point) = self.point.as_deref().map(str::trim)
			&& !point.is_empty()
		{
			return point;
		}

		self.code.trim()
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalCandidate {
	pub chunk: Chunk,
	pub distance: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RankedCandidate {
	pub chunk: Chunk,
	pub distance: f32,
	pub rerank_score: f32,
	/// 1-based, descending by `rerank_score`.
	pub rank: u32,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Disclosure {
	#[serde(rename = "Y")]
	Yes,
	#[default]
	#[serde(rename = "N")]
	No,
}
impl Disclosure {
	/// Anything other than a trimmed, case-insensitive `Y` is a non-disclosure.
	pub fn normalize(raw: &str) -> Self {
		if raw.trim().eq_ignore_ascii_case("y") {
			return Self::Yes;
		}

		Self::No
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Yes => "Y",
			Self::No => "N",
		}
	}

	pub fn is_yes(self) -> bool {
		matches!(self, Self::Yes)
	}
}
impl fmt::Display for Disclosure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum JudgmentSource {
	Primary,
	Escalation,
	/// Every attempt failed; `error` is kept for the audit column.
	Fallback { error: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Judgment {
	pub reasoning: String,
	pub is_disclosed: Disclosure,
	pub confidence: Option<f32>,
	pub source: JudgmentSource,
}
impl Judgment {
	pub fn new(reasoning: String, is_disclosed: Disclosure, confidence: Option<f32>) -> Self {
		Self { reasoning, is_disclosed, confidence, source: JudgmentSource::Primary }
	}

	pub fn fallback(error: impl Into<String>) -> Self {
		Self {
			reasoning: String::new(),
			is_disclosed: Disclosure::No,
			confidence: Some(0.0),
			source: JudgmentSource::Fallback { error: error.into() },
		}
	}

	pub fn escalated(mut self) -> Self {
		self.source = JudgmentSource::Escalation;

		self
	}

	pub fn is_fallback(&self) -> bool {
		matches!(self.source, JudgmentSource::Fallback { .. })
	}

	/// Value written to the `reasoning` column: the model's reasoning, or the error text for
	/// a fallback.
	pub fn audit_reasoning(&self) -> &str {
		match &self.source {
			JudgmentSource::Fallback { error } => error.as_str(),
			_ => self.reasoning.as_str(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_disclosure_flags() {
		assert_eq!(Disclosure::normalize("Y"), Disclosure::Yes);
		assert_eq!(Disclosure::normalize(" y \n"), Disclosure::Yes);
		assert_eq!(Disclosure::normalize("N"), Disclosure::No);
		assert_eq!(Disclosure::normalize("Yes"), Disclosure::No);
		assert_eq!(Disclosure::normalize(""), Disclosure::No);
		assert_eq!(Disclosure::normalize("maybe"), Disclosure::No);
	}

	#[test]
	fn standard_text_falls_back_to_point_then_code() {
		let mut label = Label {
			code: "G-1".to_string(),
			definition: "  ".to_string(),
			point: Some("Board oversight".to_string()),
		};

		assert_eq!(label.standard_text(), "Board oversight");

		label.point = None;

		assert_eq!(label.standard_text(), "G-1");
	}

	#[test]
	fn fallback_reports_error_as_reasoning() {
		let judgment = Judgment::fallback("provider error: timeout");

		assert!(judgment.is_fallback());
		assert_eq!(judgment.is_disclosed, Disclosure::No);
		assert_eq!(judgment.confidence, Some(0.0));
		assert_eq!(judgment.reasoning, "");
		assert_eq!(judgment.audit_reasoning(), "provider error: timeout");
	}
}
