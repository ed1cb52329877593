use serde::{Deserialize, Serialize};

use crate::model::Disclosure;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DecisionPolicy {
	/// Number of rank-ordered judgments examined per label.
	pub top_k: u32,
	/// Minimum number of `Y` judgments within the window for a `Y` decision.
	pub y_threshold: u32,
}
impl Default for DecisionPolicy {
	fn default() -> Self {
		Self { top_k: 5, y_threshold: 1 }
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RankedJudgment {
	pub rank: u32,
	pub is_disclosed: Disclosure,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LabelDecision {
	pub company: String,
	pub label: String,
	pub final_yn: Disclosure,
	pub y_count: u32,
	pub considered_count: u32,
}

/// Collapses the judgments of one label into a single decision.
///
/// The window is positional: the first `top_k` judgments by rank are examined regardless of
/// their individual confidence. Ties in rank keep their input order.
pub fn decide_label(
	company: &str,
	label: &str,
	judgments: &[RankedJudgment],
	policy: DecisionPolicy,
) -> LabelDecision {
	let mut ordered = judgments.to_vec();

	ordered.sort_by_key(|judgment| judgment.rank);

	let window = &ordered[..ordered.len().min(policy.top_k as usize)];
	let y_count = window.iter().filter(|judgment| judgment.is_disclosed.is_yes()).count() as u32;
	let final_yn = if window.is_empty() || y_count < policy.y_threshold {
		Disclosure::No
	} else {
		Disclosure::Yes
	};

	LabelDecision {
		company: company.to_string(),
		label: label.to_string(),
		final_yn,
		y_count,
		considered_count: window.len() as u32,
	}
}
