use time::OffsetDateTime;

use crate::{decision::LabelDecision, model::Disclosure};

#[derive(Clone, Debug, PartialEq)]
pub struct CompanySummary {
	pub company: String,
	pub total_labels: u32,
	pub y_labels: u32,
	pub n_labels: u32,
	pub disclosure_ratio: f64,
	pub last_updated: OffsetDateTime,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompanyLabelDetail {
	pub company: String,
	pub label: String,
	pub final_yn: Disclosure,
	pub y_count: u32,
	pub total_chunks: u32,
}

/// Recomputes a company's summary from its full decision set.
///
/// Decisions for other companies are ignored; a repeated label keeps its last decision.
pub fn summarize_company(
	company: &str,
	decisions: &[LabelDecision],
	now: OffsetDateTime,
) -> CompanySummary {
	let current = latest_by_label(company, decisions);
	let total_labels = current.len() as u32;
	let y_labels = current.iter().filter(|decision| decision.final_yn.is_yes()).count() as u32;
	let disclosure_ratio =
		if total_labels == 0 { 0.0 } else { f64::from(y_labels) / f64::from(total_labels) };

	CompanySummary {
		company: company.to_string(),
		total_labels,
		y_labels,
		n_labels: total_labels - y_labels,
		disclosure_ratio,
		last_updated: now,
	}
}

pub fn label_details(company: &str, decisions: &[LabelDecision]) -> Vec<CompanyLabelDetail> {
	latest_by_label(company, decisions)
		.into_iter()
		.map(|decision| CompanyLabelDetail {
			company: decision.company.clone(),
			label: decision.label.clone(),
			final_yn: decision.final_yn,
			y_count: decision.y_count,
			total_chunks: decision.considered_count,
		})
		.collect()
}

fn latest_by_label<'a>(company: &str, decisions: &'a [LabelDecision]) -> Vec<&'a LabelDecision> {
	let mut out: Vec<&LabelDecision> = Vec::new();

	for decision in decisions.iter().filter(|decision| decision.company == company) {
		match out.iter_mut().find(|existing| existing.label == decision.label) {
			Some(existing) => *existing = decision,
			None => out.push(decision),
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn decision(label: &str, final_yn: Disclosure) -> LabelDecision {
		LabelDecision {
			company: "A".to_string(),
			label: label.to_string(),
			final_yn,
			y_count: u32::from(final_yn.is_yes()),
			considered_count: 5,
		}
	}

	#[test]
	fn ratio_is_zero_without_labels() {
		let summary = summarize_company("A", &[], OffsetDateTime::UNIX_EPOCH);

		assert_eq!(summary.total_labels, 0);
		assert_eq!(summary.disclosure_ratio, 0.0);
	}

	#[test]
	fn repeated_label_keeps_last_decision() {
		let decisions = vec![
			decision("G-1", Disclosure::Yes),
			decision("G-2", Disclosure::No),
			decision("G-1", Disclosure::No),
		];
		let summary = summarize_company("A", &decisions, OffsetDateTime::UNIX_EPOCH);
		let details = label_details("A", &decisions);

		assert_eq!(summary.total_labels, 2);
		assert_eq!(summary.y_labels, 0);
		assert_eq!(details.len(), 2);
		assert_eq!(details[0].label, "G-1");
		assert_eq!(details[0].final_yn, Disclosure::No);
	}
}
