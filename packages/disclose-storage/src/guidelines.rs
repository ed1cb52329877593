use std::{collections::HashMap, path::Path};

use disclose_domain::Label;

use crate::{Error, Result, table::Table};

pub const COL_LABEL: &str = "Label";
pub const COL_DEFINITION: &str = "Definition";
pub const COL_POINT: &str = "Point";
pub const COL_POSITIVE_1: &str = "Positive Example1";
pub const COL_POSITIVE_2: &str = "Positive Example2";

/// Verified exemplars shown to the judge for one label.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PositiveExamples {
	pub first: String,
	pub second: String,
}

/// Loads the guideline table. Rows without a label code are ignored.
pub fn load_labels(path: &Path) -> Result<Vec<Label>> {
	let table = Table::read(path)?;
	let label_col = table.require_column(path, &[COL_LABEL])?;

	table.require_column(path, &[COL_DEFINITION, COL_POINT])?;

	let mut labels = Vec::new();

	for row in 0..table.len() {
		let code = table.cell(row, label_col).trim();

		if code.is_empty() {
			continue;
		}

		labels.push(Label {
			code: code.to_string(),
			definition: table.value(row, &[COL_DEFINITION]).unwrap_or_default().to_string(),
			point: table.value(row, &[COL_POINT]).map(str::to_string),
		});
	}

	if labels.is_empty() {
		return Err(Error::InvalidArgument(format!(
			"{} contains no guideline labels.",
			path.display()
		)));
	}

	Ok(labels)
}

/// Builds the label to exemplar map. Each exemplar column takes its first non-empty value per
/// label.
pub fn load_positive_examples(path: &Path) -> Result<HashMap<String, PositiveExamples>> {
	let table = Table::read(path)?;
	let label_col = table.require_column(path, &[COL_LABEL])?;
	let first_col = table.require_column(path, &[COL_POSITIVE_1])?;
	let second_col = table.require_column(path, &[COL_POSITIVE_2])?;
	let mut map: HashMap<String, PositiveExamples> = HashMap::new();

	for row in 0..table.len() {
		let label = table.cell(row, label_col).trim();

		if label.is_empty() {
			continue;
		}

		let entry = map.entry(label.to_string()).or_default();

		fill_if_empty(&mut entry.first, table.cell(row, first_col));
		fill_if_empty(&mut entry.second, table.cell(row, second_col));
	}

	Ok(map)
}

fn fill_if_empty(slot: &mut String, candidate: &str) {
	if slot.is_empty() && !candidate.trim().is_empty() {
		*slot = candidate.to_string();
	}
}
