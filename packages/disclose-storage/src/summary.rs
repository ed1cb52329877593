use std::path::{Path, PathBuf};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use disclose_domain::{CompanySummary, LabelDecision, label_details, summarize_company};

use crate::{Error, Result, table::Table};

pub const SUMMARY_HEADERS: [&str; 6] =
	["Company", "Total_Labels", "Y_Labels", "N_Labels", "Disclosure_Ratio", "Last_Updated"];
pub const DETAIL_HEADERS: [&str; 5] = ["Company", "Label", "Final_YN", "Y_Count", "Total_Chunks"];

const COL_COMPANY: &str = "Company";

/// Read-modify-write holder for the company summary and company x label detail tables.
///
/// Summary rows are keyed by company and overwritten in place. Detail rows are replaced per
/// company, so a rerun never leaves stale labels behind. Nothing reaches disk until
/// [`SummaryStore::commit`], and a failed commit drops every change since the last good one.
pub struct SummaryStore {
	summary_path: PathBuf,
	detail_path: PathBuf,
	summary: Table,
	detail: Table,
	committed: (Table, Table),
}
impl SummaryStore {
	pub fn open(summary_path: &Path, detail_path: &Path) -> Result<Self> {
		let summary = load_or_new(summary_path, &SUMMARY_HEADERS)?;
		let detail = load_or_new(detail_path, &DETAIL_HEADERS)?;

		Ok(Self {
			summary_path: summary_path.to_path_buf(),
			detail_path: detail_path.to_path_buf(),
			committed: (summary.clone(), detail.clone()),
			summary,
			detail,
		})
	}

	pub fn upsert(
		&mut self,
		company: &str,
		decisions: &[LabelDecision],
		now: OffsetDateTime,
	) -> Result<CompanySummary> {
		let summary = summarize_company(company, decisions, now);
		let row = summary_row(&summary)?;

		self.upsert_summary_row(company, row);
		self.replace_details(company, decisions);

		Ok(summary)
	}

	/// Writes both tables. On failure the pending changes are discarded and the last committed
	/// state is written back, so a failed company never reaches disk through a later commit.
	pub fn commit(&mut self) -> Result<()> {
		if let Err(err) = self.write_tables() {
			self.rollback();

			return Err(err);
		}

		self.committed = (self.summary.clone(), self.detail.clone());

		tracing::debug!(
			summary = %self.summary_path.display(),
			detail = %self.detail_path.display(),
			companies = self.summary.len(),
			"Summary tables committed."
		);

		Ok(())
	}

	/// Discards changes made since the last successful commit.
	fn rollback(&mut self) {
		let (summary, detail) = self.committed.clone();

		self.summary = summary;
		self.detail = detail;

		if let Err(err) = self.write_tables() {
			tracing::error!(
				error = %err,
				summary = %self.summary_path.display(),
				"Failed to restore summary tables after a failed commit."
			);
		}
	}

	pub fn summary_table(&self) -> &Table {
		&self.summary
	}

	pub fn detail_table(&self) -> &Table {
		&self.detail
	}

	fn write_tables(&self) -> Result<()> {
		self.summary.write(&self.summary_path)?;
		self.detail.write(&self.detail_path)?;

		Ok(())
	}

	fn upsert_summary_row(&mut self, company: &str, values: Vec<String>) {
		let columns: Vec<usize> =
			SUMMARY_HEADERS.iter().map(|header| self.summary.ensure_column(header)).collect();
		let company_col = columns[0];
		let idx = match (0..self.summary.len())
			.find(|&idx| self.summary.cell(idx, company_col).trim() == company)
		{
			Some(idx) => idx,
			None => {
				self.summary.push_row(Vec::new());

				self.summary.len() - 1
			},
		};

		for (col, value) in columns.into_iter().zip(values) {
			self.summary.set(idx, col, value);
		}
	}

	fn replace_details(&mut self, company: &str, decisions: &[LabelDecision]) {
		let columns: Vec<usize> =
			DETAIL_HEADERS.iter().map(|header| self.detail.ensure_column(header)).collect();
		let company_col = columns[0];
		let width = self.detail.headers.len();

		self.detail
			.rows
			.retain(|row| row.get(company_col).map(|cell| cell.trim()) != Some(company));

		for detail in label_details(company, decisions) {
			let values = [
				detail.company,
				detail.label,
				detail.final_yn.to_string(),
				detail.y_count.to_string(),
				detail.total_chunks.to_string(),
			];
			let mut cells = vec![String::new(); width];

			for (col, value) in columns.iter().zip(values) {
				cells[*col] = value;
			}

			self.detail.push_row(cells);
		}
	}
}

fn load_or_new(path: &Path, headers: &[&str]) -> Result<Table> {
	if !path.exists() {
		return Ok(Table::new(headers.iter().copied()));
	}

	let table = Table::read(path)?;

	table.require_column(path, &[COL_COMPANY])?;

	Ok(table)
}

fn summary_row(summary: &CompanySummary) -> Result<Vec<String>> {
	let last_updated = summary
		.last_updated
		.format(&Rfc3339)
		.map_err(|err| Error::InvalidArgument(format!("Failed to format timestamp: {err}.")))?;

	Ok(vec![
		summary.company.clone(),
		summary.total_labels.to_string(),
		summary.y_labels.to_string(),
		summary.n_labels.to_string(),
		format!("{:.4}", summary.disclosure_ratio),
		last_updated,
	])
}
